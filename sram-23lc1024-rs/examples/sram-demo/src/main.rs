//! Serial SRAM demo
//!
//! Brings up a 23LC1024 on bit-banged SPI from the Raspberry Pi Pico 2,
//! runs the communication self-check, then loops a write/read-back
//! pattern through the chip and logs the result via defmt.
//!
//! # Wiring
//!
//! | Signal      | Pico 2 Pin | 23LC1024 Pin |
//! |-------------|------------|--------------|
//! | CS          | GP5        | 1 (/CS)      |
//! | MISO (SO)   | GP4        | 2 (SO/SIO1)  |
//! | MOSI (SI)   | GP3        | 5 (SI/SIO0)  |
//! | SCK         | GP2        | 6 (SCK)      |
//! | HOLD        | GP6        | 7 (/HOLD)    |

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp as hal;
use embassy_rp::block::ImageDef;
use embassy_rp::gpio::Flex;
use embassy_time::{Delay, Duration, Timer};
use {defmt_rtt as _, panic_probe as _};

use pin_bank::{Direction, GpioBank, PinId};
use sram_23lc1024::{CommMode, SerialBus, Sram23lc1024, SramError, CAPACITY};

/// Tell the Boot ROM about our application.
#[link_section = ".start_block"]
#[used]
pub static IMAGE_DEF: ImageDef = hal::block::ImageDef::secure_exe();

const CS: u8 = 5;
const SCK: u8 = 2;
const MOSI: u8 = 3;
const MISO: u8 = 4;
const HOLD: u8 = 6;

/// GPIO bank over the handful of flex pins this demo wires up.
///
/// The driver addresses pins by number, so each flex pin is stored with
/// its number and the direction we last gave it (the HAL does not expose
/// a direction query). Pins outside the map read low and ignore writes.
struct BoardBank<'d> {
    pins: [(PinId, Flex<'d>, Direction); 5],
}

impl<'d> BoardBank<'d> {
    fn slot(&mut self, pin: PinId) -> Option<&mut (PinId, Flex<'d>, Direction)> {
        self.pins.iter_mut().find(|(id, _, _)| *id == pin)
    }
}

impl GpioBank for BoardBank<'_> {
    fn set_direction(&mut self, pin: PinId, direction: Direction) {
        if let Some((_, flex, dir)) = self.slot(pin) {
            match direction {
                Direction::Input => flex.set_as_input(),
                Direction::Output => flex.set_as_output(),
            }
            *dir = direction;
        }
    }

    fn direction(&self, pin: PinId) -> Direction {
        self.pins
            .iter()
            .find(|(id, _, _)| *id == pin)
            .map(|(_, _, dir)| *dir)
            .unwrap_or(Direction::Input)
    }

    fn write(&mut self, pin: PinId, high: bool) {
        if let Some((_, flex, _)) = self.slot(pin) {
            if high {
                flex.set_high();
            } else {
                flex.set_low();
            }
        }
    }

    fn read(&mut self, pin: PinId) -> bool {
        match self.slot(pin) {
            Some((_, flex, _)) => flex.is_high(),
            None => false,
        }
    }
}

fn write_pattern<G, B>(
    sram: &mut Sram23lc1024<G, B>,
    base: u32,
    pattern: &[u8],
) -> Result<(), SramError<B::Error>>
where
    G: GpioBank,
    B: SerialBus<G>,
{
    sram.start_write(base)?;
    sram.write_all(pattern)?;
    sram.stop()
}

fn read_pattern<G, B>(
    sram: &mut Sram23lc1024<G, B>,
    base: u32,
    buf: &mut [u8],
) -> Result<(), SramError<B::Error>>
where
    G: GpioBank,
    B: SerialBus<G>,
{
    sram.start_read(base)?;
    sram.read_into(buf)?;
    sram.stop()
}

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let p = embassy_rp::init(Default::default());

    let bank = BoardBank {
        pins: [
            (PinId::new(CS).unwrap(), Flex::new(p.PIN_5), Direction::Input),
            (PinId::new(SCK).unwrap(), Flex::new(p.PIN_2), Direction::Input),
            (PinId::new(MOSI).unwrap(), Flex::new(p.PIN_3), Direction::Input),
            (PinId::new(MISO).unwrap(), Flex::new(p.PIN_4), Direction::Input),
            (PinId::new(HOLD).unwrap(), Flex::new(p.PIN_6), Direction::Input),
        ],
    };

    let mut sram =
        Sram23lc1024::new_bit_bang_with_hold(bank, Delay, CS, SCK, MISO, MOSI, HOLD)
            .expect("pin assignment is within the GPIO bank");

    match sram.initialize(CommMode::Spi) {
        Ok(()) => info!("SRAM communication check passed"),
        Err(e) => {
            error!("SRAM initialization failed: {}", Debug2Format(&e));
            loop {
                Timer::after(Duration::from_secs(1)).await;
            }
        }
    }

    let mut round: u32 = 0;
    loop {
        let base = round.wrapping_mul(32) % CAPACITY;
        let mut pattern = [0u8; 32];
        for (i, byte) in pattern.iter_mut().enumerate() {
            *byte = (round as u8).wrapping_add(i as u8);
        }

        if let Err(e) = write_pattern(&mut sram, base, &pattern) {
            error!("write failed: {}", Debug2Format(&e));
        }

        let mut read_back = [0u8; 32];
        if let Err(e) = read_pattern(&mut sram, base, &mut read_back) {
            error!("read failed: {}", Debug2Format(&e));
        }

        if read_back == pattern {
            info!("round {}: 32 bytes verified at {:#x}", round, base);
        } else {
            warn!("round {}: read-back mismatch at {:#x}", round, base);
        }

        // Park the chip between rounds; the cursor survives the hold.
        if let Err(e) = sram.hold() {
            error!("hold failed: {}", Debug2Format(&e));
        }
        Timer::after(Duration::from_millis(500)).await;
        if let Err(e) = sram.release() {
            error!("release failed: {}", Debug2Format(&e));
        }

        round = round.wrapping_add(1);
        Timer::after(Duration::from_millis(500)).await;
    }
}
