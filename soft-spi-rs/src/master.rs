//! The bit-banged master itself.

use embedded_hal::delay::DelayNs;
use pin_bank::{Direction, GpioBank, PinId};

use crate::config::{BitOrder, Config};

/// Number of data lines clocked per edge.
///
/// In `Quad` operation two further pins join MOSI (SIO0) and MISO (SIO1)
/// as data lines; they are carried in the variant because they belong to
/// the peripheral's wiring, not to the bus's own construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineWidth {
    /// One line out (MOSI), one line in (MISO).
    Single,
    /// MOSI and MISO carry two bits per clock, both switched between
    /// output and input as the transfer direction changes.
    Dual,
    /// Four bidirectional data lines, one nibble per clock.
    Quad { sio2: PinId, sio3: PinId },
}

/// Software SPI master.
///
/// Owns its pin assignment and delay source but not the pins themselves;
/// every operation borrows the [`GpioBank`] it toggles. The clock idles
/// at the configured polarity and each edge is followed by the configured
/// half-period delay.
///
/// Construction touches no hardware. Call
/// [`initialize`](SoftSpi::initialize) once to claim the lines and drive
/// them to their idle levels.
pub struct SoftSpi<D> {
    sck: PinId,
    miso: PinId,
    mosi: PinId,
    config: Config,
    delay: D,
    width: LineWidth,
}

impl<D> SoftSpi<D>
where
    D: DelayNs,
{
    /// Create a new master over the given lines.
    pub fn new(sck: PinId, miso: PinId, mosi: PinId, delay: D, config: Config) -> Self {
        SoftSpi {
            sck,
            miso,
            mosi,
            config,
            delay,
            width: LineWidth::Single,
        }
    }

    /// Configure line directions and drive the idle levels.
    pub fn initialize<G: GpioBank>(&mut self, gpio: &mut G) {
        self.width = LineWidth::Single;
        gpio.set_direction(self.sck, Direction::Output);
        gpio.set_direction(self.mosi, Direction::Output);
        gpio.set_direction(self.miso, Direction::Input);
        gpio.write(self.sck, self.config.mode.cpol());
        gpio.write(self.mosi, false);
    }

    /// The currently selected data-line width.
    pub fn width(&self) -> LineWidth {
        self.width
    }

    /// Select the data-line width for subsequent transfers.
    ///
    /// Switching back to `Single` restores MISO as an input and MOSI as
    /// an output; the wider widths set line directions at the start of
    /// each write or read phase instead, since the same lines alternate
    /// between driving and sampling.
    pub fn set_width<G: GpioBank>(&mut self, gpio: &mut G, width: LineWidth) {
        self.width = width;
        if let LineWidth::Single = width {
            gpio.set_direction(self.miso, Direction::Input);
            gpio.set_direction(self.mosi, Direction::Output);
            gpio.write(self.mosi, false);
        }
    }

    /// Full-duplex single-bit transfer of one byte.
    ///
    /// Runs regardless of the selected width; multi-line peripherals
    /// accept their mode-entry commands on SIO0 before the width changes.
    pub fn transfer<G: GpioBank>(&mut self, gpio: &mut G, value: u8) -> u8 {
        let cpol = self.config.mode.cpol();
        let cpha = self.config.mode.cpha();
        let mut read_back = 0u8;

        for i in 0..8 {
            let mask = match self.config.bit_order {
                BitOrder::MsbFirst => 1 << (7 - i),
                BitOrder::LsbFirst => 1 << i,
            };
            gpio.write(self.mosi, value & mask != 0);

            // Leading edge; sample here when CPHA = 0.
            gpio.write(self.sck, !cpol);
            if !cpha && gpio.read(self.miso) {
                read_back |= mask;
            }
            self.delay.delay_us(self.config.half_period_us);

            // Trailing edge; sample here when CPHA = 1.
            gpio.write(self.sck, cpol);
            if cpha && gpio.read(self.miso) {
                read_back |= mask;
            }
            self.delay.delay_us(self.config.half_period_us);
        }
        read_back
    }

    /// Write a buffer at the selected width.
    pub fn write<G: GpioBank>(&mut self, gpio: &mut G, bytes: &[u8]) {
        match self.width {
            LineWidth::Single => {
                for &byte in bytes {
                    self.transfer(gpio, byte);
                }
            }
            LineWidth::Dual => {
                self.set_data_directions(gpio, Direction::Output);
                for &byte in bytes {
                    self.write_dual_byte(gpio, byte);
                }
            }
            LineWidth::Quad { sio2, sio3 } => {
                self.set_data_directions(gpio, Direction::Output);
                for &byte in bytes {
                    self.write_quad_byte(gpio, byte, sio2, sio3);
                }
            }
        }
    }

    /// Read into a buffer at the selected width.
    ///
    /// Single-bit reads clock out zeroes while sampling MISO.
    pub fn read<G: GpioBank>(&mut self, gpio: &mut G, buf: &mut [u8]) {
        match self.width {
            LineWidth::Single => {
                for byte in buf {
                    *byte = self.transfer(gpio, 0x00);
                }
            }
            LineWidth::Dual => {
                self.set_data_directions(gpio, Direction::Input);
                for byte in buf {
                    *byte = self.read_dual_byte(gpio);
                }
            }
            LineWidth::Quad { sio2, sio3 } => {
                self.set_data_directions(gpio, Direction::Input);
                for byte in buf {
                    *byte = self.read_quad_byte(gpio, sio2, sio3);
                }
            }
        }
    }

    /// Toggle the clock through `count` full cycles with the data lines
    /// untouched. Peripherals that resynchronize on bare clock edges
    /// (such as serial SRAM line-mode resets) need this primitive.
    pub fn pulse_clock<G: GpioBank>(&mut self, gpio: &mut G, count: u8) {
        let cpol = self.config.mode.cpol();
        for _ in 0..count {
            gpio.write(self.sck, !cpol);
            self.delay.delay_us(self.config.half_period_us);
            gpio.write(self.sck, cpol);
            self.delay.delay_us(self.config.half_period_us);
        }
    }

    /// Drive MOSI, MISO and any `extra` lines high as outputs.
    ///
    /// Used by device reset sequences that require every data input held
    /// at one while the clock runs. Follow with
    /// [`set_width`](SoftSpi::set_width) to restore normal directions.
    pub fn drive_data_high<G: GpioBank>(&mut self, gpio: &mut G, extra: &[PinId]) {
        gpio.set_direction(self.mosi, Direction::Output);
        gpio.write(self.mosi, true);
        gpio.set_direction(self.miso, Direction::Output);
        gpio.write(self.miso, true);
        for &pin in extra {
            gpio.set_direction(pin, Direction::Output);
            gpio.write(pin, true);
        }
    }

    fn set_data_directions<G: GpioBank>(&mut self, gpio: &mut G, direction: Direction) {
        gpio.set_direction(self.mosi, direction);
        gpio.set_direction(self.miso, direction);
        if let LineWidth::Quad { sio2, sio3 } = self.width {
            gpio.set_direction(sio2, direction);
            gpio.set_direction(sio3, direction);
        }
    }

    // Multi-line phases clock most significant bits first and sample on
    // the leading edge, as the dual/quad peripherals define.

    fn write_dual_byte<G: GpioBank>(&mut self, gpio: &mut G, byte: u8) {
        let cpol = self.config.mode.cpol();
        for shift in [6u8, 4, 2, 0] {
            gpio.write(self.miso, byte >> (shift + 1) & 1 != 0);
            gpio.write(self.mosi, byte >> shift & 1 != 0);
            gpio.write(self.sck, !cpol);
            self.delay.delay_us(self.config.half_period_us);
            gpio.write(self.sck, cpol);
            self.delay.delay_us(self.config.half_period_us);
        }
    }

    fn read_dual_byte<G: GpioBank>(&mut self, gpio: &mut G) -> u8 {
        let cpol = self.config.mode.cpol();
        let mut byte = 0u8;
        for shift in [6u8, 4, 2, 0] {
            gpio.write(self.sck, !cpol);
            if gpio.read(self.miso) {
                byte |= 1 << (shift + 1);
            }
            if gpio.read(self.mosi) {
                byte |= 1 << shift;
            }
            self.delay.delay_us(self.config.half_period_us);
            gpio.write(self.sck, cpol);
            self.delay.delay_us(self.config.half_period_us);
        }
        byte
    }

    fn write_quad_byte<G: GpioBank>(&mut self, gpio: &mut G, byte: u8, sio2: PinId, sio3: PinId) {
        let cpol = self.config.mode.cpol();
        for shift in [4u8, 0] {
            gpio.write(sio3, byte >> (shift + 3) & 1 != 0);
            gpio.write(sio2, byte >> (shift + 2) & 1 != 0);
            gpio.write(self.miso, byte >> (shift + 1) & 1 != 0);
            gpio.write(self.mosi, byte >> shift & 1 != 0);
            gpio.write(self.sck, !cpol);
            self.delay.delay_us(self.config.half_period_us);
            gpio.write(self.sck, cpol);
            self.delay.delay_us(self.config.half_period_us);
        }
    }

    fn read_quad_byte<G: GpioBank>(&mut self, gpio: &mut G, sio2: PinId, sio3: PinId) -> u8 {
        let cpol = self.config.mode.cpol();
        let mut byte = 0u8;
        for shift in [4u8, 0] {
            gpio.write(self.sck, !cpol);
            if gpio.read(sio3) {
                byte |= 1 << (shift + 3);
            }
            if gpio.read(sio2) {
                byte |= 1 << (shift + 2);
            }
            if gpio.read(self.miso) {
                byte |= 1 << (shift + 1);
            }
            if gpio.read(self.mosi) {
                byte |= 1 << shift;
            }
            self.delay.delay_us(self.config.half_period_us);
            gpio.write(self.sck, cpol);
            self.delay.delay_us(self.config.half_period_us);
        }
        byte
    }
}
