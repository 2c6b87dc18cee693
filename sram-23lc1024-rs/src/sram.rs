//! High-level interface for the 23LC1024 serial SRAM.
//!
//! [`Sram23lc1024`] wraps a [`SerialBus`] backend with construction-time
//! pin validation, the communication self-check, and the session state
//! machine that keeps reads, writes and holds from overlapping.

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiBus;
use pin_bank::{Direction, GpioBank, PinId};
use soft_spi::{Config as SoftSpiConfig, LineWidth, SoftSpi};

use crate::bus::{HwSpi, SerialBus};
use crate::error::SramError;
use crate::registers::{self, ModeRegister, OperatingMode, CAPACITY, MAX_ADDRESS};

/// How the chip's data lines are used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommMode {
    /// Single-bit SPI. Works on every backend.
    Spi,
    /// Dual line mode (SDI): SI and SO carry two bits per clock.
    /// Bit-banged backend only.
    Sdi,
    /// Quad line mode (SQI): four data lines, one nibble per clock.
    /// Bit-banged backend only; requires hold and SIO2 pins, which serve
    /// as SIO3 and SIO2.
    Sqi,
}

/// Driver operation state. Exactly one holds at a time; every public
/// operation is guarded by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Uninitialized,
    Idle,
    Reading,
    Writing,
    Held,
}

/// Driver for the Microchip 23LC1024 serial SRAM.
///
/// The device is byte addressable over `0..=`[`MAX_ADDRESS`] and is
/// operated in sequential mode: a session opened with
/// [`start_read`](Self::start_read) or [`start_write`](Self::start_write)
/// streams bytes from its start address, wrapping past the end of the
/// array, until [`stop`](Self::stop) closes it. The hold line, when
/// wired, suspends the chip between sessions so the bus can serve other
/// devices without disturbing the address cursor.
///
/// # Lifecycle
///
/// 1. Construct with one of the `new_*` constructors (or
///    [`with_bus`](Self::with_bus) for a custom backend). No bus traffic
///    is generated; pin numbers are validated here.
/// 2. [`initialize`](Self::initialize) claims the pins, recovers the
///    chip's line mode and runs the communication self-check. Every
///    other operation fails with
///    [`SramError::NotInitialized`] until this succeeds.
/// 3. Open sessions, stream bytes, close sessions.
///
/// # Example
///
/// ```no_run
/// use sram_23lc1024::{CommMode, Sram23lc1024};
///
/// # fn demo<G: pin_bank::GpioBank, D: embedded_hal::delay::DelayNs>(gpio: G, delay: D) {
/// // Bit-banged wiring: cs = 1, sck = 2, mosi = 3, miso = 4, hold = 6.
/// let mut sram = Sram23lc1024::new_bit_bang_with_hold(gpio, delay, 1, 2, 4, 3, 6).unwrap();
/// sram.initialize(CommMode::Spi).unwrap();
///
/// sram.start_write(0x100).unwrap();
/// sram.write_all(b"hello").unwrap();
/// sram.stop().unwrap();
///
/// let mut buf = [0u8; 5];
/// sram.start_read(0x100).unwrap();
/// sram.read_into(&mut buf).unwrap();
/// sram.stop().unwrap();
/// # }
/// ```
pub struct Sram23lc1024<G, B> {
    gpio: G,
    bus: B,
    cs: PinId,
    hold: Option<PinId>,
    sio2: Option<PinId>,
    mode: CommMode,
    state: State,
    next_address: Option<u32>,
    last_address: Option<u32>,
}

impl<G, B> Sram23lc1024<G, B>
where
    G: GpioBank,
    B: SerialBus<G>,
{
    /// Build a driver over an explicit bus backend.
    ///
    /// The convenience constructors cover the hardware SPI and
    /// bit-banged wirings; this entry point exists for custom
    /// [`SerialBus`] implementations.
    ///
    /// # Errors
    /// [`SramError::InvalidPin`] if any pin number is outside the
    /// board's GPIO bank. Nothing is driven onto the bus.
    pub fn with_bus(
        gpio: G,
        bus: B,
        cs: u8,
        hold: Option<u8>,
        sio2: Option<u8>,
    ) -> Result<Self, SramError<B::Error>> {
        let cs = PinId::new(cs).map_err(|_| SramError::InvalidPin)?;
        let hold = hold
            .map(PinId::new)
            .transpose()
            .map_err(|_| SramError::InvalidPin)?;
        let sio2 = sio2
            .map(PinId::new)
            .transpose()
            .map_err(|_| SramError::InvalidPin)?;

        Ok(Sram23lc1024 {
            gpio,
            bus,
            cs,
            hold,
            sio2,
            mode: CommMode::Spi,
            state: State::Uninitialized,
            next_address: None,
            last_address: None,
        })
    }

    // -----------------------------------------------------------------------
    // Initialization
    // -----------------------------------------------------------------------

    /// Claim the pins, recover the chip to a known line mode, enter the
    /// requested mode and verify the chip responds like a 23LC1024.
    ///
    /// The self-check reads the mode register, requires a legal value,
    /// writes a different mode, reads it back, and finally leaves the
    /// chip in sequential mode. A chip that is absent, unpowered or
    /// miswired fails the check and the driver stays uninitialized.
    ///
    /// May be called again to re-probe; a failed re-initialization
    /// leaves the driver unusable rather than trusting stale state.
    ///
    /// # Errors
    /// * [`SramError::HoldNotDefined`] / [`SramError::Sio2NotDefined`]
    ///   requesting SQI without the extra data lines wired.
    /// * [`SramError::ModeNotSupported`] requesting SDI or SQI on a
    ///   backend that only drives a single data line.
    /// * [`SramError::CommCheckFailed`] if the probe does not match.
    pub fn initialize(&mut self, mode: CommMode) -> Result<(), SramError<B::Error>> {
        self.state = State::Uninitialized;

        // Mode prerequisites, before any pin or bus activity.
        let quad_lines = match mode {
            CommMode::Sqi => {
                let sio3 = self.hold.ok_or(SramError::HoldNotDefined)?;
                let sio2 = self.sio2.ok_or(SramError::Sio2NotDefined)?;
                Some((sio2, sio3))
            }
            _ => None,
        };
        if mode != CommMode::Spi && !B::SUPPORTS_MULTI_LINE {
            return Err(SramError::ModeNotSupported);
        }

        // Chip select inactive; hold and SIO2 idle high (a low hold
        // freezes the chip).
        self.gpio.set_direction(self.cs, Direction::Output);
        self.gpio.write(self.cs, true);
        for pin in [self.hold, self.sio2].into_iter().flatten() {
            self.gpio.set_direction(pin, Direction::Output);
            self.gpio.write(pin, true);
        }

        self.bus.configure(&mut self.gpio)?;

        // The chip may have been left in dual or quad mode by a previous
        // run; recover it to single-bit SPI before talking to it.
        let mut aux = [self.cs; 2];
        let mut aux_len = 0;
        for pin in [self.hold, self.sio2].into_iter().flatten() {
            aux[aux_len] = pin;
            aux_len += 1;
        }
        self.bus
            .reset_lines(&mut self.gpio, self.cs, &aux[..aux_len])?;
        self.mode = CommMode::Spi;

        match mode {
            CommMode::Spi => {}
            CommMode::Sdi => {
                self.command(registers::EDIO)?;
                self.bus.set_width(&mut self.gpio, LineWidth::Dual)?;
            }
            CommMode::Sqi => {
                self.command(registers::EQIO)?;
                if let Some((sio2, sio3)) = quad_lines {
                    self.bus
                        .set_width(&mut self.gpio, LineWidth::Quad { sio2, sio3 })?;
                }
            }
        }
        self.mode = mode;

        // Communication self-check via the mode register.
        let current = ModeRegister::from_bits(self.read_mode_register()?);
        let probe = match current.mode() {
            Some(OperatingMode::Sequential) => OperatingMode::Page,
            Some(_) => OperatingMode::Sequential,
            None => return Err(SramError::CommCheckFailed),
        };
        self.write_mode_register(probe.bits())?;
        let read_back = ModeRegister::from_bits(self.read_mode_register()?);
        if read_back.mode() != Some(probe) {
            return Err(SramError::CommCheckFailed);
        }
        if probe != OperatingMode::Sequential {
            self.write_mode_register(OperatingMode::Sequential.bits())?;
        }

        self.next_address = None;
        self.last_address = None;
        self.state = State::Idle;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // State queries
    // -----------------------------------------------------------------------

    /// Initialized with no session open and not held.
    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    /// A read or write session is open.
    pub fn is_busy(&self) -> bool {
        matches!(self.state, State::Reading | State::Writing)
    }

    pub fn is_reading(&self) -> bool {
        self.state == State::Reading
    }

    pub fn is_writing(&self) -> bool {
        self.state == State::Writing
    }

    pub fn is_held(&self) -> bool {
        self.state == State::Held
    }

    /// The line mode entered by the last successful `initialize`.
    pub fn comm_mode(&self) -> CommMode {
        self.mode
    }

    /// Address the next streamed byte will touch. `None` until a session
    /// has been opened.
    pub fn next_address(&self) -> Option<u32> {
        self.next_address
    }

    /// Address of the last byte read or written. `None` until a byte has
    /// moved.
    pub fn last_address(&self) -> Option<u32> {
        self.last_address
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    /// Open a read session at `address`.
    ///
    /// # Errors
    /// * [`SramError::InvalidAddress`] if `address >` [`MAX_ADDRESS`];
    ///   nothing is driven onto the bus.
    /// * [`SramError::NotInitialized`] / [`SramError::Held`] /
    ///   [`SramError::Busy`] per the current state.
    pub fn start_read(&mut self, address: u32) -> Result<(), SramError<B::Error>> {
        self.start_session(address, registers::READ, State::Reading)
    }

    /// Open a write session at `address`. Errors as
    /// [`start_read`](Self::start_read).
    pub fn start_write(&mut self, address: u32) -> Result<(), SramError<B::Error>> {
        self.start_session(address, registers::WRITE, State::Writing)
    }

    /// Read the byte at the cursor and advance it.
    pub fn read_byte(&mut self) -> Result<u8, SramError<B::Error>> {
        self.ensure_reading()?;
        let mut buf = [0u8; 1];
        if let Err(error) = self.bus.read(&mut self.gpio, &mut buf) {
            self.abort_session();
            return Err(SramError::Bus(error));
        }
        self.advance_cursor(1);
        Ok(buf[0])
    }

    /// Write one byte at the cursor and advance it.
    pub fn write_byte(&mut self, value: u8) -> Result<(), SramError<B::Error>> {
        self.ensure_writing()?;
        if let Err(error) = self.bus.write(&mut self.gpio, &[value]) {
            self.abort_session();
            return Err(SramError::Bus(error));
        }
        self.advance_cursor(1);
        Ok(())
    }

    /// Fill `buf` from the open read session in one bus transaction.
    ///
    /// An empty buffer is a no-op success with no bus activity.
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<(), SramError<B::Error>> {
        self.ensure_reading()?;
        if buf.is_empty() {
            return Ok(());
        }
        if let Err(error) = self.bus.read(&mut self.gpio, buf) {
            self.abort_session();
            return Err(SramError::Bus(error));
        }
        self.advance_cursor(buf.len() as u32);
        Ok(())
    }

    /// Stream `bytes` into the open write session in one bus
    /// transaction. An empty slice is a no-op success.
    pub fn write_all(&mut self, bytes: &[u8]) -> Result<(), SramError<B::Error>> {
        self.ensure_writing()?;
        if bytes.is_empty() {
            return Ok(());
        }
        if let Err(error) = self.bus.write(&mut self.gpio, bytes) {
            self.abort_session();
            return Err(SramError::Bus(error));
        }
        self.advance_cursor(bytes.len() as u32);
        Ok(())
    }

    /// Close the open session and deselect the chip.
    pub fn stop(&mut self) -> Result<(), SramError<B::Error>> {
        match self.state {
            State::Uninitialized => Err(SramError::NotInitialized),
            State::Idle => Err(SramError::Idle),
            State::Held => Err(SramError::Held),
            State::Reading | State::Writing => {
                self.deselect();
                self.state = State::Idle;
                Ok(())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Hold
    // -----------------------------------------------------------------------

    /// Suspend the chip via the hold line.
    ///
    /// Only an idle, initialized device can be held; the address cursor
    /// survives a hold/release cycle.
    ///
    /// # Errors
    /// * [`SramError::HoldNotDefined`] if no hold pin was configured.
    /// * [`SramError::HoldNotAvailable`] in SQI mode, where the hold
    ///   line carries data.
    /// * [`SramError::Held`] / [`SramError::Busy`] /
    ///   [`SramError::NotInitialized`] per the current state.
    pub fn hold(&mut self) -> Result<(), SramError<B::Error>> {
        let hold = self.hold.ok_or(SramError::HoldNotDefined)?;
        if self.mode == CommMode::Sqi {
            return Err(SramError::HoldNotAvailable);
        }
        match self.state {
            State::Uninitialized => Err(SramError::NotInitialized),
            State::Held => Err(SramError::Held),
            State::Reading | State::Writing => Err(SramError::Busy),
            State::Idle => {
                self.gpio.write(hold, false);
                self.state = State::Held;
                Ok(())
            }
        }
    }

    /// Release the hold line.
    ///
    /// # Errors
    /// * [`SramError::HoldNotDefined`] if no hold pin was configured.
    /// * [`SramError::NotHeld`] if the device is not held.
    pub fn release(&mut self) -> Result<(), SramError<B::Error>> {
        let hold = self.hold.ok_or(SramError::HoldNotDefined)?;
        if self.state != State::Held {
            return Err(SramError::NotHeld);
        }
        self.gpio.write(hold, true);
        self.state = State::Idle;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn start_session(
        &mut self,
        address: u32,
        instruction: u8,
        target: State,
    ) -> Result<(), SramError<B::Error>> {
        if address > MAX_ADDRESS {
            return Err(SramError::InvalidAddress);
        }
        match self.state {
            State::Uninitialized => return Err(SramError::NotInitialized),
            State::Held => return Err(SramError::Held),
            State::Reading | State::Writing => return Err(SramError::Busy),
            State::Idle => {}
        }

        let address_bytes = registers::address_bytes(address);
        let frame = [
            instruction,
            address_bytes[0],
            address_bytes[1],
            address_bytes[2],
        ];
        self.select();
        if let Err(error) = self.bus.write(&mut self.gpio, &frame) {
            self.deselect();
            return Err(SramError::Bus(error));
        }
        self.last_address = self.next_address;
        self.next_address = Some(address);
        self.state = target;
        Ok(())
    }

    fn ensure_reading(&self) -> Result<(), SramError<B::Error>> {
        match self.state {
            State::Uninitialized => Err(SramError::NotInitialized),
            State::Idle => Err(SramError::Idle),
            State::Held => Err(SramError::Held),
            State::Writing => Err(SramError::NotReading),
            State::Reading => Ok(()),
        }
    }

    fn ensure_writing(&self) -> Result<(), SramError<B::Error>> {
        match self.state {
            State::Uninitialized => Err(SramError::NotInitialized),
            State::Idle => Err(SramError::Idle),
            State::Held => Err(SramError::Held),
            State::Reading => Err(SramError::NotWriting),
            State::Writing => Ok(()),
        }
    }

    /// Advance the cursor by `count` streamed bytes, wrapping past the
    /// end of the array as the chip does in sequential mode.
    fn advance_cursor(&mut self, count: u32) {
        if count == 0 {
            return;
        }
        if let Some(next) = self.next_address {
            self.last_address = Some((next + count - 1) % CAPACITY);
            self.next_address = Some((next + count) % CAPACITY);
        }
    }

    /// Deselect and drop back to idle after a failed transfer; the chip
    /// side of the session is gone, so keeping it open would lie.
    fn abort_session(&mut self) {
        self.deselect();
        self.state = State::Idle;
    }

    fn select(&mut self) {
        self.gpio.write(self.cs, false);
    }

    fn deselect(&mut self) {
        self.gpio.write(self.cs, true);
    }

    /// One-byte instruction with chip select cycled around it.
    fn command(&mut self, instruction: u8) -> Result<(), SramError<B::Error>> {
        self.select();
        let result = self
            .bus
            .write(&mut self.gpio, &[instruction])
            .map_err(SramError::Bus);
        self.deselect();
        result
    }

    fn read_mode_register(&mut self) -> Result<u8, SramError<B::Error>> {
        self.select();
        let result = self.mode_register_exchange();
        self.deselect();
        result
    }

    fn mode_register_exchange(&mut self) -> Result<u8, SramError<B::Error>> {
        self.bus.write(&mut self.gpio, &[registers::RDMR])?;
        let mut buf = [0u8; 1];
        self.bus.read(&mut self.gpio, &mut buf)?;
        Ok(buf[0])
    }

    fn write_mode_register(&mut self, value: u8) -> Result<(), SramError<B::Error>> {
        self.select();
        let result = self
            .bus
            .write(&mut self.gpio, &[registers::WRMR, value])
            .map_err(SramError::Bus);
        self.deselect();
        result
    }
}

// ---------------------------------------------------------------------------
// Convenience constructors per backend
// ---------------------------------------------------------------------------

impl<G, SPI> Sram23lc1024<G, HwSpi<SPI>>
where
    G: GpioBank,
    SPI: SpiBus,
{
    /// Hardware SPI wiring without a hold line.
    ///
    /// Clock and data pins belong to the SPI peripheral; only the
    /// chip-select pin number is taken (and validated) here.
    pub fn new(gpio: G, spi: SPI, cs: u8) -> Result<Self, SramError<SPI::Error>> {
        Self::with_bus(gpio, HwSpi::new(spi), cs, None, None)
    }

    /// Hardware SPI wiring with a hold line.
    pub fn new_with_hold(
        gpio: G,
        spi: SPI,
        cs: u8,
        hold: u8,
    ) -> Result<Self, SramError<SPI::Error>> {
        Self::with_bus(gpio, HwSpi::new(spi), cs, Some(hold), None)
    }
}

impl<G, D> Sram23lc1024<G, SoftSpi<D>>
where
    G: GpioBank,
    D: DelayNs,
{
    /// Bit-banged wiring without a hold line.
    ///
    /// The bus is clocked in mode 0, MSB first, with the default
    /// half-period; that is what the chip expects.
    pub fn new_bit_bang(
        gpio: G,
        delay: D,
        cs: u8,
        sck: u8,
        miso: u8,
        mosi: u8,
    ) -> Result<Self, SramError<core::convert::Infallible>> {
        let bus = Self::soft_bus(delay, sck, miso, mosi)?;
        Self::with_bus(gpio, bus, cs, None, None)
    }

    /// Bit-banged wiring with a hold line.
    pub fn new_bit_bang_with_hold(
        gpio: G,
        delay: D,
        cs: u8,
        sck: u8,
        miso: u8,
        mosi: u8,
        hold: u8,
    ) -> Result<Self, SramError<core::convert::Infallible>> {
        let bus = Self::soft_bus(delay, sck, miso, mosi)?;
        Self::with_bus(gpio, bus, cs, Some(hold), None)
    }

    /// Bit-banged wiring with hold and SIO2 lines, the full six-pin
    /// hookup that makes SQI mode available.
    pub fn new_bit_bang_sqi(
        gpio: G,
        delay: D,
        cs: u8,
        sck: u8,
        miso: u8,
        mosi: u8,
        hold: u8,
        sio2: u8,
    ) -> Result<Self, SramError<core::convert::Infallible>> {
        let bus = Self::soft_bus(delay, sck, miso, mosi)?;
        Self::with_bus(gpio, bus, cs, Some(hold), Some(sio2))
    }

    fn soft_bus(
        delay: D,
        sck: u8,
        miso: u8,
        mosi: u8,
    ) -> Result<SoftSpi<D>, SramError<core::convert::Infallible>> {
        let sck = PinId::new(sck).map_err(|_| SramError::InvalidPin)?;
        let miso = PinId::new(miso).map_err(|_| SramError::InvalidPin)?;
        let mosi = PinId::new(mosi).map_err(|_| SramError::InvalidPin)?;
        Ok(SoftSpi::new(sck, miso, mosi, delay, SoftSpiConfig::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use pin_bank::mock::MockBank;
    use std::cell::RefCell;
    use std::rc::Rc;

    const CS: u8 = 1;
    const HOLD: u8 = 6;
    const SIO2: u8 = 7;

    fn pin(n: u8) -> PinId {
        PinId::new(n).unwrap()
    }

    // Shared observability for a chip that the driver has taken by
    // value.
    struct ChipStats {
        ops: u32,
        resets: u32,
        width: Option<LineWidth>,
        mode_reg: u8,
    }

    #[derive(Clone, Copy)]
    enum Phase {
        Idle,
        ReadMode,
        WriteMode,
        Address { write: bool, got: u8, addr: u32 },
        Reading { addr: u32 },
        Writing { addr: u32 },
    }

    /// A simulated 23LC1024 behind the bus seam.
    ///
    /// Decodes the instruction stream against a full-size memory. New
    /// chip-select activity is detected through the mock bank's toggle
    /// counter, which delimits commands the way the real chip's select
    /// edge does. With `garbage` set the mode register reads back
    /// nonsense, standing in for a missing or miswired part.
    struct MockChip<const MULTI: bool> {
        mem: Vec<u8>,
        phase: Phase,
        cs: PinId,
        cs_toggles_seen: u32,
        garbage: bool,
        stats: Rc<RefCell<ChipStats>>,
    }

    impl<const MULTI: bool> MockChip<MULTI> {
        fn new(cs: PinId) -> Self {
            MockChip {
                mem: vec![0; CAPACITY as usize],
                phase: Phase::Idle,
                cs,
                cs_toggles_seen: 0,
                garbage: false,
                stats: Rc::new(RefCell::new(ChipStats {
                    ops: 0,
                    resets: 0,
                    width: None,
                    mode_reg: OperatingMode::Sequential.bits(),
                })),
            }
        }

        fn garbage(cs: PinId) -> Self {
            let mut chip = Self::new(cs);
            chip.garbage = true;
            chip
        }

        fn stats(&self) -> Rc<RefCell<ChipStats>> {
            Rc::clone(&self.stats)
        }

        fn sync(&mut self, gpio: &mut MockBank) {
            let toggles = gpio.toggle_count(self.cs);
            if toggles != self.cs_toggles_seen {
                self.cs_toggles_seen = toggles;
                self.phase = Phase::Idle;
            }
        }
    }

    impl<const MULTI: bool> SerialBus<MockBank> for MockChip<MULTI> {
        type Error = Infallible;

        const SUPPORTS_MULTI_LINE: bool = MULTI;

        fn configure(&mut self, _gpio: &mut MockBank) -> Result<(), Infallible> {
            self.stats.borrow_mut().ops += 1;
            Ok(())
        }

        fn reset_lines(
            &mut self,
            _gpio: &mut MockBank,
            _cs: PinId,
            _aux: &[PinId],
        ) -> Result<(), Infallible> {
            let mut stats = self.stats.borrow_mut();
            stats.ops += 1;
            stats.resets += 1;
            self.phase = Phase::Idle;
            Ok(())
        }

        fn set_width(
            &mut self,
            _gpio: &mut MockBank,
            width: LineWidth,
        ) -> Result<(), Infallible> {
            let mut stats = self.stats.borrow_mut();
            stats.ops += 1;
            stats.width = Some(width);
            Ok(())
        }

        fn write(&mut self, gpio: &mut MockBank, bytes: &[u8]) -> Result<(), Infallible> {
            self.sync(gpio);
            self.stats.borrow_mut().ops += 1;
            for &byte in bytes {
                self.phase = match self.phase {
                    Phase::Idle => match byte {
                        registers::RDMR => Phase::ReadMode,
                        registers::WRMR => Phase::WriteMode,
                        registers::READ => Phase::Address {
                            write: false,
                            got: 0,
                            addr: 0,
                        },
                        registers::WRITE => Phase::Address {
                            write: true,
                            got: 0,
                            addr: 0,
                        },
                        // EDIO, EQIO, RSTIO and anything unknown take no
                        // operands.
                        _ => Phase::Idle,
                    },
                    Phase::ReadMode => Phase::ReadMode,
                    Phase::WriteMode => {
                        self.stats.borrow_mut().mode_reg = byte;
                        Phase::WriteMode
                    }
                    Phase::Address { write, got, addr } => {
                        let addr = (addr << 8) | u32::from(byte);
                        if got == 2 {
                            let addr = addr & MAX_ADDRESS;
                            if write {
                                Phase::Writing { addr }
                            } else {
                                Phase::Reading { addr }
                            }
                        } else {
                            Phase::Address {
                                write,
                                got: got + 1,
                                addr,
                            }
                        }
                    }
                    Phase::Writing { addr } => {
                        self.mem[addr as usize] = byte;
                        Phase::Writing {
                            addr: (addr + 1) % CAPACITY,
                        }
                    }
                    Phase::Reading { addr } => Phase::Reading { addr },
                };
            }
            Ok(())
        }

        fn read(&mut self, gpio: &mut MockBank, buf: &mut [u8]) -> Result<(), Infallible> {
            self.sync(gpio);
            self.stats.borrow_mut().ops += 1;
            for slot in buf.iter_mut() {
                match self.phase {
                    Phase::ReadMode => {
                        *slot = if self.garbage {
                            0x77
                        } else {
                            self.stats.borrow().mode_reg
                        };
                    }
                    Phase::Reading { addr } => {
                        *slot = self.mem[addr as usize];
                        self.phase = Phase::Reading {
                            addr: (addr + 1) % CAPACITY,
                        };
                    }
                    _ => *slot = 0xFF,
                }
            }
            Ok(())
        }
    }

    type Device = Sram23lc1024<MockBank, MockChip<true>>;

    fn new_device(hold: Option<u8>, sio2: Option<u8>) -> (Device, Rc<RefCell<ChipStats>>) {
        let chip = MockChip::<true>::new(pin(CS));
        let stats = chip.stats();
        let device = Sram23lc1024::with_bus(MockBank::new(), chip, CS, hold, sio2).unwrap();
        (device, stats)
    }

    fn ready_device() -> (Device, Rc<RefCell<ChipStats>>) {
        let (mut device, stats) = new_device(Some(HOLD), Some(SIO2));
        device.initialize(CommMode::Spi).unwrap();
        (device, stats)
    }

    // ── Construction ─────────────────────────────────────────────────

    #[test]
    fn rejects_out_of_range_chip_select_before_bus_activity() {
        let chip = MockChip::<true>::new(pin(CS));
        let stats = chip.stats();
        let result = Sram23lc1024::with_bus(MockBank::new(), chip, 30, None, None);
        assert!(matches!(result, Err(SramError::InvalidPin)));
        assert_eq!(stats.borrow().ops, 0);
    }

    #[test]
    fn rejects_out_of_range_optional_pins() {
        let chip = MockChip::<true>::new(pin(CS));
        assert!(matches!(
            Sram23lc1024::with_bus(MockBank::new(), chip, CS, Some(200), None),
            Err(SramError::InvalidPin)
        ));
        let chip = MockChip::<true>::new(pin(CS));
        assert!(matches!(
            Sram23lc1024::with_bus(MockBank::new(), chip, CS, Some(HOLD), Some(30)),
            Err(SramError::InvalidPin)
        ));
    }

    // ── Initialization ───────────────────────────────────────────────

    #[test]
    fn initialize_reaches_idle_and_restores_sequential_mode() {
        let (device, stats) = ready_device();
        assert!(device.is_idle());
        assert!(!device.is_busy());
        assert_eq!(stats.borrow().mode_reg, OperatingMode::Sequential.bits());
        assert_eq!(stats.borrow().resets, 1);
    }

    #[test]
    fn initialize_probes_through_a_non_default_mode() {
        // A chip left in byte mode still passes the check and ends up
        // sequential.
        let chip = MockChip::<true>::new(pin(CS));
        let stats = chip.stats();
        stats.borrow_mut().mode_reg = OperatingMode::Byte.bits();
        let mut device =
            Sram23lc1024::with_bus(MockBank::new(), chip, CS, None, None).unwrap();
        device.initialize(CommMode::Spi).unwrap();
        assert_eq!(stats.borrow().mode_reg, OperatingMode::Sequential.bits());
    }

    #[test]
    fn initialize_fails_against_a_miswired_chip() {
        let chip = MockChip::<true>::garbage(pin(CS));
        let mut device =
            Sram23lc1024::with_bus(MockBank::new(), chip, CS, None, None).unwrap();
        assert!(matches!(
            device.initialize(CommMode::Spi),
            Err(SramError::CommCheckFailed)
        ));
        assert!(!device.is_idle());
        // The device stays unusable.
        assert!(matches!(
            device.start_read(0),
            Err(SramError::NotInitialized)
        ));
    }

    #[test]
    fn operations_before_initialize_are_rejected() {
        let (mut device, _) = new_device(Some(HOLD), None);
        assert!(matches!(
            device.start_write(0),
            Err(SramError::NotInitialized)
        ));
        assert!(matches!(device.read_byte(), Err(SramError::NotInitialized)));
        assert!(matches!(device.stop(), Err(SramError::NotInitialized)));
        assert!(matches!(device.hold(), Err(SramError::NotInitialized)));
    }

    // ── Line modes ───────────────────────────────────────────────────

    #[test]
    fn sdi_mode_switches_the_bus_to_dual() {
        let (mut device, stats) = new_device(Some(HOLD), Some(SIO2));
        device.initialize(CommMode::Sdi).unwrap();
        assert_eq!(device.comm_mode(), CommMode::Sdi);
        assert_eq!(stats.borrow().width, Some(LineWidth::Dual));
    }

    #[test]
    fn sqi_mode_switches_the_bus_to_quad_over_the_extra_pins() {
        let (mut device, stats) = new_device(Some(HOLD), Some(SIO2));
        device.initialize(CommMode::Sqi).unwrap();
        assert_eq!(
            stats.borrow().width,
            Some(LineWidth::Quad {
                sio2: pin(SIO2),
                sio3: pin(HOLD),
            })
        );
    }

    #[test]
    fn sqi_requires_hold_and_sio2_pins() {
        let (mut device, stats) = new_device(None, None);
        assert!(matches!(
            device.initialize(CommMode::Sqi),
            Err(SramError::HoldNotDefined)
        ));
        let (mut device2, _) = new_device(Some(HOLD), None);
        assert!(matches!(
            device2.initialize(CommMode::Sqi),
            Err(SramError::Sio2NotDefined)
        ));
        // Prerequisites are checked before any bus traffic.
        assert_eq!(stats.borrow().ops, 0);
    }

    #[test]
    fn multi_line_modes_need_a_capable_bus() {
        let chip = MockChip::<false>::new(pin(CS));
        let mut device =
            Sram23lc1024::with_bus(MockBank::new(), chip, CS, Some(HOLD), Some(SIO2))
                .unwrap();
        assert!(matches!(
            device.initialize(CommMode::Sdi),
            Err(SramError::ModeNotSupported)
        ));
        assert!(matches!(
            device.initialize(CommMode::Sqi),
            Err(SramError::ModeNotSupported)
        ));
        // Plain SPI still works on the same bus.
        device.initialize(CommMode::Spi).unwrap();
        assert!(device.is_idle());
    }

    // ── Addressing ───────────────────────────────────────────────────

    #[test]
    fn rejects_addresses_beyond_the_array_without_bus_traffic() {
        let (mut device, stats) = ready_device();
        let ops_before = stats.borrow().ops;
        assert!(matches!(
            device.start_read(MAX_ADDRESS + 1),
            Err(SramError::InvalidAddress)
        ));
        assert!(matches!(
            device.start_write(u32::MAX),
            Err(SramError::InvalidAddress)
        ));
        assert_eq!(stats.borrow().ops, ops_before);
        assert!(device.is_idle());
    }

    #[test]
    fn the_last_address_is_legal() {
        let (mut device, _) = ready_device();
        device.start_write(MAX_ADDRESS).unwrap();
        device.write_byte(0xAA).unwrap();
        device.stop().unwrap();

        device.start_read(MAX_ADDRESS).unwrap();
        assert_eq!(device.read_byte().unwrap(), 0xAA);
        device.stop().unwrap();
    }

    // ── Data round trips ─────────────────────────────────────────────

    #[test]
    fn bytes_written_read_back() {
        let (mut device, _) = ready_device();
        device.start_write(0x1234).unwrap();
        for value in [0xDEu8, 0xAD, 0xBE, 0xEF] {
            device.write_byte(value).unwrap();
        }
        device.stop().unwrap();

        device.start_read(0x1234).unwrap();
        for expected in [0xDEu8, 0xAD, 0xBE, 0xEF] {
            assert_eq!(device.read_byte().unwrap(), expected);
        }
        device.stop().unwrap();
    }

    #[test]
    fn bulk_transfers_round_trip() {
        let (mut device, _) = ready_device();
        let payload = b"sequential mode streams";
        device.start_write(0x00F0).unwrap();
        device.write_all(payload).unwrap();
        device.stop().unwrap();

        let mut buf = [0u8; 23];
        device.start_read(0x00F0).unwrap();
        device.read_into(&mut buf).unwrap();
        device.stop().unwrap();
        assert_eq!(&buf, payload);
    }

    #[test]
    fn cursor_wraps_past_the_end_of_the_array() {
        let (mut device, _) = ready_device();
        device.start_write(MAX_ADDRESS).unwrap();
        device.write_all(&[0x11, 0x22]).unwrap();
        assert_eq!(device.last_address(), Some(0));
        assert_eq!(device.next_address(), Some(1));
        device.stop().unwrap();

        device.start_read(0).unwrap();
        assert_eq!(device.read_byte().unwrap(), 0x22);
        device.stop().unwrap();
        device.start_read(MAX_ADDRESS).unwrap();
        assert_eq!(device.read_byte().unwrap(), 0x11);
        device.stop().unwrap();
    }

    #[test]
    fn zero_length_transfers_are_no_ops() {
        let (mut device, stats) = ready_device();
        device.start_read(0).unwrap();
        let ops_before = stats.borrow().ops;
        device.read_into(&mut []).unwrap();
        assert_eq!(stats.borrow().ops, ops_before);
        assert_eq!(device.next_address(), Some(0));
        device.stop().unwrap();

        device.start_write(0).unwrap();
        let ops_before = stats.borrow().ops;
        device.write_all(&[]).unwrap();
        assert_eq!(stats.borrow().ops, ops_before);
        device.stop().unwrap();
    }

    #[test]
    fn cursor_tracks_session_start_and_streamed_bytes() {
        let (mut device, _) = ready_device();
        assert_eq!(device.next_address(), None);
        assert_eq!(device.last_address(), None);

        device.start_read(5).unwrap();
        assert_eq!(device.next_address(), Some(5));
        assert_eq!(device.last_address(), None);

        device.read_byte().unwrap();
        assert_eq!(device.next_address(), Some(6));
        assert_eq!(device.last_address(), Some(5));
        device.stop().unwrap();
    }

    // ── State machine guards ─────────────────────────────────────────

    #[test]
    fn sessions_do_not_overlap() {
        let (mut device, _) = ready_device();
        device.start_write(0x10).unwrap();
        assert!(matches!(device.start_read(0x20), Err(SramError::Busy)));
        assert!(matches!(device.start_write(0x20), Err(SramError::Busy)));

        // The open write session is undisturbed.
        assert!(device.is_writing());
        device.write_byte(0x42).unwrap();
        device.stop().unwrap();
        device.start_read(0x10).unwrap();
        assert_eq!(device.read_byte().unwrap(), 0x42);
        device.stop().unwrap();
    }

    #[test]
    fn byte_direction_must_match_the_session() {
        let (mut device, _) = ready_device();
        device.start_write(0).unwrap();
        assert!(matches!(device.read_byte(), Err(SramError::NotReading)));
        device.stop().unwrap();

        device.start_read(0).unwrap();
        assert!(matches!(
            device.write_byte(0x00),
            Err(SramError::NotWriting)
        ));
        device.stop().unwrap();
    }

    #[test]
    fn data_operations_require_an_open_session() {
        let (mut device, _) = ready_device();
        assert!(matches!(device.read_byte(), Err(SramError::Idle)));
        assert!(matches!(device.write_byte(0), Err(SramError::Idle)));
        assert!(matches!(device.stop(), Err(SramError::Idle)));
    }

    // ── Hold ─────────────────────────────────────────────────────────

    #[test]
    fn hold_requires_a_configured_pin() {
        let (mut device, _) = new_device(None, None);
        device.initialize(CommMode::Spi).unwrap();
        assert!(matches!(device.hold(), Err(SramError::HoldNotDefined)));
        assert!(matches!(device.release(), Err(SramError::HoldNotDefined)));
        assert!(device.is_idle());
    }

    #[test]
    fn hold_and_release_cycle() {
        let (mut device, _) = ready_device();
        device.hold().unwrap();
        assert!(device.is_held());
        assert!(!device.is_idle());

        // Everything but release is refused while held.
        assert!(matches!(device.start_read(0), Err(SramError::Held)));
        assert!(matches!(device.read_byte(), Err(SramError::Held)));
        assert!(matches!(device.stop(), Err(SramError::Held)));
        assert!(matches!(device.hold(), Err(SramError::Held)));

        device.release().unwrap();
        assert!(device.is_idle());
        assert!(matches!(device.release(), Err(SramError::NotHeld)));
    }

    #[test]
    fn hold_preserves_the_address_cursor() {
        let (mut device, _) = ready_device();
        device.start_read(0x40).unwrap();
        device.read_byte().unwrap();
        device.stop().unwrap();

        device.hold().unwrap();
        device.release().unwrap();
        assert_eq!(device.next_address(), Some(0x41));
        assert_eq!(device.last_address(), Some(0x40));
    }

    #[test]
    fn hold_is_refused_during_a_session() {
        let (mut device, _) = ready_device();
        device.start_write(0).unwrap();
        assert!(matches!(device.hold(), Err(SramError::Busy)));
        assert!(device.is_writing());
        device.stop().unwrap();
    }

    #[test]
    fn hold_is_not_available_in_quad_mode() {
        let (mut device, _) = new_device(Some(HOLD), Some(SIO2));
        device.initialize(CommMode::Sqi).unwrap();
        assert!(matches!(device.hold(), Err(SramError::HoldNotAvailable)));
        assert!(device.is_idle());
    }
}
