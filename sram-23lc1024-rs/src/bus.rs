//! The byte-transfer seam between the driver and its bus backends.
//!
//! The driver does not care how bytes reach the chip, only that a
//! backend can move them, recover the chip's line mode, and (for the
//! bit-banged backend) widen the data path. Two backends are provided:
//! [`HwSpi`] over any `embedded-hal` SPI peripheral, and the bit-banged
//! [`SoftSpi`] master from the `soft-spi` crate.

use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiBus;
use pin_bank::{GpioBank, PinId};
use soft_spi::{LineWidth, SoftSpi};

use crate::registers;

/// Byte transfer for the SRAM driver.
///
/// Every method borrows the GPIO bank because the bit-banged backend
/// toggles its lines through it; the chip-select line itself stays with
/// the driver, which brackets each transaction around these calls.
pub trait SerialBus<G: GpioBank> {
    type Error;

    /// Whether the backend can drive dual and quad data phases. The
    /// driver refuses multi-line modes on backends that report `false`
    /// and never calls [`set_width`](SerialBus::set_width) with a wider
    /// width on them.
    const SUPPORTS_MULTI_LINE: bool;

    /// Claim the bus lines and drive them to their idle levels. Called
    /// once per `initialize`.
    fn configure(&mut self, gpio: &mut G) -> Result<(), Self::Error>;

    /// Return the chip to single-bit SPI regardless of the line mode it
    /// was left in by a previous run, cycling `cs` around the recovery
    /// clocks. `aux` lists extra data lines (hold, SIO2) that must be
    /// held high while the recovery clocks run.
    fn reset_lines(&mut self, gpio: &mut G, cs: PinId, aux: &[PinId])
        -> Result<(), Self::Error>;

    /// Switch the data-line width.
    fn set_width(&mut self, gpio: &mut G, width: LineWidth) -> Result<(), Self::Error>;

    /// Clock a buffer out at the current width.
    fn write(&mut self, gpio: &mut G, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Clock a buffer in at the current width.
    fn read(&mut self, gpio: &mut G, buf: &mut [u8]) -> Result<(), Self::Error>;
}

/// Backend over a hardware SPI peripheral.
///
/// The HAL owns clock and data pin muxing; only chip-select (and hold,
/// if wired) go through the GPIO bank. Hardware SPI blocks drive a
/// single data line, so dual and quad modes are not available on this
/// backend.
pub struct HwSpi<SPI> {
    spi: SPI,
}

impl<SPI> HwSpi<SPI> {
    pub fn new(spi: SPI) -> Self {
        HwSpi { spi }
    }
}

impl<G, SPI> SerialBus<G> for HwSpi<SPI>
where
    G: GpioBank,
    SPI: SpiBus,
{
    type Error = SPI::Error;

    const SUPPORTS_MULTI_LINE: bool = false;

    fn configure(&mut self, _gpio: &mut G) -> Result<(), Self::Error> {
        // Pin muxing and clocking already belong to the HAL peripheral.
        Ok(())
    }

    fn reset_lines(
        &mut self,
        gpio: &mut G,
        cs: PinId,
        _aux: &[PinId],
    ) -> Result<(), Self::Error> {
        // A single RSTIO byte is all ones on every data line, so it is
        // understood in any line mode the chip might be stuck in.
        gpio.write(cs, false);
        let result = self
            .spi
            .write(&[registers::RSTIO])
            .and_then(|()| self.spi.flush());
        gpio.write(cs, true);
        result
    }

    fn set_width(&mut self, _gpio: &mut G, _width: LineWidth) -> Result<(), Self::Error> {
        // Only ever called with LineWidth::Single on this backend; the
        // driver gates wider widths on SUPPORTS_MULTI_LINE.
        Ok(())
    }

    fn write(&mut self, _gpio: &mut G, bytes: &[u8]) -> Result<(), Self::Error> {
        self.spi.write(bytes)?;
        self.spi.flush()
    }

    fn read(&mut self, _gpio: &mut G, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.spi.read(buf)?;
        self.spi.flush()
    }
}

impl<G, D> SerialBus<G> for SoftSpi<D>
where
    G: GpioBank,
    D: DelayNs,
{
    type Error = Infallible;

    const SUPPORTS_MULTI_LINE: bool = true;

    fn configure(&mut self, gpio: &mut G) -> Result<(), Self::Error> {
        self.initialize(gpio);
        Ok(())
    }

    fn reset_lines(
        &mut self,
        gpio: &mut G,
        cs: PinId,
        aux: &[PinId],
    ) -> Result<(), Self::Error> {
        // With every data input held high, two clocks step a chip out of
        // quad mode and four more step it out of dual mode; a chip
        // already in SPI mode ignores both bursts with cs cycled in
        // between.
        self.drive_data_high(gpio, aux);
        gpio.write(cs, false);
        self.pulse_clock(gpio, 2);
        gpio.write(cs, true);
        gpio.write(cs, false);
        self.pulse_clock(gpio, 4);
        gpio.write(cs, true);
        SoftSpi::set_width(self, gpio, LineWidth::Single);
        Ok(())
    }

    fn set_width(&mut self, gpio: &mut G, width: LineWidth) -> Result<(), Self::Error> {
        SoftSpi::set_width(self, gpio, width);
        Ok(())
    }

    fn write(&mut self, gpio: &mut G, bytes: &[u8]) -> Result<(), Self::Error> {
        SoftSpi::write(self, gpio, bytes);
        Ok(())
    }

    fn read(&mut self, gpio: &mut G, buf: &mut [u8]) -> Result<(), Self::Error> {
        SoftSpi::read(self, gpio, buf);
        Ok(())
    }
}
