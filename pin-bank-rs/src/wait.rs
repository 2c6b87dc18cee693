//! Blocking pin level waits with timeout.

use core::fmt;

use embedded_hal::delay::DelayNs;

use crate::bank::{Direction, GpioBank};
use crate::pin::PinId;

/// Errors from the level wait functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// The pin is configured as an output; waiting on it would never
    /// observe an external level change.
    InvalidDirection,
    /// The requested level did not appear within the timeout.
    Timeout,
}

impl fmt::Display for WaitError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WaitError::InvalidDirection => write!(f, "Pin is not configured as an input"),
            WaitError::Timeout => write!(f, "Timed out waiting for pin level"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for WaitError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            WaitError::InvalidDirection => defmt::write!(f, "Pin is not configured as an input"),
            WaitError::Timeout => defmt::write!(f, "Timed out waiting for pin level"),
        }
    }
}

/// Busy-wait until an input pin reads `level`, or until `timeout_us`
/// microseconds have elapsed.
///
/// A `timeout_us` of 0 blocks indefinitely. If the pin already reads
/// `level` the function returns immediately with an elapsed time of 0.
///
/// The wait polls in 1 µs delay steps, so the returned elapsed time is
/// the number of polls taken, an approximation of microseconds rather
/// than a timer capture.
///
/// # Errors
/// * [`WaitError::InvalidDirection`] if the pin is configured as an output.
/// * [`WaitError::Timeout`] if the level did not appear in time.
pub fn wait_for_level<G, D>(
    gpio: &mut G,
    delay: &mut D,
    pin: PinId,
    level: bool,
    timeout_us: u32,
) -> Result<u32, WaitError>
where
    G: GpioBank,
    D: DelayNs,
{
    if gpio.direction(pin) == Direction::Output {
        return Err(WaitError::InvalidDirection);
    }

    let mut elapsed_us: u32 = 0;
    loop {
        if gpio.read(pin) == level {
            return Ok(elapsed_us);
        }
        if timeout_us != 0 && elapsed_us >= timeout_us {
            return Err(WaitError::Timeout);
        }
        delay.delay_us(1);
        elapsed_us = elapsed_us.saturating_add(1);
    }
}

/// Wait until an input pin reads high. See [`wait_for_level`].
pub fn wait_for_high<G: GpioBank, D: DelayNs>(
    gpio: &mut G,
    delay: &mut D,
    pin: PinId,
    timeout_us: u32,
) -> Result<u32, WaitError> {
    wait_for_level(gpio, delay, pin, true, timeout_us)
}

/// Wait until an input pin reads low. See [`wait_for_level`].
pub fn wait_for_low<G: GpioBank, D: DelayNs>(
    gpio: &mut G,
    delay: &mut D,
    pin: PinId,
    timeout_us: u32,
) -> Result<u32, WaitError> {
    wait_for_level(gpio, delay, pin, false, timeout_us)
}
