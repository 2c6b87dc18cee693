//! Error types for the SRAM driver.

use core::fmt;

/// Errors that can occur when talking to the SRAM.
///
/// `E` is the error type of the underlying bus implementation; the
/// bit-banged bus is infallible, hardware SPI carries the HAL's error.
/// Every other variant is produced by the driver itself before or after
/// bus traffic, and apart from bus-level conditions none of them is
/// worth retrying: they indicate a wiring or sequencing mistake the
/// caller has to fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SramError<E> {
    /// Underlying bus error.
    Bus(E),

    /// A pin number handed to a constructor is not a pin on this board.
    InvalidPin,

    /// Address beyond the end of the array.
    InvalidAddress,

    /// The mode register probe did not behave like a 23LC1024; the chip
    /// is absent, miswired, or not powered.
    CommCheckFailed,

    /// `initialize` has not completed successfully.
    NotInitialized,

    /// Dual or quad operation requested on a bus that can only drive a
    /// single data line.
    ModeNotSupported,

    /// The hold line doubles as a data line in quad mode, so holding is
    /// not possible there.
    HoldNotAvailable,

    /// No hold pin was configured at construction.
    HoldNotDefined,

    /// No SIO2 pin was configured at construction, so quad mode cannot
    /// be entered.
    Sio2NotDefined,

    /// A read or write session is already open.
    Busy,

    /// The device is held.
    Held,

    /// No session is open.
    Idle,

    /// `release` called while not held.
    NotHeld,

    /// Byte read attempted outside a read session.
    NotReading,

    /// Byte write attempted outside a write session.
    NotWriting,
}

// Allow ergonomic `?` propagation from raw bus errors.
impl<E> From<E> for SramError<E> {
    fn from(error: E) -> Self {
        SramError::Bus(error)
    }
}

impl<E: fmt::Debug> fmt::Display for SramError<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SramError::Bus(e) => write!(f, "Bus error: {:?}", e),
            SramError::InvalidPin => write!(f, "Invalid pin assignment"),
            SramError::InvalidAddress => write!(f, "Address beyond end of array"),
            SramError::CommCheckFailed => write!(f, "Communication check failed"),
            SramError::NotInitialized => write!(f, "Device not initialized"),
            SramError::ModeNotSupported => write!(f, "Bus cannot drive this line mode"),
            SramError::HoldNotAvailable => write!(f, "Hold is not available in quad mode"),
            SramError::HoldNotDefined => write!(f, "No hold pin configured"),
            SramError::Sio2NotDefined => write!(f, "No SIO2 pin configured"),
            SramError::Busy => write!(f, "A session is already open"),
            SramError::Held => write!(f, "Device is held"),
            SramError::Idle => write!(f, "No session is open"),
            SramError::NotHeld => write!(f, "Device is not held"),
            SramError::NotReading => write!(f, "Not in a read session"),
            SramError::NotWriting => write!(f, "Not in a write session"),
        }
    }
}

#[cfg(feature = "defmt")]
impl<E: defmt::Format> defmt::Format for SramError<E> {
    fn format(&self, f: defmt::Formatter) {
        match self {
            SramError::Bus(e) => defmt::write!(f, "Bus error: {}", e),
            SramError::InvalidPin => defmt::write!(f, "Invalid pin assignment"),
            SramError::InvalidAddress => defmt::write!(f, "Address beyond end of array"),
            SramError::CommCheckFailed => defmt::write!(f, "Communication check failed"),
            SramError::NotInitialized => defmt::write!(f, "Device not initialized"),
            SramError::ModeNotSupported => defmt::write!(f, "Bus cannot drive this line mode"),
            SramError::HoldNotAvailable => defmt::write!(f, "Hold is not available in quad mode"),
            SramError::HoldNotDefined => defmt::write!(f, "No hold pin configured"),
            SramError::Sio2NotDefined => defmt::write!(f, "No SIO2 pin configured"),
            SramError::Busy => defmt::write!(f, "A session is already open"),
            SramError::Held => defmt::write!(f, "Device is held"),
            SramError::Idle => defmt::write!(f, "No session is open"),
            SramError::NotHeld => defmt::write!(f, "Device is not held"),
            SramError::NotReading => defmt::write!(f, "Not in a read session"),
            SramError::NotWriting => defmt::write!(f, "Not in a write session"),
        }
    }
}
