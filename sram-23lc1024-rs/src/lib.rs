//! Blocking driver for the Microchip 23LC1024 serial SRAM.
//!
//! The 23LC1024 is a 128 KiB byte-addressable SRAM behind an SPI-style
//! interface with optional dual (SDI) and quad (SQI) data-line modes and
//! a hold line for parking the chip on a shared bus.
//!
//! # Architecture
//!
//! The crate is split into three layers:
//!
//! - **[`registers`]** - the chip's instruction set, address constants
//!   and mode register layout.
//! - **[`SerialBus`]** (with the [`HwSpi`] backend here and the
//!   bit-banged backend from the `soft-spi` crate) - moving bytes over
//!   the wire.
//! - **[`Sram23lc1024`]** - validated, stateful API: construction-time
//!   pin checks, the communication self-check, session management and
//!   the hold line.
//!
//! Everything is synchronous and blocking; GPIO is reached by pin number
//! through the `pin-bank` crate, which is what lets the bit-banged
//! backend repurpose data lines at run time for the wider modes.
//!
//! # Quick start
//!
//! ```no_run
//! use sram_23lc1024::{CommMode, Sram23lc1024};
//!
//! # fn demo<G, SPI>(gpio: G, spi: SPI)
//! # where
//! #     G: pin_bank::GpioBank,
//! #     SPI: embedded_hal::spi::SpiBus,
//! #     SPI::Error: core::fmt::Debug,
//! # {
//! // Hardware SPI peripheral, chip select on GPIO 5.
//! let mut sram = Sram23lc1024::new(gpio, spi, 5).unwrap();
//! sram.initialize(CommMode::Spi).unwrap();
//!
//! sram.start_write(0).unwrap();
//! sram.write_byte(0x42).unwrap();
//! sram.stop().unwrap();
//! # }
//! ```
//!
//! # Crate Features
//!
//! - **`defmt`** - `defmt::Format` implementations on errors and public
//!   types, for embedded logging.

#![cfg_attr(not(test), no_std)]

pub use bus::{HwSpi, SerialBus};
pub use error::SramError;
pub use registers::{CAPACITY, MAX_ADDRESS};
pub use sram::{CommMode, Sram23lc1024};

mod bus;
mod error;
pub mod registers;
mod sram;
