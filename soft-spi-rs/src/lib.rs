//! Bit-banged SPI master over a numbered GPIO bank.
//!
//! [`SoftSpi`] drives a clock and data lines through software pin
//! toggling, for boards or pin assignments where a hardware SPI block is
//! not available. It supports the four standard clock modes and both bit
//! orders in single-bit operation, and can additionally clock two or four
//! data lines at once for peripherals with dual (SIO0/SIO1) and quad
//! (SIO0..SIO3) interfaces, switching line directions between write and
//! read phases.
//!
//! All operations are blocking and run to completion on the calling
//! thread; the inter-edge delay is driven through
//! [`embedded_hal::delay::DelayNs`].
//!
//! # Quick start
//!
//! ```no_run
//! use soft_spi::{Config, SoftSpi};
//! use pin_bank::PinId;
//!
//! # fn demo<G: pin_bank::GpioBank, D: embedded_hal::delay::DelayNs>(gpio: &mut G, delay: D) {
//! let sck = PinId::new(2).unwrap();
//! let miso = PinId::new(4).unwrap();
//! let mosi = PinId::new(3).unwrap();
//!
//! let mut spi = SoftSpi::new(sck, miso, mosi, delay, Config::default());
//! spi.initialize(gpio);
//! let echoed = spi.transfer(gpio, 0xA5);
//! # let _ = echoed;
//! # }
//! ```
//!
//! # Crate Features
//!
//! - **`defmt`** - `defmt::Format` implementations on the public types.

#![cfg_attr(not(test), no_std)]

pub use config::{BitOrder, Config, Mode};
pub use master::{LineWidth, SoftSpi};

mod config;
mod master;
