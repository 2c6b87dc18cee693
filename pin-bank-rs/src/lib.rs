//! Numbered-pin GPIO access for RP2350 peripheral drivers.
//!
//! This crate provides the thin layer that the driver crates in this
//! repository share when they need to touch GPIO by pin number:
//!
//! - [`PinId`] - a validated pin identifier. Construction from a raw `u8`
//!   fails for numbers outside the board's GPIO bank, so a bad pin
//!   assignment is rejected when a driver is built, not on first use.
//! - [`GpioBank`] - the actuation trait (direction, level write, level
//!   read). Board support code implements it over the real GPIO block;
//!   the [`mock`] module implements it for host-side tests.
//! - [`wait_for_high`] / [`wait_for_low`] - blocking level waits with an
//!   optional timeout, for peripherals that signal readiness on a pin.
//!
//! # Crate Features
//!
//! - **`defmt`** - `defmt::Format` implementations on the public types.
//! - **`mock`** - the [`mock`] test double, for dependent crates' tests.

#![cfg_attr(not(test), no_std)]

pub use bank::{Direction, GpioBank};
pub use pin::{is_pin, PinError, PinId, MAX_PIN, PIN_COUNT};
pub use wait::{wait_for_high, wait_for_level, wait_for_low, WaitError};

mod bank;
mod pin;
mod wait;

#[cfg(any(test, feature = "mock"))]
pub mod mock;
