//! Host-side test doubles for [`GpioBank`] and the delay source.
//!
//! Used by the unit tests of this crate and, through the `mock` feature,
//! by the tests of the bus and driver crates built on top of it.

use embedded_hal::delay::DelayNs;

use crate::bank::{Direction, GpioBank};
use crate::pin::{PinId, PIN_COUNT};

/// In-memory GPIO bank.
///
/// Tracks the level and direction of every pin plus a per-pin count of
/// level transitions, which lets tests assert on waveform shape (a clock
/// pin toggles twice per bit) and on whether a pin was touched at all.
///
/// Two hooks simulate the world outside the bank:
///
/// - [`drive`](MockBank::drive) forces a level onto a line, standing in
///   for an external device driving an input pin.
/// - [`tie`](MockBank::tie) mirrors every write of one pin onto another,
///   which wires a controller's data-out line back into its data-in line
///   for loopback tests.
pub struct MockBank {
    levels: [bool; PIN_COUNT as usize],
    directions: [Direction; PIN_COUNT as usize],
    toggles: [u32; PIN_COUNT as usize],
    tie: Option<(PinId, PinId)>,
}

impl MockBank {
    pub fn new() -> Self {
        MockBank {
            levels: [false; PIN_COUNT as usize],
            directions: [Direction::Input; PIN_COUNT as usize],
            toggles: [0; PIN_COUNT as usize],
            tie: None,
        }
    }

    /// Mirror every write of `from` onto the level of `to`.
    pub fn tie(&mut self, from: PinId, to: PinId) {
        self.tie = Some((from, to));
    }

    /// Force a level onto a line, as an external device would.
    ///
    /// Does not count toward the pin's toggle count; only writes made
    /// through [`GpioBank::write`] do.
    pub fn drive(&mut self, pin: PinId, high: bool) {
        self.levels[pin.number() as usize] = high;
    }

    /// Current level of a pin.
    pub fn level(&self, pin: PinId) -> bool {
        self.levels[pin.number() as usize]
    }

    /// Number of level transitions written through [`GpioBank::write`].
    pub fn toggle_count(&self, pin: PinId) -> u32 {
        self.toggles[pin.number() as usize]
    }
}

impl Default for MockBank {
    fn default() -> Self {
        Self::new()
    }
}

impl GpioBank for MockBank {
    fn set_direction(&mut self, pin: PinId, direction: Direction) {
        self.directions[pin.number() as usize] = direction;
    }

    fn direction(&self, pin: PinId) -> Direction {
        self.directions[pin.number() as usize]
    }

    fn write(&mut self, pin: PinId, high: bool) {
        let idx = pin.number() as usize;
        if self.levels[idx] != high {
            self.toggles[idx] += 1;
        }
        self.levels[idx] = high;
        if let Some((from, to)) = self.tie {
            if from == pin {
                self.levels[to.number() as usize] = high;
            }
        }
    }

    fn read(&mut self, pin: PinId) -> bool {
        self.levels[pin.number() as usize]
    }
}

/// Delay source that only records how long it was asked to wait.
pub struct MockDelay {
    elapsed_ns: u64,
}

impl MockDelay {
    pub fn new() -> Self {
        MockDelay { elapsed_ns: 0 }
    }

    /// Total delay requested so far, in nanoseconds.
    pub fn elapsed_ns(&self) -> u64 {
        self.elapsed_ns
    }
}

impl Default for MockDelay {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += u64::from(ns);
    }
}
