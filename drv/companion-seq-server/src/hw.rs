// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interfaces to the hardware the sequencer drives.
//!
//! Everything here is implemented by the board: regulator and clock drivers,
//! the GPIO controller, the link's root-complex driver, and whatever runs
//! deferred work. The sequencer owns all of these exclusively once they are
//! handed to [`Sequencer::new`](crate::Sequencer::new).

use enum_map::EnumMap;

use crate::fault::Work;
use crate::link::{LinkSnapshot, PmOptions};
use crate::resources::{ClockId, Rail};

/// Error reported by a hardware collaborator, as a negative errno.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HwError(pub i32);

impl HwError {
    pub const IO: Self = Self(-5);
    pub const NO_DEVICE: Self = Self(-19);
    pub const NO_SPACE: Self = Self(-28);
    pub const TIMED_OUT: Self = Self(-110);
}

pub trait Regulator {
    fn enable(&mut self) -> Result<(), HwError>;
    fn disable(&mut self) -> Result<(), HwError>;
    fn is_enabled(&self) -> bool;

    /// Arms fault notifications for this rail. The board delivers them by
    /// calling [`Sequencer::regulator_event`].
    ///
    /// [`Sequencer::regulator_event`]: crate::Sequencer::regulator_event
    fn subscribe_fault(&mut self) -> Result<(), HwError>;
}

/// Input-supply monitor of the `SocCore` regulator. Queried without the
/// sequencer's transition lock held, so it must be usable through `&self`.
pub trait SupplyMonitor {
    /// Whether the input supply is above `microvolts`.
    fn supply_above(&self, microvolts: u32) -> bool;
}

pub trait Clock {
    fn enable(&mut self) -> Result<(), HwError>;
    fn disable(&mut self);
}

pub trait OutputPin {
    fn set(&mut self, high: bool) -> Result<(), HwError>;
}

/// The host side of the interconnect to the module.
pub trait Link {
    /// Trains the link and discovers the module's endpoint.
    fn enumerate(&mut self) -> Result<(), HwError>;
    /// Captures the endpoint's configuration.
    fn save_state(&mut self) -> Result<LinkSnapshot, HwError>;
    /// Loads `snapshot` into the endpoint and applies it.
    fn restore_state(&mut self, snapshot: &LinkSnapshot) -> Result<(), HwError>;

    /// Root-complex power control: take the link down.
    fn suspend(&mut self, options: PmOptions) -> Result<(), HwError>;
    /// Root-complex power control: retrain the link.
    fn resume(&mut self, options: PmOptions) -> Result<(), HwError>;

    /// Moves the endpoint to its low power mode ahead of a suspend.
    fn prepare_sleep(&mut self) -> Result<(), HwError>;
    /// Returns the endpoint to its active power mode.
    fn wake(&mut self) -> Result<(), HwError>;

    /// Quiesces the module's function driver.
    fn quiesce(&mut self) -> Result<(), HwError>;
    /// Restarts the module's function driver.
    fn activate(&mut self) -> Result<(), HwError>;

    fn assert_reset(&mut self) -> Result<(), HwError>;
    fn deassert_reset(&mut self) -> Result<(), HwError>;

    /// Arms link-down notifications. The board delivers them by calling
    /// [`Sequencer::link_down`](crate::Sequencer::link_down).
    fn subscribe_link_down(&mut self) -> Result<(), HwError>;
}

/// Busy-wait delay, used for hardware settling times.
pub trait Delay {
    fn delay_us(&mut self, us: u32);
}

/// Runs work outside of the context that requested it.
///
/// `defer` is called from notification context and must not block or run
/// `work` synchronously; the board's worker later hands `work` back to
/// [`Sequencer::run`](crate::Sequencer::run).
pub trait Scheduler {
    fn defer(&self, work: Work);
}

/// Told when the module had to be shut down because of a fault.
pub trait PowerErrorSink {
    fn power_error(&self);
}

/// Bundles the concrete collaborator types for one board.
pub trait Platform {
    type Regulator: Regulator;
    type Clock: Clock;
    type Pin: OutputPin;
    type Link: Link;
    type Delay: Delay;
    type Supply: SupplyMonitor;
    type Scheduler: Scheduler;
    type ErrorSink: PowerErrorSink;
}

/// The resources handed over to the sequencer at construction.
pub struct Hardware<P: Platform> {
    pub rails: EnumMap<Rail, P::Regulator>,
    pub clocks: EnumMap<ClockId, P::Clock>,
    pub power_good: P::Pin,
    pub link: P::Link,
    pub delay: P::Delay,
    pub supply: P::Supply,
}
