// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Regulator fault and link-down handling.
//!
//! Notifications arrive in whatever context the regulator or link driver
//! calls us from, possibly in the middle of a transition. They must not take
//! the sequencer lock or call into the sequencer, so all we do here is:
//!
//! - post the event into a lock-free queue, drained by the emergency task for
//!   the trace;
//! - raise the pending-fault flag, which changes how the link is next
//!   suspended;
//! - if the event is fatal and the module is powered, ask the [`Scheduler`] to
//!   run the emergency shutdown, unless one is already queued.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use enum_map::EnumMap;
use heapless::mpmc::Q8;

use crate::hw::Scheduler;
use crate::resources::Rail;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegulatorEvent {
    /// The regulator's output has failed.
    Failure,
    OverCurrent,
    UnderVoltage,
    OverTemperature,
}

impl RegulatorEvent {
    pub fn is_fatal(self) -> bool {
        matches!(self, RegulatorEvent::Failure)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FaultEvent {
    Regulator(Rail, RegulatorEvent),
    LinkDown,
}

/// Work the sequencer asks the board to run later.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Work {
    /// Force the module to S4 and report a power error.
    EmergencyShutdown,
}

pub struct FaultMonitor<S> {
    scheduler: S,
    pending_fault: AtomicBool,
    shutdown_queued: AtomicBool,
    events: Q8<FaultEvent>,
    dropped: AtomicU32,
    rail_failures: EnumMap<Rail, AtomicU32>,
    link_downs: AtomicU32,
}

impl<S: Scheduler> FaultMonitor<S> {
    pub fn new(scheduler: S) -> Self {
        Self {
            scheduler,
            pending_fault: AtomicBool::new(false),
            shutdown_queued: AtomicBool::new(false),
            events: Q8::new(),
            dropped: AtomicU32::new(0),
            rail_failures: EnumMap::default(),
            link_downs: AtomicU32::new(0),
        }
    }

    /// Records `event`. `powered` says whether the module currently has (or is
    /// getting) power; a regulator failure on a module that is already off
    /// needs no shutdown. Link-down always escalates.
    ///
    /// Returns `true` if this call scheduled the emergency shutdown.
    pub fn post(&self, event: FaultEvent, powered: bool) -> bool {
        if self.events.enqueue(event).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }

        let escalate = match event {
            FaultEvent::LinkDown => {
                self.link_downs.fetch_add(1, Ordering::Relaxed);
                true
            }
            FaultEvent::Regulator(rail, ev) if ev.is_fatal() => {
                self.rail_failures[rail].fetch_add(1, Ordering::Relaxed);
                powered
            }
            FaultEvent::Regulator(..) => return false,
        };

        self.pending_fault.store(true, Ordering::Release);

        if escalate {
            self.schedule_shutdown()
        } else {
            false
        }
    }

    fn schedule_shutdown(&self) -> bool {
        if self.shutdown_queued.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.scheduler.defer(Work::EmergencyShutdown);
        true
    }

    /// Called as the emergency task starts, so that a fault arriving while it
    /// runs schedules another pass.
    pub(crate) fn begin_shutdown(&self) {
        self.shutdown_queued.store(false, Ordering::Release);
    }

    pub fn is_pending(&self) -> bool {
        self.pending_fault.load(Ordering::Acquire)
    }

    pub fn is_shutdown_queued(&self) -> bool {
        self.shutdown_queued.load(Ordering::Acquire)
    }

    pub(crate) fn pending_flag(&self) -> &AtomicBool {
        &self.pending_fault
    }

    /// Takes queued events, oldest first.
    pub(crate) fn drain(&self) -> impl Iterator<Item = FaultEvent> + '_ {
        core::iter::from_fn(move || self.events.dequeue())
    }

    /// Returns and resets the number of events lost to a full queue.
    pub(crate) fn take_dropped(&self) -> u32 {
        self.dropped.swap(0, Ordering::Relaxed)
    }

    pub fn rail_failures(&self, rail: Rail) -> u32 {
        self.rail_failures[rail].load(Ordering::Relaxed)
    }

    pub fn link_downs(&self) -> u32 {
        self.link_downs.load(Ordering::Relaxed)
    }
}
