// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Power sequencer for the companion compute module.
//!
//! The module hangs off the host by four rails, two clocks, a power-good pin
//! and a PCIe-class link. This crate moves it between the power states of
//! [`PowerState`], driving those resources in a fixed order:
//!
//! ```text
//!          power up (any -> S0)
//!   DramIo, DramCore, SocCore, [Retention, from S4 only]
//!   -> Reference clock, Sleep clock -> power-good -> PLL settle -> link up
//!
//!          suspend (-> S3) / power down (-> S4)
//!   park link (or hold reset) -> power-good low -> Sleep, Reference clock
//!   -> [Retention, S4 only], SocCore, DramCore, DramIo
//! ```
//!
//! A power up that fails part way is unwound in reverse, undoing only what
//! that call changed; if the module was not already off, the power-down
//! sequence then runs as well. Any failed transition leaves the module off
//! and reported as `S4`.
//!
//! Regulator failures and link-down events arrive asynchronously through
//! [`Sequencer::regulator_event`] and [`Sequencer::link_down`]. These never
//! block; they queue an emergency shutdown with the board's
//! [`Scheduler`](hw::Scheduler), which later hands it back to
//! [`Sequencer::run`].

#![cfg_attr(not(test), no_std)]

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use drv_companion_seq_api::FromPrimitive;
use ringbuf::ringbuf_entry;

pub use drv_companion_seq_api::{
    HotplugEvent, PowerState, SeqError, StateChangeReason, Transition,
};

mod config;
mod fault;
mod hotplug;
pub mod hw;
mod link;
mod plan;
mod resources;
mod trace;
mod unwind;

pub use config::{BootMode, SeqConfig};
pub use fault::{FaultEvent, FaultMonitor, RegulatorEvent, Work};
pub use hotplug::{HotplugCallback, HotplugNotifier};
pub use link::{
    LinkSnapshot, LinkStatus, LinkStep, PmOptions, LINK_SNAPSHOT_MAX,
};
pub use plan::{plan, Procedure};
pub use resources::{ClockId, Rail};

use hw::{
    Delay, Hardware, HwError, Platform, PowerErrorSink, SupplyMonitor,
};
use link::LinkController;
use plan::{down_rails, up_rails, CLOCK_ORDER};
use resources::{Clocks, PowerGood, Rails};
use trace::{new_trace, Trace, TraceBuf};
use unwind::{Action, Applied};

pub struct Sequencer<P: Platform> {
    inner: spin::Mutex<Inner<P>>,
    /// Mirror of `Inner::current`, readable without the lock.
    state: AtomicU8,
    /// Set while a power up is running, so that a fault arriving before it
    /// completes still counts as the module being powered.
    powering_up: AtomicBool,
    monitor: FaultMonitor<P::Scheduler>,
    /// Not behind `inner`: queried without the transition lock.
    supply: P::Supply,
    error_sink: P::ErrorSink,
    config: SeqConfig,
}

struct Inner<P: Platform> {
    current: PowerState,
    rails: Rails<P::Regulator>,
    clocks: Clocks<P::Clock>,
    power_good: PowerGood<P::Pin>,
    link: LinkController<P::Link>,
    delay: P::Delay,
    trace: TraceBuf,
}

impl<P: Platform> Sequencer<P> {
    /// Takes ownership of the board's resources and arms fault
    /// notifications. The module starts out in `S4` with power-good low.
    pub fn new(
        config: SeqConfig,
        hw: Hardware<P>,
        scheduler: P::Scheduler,
        error_sink: P::ErrorSink,
    ) -> Result<Self, SeqError> {
        let mut rails = Rails::new(hw.rails);
        rails
            .subscribe_all()
            .map_err(|_| SeqError::ResourceUnavailable)?;
        let power_good = PowerGood::claim(hw.power_good)
            .map_err(|_| SeqError::ResourceUnavailable)?;

        let mut trace = new_trace();
        ringbuf_entry!(trace, Trace::Ready);

        Ok(Self {
            inner: spin::Mutex::new(Inner {
                current: PowerState::S4,
                rails,
                clocks: Clocks::new(hw.clocks),
                power_good,
                link: LinkController::new(hw.link),
                delay: hw.delay,
                trace,
            }),
            state: AtomicU8::new(PowerState::S4 as u8),
            powering_up: AtomicBool::new(false),
            monitor: FaultMonitor::new(scheduler),
            supply: hw.supply,
            error_sink,
            config,
        })
    }

    /// Powers the module up once, which enumerates the link and captures its
    /// configuration, then powers it back down.
    pub fn probe(&self) -> Result<(), SeqError> {
        self.set_state_with_reason(PowerState::S0, StateChangeReason::Probe)?;
        self.set_state_with_reason(PowerState::S4, StateChangeReason::Probe)?;
        Ok(())
    }

    pub fn get_state(&self) -> PowerState {
        PowerState::from_u8(self.state.load(Ordering::Acquire))
            .unwrap_or(PowerState::S4)
    }

    pub fn set_state(
        &self,
        target: PowerState,
    ) -> Result<Transition, SeqError> {
        self.set_state_with_reason(target, StateChangeReason::Other)
    }

    /// Integer form of [`Sequencer::set_state`]: 0 on success, otherwise a
    /// negative errno.
    pub fn set_state_raw(&self, raw: u32) -> i32 {
        match PowerState::try_from(raw).and_then(|s| self.set_state(s)) {
            Ok(_) => 0,
            Err(e) => e.errno(),
        }
    }

    pub fn set_state_with_reason(
        &self,
        target: PowerState,
        reason: StateChangeReason,
    ) -> Result<Transition, SeqError> {
        let mut inner = self.inner.lock();
        let from = inner.current;

        let Some(procedure) = plan(from, target) else {
            ringbuf_entry!(inner.trace, Trace::NoChange(from));
            return Ok(Transition::NoChange);
        };

        ringbuf_entry!(
            inner.trace,
            Trace::SetState {
                from,
                to: target,
                reason
            }
        );

        let pending = self.monitor.pending_flag();
        let r = match procedure {
            Procedure::PowerUp { from } => {
                self.powering_up.store(true, Ordering::Release);
                inner.power_up(from, &self.config, pending)
            }
            Procedure::Partial => {
                inner.partial();
                Ok(())
            }
            Procedure::Suspend | Procedure::PowerDown => {
                inner.power_down(procedure, pending)
            }
        };

        match r {
            Ok(()) => {
                self.publish(&mut inner, target);
                ringbuf_entry!(inner.trace, Trace::Reached(target));
                Ok(Transition::Done)
            }
            Err(code) => {
                ringbuf_entry!(inner.trace, Trace::Failed { to: target, code });
                self.publish(&mut inner, PowerState::S4);
                Err(SeqError::TransitionFailed)
            }
        }
    }

    fn publish(&self, inner: &mut Inner<P>, state: PowerState) {
        inner.current = state;
        self.state.store(state as u8, Ordering::Release);
        // Cleared only after the new state is visible to `is_powered`.
        self.powering_up.store(false, Ordering::Release);
    }

    fn is_powered(&self) -> bool {
        self.get_state() != PowerState::S4
            || self.powering_up.load(Ordering::Acquire)
    }

    /// Notification from the regulator of `rail`. Safe to call from any
    /// context, including during a transition. Returns `true` if this
    /// scheduled an emergency shutdown.
    pub fn regulator_event(&self, rail: Rail, event: RegulatorEvent) -> bool {
        self.monitor
            .post(FaultEvent::Regulator(rail, event), self.is_powered())
    }

    /// Notification that the link dropped. Returns `true` if this scheduled
    /// an emergency shutdown.
    pub fn link_down(&self) -> bool {
        self.monitor.post(FaultEvent::LinkDown, self.is_powered())
    }

    /// Runs work previously handed to the board's scheduler.
    pub fn run(&self, work: Work) {
        match work {
            Work::EmergencyShutdown => self.emergency_shutdown(),
        }
    }

    fn emergency_shutdown(&self) {
        self.monitor.begin_shutdown();

        {
            let mut inner = self.inner.lock();
            ringbuf_entry!(inner.trace, Trace::EmergencyShutdown);
            for event in self.monitor.drain() {
                ringbuf_entry!(inner.trace, Trace::Fault(event));
            }
            let dropped = self.monitor.take_dropped();
            if dropped != 0 {
                ringbuf_entry!(inner.trace, Trace::FaultsDropped(dropped));
            }
        }

        // Either way we end up in S4; a failure is already in the trace.
        let _ = self.set_state_with_reason(
            PowerState::S4,
            StateChangeReason::EmergencyShutdown,
        );
        self.error_sink.power_error();
    }

    /// Whether the module's input supply is high enough to power it.
    pub fn is_supply_voltage_safe(&self) -> bool {
        self.supply.supply_above(self.config.supply_safe_threshold_uv)
    }

    pub fn pending_fault(&self) -> bool {
        self.monitor.is_pending()
    }

    pub fn shutdown_queued(&self) -> bool {
        self.monitor.is_shutdown_queued()
    }

    pub fn rail_failures(&self, rail: Rail) -> u32 {
        self.monitor.rail_failures(rail)
    }

    pub fn link_downs(&self) -> u32 {
        self.monitor.link_downs()
    }

    pub fn link_status(&self) -> LinkStatus {
        self.inner.lock().link.status()
    }

    pub fn config(&self) -> &SeqConfig {
        &self.config
    }
}

impl<P: Platform> Inner<P> {
    fn power_up(
        &mut self,
        from: PowerState,
        config: &SeqConfig,
        pending: &AtomicBool,
    ) -> Result<(), HwError> {
        let mut applied = Applied::new();
        let r = self.power_up_steps(from, config, pending, &mut applied);
        if r.is_err() {
            self.unwind(applied);
            if from != PowerState::S4 {
                // Whatever was on before this call is still on, and we are
                // about to report S4.
                ringbuf_entry!(self.trace, Trace::ForcingOff);
                let _ = self.power_down(Procedure::PowerDown, pending);
            }
        }
        r
    }

    fn power_up_steps(
        &mut self,
        from: PowerState,
        config: &SeqConfig,
        pending: &AtomicBool,
        applied: &mut Applied,
    ) -> Result<(), HwError> {
        for &rail in up_rails(from) {
            match self.rails.enable(rail) {
                Ok(true) => {
                    ringbuf_entry!(self.trace, Trace::RailOn(rail));
                    applied.push(Action::RailEnabled(rail));
                }
                Ok(false) => (),
                Err(e) => {
                    ringbuf_entry!(
                        self.trace,
                        Trace::RailEnableFailed(rail, e)
                    );
                    return Err(e);
                }
            }
        }

        for id in CLOCK_ORDER {
            match self.clocks.enable(id) {
                Ok(true) => {
                    ringbuf_entry!(self.trace, Trace::ClockOn(id));
                    applied.push(Action::ClockEnabled(id));
                }
                Ok(false) => (),
                Err(e) => {
                    ringbuf_entry!(self.trace, Trace::ClockEnableFailed(id, e));
                    return Err(e);
                }
            }
        }

        let was_asserted = self.power_good.is_asserted();
        self.set_power_good(true)?;
        if !was_asserted {
            applied.push(Action::PowerGoodAsserted);
        }

        ringbuf_entry!(self.trace, Trace::PllSettle(config.pll_settle_us));
        self.delay.delay_us(config.pll_settle_us);

        let held = self.link.reset_asserted();
        let r = match config.boot_mode {
            BootMode::Link => self.link.bring_up(pending, &mut self.trace),
            BootMode::Standalone => {
                self.link.release_reset_standalone(&mut self.trace)
            }
        };
        if held && !self.link.reset_asserted() {
            applied.push(Action::ResetReleased);
        }
        r
    }

    fn unwind(&mut self, applied: Applied) {
        for action in applied.into_reverse() {
            let r = match action {
                Action::RailEnabled(rail) => self.rails.disable(rail).map(drop),
                Action::ClockEnabled(id) => {
                    self.clocks.disable(id);
                    Ok(())
                }
                Action::PowerGoodAsserted => self.power_good.set(false),
                Action::ResetReleased => self.link.hold_reset(&mut self.trace),
            };
            match r {
                Ok(()) => ringbuf_entry!(self.trace, Trace::Unwind(action)),
                Err(e) => {
                    ringbuf_entry!(self.trace, Trace::UnwindFailed(action, e))
                }
            }
        }
    }

    /// Drops the DRAM supplies. Nothing here can fail the transition.
    fn partial(&mut self) {
        for &rail in down_rails(Procedure::Partial) {
            let _ = self.disable_rail(rail);
        }
    }

    /// Suspend and power down. Every step is attempted even after one fails,
    /// so that as much as possible ends up off; the first error is returned.
    fn power_down(
        &mut self,
        procedure: Procedure,
        pending: &AtomicBool,
    ) -> Result<(), HwError> {
        let mut first = None;

        keep_first(&mut first, self.link.park(pending, &mut self.trace));
        keep_first(&mut first, self.set_power_good(false));

        for id in CLOCK_ORDER.into_iter().rev() {
            if self.clocks.disable(id) {
                ringbuf_entry!(self.trace, Trace::ClockOff(id));
            }
        }

        for &rail in down_rails(procedure) {
            keep_first(&mut first, self.disable_rail(rail));
        }

        match first {
            None => Ok(()),
            Some(e) => {
                if procedure == Procedure::Suspend {
                    // We're going to report S4, so retention goes too.
                    ringbuf_entry!(self.trace, Trace::ForcingOff);
                    let _ = self.disable_rail(Rail::Retention);
                }
                Err(e)
            }
        }
    }

    fn disable_rail(&mut self, rail: Rail) -> Result<(), HwError> {
        match self.rails.disable(rail) {
            Ok(true) => {
                ringbuf_entry!(self.trace, Trace::RailOff(rail));
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e) => {
                ringbuf_entry!(self.trace, Trace::RailDisableFailed(rail, e));
                Err(e)
            }
        }
    }

    fn set_power_good(&mut self, high: bool) -> Result<(), HwError> {
        match self.power_good.set(high) {
            Ok(()) => {
                ringbuf_entry!(self.trace, Trace::PowerGood(high));
                Ok(())
            }
            Err(e) => {
                ringbuf_entry!(self.trace, Trace::PowerGoodFailed(high, e));
                Err(e)
            }
        }
    }
}

fn keep_first(first: &mut Option<HwError>, r: Result<(), HwError>) {
    if let Err(e) = r {
        first.get_or_insert(e);
    }
}
