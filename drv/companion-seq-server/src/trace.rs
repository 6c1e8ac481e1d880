// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use drv_companion_seq_api::{PowerState, StateChangeReason};
use ringbuf::Ringbuf;

use crate::fault::FaultEvent;
use crate::hw::HwError;
use crate::link::LinkStep;
use crate::resources::{ClockId, Rail};
use crate::unwind::Action;

pub(crate) const TRACE_DEPTH: usize = 64;

pub(crate) type TraceBuf = Ringbuf<Trace, TRACE_DEPTH>;

pub(crate) fn new_trace() -> TraceBuf {
    Ringbuf::new(Trace::None)
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum Trace {
    None,
    Ready,
    SetState {
        from: PowerState,
        to: PowerState,
        reason: StateChangeReason,
    },
    NoChange(PowerState),
    RailOn(Rail),
    RailOff(Rail),
    RailEnableFailed(Rail, HwError),
    RailDisableFailed(Rail, HwError),
    ClockOn(ClockId),
    ClockOff(ClockId),
    ClockEnableFailed(ClockId, HwError),
    PowerGood(bool),
    PowerGoodFailed(bool, HwError),
    PllSettle(u32),
    Link(LinkStep),
    LinkFailed(LinkStep, HwError),
    LinkWarning(LinkStep, HwError),
    Unwind(Action),
    UnwindFailed(Action, HwError),
    ForcingOff,
    Fault(FaultEvent),
    FaultsDropped(u32),
    EmergencyShutdown,
    Reached(PowerState),
    Failed {
        to: PowerState,
        code: HwError,
    },
}
