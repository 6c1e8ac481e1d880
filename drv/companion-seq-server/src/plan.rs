// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transition table.
//!
//! Which procedure runs depends only on the `(from, to)` pair, and what each
//! procedure touches depends only on the procedure. Keeping both here lets the
//! whole table be checked without any hardware.

use drv_companion_seq_api::PowerState;

use crate::resources::{ClockId, Rail};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Procedure {
    /// Any state to S0.
    PowerUp { from: PowerState },
    /// Any state to S1.
    Partial,
    /// Any state to S3.
    Suspend,
    /// Any state to S4.
    PowerDown,
}

/// Returns the procedure taking the module from `from` to `to`, or `None` if
/// they are the same state.
pub fn plan(from: PowerState, to: PowerState) -> Option<Procedure> {
    use PowerState::*;

    match (from, to) {
        (a, b) if a == b => None,
        (from, S0) => Some(Procedure::PowerUp { from }),
        (_, S1) => Some(Procedure::Partial),
        (_, S3) => Some(Procedure::Suspend),
        (_, S4) => Some(Procedure::PowerDown),
    }
}

const UP_RAILS: [Rail; 4] =
    [Rail::DramIo, Rail::DramCore, Rail::SocCore, Rail::Retention];

/// Clocks in enable order; they are disabled in reverse.
pub const CLOCK_ORDER: [ClockId; 2] = [ClockId::Reference, ClockId::Sleep];

/// Rails disabled for partial retention.
pub const PARTIAL_RAILS: [Rail; 2] = [Rail::DramCore, Rail::DramIo];

/// Rails disabled on suspend. Retention stays up.
pub const SUSPEND_RAILS: [Rail; 3] =
    [Rail::SocCore, Rail::DramCore, Rail::DramIo];

/// Rails disabled on power down: the exact reverse of a power up from S4.
pub const DOWN_RAILS: [Rail; 4] =
    [Rail::Retention, Rail::SocCore, Rail::DramCore, Rail::DramIo];

/// Rails enabled on the way to S0. Retention is only cycled from S4; in every
/// other state it is already up.
pub fn up_rails(from: PowerState) -> &'static [Rail] {
    if from == PowerState::S4 {
        &UP_RAILS
    } else {
        &UP_RAILS[..3]
    }
}

/// Rails that the power-down sequence of `proc` disables, in order.
pub fn down_rails(proc: Procedure) -> &'static [Rail] {
    match proc {
        Procedure::Partial => &PARTIAL_RAILS,
        Procedure::Suspend => &SUSPEND_RAILS,
        Procedure::PowerDown => &DOWN_RAILS,
        Procedure::PowerUp { .. } => &[],
    }
}
