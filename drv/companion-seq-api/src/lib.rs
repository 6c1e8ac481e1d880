// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! API types for the companion module power sequencer.
//!
//! These are the types callers of the sequencer see: the power states, the
//! result of a transition, and the (deliberately coarse) error type. Which
//! individual rail, clock or link step failed is recorded in the sequencer's
//! trace buffer and is not part of this surface.

#![no_std]

use num_derive::FromPrimitive;
use zerocopy::{Immutable, IntoBytes, KnownLayout};

pub use num_traits::FromPrimitive;

/// Power state of the companion module, ordered from most to least powered.
#[derive(
    Copy,
    Clone,
    Debug,
    FromPrimitive,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    IntoBytes,
    Immutable,
    KnownLayout,
)]
#[repr(u8)]
pub enum PowerState {
    /// Full power: all rails and clocks on, link active.
    S0 = 0,
    /// Partial retention: the DRAM supplies are off, the rest is untouched.
    S1 = 1,
    /// Suspended: clocks off, rails off except DRAM retention, link parked.
    S3 = 3,
    /// Fully powered down. This is also where any failed transition ends up.
    S4 = 4,
}

impl PowerState {
    pub const ALL: [PowerState; 4] =
        [PowerState::S0, PowerState::S1, PowerState::S3, PowerState::S4];
}

impl TryFrom<u32> for PowerState {
    type Error = SeqError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        PowerState::from_u32(raw).ok_or(SeqError::InvalidArgument)
    }
}

#[derive(Copy, Clone, Debug, FromPrimitive, Eq, PartialEq)]
pub enum SeqError {
    /// The requested state is not one of the supported power states.
    InvalidArgument = 1,
    /// A step of the transition failed. The sequencer has rolled back what it
    /// could and the module is now reported as [`PowerState::S4`].
    TransitionFailed,
    /// A rail, clock or pin could not be claimed while setting up.
    ResourceUnavailable,
}

impl SeqError {
    /// Negative errno equivalent, for callers using the integer status
    /// surface.
    pub fn errno(self) -> i32 {
        match self {
            SeqError::InvalidArgument => -22,    // EINVAL
            SeqError::TransitionFailed => -5,    // EIO
            SeqError::ResourceUnavailable => -19, // ENODEV
        }
    }
}

/// Indicates the result of a power state transition.
#[derive(
    Copy,
    Clone,
    Debug,
    FromPrimitive,
    Eq,
    PartialEq,
    IntoBytes,
    Immutable,
    KnownLayout,
)]
#[repr(u8)]
pub enum Transition {
    /// The sequencer successfully transitioned to the desired state.
    Done,
    /// The module was already in the desired state; nothing was touched.
    NoChange,
}

#[derive(
    Copy,
    Clone,
    Debug,
    FromPrimitive,
    Eq,
    PartialEq,
    IntoBytes,
    Immutable,
    KnownLayout,
)]
#[repr(u8)]
pub enum StateChangeReason {
    /// No reason was provided.
    Other = 1,
    /// Power up and down performed once at startup to enumerate the link.
    Probe,
    /// The module's state manager asked for the change.
    Request,
    /// A regulator failed or the link went down.
    EmergencyShutdown,
}

/// Module attach/detach notification delivered to hotplug callbacks.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HotplugEvent {
    Attached,
    Detached,
}
