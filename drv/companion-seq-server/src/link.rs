// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Link bring-up and parking.
//!
//! The link has its own little state machine layered on top of rail power:
//!
//! ```text
//!  Unenumerated --bring_up--> Active --park--> Suspended
//!                               ^                  |
//!                               +----bring_up------+
//! ```
//!
//! The first bring-up enumerates the endpoint and stashes its pristine
//! configuration in a [`LinkSession`]; every later bring-up restores that
//! configuration. Parking a link that is not active just holds the module in
//! reset.
//!
//! A pending fault (regulator failure or link-down) changes how the link is
//! suspended: the root complex is told the link is gone before the function
//! driver is touched, since the endpoint may no longer answer.

use core::sync::atomic::{AtomicBool, Ordering};

use ringbuf::ringbuf_entry;

use crate::hw::{HwError, Link};
use crate::trace::{Trace, TraceBuf};

/// Largest configuration snapshot we keep: the full PCIe extended
/// configuration space.
pub const LINK_SNAPSHOT_MAX: usize = 4096;

/// Opaque copy of the endpoint's configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkSnapshot(heapless::Vec<u8, LINK_SNAPSHOT_MAX>);

impl LinkSnapshot {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HwError> {
        heapless::Vec::from_slice(bytes)
            .map(Self)
            .map_err(|_| HwError::NO_SPACE)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

bitflags::bitflags! {
    /// Options for root-complex power control.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct PmOptions: u32 {
        /// Report the link as down to the PCI core while suspending.
        const LINK_DOWN = 1 << 0;
        /// Don't try to restore the endpoint's config on the way down.
        const NO_CONFIG_RESTORE = 1 << 1;
        /// Keep the root complex's saved config across the resume.
        const NO_CONFIG_FREE = 1 << 2;
    }
}

impl PmOptions {
    pub const SUSPEND: Self = Self::LINK_DOWN;
    pub const RESCUE: Self = Self::LINK_DOWN.union(Self::NO_CONFIG_RESTORE);
    pub const RESUME: Self = Self::NO_CONFIG_FREE;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LinkStatus {
    Unenumerated,
    Active,
    Suspended,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LinkStep {
    Enumerate,
    SaveState,
    SubscribeLinkDown,
    Resume,
    Wake,
    RestoreState,
    Activate,
    Quiesce,
    PrepareSleep,
    Suspend,
    RescueSuspend,
    AssertReset,
    DeassertReset,
}

/// State captured once the link has been enumerated.
pub(crate) struct LinkSession {
    pristine: LinkSnapshot,
}

pub(crate) struct LinkController<L> {
    link: L,
    status: LinkStatus,
    session: Option<LinkSession>,
    reset_asserted: bool,
}

impl<L: Link> LinkController<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            status: LinkStatus::Unenumerated,
            session: None,
            reset_asserted: false,
        }
    }

    pub fn status(&self) -> LinkStatus {
        self.status
    }

    /// Brings the link to `Active`. On failure the link status is left as it
    /// was found; if the reset line was released here it stays released, and
    /// [`Self::reset_asserted`] tells the caller so it can hold it again.
    pub fn bring_up(
        &mut self,
        pending_fault: &AtomicBool,
        trace: &mut TraceBuf,
    ) -> Result<(), HwError> {
        if self.status == LinkStatus::Active {
            return Ok(());
        }

        self.release_reset(trace)?;

        match self.status {
            LinkStatus::Unenumerated => self.enumerate(trace)?,
            LinkStatus::Suspended => self.resume(trace)?,
            LinkStatus::Active => {}
        }

        self.status = LinkStatus::Active;
        pending_fault.store(false, Ordering::Release);
        Ok(())
    }

    fn enumerate(&mut self, trace: &mut TraceBuf) -> Result<(), HwError> {
        step(trace, LinkStep::Enumerate, self.link.enumerate())?;
        let pristine =
            step(trace, LinkStep::SaveState, self.link.save_state())?;
        step(
            trace,
            LinkStep::SubscribeLinkDown,
            self.link.subscribe_link_down(),
        )?;

        self.session = Some(LinkSession { pristine });
        Ok(())
    }

    fn resume(&mut self, trace: &mut TraceBuf) -> Result<(), HwError> {
        let Some(session) = &self.session else {
            // Suspended without ever being enumerated can't happen; treat it
            // as a missing device rather than trusting the link.
            let e = HwError::NO_DEVICE;
            ringbuf_entry!(*trace, Trace::LinkFailed(LinkStep::Resume, e));
            return Err(e);
        };

        step(trace, LinkStep::Resume, self.link.resume(PmOptions::RESUME))?;

        if let Err(e) = step(trace, LinkStep::Wake, self.link.wake()) {
            self.fall_back_asleep(false, trace);
            return Err(e);
        }

        let restored = step(
            trace,
            LinkStep::RestoreState,
            self.link.restore_state(&session.pristine),
        )
        .and_then(|()| step(trace, LinkStep::Activate, self.link.activate()));

        if let Err(e) = restored {
            self.fall_back_asleep(true, trace);
            return Err(e);
        }
        Ok(())
    }

    /// Undoes a partial resume. Failures here are only traced; the caller is
    /// already failing.
    fn fall_back_asleep(&mut self, woken: bool, trace: &mut TraceBuf) {
        if woken {
            let _ =
                step(trace, LinkStep::PrepareSleep, self.link.prepare_sleep());
        }
        let _ = step(
            trace,
            LinkStep::Suspend,
            self.link.suspend(PmOptions::SUSPEND),
        );
    }

    /// Parks the link ahead of a power down: an active link is suspended,
    /// anything else is held in reset.
    pub fn park(
        &mut self,
        pending_fault: &AtomicBool,
        trace: &mut TraceBuf,
    ) -> Result<(), HwError> {
        if self.status != LinkStatus::Active {
            return self.hold_reset(trace);
        }

        // Claimed up front: a fault posted from here on belongs to the next
        // park.
        if pending_fault.swap(false, Ordering::AcqRel) {
            // The endpoint may be gone, so update the root complex's view of
            // the link first, then let the function driver clean up.
            let rescued = step(
                trace,
                LinkStep::RescueSuspend,
                self.link.suspend(PmOptions::RESCUE),
            );
            if let Err(e) = rescued {
                pending_fault.store(true, Ordering::Release);
                return Err(e);
            }
            warn(trace, LinkStep::Quiesce, self.link.quiesce());
        } else {
            warn(trace, LinkStep::Quiesce, self.link.quiesce());
            warn(trace, LinkStep::PrepareSleep, self.link.prepare_sleep());
            step(
                trace,
                LinkStep::Suspend,
                self.link.suspend(PmOptions::SUSPEND),
            )?;
        }

        self.status = LinkStatus::Suspended;
        Ok(())
    }

    /// Holds the module in reset.
    pub fn hold_reset(&mut self, trace: &mut TraceBuf) -> Result<(), HwError> {
        step(trace, LinkStep::AssertReset, self.link.assert_reset())?;
        self.reset_asserted = true;
        Ok(())
    }

    pub fn reset_asserted(&self) -> bool {
        self.reset_asserted
    }

    /// Releases the module reset if we are holding it.
    pub fn release_reset(
        &mut self,
        trace: &mut TraceBuf,
    ) -> Result<(), HwError> {
        if self.reset_asserted {
            step(trace, LinkStep::DeassertReset, self.link.deassert_reset())?;
            self.reset_asserted = false;
        }
        Ok(())
    }

    /// Releases the module reset unconditionally, for boards that boot the
    /// module without the link. Nothing tells us the reset state at startup,
    /// so we always drive it.
    pub fn release_reset_standalone(
        &mut self,
        trace: &mut TraceBuf,
    ) -> Result<(), HwError> {
        step(trace, LinkStep::DeassertReset, self.link.deassert_reset())?;
        self.reset_asserted = false;
        Ok(())
    }

    #[cfg(test)]
    pub fn link(&self) -> &L {
        &self.link
    }
}

fn step<T>(
    trace: &mut TraceBuf,
    which: LinkStep,
    r: Result<T, HwError>,
) -> Result<T, HwError> {
    match &r {
        Ok(_) => ringbuf_entry!(*trace, Trace::Link(which)),
        Err(e) => ringbuf_entry!(*trace, Trace::LinkFailed(which, *e)),
    }
    r
}

fn warn(trace: &mut TraceBuf, which: LinkStep, r: Result<(), HwError>) {
    match r {
        Ok(()) => ringbuf_entry!(*trace, Trace::Link(which)),
        Err(e) => ringbuf_entry!(*trace, Trace::LinkWarning(which, e)),
    }
}
