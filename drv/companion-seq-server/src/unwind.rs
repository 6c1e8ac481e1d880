// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Record of what a transition has changed so far, so a failure can put it
//! back in exactly the reverse order.

use enum_map::Enum;
use static_assertions::const_assert;

use crate::resources::{ClockId, Rail};

/// A change applied to the hardware during a transition.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Action {
    RailEnabled(Rail),
    ClockEnabled(ClockId),
    PowerGoodAsserted,
    /// The module reset was released while we were holding it.
    ResetReleased,
}

const MAX_ACTIONS: usize = 8;

// Every rail and clock at most once, plus the pin and the reset line.
const_assert!(
    MAX_ACTIONS >= <Rail as Enum>::LENGTH + <ClockId as Enum>::LENGTH + 2
);

#[derive(Default)]
pub(crate) struct Applied {
    actions: heapless::Vec<Action, MAX_ACTIONS>,
}

impl Applied {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: Action) {
        let pushed = self.actions.push(action);
        debug_assert!(pushed.is_ok());
    }

    /// Consumes the record, newest action first.
    pub fn into_reverse(self) -> impl Iterator<Item = Action> {
        let mut actions = self.actions;
        core::iter::from_fn(move || actions.pop())
    }
}
