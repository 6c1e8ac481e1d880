// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Attach/detach notification for the module's client driver.
//!
//! The sequencer itself never calls this; the module's state manager does,
//! once it has decided the module has come or gone.

use drv_companion_seq_api::HotplugEvent;
use spin::Mutex;

pub type HotplugCallback = fn(HotplugEvent);

pub struct HotplugNotifier {
    callback: Mutex<Option<HotplugCallback>>,
}

impl HotplugNotifier {
    pub const fn new() -> Self {
        Self {
            callback: Mutex::new(None),
        }
    }

    /// Installs `callback`, returning the one it replaced.
    pub fn register(
        &self,
        callback: HotplugCallback,
    ) -> Option<HotplugCallback> {
        self.callback.lock().replace(callback)
    }

    pub fn unregister(&self) -> Option<HotplugCallback> {
        self.callback.lock().take()
    }

    /// Delivers `event`. Returns `false` if nobody is registered.
    pub fn notify(&self, event: HotplugEvent) -> bool {
        // Call outside the lock so the callback may re-register.
        let cb = *self.callback.lock();
        match cb {
            Some(f) => {
                f(event);
                true
            }
            None => false,
        }
    }
}

impl Default for HotplugNotifier {
    fn default() -> Self {
        Self::new()
    }
}
