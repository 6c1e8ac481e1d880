// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Handles for the rails, clocks and power-good pin.
//!
//! Every enable/disable here is idempotent, and reports whether it actually
//! changed anything, so that the caller only records (and later unwinds)
//! changes it made itself.

use enum_map::{Enum, EnumMap};

use crate::hw::{Clock, HwError, OutputPin, Regulator};

/// The module's supplies.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Enum)]
pub enum Rail {
    /// DRAM I/O supply. First on, last off.
    DramIo,
    /// DRAM core supply.
    DramCore,
    /// SoC core supply. Its regulator also monitors the input supply.
    SocCore,
    /// DRAM retention supply. Kept up in S1 and S3, and only cycled when
    /// entering or leaving S4.
    Retention,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Enum)]
pub enum ClockId {
    Reference,
    Sleep,
}

pub(crate) struct Rails<R> {
    rails: EnumMap<Rail, R>,
}

impl<R: Regulator> Rails<R> {
    pub fn new(rails: EnumMap<Rail, R>) -> Self {
        Self { rails }
    }

    /// Turns `rail` on if it is off. Returns `true` if this call turned it on.
    pub fn enable(&mut self, rail: Rail) -> Result<bool, HwError> {
        let reg = &mut self.rails[rail];
        if reg.is_enabled() {
            return Ok(false);
        }
        reg.enable()?;
        Ok(true)
    }

    /// Turns `rail` off if it is on. Returns `true` if this call turned it
    /// off.
    pub fn disable(&mut self, rail: Rail) -> Result<bool, HwError> {
        let reg = &mut self.rails[rail];
        if !reg.is_enabled() {
            return Ok(false);
        }
        reg.disable()?;
        Ok(true)
    }

    pub fn subscribe_all(&mut self) -> Result<(), (Rail, HwError)> {
        for (rail, reg) in self.rails.iter_mut() {
            reg.subscribe_fault().map_err(|e| (rail, e))?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn get(&self, rail: Rail) -> &R {
        &self.rails[rail]
    }
}

struct ClockHandle<C> {
    clk: C,
    // Clock drivers reference-count enables, so we must only ever pair one
    // enable with one disable. This mirrors what we last did to the hardware.
    enabled: bool,
}

pub(crate) struct Clocks<C> {
    clocks: EnumMap<ClockId, ClockHandle<C>>,
}

impl<C: Clock> Clocks<C> {
    pub fn new(clocks: EnumMap<ClockId, C>) -> Self {
        Self {
            clocks: clocks.map(|_, clk| ClockHandle {
                clk,
                enabled: false,
            }),
        }
    }

    #[cfg(test)]
    pub fn is_enabled(&self, id: ClockId) -> bool {
        self.clocks[id].enabled
    }

    /// Returns `true` if this call turned the clock on.
    pub fn enable(&mut self, id: ClockId) -> Result<bool, HwError> {
        let h = &mut self.clocks[id];
        if h.enabled {
            return Ok(false);
        }
        h.clk.enable()?;
        h.enabled = true;
        Ok(true)
    }

    /// Returns `true` if this call turned the clock off.
    pub fn disable(&mut self, id: ClockId) -> bool {
        let h = &mut self.clocks[id];
        if !h.enabled {
            return false;
        }
        h.clk.disable();
        h.enabled = false;
        true
    }
}

pub(crate) struct PowerGood<G> {
    pin: G,
    asserted: bool,
}

impl<G: OutputPin> PowerGood<G> {
    /// Takes the pin and drives it low, which is where the module expects it
    /// before its supplies come up.
    pub fn claim(mut pin: G) -> Result<Self, HwError> {
        pin.set(false)?;
        Ok(Self {
            pin,
            asserted: false,
        })
    }

    pub fn is_asserted(&self) -> bool {
        self.asserted
    }

    /// Drives the pin. Unlike rails and clocks this always touches the
    /// hardware, since the pin is cheap to write and we want it to reflect
    /// what we believe even if something else glitched it.
    pub fn set(&mut self, high: bool) -> Result<(), HwError> {
        self.pin.set(high)?;
        self.asserted = high;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::vec::Vec;

    #[derive(Default)]
    struct CountingClock {
        enables: u32,
        disables: u32,
        fail: bool,
    }

    impl Clock for CountingClock {
        fn enable(&mut self) -> Result<(), HwError> {
            if self.fail {
                return Err(HwError::IO);
            }
            self.enables += 1;
            Ok(())
        }

        fn disable(&mut self) {
            self.disables += 1;
        }
    }

    #[test]
    fn clock_enable_is_not_repeated() {
        let mut clocks = Clocks::new(EnumMap::from_fn(|_| {
            CountingClock::default()
        }));

        assert_eq!(clocks.enable(ClockId::Reference), Ok(true));
        assert_eq!(clocks.enable(ClockId::Reference), Ok(false));
        assert!(clocks.disable(ClockId::Reference));
        assert!(!clocks.disable(ClockId::Reference));

        let h = &clocks.clocks[ClockId::Reference];
        assert_eq!((h.clk.enables, h.clk.disables), (1, 1));
        assert!(!clocks.is_enabled(ClockId::Sleep));
    }

    #[test]
    fn failed_clock_enable_leaves_flag_clear() {
        let mut clocks = Clocks::new(EnumMap::from_fn(|_| CountingClock {
            fail: true,
            ..Default::default()
        }));

        assert_eq!(clocks.enable(ClockId::Sleep), Err(HwError::IO));
        assert!(!clocks.is_enabled(ClockId::Sleep));
        assert!(!clocks.disable(ClockId::Sleep));
    }

    struct Reg {
        on: bool,
        calls: Vec<bool>,
    }

    impl Regulator for Reg {
        fn enable(&mut self) -> Result<(), HwError> {
            self.calls.push(true);
            self.on = true;
            Ok(())
        }
        fn disable(&mut self) -> Result<(), HwError> {
            self.calls.push(false);
            self.on = false;
            Ok(())
        }
        fn is_enabled(&self) -> bool {
            self.on
        }
        fn subscribe_fault(&mut self) -> Result<(), HwError> {
            Ok(())
        }
    }

    #[test]
    fn rail_changes_only_when_needed() {
        let mut rails = Rails::new(EnumMap::from_fn(|rail| Reg {
            on: rail == Rail::Retention,
            calls: Vec::new(),
        }));

        assert_eq!(rails.enable(Rail::Retention), Ok(false));
        assert_eq!(rails.enable(Rail::DramIo), Ok(true));
        assert_eq!(rails.disable(Rail::DramCore), Ok(false));
        assert!(rails.get(Rail::Retention).calls.is_empty());
        assert_eq!(rails.get(Rail::DramIo).calls, [true]);
    }
}
