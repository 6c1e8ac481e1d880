// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// How the module boots, which decides whether the link takes part in
/// sequencing.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BootMode {
    /// The module is booted over the link, which is brought up, suspended and
    /// resumed along with power.
    Link,
    /// The module boots from its own flash; the link is not used and power
    /// transitions only release or hold the module reset line.
    Standalone,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SeqConfig {
    pub boot_mode: BootMode,
    /// PLL lock time after power-good is asserted.
    pub pll_settle_us: u32,
    /// Input supply level below which the module should not be powered.
    pub supply_safe_threshold_uv: u32,
}

impl SeqConfig {
    pub const DEFAULT: Self = Self {
        boot_mode: BootMode::Link,
        pll_settle_us: 60,
        supply_safe_threshold_uv: 3_400_000,
    };
}

impl Default for SeqConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
