// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A fake board: every collaborator logs into one shared `World`, which also
//! holds the simulated hardware state and the failures to inject.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use drv_companion_seq_server::hw::{
    Clock, Delay, Hardware, HwError, Link, OutputPin, Platform,
    PowerErrorSink, Regulator, Scheduler, SupplyMonitor,
};
use drv_companion_seq_server::{
    ClockId, LinkSnapshot, PmOptions, PowerState, Rail, SeqConfig, Sequencer,
    Work,
};
use enum_map::EnumMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LinkOp {
    Enumerate,
    Save,
    Restore,
    Suspend(PmOptions),
    Resume(PmOptions),
    PrepareSleep,
    Wake,
    Quiesce,
    Activate,
    AssertReset,
    DeassertReset,
    Subscribe,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Call {
    SubscribeFault(Rail),
    RailOn(Rail),
    RailOff(Rail),
    ClockOn(ClockId),
    ClockOff(ClockId),
    Pin(bool),
    Delay(u32),
    Link(LinkOp),
}

pub const PCI_ID: [u8; 4] = [0x86, 0x80, 0x40, 0x31];

/// Rail, clock, pin and module reset levels at one instant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Levels {
    pub rails: EnumMap<Rail, bool>,
    pub clocks: EnumMap<ClockId, bool>,
    pub pin: bool,
    pub reset: bool,
}

impl Levels {
    /// Nothing powered. The reset line doesn't matter with the rails off.
    pub fn all_off(&self) -> bool {
        self.rails.values().all(|on| !on)
            && self.clocks.values().all(|on| !on)
            && !self.pin
    }
}

pub type Hook = Arc<dyn Fn() + Send + Sync>;

pub struct World {
    pub calls: Vec<Call>,
    pub fail: Vec<Call>,
    pub rails: EnumMap<Rail, bool>,
    pub clocks: EnumMap<ClockId, bool>,
    pub pin: bool,
    pub reset: bool,
    pub supply_uv: u32,
    pub scheduled: Vec<Work>,
    pub power_errors: u32,
    pub on_delay: Option<Hook>,
}

impl Default for World {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            fail: Vec::new(),
            rails: EnumMap::default(),
            clocks: EnumMap::default(),
            pin: false,
            reset: false,
            supply_uv: 3_700_000,
            scheduled: Vec::new(),
            power_errors: 0,
            on_delay: None,
        }
    }
}

impl World {
    /// Logs `call` and returns whether it should succeed.
    fn attempt(&mut self, call: Call) -> Result<(), HwError> {
        self.calls.push(call);
        if self.fail.contains(&call) {
            Err(HwError::IO)
        } else {
            Ok(())
        }
    }
}

#[derive(Clone, Default)]
pub struct Shared(Arc<Mutex<World>>);

impl Shared {
    pub fn lock(&self) -> MutexGuard<'_, World> {
        self.0.lock().unwrap()
    }

    fn attempt(&self, call: Call) -> Result<(), HwError> {
        self.lock().attempt(call)
    }
}

pub struct FakeRegulator {
    rail: Rail,
    world: Shared,
}

impl Regulator for FakeRegulator {
    fn enable(&mut self) -> Result<(), HwError> {
        let mut w = self.world.lock();
        w.attempt(Call::RailOn(self.rail))?;
        w.rails[self.rail] = true;
        Ok(())
    }

    fn disable(&mut self) -> Result<(), HwError> {
        let mut w = self.world.lock();
        w.attempt(Call::RailOff(self.rail))?;
        w.rails[self.rail] = false;
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.world.lock().rails[self.rail]
    }

    fn subscribe_fault(&mut self) -> Result<(), HwError> {
        self.world.attempt(Call::SubscribeFault(self.rail))
    }
}

pub struct FakeSupply(Shared);

impl SupplyMonitor for FakeSupply {
    fn supply_above(&self, microvolts: u32) -> bool {
        self.0.lock().supply_uv > microvolts
    }
}

pub struct FakeClock {
    id: ClockId,
    world: Shared,
}

impl Clock for FakeClock {
    fn enable(&mut self) -> Result<(), HwError> {
        let mut w = self.world.lock();
        w.attempt(Call::ClockOn(self.id))?;
        assert!(!w.clocks[self.id], "{:?} enabled twice", self.id);
        w.clocks[self.id] = true;
        Ok(())
    }

    fn disable(&mut self) {
        let mut w = self.world.lock();
        w.calls.push(Call::ClockOff(self.id));
        assert!(w.clocks[self.id], "{:?} disabled while off", self.id);
        w.clocks[self.id] = false;
    }
}

pub struct FakePin(Shared);

impl OutputPin for FakePin {
    fn set(&mut self, high: bool) -> Result<(), HwError> {
        let mut w = self.0.lock();
        w.attempt(Call::Pin(high))?;
        w.pin = high;
        Ok(())
    }
}

pub struct FakeLink(Shared);

impl FakeLink {
    fn op(&self, op: LinkOp) -> Result<(), HwError> {
        self.0.attempt(Call::Link(op))
    }
}

impl Link for FakeLink {
    fn enumerate(&mut self) -> Result<(), HwError> {
        self.op(LinkOp::Enumerate)
    }
    fn save_state(&mut self) -> Result<LinkSnapshot, HwError> {
        self.op(LinkOp::Save)?;
        LinkSnapshot::from_bytes(&PCI_ID)
    }
    fn restore_state(
        &mut self,
        snapshot: &LinkSnapshot,
    ) -> Result<(), HwError> {
        assert_eq!(snapshot.as_bytes(), PCI_ID);
        self.op(LinkOp::Restore)
    }
    fn suspend(&mut self, options: PmOptions) -> Result<(), HwError> {
        self.op(LinkOp::Suspend(options))
    }
    fn resume(&mut self, options: PmOptions) -> Result<(), HwError> {
        self.op(LinkOp::Resume(options))
    }
    fn prepare_sleep(&mut self) -> Result<(), HwError> {
        self.op(LinkOp::PrepareSleep)
    }
    fn wake(&mut self) -> Result<(), HwError> {
        self.op(LinkOp::Wake)
    }
    fn quiesce(&mut self) -> Result<(), HwError> {
        self.op(LinkOp::Quiesce)
    }
    fn activate(&mut self) -> Result<(), HwError> {
        self.op(LinkOp::Activate)
    }
    fn assert_reset(&mut self) -> Result<(), HwError> {
        self.op(LinkOp::AssertReset)?;
        self.0.lock().reset = true;
        Ok(())
    }
    fn deassert_reset(&mut self) -> Result<(), HwError> {
        self.op(LinkOp::DeassertReset)?;
        self.0.lock().reset = false;
        Ok(())
    }
    fn subscribe_link_down(&mut self) -> Result<(), HwError> {
        self.op(LinkOp::Subscribe)
    }
}

pub struct FakeDelay(Shared);

impl Delay for FakeDelay {
    fn delay_us(&mut self, us: u32) {
        // The hook runs without the world lock held, since it is expected to
        // call back into the sequencer.
        let hook = {
            let mut w = self.0.lock();
            w.calls.push(Call::Delay(us));
            w.on_delay.clone()
        };
        if let Some(hook) = hook {
            hook();
        }
    }
}

pub struct FakeScheduler(Shared);

impl Scheduler for FakeScheduler {
    fn defer(&self, work: Work) {
        self.0.lock().scheduled.push(work);
    }
}

pub struct FakeSink(Shared);

impl PowerErrorSink for FakeSink {
    fn power_error(&self) {
        self.0.lock().power_errors += 1;
    }
}

pub enum Board {}

impl Platform for Board {
    type Regulator = FakeRegulator;
    type Clock = FakeClock;
    type Pin = FakePin;
    type Link = FakeLink;
    type Delay = FakeDelay;
    type Supply = FakeSupply;
    type Scheduler = FakeScheduler;
    type ErrorSink = FakeSink;
}

pub fn build(
    config: SeqConfig,
    world: &Shared,
) -> Result<Sequencer<Board>, drv_companion_seq_server::SeqError> {
    let hw = Hardware::<Board> {
        rails: EnumMap::from_fn(|rail| FakeRegulator {
            rail,
            world: world.clone(),
        }),
        clocks: EnumMap::from_fn(|id| FakeClock {
            id,
            world: world.clone(),
        }),
        power_good: FakePin(world.clone()),
        link: FakeLink(world.clone()),
        delay: FakeDelay(world.clone()),
        supply: FakeSupply(world.clone()),
    };
    Sequencer::new(
        config,
        hw,
        FakeScheduler(world.clone()),
        FakeSink(world.clone()),
    )
}

pub struct Bench {
    pub world: Shared,
    pub seq: Arc<Sequencer<Board>>,
}

impl Bench {
    pub fn new() -> Self {
        Self::with_config(SeqConfig::DEFAULT)
    }

    pub fn with_config(config: SeqConfig) -> Self {
        let world = Shared::default();
        let seq = build(config, &world).unwrap();
        let bench = Self {
            world,
            seq: Arc::new(seq),
        };
        bench.clear();
        bench
    }

    /// A bench already sitting in `state`, with the log cleared.
    pub fn at(state: PowerState) -> Self {
        let bench = Self::new();
        bench.reach(state);
        bench
    }

    pub fn reach(&self, state: PowerState) {
        if state != PowerState::S4 {
            self.seq.set_state(PowerState::S0).unwrap();
        }
        self.seq.set_state(state).unwrap();
        assert_eq!(self.seq.get_state(), state);
        self.clear();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.world.lock().calls.clone()
    }

    pub fn clear(&self) {
        self.world.lock().calls.clear();
    }

    pub fn fail_on(&self, call: Call) {
        self.world.lock().fail.push(call);
    }

    pub fn heal(&self) {
        self.world.lock().fail.clear();
    }

    pub fn levels(&self) -> Levels {
        let w = self.world.lock();
        Levels {
            rails: w.rails.clone(),
            clocks: w.clocks.clone(),
            pin: w.pin,
            reset: w.reset,
        }
    }

    pub fn scheduled(&self) -> usize {
        self.world.lock().scheduled.len()
    }

    pub fn power_errors(&self) -> u32 {
        self.world.lock().power_errors
    }

    /// Runs everything the sequencer has deferred, as the board's worker
    /// would. Returns how many items ran.
    pub fn run_scheduled(&self) -> usize {
        let work = std::mem::take(&mut self.world.lock().scheduled);
        for w in &work {
            self.seq.run(*w);
        }
        work.len()
    }

    pub fn on_delay(&self, hook: Hook) {
        self.world.lock().on_delay = Some(hook);
    }
}

pub const UP_FROM_S4: [Call; 11] = [
    Call::RailOn(Rail::DramIo),
    Call::RailOn(Rail::DramCore),
    Call::RailOn(Rail::SocCore),
    Call::RailOn(Rail::Retention),
    Call::ClockOn(ClockId::Reference),
    Call::ClockOn(ClockId::Sleep),
    Call::Pin(true),
    Call::Delay(60),
    Call::Link(LinkOp::Enumerate),
    Call::Link(LinkOp::Save),
    Call::Link(LinkOp::Subscribe),
];
