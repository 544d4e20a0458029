//! Tick distribution and the countdown-timer registry
//!
//! A fixed-period 10 ms hardware tick drives [`TickScheduler::on_hardware_tick`],
//! which must stay bounded and never call into other components: it raises a
//! per-pass tick flag, a 500 ms slow-tick flag every 50th call, and decrements
//! every running countdown in the [`TimerRegistry`]. Each countdown raises its
//! one-shot expiry flag exactly once on reaching zero; the owning component
//! consumes the flag with [`TimerRegistry::take_expired`].
//!
//! Ownership rule: each timer is written by exactly two actors, the scheduler
//! (decrement) and one owning component (start/cancel/consume).

use crate::config::timing;

/// Decrement cadence of a countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Decremented every 10 ms tick
    Fast,
    /// Decremented every 500 ms slow tick
    Slow,
}

/// Every named countdown the firmware runs. Fast timers count 10 ms ticks,
/// slow timers count 500 ms ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum TimerId {
    // 10 ms cadence
    ScanPause,
    TailTone,
    CodeSearchTimeout,
    CodeFoundWindow,
    SquelchOpenDebounce,
    SquelchCloseDebounce,
    KeyDebounce,
    KeyRepeatDelay,
    KeyRepeat,
    DtmfDecodeGap,
    VoxStopDelay,
    PttHang,
    BeepDuration,
    FlashlightBlink,
    PanadapterSweep,
    ReverseToneBurst,
    // 500 ms cadence
    BatterySave,
    DualWatch,
    DualWatchHold,
    BacklightTimeout,
    KeypadLockout,
    TxTimeout,
    TxTimeoutAlert,
    MenuTimeout,
    PowerSaveBlink,
    LowBatteryBlink,
}

impl TimerId {
    pub const COUNT: usize = 26;

    /// Decrement cadence of this timer.
    pub const fn cadence(self) -> Cadence {
        match self {
            TimerId::ScanPause
            | TimerId::TailTone
            | TimerId::CodeSearchTimeout
            | TimerId::CodeFoundWindow
            | TimerId::SquelchOpenDebounce
            | TimerId::SquelchCloseDebounce
            | TimerId::KeyDebounce
            | TimerId::KeyRepeatDelay
            | TimerId::KeyRepeat
            | TimerId::DtmfDecodeGap
            | TimerId::VoxStopDelay
            | TimerId::PttHang
            | TimerId::BeepDuration
            | TimerId::FlashlightBlink
            | TimerId::PanadapterSweep
            | TimerId::ReverseToneBurst => Cadence::Fast,
            TimerId::BatterySave
            | TimerId::DualWatch
            | TimerId::DualWatchHold
            | TimerId::BacklightTimeout
            | TimerId::KeypadLockout
            | TimerId::TxTimeout
            | TimerId::TxTimeoutAlert
            | TimerId::MenuTimeout
            | TimerId::PowerSaveBlink
            | TimerId::LowBatteryBlink => Cadence::Slow,
        }
    }
}

/// Fixed table of countdowns plus their one-shot expiry flags.
///
/// A value of 0 means inactive; inactive timers are never touched by the
/// scheduler and nothing ever goes negative.
pub struct TimerRegistry {
    counts: [u16; TimerId::COUNT],
    expired: [bool; TimerId::COUNT],
}

impl TimerRegistry {
    pub const fn new() -> Self {
        Self {
            counts: [0; TimerId::COUNT],
            expired: [false; TimerId::COUNT],
        }
    }

    /// Arm a countdown. Starting with 0 ticks cancels instead.
    pub fn start(&mut self, id: TimerId, ticks: u16) {
        self.counts[id as usize] = ticks;
        self.expired[id as usize] = false;
    }

    /// Disarm a countdown and clear any pending expiry.
    pub fn cancel(&mut self, id: TimerId) {
        self.counts[id as usize] = 0;
        self.expired[id as usize] = false;
    }

    #[inline]
    pub fn is_running(&self, id: TimerId) -> bool {
        self.counts[id as usize] > 0
    }

    #[inline]
    pub fn remaining(&self, id: TimerId) -> u16 {
        self.counts[id as usize]
    }

    /// Consume the one-shot expiry flag.
    pub fn take_expired(&mut self, id: TimerId) -> bool {
        let hit = self.expired[id as usize];
        self.expired[id as usize] = false;
        hit
    }

    fn decrement(&mut self, cadence: Cadence) {
        let ids = [
            TimerId::ScanPause,
            TimerId::TailTone,
            TimerId::CodeSearchTimeout,
            TimerId::CodeFoundWindow,
            TimerId::SquelchOpenDebounce,
            TimerId::SquelchCloseDebounce,
            TimerId::KeyDebounce,
            TimerId::KeyRepeatDelay,
            TimerId::KeyRepeat,
            TimerId::DtmfDecodeGap,
            TimerId::VoxStopDelay,
            TimerId::PttHang,
            TimerId::BeepDuration,
            TimerId::FlashlightBlink,
            TimerId::PanadapterSweep,
            TimerId::ReverseToneBurst,
            TimerId::BatterySave,
            TimerId::DualWatch,
            TimerId::DualWatchHold,
            TimerId::BacklightTimeout,
            TimerId::KeypadLockout,
            TimerId::TxTimeout,
            TimerId::TxTimeoutAlert,
            TimerId::MenuTimeout,
            TimerId::PowerSaveBlink,
            TimerId::LowBatteryBlink,
        ];
        for id in ids {
            if id.cadence() != cadence {
                continue;
            }
            let slot = id as usize;
            if self.counts[slot] > 0 {
                self.counts[slot] -= 1;
                if self.counts[slot] == 0 {
                    self.expired[slot] = true;
                }
            }
        }
    }
}

impl Default for TimerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts the hardware interrupt into logical ticks.
///
/// Runs only in interrupt context; everything else runs in the single
/// non-reentrant main-loop pass, which is what makes the plain-integer
/// registry safe without locking on the core itself.
pub struct TickScheduler {
    tick_count: u32,
    slow_phase: u32,
    tick_elapsed: bool,
    slow_tick_elapsed: bool,
}

impl TickScheduler {
    pub const fn new() -> Self {
        Self {
            tick_count: 0,
            slow_phase: 0,
            tick_elapsed: false,
            slow_tick_elapsed: false,
        }
    }

    /// Called from the fixed-period 10 ms interrupt. Bounded time, no calls
    /// into other components, cannot fail.
    pub fn on_hardware_tick(&mut self, timers: &mut TimerRegistry) {
        self.tick_count = self.tick_count.wrapping_add(1);
        self.tick_elapsed = true;

        timers.decrement(Cadence::Fast);

        self.slow_phase += 1;
        if self.slow_phase >= timing::TICKS_PER_SLOW_TICK {
            self.slow_phase = 0;
            self.slow_tick_elapsed = true;
            timers.decrement(Cadence::Slow);
        }
    }

    /// Monotonic 10 ms tick counter.
    #[inline]
    pub fn tick_count(&self) -> u32 {
        self.tick_count
    }

    /// Consume the "a tick elapsed" flag; polled once per main-loop pass.
    pub fn take_tick(&mut self) -> bool {
        let hit = self.tick_elapsed;
        self.tick_elapsed = false;
        hit
    }

    /// Consume the "500 ms elapsed" flag.
    pub fn take_slow_tick(&mut self) -> bool {
        let hit = self.slow_tick_elapsed;
        self.slow_tick_elapsed = false;
        hit
    }
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new()
    }
}
