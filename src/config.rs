//! Timing, tuning and band constants for the control core
//!
//! Frequencies are in units of 10 Hz throughout the crate; RSSI values are
//! raw chip readings in 0.5 dB steps (dBm = rssi / 2 - 160).

/// Tick timing
pub mod timing {
    /// Hardware tick period in milliseconds
    pub const TICK_MS: u32 = 10;

    /// Number of 10 ms ticks per 500 ms slow tick
    pub const TICKS_PER_SLOW_TICK: u32 = 50;

    /// Tail-tone elimination countdown (200 ms)
    pub const TAIL_TONE_TICKS: u16 = 20;

    /// CDCSS tail-condition polling slot (40 ms)
    pub const TAIL_POLL_SLOT_TICKS: u32 = 4;

    /// PTT debounce: consecutive stable 10 ms samples required
    pub const PTT_DEBOUNCE_SAMPLES: u8 = 3;
}

/// Auto-gain-control loop tuning
pub mod agc {
    /// Target RSSI, a -89 dBm carrier in raw 0.5 dB units
    pub const DESIRED_RSSI: u16 = ((-89 + 160) * 2) as u16;

    /// At or above this error the loop jumps the table instead of stepping
    pub const FAST_JUMP_DB: i16 = 10;

    /// Headroom left below target when fast-jumping, in dB
    pub const JUMP_HEADROOM_DB: i16 = 8;

    /// Hysteresis band below target within which the hold timer is refreshed
    pub const HYSTERESIS_DB: i16 = 4;

    /// Gain hold after any table step (300 ms in ticks)
    pub const HOLD_TICKS: u16 = 30;
}

/// Code (CTCSS/CDCSS) search tuning
pub mod code_search {
    /// Overall search timeout, carrier and code phases combined (10 s)
    pub const TIMEOUT_TICKS: u16 = 1000;

    /// Frequency-agreement tolerance between successive reads (1 kHz)
    pub const FREQ_TOLERANCE: u32 = 100;

    /// Consecutive in-tolerance frequency reads to accept a carrier
    pub const CARRIER_HITS: u8 = 3;

    /// Consecutive identical CTCSS decodes to accept a tone
    pub const CTCSS_HITS: u8 = 3;
}

/// Scan engine tuning
pub mod scan {
    /// Dwell pause per candidate (ticks)
    pub const PAUSE_TICKS: u16 = 20;

    /// Dwell pause per candidate with fast scan enabled (ticks)
    pub const PAUSE_FAST_TICKS: u16 = 10;

    /// Hold time on a found carrier for the stay-on-timer resume policy (5 s)
    pub const STAY_TICKS: u16 = 500;

    /// Short re-arm pause after the carrier drops before scanning resumes
    pub const RESUME_TICKS: u16 = 20;
}

/// Power management timing
pub mod power {
    /// Inactivity before entering power save, in 500 ms slow ticks
    pub const BATTERY_SAVE_SLOW_TICKS: u16 = 20;

    /// Dual-watch VFO alternation period, in 500 ms slow ticks
    pub const DUAL_WATCH_SLOW_TICKS: u16 = 2;

    /// Hold on the other VFO after reception ends before switching back
    pub const DUAL_WATCH_HOLD_SLOW_TICKS: u16 = 4;
}

/// Firmware version
pub mod version {
    pub const VERSION_MAJOR: u8 = 0;
    pub const VERSION_MINOR: u8 = 1;
    pub const VERSION_PATCH: u8 = 0;
}
