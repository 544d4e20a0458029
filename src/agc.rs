//! Front-end automatic gain control for AM reception
//!
//! Strong AM carriers saturate the front end well before the demodulator
//! complains, so while receiving in AM mode the loop walks a calibration
//! table of attenuator settings every 10 ms: fast jumps when the input is
//! far too hot, single steps otherwise, and slow recovery guarded by a hold
//! timer so the gain does not hunt. The attenuation currently applied is
//! published as a correction offset so downstream signal-strength consumers
//! see the level at the antenna, not at the mixer.

use crate::config::agc;
use crate::rf::traits::RfTransceiver;

/// One gain-chain setting and its calibrated total gain relative to the
/// factory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GainEntry {
    pub short_lna: u8,
    pub lna: u8,
    pub mixer: u8,
    pub pga: u8,
    /// Calibrated gain in dB relative to the factory setting (index 0)
    pub gain_db: i16,
}

const fn entry(short_lna: u8, lna: u8, mixer: u8, pga: u8, gain_db: i16) -> GainEntry {
    GainEntry {
        short_lna,
        lna,
        mixer,
        pga,
        gain_db,
    }
}

/// Calibration-derived attenuator table. dB values rise with the index:
/// index 1 is maximum attenuation, the top index is near-factory gain.
/// Index 0 is the untouched factory setting; the loop never selects it.
/// The dB column comes from bench measurement, not from summing the
/// per-stage datasheet figures, which is why it is searched rather than
/// computed.
pub const GAIN_TABLE: [GainEntry; 19] = [
    entry(3, 2, 3, 6, 0), // factory
    entry(0, 0, 0, 0, -63),
    entry(0, 0, 1, 1, -58),
    entry(0, 1, 1, 2, -53),
    entry(0, 2, 1, 2, -49),
    entry(0, 2, 2, 3, -44),
    entry(1, 2, 2, 3, -40),
    entry(1, 3, 2, 3, -36),
    entry(1, 3, 2, 4, -32),
    entry(1, 4, 2, 4, -28),
    entry(2, 4, 2, 4, -24),
    entry(2, 4, 3, 4, -20),
    entry(2, 5, 3, 4, -17),
    entry(2, 5, 3, 5, -14),
    entry(3, 5, 3, 5, -11),
    entry(3, 6, 3, 5, -8),
    entry(3, 6, 3, 6, -5),
    entry(3, 7, 3, 6, -3),
    entry(3, 7, 3, 7, -1),
];

/// Highest selectable table index (least attenuation).
pub const MAX_GAIN_INDEX: usize = GAIN_TABLE.len() - 1;

/// Lowest index the loop may select; index 0 stays reserved.
pub const MIN_GAIN_INDEX: usize = 1;

/// Per-VFO loop state.
#[derive(Debug, Clone, Copy)]
pub struct GainControlState {
    /// Currently selected table index, always within [1, MAX_GAIN_INDEX]
    index: usize,
    /// Index whose registers were last written to the chip
    applied_index: usize,
    /// Ticks left before gain recovery is allowed
    hold_ticks: u16,
    /// Previous raw RSSI sample, 0 until the first reading
    prev_rssi: u16,
    /// Gain of the applied entry relative to factory, in dB
    correction_db: i16,
    /// Latest gain-corrected RSSI published to consumers
    corrected_rssi: u16,
    /// Tick the loop last ran on, for once-per-tick gating
    last_tick: Option<u32>,
}

impl GainControlState {
    pub const fn new() -> Self {
        Self {
            index: MAX_GAIN_INDEX,
            applied_index: MAX_GAIN_INDEX,
            hold_ticks: 0,
            prev_rssi: 0,
            correction_db: GAIN_TABLE[MAX_GAIN_INDEX].gain_db,
            corrected_rssi: 0,
            last_tick: None,
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Applied-entry gain relative to factory, in dB.
    #[inline]
    pub fn correction_db(&self) -> i16 {
        self.correction_db
    }

    /// Latest RSSI with the applied attenuation compensated out.
    #[inline]
    pub fn corrected_rssi(&self) -> u16 {
        self.corrected_rssi
    }
}

impl Default for GainControlState {
    fn default() -> Self {
        Self::new()
    }
}

/// The gain-control loop over both VFO states.
pub struct AutoGainController {
    states: [GainControlState; 2],
    pub enabled: bool,
}

impl AutoGainController {
    pub const fn new() -> Self {
        Self {
            states: [GainControlState::new(), GainControlState::new()],
            enabled: true,
        }
    }

    #[inline]
    pub fn state(&self, vfo: usize) -> &GainControlState {
        &self.states[vfo]
    }

    /// Restore the factory gain setting and forget loop history for a VFO.
    /// Used when leaving AM reception or toggling the feature off.
    pub fn reset<R: RfTransceiver>(&mut self, vfo: usize, rf: &mut R) {
        let factory = &GAIN_TABLE[0];
        rf.write_gain_registers(factory.short_lna, factory.lna, factory.mixer, factory.pga);
        self.states[vfo] = GainControlState::new();
    }

    /// Run one loop iteration for a VFO. Caller gates on AM mode, a
    /// receiving operating state and the feature being enabled; the loop
    /// itself additionally runs at most once per tick, so a duplicated call
    /// within a pass cannot double-step the table.
    pub fn adjust<R: RfTransceiver>(&mut self, vfo: usize, rf: &mut R, tick: u32) {
        if !self.enabled {
            return;
        }
        let st = &mut self.states[vfo];
        if st.last_tick == Some(tick) {
            return;
        }
        st.last_tick = Some(tick);

        // Two-sample smoothing knocks the worst of the impulse noise off.
        let raw = rf.read_rssi();
        let rssi = if st.prev_rssi > 0 {
            (st.prev_rssi + raw) / 2
        } else {
            raw
        };
        st.prev_rssi = raw;

        // Publish the level at the antenna: back out the attenuation, which
        // the chip reports at 2 raw units per dB.
        let corrected = rssi as i32 - 2 * st.correction_db as i32;
        st.corrected_rssi = corrected.clamp(0, u16::MAX as i32) as u16;

        // Loop error in dB against the -89 dBm target.
        let diff = (rssi as i16 - agc::DESIRED_RSSI as i16) / 2;

        if diff > 0 {
            if diff >= agc::FAST_JUMP_DB {
                // Way too hot: land directly on the highest index whose gain
                // is at or below target, keeping a little headroom.
                let target_db = GAIN_TABLE[st.index].gain_db - diff + agc::JUMP_HEADROOM_DB;
                let mut i = st.index;
                while i > MIN_GAIN_INDEX && GAIN_TABLE[i].gain_db > target_db {
                    i -= 1;
                }
                st.index = i;
            } else {
                // Mildly hot: one step at a time rides out short spikes.
                st.index = (st.index - 1).max(MIN_GAIN_INDEX);
            }
        }

        // Within the hysteresis band the hold timer keeps getting refreshed,
        // which is what stops open/close gain hunting.
        if diff >= -agc::HYSTERESIS_DB {
            st.hold_ticks = agc::HOLD_TICKS;
        }

        if st.hold_ticks > 0 {
            st.hold_ticks -= 1;
        } else if st.index < MAX_GAIN_INDEX {
            // Signal has been comfortably below target for the whole hold
            // period: recover one step of gain.
            st.index += 1;
        }

        // Apply only on change; unchanged state costs no bus traffic.
        if st.index != st.applied_index {
            let e = &GAIN_TABLE[st.index];
            rf.write_gain_registers(e.short_lna, e.lna, e.mixer, e.pga);
            st.applied_index = st.index;
            st.correction_db = e.gain_db;
            st.hold_ticks = agc::HOLD_TICKS;
        }
    }
}

impl Default for AutoGainController {
    fn default() -> Self {
        Self::new()
    }
}
