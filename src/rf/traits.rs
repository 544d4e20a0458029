//! RF transceiver trait for abstraction and testability
//!
//! This trait defines the behavioral contract the control core relies on,
//! allowing the actual chip driver to be swapped with a mock for testing.
//! All methods are synchronous and infallible at this boundary: the core has
//! no recoverable-error concept, and the main loop never blocks.

use crate::channel::VfoChannel;

/// Edge-triggered interrupt events drained once per main-loop pass.
///
/// Unexpected combinations (e.g. opened and closed in the same pass) are
/// legal; consumers treat anything they cannot use as a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RfEvents {
    /// Squelch went from closed to open
    pub squelch_opened: bool,
    /// Squelch went from open to closed
    pub squelch_closed: bool,
    /// Configured sub-audible code detected
    pub code_found: bool,
    /// Configured sub-audible code no longer detected
    pub code_lost: bool,
    /// Demodulator reported the end-of-transmission tail marker
    pub tail_detected: bool,
}

impl RfEvents {
    pub const fn none() -> Self {
        Self {
            squelch_opened: false,
            squelch_closed: false,
            code_found: false,
            code_lost: false,
            tail_detected: false,
        }
    }

    pub fn any(&self) -> bool {
        self.squelch_opened
            || self.squelch_closed
            || self.code_found
            || self.code_lost
            || self.tail_detected
    }
}

/// Result of the chip's sub-audible code scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CssScanResult {
    NotFound,
    /// CTCSS tone detected, in 0.1 Hz units
    Ctcss { tone: u16 },
    /// CDCSS code word decoded
    Cdcss { code: u16 },
}

/// Current sub-audible code comparison state reported by the demodulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeMatch {
    Lost,
    Found,
}

/// Behavioral contract of the RF transceiver chip.
///
/// Register wire encoding is the implementor's concern; the core only sees
/// these operations.
pub trait RfTransceiver {
    /// Raw RSSI in 0.5 dB units.
    fn read_rssi(&mut self) -> u16;

    /// Level-triggered squelch state.
    fn squelch_is_open(&mut self) -> bool;

    /// Drain pending edge-triggered events. Each event is reported once.
    fn drain_events(&mut self) -> RfEvents;

    /// Current comparison state of the configured sub-audible code.
    fn code_match_status(&mut self) -> CodeMatch;

    /// Level readout of the tail-condition detector.
    fn tail_condition(&mut self) -> bool;

    /// Latest frequency-scan result, `None` while still measuring.
    fn frequency_scan_result(&mut self) -> Option<u32>;

    /// Latest CTCSS/CDCSS scan result.
    fn css_scan_result(&mut self) -> CssScanResult;

    /// Write the front-end gain chain registers.
    fn write_gain_registers(&mut self, short_lna: u8, lna: u8, mixer: u8, pga: u8);

    /// Re-synthesize to a frequency without touching the rest of the receive
    /// configuration (scan fast path, end-of-reception cleanup).
    fn retune(&mut self, frequency: u32);

    /// Select the RX filter path for a frequency.
    fn set_filter_path(&mut self, frequency: u32);

    /// Full receive-chain reconfiguration for a channel (scan slow path,
    /// mode transitions).
    fn configure_receive(&mut self, vfo: &VfoChannel);

    /// Speaker audio path on/off.
    fn set_speaker(&mut self, enabled: bool);

    /// Receiver chain power (dropped during power save).
    fn set_receiver_enabled(&mut self, enabled: bool);

    /// Switch the chain over for transmission on a channel.
    fn prepare_transmit(&mut self, vfo: &VfoChannel);

    /// End-of-transmission sequence back to a muted receive chain.
    fn end_transmit(&mut self);
}
