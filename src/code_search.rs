//! Sub-audible code auto-detection
//!
//! Once a carrier is of interest, this engine works out which CTCSS tone or
//! CDCSS code it carries: first the chip's frequency scanner must agree with
//! itself three times running (±1 kHz), then the code scanner must produce a
//! stable decode. CTCSS needs three identical polls; a digital code is
//! self-validating and one decode is enough. Both phases share one overall
//! timeout.

use log::{debug, info};

use crate::channel::CodeType;
use crate::config::code_search;
use crate::rf::traits::{CssScanResult, RfTransceiver};
use crate::scheduler::{TimerId, TimerRegistry};

/// Search progress. The two scanning phases are explicit variants rather
/// than a shared state with a phase flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeSearchState {
    Off,
    /// Waiting for the frequency scanner to settle on a carrier
    ScanningCarrier,
    /// Carrier locked, waiting for a stable code decode
    ScanningCode,
    Found,
    /// Code acquisition timed out
    Failed,
    /// No stable carrier frequency was found
    FreqFailed,
    /// Re-running code acquisition on the previously found carrier
    Repeat,
}

/// Terminal outcome of a search, reported once on the pass it happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeSearchOutcome {
    Found,
    Failed,
    FreqFailed,
}

/// A detected sub-audible code, ready to be committed to the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedCode {
    pub code_type: CodeType,
    pub value: u16,
}

/// The code-search session. At most one exists, owned by the composition
/// root; starting it is expected to suspend scan-list scanning.
pub struct CodeSearchEngine {
    state: CodeSearchState,
    /// Last frequency the scanner reported, 10 Hz units
    candidate_freq: u32,
    hits: u8,
    last_tone: u16,
    detected: Option<DetectedCode>,
}

impl CodeSearchEngine {
    pub const fn new() -> Self {
        Self {
            state: CodeSearchState::Off,
            candidate_freq: 0,
            hits: 0,
            last_tone: 0,
            detected: None,
        }
    }

    #[inline]
    pub fn state(&self) -> CodeSearchState {
        self.state
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            CodeSearchState::ScanningCarrier
                | CodeSearchState::ScanningCode
                | CodeSearchState::Repeat
        )
    }

    #[inline]
    pub fn candidate_frequency(&self) -> u32 {
        self.candidate_freq
    }

    /// The latched result, if the last search Found one.
    #[inline]
    pub fn detected(&self) -> Option<DetectedCode> {
        self.detected
    }

    /// Begin a fresh search from carrier acquisition.
    pub fn start(&mut self, timers: &mut TimerRegistry) {
        info!("code search: start");
        self.state = CodeSearchState::ScanningCarrier;
        self.candidate_freq = 0;
        self.hits = 0;
        self.last_tone = 0;
        self.detected = None;
        timers.start(TimerId::CodeSearchTimeout, code_search::TIMEOUT_TICKS);
    }

    /// Re-run code acquisition on the carrier found last time.
    pub fn repeat(&mut self, timers: &mut TimerRegistry) {
        if self.candidate_freq == 0 {
            self.start(timers);
            return;
        }
        info!("code search: repeat on {}", self.candidate_freq);
        self.state = CodeSearchState::Repeat;
        self.hits = 0;
        self.last_tone = 0;
        self.detected = None;
        timers.start(TimerId::CodeSearchTimeout, code_search::TIMEOUT_TICKS);
    }

    /// Cancel the session. The terminal states are left in place so the UI
    /// can show them; re-invoking `start` is the only way out of them.
    pub fn stop(&mut self, timers: &mut TimerRegistry) {
        self.state = CodeSearchState::Off;
        timers.cancel(TimerId::CodeSearchTimeout);
    }

    /// One 10 ms poll of the chip's scanners.
    pub fn process<R: RfTransceiver>(
        &mut self,
        rf: &mut R,
        timers: &mut TimerRegistry,
    ) -> Option<CodeSearchOutcome> {
        if !self.is_active() {
            return None;
        }

        if timers.take_expired(TimerId::CodeSearchTimeout) {
            let outcome = match self.state {
                CodeSearchState::ScanningCarrier => {
                    self.state = CodeSearchState::FreqFailed;
                    CodeSearchOutcome::FreqFailed
                }
                _ => {
                    self.state = CodeSearchState::Failed;
                    CodeSearchOutcome::Failed
                }
            };
            debug!("code search: timeout -> {:?}", self.state);
            return Some(outcome);
        }

        match self.state {
            CodeSearchState::ScanningCarrier => {
                self.poll_carrier(rf);
                None
            }
            CodeSearchState::ScanningCode | CodeSearchState::Repeat => self.poll_code(rf, timers),
            _ => None,
        }
    }

    fn poll_carrier<R: RfTransceiver>(&mut self, rf: &mut R) {
        let Some(freq) = rf.frequency_scan_result() else {
            return;
        };

        if self.candidate_freq != 0
            && freq.abs_diff(self.candidate_freq) <= code_search::FREQ_TOLERANCE
        {
            self.hits += 1;
        } else {
            // Out of tolerance (or first reading): start the count over.
            self.hits = if self.candidate_freq == 0 { 1 } else { 0 };
        }
        self.candidate_freq = freq;

        if self.hits >= code_search::CARRIER_HITS {
            debug!("code search: carrier locked at {}", freq);
            rf.retune(freq);
            rf.set_filter_path(freq);
            self.state = CodeSearchState::ScanningCode;
            self.hits = 0;
            self.last_tone = 0;
        }
    }

    fn poll_code<R: RfTransceiver>(
        &mut self,
        rf: &mut R,
        timers: &mut TimerRegistry,
    ) -> Option<CodeSearchOutcome> {
        match rf.css_scan_result() {
            CssScanResult::NotFound => None,
            CssScanResult::Ctcss { tone } => {
                if tone == self.last_tone {
                    self.hits += 1;
                } else {
                    // A different tone counts as the first hit of itself.
                    self.last_tone = tone;
                    self.hits = 1;
                }
                if self.hits >= code_search::CTCSS_HITS {
                    self.found(
                        DetectedCode {
                            code_type: CodeType::ContinuousTone,
                            value: tone,
                        },
                        timers,
                    );
                    Some(CodeSearchOutcome::Found)
                } else {
                    None
                }
            }
            CssScanResult::Cdcss { code } => {
                // Digital codes carry their own error correction; one valid
                // decode is conclusive.
                self.found(
                    DetectedCode {
                        code_type: CodeType::Digital,
                        value: code,
                    },
                    timers,
                );
                Some(CodeSearchOutcome::Found)
            }
        }
    }

    fn found(&mut self, code: DetectedCode, timers: &mut TimerRegistry) {
        info!("code search: found {:?} {}", code.code_type, code.value);
        self.detected = Some(code);
        self.state = CodeSearchState::Found;
        timers.cancel(TimerId::CodeSearchTimeout);
    }
}

impl Default for CodeSearchEngine {
    fn default() -> Self {
        Self::new()
    }
}
