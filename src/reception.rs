//! Reception validation pipeline
//!
//! Consumes the front end's squelch and code-match events and decides
//! whether a carrier qualifies, when the audio may be unmuted, and when a
//! transmission has ended. The tail-tone elimination sub-sequence mutes the
//! speaker over the squelch "thump" as the remote side drops its code.
//!
//! None of these paths can fail; event combinations the current state cannot
//! use are ignored.

use crate::channel::{CodeType, VfoChannel};
use crate::config::timing;
use crate::mode::ModeRequest;
use crate::rf::traits::{RfEvents, RfTransceiver};
use crate::scheduler::{TimerId, TimerRegistry};

/// Progress from "carrier present" to "audio unmuted".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceptionMode {
    /// No qualifying carrier
    None,
    /// Carrier present, validation in progress or escalation deferred
    Detected,
    /// Confirmed valid, audio unmuted
    Listening,
}

/// Tail-tone elimination sub-sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailToneState {
    Idle,
    /// Speaker muted, countdown running
    InProgress,
}

/// What one pipeline pass asks the rest of the system to do.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReceptionOutput {
    /// Speaker path change, if any
    pub speaker: Option<bool>,
    /// Operating-mode transition to file
    pub mode_request: Option<ModeRequest>,
    /// A reception just finished (tail eliminated or carrier dropped)
    pub end_of_reception: bool,
    /// The channel went quiet; the scan engine may resume
    pub channel_idle: bool,
    /// Ask for a clean re-synthesis of the receive registers
    pub retune: bool,
    /// The DTMF decoder should be polled this pass
    pub poll_dtmf: bool,
}

/// Per-pass context flags the pipeline needs from the composition root.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReceptionPolicy {
    /// An RF/channel scan is running
    pub scanning: bool,
    /// A code search owns the receive path
    pub code_searching: bool,
    /// Dual-watch wants the escalation held back for this pass
    pub defer_escalation: bool,
    /// The radio is transmitting; receive events are stale
    pub transmitting: bool,
}

/// The reception-validation state machine.
pub struct ReceptionPipeline {
    mode: ReceptionMode,
    tail: TailToneState,
}

impl ReceptionPipeline {
    pub const fn new() -> Self {
        Self {
            mode: ReceptionMode::None,
            tail: TailToneState::Idle,
        }
    }

    #[inline]
    pub fn mode(&self) -> ReceptionMode {
        self.mode
    }

    #[inline]
    pub fn tail_state(&self) -> TailToneState {
        self.tail
    }

    /// Drop all reception state, e.g. when keying up or changing channel.
    pub fn reset(&mut self, timers: &mut TimerRegistry) {
        self.mode = ReceptionMode::None;
        self.tail = TailToneState::Idle;
        timers.cancel(TimerId::TailTone);
    }

    /// One pipeline pass: handle the drained events, poll the tail detector
    /// in its 40 ms slot, and run the tail-elimination countdown.
    pub fn process<R: RfTransceiver>(
        &mut self,
        rf: &mut R,
        vfo: &VfoChannel,
        events: RfEvents,
        timers: &mut TimerRegistry,
        tick: u32,
        policy: ReceptionPolicy,
    ) -> ReceptionOutput {
        let mut out = ReceptionOutput::default();

        if policy.transmitting {
            // Receive-side events during our own transmission carry no
            // information; swallow them.
            return out;
        }

        if policy.code_searching {
            // The search engine is acquiring on this carrier; a squelch
            // opening is its working material, not a reception.
            return out;
        }

        out.poll_dtmf = self.mode == ReceptionMode::Listening;

        if events.squelch_closed {
            self.on_squelch_closed(timers, &mut out);
            return out;
        }

        if events.squelch_opened && self.mode == ReceptionMode::None {
            self.mode = ReceptionMode::Detected;
            out.mode_request = Some(ModeRequest::NewReceive);
            if !vfo.has_code() && !policy.defer_escalation {
                self.escalate(&mut out);
            }
        }

        if self.mode == ReceptionMode::Detected {
            // A configured code qualifies the carrier on its first match.
            let matched = events.code_found
                || (vfo.has_code()
                    && matches!(
                        rf.code_match_status(),
                        crate::rf::traits::CodeMatch::Found
                    ));
            if vfo.has_code() && matched && !policy.defer_escalation {
                self.escalate(&mut out);
            } else if !vfo.has_code() && !policy.defer_escalation && rf.squelch_is_open() {
                // Escalation was deferred earlier in this reception.
                self.escalate(&mut out);
            }
        }

        if self.mode == ReceptionMode::Listening {
            self.while_listening(rf, vfo, events, timers, tick, &mut out);
        }

        // Tail countdown completion ends the reception.
        if self.tail == TailToneState::InProgress && timers.take_expired(TimerId::TailTone) {
            self.tail = TailToneState::Idle;
            self.mode = ReceptionMode::None;
            out.end_of_reception = true;
            out.channel_idle = true;
            out.retune = true;
            out.mode_request = Some(ModeRequest::EndOfReception);
            out.poll_dtmf = false;
        }

        out
    }

    fn escalate(&mut self, out: &mut ReceptionOutput) {
        self.mode = ReceptionMode::Listening;
        out.speaker = Some(true);
        out.mode_request = Some(ModeRequest::Receive);
        out.poll_dtmf = true;
    }

    fn on_squelch_closed(&mut self, timers: &mut TimerRegistry, out: &mut ReceptionOutput) {
        let was_active = self.mode != ReceptionMode::None;
        self.mode = ReceptionMode::None;
        self.tail = TailToneState::Idle;
        timers.cancel(TimerId::TailTone);

        if was_active {
            out.speaker = Some(false);
            out.end_of_reception = true;
            out.mode_request = Some(ModeRequest::EndOfReception);
        }
        out.channel_idle = true;
        out.poll_dtmf = false;
    }

    fn while_listening<R: RfTransceiver>(
        &mut self,
        rf: &mut R,
        vfo: &VfoChannel,
        events: RfEvents,
        timers: &mut TimerRegistry,
        tick: u32,
        out: &mut ReceptionOutput,
    ) {
        // Code dropped mid-reception. For positive CDCSS the detector
        // reports transient losses, so only the tail marker ends those.
        if events.code_lost && vfo.has_code() && !vfo.code_type.is_positive_digital() {
            self.mode = ReceptionMode::Detected;
            out.speaker = Some(false);
            out.poll_dtmf = false;
            return;
        }

        if self.tail == TailToneState::InProgress {
            return;
        }

        let tail_seen = match vfo.code_type {
            CodeType::ContinuousTone => events.tail_detected,
            CodeType::Digital => {
                // Positive digital codes only, and at most once per 40 ms
                // slot to bound the register traffic.
                tick % timing::TAIL_POLL_SLOT_TICKS == 0
                    && (events.tail_detected || rf.tail_condition())
            }
            CodeType::ReverseDigital | CodeType::None => false,
        };

        if tail_seen {
            self.tail = TailToneState::InProgress;
            timers.start(TimerId::TailTone, timing::TAIL_TONE_TICKS);
            out.speaker = Some(false);
            out.poll_dtmf = false;
        }
    }
}

impl Default for ReceptionPipeline {
    fn default() -> Self {
        Self::new()
    }
}
