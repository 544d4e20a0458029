//! Top-level operating-mode state machine
//!
//! Exactly one [`OperatingState`] exists; only this controller mutates it.
//! Components file requests during a main-loop pass and the controller
//! commits at most one transition at the end of the pass, applying the RF
//! side effects and resetting the countdowns it owns (battery save, dual
//! watch).

use log::debug;

use crate::channel::VfoChannel;
use crate::config::power;
use crate::config::timing;
use crate::rf::traits::RfTransceiver;
use crate::scheduler::{TimerId, TimerRegistry};

/// What the radio is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingState {
    /// Idle receive, dual-watch and scan eligible
    Foreground,
    /// A qualifying carrier was just detected, audio still muted
    NewReceive,
    /// Confirmed valid signal, audio unmuted
    Receive,
    Transmit,
    /// Receiver chain powered down between wake windows
    PowerSave,
    /// Spectrum sweep display
    Panadapter,
}

/// Transition requests other components may file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeRequest {
    /// Reception pipeline: qualifying carrier appeared
    NewReceive,
    /// Reception pipeline: escalate to unmuted listening
    Receive,
    /// Reception pipeline: channel went quiet / tail eliminated
    EndOfReception,
    /// Push-to-talk pressed (subject to the TX-allowed check)
    Transmit,
    /// Push-to-talk released
    EndTransmit,
    Panadapter,
    ExitPanadapter,
    /// Leave power save
    Wake,
}

/// External conditions that veto entering power save.
#[derive(Debug, Clone, Copy, Default)]
pub struct PowerSaveGuards {
    pub scanning: bool,
    pub dtmf_call_active: bool,
    pub menu_open: bool,
    pub charge_current_high: bool,
}

impl PowerSaveGuards {
    fn blocked(&self) -> bool {
        self.scanning || self.dtmf_call_active || self.menu_open || self.charge_current_high
    }
}

/// The state machine plus the PTT debouncer feeding it.
pub struct OperatingModeController {
    state: OperatingState,
    pending: Option<ModeRequest>,
    pub dual_watch_enabled: bool,
    ptt_last_sample: bool,
    ptt_stable: bool,
    ptt_stable_count: u8,
}

impl OperatingModeController {
    pub const fn new() -> Self {
        Self {
            state: OperatingState::Foreground,
            pending: None,
            dual_watch_enabled: false,
            ptt_last_sample: false,
            ptt_stable: false,
            ptt_stable_count: 0,
        }
    }

    #[inline]
    pub fn state(&self) -> OperatingState {
        self.state
    }

    /// True in any state where the receive chain is live.
    #[inline]
    pub fn is_receiving(&self) -> bool {
        matches!(
            self.state,
            OperatingState::Foreground | OperatingState::NewReceive | OperatingState::Receive
        )
    }

    #[inline]
    pub fn is_transmitting(&self) -> bool {
        self.state == OperatingState::Transmit
    }

    /// File a transition request; committed on the next pass. The latest
    /// request in a pass wins, matching the single-owner rule: only the
    /// pipeline and the keypad file requests, never in the same pass.
    pub fn request(&mut self, request: ModeRequest) {
        self.pending = Some(request);
    }

    /// Feed one 10 ms sample of the PTT input. Requires 3 consecutive equal
    /// samples before the level is believed, then files Transmit/EndTransmit
    /// on the debounced edges.
    pub fn ptt_sample(&mut self, pressed: bool) {
        if pressed == self.ptt_last_sample {
            self.ptt_stable_count = self.ptt_stable_count.saturating_add(1);
        } else {
            self.ptt_last_sample = pressed;
            self.ptt_stable_count = 1;
        }

        if self.ptt_stable_count >= timing::PTT_DEBOUNCE_SAMPLES && pressed != self.ptt_stable {
            self.ptt_stable = pressed;
            if pressed {
                self.request(ModeRequest::Transmit);
            } else if self.state == OperatingState::Transmit {
                self.request(ModeRequest::EndTransmit);
            }
        }
    }

    /// Commit the pending transition, if legal, and run the power-save
    /// timeout check. Returns the transition that took place.
    pub fn commit<R: RfTransceiver>(
        &mut self,
        rf: &mut R,
        vfo: &VfoChannel,
        timers: &mut TimerRegistry,
        tx_allowed: bool,
        guards: PowerSaveGuards,
    ) -> Option<(OperatingState, OperatingState)> {
        let request = self.pending.take();

        // A straight-to-Listening escalation still passes through NewReceive
        // so every observer sees the full sequence.
        if self.state == OperatingState::Foreground && request == Some(ModeRequest::Receive) {
            self.enter(OperatingState::NewReceive, rf, vfo, timers);
            let (_, to) = self.enter(OperatingState::Receive, rf, vfo, timers);
            return Some((OperatingState::Foreground, to));
        }

        let next = match (self.state, request) {
            (OperatingState::Foreground, Some(ModeRequest::NewReceive)) => {
                Some(OperatingState::NewReceive)
            }
            (OperatingState::Foreground | OperatingState::NewReceive, Some(ModeRequest::Receive)) => {
                Some(OperatingState::Receive)
            }
            (
                OperatingState::NewReceive | OperatingState::Receive,
                Some(ModeRequest::EndOfReception),
            ) => Some(OperatingState::Foreground),
            (
                OperatingState::Foreground
                | OperatingState::NewReceive
                | OperatingState::Receive
                | OperatingState::Panadapter,
                Some(ModeRequest::Transmit),
            ) if tx_allowed => Some(OperatingState::Transmit),
            (OperatingState::Transmit, Some(ModeRequest::EndTransmit)) => {
                Some(OperatingState::Foreground)
            }
            (OperatingState::Foreground, Some(ModeRequest::Panadapter)) => {
                Some(OperatingState::Panadapter)
            }
            (OperatingState::Panadapter, Some(ModeRequest::ExitPanadapter)) => {
                Some(OperatingState::Foreground)
            }
            (OperatingState::PowerSave, Some(ModeRequest::Wake)) => Some(OperatingState::Foreground),
            // Everything else is an illegal combination and a deliberate no-op.
            _ => None,
        };

        if let Some(next) = next {
            return Some(self.enter(next, rf, vfo, timers));
        }

        // Inactivity timeout: only from a receive-capable state, and only
        // when nothing user-visible is in progress.
        if timers.take_expired(TimerId::BatterySave) {
            if matches!(
                self.state,
                OperatingState::Foreground | OperatingState::Receive
            ) && !guards.blocked()
            {
                return Some(self.enter(OperatingState::PowerSave, rf, vfo, timers));
            }
            // Not eligible yet; try again after another full period.
            timers.start(TimerId::BatterySave, power::BATTERY_SAVE_SLOW_TICKS);
        }

        None
    }

    fn enter<R: RfTransceiver>(
        &mut self,
        next: OperatingState,
        rf: &mut R,
        vfo: &VfoChannel,
        timers: &mut TimerRegistry,
    ) -> (OperatingState, OperatingState) {
        let from = self.state;
        debug!("mode: {:?} -> {:?}", from, next);

        // Leaving Transmit always runs the end-of-transmission sequence;
        // there is no other edge out of Transmit.
        if from == OperatingState::Transmit {
            rf.end_transmit();
        }
        if from == OperatingState::PowerSave {
            rf.set_receiver_enabled(true);
        }

        self.state = next;

        // Countdowns owned by this component restart on every transition.
        timers.start(TimerId::BatterySave, power::BATTERY_SAVE_SLOW_TICKS);
        self.resync_dual_watch(timers);

        match next {
            OperatingState::Foreground => {
                rf.set_speaker(false);
                rf.configure_receive(vfo);
            }
            OperatingState::NewReceive => {
                // Carrier detected, stay muted until the pipeline escalates.
            }
            OperatingState::Receive => {
                rf.set_speaker(true);
            }
            OperatingState::Transmit => {
                rf.set_speaker(false);
                timers.cancel(TimerId::DualWatch);
                rf.prepare_transmit(vfo);
            }
            OperatingState::PowerSave => {
                rf.set_speaker(false);
                timers.cancel(TimerId::BatterySave);
                rf.set_receiver_enabled(false);
            }
            OperatingState::Panadapter => {
                rf.set_speaker(false);
                rf.configure_receive(vfo);
            }
        }

        (from, next)
    }

    /// Restart (or stop) the dual-watch alternation countdown to match the
    /// current enable flag. Also invoked on wake from power save.
    pub fn resync_dual_watch(&mut self, timers: &mut TimerRegistry) {
        if self.dual_watch_enabled {
            timers.start(TimerId::DualWatch, power::DUAL_WATCH_SLOW_TICKS);
        } else {
            timers.cancel(TimerId::DualWatch);
        }
    }
}

impl Default for OperatingModeController {
    fn default() -> Self {
        Self::new()
    }
}
