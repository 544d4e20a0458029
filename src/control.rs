//! Control-loop composition root
//!
//! Owns every state machine and runs them in a fixed order once per 10 ms
//! tick: gain control and reception first (leaf consumers of RF state), then
//! code search, then the scan engine (which consumes the pipeline's idle
//! signal), and the operating-mode commit last. The hardware timer only ever
//! calls [`ControlLoop::hardware_tick`]; everything else happens in
//! [`ControlLoop::poll`] on the main loop.

use log::info;

use crate::agc::AutoGainController;
use crate::channel::{Modulation, VfoChannel};
use crate::code_search::{CodeSearchEngine, CodeSearchOutcome, CodeSearchState};
use crate::config::power;
use crate::mode::{ModeRequest, OperatingModeController, OperatingState, PowerSaveGuards};
use crate::reception::{ReceptionMode, ReceptionPipeline, ReceptionPolicy};
use crate::rf::traits::RfTransceiver;
use crate::scan::{ResumePolicy, ScanDirection, ScanEngine, ScanSignal};
use crate::scheduler::{TickScheduler, TimerId, TimerRegistry};
use crate::store::ChannelStore;

/// Read-only view of the control state for the UI collaborator. Consumers
/// poll [`ControlLoop::take_status_dirty`] instead of receiving callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub operating_state: OperatingState,
    pub reception_mode: ReceptionMode,
    pub scan_direction: ScanDirection,
    pub code_search_state: CodeSearchState,
    pub active_vfo: u8,
    pub corrected_rssi: u16,
}

pub struct ControlLoop<R: RfTransceiver, S: ChannelStore> {
    rf: R,
    store: S,
    timers: TimerRegistry,
    scheduler: TickScheduler,
    vfos: [VfoChannel; 2],
    active_vfo: usize,
    agc: AutoGainController,
    reception: ReceptionPipeline,
    scan: ScanEngine,
    code_search: CodeSearchEngine,
    mode: OperatingModeController,

    /// External TX policy (band plan, battery, busy lockout)
    pub tx_allowed: bool,
    pub menu_open: bool,
    pub dtmf_call_active: bool,
    pub charge_current_high: bool,

    last_status: StatusSnapshot,
    status_dirty: bool,
    beep_pending: bool,
    dtmf_poll_pending: bool,
}

impl<R: RfTransceiver, S: ChannelStore> ControlLoop<R, S> {
    pub fn new(mut rf: R, store: S) -> Self {
        let vfos = [VfoChannel::default(), VfoChannel::default()];
        rf.configure_receive(&vfos[0]);

        let mut timers = TimerRegistry::new();
        timers.start(TimerId::BatterySave, power::BATTERY_SAVE_SLOW_TICKS);

        let last_status = StatusSnapshot {
            operating_state: OperatingState::Foreground,
            reception_mode: ReceptionMode::None,
            scan_direction: ScanDirection::Off,
            code_search_state: CodeSearchState::Off,
            active_vfo: 0,
            corrected_rssi: 0,
        };

        Self {
            rf,
            store,
            timers,
            scheduler: TickScheduler::new(),
            vfos,
            active_vfo: 0,
            agc: AutoGainController::new(),
            reception: ReceptionPipeline::new(),
            scan: ScanEngine::new(),
            code_search: CodeSearchEngine::new(),
            mode: OperatingModeController::new(),
            tx_allowed: true,
            menu_open: false,
            dtmf_call_active: false,
            charge_current_high: false,
            last_status,
            status_dirty: false,
            beep_pending: false,
            dtmf_poll_pending: false,
        }
    }

    /// Interrupt-context entry point: decrement the countdowns and raise the
    /// tick flags. Nothing else may run here.
    #[inline]
    pub fn hardware_tick(&mut self) {
        self.scheduler.on_hardware_tick(&mut self.timers);
    }

    /// One main-loop pass. Does nothing until a hardware tick has elapsed.
    pub fn poll(&mut self) {
        if !self.scheduler.take_tick() {
            return;
        }
        let tick = self.scheduler.tick_count();
        let idx = self.active_vfo;

        let events = self.rf.drain_events();

        if self.mode.state() == OperatingState::PowerSave {
            // The receiver chain is down, so an event can only mean "wake
            // up". Nothing else runs until the wake commits; in particular
            // the reception pipeline must not see the event and replace the
            // pending request with its own.
            if events.any() {
                self.mode.request(ModeRequest::Wake);
            }
            self.commit_mode();
            self.refresh_status();
            return;
        }

        // Gain control runs ahead of everything reading RSSI this pass.
        if self.mode.is_receiving()
            && self.agc.enabled
            && self.vfos[idx].modulation == Modulation::Am
        {
            self.agc.adjust(idx, &mut self.rf, tick);
        }

        let policy = ReceptionPolicy {
            scanning: self.scan.is_scanning(),
            code_searching: self.code_search.is_active(),
            // No point unmuting a candidate the resume policy is about to
            // abandon for the pre-scan position.
            defer_escalation: self.scan.is_scanning()
                && self.scan.resume_policy == ResumePolicy::StopOnCarrier,
            transmitting: self.mode.is_transmitting(),
        };
        let out = self
            .reception
            .process(&mut self.rf, &self.vfos[idx], events, &mut self.timers, tick, policy);

        if let Some(on) = out.speaker {
            self.rf.set_speaker(on);
        }
        if out.retune {
            self.rf.configure_receive(&self.vfos[idx]);
        }
        if let Some(request) = out.mode_request {
            self.mode.request(request);
        }
        self.dtmf_poll_pending = out.poll_dtmf;
        if out.end_of_reception && self.mode.dual_watch_enabled {
            // Linger on this VFO before the alternation moves off it.
            self.timers
                .start(TimerId::DualWatchHold, power::DUAL_WATCH_HOLD_SLOW_TICKS);
        }

        if let Some(outcome) = self.code_search.process(&mut self.rf, &mut self.timers) {
            if outcome == CodeSearchOutcome::Found {
                self.beep_pending = true;
            }
        }

        if !self.code_search.is_active() && !self.mode.is_transmitting() {
            let was_scanning = self.scan.is_scanning();
            let signal = ScanSignal {
                carrier_found: self.reception.mode() != ReceptionMode::None,
                channel_idle: out.channel_idle,
            };
            self.scan.process(
                &mut self.rf,
                &mut self.vfos[idx],
                &mut self.store,
                &mut self.timers,
                signal,
            );
            if was_scanning && !self.scan.is_scanning() && out.mode_request.is_some() {
                // The resume policy stopped the scan and restored the
                // pre-scan position; the candidate's reception is moot.
                self.reception.reset(&mut self.timers);
                self.mode.request(ModeRequest::EndOfReception);
            }
        }

        self.run_dual_watch();
        let _ = self.timers.take_expired(TimerId::DualWatchHold);

        self.commit_mode();
        self.refresh_status();
    }

    fn commit_mode(&mut self) {
        let guards = PowerSaveGuards {
            scanning: self.scan.is_scanning() || self.code_search.is_active(),
            dtmf_call_active: self.dtmf_call_active,
            menu_open: self.menu_open,
            charge_current_high: self.charge_current_high,
        };
        let idx = self.active_vfo;
        if let Some((_, to)) =
            self.mode
                .commit(&mut self.rf, &self.vfos[idx], &mut self.timers, self.tx_allowed, guards)
        {
            if to == OperatingState::Transmit {
                // Keying up invalidates everything on the receive side.
                self.reception.reset(&mut self.timers);
                if self.scan.is_scanning() {
                    self.scan.mark_keep_position();
                    self.scan.stop(
                        &mut self.rf,
                        &mut self.vfos[idx],
                        &mut self.store,
                        &mut self.timers,
                    );
                }
            }
        }
    }

    fn run_dual_watch(&mut self) {
        if !self.timers.take_expired(TimerId::DualWatch) {
            return;
        }
        if self.mode.state() == OperatingState::Foreground
            && !self.scan.is_scanning()
            && !self.code_search.is_active()
            && !self.timers.is_running(TimerId::DualWatchHold)
        {
            self.active_vfo ^= 1;
            info!("dual watch: monitoring VFO {}", self.active_vfo);
            self.rf.configure_receive(&self.vfos[self.active_vfo]);
            self.reception.reset(&mut self.timers);
        }
        self.mode.resync_dual_watch(&mut self.timers);
    }

    fn refresh_status(&mut self) {
        let snapshot = self.status();
        if snapshot != self.last_status {
            self.last_status = snapshot;
            self.status_dirty = true;
        }
    }

    // ----- keypad entry points -----

    pub fn start_channel_scan(&mut self, direction: ScanDirection) {
        let idx = self.active_vfo;
        self.scan.dual_watch_channel = self.vfos[idx ^ 1].channel_number;
        self.scan.start_channel_scan(
            direction,
            &mut self.rf,
            &mut self.vfos[idx],
            &self.store,
            &mut self.timers,
        );
        self.refresh_status();
    }

    pub fn start_frequency_scan(&mut self, direction: ScanDirection) {
        let idx = self.active_vfo;
        self.scan
            .start_frequency_scan(direction, &mut self.rf, &mut self.vfos[idx], &mut self.timers);
        self.refresh_status();
    }

    pub fn stop_scan(&mut self) {
        let idx = self.active_vfo;
        self.scan
            .stop(&mut self.rf, &mut self.vfos[idx], &mut self.store, &mut self.timers);
        self.refresh_status();
    }

    pub fn set_resume_policy(&mut self, policy: ResumePolicy) {
        self.scan.resume_policy = policy;
    }

    pub fn set_scan_list_restricted(&mut self, restricted: bool) {
        self.scan.list_restricted = restricted;
    }

    pub fn set_fast_scan(&mut self, fast: bool) {
        self.scan.fast_scan = fast;
    }

    /// Begin a CTCSS/CDCSS search; any running scan is suspended in place.
    pub fn start_code_search(&mut self) {
        if self.scan.is_scanning() {
            self.scan.mark_keep_position();
            self.stop_scan();
        }
        self.code_search.start(&mut self.timers);
        self.refresh_status();
    }

    pub fn stop_code_search(&mut self) {
        self.code_search.stop(&mut self.timers);
        self.refresh_status();
    }

    pub fn repeat_code_search(&mut self) {
        self.code_search.repeat(&mut self.timers);
        self.refresh_status();
    }

    /// Write the found code into the active channel and retune with it.
    pub fn commit_code_search_result(&mut self) {
        if let Some(code) = self.code_search.detected() {
            let idx = self.active_vfo;
            self.vfos[idx].code_type = code.code_type;
            self.vfos[idx].code_value = code.value;
            self.rf.configure_receive(&self.vfos[idx]);
        }
    }

    pub fn toggle_dual_watch(&mut self) {
        self.mode.dual_watch_enabled = !self.mode.dual_watch_enabled;
        self.mode.resync_dual_watch(&mut self.timers);
    }

    pub fn set_agc_enabled(&mut self, enabled: bool) {
        self.agc.enabled = enabled;
        if !enabled {
            let idx = self.active_vfo;
            self.agc.reset(idx, &mut self.rf);
        }
    }

    /// Raw PTT level, sampled once per tick by the platform layer.
    pub fn ptt_sample(&mut self, pressed: bool) {
        self.mode.ptt_sample(pressed);
    }

    pub fn wake(&mut self) {
        if self.mode.state() == OperatingState::PowerSave {
            self.mode.request(ModeRequest::Wake);
        }
    }

    // ----- UI-facing queries -----

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            operating_state: self.mode.state(),
            reception_mode: self.reception.mode(),
            scan_direction: self.scan.direction(),
            code_search_state: self.code_search.state(),
            active_vfo: self.active_vfo as u8,
            corrected_rssi: self.agc.state(self.active_vfo).corrected_rssi(),
        }
    }

    pub fn take_status_dirty(&mut self) -> bool {
        core::mem::take(&mut self.status_dirty)
    }

    pub fn take_beep_request(&mut self) -> bool {
        core::mem::take(&mut self.beep_pending)
    }

    /// The DTMF decoder collaborator should run this pass.
    pub fn take_dtmf_poll(&mut self) -> bool {
        core::mem::take(&mut self.dtmf_poll_pending)
    }

    pub fn operating_state(&self) -> OperatingState {
        self.mode.state()
    }

    pub fn active_vfo(&self) -> &VfoChannel {
        &self.vfos[self.active_vfo]
    }

    pub fn active_vfo_mut(&mut self) -> &mut VfoChannel {
        &mut self.vfos[self.active_vfo]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agc::MAX_GAIN_INDEX;
    use crate::channel::CodeType;
    use crate::config::{scan, timing};
    use crate::rf::traits::mock::MockRf;
    use crate::rf::traits::CssScanResult;
    use crate::store::mock::MockChannelStore;

    fn control() -> ControlLoop<MockRf, MockChannelStore> {
        ControlLoop::new(MockRf::new(), MockChannelStore::new())
    }

    fn tick(cl: &mut ControlLoop<MockRf, MockChannelStore>) {
        cl.hardware_tick();
        cl.poll();
    }

    #[test]
    fn test_squelch_open_reaches_receive_via_new_receive() {
        let mut cl = control();

        cl.rf.queue_squelch_open();
        tick(&mut cl);

        // No code configured: one pass takes the carrier all the way to
        // unmuted listening, and the mode controller walked the full
        // Foreground -> NewReceive -> Receive sequence.
        assert_eq!(cl.operating_state(), OperatingState::Receive);
        assert_eq!(cl.reception.mode(), ReceptionMode::Listening);
        assert!(cl.rf.speaker_on);

        cl.rf.queue_squelch_close();
        tick(&mut cl);
        assert_eq!(cl.operating_state(), OperatingState::Foreground);
        assert!(!cl.rf.speaker_on);
    }

    #[test]
    fn test_stop_on_carrier_ends_scan_and_restores_channel() {
        let mut cl = control();
        cl.set_resume_policy(ResumePolicy::StopOnCarrier);
        cl.set_scan_list_restricted(false);

        cl.store.define(3, 43_300_000, false, false);
        cl.store.define(4, 43_310_000, false, false);
        *cl.active_vfo_mut() = cl.store.channel(3).unwrap();

        cl.start_channel_scan(ScanDirection::Forward);
        assert_eq!(cl.active_vfo().channel_number, Some(4));

        // A qualifying carrier appears on the candidate.
        cl.rf.queue_squelch_open();
        tick(&mut cl);

        assert_eq!(cl.scan.direction(), ScanDirection::Off);
        assert_eq!(cl.active_vfo().channel_number, Some(3));
        assert_eq!(cl.store.saved_position, Some((Some(3), 43_300_000)));
        // The deferred escalation never unmuted the abandoned candidate,
        // and the carrier's mode request died with it.
        assert!(!cl.rf.speaker_on);
        assert_eq!(cl.operating_state(), OperatingState::Foreground);
        assert_eq!(cl.reception.mode(), ReceptionMode::None);
    }

    #[test]
    fn test_am_gain_jump_lands_in_one_pass() {
        let mut cl = control();
        cl.agc.enabled = true;
        cl.active_vfo_mut().modulation = Modulation::Am;

        // A strong carrier, 14 dB over target (raw is 0.5 dB units).
        let strong = crate::config::agc::DESIRED_RSSI + 28;
        cl.rf.script_rssi(&[strong]);

        tick(&mut cl);
        // One register write straight to the jump target, not a step.
        assert_eq!(cl.rf.gain_writes.len(), 1);
        assert!(cl.agc.state(0).index() < MAX_GAIN_INDEX - 1);
    }

    #[test]
    fn test_agc_idle_while_transmitting() {
        let mut cl = control();
        cl.agc.enabled = true;
        cl.active_vfo_mut().modulation = Modulation::Am;
        cl.rf.script_rssi(&[300, 300, 300, 300]);

        for _ in 0..timing::PTT_DEBOUNCE_SAMPLES {
            cl.ptt_sample(true);
        }
        // The loop still runs on the keying pass itself; once Transmit has
        // committed it must leave the gain registers alone.
        tick(&mut cl);
        assert_eq!(cl.operating_state(), OperatingState::Transmit);
        let writes = cl.rf.gain_writes.len();

        for _ in 0..5 {
            tick(&mut cl);
        }
        assert_eq!(cl.rf.gain_writes.len(), writes);
    }

    #[test]
    fn test_ptt_during_scan_stops_scan_in_place() {
        let mut cl = control();
        cl.set_scan_list_restricted(false);
        cl.store.define(1, 43_300_000, false, false);
        cl.store.define(2, 43_310_000, false, false);
        *cl.active_vfo_mut() = cl.store.channel(1).unwrap();

        cl.start_channel_scan(ScanDirection::Forward);
        assert_eq!(cl.active_vfo().channel_number, Some(2));

        for _ in 0..timing::PTT_DEBOUNCE_SAMPLES {
            cl.ptt_sample(true);
        }
        tick(&mut cl);

        assert_eq!(cl.operating_state(), OperatingState::Transmit);
        assert_eq!(cl.scan.direction(), ScanDirection::Off);
        // Keyed up on the scan position, not the pre-scan channel.
        assert_eq!(cl.active_vfo().channel_number, Some(2));
    }

    #[test]
    fn test_dual_watch_alternates_vfos() {
        let mut cl = control();
        cl.vfos[1] = VfoChannel::on_frequency(14_600_000);
        cl.toggle_dual_watch();

        let period = timing::TICKS_PER_SLOW_TICK * u32::from(power::DUAL_WATCH_SLOW_TICKS);
        for _ in 0..period {
            tick(&mut cl);
        }
        assert_eq!(cl.active_vfo, 1);
        assert_eq!(cl.rf.configured_frequencies.last(), Some(&14_600_000));

        for _ in 0..period {
            tick(&mut cl);
        }
        assert_eq!(cl.active_vfo, 0);
    }

    #[test]
    fn test_code_search_found_beeps_and_commits() {
        let mut cl = control();
        cl.start_code_search();

        for _ in 0..3 {
            cl.rf.queue_freq_scan(Some(43_312_500));
        }
        for _ in 0..3 {
            tick(&mut cl);
        }
        assert_eq!(cl.code_search.state(), CodeSearchState::ScanningCode);

        cl.rf.queue_css_scan(CssScanResult::Cdcss { code: 0o023 });
        tick(&mut cl);
        assert_eq!(cl.code_search.state(), CodeSearchState::Found);
        assert!(cl.take_beep_request());

        cl.commit_code_search_result();
        assert_eq!(cl.active_vfo().code_type, CodeType::Digital);
        assert_eq!(cl.active_vfo().code_value, 0o023);
    }

    #[test]
    fn test_scan_suspended_while_code_search_runs() {
        let mut cl = control();
        cl.set_scan_list_restricted(false);
        cl.store.define(1, 43_300_000, false, false);
        cl.store.define(2, 43_310_000, false, false);
        *cl.active_vfo_mut() = cl.store.channel(1).unwrap();

        cl.start_channel_scan(ScanDirection::Forward);
        cl.start_code_search();
        assert_eq!(cl.scan.direction(), ScanDirection::Off);

        // Long quiet stretch: the channel cursor must not move.
        let before = cl.active_vfo().channel_number;
        for _ in 0..(2 * scan::PAUSE_TICKS as u32) {
            tick(&mut cl);
        }
        assert_eq!(cl.active_vfo().channel_number, before);
    }

    #[test]
    fn test_power_save_after_inactivity_and_wake() {
        let mut cl = control();

        let ticks = timing::TICKS_PER_SLOW_TICK * u32::from(power::BATTERY_SAVE_SLOW_TICKS);
        for _ in 0..ticks {
            tick(&mut cl);
        }
        assert_eq!(cl.operating_state(), OperatingState::PowerSave);
        assert!(!cl.rf.receiver_enabled);

        cl.wake();
        tick(&mut cl);
        assert_eq!(cl.operating_state(), OperatingState::Foreground);
        assert!(cl.rf.receiver_enabled);
    }

    #[test]
    fn test_receive_event_wakes_from_power_save() {
        let mut cl = control();

        let ticks = timing::TICKS_PER_SLOW_TICK * u32::from(power::BATTERY_SAVE_SLOW_TICKS);
        for _ in 0..ticks {
            tick(&mut cl);
        }
        assert_eq!(cl.operating_state(), OperatingState::PowerSave);

        // A carrier event must bring the chain back up on its own; the
        // pipeline does not get to turn it into a Receive request first.
        cl.rf.queue_squelch_open();
        tick(&mut cl);
        assert_eq!(cl.operating_state(), OperatingState::Foreground);
        assert!(cl.rf.receiver_enabled);
        assert_eq!(cl.reception.mode(), ReceptionMode::None);
        assert!(!cl.rf.speaker_on);
    }

    #[test]
    fn test_reception_muted_while_code_search_runs() {
        let mut cl = control();
        cl.start_code_search();

        // The searched carrier opens the squelch; that is the search's
        // working material, not a reception.
        cl.rf.queue_squelch_open();
        tick(&mut cl);

        assert!(!cl.rf.speaker_on);
        assert_eq!(cl.operating_state(), OperatingState::Foreground);
        assert_eq!(cl.reception.mode(), ReceptionMode::None);
        assert_eq!(cl.code_search.state(), CodeSearchState::ScanningCarrier);
    }

    #[test]
    fn test_scanning_blocks_power_save() {
        let mut cl = control();
        cl.set_scan_list_restricted(false);
        cl.store.define(1, 43_300_000, false, false);
        *cl.active_vfo_mut() = cl.store.channel(1).unwrap();
        cl.start_channel_scan(ScanDirection::Forward);

        let ticks = 2 * timing::TICKS_PER_SLOW_TICK * u32::from(power::BATTERY_SAVE_SLOW_TICKS);
        for _ in 0..ticks {
            tick(&mut cl);
        }
        assert_ne!(cl.operating_state(), OperatingState::PowerSave);
    }

    #[test]
    fn test_status_dirty_tracks_changes() {
        let mut cl = control();
        assert!(!cl.take_status_dirty());

        cl.rf.queue_squelch_open();
        tick(&mut cl);
        assert!(cl.take_status_dirty());

        // Quiet passes leave the snapshot untouched.
        tick(&mut cl);
        assert!(!cl.take_status_dirty());
    }
}
