//! Channel and frequency scanning
//!
//! The scan engine walks either the stored channel table or a raw frequency
//! range, pausing briefly on each candidate so the reception pipeline can
//! qualify it. A qualifying signal triggers the configured resume policy;
//! stopping restores the position recorded at scan start.

use log::{debug, info};

use crate::channel::{Band, StepSize, VfoChannel};
use crate::config::scan;
use crate::rf::traits::RfTransceiver;
use crate::scheduler::{TimerId, TimerRegistry};
use crate::store::{ChannelStore, ScanList};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDirection {
    Off,
    Forward,
    Reverse,
}

/// Source of the next channel-scan candidate. With list restriction on, the
/// cursor steps one position per accepted candidate so priority-list members
/// get interleaved with the sequential walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListCursor {
    List1,
    List2,
    DualWatchOther,
    UserSequential,
}

impl ListCursor {
    fn next(self) -> ListCursor {
        match self {
            ListCursor::List1 => ListCursor::List2,
            ListCursor::List2 => ListCursor::DualWatchOther,
            ListCursor::DualWatchOther => ListCursor::UserSequential,
            ListCursor::UserSequential => ListCursor::List1,
        }
    }
}

/// What to do when a qualifying signal is found mid-scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePolicy {
    /// Hold on the signal for a fixed time, then move on
    StayOnTimer,
    /// Hold until the carrier drops
    StayOnCarrier,
    /// Stop the scan and return to the pre-scan position
    StopOnCarrier,
}

/// Where to return when the scan stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestorePoint {
    Channel(u8),
    Frequency(u32),
    /// The user retuned during the scan; keep the current position
    Stay,
}

/// Which domain the running session walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanKind {
    Channel,
    Frequency,
}

/// Dwell progress on the current candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DwellState {
    /// Short qualification pause, advancing on expiry
    Pausing,
    /// StayOnTimer hold running
    Holding,
    /// StayOnCarrier, parked until the channel goes idle
    Staying,
    /// Carrier dropped, short grace pause before moving on
    Resuming,
}

/// Per-tick observations the engine needs from the reception side.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanSignal {
    /// A qualifying signal opened on the current candidate
    pub carrier_found: bool,
    /// The current candidate has gone quiet
    pub channel_idle: bool,
}

pub struct ScanEngine {
    direction: ScanDirection,
    kind: ScanKind,
    cursor: ListCursor,
    dwell: DwellState,
    restore: RestorePoint,
    prev_band: Option<Band>,
    pub resume_policy: ResumePolicy,
    /// When false, the cursor is pinned to UserSequential
    pub list_restricted: bool,
    pub fast_scan: bool,
    /// Channel the dual-watch partner VFO sits on, fed by the control loop
    pub dual_watch_channel: Option<u8>,
}

impl ScanEngine {
    pub const fn new() -> Self {
        Self {
            direction: ScanDirection::Off,
            kind: ScanKind::Channel,
            cursor: ListCursor::List1,
            dwell: DwellState::Pausing,
            restore: RestorePoint::Stay,
            prev_band: None,
            resume_policy: ResumePolicy::StayOnTimer,
            list_restricted: true,
            fast_scan: false,
            dual_watch_channel: None,
        }
    }

    #[inline]
    pub fn direction(&self) -> ScanDirection {
        self.direction
    }

    #[inline]
    pub fn is_scanning(&self) -> bool {
        self.direction != ScanDirection::Off
    }

    #[inline]
    pub fn cursor(&self) -> ListCursor {
        self.cursor
    }

    #[inline]
    pub fn restore_point(&self) -> RestorePoint {
        self.restore
    }

    /// Keep whatever position the scan is on when it stops.
    pub fn mark_keep_position(&mut self) {
        self.restore = RestorePoint::Stay;
    }

    /// Start scanning the channel table from the VFO's current slot.
    pub fn start_channel_scan<R: RfTransceiver, S: ChannelStore>(
        &mut self,
        direction: ScanDirection,
        rf: &mut R,
        vfo: &mut VfoChannel,
        store: &S,
        timers: &mut TimerRegistry,
    ) {
        info!("scan: start channel scan {:?}", direction);
        self.direction = direction;
        self.kind = ScanKind::Channel;
        self.cursor = if self.list_restricted {
            ListCursor::List1
        } else {
            ListCursor::UserSequential
        };
        self.restore = match vfo.channel_number {
            Some(ch) => RestorePoint::Channel(ch),
            None => RestorePoint::Frequency(vfo.frequency),
        };
        self.prev_band = Some(vfo.band());
        self.advance_channel(rf, vfo, store, timers);
    }

    /// Start scanning raw frequencies from the VFO's current frequency.
    pub fn start_frequency_scan<R: RfTransceiver>(
        &mut self,
        direction: ScanDirection,
        rf: &mut R,
        vfo: &mut VfoChannel,
        timers: &mut TimerRegistry,
    ) {
        info!("scan: start frequency scan {:?}", direction);
        self.direction = direction;
        self.kind = ScanKind::Frequency;
        self.restore = RestorePoint::Frequency(vfo.frequency);
        self.prev_band = Some(vfo.band());
        vfo.channel_number = None;
        self.advance_frequency(rf, vfo, timers);
    }

    /// End the scan. The restore point is re-applied and persisted unless it
    /// is the stay sentinel.
    pub fn stop<R: RfTransceiver, S: ChannelStore>(
        &mut self,
        rf: &mut R,
        vfo: &mut VfoChannel,
        store: &mut S,
        timers: &mut TimerRegistry,
    ) {
        if self.direction == ScanDirection::Off {
            return;
        }
        info!("scan: stop, restoring {:?}", self.restore);
        self.direction = ScanDirection::Off;
        timers.cancel(TimerId::ScanPause);

        match self.restore {
            RestorePoint::Channel(ch) => {
                if let Some(stored) = store.channel(ch) {
                    *vfo = stored;
                }
                rf.configure_receive(vfo);
                store.save_last_position(vfo.channel_number, vfo.frequency);
            }
            RestorePoint::Frequency(freq) => {
                vfo.frequency = freq;
                vfo.channel_number = None;
                rf.configure_receive(vfo);
                store.save_last_position(None, freq);
            }
            RestorePoint::Stay => {
                store.save_last_position(vfo.channel_number, vfo.frequency);
            }
        }
    }

    /// One main-loop pass while scanning.
    pub fn process<R: RfTransceiver, S: ChannelStore>(
        &mut self,
        rf: &mut R,
        vfo: &mut VfoChannel,
        store: &mut S,
        timers: &mut TimerRegistry,
        signal: ScanSignal,
    ) {
        if self.direction == ScanDirection::Off {
            return;
        }

        match self.dwell {
            DwellState::Pausing => {
                if signal.carrier_found {
                    self.on_carrier_found(rf, vfo, store, timers);
                } else if timers.take_expired(TimerId::ScanPause) {
                    self.advance(rf, vfo, store, timers);
                }
            }
            DwellState::Holding => {
                // The hold runs out even if the candidate is still active.
                if timers.take_expired(TimerId::ScanPause) {
                    self.advance(rf, vfo, store, timers);
                }
            }
            DwellState::Staying => {
                if signal.channel_idle {
                    self.dwell = DwellState::Resuming;
                    timers.start(TimerId::ScanPause, scan::RESUME_TICKS);
                }
            }
            DwellState::Resuming => {
                if signal.carrier_found {
                    // Carrier came back inside the grace pause.
                    self.dwell = DwellState::Staying;
                    timers.cancel(TimerId::ScanPause);
                } else if timers.take_expired(TimerId::ScanPause) {
                    self.advance(rf, vfo, store, timers);
                }
            }
        }
    }

    fn on_carrier_found<R: RfTransceiver, S: ChannelStore>(
        &mut self,
        rf: &mut R,
        vfo: &mut VfoChannel,
        store: &mut S,
        timers: &mut TimerRegistry,
    ) {
        debug!("scan: carrier on candidate, policy {:?}", self.resume_policy);
        match self.resume_policy {
            ResumePolicy::StopOnCarrier => self.stop(rf, vfo, store, timers),
            ResumePolicy::StayOnTimer => {
                self.dwell = DwellState::Holding;
                timers.start(TimerId::ScanPause, scan::STAY_TICKS);
            }
            ResumePolicy::StayOnCarrier => {
                self.dwell = DwellState::Staying;
                timers.cancel(TimerId::ScanPause);
            }
        }
    }

    fn advance<R: RfTransceiver, S: ChannelStore>(
        &mut self,
        rf: &mut R,
        vfo: &mut VfoChannel,
        store: &S,
        timers: &mut TimerRegistry,
    ) {
        // Dispatch on the session's own domain; a channel scan over a
        // table with no candidate leaves `channel_number` unset and must
        // still stay a channel scan.
        match self.kind {
            ScanKind::Channel => self.advance_channel(rf, vfo, store, timers),
            ScanKind::Frequency => self.advance_frequency(rf, vfo, timers),
        }
    }

    /// Accept the next channel candidate and step the list cursor once.
    fn advance_channel<R: RfTransceiver, S: ChannelStore>(
        &mut self,
        rf: &mut R,
        vfo: &mut VfoChannel,
        store: &S,
        timers: &mut TimerRegistry,
    ) {
        let cursor = if self.list_restricted {
            self.cursor
        } else {
            ListCursor::UserSequential
        };

        // Fall through the cursor cycle until some source yields a
        // candidate; only the accepted candidate steps the cursor.
        let mut source = cursor;
        let mut candidate = None;
        for _ in 0..4 {
            candidate = self.candidate_from(source, vfo, store);
            if candidate.is_some() {
                break;
            }
            source = source.next();
        }
        // Table exhausted for every source: wrap to the first channel.
        let next = candidate.or_else(|| (0..store.channel_count()).find(|&ch| store.is_defined(ch)));

        if self.list_restricted {
            self.cursor = cursor.next();
        }

        if let Some(ch) = next {
            if let Some(stored) = store.channel(ch) {
                debug!("scan: candidate channel {}", ch);
                *vfo = stored;
                self.tune(rf, vfo);
            }
        }
        self.begin_pause(timers);
    }

    fn candidate_from<S: ChannelStore>(
        &self,
        source: ListCursor,
        vfo: &VfoChannel,
        store: &S,
    ) -> Option<u8> {
        match source {
            ListCursor::List1 => self.next_in_list(ScanList::List1, vfo, store),
            ListCursor::List2 => self.next_in_list(ScanList::List2, vfo, store),
            ListCursor::DualWatchOther => self
                .dual_watch_channel
                .filter(|&ch| store.is_defined(ch) && vfo.channel_number != Some(ch)),
            ListCursor::UserSequential => self.next_defined(vfo, store),
        }
    }

    /// Next member of a scan list after the current slot, skipping the
    /// list's own priority channels.
    fn next_in_list<S: ChannelStore>(
        &self,
        list: ScanList,
        vfo: &VfoChannel,
        store: &S,
    ) -> Option<u8> {
        let priority = store.priority_channels(list);
        self.walk_from(vfo, store, |store, ch| {
            store.in_scan_list(ch, list) && !priority.contains(&Some(ch))
        })
    }

    fn next_defined<S: ChannelStore>(&self, vfo: &VfoChannel, store: &S) -> Option<u8> {
        self.walk_from(vfo, store, |store, ch| store.is_defined(ch))
    }

    /// Walk the channel table in the scan direction starting one past the
    /// current slot, returning the first slot the filter accepts.
    fn walk_from<S, F>(&self, vfo: &VfoChannel, store: &S, accept: F) -> Option<u8>
    where
        S: ChannelStore,
        F: Fn(&S, u8) -> bool,
    {
        let count = store.channel_count();
        if count == 0 {
            return None;
        }
        let start = vfo.channel_number.unwrap_or(0) as i16;
        let step: i16 = match self.direction {
            ScanDirection::Reverse => -1,
            _ => 1,
        };
        let mut pos = start;
        for _ in 0..count {
            pos = (pos + step).rem_euclid(count as i16);
            let ch = pos as u8;
            if accept(store, ch) {
                return Some(ch);
            }
        }
        None
    }

    /// Step the frequency by the VFO's step size, wrapping at the band
    /// edges. 8.33 kHz steps are snapped back onto the 25 kHz grid.
    fn advance_frequency<R: RfTransceiver>(
        &mut self,
        rf: &mut R,
        vfo: &mut VfoChannel,
        timers: &mut TimerRegistry,
    ) {
        let band = vfo.band();
        let step = vfo.step.units();
        let mut freq = match self.direction {
            ScanDirection::Reverse => {
                if vfo.frequency < band.lower_edge() + step {
                    band.upper_edge() - step
                } else {
                    vfo.frequency - step
                }
            }
            _ => {
                let next = vfo.frequency + step;
                if next >= band.upper_edge() {
                    band.lower_edge()
                } else {
                    next
                }
            }
        };
        if vfo.step == StepSize::Step8_33k {
            freq = snap_to_grid(freq, band.lower_edge());
        }
        debug!("scan: candidate frequency {}", freq);
        vfo.frequency = freq;
        self.tune(rf, vfo);
        self.begin_pause(timers);
    }

    /// Tune onto the new candidate. A band change needs the full register
    /// set rewritten; within a band only frequency and filter path change.
    fn tune<R: RfTransceiver>(&mut self, rf: &mut R, vfo: &VfoChannel) {
        let band = vfo.band();
        if self.prev_band == Some(band) {
            rf.retune(vfo.frequency);
            rf.set_filter_path(vfo.frequency);
        } else {
            rf.configure_receive(vfo);
        }
        self.prev_band = Some(band);
    }

    fn begin_pause(&mut self, timers: &mut TimerRegistry) {
        self.dwell = DwellState::Pausing;
        let ticks = if self.fast_scan {
            scan::PAUSE_FAST_TICKS
        } else {
            scan::PAUSE_TICKS
        };
        timers.start(TimerId::ScanPause, ticks);
    }
}

impl Default for ScanEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Snap a frequency onto the interleaved 25 kHz / 8.33 kHz grid. Two of the
/// three sub-steps round down, the third rounds up, so repeated stepping
/// never drifts off the 25 kHz raster.
pub fn snap_to_grid(freq: u32, lower_edge: u32) -> u32 {
    let delta = freq.saturating_sub(lower_edge);
    let base = (delta / 2500) * 2500;
    let index = ((delta - base) / 833).min(2);
    lower_edge + base + index * 833 + u32::from(index == 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::StepSize;
    use crate::rf::traits::mock::MockRf;
    use crate::scheduler::TickScheduler;
    use crate::store::mock::MockChannelStore;

    fn idle(n: usize) -> impl Iterator<Item = ScanSignal> {
        core::iter::repeat(ScanSignal::default()).take(n)
    }

    /// Run until the pause expires and the engine moves to the next
    /// candidate.
    fn run_one_dwell(
        engine: &mut ScanEngine,
        rf: &mut MockRf,
        vfo: &mut VfoChannel,
        store: &mut MockChannelStore,
        timers: &mut TimerRegistry,
        sched: &mut TickScheduler,
    ) {
        for signal in idle(scan::PAUSE_TICKS as usize) {
            sched.on_hardware_tick(timers);
            engine.process(rf, vfo, store, timers, signal);
        }
    }

    #[test]
    fn test_cursor_cycles_once_per_accepted_candidate() {
        let mut engine = ScanEngine::new();
        let mut rf = MockRf::new();
        let mut store = MockChannelStore::new();
        let mut timers = TimerRegistry::new();
        let mut sched = TickScheduler::new();

        // Slots in both lists plus plain channels for the sequential walk.
        store.define(1, 43_300_000, true, false);
        store.define(2, 43_310_000, false, true);
        store.define(3, 43_320_000, false, false);
        store.define(4, 43_330_000, true, true);
        store.define(10, 43_340_000, false, false);
        engine.dual_watch_channel = Some(10);

        let mut vfo = store.channel(3).unwrap();
        engine.start_channel_scan(
            ScanDirection::Forward,
            &mut rf,
            &mut vfo,
            &store,
            &mut timers,
        );
        // First acceptance came from List1.
        assert_eq!(vfo.channel_number, Some(4));
        assert_eq!(engine.cursor(), ListCursor::List2);

        run_one_dwell(&mut engine, &mut rf, &mut vfo, &mut store, &mut timers, &mut sched);
        // List2 member after slot 4 wraps around to slot 2.
        assert_eq!(vfo.channel_number, Some(2));
        assert_eq!(engine.cursor(), ListCursor::DualWatchOther);

        run_one_dwell(&mut engine, &mut rf, &mut vfo, &mut store, &mut timers, &mut sched);
        assert_eq!(vfo.channel_number, Some(10));
        assert_eq!(engine.cursor(), ListCursor::UserSequential);

        run_one_dwell(&mut engine, &mut rf, &mut vfo, &mut store, &mut timers, &mut sched);
        // Sequential walk from slot 10 wraps to slot 1.
        assert_eq!(vfo.channel_number, Some(1));
        assert_eq!(engine.cursor(), ListCursor::List1);
    }

    #[test]
    fn test_priority_channels_are_skipped_in_their_list() {
        let mut engine = ScanEngine::new();
        let mut rf = MockRf::new();
        let mut store = MockChannelStore::new();
        let mut timers = TimerRegistry::new();

        store.define(1, 43_300_000, true, false);
        store.define(2, 43_310_000, true, false);
        store.define(3, 43_320_000, true, false);
        store.set_priority(ScanList::List1, [Some(1), Some(2)]);

        let mut vfo = store.channel(3).unwrap();
        engine.start_channel_scan(
            ScanDirection::Forward,
            &mut rf,
            &mut vfo,
            &store,
            &mut timers,
        );
        // Slots 1 and 2 are the list's priority channels; 3 is the only
        // eligible member and the walk wraps back onto it.
        assert_eq!(vfo.channel_number, Some(3));
    }

    #[test]
    fn test_unrestricted_scan_stays_sequential() {
        let mut engine = ScanEngine::new();
        engine.list_restricted = false;
        let mut rf = MockRf::new();
        let mut store = MockChannelStore::new();
        let mut timers = TimerRegistry::new();
        let mut sched = TickScheduler::new();

        store.define(1, 43_300_000, true, false);
        store.define(5, 43_310_000, false, true);
        store.define(9, 43_320_000, false, false);

        let mut vfo = store.channel(1).unwrap();
        engine.start_channel_scan(
            ScanDirection::Forward,
            &mut rf,
            &mut vfo,
            &store,
            &mut timers,
        );
        assert_eq!(vfo.channel_number, Some(5));
        run_one_dwell(&mut engine, &mut rf, &mut vfo, &mut store, &mut timers, &mut sched);
        assert_eq!(vfo.channel_number, Some(9));
        run_one_dwell(&mut engine, &mut rf, &mut vfo, &mut store, &mut timers, &mut sched);
        assert_eq!(vfo.channel_number, Some(1));
    }

    #[test]
    fn test_reverse_scan_walks_downward() {
        let mut engine = ScanEngine::new();
        engine.list_restricted = false;
        let mut rf = MockRf::new();
        let mut store = MockChannelStore::new();
        let mut timers = TimerRegistry::new();

        store.define(2, 43_300_000, false, false);
        store.define(6, 43_310_000, false, false);

        let mut vfo = store.channel(6).unwrap();
        engine.start_channel_scan(
            ScanDirection::Reverse,
            &mut rf,
            &mut vfo,
            &store,
            &mut timers,
        );
        assert_eq!(vfo.channel_number, Some(2));
    }

    #[test]
    fn test_frequency_scan_833_grid() {
        let mut engine = ScanEngine::new();
        let mut rf = MockRf::new();
        let mut timers = TimerRegistry::new();
        let mut sched = TickScheduler::new();
        let mut store = MockChannelStore::new();

        let lower = Band::Band6_400MHz.lower_edge();
        let mut vfo = VfoChannel::on_frequency(lower);
        vfo.step = StepSize::Step8_33k;

        engine.start_frequency_scan(ScanDirection::Forward, &mut rf, &mut vfo, &mut timers);
        // Sub-steps within each 25 kHz cell are +833, +834, +833, so every
        // third candidate lands back on the 25 kHz raster exactly.
        let offsets = [833, 1667, 2500, 3333, 4167, 5000, 5833, 6667, 7500];
        assert_eq!(vfo.frequency, lower + offsets[0]);
        for off in &offsets[1..] {
            run_one_dwell(&mut engine, &mut rf, &mut vfo, &mut store, &mut timers, &mut sched);
            assert_eq!(vfo.frequency, lower + off);
            // Each emitted frequency sits where the grid formula puts it.
            let d = vfo.frequency - lower;
            let index = (d % 2500) / 833;
            assert_eq!(
                vfo.frequency,
                lower + (d / 2500) * 2500 + index * 833 + u32::from(index == 2)
            );
        }
    }

    #[test]
    fn test_frequency_scan_wraps_at_band_edge() {
        let mut engine = ScanEngine::new();
        let mut rf = MockRf::new();
        let mut timers = TimerRegistry::new();

        let band = Band::Band6_400MHz;
        let mut vfo = VfoChannel::on_frequency(band.upper_edge() - 1250);
        vfo.step = StepSize::Step25k;

        engine.start_frequency_scan(ScanDirection::Forward, &mut rf, &mut vfo, &mut timers);
        assert_eq!(vfo.frequency, band.lower_edge());
    }

    #[test]
    fn test_band_change_takes_slow_tune_path() {
        let mut engine = ScanEngine::new();
        engine.list_restricted = false;
        let mut rf = MockRf::new();
        let mut store = MockChannelStore::new();
        let mut timers = TimerRegistry::new();
        let mut sched = TickScheduler::new();

        // Slot 1 is VHF, slots 2 and 3 sit together in the 400 MHz band.
        store.define(1, 14_600_000, false, false);
        store.define(2, 43_300_000, false, false);
        store.define(3, 43_350_000, false, false);

        let mut vfo = store.channel(1).unwrap();
        engine.start_channel_scan(
            ScanDirection::Forward,
            &mut rf,
            &mut vfo,
            &store,
            &mut timers,
        );
        assert_eq!(vfo.channel_number, Some(2));
        // Band changed, so the whole receive chain was reconfigured and the
        // fast-path registers were left alone.
        assert_eq!(rf.configured_frequencies.last(), Some(&vfo.frequency));
        assert!(rf.retunes.is_empty());

        run_one_dwell(&mut engine, &mut rf, &mut vfo, &mut store, &mut timers, &mut sched);
        // Same band now: fast path only.
        assert_eq!(vfo.channel_number, Some(3));
        assert_eq!(rf.retunes.last(), Some(&vfo.frequency));
        assert_eq!(rf.configured_frequencies.len(), 1);
    }

    #[test]
    fn test_stop_on_carrier_restores_pre_scan_channel() {
        let mut engine = ScanEngine::new();
        engine.resume_policy = ResumePolicy::StopOnCarrier;
        let mut rf = MockRf::new();
        let mut store = MockChannelStore::new();
        let mut timers = TimerRegistry::new();

        store.define(3, 43_300_000, true, false);
        store.define(4, 43_310_000, true, false);

        let mut vfo = store.channel(3).unwrap();
        engine.start_channel_scan(
            ScanDirection::Forward,
            &mut rf,
            &mut vfo,
            &store,
            &mut timers,
        );
        assert_eq!(vfo.channel_number, Some(4));

        engine.process(
            &mut rf,
            &mut vfo,
            &mut store,
            &mut timers,
            ScanSignal {
                carrier_found: true,
                channel_idle: false,
            },
        );
        assert_eq!(engine.direction(), ScanDirection::Off);
        assert_eq!(vfo.channel_number, Some(3));
        assert!(!timers.is_running(TimerId::ScanPause));
        assert_eq!(store.saved_position, Some((Some(3), 43_300_000)));
    }

    #[test]
    fn test_stay_on_timer_holds_then_resumes() {
        let mut engine = ScanEngine::new();
        engine.list_restricted = false;
        engine.resume_policy = ResumePolicy::StayOnTimer;
        let mut rf = MockRf::new();
        let mut store = MockChannelStore::new();
        let mut timers = TimerRegistry::new();
        let mut sched = TickScheduler::new();

        store.define(1, 43_300_000, false, false);
        store.define(2, 43_310_000, false, false);

        let mut vfo = store.channel(1).unwrap();
        engine.start_channel_scan(
            ScanDirection::Forward,
            &mut rf,
            &mut vfo,
            &store,
            &mut timers,
        );
        assert_eq!(vfo.channel_number, Some(2));

        let found = ScanSignal {
            carrier_found: true,
            channel_idle: false,
        };
        engine.process(&mut rf, &mut vfo, &mut store, &mut timers, found);
        assert_eq!(timers.remaining(TimerId::ScanPause), scan::STAY_TICKS);

        // The hold runs out even though the carrier never drops.
        for _ in 0..scan::STAY_TICKS {
            sched.on_hardware_tick(&mut timers);
            engine.process(&mut rf, &mut vfo, &mut store, &mut timers, found);
        }
        assert_eq!(vfo.channel_number, Some(1));
        assert!(engine.is_scanning());
    }

    #[test]
    fn test_stay_on_carrier_waits_for_idle() {
        let mut engine = ScanEngine::new();
        engine.list_restricted = false;
        engine.resume_policy = ResumePolicy::StayOnCarrier;
        let mut rf = MockRf::new();
        let mut store = MockChannelStore::new();
        let mut timers = TimerRegistry::new();
        let mut sched = TickScheduler::new();

        store.define(1, 43_300_000, false, false);
        store.define(2, 43_310_000, false, false);

        let mut vfo = store.channel(1).unwrap();
        engine.start_channel_scan(
            ScanDirection::Forward,
            &mut rf,
            &mut vfo,
            &store,
            &mut timers,
        );

        engine.process(
            &mut rf,
            &mut vfo,
            &mut store,
            &mut timers,
            ScanSignal {
                carrier_found: true,
                channel_idle: false,
            },
        );
        // Parked with no countdown running.
        assert!(!timers.is_running(TimerId::ScanPause));

        // Long active stretch, never advances.
        for signal in idle(200) {
            sched.on_hardware_tick(&mut timers);
            engine.process(&mut rf, &mut vfo, &mut store, &mut timers, signal);
        }
        assert_eq!(vfo.channel_number, Some(2));

        // Carrier drops: grace pause, then the walk continues.
        engine.process(
            &mut rf,
            &mut vfo,
            &mut store,
            &mut timers,
            ScanSignal {
                carrier_found: false,
                channel_idle: true,
            },
        );
        for signal in idle(scan::RESUME_TICKS as usize) {
            sched.on_hardware_tick(&mut timers);
            engine.process(&mut rf, &mut vfo, &mut store, &mut timers, signal);
        }
        assert_eq!(vfo.channel_number, Some(1));
    }

    #[test]
    fn test_keep_position_skips_restore() {
        let mut engine = ScanEngine::new();
        engine.list_restricted = false;
        let mut rf = MockRf::new();
        let mut store = MockChannelStore::new();
        let mut timers = TimerRegistry::new();

        store.define(1, 43_300_000, false, false);
        store.define(2, 43_310_000, false, false);

        let mut vfo = store.channel(1).unwrap();
        engine.start_channel_scan(
            ScanDirection::Forward,
            &mut rf,
            &mut vfo,
            &store,
            &mut timers,
        );
        assert_eq!(vfo.channel_number, Some(2));

        engine.mark_keep_position();
        engine.stop(&mut rf, &mut vfo, &mut store, &mut timers);
        assert_eq!(vfo.channel_number, Some(2));
        assert_eq!(store.saved_position, Some((Some(2), 43_310_000)));
    }

    #[test]
    fn test_channel_scan_over_empty_table_stays_put() {
        let mut engine = ScanEngine::new();
        engine.list_restricted = false;
        let mut rf = MockRf::new();
        let mut store = MockChannelStore::new();
        let mut timers = TimerRegistry::new();
        let mut sched = TickScheduler::new();

        // Frequency-backed VFO, nothing defined in the table.
        let mut vfo = VfoChannel::on_frequency(43_300_000);
        engine.start_channel_scan(
            ScanDirection::Forward,
            &mut rf,
            &mut vfo,
            &store,
            &mut timers,
        );
        assert_eq!(vfo.channel_number, None);

        // Dwell expiries keep it a channel scan; the frequency must not
        // start stepping.
        for _ in 0..3 {
            run_one_dwell(&mut engine, &mut rf, &mut vfo, &mut store, &mut timers, &mut sched);
        }
        assert!(engine.is_scanning());
        assert_eq!(vfo.frequency, 43_300_000);
        assert_eq!(vfo.channel_number, None);
    }

    #[test]
    fn test_snap_to_grid_zero_drift() {
        let lower = 40_000_000;
        let mut freq = lower;
        for _ in 0..300 {
            freq = snap_to_grid(freq + 833, lower);
        }
        assert_eq!(freq, lower + 100 * 2500);
    }
}
