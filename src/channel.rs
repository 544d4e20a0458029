//! Channel and VFO data model
//!
//! A `VfoChannel` carries everything the control core needs to receive on a
//! frequency: tuning, modulation, sub-audible code configuration, squelch
//! thresholds and scan-list membership. Two instances exist (RX and TX side);
//! they are created at boot and only ever overwritten in place.

/// Sub-audible code kind attached to a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeType {
    /// No code configured; any carrier qualifies
    None,
    /// CTCSS: continuous analog tone, value in 0.1 Hz units
    ContinuousTone,
    /// CDCSS normal polarity, value is the octal code word
    Digital,
    /// CDCSS inverted polarity
    ReverseDigital,
}

impl CodeType {
    /// Digital codes with normal polarity are the only ones for which the
    /// demodulator's tail marker is trustworthy.
    #[inline]
    pub fn is_positive_digital(self) -> bool {
        matches!(self, CodeType::Digital)
    }
}

/// Modulation mode of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modulation {
    Fm,
    Am,
}

/// Channel step size. The 8.33 kHz step does not divide the 25 kHz raster
/// evenly and gets special grid handling in the scan engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepSize {
    Step2_5k,
    Step5k,
    Step6_25k,
    Step8_33k,
    Step10k,
    Step12_5k,
    Step25k,
}

impl StepSize {
    /// Step in 10 Hz units.
    #[inline]
    pub const fn units(self) -> u32 {
        match self {
            StepSize::Step2_5k => 250,
            StepSize::Step5k => 500,
            StepSize::Step6_25k => 625,
            StepSize::Step8_33k => 833,
            StepSize::Step10k => 1000,
            StepSize::Step12_5k => 1250,
            StepSize::Step25k => 2500,
        }
    }
}

/// Frequency band the front end can tune. Band boundaries decide the RF
/// filter path and whether a scan candidate needs a full reconfiguration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Band1_50MHz,
    Band2_108MHz,
    Band3_136MHz,
    Band4_174MHz,
    Band5_350MHz,
    Band6_400MHz,
    Band7_470MHz,
}

impl Band {
    /// Classify a frequency (10 Hz units) into its band. Out-of-range
    /// frequencies clamp to the nearest edge band.
    pub fn from_frequency(freq: u32) -> Band {
        match freq {
            0..=10_799_999 => Band::Band1_50MHz,
            10_800_000..=13_599_999 => Band::Band2_108MHz,
            13_600_000..=17_399_999 => Band::Band3_136MHz,
            17_400_000..=34_999_999 => Band::Band4_174MHz,
            35_000_000..=39_999_999 => Band::Band5_350MHz,
            40_000_000..=46_999_999 => Band::Band6_400MHz,
            _ => Band::Band7_470MHz,
        }
    }

    /// Lower edge in 10 Hz units.
    pub const fn lower_edge(self) -> u32 {
        match self {
            Band::Band1_50MHz => 5_000_000,
            Band::Band2_108MHz => 10_800_000,
            Band::Band3_136MHz => 13_600_000,
            Band::Band4_174MHz => 17_400_000,
            Band::Band5_350MHz => 35_000_000,
            Band::Band6_400MHz => 40_000_000,
            Band::Band7_470MHz => 47_000_000,
        }
    }

    /// Upper edge in 10 Hz units (exclusive).
    pub const fn upper_edge(self) -> u32 {
        match self {
            Band::Band1_50MHz => 7_600_000,
            Band::Band2_108MHz => 13_600_000,
            Band::Band3_136MHz => 17_400_000,
            Band::Band4_174MHz => 35_000_000,
            Band::Band5_350MHz => 40_000_000,
            Band::Band6_400MHz => 47_000_000,
            Band::Band7_470MHz => 60_000_000,
        }
    }

    /// True for frequencies the front end treats as VHF (different default
    /// squelch thresholds from UHF).
    #[inline]
    pub fn is_vhf(self) -> bool {
        matches!(
            self,
            Band::Band1_50MHz | Band::Band2_108MHz | Band::Band3_136MHz
        )
    }
}

/// Squelch open/close threshold set, in the chip's raw units.
///
/// Noise and glitch close thresholds sit above their open thresholds (lower
/// is better for those detectors), RSSI the other way around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SquelchThresholds {
    pub open_rssi: u8,
    pub close_rssi: u8,
    pub open_noise: u8,
    pub close_noise: u8,
    pub open_glitch: u8,
    pub close_glitch: u8,
}

impl SquelchThresholds {
    /// Conservative defaults used when the channel store carries none.
    pub fn defaults_for(freq: u32) -> Self {
        if Band::from_frequency(freq).is_vhf() {
            Self {
                open_rssi: 70,
                close_rssi: 55,
                open_noise: 50,
                close_noise: 60,
                open_glitch: 80,
                close_glitch: 70,
            }
        } else {
            Self {
                open_rssi: 40,
                close_rssi: 30,
                open_noise: 45,
                close_noise: 55,
                open_glitch: 80,
                close_glitch: 70,
            }
        }
    }
}

/// Scan-list membership flags, two independent priority lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanListFlags {
    pub list1: bool,
    pub list2: bool,
}

/// One VFO: a tuned channel with all reception-relevant configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VfoChannel {
    /// Tuned frequency in 10 Hz units
    pub frequency: u32,
    /// Stored channel number backing this VFO, if any
    pub channel_number: Option<u8>,
    pub modulation: Modulation,
    pub code_type: CodeType,
    /// CTCSS tone (0.1 Hz) or CDCSS code word, meaning depends on `code_type`
    pub code_value: u16,
    pub step: StepSize,
    pub squelch: SquelchThresholds,
    pub scan_lists: ScanListFlags,
}

impl VfoChannel {
    /// A bare VFO on a given frequency with defaults derived from the band.
    pub fn on_frequency(frequency: u32) -> Self {
        Self {
            frequency,
            channel_number: None,
            modulation: Modulation::Fm,
            code_type: CodeType::None,
            code_value: 0,
            step: StepSize::Step12_5k,
            squelch: SquelchThresholds::defaults_for(frequency),
            scan_lists: ScanListFlags::default(),
        }
    }

    #[inline]
    pub fn band(&self) -> Band {
        Band::from_frequency(self.frequency)
    }

    /// True when reception requires a sub-audible code match.
    #[inline]
    pub fn has_code(&self) -> bool {
        self.code_type != CodeType::None
    }
}

impl Default for VfoChannel {
    fn default() -> Self {
        // 433.000 MHz, the customary UHF test frequency
        Self::on_frequency(43_300_000)
    }
}
