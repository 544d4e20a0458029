//! BK4819-style transceiver binding
//!
//! Implements [`RfTransceiver`] over a raw 16-bit register bus. The platform
//! layer supplies the bus (bit-banged three-wire on the real hardware); this
//! module owns the register map and the interrupt drain loop, keeping both
//! out of the control core.

use crate::channel::{CodeType, VfoChannel};
use crate::rf::registers::{pack_gain, pack_squelch};
use crate::rf::traits::{CodeMatch, CssScanResult, RfEvents, RfTransceiver};

/// 16-bit register access, one transfer per call.
pub trait RegisterBus {
    fn read(&mut self, reg: u8) -> u16;
    fn write(&mut self, reg: u8, value: u16);
}

mod reg {
    /// Interrupt flags, write 0 then read to latch
    pub const INTERRUPTS: u8 = 0x02;
    /// Live squelch/code indicator bits
    pub const INDICATORS: u8 = 0x0C;
    pub const SCAN_FREQ_HI: u8 = 0x0D;
    pub const SCAN_FREQ_LO: u8 = 0x0E;
    /// Front-end gain chain word
    pub const GAIN: u8 = 0x13;
    /// Receive/transmit block enables
    pub const POWER: u8 = 0x30;
    /// Chip GPIO outputs driving the antenna filter switches
    pub const GPIO_OUT: u8 = 0x33;
    pub const FREQ_LO: u8 = 0x38;
    pub const FREQ_HI: u8 = 0x39;
    /// Interrupt enable mask
    pub const INT_ENABLE: u8 = 0x3F;
    /// AF output path selection
    pub const AF_OUTPUT: u8 = 0x47;
    pub const SQUELCH_GLITCH: u8 = 0x4D;
    pub const SQUELCH_NOISE: u8 = 0x4F;
    /// Sub-audible code control and word registers
    pub const CSS_CONTROL: u8 = 0x51;
    pub const CTCSS_WORD: u8 = 0x07;
    pub const CDCSS_WORD: u8 = 0x08;
    pub const RSSI: u8 = 0x67;
    pub const CTCSS_RESULT: u8 = 0x68;
    pub const CDCSS_RESULT: u8 = 0x69;
    pub const SQUELCH_RSSI: u8 = 0x78;
}

mod int {
    pub const SQUELCH_LOST: u16 = 1 << 2;
    pub const SQUELCH_FOUND: u16 = 1 << 3;
    pub const CTCSS_LOST: u16 = 1 << 6;
    pub const CTCSS_FOUND: u16 = 1 << 7;
    pub const CDCSS_LOST: u16 = 1 << 8;
    pub const CDCSS_FOUND: u16 = 1 << 9;
    pub const TAIL_FOUND: u16 = 1 << 10;
}

mod indicator {
    pub const IRQ: u16 = 1 << 0;
    pub const SQUELCH_OPEN: u16 = 1 << 1;
    pub const CTCSS_RECEIVED: u16 = 1 << 10;
    pub const TAIL_PHASE_MASK: u16 = 0b11 << 12;
    pub const CDCSS_POSITIVE: u16 = 1 << 14;
}

/// Receive-chain enable word, all RX blocks on.
const POWER_RX: u16 = 0xBFF1;
/// Transmit-chain enable word.
const POWER_TX: u16 = 0xC1FE;

/// Filter-switch GPIO bits, one path at a time.
const GPIO_VHF_PATH: u16 = 1 << 14;
const GPIO_UHF_PATH: u16 = 1 << 13;

/// AF path selection values for REG_47, in the selection field.
const AF_FM: u16 = 1 << 8;
const AF_MUTE: u16 = 0;

/// Interrupts the control core consumes.
const INT_MASK: u16 = int::SQUELCH_LOST
    | int::SQUELCH_FOUND
    | int::CTCSS_LOST
    | int::CTCSS_FOUND
    | int::CDCSS_LOST
    | int::CDCSS_FOUND
    | int::TAIL_FOUND;

pub struct Bk4819Frontend<B: RegisterBus> {
    bus: B,
}

impl<B: RegisterBus> Bk4819Frontend<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    fn write_squelch(&mut self, vfo: &VfoChannel) {
        let words = pack_squelch(&vfo.squelch);
        self.bus.write(reg::SQUELCH_RSSI, words[0]);
        self.bus.write(reg::SQUELCH_NOISE, words[1]);
        self.bus.write(reg::SQUELCH_GLITCH, words[2]);
    }

    fn write_code_config(&mut self, vfo: &VfoChannel) {
        match vfo.code_type {
            CodeType::None => self.bus.write(reg::CSS_CONTROL, 0),
            CodeType::ContinuousTone => {
                self.bus.write(reg::CTCSS_WORD, vfo.code_value & 0x1FFF);
                self.bus.write(reg::CSS_CONTROL, 0x9000);
            }
            CodeType::Digital | CodeType::ReverseDigital => {
                self.bus.write(reg::CDCSS_WORD, vfo.code_value & 0x0FFF);
                let invert = u16::from(vfo.code_type == CodeType::ReverseDigital) << 11;
                self.bus.write(reg::CSS_CONTROL, 0x8000 | invert);
            }
        }
    }
}

impl<B: RegisterBus> RfTransceiver for Bk4819Frontend<B> {
    fn read_rssi(&mut self) -> u16 {
        self.bus.read(reg::RSSI) & 0x01FF
    }

    fn squelch_is_open(&mut self) -> bool {
        self.bus.read(reg::INDICATORS) & indicator::SQUELCH_OPEN != 0
    }

    /// Drain the chip's interrupt latch. Each pass clears and re-reads the
    /// flag register until the IRQ indicator drops, bounded so a wedged
    /// indicator line cannot stall the tick.
    fn drain_events(&mut self) -> RfEvents {
        let mut out = RfEvents::none();
        for _ in 0..4 {
            if self.bus.read(reg::INDICATORS) & indicator::IRQ == 0 {
                break;
            }
            self.bus.write(reg::INTERRUPTS, 0);
            let bits = self.bus.read(reg::INTERRUPTS);
            out.squelch_opened |= bits & int::SQUELCH_FOUND != 0;
            out.squelch_closed |= bits & int::SQUELCH_LOST != 0;
            out.code_found |= bits & (int::CTCSS_FOUND | int::CDCSS_FOUND) != 0;
            out.code_lost |= bits & (int::CTCSS_LOST | int::CDCSS_LOST) != 0;
            out.tail_detected |= bits & int::TAIL_FOUND != 0;
        }
        out
    }

    fn code_match_status(&mut self) -> CodeMatch {
        let ind = self.bus.read(reg::INDICATORS);
        if ind & (indicator::CTCSS_RECEIVED | indicator::CDCSS_POSITIVE) != 0 {
            CodeMatch::Found
        } else {
            CodeMatch::Lost
        }
    }

    fn tail_condition(&mut self) -> bool {
        self.bus.read(reg::INDICATORS) & indicator::TAIL_PHASE_MASK != 0
    }

    fn frequency_scan_result(&mut self) -> Option<u32> {
        let hi = self.bus.read(reg::SCAN_FREQ_HI);
        if hi & (1 << 15) != 0 {
            // Scanner still busy.
            return None;
        }
        let lo = self.bus.read(reg::SCAN_FREQ_LO);
        Some((u32::from(hi & 0x07FF) << 16) | u32::from(lo))
    }

    fn css_scan_result(&mut self) -> CssScanResult {
        let ctcss = self.bus.read(reg::CTCSS_RESULT);
        if ctcss & (1 << 15) == 0 {
            // Raw result scales to 0.1 Hz through the chip's clock ratio.
            let tone = ((u32::from(ctcss & 0x1FFF) * 4843) / 10000) as u16;
            return CssScanResult::Ctcss { tone };
        }
        let cdcss = self.bus.read(reg::CDCSS_RESULT);
        if cdcss & (1 << 15) == 0 {
            return CssScanResult::Cdcss {
                code: cdcss & 0x0FFF,
            };
        }
        CssScanResult::NotFound
    }

    fn write_gain_registers(&mut self, short_lna: u8, lna: u8, mixer: u8, pga: u8) {
        self.bus
            .write(reg::GAIN, pack_gain(short_lna, lna, mixer, pga));
    }

    fn retune(&mut self, frequency: u32) {
        self.bus.write(reg::FREQ_LO, frequency as u16);
        self.bus.write(reg::FREQ_HI, (frequency >> 16) as u16);
    }

    fn set_filter_path(&mut self, frequency: u32) {
        let vhf = crate::channel::Band::from_frequency(frequency).is_vhf();
        let mut gpio = self.bus.read(reg::GPIO_OUT);
        gpio &= !(GPIO_VHF_PATH | GPIO_UHF_PATH);
        gpio |= if vhf { GPIO_VHF_PATH } else { GPIO_UHF_PATH };
        self.bus.write(reg::GPIO_OUT, gpio);
    }

    fn configure_receive(&mut self, vfo: &VfoChannel) {
        self.retune(vfo.frequency);
        self.set_filter_path(vfo.frequency);
        self.write_squelch(vfo);
        self.write_code_config(vfo);
        self.bus.write(reg::INT_ENABLE, INT_MASK);
        self.bus.write(reg::POWER, POWER_RX);
    }

    fn set_speaker(&mut self, on: bool) {
        self.bus
            .write(reg::AF_OUTPUT, if on { AF_FM } else { AF_MUTE });
    }

    fn set_receiver_enabled(&mut self, enabled: bool) {
        self.bus
            .write(reg::POWER, if enabled { POWER_RX } else { 0 });
    }

    fn prepare_transmit(&mut self, vfo: &VfoChannel) {
        self.retune(vfo.frequency);
        self.write_code_config(vfo);
        self.bus.write(reg::AF_OUTPUT, AF_MUTE);
        self.bus.write(reg::POWER, POWER_TX);
    }

    fn end_transmit(&mut self) {
        self.bus.write(reg::POWER, POWER_RX);
    }
}
