//! Register word pack/unpack helpers
//!
//! Bit-field register words are built and taken apart here, as plain-integer
//! functions, so the control logic never carries bit layouts. Field layout
//! of the gain word: [9:8] LNA-short, [7:5] LNA, [4:3] mixer, [2:0] PGA.

use crate::channel::SquelchThresholds;

/// Pack the front-end gain chain into its register word.
pub const fn pack_gain(short_lna: u8, lna: u8, mixer: u8, pga: u8) -> u16 {
    (((short_lna & 0b11) as u16) << 8)
        | (((lna & 0b111) as u16) << 5)
        | (((mixer & 0b11) as u16) << 3)
        | ((pga & 0b111) as u16)
}

/// Unpack a gain register word into (short_lna, lna, mixer, pga).
pub const fn unpack_gain(word: u16) -> (u8, u8, u8, u8) {
    (
        ((word >> 8) & 0b11) as u8,
        ((word >> 5) & 0b111) as u8,
        ((word >> 3) & 0b11) as u8,
        (word & 0b111) as u8,
    )
}

/// Pack an open/close threshold pair, open in the high byte.
pub const fn pack_threshold_pair(open: u8, close: u8) -> u16 {
    ((open as u16) << 8) | close as u16
}

/// Unpack an open/close threshold pair.
pub const fn unpack_threshold_pair(word: u16) -> (u8, u8) {
    ((word >> 8) as u8, (word & 0xFF) as u8)
}

/// The three squelch threshold register words: RSSI, noise, glitch.
pub fn pack_squelch(thresholds: &SquelchThresholds) -> [u16; 3] {
    [
        pack_threshold_pair(thresholds.open_rssi, thresholds.close_rssi),
        pack_threshold_pair(thresholds.open_noise, thresholds.close_noise),
        pack_threshold_pair(thresholds.open_glitch, thresholds.close_glitch),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_roundtrip() {
        let word = pack_gain(3, 2, 3, 6);
        assert_eq!(unpack_gain(word), (3, 2, 3, 6));
    }

    #[test]
    fn test_gain_fields_masked() {
        // Out-of-range fields must not bleed into neighbours.
        let word = pack_gain(0xFF, 0xFF, 0xFF, 0xFF);
        assert_eq!(unpack_gain(word), (3, 7, 3, 7));
        assert_eq!(word & !0x03FF, 0);
    }

    #[test]
    fn test_threshold_pair_layout() {
        let word = pack_threshold_pair(70, 55);
        assert_eq!(word, 0x4637);
        assert_eq!(unpack_threshold_pair(word), (70, 55));
    }

    #[test]
    fn test_squelch_pack_order() {
        let thresholds = SquelchThresholds {
            open_rssi: 40,
            close_rssi: 30,
            open_noise: 45,
            close_noise: 55,
            open_glitch: 80,
            close_glitch: 70,
        };
        let words = pack_squelch(&thresholds);
        assert_eq!(unpack_threshold_pair(words[0]), (40, 30));
        assert_eq!(unpack_threshold_pair(words[1]), (45, 55));
        assert_eq!(unpack_threshold_pair(words[2]), (80, 70));
    }
}
