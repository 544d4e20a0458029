//! Persisted-configuration collaborator
//!
//! The control core never parses the stored record layout; it consumes
//! channel data through this trait and writes back only the last scan
//! position. The mock implementation backs the scan-engine tests.

use crate::channel::VfoChannel;

/// Which of the two priority scan lists is being referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanList {
    List1,
    List2,
}

/// Read-mostly view of the persisted channel table.
pub trait ChannelStore {
    /// Number of channel slots (defined or not).
    fn channel_count(&self) -> u8;

    /// Full channel data for a slot, `None` when the slot is undefined.
    fn channel(&self, number: u8) -> Option<VfoChannel>;

    /// True when the slot holds a usable channel.
    fn is_defined(&self, number: u8) -> bool {
        self.channel(number).is_some()
    }

    /// Scan-list membership of a slot.
    fn in_scan_list(&self, number: u8, list: ScanList) -> bool;

    /// The two priority channels of a list, either may be unset.
    fn priority_channels(&self, list: ScanList) -> [Option<u8>; 2];

    /// Persist the position the radio settled on when a scan stopped.
    fn save_last_position(&mut self, channel: Option<u8>, frequency: u32);
}
