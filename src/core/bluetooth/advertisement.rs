//! Advertisement (scan record) inspection.

use crate::core::bluetooth::constants::{
    ADV_FLAGS_DISCOVERABLE_MASK, ADV_FLAG_GENERAL_DISCOVERABLE, ADV_TYPE_FLAGS,
};

/// Returns true when the scan record carries a flags field with both
/// discoverable-mode bits cleared. Such peripherals only broadcast and
/// cannot be connected to.
///
/// A record without a flags field (bonded devices have none) is not
/// broadcast-only.
pub fn is_broadcast_only(scan_record: &[u8]) -> bool {
    flags(scan_record)
        .map(|flags| flags & ADV_FLAGS_DISCOVERABLE_MASK == 0)
        .unwrap_or(false)
}

/// Extracts the first byte of the flags AD structure, if any.
pub fn flags(scan_record: &[u8]) -> Option<u8> {
    let mut i = 0;
    while i < scan_record.len() {
        let len = scan_record[i] as usize;
        if len == 0 || i + len >= scan_record.len() {
            break;
        }
        let ad_type = scan_record[i + 1];
        if ad_type == ADV_TYPE_FLAGS && len >= 2 {
            return Some(scan_record[i + 2]);
        }
        i += len + 1;
    }
    None
}

/// Builds a minimal scan record for backends that only expose a
/// connectable bit instead of the raw advertisement.
pub fn flags_record(connectable: bool) -> Vec<u8> {
    let flags = if connectable { ADV_FLAG_GENERAL_DISCOVERABLE } else { 0x00 };
    vec![0x02, ADV_TYPE_FLAGS, flags]
}
