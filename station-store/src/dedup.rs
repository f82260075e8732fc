use crate::time::{SystemTimeProvider, TimeProvider};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

const SUPPRESSION_WINDOW_MS: u64 = 3_000;

/// Suppresses a raw frame seen from more than one radio within a short
/// window, keyed on the exact payload bytes (hex-encoded for a stable map
/// key regardless of payload content).
pub struct FrameDeduplicator<T: TimeProvider = SystemTimeProvider> {
    time: T,
    last_seen: Mutex<HashMap<String, u64>>,
}

impl FrameDeduplicator<SystemTimeProvider> {
    pub fn new() -> Self {
        Self {
            time: SystemTimeProvider,
            last_seen: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for FrameDeduplicator<SystemTimeProvider> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeProvider> FrameDeduplicator<T> {
    pub fn with_time_provider(time: T) -> Self {
        Self {
            time,
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true if `payload` has not been seen within the suppression
    /// window (and should be republished); records it as seen regardless.
    /// Evicts stale entries from every call so the map never grows
    /// unbounded across a long-running process.
    pub fn observe(&self, payload: &[u8]) -> bool {
        let key = hex_encode(payload);
        let now = self.time.now_ms();
        let mut map = self.last_seen.lock();
        map.retain(|_, seen| now.saturating_sub(*seen) <= SUPPRESSION_WINDOW_MS);
        let is_unique = match map.get(&key) {
            Some(seen) => now.saturating_sub(*seen) > SUPPRESSION_WINDOW_MS,
            None => true,
        };
        map.insert(key, now);
        is_unique
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{:02x}", b);
    }
    out
}

pub type SharedDeduplicator<T = SystemTimeProvider> = Arc<FrameDeduplicator<T>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualTimeProvider;

    #[test]
    fn duplicate_within_window_suppressed() {
        let dedup = FrameDeduplicator::with_time_provider(ManualTimeProvider::new(0));
        assert!(dedup.observe(b"hello"));
        assert!(!dedup.observe(b"hello"));
    }

    #[test]
    fn same_payload_after_window_is_unique_again() {
        let time = ManualTimeProvider::new(0);
        let dedup = FrameDeduplicator::with_time_provider(time);
        assert!(dedup.observe(b"hello"));
        if let Some(time) = as_manual(&dedup) {
            time.advance_ms(3_001);
        }
        assert!(dedup.observe(b"hello"));
    }

    fn as_manual(dedup: &FrameDeduplicator<ManualTimeProvider>) -> Option<&ManualTimeProvider> {
        Some(&dedup.time)
    }

    #[test]
    fn distinct_payloads_both_unique() {
        let dedup = FrameDeduplicator::new();
        assert!(dedup.observe(b"alpha"));
        assert!(dedup.observe(b"beta"));
    }
}
