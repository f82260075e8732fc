use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use station_store::{SystemTimeProvider, TimeProvider};

const SEQ_CACHE_CAPACITY: usize = 100;
const CONTENT_WINDOW_MS: u64 = 10 * 60_000;

/// Bounded FIFO cache of `(sender, seqId)` pairs already seen, the first
/// line of defense against re-digipeated retransmissions of the same
/// message.
pub struct SeqCache {
    order: Mutex<VecDeque<(String, String)>>,
}

impl SeqCache {
    pub fn new() -> Self {
        Self {
            order: Mutex::new(VecDeque::with_capacity(SEQ_CACHE_CAPACITY)),
        }
    }

    /// Records `(sender, seq)`, returning `true` if this is the first time
    /// it has been observed.
    pub fn observe(&self, sender: &str, seq: &str) -> bool {
        let mut order = self.order.lock();
        let key = (sender.to_string(), seq.to_string());
        if order.iter().any(|entry| entry == &key) {
            return false;
        }
        if order.len() >= SEQ_CACHE_CAPACITY {
            order.pop_front();
        }
        order.push_back(key);
        true
    }
}

impl Default for SeqCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Ten-minute content-based dedupe over `(source, destination, data type,
/// message text)` for received traffic, independent of sequence numbers
/// (covers retransmissions that changed their APRS path but not content).
pub struct ContentDedup<T: TimeProvider = SystemTimeProvider> {
    seen: Mutex<HashMap<String, u64>>,
    time: T,
}

impl ContentDedup<SystemTimeProvider> {
    pub fn new() -> Self {
        Self::with_time_provider(SystemTimeProvider)
    }
}

impl Default for ContentDedup<SystemTimeProvider> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeProvider> ContentDedup<T> {
    pub fn with_time_provider(time: T) -> Self {
        Self {
            seen: Mutex::new(HashMap::new()),
            time,
        }
    }

    fn key(source: &str, destination: &str, data_type: &str, text: &str) -> String {
        format!("{source}\u{1}{destination}\u{1}{data_type}\u{1}{text}")
    }

    /// Records a received `(source, destination, data type, text)` tuple,
    /// returning `true` if it has not been seen within the last 10 minutes.
    pub fn observe(&self, source: &str, destination: &str, data_type: &str, text: &str) -> bool {
        let now = self.time.now_ms();
        let key = Self::key(source, destination, data_type, text);
        let mut seen = self.seen.lock();
        seen.retain(|_, expires_at| *expires_at > now);
        if seen.contains_key(&key) {
            return false;
        }
        seen.insert(key, now + CONTENT_WINDOW_MS);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use station_store::ManualTimeProvider;

    #[test]
    fn seq_cache_flags_repeats_and_evicts_oldest() {
        let cache = SeqCache::new();
        assert!(cache.observe("KK7VZT-1", "001"));
        assert!(!cache.observe("KK7VZT-1", "001"));
        for i in 0..SEQ_CACHE_CAPACITY {
            cache.observe("FILLER", &i.to_string());
        }
        assert!(cache.observe("KK7VZT-1", "001"));
    }

    #[test]
    fn content_dedup_suppresses_within_window_and_allows_after() {
        let dedup = ContentDedup::with_time_provider(ManualTimeProvider::new(0));
        assert!(dedup.observe("KK7VZT-1", "W1AW-0", "Message", "hello"));
        assert!(!dedup.observe("KK7VZT-1", "W1AW-0", "Message", "hello"));
        dedup.time.advance_ms(10 * 60_000 + 1);
        assert!(dedup.observe("KK7VZT-1", "W1AW-0", "Message", "hello"));
    }
}
