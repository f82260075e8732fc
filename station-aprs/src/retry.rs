use parking_lot::Mutex;
use std::collections::HashMap;
use station_store::{SystemTimeProvider, TimeProvider};

pub const MAX_RETRIES: u32 = 3;
pub const RETRY_INTERVAL_MS: u64 = 20_000;

#[derive(Debug, Clone)]
struct PendingMessage {
    frame: String,
    text: String,
    sent_count: u32,
    last_sent_ms: u64,
}

/// Tracks outgoing authenticated messages awaiting an ack, retransmitting
/// on a fixed interval and giving up after the retry budget is spent.
/// Entries key on `DEST:SEQ`; an ack only clears an entry when its text
/// matches what was actually sent, so a stray ack for a reused sequence
/// number cannot cancel the wrong retransmission.
pub struct RetryQueue<T: TimeProvider = SystemTimeProvider> {
    pending: Mutex<HashMap<String, PendingMessage>>,
    time: T,
}

impl RetryQueue<SystemTimeProvider> {
    pub fn new() -> Self {
        Self::with_time_provider(SystemTimeProvider)
    }
}

impl Default for RetryQueue<SystemTimeProvider> {
    fn default() -> Self {
        Self::new()
    }
}

fn key(dest: &str, seq: &str) -> String {
    format!("{dest}:{seq}")
}

impl<T: TimeProvider> RetryQueue<T> {
    pub fn with_time_provider(time: T) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            time,
        }
    }

    /// Registers a freshly sent message frame for retry tracking.
    pub fn track(&self, dest: &str, seq: &str, text: &str, frame: String) {
        let now = self.time.now_ms();
        self.pending.lock().insert(
            key(dest, seq),
            PendingMessage {
                frame,
                text: text.to_string(),
                sent_count: 1,
                last_sent_ms: now,
            },
        );
    }

    /// The text tracked for `dest:seq`, if an entry is still pending. Lets a
    /// caller that received a bare ack (no text of its own to compare)
    /// confirm against what it actually sent before clearing the entry.
    pub fn pending_text(&self, dest: &str, seq: &str) -> Option<String> {
        self.pending.lock().get(&key(dest, seq)).map(|entry| entry.text.clone())
    }

    /// Clears a pending entry if `text` matches what was sent; an ack for a
    /// sequence number whose tracked text differs is logged and ignored by
    /// the caller rather than clearing the wrong transmission.
    pub fn ack(&self, dest: &str, seq: &str, text: &str) -> bool {
        let mut pending = self.pending.lock();
        match pending.get(&key(dest, seq)) {
            Some(entry) if entry.text == text => {
                pending.remove(&key(dest, seq));
                true
            }
            _ => false,
        }
    }

    /// Retransmits every entry whose retry interval has elapsed and has
    /// not yet spent its retry budget; entries that exhaust their budget
    /// are dropped. Returns the frames to retransmit this tick.
    pub fn poll(&self) -> Vec<String> {
        let now = self.time.now_ms();
        let mut pending = self.pending.lock();
        let mut due = Vec::new();
        pending.retain(|_, entry| {
            if now.saturating_sub(entry.last_sent_ms) < RETRY_INTERVAL_MS {
                return true;
            }
            if entry.sent_count >= MAX_RETRIES {
                return false;
            }
            entry.sent_count += 1;
            entry.last_sent_ms = now;
            due.push(entry.frame.clone());
            true
        });
        due
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use station_store::ManualTimeProvider;

    #[test]
    fn retransmits_exactly_three_times_then_clears() {
        let queue = RetryQueue::with_time_provider(ManualTimeProvider::new(0));
        queue.track("W1AW-0", "042", "hello", "frame-1".to_string());

        assert!(queue.poll().is_empty());
        queue.time.advance_ms(RETRY_INTERVAL_MS);
        assert_eq!(queue.poll(), vec!["frame-1".to_string()]);
        queue.time.advance_ms(RETRY_INTERVAL_MS);
        assert_eq!(queue.poll(), vec!["frame-1".to_string()]);
        queue.time.advance_ms(RETRY_INTERVAL_MS);
        assert!(queue.poll().is_empty());
        assert!(queue.is_empty());
    }

    #[test]
    fn ack_with_matching_text_clears_entry() {
        let queue = RetryQueue::with_time_provider(ManualTimeProvider::new(0));
        queue.track("W1AW-0", "042", "hello", "frame-1".to_string());
        assert!(!queue.ack("W1AW-0", "042", "different text"));
        assert_eq!(queue.len(), 1);
        assert!(queue.ack("W1AW-0", "042", "hello"));
        assert!(queue.is_empty());
    }

    #[test]
    fn ack_for_unknown_sequence_is_ignored() {
        let queue = RetryQueue::with_time_provider(ManualTimeProvider::new(0));
        assert!(!queue.ack("W1AW-0", "999", "hello"));
    }
}
