use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use station_store::{StoreResult, Storage, SystemTimeProvider, TimeProvider};

const MAX_ENTRIES: usize = 200;
const FLUSH_INTERVAL_MS: u64 = 60_000;
const LOG_KEY: &str = "winlink_relay_log";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayLogEntry {
    pub callsign: String,
    pub connect_ms: u64,
    pub disconnect_ms: Option<u64>,
    pub duration_ms: Option<u64>,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

struct Inner {
    entries: Vec<RelayLogEntry>,
    last_flush_ms: u64,
    dirty: bool,
}

/// Records each CMS relay connection, capped at 200 entries and flushed no
/// more than once per minute, mirroring the BBS connection log and the
/// APRS message history.
pub struct RelayLog<T: TimeProvider = SystemTimeProvider> {
    time: T,
    inner: Mutex<Inner>,
}

impl RelayLog<SystemTimeProvider> {
    pub fn new() -> Self {
        Self::with_time_provider(SystemTimeProvider)
    }
}

impl Default for RelayLog<SystemTimeProvider> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeProvider> RelayLog<T> {
    pub fn with_time_provider(time: T) -> Self {
        Self {
            time,
            inner: Mutex::new(Inner {
                entries: Vec::new(),
                last_flush_ms: 0,
                dirty: false,
            }),
        }
    }

    pub fn load(time: T, storage: &Storage) -> StoreResult<Self> {
        let entries = storage.get::<Vec<RelayLogEntry>>(LOG_KEY)?.unwrap_or_default();
        Ok(Self {
            time,
            inner: Mutex::new(Inner {
                entries,
                last_flush_ms: 0,
                dirty: false,
            }),
        })
    }

    /// Opens a new entry for a just-established connection.
    pub fn record_connect(&self, callsign: &str) -> usize {
        let now = self.time.now_ms();
        let mut inner = self.inner.lock();
        if inner.entries.len() >= MAX_ENTRIES {
            inner.entries.remove(0);
        }
        inner.entries.push(RelayLogEntry {
            callsign: callsign.to_string(),
            connect_ms: now,
            disconnect_ms: None,
            duration_ms: None,
            bytes_sent: 0,
            bytes_received: 0,
        });
        inner.dirty = true;
        inner.entries.len() - 1
    }

    pub fn record_disconnect(&self, index: usize, bytes_sent: u64, bytes_received: u64, storage: &Storage) -> StoreResult<()> {
        let now = self.time.now_ms();
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.get_mut(index) {
            entry.disconnect_ms = Some(now);
            entry.duration_ms = Some(now.saturating_sub(entry.connect_ms));
            entry.bytes_sent = bytes_sent;
            entry.bytes_received = bytes_received;
        }
        inner.dirty = true;
        if now.saturating_sub(inner.last_flush_ms) >= FLUSH_INTERVAL_MS {
            Self::flush_locked(&mut inner, now, storage)?;
        }
        Ok(())
    }

    pub fn flush(&self, storage: &Storage) -> StoreResult<()> {
        let now = self.time.now_ms();
        let mut inner = self.inner.lock();
        Self::flush_locked(&mut inner, now, storage)
    }

    fn flush_locked(inner: &mut Inner, now: u64, storage: &Storage) -> StoreResult<()> {
        if !inner.dirty {
            inner.last_flush_ms = now;
            return Ok(());
        }
        storage.set(LOG_KEY, &inner.entries)?;
        inner.dirty = false;
        inner.last_flush_ms = now;
        Ok(())
    }

    pub fn last(&self, count: usize) -> Vec<RelayLogEntry> {
        let inner = self.inner.lock();
        let len = inner.entries.len();
        let start = len.saturating_sub(count);
        inner.entries[start..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use station_store::ManualTimeProvider;

    #[test]
    fn caps_at_max_entries() {
        let log = RelayLog::with_time_provider(ManualTimeProvider::new(0));
        for i in 0..(MAX_ENTRIES + 3) {
            log.record_connect(&format!("W1AW-{i}"));
        }
        assert_eq!(log.last(usize::MAX).len(), MAX_ENTRIES);
    }

    #[test]
    fn disconnect_fills_duration_and_byte_counts() {
        let storage = Storage::open_in_memory().unwrap();
        let time = ManualTimeProvider::new(0);
        let log = RelayLog::with_time_provider(time);
        let idx = log.record_connect("W1AW-0");
        log.time.advance_ms(5_000);
        log.record_disconnect(idx, 128, 64, &storage).unwrap();
        let entry = &log.last(1)[0];
        assert_eq!(entry.duration_ms, Some(5_000));
        assert_eq!(entry.bytes_sent, 128);
        assert_eq!(entry.bytes_received, 64);
    }
}
