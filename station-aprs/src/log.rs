use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use station_store::{StoreResult, Storage, SystemTimeProvider, TimeProvider};

const MAX_ENTRIES: usize = 1000;
const FLUSH_INTERVAL_MS: u64 = 60_000;
const LOG_KEY: &str = "aprs_message_log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Sent,
    Received,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageLogEntry {
    pub timestamp_ms: u64,
    pub source: String,
    pub destination: String,
    pub data_type: String,
    pub text: String,
    pub direction: Direction,
}

struct Inner {
    entries: Vec<MessageLogEntry>,
    last_flush_ms: u64,
    dirty: bool,
}

/// Message history backing `APRSMSGS`, capped at 1000 entries and flushed
/// to storage no more than once per minute.
pub struct AprsLog<T: TimeProvider = SystemTimeProvider> {
    time: T,
    inner: Mutex<Inner>,
}

impl AprsLog<SystemTimeProvider> {
    pub fn new() -> Self {
        Self::with_time_provider(SystemTimeProvider)
    }
}

impl Default for AprsLog<SystemTimeProvider> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeProvider> AprsLog<T> {
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

    /// Loads any previously persisted history for this provider's clock.
    pub fn load(time: T, storage: &Storage) -> StoreResult<Self> {
        let entries = storage.get::<Vec<MessageLogEntry>>(LOG_KEY)?.unwrap_or_default();
        Ok(Self {
            time,
            inner: Mutex::new(Inner {
                entries,
                last_flush_ms: 0,
                dirty: false,
            }),
        })
    }

    pub fn record(&self, entry: MessageLogEntry, storage: &Storage) -> StoreResult<()> {
        let now = self.time.now_ms();
        let mut inner = self.inner.lock();
        if inner.entries.len() >= MAX_ENTRIES {
            inner.entries.remove(0);
        }
        inner.entries.push(entry);
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

    pub fn recent(&self, count: usize) -> Vec<MessageLogEntry> {
        let inner = self.inner.lock();
        let len = inner.entries.len();
        let start = len.saturating_sub(count);
        inner.entries[start..].to_vec()
    }
}
