use serde::{Deserialize, Serialize};
use station_store::{Storage, StoreResult};

const MAX_ENTRIES: usize = 100;
const LOG_KEY: &str = "connection_log";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionLogEntry {
    pub callsign: String,
    pub connect_time_ms: u64,
    pub disconnect_time_ms: Option<u64>,
}

/// Capped history of the last 100 BBS connections, held as a single JSON
/// list under one storage key.
pub struct ConnectionLog<'a> {
    storage: &'a Storage,
}

impl<'a> ConnectionLog<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    fn load(&self) -> StoreResult<Vec<ConnectionLogEntry>> {
        Ok(self.storage.get(LOG_KEY)?.unwrap_or_default())
    }

    pub fn record_connect(&self, callsign: &str, now_ms: u64) -> StoreResult<()> {
        let mut entries = self.load()?;
        entries.push(ConnectionLogEntry {
            callsign: callsign.to_ascii_uppercase(),
            connect_time_ms: now_ms,
            disconnect_time_ms: None,
        });
        while entries.len() > MAX_ENTRIES {
            entries.remove(0);
        }
        self.storage.set(LOG_KEY, &entries)
    }

    pub fn record_disconnect(&self, callsign: &str, now_ms: u64) -> StoreResult<()> {
        let mut entries = self.load()?;
        if let Some(entry) = entries
            .iter_mut()
            .rev()
            .find(|e| e.callsign.eq_ignore_ascii_case(callsign) && e.disconnect_time_ms.is_none())
        {
            entry.disconnect_time_ms = Some(now_ms);
        }
        self.storage.set(LOG_KEY, &entries)
    }

    pub fn last(&self, count: usize) -> StoreResult<Vec<ConnectionLogEntry>> {
        let entries = self.load()?;
        let start = entries.len().saturating_sub(count);
        Ok(entries[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_at_100_entries() {
        let storage = Storage::open_in_memory().unwrap();
        let log = ConnectionLog::new(&storage);
        for i in 0..110u64 {
            log.record_connect("KK7VZT", i).unwrap();
        }
        assert_eq!(log.last(200).unwrap().len(), MAX_ENTRIES);
    }

    #[test]
    fn disconnect_matches_most_recent_open_session() {
        let storage = Storage::open_in_memory().unwrap();
        let log = ConnectionLog::new(&storage);
        log.record_connect("KK7VZT", 1).unwrap();
        log.record_disconnect("KK7VZT", 2).unwrap();
        let entries = log.last(1).unwrap();
        assert_eq!(entries[0].disconnect_time_ms, Some(2));
    }
}
