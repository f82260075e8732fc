use serde::{Deserialize, Serialize};
use station_store::{Storage, StoreResult};

const MAX_LIVE_BULLETINS_PER_CALLSIGN: usize = 3;
const MAX_MESSAGE_LEN: usize = 300;
const DEFAULT_EXPIRE_DAYS: u32 = 7;
const DAY_MS: u64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bulletin {
    pub id: u64,
    pub callsign: String,
    pub message: String,
    pub posted_time_ms: u64,
    pub expire_time_ms: u64,
    pub expire_days: u32,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BulletinError {
    #[error("bulletin message must not be empty")]
    Empty,
    #[error("bulletin message exceeds 300 characters")]
    TooLong,
    #[error("caller already has the maximum of 3 live bulletins")]
    TooManyLive,
    #[error("no bulletin with that id belongs to this caller")]
    NotOwned,
}

/// Bulletin CRUD backed by a key-value `Storage`. Bulletins live under
/// keys `bulletin:<id>`; every read and write purges entries whose
/// `expire_time_ms` has passed before acting.
pub struct BulletinStore<'a> {
    storage: &'a Storage,
}

impl<'a> BulletinStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    fn key(id: u64) -> String {
        format!("bulletin:{id}")
    }

    fn purge_expired(&self, now_ms: u64) -> StoreResult<()> {
        for key in self.storage.list("bulletin:%")? {
            if let Some(bulletin) = self.storage.get::<Bulletin>(&key)? {
                if bulletin.expire_time_ms <= now_ms {
                    self.storage.delete(&key)?;
                }
            }
        }
        Ok(())
    }

    pub fn list_live(&self, now_ms: u64) -> StoreResult<Vec<Bulletin>> {
        self.purge_expired(now_ms)?;
        let mut bulletins = Vec::new();
        for key in self.storage.list("bulletin:%")? {
            if let Some(bulletin) = self.storage.get::<Bulletin>(&key)? {
                bulletins.push(bulletin);
            }
        }
        bulletins.sort_by_key(|b| b.id);
        Ok(bulletins)
    }

    fn live_count_for(&self, callsign: &str, now_ms: u64) -> StoreResult<usize> {
        Ok(self
            .list_live(now_ms)?
            .into_iter()
            .filter(|b| b.callsign.eq_ignore_ascii_case(callsign))
            .count())
    }

    /// Creates a new bulletin posted by `callsign` at `now_ms` (used as
    /// both the id and the post timestamp), rejecting an empty, too-long,
    /// or over-quota message before it ever reaches storage.
    pub fn create(
        &self,
        callsign: &str,
        message: &str,
        now_ms: u64,
    ) -> Result<Bulletin, BulletinError> {
        let trimmed = message.trim();
        if trimmed.is_empty() {
            return Err(BulletinError::Empty);
        }
        if trimmed.chars().count() > MAX_MESSAGE_LEN {
            return Err(BulletinError::TooLong);
        }
        let callsign = callsign.to_ascii_uppercase();
        if self
            .live_count_for(&callsign, now_ms)
            .unwrap_or(0)
            >= MAX_LIVE_BULLETINS_PER_CALLSIGN
        {
            return Err(BulletinError::TooManyLive);
        }
        let bulletin = Bulletin {
            id: now_ms,
            callsign,
            message: trimmed.to_string(),
            posted_time_ms: now_ms,
            expire_time_ms: now_ms + DEFAULT_EXPIRE_DAYS as u64 * DAY_MS,
            expire_days: DEFAULT_EXPIRE_DAYS,
        };
        self.storage
            .set(&Self::key(bulletin.id), &bulletin)
            .map_err(|_| BulletinError::Empty)?;
        Ok(bulletin)
    }

    /// Deletes bulletin `id` if it exists and is owned by `callsign`.
    pub fn delete(&self, callsign: &str, id: u64) -> Result<(), BulletinError> {
        let key = Self::key(id);
        let bulletin = self
            .storage
            .get::<Bulletin>(&key)
            .ok()
            .flatten()
            .ok_or(BulletinError::NotOwned)?;
        if !bulletin.callsign.eq_ignore_ascii_case(callsign) {
            return Err(BulletinError::NotOwned);
        }
        self.storage.delete(&key).map_err(|_| BulletinError::NotOwned)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_list_round_trips() {
        let storage = Storage::open_in_memory().unwrap();
        let bulletins = BulletinStore::new(&storage);
        bulletins.create("kk7vzt", "Test bulletin", 1_000).unwrap();
        let live = bulletins.list_live(1_000).unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].callsign, "KK7VZT");
        assert_eq!(live[0].message, "Test bulletin");
    }

    #[test]
    fn rejects_fourth_live_bulletin() {
        let storage = Storage::open_in_memory().unwrap();
        let bulletins = BulletinStore::new(&storage);
        bulletins.create("KK7VZT", "one", 1).unwrap();
        bulletins.create("KK7VZT", "two", 2).unwrap();
        bulletins.create("KK7VZT", "three", 3).unwrap();
        let err = bulletins.create("KK7VZT", "four", 4).unwrap_err();
        assert_eq!(err, BulletinError::TooManyLive);
    }

    #[test]
    fn expired_bulletins_are_purged_on_read() {
        let storage = Storage::open_in_memory().unwrap();
        let bulletins = BulletinStore::new(&storage);
        bulletins.create("KK7VZT", "short-lived", 0).unwrap();
        let live = bulletins.list_live(8 * DAY_MS).unwrap();
        assert!(live.is_empty());
    }

    #[test]
    fn delete_restricted_to_owner() {
        let storage = Storage::open_in_memory().unwrap();
        let bulletins = BulletinStore::new(&storage);
        let posted = bulletins.create("KK7VZT", "mine", 1).unwrap();
        let err = bulletins.delete("W1AW", posted.id).unwrap_err();
        assert_eq!(err, BulletinError::NotOwned);
        bulletins.delete("KK7VZT", posted.id).unwrap();
        assert!(bulletins.list_live(1).unwrap().is_empty());
    }
}
