use crate::error::StoreResult;
use crate::schema;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;

/// Key-value persistence with pattern listing and batch writes. Each value
/// is stored as its JSON serialization; one connection per `Storage`,
/// guarded by a mutex, matching the single-writer requirement this store
/// is expected to uphold.
pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(schema::CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(schema::CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn set<V: Serialize>(&self, key: &str, value: &V) -> StoreResult<()> {
        let json = serde_json::to_string(value)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![key, json],
        )?;
        Ok(())
    }

    /// Writes every pair in one transaction.
    pub fn set_batch<V: Serialize>(&self, entries: &[(&str, V)]) -> StoreResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for (key, value) in entries {
            let json = serde_json::to_string(value)?;
            tx.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = ?2",
                params![key, json],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get<V: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<V>> {
        let conn = self.conn.lock().unwrap();
        let json: Option<String> = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |r| {
                r.get(0)
            })
            .optional()?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn delete(&self, key: &str) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    pub fn exists(&self, key: &str) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached("SELECT 1 FROM kv WHERE key = ?1")?;
        Ok(stmt.exists(params![key])?)
    }

    /// Lists keys matching a SQL `LIKE` pattern (`%` wildcard).
    pub fn list(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT key FROM kv WHERE key LIKE ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![pattern], |r| r.get(0))?;
        let mut keys = Vec::new();
        for row in rows {
            keys.push(row?);
        }
        Ok(keys)
    }

    pub fn count(&self, pattern: &str) -> StoreResult<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM kv WHERE key LIKE ?1",
            params![pattern],
            |r| r.get(0),
        )?;
        Ok(count as u64)
    }

    pub fn clear(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM kv", [])?;
        Ok(())
    }

    pub fn backup<P: AsRef<Path>>(&self, destination: P) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let mut dest = Connection::open(destination)?;
        let backup = rusqlite::backup::Backup::new(&conn, &mut dest)?;
        backup.run_to_completion(5, std::time::Duration::from_millis(50), None)?;
        Ok(())
    }

    pub fn vacuum(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("VACUUM")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_roundtrips_json_value() {
        let storage = Storage::open_in_memory().unwrap();
        storage.set("bulletins:1", &vec!["hello", "world"]).unwrap();
        let value: Vec<String> = storage.get("bulletins:1").unwrap().unwrap();
        assert_eq!(value, vec!["hello".to_string(), "world".to_string()]);
    }

    #[test]
    fn missing_key_returns_none() {
        let storage = Storage::open_in_memory().unwrap();
        let value: Option<String> = storage.get("nope").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn pattern_listing_uses_wildcard() {
        let storage = Storage::open_in_memory().unwrap();
        storage.set("aprs:1", &1).unwrap();
        storage.set("aprs:2", &2).unwrap();
        storage.set("bbs:1", &3).unwrap();
        let mut keys = storage.list("aprs:%").unwrap();
        keys.sort();
        assert_eq!(keys, vec!["aprs:1".to_string(), "aprs:2".to_string()]);
        assert_eq!(storage.count("aprs:%").unwrap(), 2);
    }

    #[test]
    fn delete_and_exists_track_presence() {
        let storage = Storage::open_in_memory().unwrap();
        storage.set("k", &"v").unwrap();
        assert!(storage.exists("k").unwrap());
        storage.delete("k").unwrap();
        assert!(!storage.exists("k").unwrap());
    }

    #[test]
    fn batch_write_is_atomic() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .set_batch(&[("a", 1), ("b", 2), ("c", 3)])
            .unwrap();
        assert_eq!(storage.count("%").unwrap(), 3);
    }

    #[test]
    fn clear_removes_all_keys() {
        let storage = Storage::open_in_memory().unwrap();
        storage.set("a", &1).unwrap();
        storage.set("b", &2).unwrap();
        storage.clear().unwrap();
        assert_eq!(storage.count("%").unwrap(), 0);
    }
}
