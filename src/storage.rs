//! Injected key-value store.
//!
//! Every piece of durable local state (overrides, cached lists, the active
//! date range, cached metrics) goes through [`KvStore`]. The SQLite-backed
//! [`DbState`] is the production store; [`MemoryStore`] serves ephemeral
//! sessions and tests.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::warn;

use crate::db::{self, DbState};
use crate::error::DeskError;

/// `local_settings` category holding desk state.
const LOCAL_CATEGORY: &str = "local";

// Store keys
pub const KEY_ORDER_OVERRIDES: &str = "orders.overrides";
pub const KEY_ORDERS_LIST: &str = "orders.list";
pub const KEY_ORDERS_LOADED: &str = "orders.loaded";
pub const KEY_PRODUCTS_LIST: &str = "products.list";
pub const KEY_PRODUCTS_LOADED: &str = "products.loaded";
pub const KEY_DATE_RANGE: &str = "filter.date_range";
pub const KEY_SUMMARY_DATA: &str = "summary.data";
pub const KEY_SUMMARY_FETCHED_AT: &str = "summary.fetched_at";

/// Durable string key-value store.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, DeskError>;
    fn set(&self, key: &str, value: &str) -> Result<(), DeskError>;
    /// Remove `key`. Missing keys are not an error.
    fn delete(&self, key: &str) -> Result<(), DeskError>;
}

impl KvStore for DbState {
    fn get(&self, key: &str) -> Result<Option<String>, DeskError> {
        let conn = self.conn.lock().map_err(|e| DeskError::Storage(e.to_string()))?;
        db::get_setting(&conn, LOCAL_CATEGORY, key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), DeskError> {
        let conn = self.conn.lock().map_err(|e| DeskError::Storage(e.to_string()))?;
        db::set_setting(&conn, LOCAL_CATEGORY, key, value)
    }

    fn delete(&self, key: &str) -> Result<(), DeskError> {
        let conn = self.conn.lock().map_err(|e| DeskError::Storage(e.to_string()))?;
        db::delete_setting(&conn, LOCAL_CATEGORY, key)
    }
}

/// Process-local store. Contents vanish with the process.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, DeskError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| DeskError::Storage(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), DeskError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| DeskError::Storage(e.to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), DeskError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| DeskError::Storage(e.to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JSON helpers
// ---------------------------------------------------------------------------

/// Read and decode a JSON value.
///
/// A stored value that fails to decode is cleared and reported as
/// `CorruptedCache`; callers treat that as "nothing stored".
pub fn read_json<T: DeserializeOwned>(
    store: &dyn KvStore,
    key: &str,
) -> Result<Option<T>, DeskError> {
    let raw = match store.get(key)? {
        Some(raw) => raw,
        None => return Ok(None),
    };
    match serde_json::from_str::<T>(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!(key, error = %e, "stored value is unreadable, clearing it");
            store.delete(key)?;
            Err(DeskError::CorruptedCache(key.to_string()))
        }
    }
}

/// Like [`read_json`], but folds `CorruptedCache` into `None`.
pub fn read_json_or_default<T: DeserializeOwned>(
    store: &dyn KvStore,
    key: &str,
) -> Result<Option<T>, DeskError> {
    match read_json(store, key) {
        Err(DeskError::CorruptedCache(_)) => Ok(None),
        other => other,
    }
}

pub fn write_json<T: Serialize + ?Sized>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
) -> Result<(), DeskError> {
    let raw = serde_json::to_string(value)
        .map_err(|e| DeskError::Storage(format!("encode {key}: {e}")))?;
    store.set(key, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_memory_store_crud() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a").unwrap(), None);
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        store.delete("a").unwrap();
        store.delete("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn test_sqlite_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("desk.db");
        {
            let db = db::init(&path).unwrap();
            db.set(KEY_ORDERS_LOADED, "true").unwrap();
        }
        let db = db::init(&path).unwrap();
        assert_eq!(db.get(KEY_ORDERS_LOADED).unwrap().as_deref(), Some("true"));
    }

    #[test]
    fn test_json_roundtrip_and_corruption() {
        let store = MemoryStore::new();
        let mut map = BTreeMap::new();
        map.insert("1006".to_string(), "fulfilled".to_string());
        write_json(&store, KEY_ORDER_OVERRIDES, &map).unwrap();
        let back: Option<BTreeMap<String, String>> =
            read_json(&store, KEY_ORDER_OVERRIDES).unwrap();
        assert_eq!(back, Some(map));

        store.set(KEY_ORDER_OVERRIDES, "{broken").unwrap();
        let err = read_json::<BTreeMap<String, String>>(&store, KEY_ORDER_OVERRIDES).unwrap_err();
        assert_eq!(err, DeskError::CorruptedCache(KEY_ORDER_OVERRIDES.to_string()));
        // Corrupted entry is cleared.
        assert_eq!(store.get(KEY_ORDER_OVERRIDES).unwrap(), None);
    }

    #[test]
    fn test_read_json_or_default_folds_corruption() {
        let store = MemoryStore::new();
        store.set(KEY_DATE_RANGE, "[[[").unwrap();
        let value: Option<Vec<String>> = read_json_or_default(&store, KEY_DATE_RANGE).unwrap();
        assert!(value.is_none());
    }
}
