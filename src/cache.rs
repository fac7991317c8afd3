//! Record list cache.
//!
//! Persists a whole merged list plus a "has loaded at least once" flag, so a
//! restart can render without a remote call and can tell "never loaded" from
//! "loaded, zero records". Shared by orders and products.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::DeskError;
use crate::model::{Order, Product};
use crate::storage::{
    self, KvStore, KEY_ORDERS_LIST, KEY_ORDERS_LOADED, KEY_PRODUCTS_LIST, KEY_PRODUCTS_LOADED,
};

/// Contents of a record list cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedList<T> {
    pub records: Vec<T>,
    pub has_loaded: bool,
}

impl<T> Default for CachedList<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            has_loaded: false,
        }
    }
}

/// Result of a remote refresh that falls back to cached data on failure.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<R> {
    /// Fresh data was fetched and committed.
    Live(R),
    /// The fetch failed; the last committed data stays in place.
    Cached { error: DeskError, records: usize },
}

impl<R> FetchOutcome<R> {
    pub fn is_live(&self) -> bool {
        matches!(self, FetchOutcome::Live(_))
    }

    pub fn error(&self) -> Option<&DeskError> {
        match self {
            FetchOutcome::Live(_) => None,
            FetchOutcome::Cached { error, .. } => Some(error),
        }
    }
}

pub struct RecordListCache<T> {
    store: Arc<dyn KvStore>,
    list_key: &'static str,
    loaded_key: &'static str,
    _records: PhantomData<fn() -> T>,
}

impl<T> Clone for RecordListCache<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            list_key: self.list_key,
            loaded_key: self.loaded_key,
            _records: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> RecordListCache<T> {
    pub fn new(store: Arc<dyn KvStore>, list_key: &'static str, loaded_key: &'static str) -> Self {
        Self {
            store,
            list_key,
            loaded_key,
            _records: PhantomData,
        }
    }

    /// Load the cached list. Corrupted contents clear both keys and read as
    /// never-loaded.
    pub fn load(&self) -> Result<CachedList<T>, DeskError> {
        let has_loaded = self
            .store
            .get(self.loaded_key)?
            .map(|v| v.trim() == "true")
            .unwrap_or(false);

        match storage::read_json::<Vec<T>>(self.store.as_ref(), self.list_key) {
            Ok(Some(records)) => {
                debug!(key = self.list_key, count = records.len(), "restored cached list");
                Ok(CachedList {
                    records,
                    has_loaded,
                })
            }
            Ok(None) => Ok(CachedList {
                records: Vec::new(),
                has_loaded,
            }),
            Err(DeskError::CorruptedCache(key)) => {
                warn!(key = %key, "cached list corrupted, clearing");
                self.clear()?;
                Ok(CachedList::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Persist `records` and mark the list as loaded.
    pub fn store(&self, records: &[T]) -> Result<(), DeskError> {
        storage::write_json(self.store.as_ref(), self.list_key, records)?;
        self.store.set(self.loaded_key, "true")
    }

    pub fn clear(&self) -> Result<(), DeskError> {
        self.store.delete(self.list_key)?;
        self.store.delete(self.loaded_key)
    }
}

pub fn order_list_cache(store: Arc<dyn KvStore>) -> RecordListCache<Order> {
    RecordListCache::new(store, KEY_ORDERS_LIST, KEY_ORDERS_LOADED)
}

pub fn product_list_cache(store: Arc<dyn KvStore>) -> RecordListCache<Product> {
    RecordListCache::new(store, KEY_PRODUCTS_LIST, KEY_PRODUCTS_LOADED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FulfillmentStatus;
    use crate::storage::MemoryStore;

    fn order(n: &str) -> Order {
        Order {
            order_number: n.to_string(),
            customer: "Asha".into(),
            total_price_display: "₹10".into(),
            payment_type: "cod".into(),
            payment_status: "pending".into(),
            fulfillment_status: FulfillmentStatus::Unfulfilled,
            created_at_display: "2025-07-30 10:00:00".into(),
        }
    }

    #[test]
    fn test_never_loaded_vs_loaded_empty() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let cache = order_list_cache(kv);

        let initial = cache.load().unwrap();
        assert!(!initial.has_loaded);
        assert!(initial.records.is_empty());

        cache.store(&[]).unwrap();
        let loaded = cache.load().unwrap();
        assert!(loaded.has_loaded);
        assert!(loaded.records.is_empty());
    }

    #[test]
    fn test_store_and_load_orders() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let cache = order_list_cache(kv);
        cache.store(&[order("1"), order("2")]).unwrap();
        let loaded = cache.load().unwrap();
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.records[1].order_number, "2");
    }

    #[test]
    fn test_corrupted_list_is_cleared() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let cache = product_list_cache(kv.clone());
        kv.set(KEY_PRODUCTS_LIST, "{\"oops\":").unwrap();
        kv.set(KEY_PRODUCTS_LOADED, "true").unwrap();

        let loaded = cache.load().unwrap();
        assert!(!loaded.has_loaded);
        assert!(loaded.records.is_empty());
        assert_eq!(kv.get(KEY_PRODUCTS_LOADED).unwrap(), None);
    }
}
