//! Persistent override store.
//!
//! Maps order number to the last locally confirmed processed status. Entries
//! never expire; the map grows with every order ever processed.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::DeskError;
use crate::model::{FulfillmentStatus, ProcessedStatus};
use crate::storage::{self, KvStore, KEY_ORDER_OVERRIDES};

pub type OverrideMap = BTreeMap<String, ProcessedStatus>;

#[derive(Clone)]
pub struct OverrideStore {
    store: Arc<dyn KvStore>,
}

impl OverrideStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Every stored override.
    ///
    /// An unreadable map is cleared and treated as empty. Individual entries
    /// holding a non-processed value are skipped.
    pub fn all(&self) -> Result<OverrideMap, DeskError> {
        let raw: BTreeMap<String, String> =
            match storage::read_json(self.store.as_ref(), KEY_ORDER_OVERRIDES) {
                Ok(Some(map)) => map,
                Ok(None) => return Ok(OverrideMap::new()),
                Err(DeskError::CorruptedCache(key)) => {
                    warn!(key = %key, "override store corrupted, starting from an empty set");
                    return Ok(OverrideMap::new());
                }
                Err(e) => return Err(e),
            };

        let mut map = OverrideMap::new();
        for (order_number, status) in raw {
            match FulfillmentStatus::parse(&status).and_then(|s| s.processed()) {
                Some(processed) => {
                    map.insert(order_number, processed);
                }
                None => {
                    warn!(order_number = %order_number, status = %status, "skipping invalid override entry");
                }
            }
        }
        Ok(map)
    }

    pub fn get(&self, order_number: &str) -> Result<Option<ProcessedStatus>, DeskError> {
        Ok(self.all()?.get(order_number).copied())
    }

    pub fn set(&self, order_number: &str, status: ProcessedStatus) -> Result<(), DeskError> {
        let mut writes = OverrideMap::new();
        writes.insert(order_number.to_string(), status);
        self.set_many(&writes)
    }

    /// Like [`OverrideStore::set`] for an unchecked status. `unfulfilled` is
    /// rejected.
    pub fn set_status(&self, order_number: &str, status: FulfillmentStatus) -> Result<(), DeskError> {
        let processed = ProcessedStatus::try_from(status).map_err(|_| {
            DeskError::InvalidInput(format!(
                "override for order {order_number} must be a processed status, got {status}"
            ))
        })?;
        self.set(order_number, processed)
    }

    /// Merge `writes` into the stored map in a single store write.
    pub fn set_many(&self, writes: &OverrideMap) -> Result<(), DeskError> {
        if writes.is_empty() {
            return Ok(());
        }
        let mut map = self.all()?;
        for (order_number, status) in writes {
            map.insert(order_number.clone(), *status);
        }
        storage::write_json(self.store.as_ref(), KEY_ORDER_OVERRIDES, &map)?;
        debug!(written = writes.len(), total = map.len(), "override store updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn store() -> (Arc<MemoryStore>, OverrideStore) {
        let kv = Arc::new(MemoryStore::new());
        (kv.clone(), OverrideStore::new(kv))
    }

    #[test]
    fn test_set_get_all() {
        let (_, overrides) = store();
        assert_eq!(overrides.get("1006").unwrap(), None);
        overrides.set("1006", ProcessedStatus::Fulfilled).unwrap();
        overrides.set("1007", ProcessedStatus::Cancelled).unwrap();
        overrides.set("1006", ProcessedStatus::Restocked).unwrap();

        let all = overrides.all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["1006"], ProcessedStatus::Restocked);
        assert_eq!(
            overrides.get("1007").unwrap(),
            Some(ProcessedStatus::Cancelled)
        );
    }

    #[test]
    fn test_set_status_rejects_unfulfilled() {
        let (_, overrides) = store();
        let err = overrides
            .set_status("1006", FulfillmentStatus::Unfulfilled)
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
        assert!(overrides.all().unwrap().is_empty());

        overrides
            .set_status("1006", FulfillmentStatus::Cancelled)
            .unwrap();
        assert_eq!(
            overrides.get("1006").unwrap(),
            Some(ProcessedStatus::Cancelled)
        );
    }

    #[test]
    fn test_corrupted_store_reads_empty_and_is_cleared() {
        let (kv, overrides) = store();
        kv.set(KEY_ORDER_OVERRIDES, "not json at all").unwrap();
        assert!(overrides.all().unwrap().is_empty());
        assert_eq!(kv.get(KEY_ORDER_OVERRIDES).unwrap(), None);

        // The store is usable again afterwards.
        overrides.set("1", ProcessedStatus::Fulfilled).unwrap();
        assert_eq!(overrides.all().unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_entries_are_skipped() {
        let (kv, overrides) = store();
        kv.set(
            KEY_ORDER_OVERRIDES,
            r#"{"1":"fulfilled","2":"unfulfilled","3":"shipped"}"#,
        )
        .unwrap();
        let all = overrides.all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all["1"], ProcessedStatus::Fulfilled);
    }
}
