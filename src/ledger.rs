//! The committed order list.
//!
//! Owns the merged in-memory list and keeps it in step with the override
//! store and the order list cache. Reconciliation and batch commits are the
//! only writers; every mutation is durable before it becomes visible through
//! [`OrderLedger::orders`].

use tracing::{info, warn};

use crate::cache::RecordListCache;
use crate::error::DeskError;
use crate::model::{FulfillmentStatus, Order, ProcessedStatus, RemoteOrder};
use crate::normalize::Normalized;
use crate::overrides::OverrideStore;
use crate::reconcile::{self, ReconcileStats};

/// Result of applying one remote snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SnapshotReport {
    pub total: usize,
    pub dropped: usize,
    pub override_writes: usize,
    pub stats: ReconcileStats,
}

pub struct OrderLedger {
    orders: Vec<Order>,
    has_loaded: bool,
    overrides: OverrideStore,
    cache: RecordListCache<Order>,
}

impl OrderLedger {
    pub fn new(overrides: OverrideStore, cache: RecordListCache<Order>) -> Self {
        Self {
            orders: Vec::new(),
            has_loaded: false,
            overrides,
            cache,
        }
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn has_loaded(&self) -> bool {
        self.has_loaded
    }

    pub fn find(&self, order_number: &str) -> Option<&Order> {
        self.orders.iter().find(|o| o.order_number == order_number)
    }

    pub fn overrides(&self) -> &OverrideStore {
        &self.overrides
    }

    /// Replace the in-memory list with the cached one.
    pub fn restore(&mut self) -> Result<(), DeskError> {
        let cached = self.cache.load()?;
        info!(
            count = cached.records.len(),
            has_loaded = cached.has_loaded,
            "order list restored from cache"
        );
        self.orders = cached.records;
        self.has_loaded = cached.has_loaded;
        Ok(())
    }

    /// Reconcile a remote snapshot against the override store and the
    /// current list, then commit: overrides first, list cache second,
    /// in-memory list last.
    pub fn apply_snapshot(
        &mut self,
        snapshot: &Normalized<RemoteOrder>,
    ) -> Result<SnapshotReport, DeskError> {
        let overrides = self.overrides.all()?;
        let outcome = reconcile::reconcile(&snapshot.records, &overrides, &self.orders);

        self.overrides.set_many(&outcome.override_writes)?;
        self.cache.store(&outcome.merged)?;

        let report = SnapshotReport {
            total: outcome.merged.len(),
            dropped: snapshot.dropped,
            override_writes: outcome.override_writes.len(),
            stats: outcome.stats,
        };
        self.orders = outcome.merged;
        self.has_loaded = true;

        info!(
            total = report.total,
            dropped = report.dropped,
            override_writes = report.override_writes,
            local_override = report.stats.local_override,
            carried_forward = report.stats.carried_forward,
            "order snapshot reconciled"
        );
        Ok(report)
    }

    /// Record a confirmed remote transition for one order: update the list
    /// entry, write the override, persist the list.
    ///
    /// Returns `false` when the order is not in the current list (the
    /// override is still written).
    pub fn commit_transition(
        &mut self,
        order_number: &str,
        status: ProcessedStatus,
    ) -> Result<bool, DeskError> {
        let target: FulfillmentStatus = status.into();
        let mut next = self.orders.clone();
        let found = match next.iter_mut().find(|o| o.order_number == order_number) {
            Some(order) => {
                order.fulfillment_status = target;
                true
            }
            None => {
                warn!(order_number, "confirmed order is not in the current list");
                false
            }
        };

        self.overrides.set(order_number, status)?;
        if found {
            self.cache.store(&next)?;
            self.orders = next;
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::order_list_cache;
    use crate::normalize::normalize_order_snapshot;
    use crate::storage::{KvStore, MemoryStore};
    use serde_json::json;
    use std::sync::Arc;

    fn ledger(kv: Arc<dyn KvStore>) -> OrderLedger {
        OrderLedger::new(OverrideStore::new(kv.clone()), order_list_cache(kv))
    }

    #[test]
    fn test_apply_snapshot_persists_overrides_and_cache() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let mut book = ledger(kv.clone());
        let snapshot = normalize_order_snapshot(&json!([
            { "orderNumber": "1", "fulfillmentStatus": "fulfilled" },
            { "orderNumber": "2", "fulfillmentStatus": "unfulfilled" },
            { "customerName": "no id" }
        ]))
        .unwrap();

        let report = book.apply_snapshot(&snapshot).unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.override_writes, 1);
        assert!(book.has_loaded());

        let overrides = book.overrides().all().unwrap();
        assert_eq!(overrides.get("1"), Some(&ProcessedStatus::Fulfilled));

        // A fresh ledger over the same store sees the committed list.
        let mut reopened = ledger(kv);
        reopened.restore().unwrap();
        assert_eq!(reopened.orders(), book.orders());
        assert!(reopened.has_loaded());
    }

    #[test]
    fn test_commit_transition_updates_all_three() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let mut book = ledger(kv.clone());
        let snapshot =
            normalize_order_snapshot(&json!([{ "orderNumber": "5", "fulfillmentStatus": "unfulfilled" }]))
                .unwrap();
        book.apply_snapshot(&snapshot).unwrap();

        assert!(book.commit_transition("5", ProcessedStatus::Cancelled).unwrap());
        assert_eq!(
            book.find("5").unwrap().fulfillment_status,
            FulfillmentStatus::Cancelled
        );
        assert_eq!(
            book.overrides().get("5").unwrap(),
            Some(ProcessedStatus::Cancelled)
        );

        let mut reopened = ledger(kv);
        reopened.restore().unwrap();
        assert_eq!(
            reopened.find("5").unwrap().fulfillment_status,
            FulfillmentStatus::Cancelled
        );
    }

    #[test]
    fn test_commit_unknown_order_still_writes_override() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let mut book = ledger(kv);
        assert!(!book.commit_transition("404", ProcessedStatus::Fulfilled).unwrap());
        assert_eq!(
            book.overrides().get("404").unwrap(),
            Some(ProcessedStatus::Fulfilled)
        );
        assert!(book.orders().is_empty());
    }

    #[test]
    fn test_refetch_does_not_regress_confirmed_status() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let mut book = ledger(kv);
        let unfulfilled =
            normalize_order_snapshot(&json!([{ "orderNumber": "1006", "fulfillmentStatus": "unfulfilled" }]))
                .unwrap();
        book.apply_snapshot(&unfulfilled).unwrap();
        book.commit_transition("1006", ProcessedStatus::Fulfilled).unwrap();

        // Remote still lags behind.
        book.apply_snapshot(&unfulfilled).unwrap();
        assert_eq!(
            book.find("1006").unwrap().fulfillment_status,
            FulfillmentStatus::Fulfilled
        );
    }

    #[test]
    fn test_unreadable_override_store_blocks_snapshot() {
        let db = Arc::new(crate::db::open_in_memory().unwrap());
        let kv: Arc<dyn KvStore> = db.clone();
        let mut book = ledger(kv);
        let unfulfilled =
            normalize_order_snapshot(&json!([{ "orderNumber": "1006", "fulfillmentStatus": "unfulfilled" }]))
                .unwrap();
        book.apply_snapshot(&unfulfilled).unwrap();
        book.commit_transition("1006", ProcessedStatus::Fulfilled).unwrap();

        db.conn
            .lock()
            .unwrap()
            .execute(
                "UPDATE local_settings SET setting_value = x'00' WHERE setting_key = ?1",
                [crate::storage::KEY_ORDER_OVERRIDES],
            )
            .unwrap();

        let err = book.apply_snapshot(&unfulfilled).unwrap_err();
        assert_eq!(err.kind(), "storage");
        assert_eq!(
            book.find("1006").unwrap().fulfillment_status,
            FulfillmentStatus::Fulfilled
        );
    }
}
