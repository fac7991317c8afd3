//! Order status reconciliation.
//!
//! Merges three sources of truth about an order's fulfillment status: the
//! freshly fetched remote snapshot, the persisted override map, and the
//! previous in-memory list. Each order is decided on its own.
//!
//! **Rules** (per order):
//! - override processed, remote processed: remote wins; rewrite the override
//!   if it differs
//! - override processed, remote unfulfilled or silent: override wins
//! - no override, remote reported anything: remote value; persist it if
//!   processed
//! - no override, remote silent, previous list processed: carry forward and
//!   persist
//! - otherwise: unfulfilled

use std::collections::HashMap;
use tracing::debug;

use crate::model::{FulfillmentStatus, Order, ProcessedStatus, RemoteOrder};
use crate::overrides::OverrideMap;

/// Which source decided an order's merged status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    RemoteProcessed,
    LocalOverride,
    RemotePassthrough,
    CarriedForward,
    DefaultUnfulfilled,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReconcileOutcome {
    pub merged: Vec<Order>,
    /// Override entries to persist. Only processed values ever appear here.
    pub override_writes: OverrideMap,
    pub stats: ReconcileStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileStats {
    pub remote_processed: usize,
    pub local_override: usize,
    pub passthrough: usize,
    pub carried_forward: usize,
    pub defaulted: usize,
}

impl ReconcileStats {
    fn count(&mut self, decision: Decision) {
        match decision {
            Decision::RemoteProcessed => self.remote_processed += 1,
            Decision::LocalOverride => self.local_override += 1,
            Decision::RemotePassthrough => self.passthrough += 1,
            Decision::CarriedForward => self.carried_forward += 1,
            Decision::DefaultUnfulfilled => self.defaulted += 1,
        }
    }
}

/// Decide one order's status. Returns the merged status, an optional
/// override write, and which rule applied.
pub fn decide(
    api_status: Option<FulfillmentStatus>,
    local: Option<ProcessedStatus>,
    prior: Option<FulfillmentStatus>,
) -> (FulfillmentStatus, Option<ProcessedStatus>, Decision) {
    let api_processed = api_status.and_then(|s| s.processed());

    if let Some(local) = local {
        return match api_processed {
            Some(remote) => {
                let write = (remote != local).then_some(remote);
                (remote.into(), write, Decision::RemoteProcessed)
            }
            None => (local.into(), None, Decision::LocalOverride),
        };
    }

    if let Some(api) = api_status {
        return (api, api_processed, Decision::RemotePassthrough);
    }

    match prior.and_then(|s| s.processed()) {
        Some(carried) => (carried.into(), Some(carried), Decision::CarriedForward),
        None => (
            FulfillmentStatus::Unfulfilled,
            None,
            Decision::DefaultUnfulfilled,
        ),
    }
}

/// Merge a remote snapshot with the override map and the previous list.
///
/// The merged list follows snapshot order; orders missing from the snapshot
/// are not carried over.
pub fn reconcile(
    snapshot: &[RemoteOrder],
    overrides: &OverrideMap,
    previous: &[Order],
) -> ReconcileOutcome {
    let prior: HashMap<&str, FulfillmentStatus> = previous
        .iter()
        .map(|o| (o.order_number.as_str(), o.fulfillment_status))
        .collect();

    let mut outcome = ReconcileOutcome::default();
    outcome.merged.reserve(snapshot.len());

    for remote in snapshot {
        let id = remote.order.order_number.as_str();
        let (status, write, decision) = decide(
            remote.reported_status,
            overrides.get(id).copied(),
            prior.get(id).copied(),
        );

        if decision != Decision::RemotePassthrough {
            debug!(order_number = id, ?decision, status = %status, "status reconciled");
        }
        if let Some(write) = write {
            outcome.override_writes.insert(id.to_string(), write);
        }
        outcome.stats.count(decision);

        let mut order = remote.order.clone();
        order.fulfillment_status = status;
        outcome.merged.push(order);
    }

    outcome
}
