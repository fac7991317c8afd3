//! Batch action executor.
//!
//! Issues one remote mutation per order, strictly in sequence, and commits
//! each confirmed success into the ledger before moving on. A failed item
//! leaves its order untouched and never stops the rest of the batch.

use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::api::OrderGateway;
use crate::error::DeskError;
use crate::ledger::OrderLedger;
use crate::model::ProcessedStatus;
use crate::normalize::{bool_any, str_any};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchAction {
    Fulfill,
    Cancel,
}

impl BatchAction {
    /// Status an order moves to once the remote confirms the action.
    pub fn target(&self) -> ProcessedStatus {
        match self {
            BatchAction::Fulfill => ProcessedStatus::Fulfilled,
            BatchAction::Cancel => ProcessedStatus::Cancelled,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BatchAction::Fulfill => "fulfill",
            BatchAction::Cancel => "cancel",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Success,
    Failure(DeskError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItemResult {
    pub order_number: String,
    pub outcome: ItemOutcome,
}

impl BatchItemResult {
    pub fn is_success(&self) -> bool {
        self.outcome == ItemOutcome::Success
    }
}

/// Per-item results in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub action: BatchAction,
    pub items: Vec<BatchItemResult>,
}

impl BatchSummary {
    pub fn success_count(&self) -> usize {
        self.items.iter().filter(|i| i.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.items.len() - self.success_count()
    }

    pub fn failures(&self) -> Vec<(&str, &DeskError)> {
        self.items
            .iter()
            .filter_map(|i| match &i.outcome {
                ItemOutcome::Failure(err) => Some((i.order_number.as_str(), err)),
                ItemOutcome::Success => None,
            })
            .collect()
    }

    pub fn failed_ids(&self) -> Vec<String> {
        self.failures()
            .into_iter()
            .map(|(id, _)| id.to_string())
            .collect()
    }

    /// Dashboard metrics are stale once anything changed remotely.
    pub fn should_refresh_metrics(&self) -> bool {
        self.success_count() > 0
    }
}

/// Decide whether a cancel response confirms the cancellation. Only an
/// explicit truthy `success` flag does.
pub fn interpret_cancel(body: &Value) -> Result<(), DeskError> {
    // Workflow responses sometimes arrive wrapped in a one-element array.
    let body = match body {
        Value::Array(items) => items.first().unwrap_or(&Value::Null),
        other => other,
    };
    if bool_any(body, &["success"]) == Some(true) {
        return Ok(());
    }
    let message = str_any(body, &["message", "error"])
        .unwrap_or_else(|| "Cancellation was not confirmed by the server".to_string());
    Err(DeskError::LogicalFailure(message))
}

pub struct BatchExecutor {
    gateway: Arc<dyn OrderGateway>,
    timeout: Duration,
}

impl BatchExecutor {
    pub fn new(gateway: Arc<dyn OrderGateway>, timeout: Duration) -> Self {
        Self { gateway, timeout }
    }

    async fn submit(&self, action: BatchAction, order_number: &str) -> Result<(), DeskError> {
        let call = async {
            match action {
                BatchAction::Fulfill => self.gateway.fulfill_order(order_number).await.map(|_| ()),
                BatchAction::Cancel => {
                    let body = self.gateway.cancel_order(order_number).await?;
                    interpret_cancel(&body)
                }
            }
        };
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| DeskError::TransportTimeout)?
    }

    /// Run `action` for each id in order. Every success is committed to
    /// `ledger` (list, override, cache) before the next id is submitted.
    pub async fn execute(
        &self,
        action: BatchAction,
        ids: &[String],
        ledger: &mut OrderLedger,
    ) -> BatchSummary {
        let target = action.target();
        let started = Instant::now();
        info!(action = action.as_str(), count = ids.len(), "batch started");

        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            let outcome = match self.submit(action, id).await {
                Ok(()) => {
                    if let Err(e) = ledger.commit_transition(id, target) {
                        // The remote change stands; only the local record is missing.
                        error!(order_number = %id, error = %e, "failed to record confirmed action");
                    }
                    info!(order_number = %id, action = action.as_str(), status = %target, "order updated");
                    ItemOutcome::Success
                }
                Err(e) => {
                    warn!(order_number = %id, action = action.as_str(), kind = e.kind(), error = %e, "order action failed");
                    ItemOutcome::Failure(e)
                }
            };
            items.push(BatchItemResult {
                order_number: id.clone(),
                outcome,
            });
        }

        let summary = BatchSummary { action, items };
        info!(
            action = action.as_str(),
            succeeded = summary.success_count(),
            failed = summary.failure_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch finished"
        );
        summary
    }
}
