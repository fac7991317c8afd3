//! Dashboard metrics.
//!
//! The orders summary is fetched for the active date range and cached with
//! its fetch time, so a failed refresh (or a cold start) still shows the last
//! known figures.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::OrderGateway;
use crate::cache::FetchOutcome;
use crate::error::DeskError;
use crate::filter::DateRange;
use crate::model::OrdersSummary;
use crate::normalize::normalize_summary;
use crate::storage::{self, KvStore, KEY_SUMMARY_DATA, KEY_SUMMARY_FETCHED_AT};

#[derive(Debug, Clone, PartialEq)]
pub struct SummarySnapshot {
    pub summary: OrdersSummary,
    pub fetched_at: DateTime<Utc>,
}

pub struct MetricsBoard {
    store: Arc<dyn KvStore>,
    current: Option<SummarySnapshot>,
}

impl MetricsBoard {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            current: None,
        }
    }

    pub fn current(&self) -> Option<&SummarySnapshot> {
        self.current.as_ref()
    }

    /// Load the cached summary. A summary without a readable timestamp is
    /// discarded.
    pub fn restore(&mut self) -> Result<(), DeskError> {
        let summary: Option<OrdersSummary> =
            storage::read_json_or_default(self.store.as_ref(), KEY_SUMMARY_DATA)?;
        let fetched_at = self
            .store
            .get(KEY_SUMMARY_FETCHED_AT)?
            .and_then(|raw| DateTime::parse_from_rfc3339(raw.trim()).ok())
            .map(|ts| ts.with_timezone(&Utc));

        self.current = match (summary, fetched_at) {
            (Some(summary), Some(fetched_at)) => Some(SummarySnapshot {
                summary,
                fetched_at,
            }),
            (Some(_), None) => {
                warn!("cached summary has no fetch time, discarding");
                self.store.delete(KEY_SUMMARY_DATA)?;
                None
            }
            _ => None,
        };
        Ok(())
    }

    fn commit(&mut self, summary: OrdersSummary) -> Result<(), DeskError> {
        let fetched_at = Utc::now();
        storage::write_json(self.store.as_ref(), KEY_SUMMARY_DATA, &summary)?;
        self.store
            .set(KEY_SUMMARY_FETCHED_AT, &fetched_at.to_rfc3339())?;
        self.current = Some(SummarySnapshot {
            summary,
            fetched_at,
        });
        Ok(())
    }

    pub async fn refresh(
        &mut self,
        gateway: &dyn OrderGateway,
        range: &DateRange,
    ) -> Result<FetchOutcome<OrdersSummary>, DeskError> {
        let fetched = match gateway.orders_summary(range).await {
            Ok(body) => normalize_summary(&body),
            Err(e) => Err(e),
        };

        match fetched {
            Ok(summary) => {
                self.commit(summary.clone())?;
                info!(
                    total_orders = summary.total_orders,
                    total_revenue = summary.total_revenue,
                    "orders summary refreshed"
                );
                Ok(FetchOutcome::Live(summary))
            }
            Err(error) => {
                warn!(kind = error.kind(), error = %error, "summary fetch failed, keeping cached figures");
                if self.current.is_none() {
                    self.restore()?;
                }
                Ok(FetchOutcome::Cached {
                    error,
                    records: usize::from(self.current.is_some()),
                })
            }
        }
    }
}
