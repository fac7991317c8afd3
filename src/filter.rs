//! View filters: the on-screen order filter and the persisted date range
//! applied to remote fetches.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::DeskError;
use crate::model::Order;
use crate::storage::{self, KvStore, KEY_DATE_RANGE};

// ---------------------------------------------------------------------------
// Order filter
// ---------------------------------------------------------------------------

/// Search text plus an optional payment-status match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub search: String,
    /// `None` means all statuses.
    pub payment_status: Option<String>,
}

impl OrderFilter {
    pub fn new(search: impl Into<String>, payment_status: Option<String>) -> Self {
        Self {
            search: search.into(),
            payment_status: payment_status
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("all")),
        }
    }

    /// Case-insensitive customer substring or order-number substring, and a
    /// case-insensitive payment status match.
    pub fn matches(&self, order: &Order) -> bool {
        let term = self.search.trim().to_lowercase();
        let matches_search = term.is_empty()
            || order.customer.to_lowercase().contains(&term)
            || order.order_number.to_lowercase().contains(&term);
        let matches_status = match &self.payment_status {
            Some(status) => order.payment_status.eq_ignore_ascii_case(status),
            None => true,
        };
        matches_search && matches_status
    }

    pub fn apply<'a>(&'a self, orders: &'a [Order]) -> impl Iterator<Item = &'a Order> + 'a {
        orders.iter().filter(move |o| self.matches(o))
    }
}

// ---------------------------------------------------------------------------
// Date range
// ---------------------------------------------------------------------------

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Optional inclusive date bounds, sent as `startDate` / `endDate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self, DeskError> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(DeskError::InvalidInput(format!(
                    "start date {s} is after end date {e}"
                )));
            }
        }
        Ok(Self { start, end })
    }

    /// Parse `YYYY-MM-DD` bounds; blank strings mean unbounded.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, DeskError> {
        fn parse_one(raw: Option<&str>) -> Result<Option<NaiveDate>, DeskError> {
            match raw.map(str::trim).filter(|s| !s.is_empty()) {
                Some(s) => NaiveDate::parse_from_str(s, DATE_FORMAT)
                    .map(Some)
                    .map_err(|e| DeskError::InvalidInput(format!("invalid date '{s}': {e}"))),
                None => Ok(None),
            }
        }
        Self::new(parse_one(start)?, parse_one(end)?)
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(start) = self.start {
            pairs.push(("startDate", start.format(DATE_FORMAT).to_string()));
        }
        if let Some(end) = self.end {
            pairs.push(("endDate", end.format(DATE_FORMAT).to_string()));
        }
        pairs
    }

    /// Load the persisted range. An unreadable or inverted range reads as
    /// unbounded.
    pub fn load(store: &dyn KvStore) -> Result<Self, DeskError> {
        let stored: Option<Self> = storage::read_json_or_default(store, KEY_DATE_RANGE)?;
        Ok(match stored {
            Some(range) => Self::new(range.start, range.end).unwrap_or_else(|e| {
                warn!(error = %e, "ignoring invalid stored date range");
                Self::default()
            }),
            None => Self::default(),
        })
    }

    /// Persist the range. An unbounded range removes the key.
    pub fn save(&self, store: &dyn KvStore) -> Result<(), DeskError> {
        if self.is_unbounded() {
            store.delete(KEY_DATE_RANGE)
        } else {
            storage::write_json(store, KEY_DATE_RANGE, self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FulfillmentStatus;
    use crate::storage::MemoryStore;

    fn order(n: &str, customer: &str, payment_status: &str) -> Order {
        Order {
            order_number: n.into(),
            customer: customer.into(),
            total_price_display: "₹1".into(),
            payment_type: "cod".into(),
            payment_status: payment_status.into(),
            fulfillment_status: FulfillmentStatus::Unfulfilled,
            created_at_display: String::new(),
        }
    }

    #[test]
    fn test_filter_search_and_status() {
        let orders = vec![
            order("1006", "Raj V", "paid"),
            order("1007", "Meera", "pending"),
            order("2001", "Rajesh", "Pending"),
        ];

        let raj = OrderFilter::new("raj", None);
        assert_eq!(raj.apply(&orders).count(), 2);

        let by_number = OrderFilter::new("100", None);
        assert_eq!(by_number.apply(&orders).count(), 2);

        let pending = OrderFilter::new("", Some("PENDING".into()));
        let ids: Vec<&str> = pending
            .apply(&orders)
            .map(|o| o.order_number.as_str())
            .collect();
        assert_eq!(ids, vec!["1007", "2001"]);

        let all = OrderFilter::new("  ", Some("All".into()));
        assert_eq!(all.payment_status, None);
        assert_eq!(all.apply(&orders).count(), 3);
    }

    #[test]
    fn test_date_range_validation_and_query() {
        let range = DateRange::parse(Some("2025-07-01"), Some("2025-07-30")).unwrap();
        assert_eq!(
            range.query_pairs(),
            vec![
                ("startDate", "2025-07-01".to_string()),
                ("endDate", "2025-07-30".to_string())
            ]
        );
        assert!(DateRange::parse(Some("2025-08-01"), Some("2025-07-01")).is_err());
        assert!(DateRange::parse(Some("07/01/2025"), None).is_err());
        assert!(DateRange::parse(Some(""), None).unwrap().is_unbounded());
    }

    #[test]
    fn test_date_range_persistence() {
        let store = MemoryStore::new();
        assert!(DateRange::load(&store).unwrap().is_unbounded());

        let range = DateRange::parse(Some("2025-07-01"), None).unwrap();
        range.save(&store).unwrap();
        assert_eq!(DateRange::load(&store).unwrap(), range);

        DateRange::default().save(&store).unwrap();
        assert_eq!(store.get(KEY_DATE_RANGE).unwrap(), None);
    }

    #[test]
    fn test_inverted_stored_range_reads_as_unbounded() {
        let store = MemoryStore::new();
        store
            .set(KEY_DATE_RANGE, r#"{"start":"2025-08-01","end":"2025-07-01"}"#)
            .unwrap();
        assert!(DateRange::load(&store).unwrap().is_unbounded());
    }
}
