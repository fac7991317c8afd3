//! Canonical entities handled by the desk.
//!
//! Remote payloads are free-form JSON; everything past the normalizer works
//! on these types only.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::DeskError;

// ---------------------------------------------------------------------------
// Fulfillment status
// ---------------------------------------------------------------------------

/// Fulfillment state of an order. The field under reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FulfillmentStatus {
    #[default]
    Unfulfilled,
    Fulfilled,
    Cancelled,
    Restocked,
}

impl FulfillmentStatus {
    /// Parse a remote status string. Returns `None` for values outside the
    /// known set; callers decide how to treat those.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "unfulfilled" => Some(FulfillmentStatus::Unfulfilled),
            "fulfilled" => Some(FulfillmentStatus::Fulfilled),
            "cancelled" | "canceled" => Some(FulfillmentStatus::Cancelled),
            "restocked" => Some(FulfillmentStatus::Restocked),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentStatus::Unfulfilled => "unfulfilled",
            FulfillmentStatus::Fulfilled => "fulfilled",
            FulfillmentStatus::Cancelled => "cancelled",
            FulfillmentStatus::Restocked => "restocked",
        }
    }

    pub fn processed(&self) -> Option<ProcessedStatus> {
        ProcessedStatus::try_from(*self).ok()
    }

    pub fn is_processed(&self) -> bool {
        self.processed().is_some()
    }
}

impl fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal fulfillment states. The only values the override store accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessedStatus {
    Fulfilled,
    Cancelled,
    Restocked,
}

impl ProcessedStatus {
    pub fn as_str(&self) -> &'static str {
        FulfillmentStatus::from(*self).as_str()
    }
}

impl From<ProcessedStatus> for FulfillmentStatus {
    fn from(status: ProcessedStatus) -> Self {
        match status {
            ProcessedStatus::Fulfilled => FulfillmentStatus::Fulfilled,
            ProcessedStatus::Cancelled => FulfillmentStatus::Cancelled,
            ProcessedStatus::Restocked => FulfillmentStatus::Restocked,
        }
    }
}

impl TryFrom<FulfillmentStatus> for ProcessedStatus {
    type Error = DeskError;

    fn try_from(status: FulfillmentStatus) -> Result<Self, Self::Error> {
        match status {
            FulfillmentStatus::Fulfilled => Ok(ProcessedStatus::Fulfilled),
            FulfillmentStatus::Cancelled => Ok(ProcessedStatus::Cancelled),
            FulfillmentStatus::Restocked => Ok(ProcessedStatus::Restocked),
            FulfillmentStatus::Unfulfilled => Err(DeskError::InvalidInput(
                "unfulfilled is not a processed status".to_string(),
            )),
        }
    }
}

impl fmt::Display for ProcessedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Canonical order record as rendered and cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_number: String,
    pub customer: String,
    pub total_price_display: String,
    pub payment_type: String,
    /// Payment state as reported remotely (paid, pending, cancelled, ...).
    pub payment_status: String,
    pub fulfillment_status: FulfillmentStatus,
    pub created_at_display: String,
}

impl Order {
    /// Selectable for a batch action.
    pub fn is_actionable(&self) -> bool {
        self.fulfillment_status == FulfillmentStatus::Unfulfilled
    }
}

/// One normalized element of a remote snapshot.
///
/// `order.fulfillment_status` carries the documented default; `reported_status`
/// keeps whether the remote actually said anything, which reconciliation needs
/// to tell "remote says unfulfilled" from "remote said nothing".
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteOrder {
    pub order: Order,
    pub reported_status: Option<FulfillmentStatus>,
}

/// Extended order view returned by the details endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    pub order_number: Option<String>,
    pub order_id: Option<String>,
    pub total_price: Option<String>,
    pub product_name: Option<String>,
    pub product_sku: Option<String>,
    pub quantity: i64,
    pub fulfillment_status: FulfillmentStatus,
    pub created_at: Option<String>,
    pub customer_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub pincode: Option<String>,
    /// Untouched remote element, for the raw-data view.
    pub raw: Value,
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub title: String,
    pub product_id: String,
    pub variant_id: String,
    pub sku: String,
    pub price_display: String,
    pub inventory_item_id: String,
    pub inventory_quantity: i64,
    pub vendor: String,
}

/// Partial product update. `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub variant_id: String,
    pub price: Option<f64>,
    pub sku: Option<String>,
    pub inventory: Option<i64>,
}

impl ProductUpdate {
    pub fn is_empty(&self) -> bool {
        self.price.is_none() && self.sku.is_none() && self.inventory.is_none()
    }
}

// ---------------------------------------------------------------------------
// Dashboard metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdersSummary {
    pub total_orders: i64,
    pub total_revenue: f64,
    pub cod_confirmed: i64,
    pub prepaid_orders: i64,
    pub cancelled: i64,
    pub fulfilled_orders: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_accepts_known_spellings() {
        assert_eq!(
            FulfillmentStatus::parse(" Fulfilled "),
            Some(FulfillmentStatus::Fulfilled)
        );
        assert_eq!(
            FulfillmentStatus::parse("canceled"),
            Some(FulfillmentStatus::Cancelled)
        );
        assert_eq!(FulfillmentStatus::parse("partial"), None);
    }

    #[test]
    fn test_processed_conversion_rejects_unfulfilled() {
        assert!(ProcessedStatus::try_from(FulfillmentStatus::Unfulfilled).is_err());
        assert_eq!(
            ProcessedStatus::try_from(FulfillmentStatus::Restocked).unwrap(),
            ProcessedStatus::Restocked
        );
        assert!(FulfillmentStatus::Cancelled.is_processed());
        assert!(!FulfillmentStatus::Unfulfilled.is_processed());
    }

    #[test]
    fn test_order_serializes_camel_case() {
        let order = Order {
            order_number: "1006".into(),
            customer: "Raj V".into(),
            total_price_display: "₹708".into(),
            payment_type: "bogus".into(),
            payment_status: "paid".into(),
            fulfillment_status: FulfillmentStatus::Fulfilled,
            created_at_display: "2025-07-30 23:15:30".into(),
        };
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["orderNumber"], "1006");
        assert_eq!(json["fulfillmentStatus"], "fulfilled");
        let back: Order = serde_json::from_value(json).unwrap();
        assert_eq!(back, order);
    }
}
