//! Remote payload normalization.
//!
//! Webhook bodies come in several shapes (bare array, `{orders: [...]}`,
//! `{data: [...]}`, a single object) and use both camelCase and snake_case
//! field names. This module validates the envelope strictly and maps each
//! element onto the canonical types in [`crate::model`].

use chrono::{DateTime, Local, Utc};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::error::{DeskError, MalformedReason};
use crate::model::{
    FulfillmentStatus, Order, OrderDetails, OrdersSummary, Product, RemoteOrder,
};

const CURRENCY_SYMBOL: &str = "₹";
const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const ORDER_ID_KEYS: &[&str] = &["orderNumber", "order_number", "order_id", "orderId"];
const PRODUCT_ID_KEYS: &[&str] = &["variantId", "variant_id", "productId", "product_id", "title"];

/// Records that survived normalization, plus how many were dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub records: Vec<T>,
    pub dropped: usize,
}

impl<T> Default for Normalized<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            dropped: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

/// First non-empty string (or number, rendered) found under any of `keys`.
pub(crate) fn scalar_any(v: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match v.get(*key) {
            Some(Value::String(s)) => {
                let trimmed = s.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

pub(crate) fn str_any(v: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(s) = v.get(*key).and_then(Value::as_str) {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

pub(crate) fn num_any(v: &Value, keys: &[&str]) -> Option<f64> {
    for key in keys {
        match v.get(*key) {
            Some(Value::Number(n)) => {
                if let Some(f) = n.as_f64() {
                    return Some(f);
                }
            }
            Some(Value::String(s)) => {
                if let Ok(f) = s.trim().parse::<f64>() {
                    return Some(f);
                }
            }
            _ => {}
        }
    }
    None
}

pub(crate) fn i64_any(v: &Value, keys: &[&str]) -> Option<i64> {
    num_any(v, keys).map(|f| f as i64)
}

pub(crate) fn bool_any(v: &Value, keys: &[&str]) -> Option<bool> {
    for key in keys {
        let value = match v.get(*key) {
            Some(value) => value,
            None => continue,
        };

        if let Some(flag) = value.as_bool() {
            return Some(flag);
        }
        if let Some(flag) = value.as_i64() {
            return Some(flag == 1);
        }
        if let Some(flag) = value.as_str() {
            let normalized = flag.trim().to_ascii_lowercase();
            if matches!(normalized.as_str(), "true" | "1" | "yes" | "ok") {
                return Some(true);
            }
            if matches!(normalized.as_str(), "false" | "0" | "no") {
                return Some(false);
            }
        }
    }
    None
}

/// Render a numeric amount the way remote prices are displayed.
pub(crate) fn amount_display(amount: f64) -> String {
    format!("{CURRENCY_SYMBOL}{amount:.2}")
}

fn price_display(v: &Value, keys: &[&str], default: &str) -> String {
    scalar_any(v, keys)
        .map(|amount| format!("{CURRENCY_SYMBOL}{amount}"))
        .unwrap_or_else(|| format!("{CURRENCY_SYMBOL}{default}"))
}

/// Render a remote timestamp for display. Unparsable values are shown as-is;
/// a missing value falls back to the current time.
fn created_at_display(raw: Option<String>) -> String {
    match raw {
        Some(raw) => match DateTime::parse_from_rfc3339(&raw) {
            Ok(ts) => ts.format(CREATED_AT_FORMAT).to_string(),
            Err(_) => raw,
        },
        None => Utc::now()
            .with_timezone(&Local)
            .format(CREATED_AT_FORMAT)
            .to_string(),
    }
}

// ---------------------------------------------------------------------------
// Envelope validation
// ---------------------------------------------------------------------------

fn has_any_key(obj: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter().any(|k| obj.get(*k).map(|v| !v.is_null()).unwrap_or(false))
}

/// Locate the record array inside a response body.
///
/// Accepted shapes, in order: a bare array; `{<collection_key>: [...]}`;
/// `{data: [...]}`; a single object carrying one of `id_keys`; an object with
/// exactly one array-valued property. Anything else, including an object with
/// several candidate arrays, is a schema mismatch.
pub fn extract_records(
    body: &Value,
    collection_key: &str,
    id_keys: &[&str],
) -> Result<Vec<Value>, DeskError> {
    let obj = match body {
        Value::Array(items) => return Ok(items.clone()),
        Value::Object(obj) => obj,
        other => {
            return Err(MalformedReason::SchemaMismatch(format!(
                "expected an array or object, got {}",
                json_type_name(other)
            ))
            .into())
        }
    };

    for key in [collection_key, "data"] {
        if let Some(Value::Array(items)) = obj.get(key) {
            return Ok(items.clone());
        }
    }

    if has_any_key(obj, id_keys) {
        return Ok(vec![body.clone()]);
    }

    let arrays: Vec<(&String, &Vec<Value>)> = obj
        .iter()
        .filter_map(|(k, v)| v.as_array().map(|arr| (k, arr)))
        .collect();
    match arrays.as_slice() {
        [(key, items)] => {
            debug!(key = %key, "records found under the only array-valued property");
            Ok((*items).clone())
        }
        [] => Err(MalformedReason::SchemaMismatch(format!(
            "no '{collection_key}' array and no record identifier"
        ))
        .into()),
        many => {
            let keys: Vec<&str> = many.iter().map(|(k, _)| k.as_str()).collect();
            Err(MalformedReason::SchemaMismatch(format!(
                "ambiguous record arrays: {}",
                keys.join(", ")
            ))
            .into())
        }
    }
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Map one remote order element onto the canonical record.
pub fn normalize_order(raw: &Value) -> Result<RemoteOrder, DeskError> {
    if !raw.is_object() {
        return Err(DeskError::MalformedRecord(format!(
            "order element is a {}",
            json_type_name(raw)
        )));
    }
    let order_number = scalar_any(raw, ORDER_ID_KEYS)
        .ok_or_else(|| DeskError::MalformedRecord("orderNumber".to_string()))?;

    let reported_status = str_any(raw, &["fulfillmentStatus", "fulfillment_status"]).map(|s| {
        FulfillmentStatus::parse(&s).unwrap_or_else(|| {
            debug!(order_number = %order_number, status = %s, "unknown fulfillment status, treating as unfulfilled");
            FulfillmentStatus::Unfulfilled
        })
    });

    let order = Order {
        customer: str_any(raw, &["customerName", "customer_name", "customer"])
            .unwrap_or_else(|| "Unknown Customer".to_string()),
        total_price_display: price_display(raw, &["totalPrice", "total_price"], "0"),
        payment_type: str_any(raw, &["paymentType", "payment_type"])
            .unwrap_or_else(|| "unknown".to_string()),
        payment_status: str_any(raw, &["status", "paymentStatus", "payment_status"])
            .unwrap_or_else(|| "pending".to_string()),
        fulfillment_status: reported_status.unwrap_or_default(),
        created_at_display: created_at_display(str_any(raw, &["createdAt", "created_at"])),
        order_number,
    };

    Ok(RemoteOrder {
        order,
        reported_status,
    })
}

/// Normalize an orders-list response into a snapshot.
///
/// Elements without an identifier are dropped and counted; so are repeated
/// order numbers after the first occurrence.
pub fn normalize_order_snapshot(body: &Value) -> Result<Normalized<RemoteOrder>, DeskError> {
    let elements = extract_records(body, "orders", ORDER_ID_KEYS)?;
    let mut out = Normalized::default();
    let mut seen = HashSet::new();

    for element in &elements {
        match normalize_order(element) {
            Ok(remote) => {
                if seen.insert(remote.order.order_number.clone()) {
                    out.records.push(remote);
                } else {
                    warn!(order_number = %remote.order.order_number, "duplicate order in snapshot, keeping first");
                    out.dropped += 1;
                }
            }
            Err(e) => {
                debug!(error = %e, "dropping malformed order record");
                out.dropped += 1;
            }
        }
    }

    if out.dropped > 0 {
        warn!(
            dropped = out.dropped,
            kept = out.records.len(),
            "order snapshot contained unusable records"
        );
    }
    Ok(out)
}

/// Normalize an order-details response. The endpoint returns either one
/// object or an array of line-level objects.
pub fn normalize_order_details(body: &Value) -> Result<Vec<OrderDetails>, DeskError> {
    let elements = match body {
        Value::Object(obj) if !has_any_key(obj, ORDER_ID_KEYS) => {
            match ["orders", "data"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(Value::as_array))
            {
                Some(items) => items.clone(),
                None => vec![body.clone()],
            }
        }
        _ => extract_records(body, "orders", ORDER_ID_KEYS)?,
    };

    Ok(elements
        .iter()
        .filter(|e| e.is_object())
        .map(|raw| OrderDetails {
            order_number: scalar_any(raw, &["order_number", "orderNumber"]),
            order_id: scalar_any(raw, &["order_id", "orderId"]),
            total_price: scalar_any(raw, &["total_price", "totalPrice"]),
            product_name: str_any(raw, &["product_name", "productName"]),
            product_sku: str_any(raw, &["product_sku", "productSku", "sku"]),
            quantity: i64_any(raw, &["quantity"]).unwrap_or(1),
            fulfillment_status: str_any(raw, &["fulfillment_status", "fulfillmentStatus"])
                .and_then(|s| FulfillmentStatus::parse(&s))
                .unwrap_or_default(),
            created_at: str_any(raw, &["created_at", "createdAt"])
                .map(|s| created_at_display(Some(s))),
            customer_name: str_any(raw, &["customer_name", "customerName"]),
            email: str_any(raw, &["contact_email", "customerEmail", "customer_email"]),
            phone: scalar_any(raw, &["customer_phone", "customerPhone"]),
            address: str_any(raw, &["customer_address", "customerAddress"]),
            city: str_any(raw, &["city"]),
            pincode: scalar_any(raw, &["pincode", "zip"]),
            raw: raw.clone(),
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

pub fn normalize_product(raw: &Value) -> Result<Product, DeskError> {
    let obj = raw.as_object().ok_or_else(|| {
        DeskError::MalformedRecord(format!("product element is a {}", json_type_name(raw)))
    })?;
    if !has_any_key(obj, PRODUCT_ID_KEYS) {
        return Err(DeskError::MalformedRecord(
            "variantId/productId/title".to_string(),
        ));
    }

    let na = || "N/A".to_string();
    Ok(Product {
        title: str_any(raw, &["title"]).unwrap_or_else(|| "Unknown Product".to_string()),
        product_id: scalar_any(raw, &["productId", "product_id"]).unwrap_or_else(na),
        variant_id: scalar_any(raw, &["variantId", "variant_id"]).unwrap_or_else(na),
        sku: str_any(raw, &["sku"]).unwrap_or_else(na),
        price_display: price_display(raw, &["price"], "0.00"),
        inventory_item_id: scalar_any(raw, &["inventoryItemId", "inventory_item_id"])
            .unwrap_or_else(na),
        inventory_quantity: i64_any(raw, &["inventoryQuantity", "inventory_quantity"])
            .unwrap_or(0),
        vendor: str_any(raw, &["vendor"]).unwrap_or_else(|| "Unknown Vendor".to_string()),
    })
}

pub fn normalize_product_list(body: &Value) -> Result<Normalized<Product>, DeskError> {
    let elements = extract_records(body, "products", PRODUCT_ID_KEYS)?;
    let mut out = Normalized::default();
    for element in &elements {
        match normalize_product(element) {
            Ok(product) => out.records.push(product),
            Err(e) => {
                debug!(error = %e, "dropping malformed product record");
                out.dropped += 1;
            }
        }
    }
    if out.dropped > 0 {
        warn!(dropped = out.dropped, "product list contained unusable records");
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

pub fn normalize_summary(body: &Value) -> Result<OrdersSummary, DeskError> {
    if !body.is_object() {
        return Err(MalformedReason::SchemaMismatch(format!(
            "summary must be an object, got {}",
            json_type_name(body)
        ))
        .into());
    }
    Ok(OrdersSummary {
        total_orders: i64_any(body, &["totalOrders", "total_orders"]).unwrap_or(0),
        total_revenue: num_any(body, &["totalRevenue", "total_revenue"]).unwrap_or(0.0),
        cod_confirmed: i64_any(body, &["codConfirmed", "cod_confirmed"]).unwrap_or(0),
        prepaid_orders: i64_any(body, &["prepaidOrders", "prepaid_orders"]).unwrap_or(0),
        cancelled: i64_any(body, &["cancelled"]).unwrap_or(0),
        fulfilled_orders: i64_any(body, &["fulfilledOrders", "fulfilled_orders"]).unwrap_or(0),
    })
}
