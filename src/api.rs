//! Webhook gateway.
//!
//! [`OrderGateway`] is the seam between the desk and the remote workflow
//! endpoints. [`WebhookClient`] is the reqwest implementation; tests swap in
//! scripted fakes.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::{DeskConfig, Endpoints};
use crate::error::{DeskError, MalformedReason};
use crate::filter::DateRange;
use crate::model::ProductUpdate;

/// Remote collaborators consumed by the desk. Every method returns the
/// decoded JSON body (or `Value::Null` where an empty body is acceptable).
#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn list_orders(&self, range: &DateRange) -> Result<Value, DeskError>;
    async fn order_details(&self, order_id: &str) -> Result<Value, DeskError>;
    async fn fulfill_order(&self, order_id: &str) -> Result<Value, DeskError>;
    async fn cancel_order(&self, order_id: &str) -> Result<Value, DeskError>;
    async fn orders_summary(&self, range: &DateRange) -> Result<Value, DeskError>;
    async fn list_products(&self) -> Result<Value, DeskError>;
    async fn update_product(&self, update: &ProductUpdate) -> Result<Value, DeskError>;
}

// ---------------------------------------------------------------------------
// Body handling
// ---------------------------------------------------------------------------

/// How a successful response body is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyPolicy {
    /// JSON content type, non-empty, parseable.
    RequireJson,
    /// Like `RequireJson`, but an empty body decodes to `Value::Null`.
    AllowEmpty,
    /// Status alone decides; the body is not inspected.
    Ignore,
}

/// Decode a 2xx body according to `policy`.
pub fn decode_body(
    content_type: Option<&str>,
    text: &str,
    policy: BodyPolicy,
) -> Result<Value, DeskError> {
    if policy == BodyPolicy::Ignore {
        return Ok(Value::Null);
    }
    if text.trim().is_empty() {
        return match policy {
            BodyPolicy::AllowEmpty => Ok(Value::Null),
            _ => Err(MalformedReason::EmptyBody.into()),
        };
    }
    let is_json = content_type
        .map(|ct| ct.to_ascii_lowercase().contains("application/json"))
        .unwrap_or(false);
    if !is_json {
        return Err(MalformedReason::NonJson.into());
    }
    serde_json::from_str(text).map_err(|e| MalformedReason::Unparsable(e.to_string()).into())
}

/// Pull a human-readable detail out of an error body.
fn error_detail(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(json) = serde_json::from_str::<Value>(trimmed) {
        if let Some(msg) = json
            .get("message")
            .or_else(|| json.get("error"))
            .and_then(Value::as_str)
        {
            return Some(msg.to_string());
        }
    }
    Some(trimmed.chars().take(200).collect())
}

/// Convert a `reqwest::Error` into the desk taxonomy.
fn transport_error(url: &str, err: &reqwest::Error) -> DeskError {
    if err.is_timeout() {
        return DeskError::TransportTimeout;
    }
    if err.is_connect() {
        return DeskError::Network(format!("Cannot reach webhook at {url}"));
    }
    if err.is_builder() {
        return DeskError::Network(format!("Invalid webhook URL: {url}"));
    }
    DeskError::Network(format!("Network error communicating with {url}: {err}"))
}

// ---------------------------------------------------------------------------
// reqwest client
// ---------------------------------------------------------------------------

pub struct WebhookClient {
    client: Client,
    endpoints: Endpoints,
}

impl WebhookClient {
    pub fn new(endpoints: Endpoints, timeout: Duration) -> Result<Self, DeskError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeskError::Config(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, endpoints })
    }

    pub fn from_config(config: &DeskConfig) -> Result<Self, DeskError> {
        Self::new(config.endpoints.clone(), config.timeout())
    }

    async fn send(
        &self,
        url: &str,
        request: RequestBuilder,
        policy: BodyPolicy,
    ) -> Result<Value, DeskError> {
        let start = Instant::now();
        let resp = request
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| transport_error(url, &e))?;

        let status = resp.status();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if !status.is_success() {
            // The status decides; an unreadable error body only loses the detail.
            let text = resp.text().await.unwrap_or_default();
            let latency_ms = start.elapsed().as_millis() as u64;
            warn!(url, status = status.as_u16(), latency_ms, "webhook returned an error status");
            return Err(DeskError::from_status(status.as_u16(), error_detail(&text)));
        }

        let text = resp.text().await.map_err(|e| transport_error(url, &e))?;
        let latency_ms = start.elapsed().as_millis() as u64;
        debug!(url, status = status.as_u16(), latency_ms, bytes = text.len(), "webhook responded");
        decode_body(content_type.as_deref(), &text, policy)
    }
}

#[async_trait]
impl OrderGateway for WebhookClient {
    async fn list_orders(&self, range: &DateRange) -> Result<Value, DeskError> {
        let url = &self.endpoints.orders_list;
        info!(url = %url, start = ?range.start, end = ?range.end, "fetching orders list");
        let req = self.client.get(url).query(&range.query_pairs());
        self.send(url, req, BodyPolicy::RequireJson).await
    }

    async fn order_details(&self, order_id: &str) -> Result<Value, DeskError> {
        let url = &self.endpoints.order_details;
        let req = self.client.post(url).json(&json!({ "orderId": order_id }));
        self.send(url, req, BodyPolicy::RequireJson).await
    }

    async fn fulfill_order(&self, order_id: &str) -> Result<Value, DeskError> {
        let url = &self.endpoints.fulfill_order;
        let req = self.client.post(url).json(&json!({ "order_id": order_id }));
        self.send(url, req, BodyPolicy::Ignore).await
    }

    async fn cancel_order(&self, order_id: &str) -> Result<Value, DeskError> {
        let url = &self.endpoints.cancel_order;
        let req = self.client.post(url).json(&json!({ "order_id": order_id }));
        self.send(url, req, BodyPolicy::RequireJson).await
    }

    async fn orders_summary(&self, range: &DateRange) -> Result<Value, DeskError> {
        let url = &self.endpoints.orders_summary;
        let req = self.client.get(url).query(&range.query_pairs());
        self.send(url, req, BodyPolicy::RequireJson).await
    }

    async fn list_products(&self) -> Result<Value, DeskError> {
        let url = &self.endpoints.products_list;
        let req = self.client.get(url);
        self.send(url, req, BodyPolicy::AllowEmpty).await
    }

    async fn update_product(&self, update: &ProductUpdate) -> Result<Value, DeskError> {
        let url = &self.endpoints.update_product;
        let req = self.client.post(url).json(update);
        self.send(url, req, BodyPolicy::RequireJson).await
    }
}

/// Scripted in-process gateway for tests.
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::Mutex;

    /// Responses are queued per call key. Keys are the method name
    /// (`"fulfill"`, `"cancel"`, `"list_orders"`, ...) or `"<method>:<id>"` for
    /// per-order scripting; the specific key is tried first.
    #[derive(Default)]
    pub(crate) struct ScriptedGateway {
        responses: Mutex<HashMap<String, VecDeque<Result<Value, DeskError>>>>,
        stalled: Mutex<HashSet<String>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedGateway {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn push(&self, key: &str, response: Result<Value, DeskError>) {
            self.responses
                .lock()
                .unwrap()
                .entry(key.to_string())
                .or_default()
                .push_back(response);
        }

        /// Make calls under `key` hang far past any test timeout.
        pub(crate) fn stall(&self, key: &str) {
            self.stalled.lock().unwrap().insert(key.to_string());
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        async fn respond(
            &self,
            method: &str,
            id: Option<&str>,
            default: Result<Value, DeskError>,
        ) -> Result<Value, DeskError> {
            let specific = id.map(|id| format!("{method}:{id}"));
            self.calls
                .lock()
                .unwrap()
                .push(specific.clone().unwrap_or_else(|| method.to_string()));

            let is_stalled = {
                let stalled = self.stalled.lock().unwrap();
                let hit = stalled.contains(method)
                    || specific.as_ref().map(|k| stalled.contains(k)).unwrap_or(false);
                hit
            };
            if is_stalled {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }

            let mut responses = self.responses.lock().unwrap();
            let scripted = specific
                .as_ref()
                .and_then(|k| responses.get_mut(k).and_then(VecDeque::pop_front))
                .or_else(|| responses.get_mut(method).and_then(VecDeque::pop_front));
            scripted.unwrap_or(default)
        }
    }

    fn unscripted() -> Result<Value, DeskError> {
        Err(DeskError::from_status(404, None))
    }

    #[async_trait]
    impl OrderGateway for ScriptedGateway {
        async fn list_orders(&self, _range: &DateRange) -> Result<Value, DeskError> {
            self.respond("list_orders", None, unscripted()).await
        }

        async fn order_details(&self, order_id: &str) -> Result<Value, DeskError> {
            self.respond("order_details", Some(order_id), unscripted()).await
        }

        async fn fulfill_order(&self, order_id: &str) -> Result<Value, DeskError> {
            self.respond("fulfill", Some(order_id), Ok(Value::Null)).await
        }

        async fn cancel_order(&self, order_id: &str) -> Result<Value, DeskError> {
            self.respond(
                "cancel",
                Some(order_id),
                Ok(json!({ "success": true, "message": "Order cancelled" })),
            )
            .await
        }

        async fn orders_summary(&self, _range: &DateRange) -> Result<Value, DeskError> {
            self.respond("summary", None, unscripted()).await
        }

        async fn list_products(&self) -> Result<Value, DeskError> {
            self.respond("list_products", None, unscripted()).await
        }

        async fn update_product(&self, update: &ProductUpdate) -> Result<Value, DeskError> {
            self.respond("update_product", Some(&update.variant_id), Ok(json!({ "success": true })))
                .await
        }
    }
}
