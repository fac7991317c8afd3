//! Desk configuration.
//!
//! Resolution order: built-in defaults, then `config.json` in the data
//! directory (if present), then environment variables. The data directory
//! itself comes from `SHOPLYTIC_DATA_DIR` or the platform data dir.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::DeskError;

const APP_DIR_NAME: &str = "app.shoplytic.desk";
const CONFIG_FILE: &str = "config.json";

/// Default per-request timeout (seconds).
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

const DEFAULT_ORDERS_BASE: &str = "https://n8n.food-u.live/webhook";
const DEFAULT_PRODUCTS_BASE: &str = "https://n8n1.food-u.live/webhook";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What happens to the selection once a batch action finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionAfterBatch {
    /// Drop every selected id, including the ones that failed.
    #[default]
    ClearAll,
    /// Keep failed ids selected so the operator can retry them directly.
    RetainFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Endpoints {
    pub orders_list: String,
    pub order_details: String,
    pub fulfill_order: String,
    pub cancel_order: String,
    pub orders_summary: String,
    pub products_list: String,
    pub update_product: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            orders_list: format!("{DEFAULT_ORDERS_BASE}/get-orders-list"),
            order_details: format!("{DEFAULT_ORDERS_BASE}/get-order-details"),
            fulfill_order: format!("{DEFAULT_ORDERS_BASE}/fulfill-order"),
            cancel_order: format!("{DEFAULT_ORDERS_BASE}/cancel-order"),
            orders_summary: format!("{DEFAULT_ORDERS_BASE}/get-orders-summary"),
            products_list: format!("{DEFAULT_PRODUCTS_BASE}/get-all-products"),
            update_product: format!("{DEFAULT_PRODUCTS_BASE}/update-product-info"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeskConfig {
    pub data_dir: PathBuf,
    pub endpoints: Endpoints,
    pub timeout_secs: u64,
    pub selection_after_batch: SelectionAfterBatch,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            endpoints: Endpoints::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            selection_after_batch: SelectionAfterBatch::default(),
        }
    }
}

impl DeskConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("desk.db")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    fn validate(mut self) -> Result<Self, DeskError> {
        if self.timeout_secs == 0 {
            return Err(DeskError::Config("timeout must be at least 1 second".into()));
        }
        let e = &mut self.endpoints;
        for url in [
            &mut e.orders_list,
            &mut e.order_details,
            &mut e.fulfill_order,
            &mut e.cancel_order,
            &mut e.orders_summary,
            &mut e.products_list,
            &mut e.update_product,
        ] {
            if url.trim().is_empty() {
                return Err(DeskError::Config("endpoint URL must not be empty".into()));
            }
            *url = normalize_endpoint_url(url);
        }
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Platform data directory for the desk.
pub fn default_data_dir() -> PathBuf {
    let base = std::env::var("LOCALAPPDATA")
        .or_else(|_| std::env::var("XDG_DATA_HOME"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()))
                .join(".local")
                .join("share")
        });
    base.join(APP_DIR_NAME)
}

/// Normalise an endpoint URL:
/// - trim whitespace
/// - ensure a scheme is present (https, or http for localhost)
/// - strip trailing slashes
pub fn normalize_endpoint_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    while url.ends_with('/') {
        url.pop();
    }

    url
}

fn read_config_file(path: &Path) -> Result<Option<DeskConfig>, DeskError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| DeskError::Config(format!("read {}: {e}", path.display())))?;
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| DeskError::Config(format!("parse {}: {e}", path.display())))
}

fn env_override(target: &mut String, var: &str) {
    if let Ok(value) = std::env::var(var) {
        if !value.trim().is_empty() {
            *target = value;
        }
    }
}

/// Load configuration using the default data directory (or
/// `SHOPLYTIC_DATA_DIR`).
pub fn load() -> Result<DeskConfig, DeskError> {
    let data_dir = std::env::var("SHOPLYTIC_DATA_DIR")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(default_data_dir);
    load_from(&data_dir)
}

/// Load configuration rooted at `data_dir`.
pub fn load_from(data_dir: &Path) -> Result<DeskConfig, DeskError> {
    let file_path = data_dir.join(CONFIG_FILE);
    let mut config = match read_config_file(&file_path)? {
        Some(cfg) => {
            info!(path = %file_path.display(), "loaded desk config file");
            cfg
        }
        None => DeskConfig::default(),
    };
    config.data_dir = data_dir.to_path_buf();

    if let Ok(raw) = std::env::var("SHOPLYTIC_TIMEOUT_SECS") {
        match raw.trim().parse::<u64>() {
            Ok(secs) => config.timeout_secs = secs,
            Err(_) => warn!(value = %raw, "ignoring invalid SHOPLYTIC_TIMEOUT_SECS"),
        }
    }

    let e = &mut config.endpoints;
    env_override(&mut e.orders_list, "SHOPLYTIC_ORDERS_LIST_URL");
    env_override(&mut e.order_details, "SHOPLYTIC_ORDER_DETAILS_URL");
    env_override(&mut e.fulfill_order, "SHOPLYTIC_FULFILL_ORDER_URL");
    env_override(&mut e.cancel_order, "SHOPLYTIC_CANCEL_ORDER_URL");
    env_override(&mut e.orders_summary, "SHOPLYTIC_ORDERS_SUMMARY_URL");
    env_override(&mut e.products_list, "SHOPLYTIC_PRODUCTS_LIST_URL");
    env_override(&mut e.update_product, "SHOPLYTIC_UPDATE_PRODUCT_URL");

    config.validate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_normalize_endpoint_url() {
        assert_eq!(
            normalize_endpoint_url(" hooks.example.com/webhook/get-orders-list/ "),
            "https://hooks.example.com/webhook/get-orders-list"
        );
        assert_eq!(
            normalize_endpoint_url("localhost:5678/webhook/x"),
            "http://localhost:5678/webhook/x"
        );
        assert_eq!(
            normalize_endpoint_url("http://10.0.0.2/a//"),
            "http://10.0.0.2/a"
        );
    }

    #[test]
    #[serial]
    fn test_load_defaults_when_no_file() {
        let dir = tempfile::tempdir().unwrap();
        std::env::remove_var("SHOPLYTIC_TIMEOUT_SECS");
        std::env::remove_var("SHOPLYTIC_CANCEL_ORDER_URL");

        let cfg = load_from(dir.path()).unwrap();
        assert_eq!(cfg.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(cfg.data_dir, dir.path());
        assert!(cfg.endpoints.fulfill_order.ends_with("/fulfill-order"));
        assert_eq!(cfg.selection_after_batch, SelectionAfterBatch::ClearAll);
    }

    #[test]
    #[serial]
    fn test_file_then_env_precedence() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{
                "timeoutSecs": 4,
                "selectionAfterBatch": "retain_failed",
                "endpoints": { "cancelOrder": "localhost:5678/webhook/cancel/" }
            }"#,
        )
        .unwrap();

        std::env::set_var("SHOPLYTIC_TIMEOUT_SECS", "7");
        let cfg = load_from(dir.path()).unwrap();
        std::env::remove_var("SHOPLYTIC_TIMEOUT_SECS");

        assert_eq!(cfg.timeout_secs, 7);
        assert_eq!(cfg.selection_after_batch, SelectionAfterBatch::RetainFailed);
        assert_eq!(
            cfg.endpoints.cancel_order,
            "http://localhost:5678/webhook/cancel"
        );
        // Untouched endpoints keep their defaults.
        assert!(cfg.endpoints.orders_list.ends_with("/get-orders-list"));
    }

    #[test]
    #[serial]
    fn test_invalid_config_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "{ not json").unwrap();
        let err = load_from(dir.path()).unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    #[serial]
    fn test_zero_timeout_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("SHOPLYTIC_TIMEOUT_SECS", "0");
        let result = load_from(dir.path());
        std::env::remove_var("SHOPLYTIC_TIMEOUT_SECS");
        assert!(result.is_err());
    }
}
