//! Error taxonomy shared by every layer of the desk.
//!
//! Each variant renders a user-facing message. `MalformedRecord` and
//! `CorruptedCache` are recovered locally by their callers; the remaining
//! kinds surface to the operator (or, during a batch, get attached to the
//! failing order's outcome).

use thiserror::Error;

/// Why a remote body could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedReason {
    #[error("API returned non-JSON response - check webhook content-type header")]
    NonJson,
    #[error("API returned empty response - webhook may not be configured")]
    EmptyBody,
    #[error("API returned invalid data format: {0}")]
    Unparsable(String),
    #[error("API response did not match the expected shape: {0}")]
    SchemaMismatch(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeskError {
    #[error("Request timed out")]
    TransportTimeout,
    #[error("{message} (HTTP {status})")]
    TransportError { status: u16, message: String },
    #[error("{0}")]
    Network(String),
    #[error(transparent)]
    MalformedResponse(#[from] MalformedReason),
    #[error("Record is missing an identifier field ({0})")]
    MalformedRecord(String),
    #[error("Remote rejected the request: {0}")]
    LogicalFailure(String),
    #[error("Local cache entry '{0}' is unreadable")]
    CorruptedCache(String),
    #[error("Local storage error: {0}")]
    Storage(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("{0}")]
    InvalidInput(String),
}

impl DeskError {
    /// Short machine-friendly tag, used in structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            DeskError::TransportTimeout => "transport_timeout",
            DeskError::TransportError { .. } | DeskError::Network(_) => "transport_error",
            DeskError::MalformedResponse(_) => "malformed_response",
            DeskError::MalformedRecord(_) => "malformed_record",
            DeskError::LogicalFailure(_) => "logical_failure",
            DeskError::CorruptedCache(_) => "corrupted_cache",
            DeskError::Storage(_) => "storage",
            DeskError::Config(_) => "config",
            DeskError::InvalidInput(_) => "invalid_input",
        }
    }

    /// Build a transport error from an HTTP status, with friendly text for
    /// the statuses an operator is likely to hit.
    pub fn from_status(status: u16, detail: Option<String>) -> Self {
        let message = match status {
            401 => "Webhook rejected the credentials".to_string(),
            403 => "Webhook access forbidden".to_string(),
            404 => {
                "Webhook not available - activate the workflow that serves this endpoint"
                    .to_string()
            }
            s if s >= 500 => "Webhook server error".to_string(),
            _ => "Unexpected response from webhook".to_string(),
        };
        let message = match detail {
            Some(detail) if !detail.trim().is_empty() => format!("{message}: {}", detail.trim()),
            _ => message,
        };
        DeskError::TransportError { status, message }
    }
}

impl From<rusqlite::Error> for DeskError {
    fn from(err: rusqlite::Error) -> Self {
        DeskError::Storage(err.to_string())
    }
}
