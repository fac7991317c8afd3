//! Shoplytic Desk backend.
//!
//! Keeps a local, durable view of remote orders, reconciles each fetched
//! snapshot against locally confirmed actions, and runs bulk fulfill and
//! cancel actions order by order. The `shoplytic-desk` binary is a thin CLI
//! over [`OrderDesk`].

pub mod api;
pub mod batch;
pub mod cache;
pub mod config;
pub mod db;
pub mod desk;
pub mod error;
pub mod filter;
pub mod ledger;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod normalize;
pub mod overrides;
pub mod products;
pub mod reconcile;
pub mod selection;
pub mod storage;

pub use api::{OrderGateway, WebhookClient};
pub use batch::{BatchAction, BatchItemResult, BatchSummary, ItemOutcome};
pub use cache::FetchOutcome;
pub use config::{DeskConfig, SelectionAfterBatch};
pub use desk::OrderDesk;
pub use error::{DeskError, MalformedReason};
pub use filter::{DateRange, OrderFilter};
pub use logging::init_logging;
pub use model::{FulfillmentStatus, Order, OrderDetails, OrdersSummary, ProcessedStatus, Product, ProductUpdate};
pub use storage::{KvStore, MemoryStore};
