//! Desk session.
//!
//! [`OrderDesk`] wires the store, the gateway, the ledger and the selection
//! into one operator session: fetch and reconcile, select, run a batch,
//! commit. Every mutating operation takes `&mut self`, so a fetch can never
//! interleave with an in-flight batch.

use std::sync::Arc;
use tracing::{info, warn};

use crate::api::{OrderGateway, WebhookClient};
use crate::batch::{BatchAction, BatchExecutor, BatchSummary};
use crate::cache::{order_list_cache, product_list_cache, FetchOutcome};
use crate::config::{DeskConfig, SelectionAfterBatch};
use crate::db;
use crate::error::DeskError;
use crate::filter::{DateRange, OrderFilter};
use crate::ledger::{OrderLedger, SnapshotReport};
use crate::metrics::{MetricsBoard, SummarySnapshot};
use crate::model::{Order, OrderDetails, OrdersSummary, Product, ProductUpdate};
use crate::normalize::{normalize_order_details, normalize_order_snapshot};
use crate::overrides::OverrideStore;
use crate::products::{ProductCatalog, ProductReport};
use crate::selection::{selectable_ids, SelectionSet};
use crate::storage::KvStore;

pub struct OrderDesk {
    store: Arc<dyn KvStore>,
    gateway: Arc<dyn OrderGateway>,
    executor: BatchExecutor,
    ledger: OrderLedger,
    selection: SelectionSet,
    filter: OrderFilter,
    date_range: DateRange,
    products: ProductCatalog,
    metrics: MetricsBoard,
    selection_after_batch: SelectionAfterBatch,
}

impl OrderDesk {
    pub fn new(config: &DeskConfig, store: Arc<dyn KvStore>, gateway: Arc<dyn OrderGateway>) -> Self {
        Self {
            executor: BatchExecutor::new(gateway.clone(), config.timeout()),
            ledger: OrderLedger::new(OverrideStore::new(store.clone()), order_list_cache(store.clone())),
            products: ProductCatalog::new(product_list_cache(store.clone())),
            metrics: MetricsBoard::new(store.clone()),
            selection: SelectionSet::new(),
            filter: OrderFilter::default(),
            date_range: DateRange::default(),
            selection_after_batch: config.selection_after_batch,
            store,
            gateway,
        }
    }

    /// Open the on-disk store and the webhook client described by `config`.
    pub fn open(config: &DeskConfig) -> Result<Self, DeskError> {
        let db = db::init(&config.db_path())?;
        let gateway = WebhookClient::from_config(config)?;
        Ok(Self::new(config, Arc::new(db), Arc::new(gateway)))
    }

    /// Load everything persisted by earlier sessions. No remote calls.
    pub fn restore(&mut self) -> Result<(), DeskError> {
        self.ledger.restore()?;
        self.products.restore()?;
        self.metrics.restore()?;
        self.date_range = DateRange::load(self.store.as_ref())?;
        self.selection.retain_eligible(self.ledger.orders(), &self.filter);
        info!(
            orders = self.ledger.orders().len(),
            products = self.products.products().len(),
            "desk restored"
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Orders
    // -----------------------------------------------------------------------

    pub fn orders(&self) -> &[Order] {
        self.ledger.orders()
    }

    pub fn has_loaded_orders(&self) -> bool {
        self.ledger.has_loaded()
    }

    /// Orders matching the active filter, in list order.
    pub fn visible_orders(&self) -> Vec<&Order> {
        self.filter.apply(self.ledger.orders()).collect()
    }

    /// Fetch the remote snapshot for the active date range and reconcile it.
    ///
    /// Remote and payload failures keep the last committed list and are
    /// returned inside [`FetchOutcome::Cached`]; storage failures are errors.
    pub async fn refresh_orders(&mut self) -> Result<FetchOutcome<SnapshotReport>, DeskError> {
        let fetched = match self.gateway.list_orders(&self.date_range).await {
            Ok(body) => normalize_order_snapshot(&body),
            Err(e) => Err(e),
        };

        let snapshot = match fetched {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(kind = error.kind(), error = %error, "order fetch failed, keeping cached list");
                if !self.ledger.has_loaded() {
                    self.ledger.restore()?;
                }
                return Ok(FetchOutcome::Cached {
                    error,
                    records: self.ledger.orders().len(),
                });
            }
        };

        let report = self.ledger.apply_snapshot(&snapshot)?;
        self.selection.retain_eligible(self.ledger.orders(), &self.filter);
        Ok(FetchOutcome::Live(report))
    }

    pub async fn order_details(&self, order_id: &str) -> Result<Vec<OrderDetails>, DeskError> {
        let order_id = order_id.trim();
        if order_id.is_empty() {
            return Err(DeskError::InvalidInput("order id is required".into()));
        }
        let body = self.gateway.order_details(order_id).await?;
        normalize_order_details(&body)
    }

    // -----------------------------------------------------------------------
    // Filter and selection
    // -----------------------------------------------------------------------

    pub fn filter(&self) -> &OrderFilter {
        &self.filter
    }

    /// Replace the filter and drop selected orders it hides. Returns the
    /// dropped ids.
    pub fn set_filter(&mut self, filter: OrderFilter) -> Vec<String> {
        self.filter = filter;
        self.selection.retain_eligible(self.ledger.orders(), &self.filter)
    }

    pub fn date_range(&self) -> DateRange {
        self.date_range
    }

    /// Persist a new date range for subsequent fetches.
    pub fn set_date_range(&mut self, range: DateRange) -> Result<(), DeskError> {
        range.save(self.store.as_ref())?;
        self.date_range = range;
        info!(start = ?range.start, end = ?range.end, "date range updated");
        Ok(())
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn toggle(&mut self, order_number: &str) -> bool {
        self.selection
            .toggle(order_number, self.ledger.orders(), &self.filter)
    }

    /// Select every visible unfulfilled order. Returns how many are selected.
    pub fn select_all_visible(&mut self) -> usize {
        let ids = selectable_ids(self.ledger.orders(), &self.filter);
        self.selection.select_all(&ids);
        self.selection.len()
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    // -----------------------------------------------------------------------
    // Batch actions
    // -----------------------------------------------------------------------

    pub async fn fulfill_selected(&mut self) -> Result<BatchSummary, DeskError> {
        self.run_batch(BatchAction::Fulfill).await
    }

    pub async fn cancel_selected(&mut self) -> Result<BatchSummary, DeskError> {
        self.run_batch(BatchAction::Cancel).await
    }

    async fn run_batch(&mut self, action: BatchAction) -> Result<BatchSummary, DeskError> {
        if self.selection.is_empty() {
            return Err(DeskError::InvalidInput("no orders selected".into()));
        }
        let ids = self.selection.ids().to_vec();
        let summary = self.executor.execute(action, &ids, &mut self.ledger).await;

        match self.selection_after_batch {
            SelectionAfterBatch::ClearAll => self.selection.clear(),
            SelectionAfterBatch::RetainFailed => {
                self.selection.select_all(&summary.failed_ids());
                self.selection
                    .retain_eligible(self.ledger.orders(), &self.filter);
            }
        }

        // Metrics failures are logged only; the batch is already committed.
        if summary.should_refresh_metrics() {
            match self.refresh_summary().await {
                Ok(outcome) => {
                    if let Some(error) = outcome.error() {
                        warn!(error = %error, "metrics refresh after batch failed");
                    }
                }
                Err(error) => {
                    warn!(kind = error.kind(), error = %error, "metrics refresh after batch failed")
                }
            }
        }
        Ok(summary)
    }

    // -----------------------------------------------------------------------
    // Products and metrics
    // -----------------------------------------------------------------------

    pub fn products(&self) -> &[Product] {
        self.products.products()
    }

    pub async fn refresh_products(&mut self) -> Result<FetchOutcome<ProductReport>, DeskError> {
        self.products.refresh(self.gateway.as_ref()).await
    }

    pub async fn update_product(&mut self, update: &ProductUpdate) -> Result<Option<Product>, DeskError> {
        self.products.update(self.gateway.as_ref(), update).await
    }

    pub fn summary(&self) -> Option<&SummarySnapshot> {
        self.metrics.current()
    }

    pub async fn refresh_summary(&mut self) -> Result<FetchOutcome<OrdersSummary>, DeskError> {
        self.metrics
            .refresh(self.gateway.as_ref(), &self.date_range)
            .await
    }
}
