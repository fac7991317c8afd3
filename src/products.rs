//! Product catalog.
//!
//! Same fetch, normalize and cache pattern as orders, without
//! reconciliation: the remote list is taken as-is.

use serde_json::Value;
use tracing::{info, warn};

use crate::api::OrderGateway;
use crate::cache::{FetchOutcome, RecordListCache};
use crate::error::DeskError;
use crate::model::{Product, ProductUpdate};
use crate::normalize::{amount_display, bool_any, normalize_product_list, str_any, Normalized};

/// Counts from one committed product fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProductReport {
    pub total: usize,
    pub dropped: usize,
}

pub struct ProductCatalog {
    products: Vec<Product>,
    has_loaded: bool,
    cache: RecordListCache<Product>,
}

impl ProductCatalog {
    pub fn new(cache: RecordListCache<Product>) -> Self {
        Self {
            products: Vec::new(),
            has_loaded: false,
            cache,
        }
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn has_loaded(&self) -> bool {
        self.has_loaded
    }

    pub fn find(&self, variant_id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.variant_id == variant_id)
    }

    pub fn restore(&mut self) -> Result<(), DeskError> {
        let cached = self.cache.load()?;
        self.products = cached.records;
        self.has_loaded = cached.has_loaded;
        Ok(())
    }

    /// Normalize a products body. `Value::Null` (empty response) is an empty
    /// list.
    fn parse(body: &Value) -> Result<Normalized<Product>, DeskError> {
        if body.is_null() {
            return Ok(Normalized::default());
        }
        normalize_product_list(body)
    }

    /// Fetch the product list and commit it. Remote or payload failures keep
    /// the last committed list; storage failures are returned.
    pub async fn refresh(
        &mut self,
        gateway: &dyn OrderGateway,
    ) -> Result<FetchOutcome<ProductReport>, DeskError> {
        let fetched = match gateway.list_products().await {
            Ok(body) => Self::parse(&body),
            Err(e) => Err(e),
        };

        match fetched {
            Ok(list) => {
                self.cache.store(&list.records)?;
                let report = ProductReport {
                    total: list.records.len(),
                    dropped: list.dropped,
                };
                self.products = list.records;
                self.has_loaded = true;
                info!(total = report.total, dropped = report.dropped, "product list refreshed");
                Ok(FetchOutcome::Live(report))
            }
            Err(error) => {
                warn!(kind = error.kind(), error = %error, "product fetch failed, keeping cached list");
                if !self.has_loaded {
                    self.restore()?;
                }
                Ok(FetchOutcome::Cached {
                    error,
                    records: self.products.len(),
                })
            }
        }
    }

    /// Push a partial update, then patch the matching product locally.
    /// Returns the patched product, or `None` if it is not in the list.
    pub async fn update(
        &mut self,
        gateway: &dyn OrderGateway,
        update: &ProductUpdate,
    ) -> Result<Option<Product>, DeskError> {
        if update.variant_id.trim().is_empty() {
            return Err(DeskError::InvalidInput("variant id is required".into()));
        }
        if update.is_empty() {
            return Err(DeskError::InvalidInput(
                "nothing to update: give a price, SKU or inventory".into(),
            ));
        }
        if update.price.map(|p| p < 0.0).unwrap_or(false) {
            return Err(DeskError::InvalidInput("price cannot be negative".into()));
        }

        let body = gateway.update_product(update).await?;
        if bool_any(&body, &["success"]) == Some(false) {
            let message = str_any(&body, &["message", "error"])
                .unwrap_or_else(|| "Product update was rejected".to_string());
            return Err(DeskError::LogicalFailure(message));
        }

        let mut next = self.products.clone();
        let patched = match next.iter_mut().find(|p| p.variant_id == update.variant_id) {
            Some(product) => {
                if let Some(price) = update.price {
                    product.price_display = amount_display(price);
                }
                if let Some(sku) = &update.sku {
                    product.sku = sku.clone();
                }
                if let Some(inventory) = update.inventory {
                    product.inventory_quantity = inventory;
                }
                product.clone()
            }
            None => {
                warn!(variant_id = %update.variant_id, "updated product is not in the cached list");
                return Ok(None);
            }
        };

        self.cache.store(&next)?;
        self.products = next;
        info!(variant_id = %update.variant_id, "product updated");
        Ok(Some(patched))
    }
}
