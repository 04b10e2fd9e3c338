//! # Warehouse Load Coordinator
//!
//! Sequences the full warehouse load against one store: reference
//! dimensions → versioned dimensions → fact load → aggregate refresh.
//! Each stage is its own transactional unit; the first stage error aborts
//! the remainder and surfaces as a single step failure to the orchestrator,
//! which owns any retry of the whole stage.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::WarehouseConfig;
use crate::error::Result;
use crate::models::source::SourceBatch;
use crate::warehouse::aggregates::AggregateRefresher;
use crate::warehouse::dimension_loader::{DimensionLoadStats, DimensionLoader};
use crate::warehouse::fact_loader::FactLoader;
use crate::warehouse::store::WarehouseStore;

/// Row counts per target table for one warehouse load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WarehouseLoadSummary {
    pub date_rows: u64,
    pub payment_method_rows: u64,
    pub customers: DimensionLoadStats,
    pub products: DimensionLoadStats,
    pub fact_rows: u64,
}

impl WarehouseLoadSummary {
    /// Total rows written across all target tables.
    pub fn total_rows(&self) -> u64 {
        self.date_rows
            + self.payment_method_rows
            + self.customers.inserted
            + self.products.inserted
            + self.fact_rows
    }
}

/// Drives one complete warehouse load.
pub struct WarehouseLoadCoordinator<'a> {
    store: &'a dyn WarehouseStore,
    config: &'a WarehouseConfig,
    as_of: NaiveDate,
}

impl<'a> WarehouseLoadCoordinator<'a> {
    /// Coordinator effective "today" is the current UTC date.
    pub fn new(store: &'a dyn WarehouseStore, config: &'a WarehouseConfig) -> Self {
        Self::with_as_of(store, config, Utc::now().date_naive())
    }

    /// Pin the effective date (deterministic tests).
    pub fn with_as_of(
        store: &'a dyn WarehouseStore,
        config: &'a WarehouseConfig,
        as_of: NaiveDate,
    ) -> Self {
        Self {
            store,
            config,
            as_of,
        }
    }

    /// Run the full load sequence over one source batch.
    pub async fn load(&self, batch: &SourceBatch) -> Result<WarehouseLoadSummary> {
        info!(
            customers = batch.customers.len(),
            products = batch.products.len(),
            transactions = batch.transactions.len(),
            line_items = batch.line_items.len(),
            "📊 warehouse load starting"
        );

        let dimensions = DimensionLoader::new(self.store, self.as_of);
        let date_rows = dimensions
            .load_date_dimension(
                self.config.date_dimension_start,
                self.config.date_dimension_end,
            )
            .await?;
        let payment_method_rows = dimensions.load_payment_methods().await?;
        let customers = dimensions.load_customers(&batch.customers).await?;
        let products = dimensions.load_products(&batch.products).await?;

        let fact_rows = FactLoader::new(self.store).load(batch, Utc::now()).await?;

        AggregateRefresher::new(self.store).refresh().await?;

        let summary = WarehouseLoadSummary {
            date_rows,
            payment_method_rows,
            customers,
            products,
            fact_rows,
        };
        info!(
            fact_rows = summary.fact_rows,
            total_rows = summary.total_rows(),
            "📊 warehouse load complete"
        );
        Ok(summary)
    }
}
