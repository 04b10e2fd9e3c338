//! Storage seams for the warehouse load.
//!
//! `WarehouseStore` owns persistence of the star schema; every mutating
//! method is a single transactional unit — it either applies the whole
//! batch or leaves the table untouched. `SourceRepository` reads the raw
//! staging tables the load consumes.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

use crate::error::Result;
use crate::models::aggregate::{CustomerMetricsRow, DailySalesRow, ProductPerformanceRow};
use crate::models::dimension::{
    CustomerAttributes, DimensionDelta, DimensionVersion, ProductAttributes,
};
use crate::models::fact::SalesFactRow;
use crate::models::reference::{DateDimensionRow, PaymentMethodRow};
use crate::models::source::SourceBatch;

/// Current surrogate keys for every dimension, used to resolve fact rows.
/// Only currently-valid versions appear here — history rows never resolve.
#[derive(Debug, Clone, Default)]
pub struct DimensionKeySnapshot {
    pub customers: HashMap<String, i64>,
    pub products: HashMap<String, i64>,
    pub payment_methods: HashMap<String, i64>,
    pub date_keys: HashSet<i32>,
}

/// Star-schema warehouse persistence.
#[async_trait]
pub trait WarehouseStore: Send + Sync {
    /// Current (open) customer versions, keyed by natural key.
    async fn customer_snapshot(&self) -> Result<HashMap<String, DimensionVersion<CustomerAttributes>>>;

    /// Current (open) product versions, keyed by natural key.
    async fn product_snapshot(&self) -> Result<HashMap<String, DimensionVersion<ProductAttributes>>>;

    /// Close superseded customer versions and insert new ones, atomically.
    async fn apply_customer_delta(&self, delta: DimensionDelta<CustomerAttributes>) -> Result<()>;

    /// Close superseded product versions and insert new ones, atomically.
    async fn apply_product_delta(&self, delta: DimensionDelta<ProductAttributes>) -> Result<()>;

    /// Truncate and reload the date dimension. Returns rows written.
    async fn replace_date_dimension(&self, rows: Vec<DateDimensionRow>) -> Result<u64>;

    /// Truncate and reload the payment method dimension. Returns rows written.
    async fn replace_payment_methods(&self, rows: Vec<PaymentMethodRow>) -> Result<u64>;

    /// Snapshot of every current dimension key, for fact resolution.
    async fn dimension_keys(&self) -> Result<DimensionKeySnapshot>;

    /// Truncate and reload the fact table. Returns rows written.
    async fn replace_facts(&self, rows: Vec<SalesFactRow>) -> Result<u64>;

    /// Truncate and recompute the three summary tables from the fact table.
    async fn refresh_aggregates(&self) -> Result<()>;

    /// Read back the aggregate tables (diagnostics and tests).
    async fn aggregate_tables(&self) -> Result<AggregateTables>;
}

/// The three summary tables, read back together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateTables {
    pub daily_sales: Vec<DailySalesRow>,
    pub product_performance: Vec<ProductPerformanceRow>,
    pub customer_metrics: Vec<CustomerMetricsRow>,
}

/// Raw staging tables feeding the warehouse load.
#[async_trait]
pub trait SourceRepository: Send + Sync {
    /// Fetch one coherent batch of customers, products, transactions and
    /// line items.
    async fn fetch_batch(&self) -> Result<SourceBatch>;
}
