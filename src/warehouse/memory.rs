//! In-memory warehouse and source repository.
//!
//! Backs the test suite and honors the same contracts as the Postgres
//! store: surrogate keys are assigned monotonically and never reused,
//! deltas apply all-or-nothing, reference tables and facts are replaced
//! wholesale.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::error::{PipelineError, Result};
use crate::models::dimension::{
    CustomerAttributes, DimensionDelta, DimensionVersion, ProductAttributes,
};
use crate::models::fact::SalesFactRow;
use crate::models::reference::{DateDimensionRow, PaymentMethodRow};
use crate::models::source::SourceBatch;
use crate::warehouse::aggregates;
use crate::warehouse::store::{
    AggregateTables, DimensionKeySnapshot, SourceRepository, WarehouseStore,
};

#[derive(Debug, Default)]
struct MemoryTables {
    customers: Vec<DimensionVersion<CustomerAttributes>>,
    products: Vec<DimensionVersion<ProductAttributes>>,
    date_dimension: Vec<DateDimensionRow>,
    payment_methods: Vec<PaymentMethodRow>,
    facts: Vec<SalesFactRow>,
    aggregates: AggregateTables,
    next_customer_key: i64,
    next_product_key: i64,
}

/// In-memory implementation of [`WarehouseStore`].
#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    inner: Mutex<MemoryTables>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// All customer version rows, history included (test inspection).
    pub async fn customer_rows(&self) -> Vec<DimensionVersion<CustomerAttributes>> {
        self.inner.lock().await.customers.clone()
    }

    /// All product version rows, history included (test inspection).
    pub async fn product_rows(&self) -> Vec<DimensionVersion<ProductAttributes>> {
        self.inner.lock().await.products.clone()
    }

    /// Current fact table contents (test inspection).
    pub async fn fact_rows(&self) -> Vec<SalesFactRow> {
        self.inner.lock().await.facts.clone()
    }

    /// Current payment method rows (test inspection).
    pub async fn payment_method_table(&self) -> Vec<PaymentMethodRow> {
        self.inner.lock().await.payment_methods.clone()
    }

    /// Current date dimension size (test inspection).
    pub async fn date_dimension_len(&self) -> usize {
        self.inner.lock().await.date_dimension.len()
    }

    fn close_rows<A>(
        rows: &mut [DimensionVersion<A>],
        delta: &DimensionDelta<A>,
        table: &str,
    ) -> Result<()> {
        // Validate every close target up front so the delta applies
        // all-or-nothing.
        for key in &delta.closes {
            if !rows.iter().any(|r| r.surrogate_key == *key && r.is_current) {
                return Err(PipelineError::database(
                    format!("apply_{table}_delta"),
                    format!("no current row with surrogate key {key}"),
                ));
            }
        }
        for row in rows.iter_mut() {
            if delta.closes.contains(&row.surrogate_key) {
                row.is_current = false;
                row.end_date = Some(delta.close_date);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl WarehouseStore for MemoryWarehouse {
    async fn customer_snapshot(
        &self,
    ) -> Result<HashMap<String, DimensionVersion<CustomerAttributes>>> {
        let tables = self.inner.lock().await;
        Ok(tables
            .customers
            .iter()
            .filter(|r| r.is_current)
            .map(|r| (r.natural_key.clone(), r.clone()))
            .collect())
    }

    async fn product_snapshot(
        &self,
    ) -> Result<HashMap<String, DimensionVersion<ProductAttributes>>> {
        let tables = self.inner.lock().await;
        Ok(tables
            .products
            .iter()
            .filter(|r| r.is_current)
            .map(|r| (r.natural_key.clone(), r.clone()))
            .collect())
    }

    async fn apply_customer_delta(&self, delta: DimensionDelta<CustomerAttributes>) -> Result<()> {
        let mut tables = self.inner.lock().await;
        Self::close_rows(&mut tables.customers, &delta, "customer")?;
        for insert in delta.inserts {
            tables.next_customer_key += 1;
            let surrogate_key = tables.next_customer_key;
            tables.customers.push(DimensionVersion {
                surrogate_key,
                natural_key: insert.natural_key,
                attributes: insert.attributes,
                effective_date: insert.effective_date,
                end_date: None,
                is_current: true,
            });
        }
        Ok(())
    }

    async fn apply_product_delta(&self, delta: DimensionDelta<ProductAttributes>) -> Result<()> {
        let mut tables = self.inner.lock().await;
        Self::close_rows(&mut tables.products, &delta, "product")?;
        for insert in delta.inserts {
            tables.next_product_key += 1;
            let surrogate_key = tables.next_product_key;
            tables.products.push(DimensionVersion {
                surrogate_key,
                natural_key: insert.natural_key,
                attributes: insert.attributes,
                effective_date: insert.effective_date,
                end_date: None,
                is_current: true,
            });
        }
        Ok(())
    }

    async fn replace_date_dimension(&self, rows: Vec<DateDimensionRow>) -> Result<u64> {
        let mut tables = self.inner.lock().await;
        let count = rows.len() as u64;
        tables.date_dimension = rows;
        Ok(count)
    }

    async fn replace_payment_methods(&self, rows: Vec<PaymentMethodRow>) -> Result<u64> {
        let mut tables = self.inner.lock().await;
        let count = rows.len() as u64;
        tables.payment_methods = rows;
        Ok(count)
    }

    async fn dimension_keys(&self) -> Result<DimensionKeySnapshot> {
        let tables = self.inner.lock().await;
        Ok(DimensionKeySnapshot {
            customers: tables
                .customers
                .iter()
                .filter(|r| r.is_current)
                .map(|r| (r.natural_key.clone(), r.surrogate_key))
                .collect(),
            products: tables
                .products
                .iter()
                .filter(|r| r.is_current)
                .map(|r| (r.natural_key.clone(), r.surrogate_key))
                .collect(),
            payment_methods: tables
                .payment_methods
                .iter()
                .map(|r| (r.payment_method_name.clone(), r.payment_method_key))
                .collect(),
            date_keys: tables.date_dimension.iter().map(|r| r.date_key).collect(),
        })
    }

    async fn replace_facts(&self, rows: Vec<SalesFactRow>) -> Result<u64> {
        let mut tables = self.inner.lock().await;
        let count = rows.len() as u64;
        tables.facts = rows;
        Ok(count)
    }

    async fn refresh_aggregates(&self) -> Result<()> {
        let mut tables = self.inner.lock().await;
        tables.aggregates = AggregateTables {
            daily_sales: aggregates::compute_daily_sales(&tables.facts),
            product_performance: aggregates::compute_product_performance(&tables.facts),
            customer_metrics: aggregates::compute_customer_metrics(&tables.facts),
        };
        Ok(())
    }

    async fn aggregate_tables(&self) -> Result<AggregateTables> {
        Ok(self.inner.lock().await.aggregates.clone())
    }
}

/// In-memory implementation of [`SourceRepository`], seeded by tests.
#[derive(Debug, Default)]
pub struct MemorySourceRepository {
    batch: Mutex<SourceBatch>,
}

impl MemorySourceRepository {
    pub fn new(batch: SourceBatch) -> Self {
        Self {
            batch: Mutex::new(batch),
        }
    }

    /// Replace the staged batch (simulates a fresh ingestion run).
    pub async fn set_batch(&self, batch: SourceBatch) {
        *self.batch.lock().await = batch;
    }
}

#[async_trait]
impl SourceRepository for MemorySourceRepository {
    async fn fetch_batch(&self) -> Result<SourceBatch> {
        Ok(self.batch.lock().await.clone())
    }
}
