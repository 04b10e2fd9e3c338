//! # Fact Loader
//!
//! Joins transaction line items against the current dimension snapshots,
//! computes the derived measures once, and replaces the fact table
//! wholesale. A line item that fails to resolve any of its keys is a
//! referential-integrity violation: the whole load fails and the previous
//! fact table contents stay in place.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::models::fact::{line_measures, SalesFactRow};
use crate::models::reference::date_key_for;
use crate::models::source::SourceBatch;
use crate::warehouse::store::{DimensionKeySnapshot, WarehouseStore};

/// Resolve and compute every fact row, or fail on the first unresolvable
/// reference. Pure; does not touch the store.
pub fn build_fact_rows(
    batch: &SourceBatch,
    keys: &DimensionKeySnapshot,
    loaded_at: DateTime<Utc>,
) -> Result<Vec<SalesFactRow>> {
    let transactions = batch.transactions_by_id();
    let costs = batch.product_costs();

    let mut rows = Vec::with_capacity(batch.line_items.len());
    for item in &batch.line_items {
        let transaction = transactions.get(item.transaction_id.as_str()).ok_or_else(|| {
            PipelineError::ReferentialIntegrity {
                entity: "transaction".to_string(),
                id: item.transaction_id.clone(),
            }
        })?;

        let date_key = date_key_for(transaction.transaction_date);
        if !keys.date_keys.contains(&date_key) {
            return Err(PipelineError::ReferentialIntegrity {
                entity: "date".to_string(),
                id: transaction.transaction_date.to_string(),
            });
        }

        let customer_key = *keys.customers.get(&transaction.customer_id).ok_or_else(|| {
            PipelineError::ReferentialIntegrity {
                entity: "customer".to_string(),
                id: transaction.customer_id.clone(),
            }
        })?;

        let product_key = *keys.products.get(&item.product_id).ok_or_else(|| {
            PipelineError::ReferentialIntegrity {
                entity: "product".to_string(),
                id: item.product_id.clone(),
            }
        })?;

        let payment_method_key = *keys
            .payment_methods
            .get(&transaction.payment_method)
            .ok_or_else(|| PipelineError::ReferentialIntegrity {
                entity: "payment_method".to_string(),
                id: transaction.payment_method.clone(),
            })?;

        // Unit cost comes from the source batch at load time; a product
        // resolvable in the dimension but absent from the batch cannot price
        // its profit measure and fails the load the same way.
        let unit_cost = *costs.get(item.product_id.as_str()).ok_or_else(|| {
            PipelineError::ReferentialIntegrity {
                entity: "product".to_string(),
                id: item.product_id.clone(),
            }
        })?;

        let (discount_amount, line_total, profit) = line_measures(
            item.quantity,
            item.unit_price,
            item.discount_percentage,
            unit_cost,
        );

        rows.push(SalesFactRow {
            date_key,
            customer_key,
            product_key,
            payment_method_key,
            transaction_id: item.transaction_id.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            discount_amount,
            line_total,
            profit,
            created_at: loaded_at,
        });
    }
    Ok(rows)
}

/// Replaces the fact table from a source batch.
pub struct FactLoader<'a> {
    store: &'a dyn WarehouseStore,
}

impl<'a> FactLoader<'a> {
    pub fn new(store: &'a dyn WarehouseStore) -> Self {
        Self { store }
    }

    /// Build all fact rows against the current dimension keys and swap them
    /// in (truncate-and-reload). Returns the loaded row count.
    pub async fn load(&self, batch: &SourceBatch, loaded_at: DateTime<Utc>) -> Result<u64> {
        let keys = self.store.dimension_keys().await?;
        let rows = build_fact_rows(batch, &keys, loaded_at)?;
        let count = self.store.replace_facts(rows).await?;
        info!(rows = count, "fact_sales loaded");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::source::{SourceLineItem, SourceTransaction};
    use chrono::NaiveDate;
    use std::collections::{HashMap, HashSet};

    fn snapshot() -> DimensionKeySnapshot {
        DimensionKeySnapshot {
            customers: HashMap::from([("CUST0001".to_string(), 11)]),
            products: HashMap::from([("PROD0001".to_string(), 21)]),
            payment_methods: HashMap::from([("UPI".to_string(), 3)]),
            date_keys: HashSet::from([20230615]),
        }
    }

    fn batch() -> SourceBatch {
        SourceBatch {
            customers: Vec::new(),
            products: vec![crate::models::source::SourceProduct {
                product_id: "PROD0001".to_string(),
                product_name: "Widget".to_string(),
                category: "Tools".to_string(),
                sub_category: "Hand Tools".to_string(),
                brand: "Acme".to_string(),
                price: 19.99,
                cost: 12.5,
            }],
            transactions: vec![SourceTransaction {
                transaction_id: "TXN00001".to_string(),
                customer_id: "CUST0001".to_string(),
                transaction_date: NaiveDate::from_ymd_opt(2023, 6, 15).unwrap(),
                payment_method: "UPI".to_string(),
            }],
            line_items: vec![SourceLineItem {
                transaction_id: "TXN00001".to_string(),
                product_id: "PROD0001".to_string(),
                quantity: 3,
                unit_price: 19.99,
                discount_percentage: 10.0,
            }],
        }
    }

    #[test]
    fn test_fact_row_resolution_and_measures() {
        let rows = build_fact_rows(&batch(), &snapshot(), Utc::now()).unwrap();
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert_eq!(row.date_key, 20230615);
        assert_eq!(row.customer_key, 11);
        assert_eq!(row.product_key, 21);
        assert_eq!(row.payment_method_key, 3);
        assert_eq!(row.discount_amount, 6.0);
        assert_eq!(row.line_total, 53.97);
        assert_eq!(row.profit, 16.47);
    }

    #[test]
    fn test_unknown_transaction_fails_load() {
        let mut b = batch();
        b.transactions.clear();
        let err = build_fact_rows(&b, &snapshot(), Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ReferentialIntegrity { entity, .. } if entity == "transaction"
        ));
    }

    #[test]
    fn test_unknown_product_fails_load() {
        let mut keys = snapshot();
        keys.products.clear();
        let err = build_fact_rows(&batch(), &keys, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ReferentialIntegrity { entity, .. } if entity == "product"
        ));
    }

    #[test]
    fn test_date_outside_dimension_fails_load() {
        let mut keys = snapshot();
        keys.date_keys.clear();
        let err = build_fact_rows(&batch(), &keys, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ReferentialIntegrity { entity, .. } if entity == "date"
        ));
    }
}
