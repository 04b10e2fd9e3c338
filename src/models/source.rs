//! Staging (raw) source records consumed by the warehouse load.
//!
//! Natural keys are business-assigned strings (`CUST0001`, `PROD0001`,
//! `TXN00001`); the warehouse assigns its own surrogate keys on load.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;

/// Raw customer row from staging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SourceCustomer {
    pub customer_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub age_group: String,
}

/// Raw product row from staging. `cost` is the per-unit cost used for the
/// profit measure at fact load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SourceProduct {
    pub product_id: String,
    pub product_name: String,
    pub category: String,
    pub sub_category: String,
    pub brand: String,
    pub price: f64,
    pub cost: f64,
}

/// Raw transaction header from staging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SourceTransaction {
    pub transaction_id: String,
    pub customer_id: String,
    pub transaction_date: NaiveDate,
    pub payment_method: String,
}

/// Raw transaction line item from staging. One fact row per line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SourceLineItem {
    pub transaction_id: String,
    pub product_id: String,
    pub quantity: i32,
    pub unit_price: f64,
    pub discount_percentage: f64,
}

/// One coherent batch of source tables, fetched together at the start of a
/// warehouse load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceBatch {
    pub customers: Vec<SourceCustomer>,
    pub products: Vec<SourceProduct>,
    pub transactions: Vec<SourceTransaction>,
    pub line_items: Vec<SourceLineItem>,
}

impl SourceBatch {
    /// Index transaction headers by transaction id.
    pub fn transactions_by_id(&self) -> HashMap<&str, &SourceTransaction> {
        self.transactions
            .iter()
            .map(|t| (t.transaction_id.as_str(), t))
            .collect()
    }

    /// Per-unit product cost by product id, as of this batch.
    pub fn product_costs(&self) -> HashMap<&str, f64> {
        self.products
            .iter()
            .map(|p| (p.product_id.as_str(), p.cost))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_indexes() {
        let batch = SourceBatch {
            products: vec![SourceProduct {
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
            ..Default::default()
        };

        assert_eq!(
            batch.transactions_by_id()["TXN00001"].customer_id,
            "CUST0001"
        );
        assert_eq!(batch.product_costs()["PROD0001"], 12.5);
    }
}
