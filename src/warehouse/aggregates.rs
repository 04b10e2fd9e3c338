//! # Aggregate Refresher
//!
//! Recomputes the three summary tables (daily sales, product performance,
//! customer metrics) from the fact table. Aggregates are pure derived data:
//! truncate-and-rebuild is safe to run any number of times and is always
//! consistent with the fact table loaded in the same scope.

use std::collections::{BTreeMap, HashSet};
use tracing::info;

use crate::error::Result;
use crate::models::aggregate::{CustomerMetricsRow, DailySalesRow, ProductPerformanceRow};
use crate::models::fact::SalesFactRow;
use crate::warehouse::store::WarehouseStore;

/// Group fact rows by date key.
pub fn compute_daily_sales(facts: &[SalesFactRow]) -> Vec<DailySalesRow> {
    #[derive(Default)]
    struct Acc<'a> {
        transactions: HashSet<&'a str>,
        customers: HashSet<i64>,
        revenue: f64,
        profit: f64,
    }

    let mut groups: BTreeMap<i32, Acc<'_>> = BTreeMap::new();
    for fact in facts {
        let acc = groups.entry(fact.date_key).or_default();
        acc.transactions.insert(fact.transaction_id.as_str());
        acc.customers.insert(fact.customer_key);
        acc.revenue += fact.line_total;
        acc.profit += fact.profit;
    }

    groups
        .into_iter()
        .map(|(date_key, acc)| DailySalesRow {
            date_key,
            transaction_count: acc.transactions.len() as i64,
            total_revenue: acc.revenue,
            total_profit: acc.profit,
            unique_customers: acc.customers.len() as i64,
        })
        .collect()
}

/// Group fact rows by product surrogate key.
pub fn compute_product_performance(facts: &[SalesFactRow]) -> Vec<ProductPerformanceRow> {
    #[derive(Default)]
    struct Acc {
        units: i64,
        revenue: f64,
        profit: f64,
        discount_rate_sum: f64,
        discount_rate_count: u64,
    }

    let mut groups: BTreeMap<i64, Acc> = BTreeMap::new();
    for fact in facts {
        let acc = groups.entry(fact.product_key).or_default();
        acc.units += fact.quantity as i64;
        acc.revenue += fact.line_total;
        acc.profit += fact.profit;
        // Zero-total lines contribute nothing, mirroring AVG over NULLIF.
        if fact.line_total != 0.0 {
            acc.discount_rate_sum += fact.discount_amount * 100.0 / fact.line_total;
            acc.discount_rate_count += 1;
        }
    }

    groups
        .into_iter()
        .map(|(product_key, acc)| ProductPerformanceRow {
            product_key,
            units_sold: acc.units,
            total_revenue: acc.revenue,
            total_profit: acc.profit,
            avg_discount_rate: (acc.discount_rate_count > 0)
                .then(|| acc.discount_rate_sum / acc.discount_rate_count as f64),
        })
        .collect()
}

/// Group fact rows by customer surrogate key.
pub fn compute_customer_metrics(facts: &[SalesFactRow]) -> Vec<CustomerMetricsRow> {
    struct Acc<'a> {
        transactions: HashSet<&'a str>,
        spend: f64,
        line_count: u64,
        last_purchase: chrono::DateTime<chrono::Utc>,
    }

    let mut groups: BTreeMap<i64, Acc<'_>> = BTreeMap::new();
    for fact in facts {
        let acc = groups.entry(fact.customer_key).or_insert_with(|| Acc {
            transactions: HashSet::new(),
            spend: 0.0,
            line_count: 0,
            last_purchase: fact.created_at,
        });
        acc.transactions.insert(fact.transaction_id.as_str());
        acc.spend += fact.line_total;
        acc.line_count += 1;
        acc.last_purchase = acc.last_purchase.max(fact.created_at);
    }

    groups
        .into_iter()
        .map(|(customer_key, acc)| CustomerMetricsRow {
            customer_key,
            transaction_count: acc.transactions.len() as i64,
            total_spend: acc.spend,
            avg_order_value: acc.spend / acc.line_count as f64,
            last_purchase_at: acc.last_purchase,
        })
        .collect()
}

/// Refreshes the summary tables against a warehouse store.
pub struct AggregateRefresher<'a> {
    store: &'a dyn WarehouseStore,
}

impl<'a> AggregateRefresher<'a> {
    pub fn new(store: &'a dyn WarehouseStore) -> Self {
        Self { store }
    }

    /// Truncate and recompute all three summary tables from the fact table.
    pub async fn refresh(&self) -> Result<()> {
        self.store.refresh_aggregates().await?;
        info!("aggregates refreshed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn fact(
        date_key: i32,
        customer_key: i64,
        product_key: i64,
        transaction_id: &str,
        quantity: i32,
        line_total: f64,
        discount_amount: f64,
        profit: f64,
    ) -> SalesFactRow {
        SalesFactRow {
            date_key,
            customer_key,
            product_key,
            payment_method_key: 1,
            transaction_id: transaction_id.to_string(),
            quantity,
            unit_price: line_total / quantity as f64,
            discount_amount,
            line_total,
            profit,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 2, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_daily_sales_groups_by_date() {
        let facts = vec![
            fact(20240301, 1, 1, "TXN1", 1, 100.0, 0.0, 40.0),
            fact(20240301, 2, 1, "TXN2", 1, 50.0, 5.0, 10.0),
            fact(20240302, 1, 2, "TXN3", 2, 80.0, 0.0, 20.0),
        ];
        let rows = compute_daily_sales(&facts);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date_key, 20240301);
        assert_eq!(rows[0].transaction_count, 2);
        assert_eq!(rows[0].unique_customers, 2);
        assert!((rows[0].total_revenue - 150.0).abs() < 1e-9);
        assert!((rows[0].total_profit - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_distinct_transactions_counted_once() {
        // Two line items of the same transaction.
        let facts = vec![
            fact(20240301, 1, 1, "TXN1", 1, 100.0, 0.0, 40.0),
            fact(20240301, 1, 2, "TXN1", 1, 60.0, 0.0, 10.0),
        ];
        let rows = compute_daily_sales(&facts);
        assert_eq!(rows[0].transaction_count, 1);

        let metrics = compute_customer_metrics(&facts);
        assert_eq!(metrics[0].transaction_count, 1);
        assert!((metrics[0].total_spend - 160.0).abs() < 1e-9);
        assert!((metrics[0].avg_order_value - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_product_performance_discount_rate() {
        let facts = vec![
            fact(20240301, 1, 7, "TXN1", 2, 90.0, 10.0, 20.0),
            fact(20240302, 2, 7, "TXN2", 1, 50.0, 0.0, 15.0),
        ];
        let rows = compute_product_performance(&facts);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].units_sold, 3);
        // (10/90*100 + 0/50*100) / 2
        let expected = (10.0 * 100.0 / 90.0) / 2.0;
        assert!((rows[0].avg_discount_rate.unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_discount_rate_none_when_all_totals_zero() {
        let facts = vec![fact(20240301, 1, 7, "TXN1", 1, 0.0, 0.0, 0.0)];
        let rows = compute_product_performance(&facts);
        assert_eq!(rows[0].avg_discount_rate, None);
    }

    #[test]
    fn test_empty_fact_table_yields_empty_aggregates() {
        assert!(compute_daily_sales(&[]).is_empty());
        assert!(compute_product_performance(&[]).is_empty());
        assert!(compute_customer_metrics(&[]).is_empty());
    }
}
