//! Aggregate (summary) rows, fully derived from the fact table.
//!
//! Aggregates have no independent identity: they are truncated and rebuilt
//! on every refresh and are always consistent with the fact table inside
//! the same load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Daily sales summary, one row per date key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DailySalesRow {
    pub date_key: i32,
    pub transaction_count: i64,
    pub total_revenue: f64,
    pub total_profit: f64,
    pub unique_customers: i64,
}

/// Product performance summary, one row per product surrogate key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ProductPerformanceRow {
    pub product_key: i64,
    pub units_sold: i64,
    pub total_revenue: f64,
    pub total_profit: f64,
    /// Average per-line discount rate in percent; `None` when no line had a
    /// non-zero total (mirrors `AVG` over a `NULLIF` expression).
    pub avg_discount_rate: Option<f64>,
}

/// Customer metrics summary, one row per customer surrogate key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CustomerMetricsRow {
    pub customer_key: i64,
    pub transaction_count: i64,
    pub total_spend: f64,
    pub avg_order_value: f64,
    pub last_purchase_at: DateTime<Utc>,
}
