//! Sales fact rows and derived measure arithmetic.
//!
//! Measures are computed once at load time and never recomputed from the
//! fact table itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One fact row per transaction line item, keyed into every dimension by
/// surrogate key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SalesFactRow {
    pub date_key: i32,
    pub customer_key: i64,
    pub product_key: i64,
    pub payment_method_key: i64,
    pub transaction_id: String,
    pub quantity: i32,
    pub unit_price: f64,
    pub discount_amount: f64,
    pub line_total: f64,
    pub profit: f64,
    pub created_at: DateTime<Utc>,
}

/// Round half-away-from-zero to 2 decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Derived measures for one line item: `(discount_amount, line_total,
/// profit)`, each rounded to 2 decimal places.
pub fn line_measures(
    quantity: i32,
    unit_price: f64,
    discount_percentage: f64,
    unit_cost: f64,
) -> (f64, f64, f64) {
    let gross = quantity as f64 * unit_price;
    let discount_amount = round2(gross * discount_percentage / 100.0);
    let line_total = round2(gross - discount_amount);
    let profit = round2(line_total - unit_cost * quantity as f64);
    (discount_amount, line_total, profit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_round2_half_away_from_zero() {
        assert_eq!(round2(5.997), 6.0);
        assert_eq!(round2(5.994), 5.99);
        assert_eq!(round2(-5.997), -6.0);
        assert_eq!(round2(0.005), 0.01);
    }

    #[test]
    fn test_line_measures_exact() {
        // 3 * 19.99 = 59.97 gross, 10% discount
        let (discount, line_total, profit) = line_measures(3, 19.99, 10.0, 12.5);
        assert_eq!(discount, 6.0);
        assert_eq!(line_total, 53.97);
        assert_eq!(profit, 16.47);
    }

    #[test]
    fn test_zero_discount() {
        let (discount, line_total, profit) = line_measures(2, 100.0, 0.0, 60.0);
        assert_eq!(discount, 0.0);
        assert_eq!(line_total, 200.0);
        assert_eq!(profit, 80.0);
    }

    proptest! {
        #[test]
        fn prop_line_total_identity(
            quantity in 1i32..100,
            unit_price in 0.01f64..10_000.0,
            discount in prop::sample::select(vec![0.0, 5.0, 10.0, 15.0]),
            unit_cost in 0.01f64..5_000.0,
        ) {
            let (discount_amount, line_total, profit) =
                line_measures(quantity, unit_price, discount, unit_cost);

            // line_total = round2(gross - discount_amount), exactly.
            let gross = quantity as f64 * unit_price;
            prop_assert_eq!(line_total, round2(gross - discount_amount));
            // profit = round2(line_total - cost * quantity), exactly.
            prop_assert_eq!(profit, round2(line_total - unit_cost * quantity as f64));
            prop_assert!(discount_amount >= 0.0);
        }
    }
}
