//! Reference (static) dimensions: date and payment method.
//!
//! Reference dimensions carry no history; each load fully regenerates them.
//! The date key is derived deterministically from the calendar date, the
//! payment method keys are assigned sequentially per load.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Default payment method catalog: `(name, payment_type)`.
pub const DEFAULT_PAYMENT_METHODS: [(&str, &str); 5] = [
    ("Credit Card", "Online"),
    ("Debit Card", "Online"),
    ("UPI", "Online"),
    ("Net Banking", "Online"),
    ("Cash on Delivery", "Offline"),
];

/// One row of the date dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DateDimensionRow {
    /// `YYYYMMDD` integer, derived from `full_date`.
    pub date_key: i32,
    pub full_date: NaiveDate,
    pub year: i32,
    pub quarter: i32,
    pub month: i32,
    pub day: i32,
    pub month_name: String,
    pub day_name: String,
    pub week_of_year: i32,
    pub is_weekend: bool,
}

/// One row of the payment method dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PaymentMethodRow {
    pub payment_method_key: i64,
    pub payment_method_name: String,
    pub payment_type: String,
}

/// Deterministic `YYYYMMDD` key for a calendar date.
pub fn date_key_for(date: NaiveDate) -> i32 {
    date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32
}

/// Materialize the date dimension for an inclusive date range.
pub fn build_date_dimension(start: NaiveDate, end: NaiveDate) -> Vec<DateDimensionRow> {
    let mut rows = Vec::new();
    let mut current = start;
    while current <= end {
        rows.push(DateDimensionRow {
            date_key: date_key_for(current),
            full_date: current,
            year: current.year(),
            quarter: (current.month0() / 3 + 1) as i32,
            month: current.month() as i32,
            day: current.day() as i32,
            month_name: current.format("%B").to_string(),
            day_name: current.format("%A").to_string(),
            week_of_year: current.iso_week().week() as i32,
            is_weekend: matches!(current.weekday(), Weekday::Sat | Weekday::Sun),
        });
        current = match current.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    rows
}

/// Assign sequential surrogate keys to a payment method catalog.
pub fn payment_method_rows(catalog: &[(&str, &str)]) -> Vec<PaymentMethodRow> {
    catalog
        .iter()
        .enumerate()
        .map(|(index, (name, payment_type))| PaymentMethodRow {
            payment_method_key: index as i64 + 1,
            payment_method_name: (*name).to_string(),
            payment_type: (*payment_type).to_string(),
        })
        .collect()
}
