//! Versioned (SCD Type 2) dimension records.
//!
//! A dimension entity is identified by its natural key for its whole
//! lifetime; each attribute change closes the current version row and opens
//! a new one under a fresh surrogate key. At most one version per natural
//! key is current at any time, and closed rows are never rewritten.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::source::{SourceCustomer, SourceProduct};

/// Price tier breakpoints for the product dimension.
const BUDGET_PRICE_CEILING: f64 = 50.0;
const MID_RANGE_PRICE_CEILING: f64 = 200.0;

/// Derived price tier for products. Participates in change detection, so it
/// is recomputed from `price` on every load rather than carried forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceRange {
    #[serde(rename = "Budget")]
    Budget,
    #[serde(rename = "Mid-range")]
    MidRange,
    #[serde(rename = "Premium")]
    Premium,
}

impl PriceRange {
    /// Classify a unit price into its tier.
    pub fn classify(price: f64) -> Self {
        if price < BUDGET_PRICE_CEILING {
            Self::Budget
        } else if price < MID_RANGE_PRICE_CEILING {
            Self::MidRange
        } else {
            Self::Premium
        }
    }
}

impl fmt::Display for PriceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Budget => write!(f, "Budget"),
            Self::MidRange => write!(f, "Mid-range"),
            Self::Premium => write!(f, "Premium"),
        }
    }
}

impl std::str::FromStr for PriceRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Budget" => Ok(Self::Budget),
            "Mid-range" => Ok(Self::MidRange),
            "Premium" => Ok(Self::Premium),
            _ => Err(format!("Invalid price range: {s}")),
        }
    }
}

/// Versioned customer attribute set, normalized for change detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerAttributes {
    pub full_name: String,
    pub email: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub age_group: String,
}

impl CustomerAttributes {
    /// Normalize a staging row: derive `full_name`, lowercase `email`.
    /// Comparison against the current version happens on the normalized
    /// form, so an email that only changed case is not attribute drift.
    pub fn from_source(source: &SourceCustomer) -> Self {
        Self {
            full_name: format!("{} {}", source.first_name, source.last_name),
            email: source.email.to_lowercase(),
            city: source.city.clone(),
            state: source.state.clone(),
            country: source.country.clone(),
            age_group: source.age_group.clone(),
        }
    }
}

/// Versioned product attribute set with the derived price tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAttributes {
    pub product_name: String,
    pub category: String,
    pub sub_category: String,
    pub brand: String,
    pub price: f64,
    pub price_range: PriceRange,
}

impl ProductAttributes {
    /// Normalize a staging row, recomputing the price tier from the price.
    pub fn from_source(source: &SourceProduct) -> Self {
        Self {
            product_name: source.product_name.clone(),
            category: source.category.clone(),
            sub_category: source.sub_category.clone(),
            brand: source.brand.clone(),
            price: source.price,
            price_range: PriceRange::classify(source.price),
        }
    }
}

/// One version row of an SCD Type 2 dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionVersion<A> {
    /// Warehouse-assigned key, stable for this version's lifetime and never
    /// reused across versions.
    pub surrogate_key: i64,
    pub natural_key: String,
    pub attributes: A,
    pub effective_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_current: bool,
}

/// A version row to be inserted; the store assigns the surrogate key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDimensionRow<A> {
    pub natural_key: String,
    pub attributes: A,
    pub effective_date: NaiveDate,
}

/// Batch outcome of comparing an incoming source batch against the current
/// dimension snapshot: version rows to close, rows to insert, and how many
/// keys were unchanged. Applied by the store in a single transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionDelta<A> {
    pub closes: Vec<i64>,
    pub inserts: Vec<NewDimensionRow<A>>,
    pub unchanged: u64,
    pub close_date: NaiveDate,
}

impl<A> DimensionDelta<A> {
    pub fn empty(close_date: NaiveDate) -> Self {
        Self {
            closes: Vec::new(),
            inserts: Vec::new(),
            unchanged: 0,
            close_date,
        }
    }

    /// True when applying this delta would write nothing.
    pub fn is_noop(&self) -> bool {
        self.closes.is_empty() && self.inserts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(email: &str) -> SourceCustomer {
        SourceCustomer {
            customer_id: "CUST0001".to_string(),
            first_name: "Asha".to_string(),
            last_name: "Rao".to_string(),
            email: email.to_string(),
            city: "Pune".to_string(),
            state: "MH".to_string(),
            country: "India".to_string(),
            age_group: "26-35".to_string(),
        }
    }

    #[test]
    fn test_price_range_breakpoints() {
        assert_eq!(PriceRange::classify(0.0), PriceRange::Budget);
        assert_eq!(PriceRange::classify(49.99), PriceRange::Budget);
        assert_eq!(PriceRange::classify(50.0), PriceRange::MidRange);
        assert_eq!(PriceRange::classify(199.99), PriceRange::MidRange);
        assert_eq!(PriceRange::classify(200.0), PriceRange::Premium);
        assert_eq!(PriceRange::classify(999.0), PriceRange::Premium);
    }

    #[test]
    fn test_price_range_string_round_trip() {
        assert_eq!(PriceRange::MidRange.to_string(), "Mid-range");
        assert_eq!("Premium".parse::<PriceRange>().unwrap(), PriceRange::Premium);
        assert!("Luxury".parse::<PriceRange>().is_err());
    }

    #[test]
    fn test_customer_normalization() {
        let attrs = CustomerAttributes::from_source(&customer("Asha.Rao@Example.COM"));
        assert_eq!(attrs.full_name, "Asha Rao");
        assert_eq!(attrs.email, "asha.rao@example.com");
    }

    #[test]
    fn test_email_case_is_not_drift() {
        let upper = CustomerAttributes::from_source(&customer("ASHA@EXAMPLE.COM"));
        let lower = CustomerAttributes::from_source(&customer("asha@example.com"));
        assert_eq!(upper, lower);
    }

    #[test]
    fn test_price_tier_participates_in_comparison() {
        let source = SourceProduct {
            product_id: "PROD0001".to_string(),
            product_name: "Widget".to_string(),
            category: "Tools".to_string(),
            sub_category: "Hand Tools".to_string(),
            brand: "Acme".to_string(),
            price: 49.0,
            cost: 20.0,
        };
        let budget = ProductAttributes::from_source(&source);

        let mut repriced = source.clone();
        repriced.price = 51.0;
        let mid = ProductAttributes::from_source(&repriced);

        assert_eq!(budget.price_range, PriceRange::Budget);
        assert_eq!(mid.price_range, PriceRange::MidRange);
        assert_ne!(budget, mid);
    }
}
