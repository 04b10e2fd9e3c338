//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;

use pipeline_core::error::PipelineError;
use pipeline_core::models::source::{
    SourceBatch, SourceCustomer, SourceLineItem, SourceProduct, SourceTransaction,
};
use pipeline_core::orchestration::{StepTask, TaskOutput};

/// Task that plays back a scripted sequence of outcomes, then succeeds.
pub struct ScriptedTask {
    outcomes: Mutex<VecDeque<Result<TaskOutput, PipelineError>>>,
    calls: AtomicU32,
}

impl ScriptedTask {
    pub fn new(outcomes: Vec<Result<TaskOutput, PipelineError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(vec![Ok(TaskOutput::empty())])
    }

    pub fn failing_permanently(reason: &str) -> Self {
        Self::new(vec![Err(PipelineError::StepFailed {
            step: "scripted".to_string(),
            reason: reason.to_string(),
        })])
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StepTask for ScriptedTask {
    async fn execute(&self) -> Result<TaskOutput, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcomes
            .lock()
            .await
            .pop_front()
            .unwrap_or(Ok(TaskOutput::empty()))
    }
}

pub fn customer(id: &str, first: &str, last: &str, city: &str) -> SourceCustomer {
    SourceCustomer {
        customer_id: id.to_string(),
        first_name: first.to_string(),
        last_name: last.to_string(),
        email: format!("{}.{}@example.com", first.to_lowercase(), last.to_lowercase()),
        city: city.to_string(),
        state: "MH".to_string(),
        country: "India".to_string(),
        age_group: "26-35".to_string(),
    }
}

pub fn product(id: &str, name: &str, price: f64, cost: f64) -> SourceProduct {
    SourceProduct {
        product_id: id.to_string(),
        product_name: name.to_string(),
        category: "Electronics".to_string(),
        sub_category: "Audio".to_string(),
        brand: "Acme".to_string(),
        price,
        cost,
    }
}

pub fn transaction(id: &str, customer_id: &str, date: NaiveDate, payment: &str) -> SourceTransaction {
    SourceTransaction {
        transaction_id: id.to_string(),
        customer_id: customer_id.to_string(),
        transaction_date: date,
        payment_method: payment.to_string(),
    }
}

pub fn line_item(
    transaction_id: &str,
    product_id: &str,
    quantity: i32,
    unit_price: f64,
    discount: f64,
) -> SourceLineItem {
    SourceLineItem {
        transaction_id: transaction_id.to_string(),
        product_id: product_id.to_string(),
        quantity,
        unit_price,
        discount_percentage: discount,
    }
}

/// Two customers, two products, two transactions, three line items — all
/// dated inside June 2023.
pub fn sample_batch() -> SourceBatch {
    SourceBatch {
        customers: vec![
            customer("CUST0001", "Asha", "Rao", "Pune"),
            customer("CUST0002", "Ravi", "Iyer", "Chennai"),
        ],
        products: vec![
            product("PROD0001", "Earbuds", 19.99, 12.5),
            product("PROD0002", "Soundbar", 250.0, 180.0),
        ],
        transactions: vec![
            transaction(
                "TXN00001",
                "CUST0001",
                NaiveDate::from_ymd_opt(2023, 6, 15).unwrap(),
                "UPI",
            ),
            transaction(
                "TXN00002",
                "CUST0002",
                NaiveDate::from_ymd_opt(2023, 6, 16).unwrap(),
                "Credit Card",
            ),
        ],
        line_items: vec![
            line_item("TXN00001", "PROD0001", 3, 19.99, 10.0),
            line_item("TXN00001", "PROD0002", 1, 250.0, 0.0),
            line_item("TXN00002", "PROD0001", 2, 19.99, 5.0),
        ],
    }
}
