//! # Data Model Layer
//!
//! Typed records for everything that crosses the pipeline core's boundaries:
//! staging source rows, versioned and reference dimension rows, fact rows,
//! aggregate rows and the persisted execution report.

pub mod aggregate;
pub mod dimension;
pub mod fact;
pub mod reference;
pub mod report;
pub mod source;

pub use aggregate::{CustomerMetricsRow, DailySalesRow, ProductPerformanceRow};
pub use dimension::{
    CustomerAttributes, DimensionDelta, DimensionVersion, NewDimensionRow, PriceRange,
    ProductAttributes,
};
pub use fact::{round2, SalesFactRow};
pub use reference::{
    build_date_dimension, date_key_for, payment_method_rows, DateDimensionRow, PaymentMethodRow,
    DEFAULT_PAYMENT_METHODS,
};
pub use report::{
    DataQualitySummary, ExecutionReport, NamedStepExecution, RunStatus, StepExecution, StepStatus,
};
pub use source::{SourceBatch, SourceCustomer, SourceLineItem, SourceProduct, SourceTransaction};
