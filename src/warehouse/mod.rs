//! # Warehouse Load Engine
//!
//! Star-schema warehouse loading: SCD Type 2 versioned dimensions, full
//! reference-dimension reloads, a wholesale-replaced fact table and rebuilt
//! summary tables, sequenced by a coordinator against one store.
//!
//! ## Core Components
//!
//! - **DimensionLoader**: batch compare-and-upsert under the SCD Type 2
//!   contract; reference dimensions by truncate-and-reinsert
//! - **FactLoader**: line-item join against current dimension keys with
//!   measure derivation and referential-integrity enforcement
//! - **AggregateRefresher**: summary tables recomputed from the fact table
//! - **WarehouseLoadCoordinator**: stage sequencing, one transactional
//!   unit per table-level operation
//! - **WarehouseStore / SourceRepository**: persistence seams with
//!   PostgreSQL and in-memory implementations

pub mod aggregates;
pub mod coordinator;
pub mod dimension_loader;
pub mod fact_loader;
pub mod memory;
pub mod postgres;
pub mod store;

pub use aggregates::{
    compute_customer_metrics, compute_daily_sales, compute_product_performance, AggregateRefresher,
};
pub use coordinator::{WarehouseLoadCoordinator, WarehouseLoadSummary};
pub use dimension_loader::{plan_dimension_updates, DimensionLoadStats, DimensionLoader};
pub use fact_loader::{build_fact_rows, FactLoader};
pub use memory::{MemorySourceRepository, MemoryWarehouse};
pub use postgres::{connect_pool, PgSourceRepository, PgWarehouse};
pub use store::{AggregateTables, DimensionKeySnapshot, SourceRepository, WarehouseStore};
