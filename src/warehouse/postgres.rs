//! PostgreSQL-backed warehouse store and source repository.
//!
//! Every mutating method opens one transaction scoped to that call; an
//! early `?` return drops the transaction and rolls the stage back, so a
//! mid-stage failure never leaves a table half-updated. Batches are written
//! with `UNNEST` array inserts rather than per-row round trips.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;

use crate::config::DatabaseConfig;
use crate::error::{PipelineError, Result};
use crate::models::aggregate::{CustomerMetricsRow, DailySalesRow, ProductPerformanceRow};
use crate::models::dimension::{
    CustomerAttributes, DimensionDelta, DimensionVersion, ProductAttributes,
};
use crate::models::fact::SalesFactRow;
use crate::models::reference::{DateDimensionRow, PaymentMethodRow};
use crate::models::source::{
    SourceBatch, SourceCustomer, SourceLineItem, SourceProduct, SourceTransaction,
};
use crate::warehouse::store::{
    AggregateTables, DimensionKeySnapshot, SourceRepository, WarehouseStore,
};

/// Connection pool for the warehouse database.
pub async fn connect_pool(config: &DatabaseConfig) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
        .map_err(|e| PipelineError::database("connect", e.to_string()))
}

/// PostgreSQL implementation of [`WarehouseStore`].
#[derive(Debug, Clone)]
pub struct PgWarehouse {
    pool: PgPool,
    schema: String,
}

#[derive(FromRow)]
struct CustomerDimRecord {
    customer_key: i64,
    customer_id: String,
    full_name: String,
    email: String,
    city: String,
    state: String,
    country: String,
    age_group: String,
    effective_date: NaiveDate,
    end_date: Option<NaiveDate>,
    is_current: bool,
}

impl From<CustomerDimRecord> for DimensionVersion<CustomerAttributes> {
    fn from(row: CustomerDimRecord) -> Self {
        DimensionVersion {
            surrogate_key: row.customer_key,
            natural_key: row.customer_id,
            attributes: CustomerAttributes {
                full_name: row.full_name,
                email: row.email,
                city: row.city,
                state: row.state,
                country: row.country,
                age_group: row.age_group,
            },
            effective_date: row.effective_date,
            end_date: row.end_date,
            is_current: row.is_current,
        }
    }
}

#[derive(FromRow)]
struct ProductDimRecord {
    product_key: i64,
    product_id: String,
    product_name: String,
    category: String,
    sub_category: String,
    brand: String,
    price: f64,
    price_range: String,
    effective_date: NaiveDate,
    end_date: Option<NaiveDate>,
    is_current: bool,
}

impl TryFrom<ProductDimRecord> for DimensionVersion<ProductAttributes> {
    type Error = PipelineError;

    fn try_from(row: ProductDimRecord) -> Result<Self> {
        let price_range = row.price_range.parse().map_err(|e: String| {
            PipelineError::database("product_snapshot", e)
        })?;
        Ok(DimensionVersion {
            surrogate_key: row.product_key,
            natural_key: row.product_id,
            attributes: ProductAttributes {
                product_name: row.product_name,
                category: row.category,
                sub_category: row.sub_category,
                brand: row.brand,
                price: row.price,
                price_range,
            },
            effective_date: row.effective_date,
            end_date: row.end_date,
            is_current: row.is_current,
        })
    }
}

impl PgWarehouse {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }

    /// Apply the warehouse DDL (idempotent).
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(include_str!("../../migrations/0001_warehouse_schema.sql"))
            .execute(&self.pool)
            .await
            .map_err(|e| PipelineError::database("ensure_schema", e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl WarehouseStore for PgWarehouse {
    async fn customer_snapshot(
        &self,
    ) -> Result<HashMap<String, DimensionVersion<CustomerAttributes>>> {
        let sql = format!(
            "SELECT customer_key, customer_id, full_name, email, city, state, country, \
             age_group, effective_date, end_date, is_current \
             FROM {}.dim_customers WHERE is_current = TRUE",
            self.schema
        );
        let rows: Vec<CustomerDimRecord> =
            sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(DimensionVersion::from)
            .map(|v| (v.natural_key.clone(), v))
            .collect())
    }

    async fn product_snapshot(
        &self,
    ) -> Result<HashMap<String, DimensionVersion<ProductAttributes>>> {
        let sql = format!(
            "SELECT product_key, product_id, product_name, category, sub_category, brand, \
             price, price_range, effective_date, end_date, is_current \
             FROM {}.dim_products WHERE is_current = TRUE",
            self.schema
        );
        let rows: Vec<ProductDimRecord> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        let mut snapshot = HashMap::with_capacity(rows.len());
        for row in rows {
            let version = DimensionVersion::try_from(row)?;
            snapshot.insert(version.natural_key.clone(), version);
        }
        Ok(snapshot)
    }

    async fn apply_customer_delta(&self, delta: DimensionDelta<CustomerAttributes>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        if !delta.closes.is_empty() {
            let sql = format!(
                "UPDATE {}.dim_customers SET is_current = FALSE, end_date = $2 \
                 WHERE customer_key = ANY($1)",
                self.schema
            );
            sqlx::query(&sql)
                .bind(&delta.closes)
                .bind(delta.close_date)
                .execute(&mut *tx)
                .await?;
        }

        if !delta.inserts.is_empty() {
            let mut ids = Vec::with_capacity(delta.inserts.len());
            let mut names = Vec::with_capacity(delta.inserts.len());
            let mut emails = Vec::with_capacity(delta.inserts.len());
            let mut cities = Vec::with_capacity(delta.inserts.len());
            let mut states = Vec::with_capacity(delta.inserts.len());
            let mut countries = Vec::with_capacity(delta.inserts.len());
            let mut age_groups = Vec::with_capacity(delta.inserts.len());
            let mut effective_dates = Vec::with_capacity(delta.inserts.len());
            for row in delta.inserts {
                ids.push(row.natural_key);
                names.push(row.attributes.full_name);
                emails.push(row.attributes.email);
                cities.push(row.attributes.city);
                states.push(row.attributes.state);
                countries.push(row.attributes.country);
                age_groups.push(row.attributes.age_group);
                effective_dates.push(row.effective_date);
            }

            let sql = format!(
                "INSERT INTO {}.dim_customers \
                 (customer_id, full_name, email, city, state, country, age_group, \
                  effective_date, is_current) \
                 SELECT customer_id, full_name, email, city, state, country, age_group, \
                        effective_date, TRUE \
                 FROM UNNEST($1::text[], $2::text[], $3::text[], $4::text[], $5::text[], \
                             $6::text[], $7::text[], $8::date[]) \
                 AS t(customer_id, full_name, email, city, state, country, age_group, \
                      effective_date)",
                self.schema
            );
            sqlx::query(&sql)
                .bind(ids)
                .bind(names)
                .bind(emails)
                .bind(cities)
                .bind(states)
                .bind(countries)
                .bind(age_groups)
                .bind(effective_dates)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn apply_product_delta(&self, delta: DimensionDelta<ProductAttributes>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        if !delta.closes.is_empty() {
            let sql = format!(
                "UPDATE {}.dim_products SET is_current = FALSE, end_date = $2 \
                 WHERE product_key = ANY($1)",
                self.schema
            );
            sqlx::query(&sql)
                .bind(&delta.closes)
                .bind(delta.close_date)
                .execute(&mut *tx)
                .await?;
        }

        if !delta.inserts.is_empty() {
            let mut ids = Vec::with_capacity(delta.inserts.len());
            let mut names = Vec::with_capacity(delta.inserts.len());
            let mut categories = Vec::with_capacity(delta.inserts.len());
            let mut sub_categories = Vec::with_capacity(delta.inserts.len());
            let mut brands = Vec::with_capacity(delta.inserts.len());
            let mut prices = Vec::with_capacity(delta.inserts.len());
            let mut price_ranges = Vec::with_capacity(delta.inserts.len());
            let mut effective_dates = Vec::with_capacity(delta.inserts.len());
            for row in delta.inserts {
                ids.push(row.natural_key);
                names.push(row.attributes.product_name);
                categories.push(row.attributes.category);
                sub_categories.push(row.attributes.sub_category);
                brands.push(row.attributes.brand);
                prices.push(row.attributes.price);
                price_ranges.push(row.attributes.price_range.to_string());
                effective_dates.push(row.effective_date);
            }

            let sql = format!(
                "INSERT INTO {}.dim_products \
                 (product_id, product_name, category, sub_category, brand, price, \
                  price_range, effective_date, is_current) \
                 SELECT product_id, product_name, category, sub_category, brand, price, \
                        price_range, effective_date, TRUE \
                 FROM UNNEST($1::text[], $2::text[], $3::text[], $4::text[], $5::text[], \
                             $6::float8[], $7::text[], $8::date[]) \
                 AS t(product_id, product_name, category, sub_category, brand, price, \
                      price_range, effective_date)",
                self.schema
            );
            sqlx::query(&sql)
                .bind(ids)
                .bind(names)
                .bind(categories)
                .bind(sub_categories)
                .bind(brands)
                .bind(prices)
                .bind(price_ranges)
                .bind(effective_dates)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn replace_date_dimension(&self, rows: Vec<DateDimensionRow>) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let truncate = format!("TRUNCATE {}.dim_date RESTART IDENTITY CASCADE", self.schema);
        sqlx::query(&truncate).execute(&mut *tx).await?;

        if !rows.is_empty() {
            let mut date_keys = Vec::with_capacity(rows.len());
            let mut full_dates = Vec::with_capacity(rows.len());
            let mut years = Vec::with_capacity(rows.len());
            let mut quarters = Vec::with_capacity(rows.len());
            let mut months = Vec::with_capacity(rows.len());
            let mut days = Vec::with_capacity(rows.len());
            let mut month_names = Vec::with_capacity(rows.len());
            let mut day_names = Vec::with_capacity(rows.len());
            let mut weeks = Vec::with_capacity(rows.len());
            let mut weekends = Vec::with_capacity(rows.len());
            for row in &rows {
                date_keys.push(row.date_key);
                full_dates.push(row.full_date);
                years.push(row.year);
                quarters.push(row.quarter);
                months.push(row.month);
                days.push(row.day);
                month_names.push(row.month_name.clone());
                day_names.push(row.day_name.clone());
                weeks.push(row.week_of_year);
                weekends.push(row.is_weekend);
            }

            let sql = format!(
                "INSERT INTO {}.dim_date \
                 (date_key, full_date, year, quarter, month, day, month_name, day_name, \
                  week_of_year, is_weekend) \
                 SELECT * FROM UNNEST($1::int4[], $2::date[], $3::int4[], $4::int4[], \
                                      $5::int4[], $6::int4[], $7::text[], $8::text[], \
                                      $9::int4[], $10::bool[])",
                self.schema
            );
            sqlx::query(&sql)
                .bind(date_keys)
                .bind(full_dates)
                .bind(years)
                .bind(quarters)
                .bind(months)
                .bind(days)
                .bind(month_names)
                .bind(day_names)
                .bind(weeks)
                .bind(weekends)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(rows.len() as u64)
    }

    async fn replace_payment_methods(&self, rows: Vec<PaymentMethodRow>) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let truncate = format!(
            "TRUNCATE {}.dim_payment_method RESTART IDENTITY CASCADE",
            self.schema
        );
        sqlx::query(&truncate).execute(&mut *tx).await?;

        if !rows.is_empty() {
            let keys: Vec<i64> = rows.iter().map(|r| r.payment_method_key).collect();
            let names: Vec<String> = rows.iter().map(|r| r.payment_method_name.clone()).collect();
            let types: Vec<String> = rows.iter().map(|r| r.payment_type.clone()).collect();

            let sql = format!(
                "INSERT INTO {}.dim_payment_method \
                 (payment_method_key, payment_method_name, payment_type) \
                 SELECT * FROM UNNEST($1::int8[], $2::text[], $3::text[])",
                self.schema
            );
            sqlx::query(&sql)
                .bind(keys)
                .bind(names)
                .bind(types)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(rows.len() as u64)
    }

    async fn dimension_keys(&self) -> Result<DimensionKeySnapshot> {
        let customers_sql = format!(
            "SELECT customer_id, customer_key FROM {}.dim_customers WHERE is_current = TRUE",
            self.schema
        );
        let customers: Vec<(String, i64)> = sqlx::query_as(&customers_sql)
            .fetch_all(&self.pool)
            .await?;

        let products_sql = format!(
            "SELECT product_id, product_key FROM {}.dim_products WHERE is_current = TRUE",
            self.schema
        );
        let products: Vec<(String, i64)> = sqlx::query_as(&products_sql)
            .fetch_all(&self.pool)
            .await?;

        let payments_sql = format!(
            "SELECT payment_method_name, payment_method_key FROM {}.dim_payment_method",
            self.schema
        );
        let payments: Vec<(String, i64)> = sqlx::query_as(&payments_sql)
            .fetch_all(&self.pool)
            .await?;

        let dates_sql = format!("SELECT date_key FROM {}.dim_date", self.schema);
        let date_keys: Vec<i32> = sqlx::query_scalar(&dates_sql).fetch_all(&self.pool).await?;

        Ok(DimensionKeySnapshot {
            customers: customers.into_iter().collect(),
            products: products.into_iter().collect(),
            payment_methods: payments.into_iter().collect(),
            date_keys: date_keys.into_iter().collect(),
        })
    }

    async fn replace_facts(&self, rows: Vec<SalesFactRow>) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let truncate = format!("TRUNCATE {}.fact_sales RESTART IDENTITY", self.schema);
        sqlx::query(&truncate).execute(&mut *tx).await?;

        if !rows.is_empty() {
            let mut date_keys = Vec::with_capacity(rows.len());
            let mut customer_keys = Vec::with_capacity(rows.len());
            let mut product_keys = Vec::with_capacity(rows.len());
            let mut payment_keys = Vec::with_capacity(rows.len());
            let mut transaction_ids = Vec::with_capacity(rows.len());
            let mut quantities = Vec::with_capacity(rows.len());
            let mut unit_prices = Vec::with_capacity(rows.len());
            let mut discounts = Vec::with_capacity(rows.len());
            let mut line_totals = Vec::with_capacity(rows.len());
            let mut profits = Vec::with_capacity(rows.len());
            let mut created_ats: Vec<DateTime<Utc>> = Vec::with_capacity(rows.len());
            for row in &rows {
                date_keys.push(row.date_key);
                customer_keys.push(row.customer_key);
                product_keys.push(row.product_key);
                payment_keys.push(row.payment_method_key);
                transaction_ids.push(row.transaction_id.clone());
                quantities.push(row.quantity);
                unit_prices.push(row.unit_price);
                discounts.push(row.discount_amount);
                line_totals.push(row.line_total);
                profits.push(row.profit);
                created_ats.push(row.created_at);
            }

            let sql = format!(
                "INSERT INTO {}.fact_sales \
                 (date_key, customer_key, product_key, payment_method_key, transaction_id, \
                  quantity, unit_price, discount_amount, line_total, profit, created_at) \
                 SELECT * FROM UNNEST($1::int4[], $2::int8[], $3::int8[], $4::int8[], \
                                      $5::text[], $6::int4[], $7::float8[], $8::float8[], \
                                      $9::float8[], $10::float8[], $11::timestamptz[])",
                self.schema
            );
            sqlx::query(&sql)
                .bind(date_keys)
                .bind(customer_keys)
                .bind(product_keys)
                .bind(payment_keys)
                .bind(transaction_ids)
                .bind(quantities)
                .bind(unit_prices)
                .bind(discounts)
                .bind(line_totals)
                .bind(profits)
                .bind(created_ats)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(rows.len() as u64)
    }

    async fn refresh_aggregates(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let s = &self.schema;

        for table in ["agg_daily_sales", "agg_product_performance", "agg_customer_metrics"] {
            let truncate = format!("TRUNCATE {s}.{table}");
            sqlx::query(&truncate).execute(&mut *tx).await?;
        }

        let daily = format!(
            "INSERT INTO {s}.agg_daily_sales \
             (date_key, transaction_count, total_revenue, total_profit, unique_customers) \
             SELECT date_key, COUNT(DISTINCT transaction_id), SUM(line_total), SUM(profit), \
                    COUNT(DISTINCT customer_key) \
             FROM {s}.fact_sales GROUP BY date_key"
        );
        sqlx::query(&daily).execute(&mut *tx).await?;

        let products = format!(
            "INSERT INTO {s}.agg_product_performance \
             (product_key, units_sold, total_revenue, total_profit, avg_discount_rate) \
             SELECT product_key, SUM(quantity), SUM(line_total), SUM(profit), \
                    AVG(discount_amount * 100.0 / NULLIF(line_total, 0)) \
             FROM {s}.fact_sales GROUP BY product_key"
        );
        sqlx::query(&products).execute(&mut *tx).await?;

        let customers = format!(
            "INSERT INTO {s}.agg_customer_metrics \
             (customer_key, transaction_count, total_spend, avg_order_value, last_purchase_at) \
             SELECT customer_key, COUNT(DISTINCT transaction_id), SUM(line_total), \
                    AVG(line_total), MAX(created_at) \
             FROM {s}.fact_sales GROUP BY customer_key"
        );
        sqlx::query(&customers).execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn aggregate_tables(&self) -> Result<AggregateTables> {
        let daily_sql = format!(
            "SELECT date_key, transaction_count, total_revenue, total_profit, unique_customers \
             FROM {}.agg_daily_sales ORDER BY date_key",
            self.schema
        );
        let daily_sales: Vec<DailySalesRow> =
            sqlx::query_as(&daily_sql).fetch_all(&self.pool).await?;

        let product_sql = format!(
            "SELECT product_key, units_sold, total_revenue, total_profit, avg_discount_rate \
             FROM {}.agg_product_performance ORDER BY product_key",
            self.schema
        );
        let product_performance: Vec<ProductPerformanceRow> =
            sqlx::query_as(&product_sql).fetch_all(&self.pool).await?;

        let customer_sql = format!(
            "SELECT customer_key, transaction_count, total_spend, avg_order_value, \
             last_purchase_at FROM {}.agg_customer_metrics ORDER BY customer_key",
            self.schema
        );
        let customer_metrics: Vec<CustomerMetricsRow> =
            sqlx::query_as(&customer_sql).fetch_all(&self.pool).await?;

        Ok(AggregateTables {
            daily_sales,
            product_performance,
            customer_metrics,
        })
    }
}

/// PostgreSQL implementation of [`SourceRepository`] over the staging schema.
#[derive(Debug, Clone)]
pub struct PgSourceRepository {
    pool: PgPool,
    schema: String,
}

impl PgSourceRepository {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }
}

#[async_trait]
impl SourceRepository for PgSourceRepository {
    async fn fetch_batch(&self) -> Result<SourceBatch> {
        let customers_sql = format!(
            "SELECT customer_id, first_name, last_name, email, city, state, country, age_group \
             FROM {}.customers",
            self.schema
        );
        let customers: Vec<SourceCustomer> = sqlx::query_as(&customers_sql)
            .fetch_all(&self.pool)
            .await?;

        let products_sql = format!(
            "SELECT product_id, product_name, category, sub_category, brand, price, cost \
             FROM {}.products",
            self.schema
        );
        let products: Vec<SourceProduct> = sqlx::query_as(&products_sql)
            .fetch_all(&self.pool)
            .await?;

        let transactions_sql = format!(
            "SELECT transaction_id, customer_id, transaction_date, payment_method \
             FROM {}.transactions",
            self.schema
        );
        let transactions: Vec<SourceTransaction> = sqlx::query_as(&transactions_sql)
            .fetch_all(&self.pool)
            .await?;

        let items_sql = format!(
            "SELECT transaction_id, product_id, quantity, unit_price, discount_percentage \
             FROM {}.transaction_items",
            self.schema
        );
        let line_items: Vec<SourceLineItem> = sqlx::query_as(&items_sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(SourceBatch {
            customers,
            products,
            transactions,
            line_items,
        })
    }
}
