//! Product catalog reads
//!
//! The catalog is maintained by the inventory service; this service only
//! reads it for SKU validation, suggestions, and unit costs.

use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};
use std::collections::{HashMap, HashSet};
use tradeops_common::Result;

use super::parse_decimal;

/// Upper-cased SKUs of every active product
pub async fn active_sku_set(pool: &SqlitePool) -> Result<HashSet<String>> {
    let rows = sqlx::query("SELECT sku FROM products WHERE active = 1")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| row.get::<String, _>("sku").to_uppercase())
        .collect())
}

/// Unit cost per upper-cased SKU, for COGS
pub async fn unit_cost_map(pool: &SqlitePool) -> Result<HashMap<String, Decimal>> {
    let rows = sqlx::query("SELECT sku, unit_cost FROM products")
        .fetch_all(pool)
        .await?;

    let mut costs = HashMap::with_capacity(rows.len());
    for row in &rows {
        let sku: String = row.get("sku");
        let unit_cost: String = row.get("unit_cost");
        costs.insert(sku.to_uppercase(), parse_decimal("unit_cost", &unit_cost)?);
    }
    Ok(costs)
}

/// Seed or update one product row; used by tests and ops tooling
pub async fn upsert_product(
    pool: &SqlitePool,
    sku: &str,
    title: &str,
    unit_cost: Decimal,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO products (sku, title, unit_cost, active) VALUES (?, ?, ?, 1)
        ON CONFLICT(sku) DO UPDATE SET
            title = excluded.title,
            unit_cost = excluded.unit_cost,
            active = 1
        "#,
    )
    .bind(sku)
    .bind(title)
    .bind(unit_cost.to_string())
    .execute(pool)
    .await?;

    Ok(())
}
