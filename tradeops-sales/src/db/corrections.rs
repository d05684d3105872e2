//! Correction memory persistence
//!
//! One row per (custom label, bad SKU) pair. Re-confirming a pair always
//! overwrites the remembered target, so the latest operator decision wins.

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tradeops_common::Result;

use super::parse_utc;
use crate::models::SkuCorrection;

/// Load the whole correction memory, oldest confirmation first
pub async fn all_corrections(pool: &SqlitePool) -> Result<Vec<SkuCorrection>> {
    let rows = sqlx::query("SELECT * FROM sku_corrections ORDER BY confirmed_at")
        .fetch_all(pool)
        .await?;

    rows.iter().map(correction_from_row).collect()
}

/// Insert or overwrite a remembered fix
pub async fn upsert_correction(pool: &SqlitePool, correction: &SkuCorrection) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sku_corrections (
            custom_label, bad_sku, correct_sku, correct_qty, confirmed_by, confirmed_at
        ) VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(custom_label, bad_sku) DO UPDATE SET
            correct_sku = excluded.correct_sku,
            correct_qty = excluded.correct_qty,
            confirmed_by = excluded.confirmed_by,
            confirmed_at = excluded.confirmed_at
        "#,
    )
    .bind(&correction.custom_label)
    .bind(&correction.bad_sku)
    .bind(&correction.correct_sku)
    .bind(correction.correct_qty)
    .bind(&correction.confirmed_by)
    .bind(correction.confirmed_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Point lookup for one remembered pair
pub async fn find_correction(
    pool: &SqlitePool,
    custom_label: &str,
    bad_sku: &str,
) -> Result<Option<SkuCorrection>> {
    let row = sqlx::query("SELECT * FROM sku_corrections WHERE custom_label = ? AND bad_sku = ?")
        .bind(custom_label)
        .bind(bad_sku)
        .fetch_optional(pool)
        .await?;

    row.map(|r| correction_from_row(&r)).transpose()
}

fn correction_from_row(row: &SqliteRow) -> Result<SkuCorrection> {
    let confirmed_at: String = row.get("confirmed_at");

    Ok(SkuCorrection {
        custom_label: row.get("custom_label"),
        bad_sku: row.get("bad_sku"),
        correct_sku: row.get("correct_sku"),
        correct_qty: row.get("correct_qty"),
        confirmed_by: row.get("confirmed_by"),
        confirmed_at: parse_utc("confirmed_at", &confirmed_at)?,
    })
}
