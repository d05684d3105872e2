//! Database access for the sales ingestion service
//!
//! All money columns are TEXT holding decimal strings; SQLite REAL never
//! touches a monetary value. Timestamps are RFC 3339 UTC, export
//! wall-clock times and ledger dates are plain `YYYY-MM-DD[ HH:MM:SS]`.

pub mod batches;
pub mod catalog;
pub mod corrections;
pub mod ledger;
pub mod raw;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use std::path::Path;

pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

/// Initialize database connection pool
///
/// Connects to the service database in the root folder, creating the
/// file and the schema on first run.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the service tables if they don't exist
///
/// Public so integration tests can run the schema against an in-memory
/// database.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS etl_batches (
            batch_id TEXT PRIMARY KEY,
            seller TEXT NOT NULL,
            status TEXT NOT NULL,
            progress INTEGER NOT NULL DEFAULT 0,
            stage_message TEXT NOT NULL DEFAULT '',
            fifo_ratio_re REAL NOT NULL DEFAULT 0,
            fifo_ratio_cr REAL NOT NULL DEFAULT 0,
            fifo_ratio_cc REAL NOT NULL DEFAULT 0,
            trans_count INTEGER NOT NULL DEFAULT 0,
            earn_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS raw_transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            batch_id TEXT NOT NULL,
            seller TEXT NOT NULL,
            order_number TEXT NOT NULL,
            item_id TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            custom_label TEXT NOT NULL DEFAULT '',
            quantity INTEGER NOT NULL DEFAULT 0,
            gross_amount TEXT NOT NULL DEFAULT '0',
            transaction_type TEXT NOT NULL,
            transaction_date TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (seller, order_number, item_id, transaction_type, transaction_date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS raw_transaction_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            transaction_id INTEGER NOT NULL REFERENCES raw_transactions(id),
            sku TEXT NOT NULL,
            quantity INTEGER NOT NULL DEFAULT 0,
            unit_price TEXT NOT NULL DEFAULT '0'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_raw_items_transaction
         ON raw_transaction_items(transaction_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS raw_earnings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            batch_id TEXT NOT NULL,
            seller TEXT NOT NULL,
            order_number TEXT NOT NULL,
            item_id TEXT NOT NULL,
            transaction_type TEXT NOT NULL,
            transaction_date TEXT NOT NULL,
            quantity INTEGER NOT NULL DEFAULT 0,
            gross_amount TEXT NOT NULL DEFAULT '0',
            fee_final_value TEXT NOT NULL DEFAULT '0',
            fee_fixed TEXT NOT NULL DEFAULT '0',
            fee_international TEXT NOT NULL DEFAULT '0',
            fee_ad TEXT NOT NULL DEFAULT '0',
            ship_regular TEXT NOT NULL DEFAULT '0',
            ship_fine TEXT NOT NULL DEFAULT '0',
            ship_overpay TEXT NOT NULL DEFAULT '0',
            ship_return_label TEXT NOT NULL DEFAULT '0',
            created_at TEXT NOT NULL,
            UNIQUE (seller, order_number, item_id, transaction_type, transaction_date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sku_corrections (
            custom_label TEXT NOT NULL,
            bad_sku TEXT NOT NULL,
            correct_sku TEXT NOT NULL,
            correct_qty INTEGER NOT NULL DEFAULT 1,
            confirmed_by TEXT NOT NULL DEFAULT '',
            confirmed_at TEXT NOT NULL,
            PRIMARY KEY (custom_label, bad_sku)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            sku TEXT PRIMARY KEY,
            title TEXT NOT NULL DEFAULT '',
            unit_cost TEXT NOT NULL DEFAULT '0',
            active INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cleaned_transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            batch_id TEXT NOT NULL,
            seller TEXT NOT NULL,
            order_number TEXT NOT NULL,
            item_id TEXT NOT NULL,
            action TEXT NOT NULL,
            ledger_date TEXT NOT NULL,
            quantity INTEGER NOT NULL DEFAULT 0,
            amount TEXT NOT NULL DEFAULT '0',
            slots TEXT NOT NULL DEFAULT '[]',
            fee_final_value TEXT NOT NULL DEFAULT '0',
            fee_fixed TEXT NOT NULL DEFAULT '0',
            fee_international TEXT NOT NULL DEFAULT '0',
            fee_ad TEXT NOT NULL DEFAULT '0',
            ship_regular TEXT NOT NULL DEFAULT '0',
            ship_fine TEXT NOT NULL DEFAULT '0',
            ship_overpay TEXT NOT NULL DEFAULT '0',
            ship_return_label TEXT NOT NULL DEFAULT '0',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_cleaned_seller_date
         ON cleaned_transactions(seller, ledger_date)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_cleaned_batch ON cleaned_transactions(batch_id)",
    )
    .execute(pool)
    .await?;

    tracing::info!(
        "Database tables initialized (etl_batches, raw_transactions, raw_transaction_items, \
         raw_earnings, sku_corrections, products, cleaned_transactions)"
    );

    Ok(())
}

/// Parse a TEXT decimal column; corrupt values surface as internal errors
pub(crate) fn parse_decimal(column: &str, value: &str) -> tradeops_common::Result<Decimal> {
    value.parse().map_err(|e| {
        tradeops_common::Error::Internal(format!("bad decimal in {}: {:?} ({})", column, value, e))
    })
}

/// Parse an RFC 3339 UTC timestamp column
pub(crate) fn parse_utc(column: &str, value: &str) -> tradeops_common::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            tradeops_common::Error::Internal(format!(
                "bad timestamp in {}: {:?} ({})",
                column, value, e
            ))
        })
}

/// Parse an export wall-clock timestamp column
pub(crate) fn parse_naive_datetime(
    column: &str,
    value: &str,
) -> tradeops_common::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT).map_err(|e| {
        tradeops_common::Error::Internal(format!(
            "bad datetime in {}: {:?} ({})",
            column, value, e
        ))
    })
}

/// Parse a ledger date column
pub(crate) fn parse_naive_date(column: &str, value: &str) -> tradeops_common::Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|e| {
        tradeops_common::Error::Internal(format!("bad date in {}: {:?} ({})", column, value, e))
    })
}
