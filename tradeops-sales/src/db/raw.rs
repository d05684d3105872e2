//! Raw transaction and earnings row persistence
//!
//! Upload inserts go through INSERT OR IGNORE against the natural key
//! (seller, order number, item id, transaction type, transaction date),
//! so re-uploading an overlapping export never duplicates rows.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::collections::HashMap;
use tradeops_common::{Error, Result};
use uuid::Uuid;

use super::{parse_decimal, parse_naive_datetime, DATETIME_FORMAT};
use crate::models::{FeeAmounts, NewEarning, NewTransaction, RawEarning, RawTransaction, RawTransactionItem, ShipAmounts};

/// Outcome of a bulk insert: rows written vs rows already present
#[derive(Debug, Clone, Copy, Default)]
pub struct InsertCounts {
    pub inserted: usize,
    pub duplicates: usize,
}

/// Insert normalized transaction rows for a batch
pub async fn insert_transactions(
    pool: &SqlitePool,
    batch_id: Uuid,
    seller: &str,
    rows: &[NewTransaction],
) -> Result<InsertCounts> {
    let mut counts = InsertCounts::default();
    let created_at = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;

    for row in rows {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO raw_transactions (
                batch_id, seller, order_number, item_id, title, custom_label,
                quantity, gross_amount, transaction_type, transaction_date, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(batch_id.to_string())
        .bind(seller)
        .bind(&row.order_number)
        .bind(&row.item_id)
        .bind(&row.title)
        .bind(&row.custom_label)
        .bind(row.quantity)
        .bind(row.gross_amount.to_string())
        .bind(&row.transaction_type)
        .bind(row.transaction_date.format(DATETIME_FORMAT).to_string())
        .bind(&created_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            counts.duplicates += 1;
        } else {
            counts.inserted += 1;
        }
    }

    tx.commit().await?;
    Ok(counts)
}

/// Insert normalized earnings rows for a batch
pub async fn insert_earnings(
    pool: &SqlitePool,
    batch_id: Uuid,
    seller: &str,
    rows: &[NewEarning],
) -> Result<InsertCounts> {
    let mut counts = InsertCounts::default();
    let created_at = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;

    for row in rows {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO raw_earnings (
                batch_id, seller, order_number, item_id, transaction_type, transaction_date,
                quantity, gross_amount,
                fee_final_value, fee_fixed, fee_international, fee_ad,
                ship_regular, ship_fine, ship_overpay, ship_return_label,
                created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(batch_id.to_string())
        .bind(seller)
        .bind(&row.order_number)
        .bind(&row.item_id)
        .bind(&row.transaction_type)
        .bind(row.transaction_date.format(DATETIME_FORMAT).to_string())
        .bind(row.quantity)
        .bind(row.gross_amount.to_string())
        .bind(row.fees.final_value.to_string())
        .bind(row.fees.fixed.to_string())
        .bind(row.fees.international.to_string())
        .bind(row.fees.ad.to_string())
        .bind(row.shipping.regular.to_string())
        .bind(row.shipping.fine.to_string())
        .bind(row.shipping.overpay.to_string())
        .bind(row.shipping.return_label.to_string())
        .bind(&created_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            counts.duplicates += 1;
        } else {
            counts.inserted += 1;
        }
    }

    tx.commit().await?;
    Ok(counts)
}

/// Rows the parse stage works on: order-bearing kinds with a non-blank
/// custom label
pub async fn order_bearing_transactions(
    pool: &SqlitePool,
    batch_id: Uuid,
) -> Result<Vec<RawTransaction>> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM raw_transactions
        WHERE batch_id = ?
          AND lower(transaction_type) IN ('order', 'refund', 'claim')
          AND TRIM(custom_label) <> ''
        ORDER BY id
        "#,
    )
    .bind(batch_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(transaction_from_row).collect()
}

/// Every raw transaction row of a batch, in insertion order
pub async fn transactions_for_batch(
    pool: &SqlitePool,
    batch_id: Uuid,
) -> Result<Vec<RawTransaction>> {
    let rows = sqlx::query("SELECT * FROM raw_transactions WHERE batch_id = ? ORDER BY id")
        .bind(batch_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(transaction_from_row).collect()
}

/// Find one transaction row, scoped to its batch
pub async fn find_transaction(
    pool: &SqlitePool,
    batch_id: Uuid,
    transaction_id: i64,
) -> Result<Option<RawTransaction>> {
    let row = sqlx::query("SELECT * FROM raw_transactions WHERE batch_id = ? AND id = ?")
        .bind(batch_id.to_string())
        .bind(transaction_id)
        .fetch_optional(pool)
        .await?;

    row.map(|r| transaction_from_row(&r)).transpose()
}

/// Replace the resolved SKU lines under a transaction
///
/// Parse runs are re-enterable, so the old lines go away first.
pub async fn replace_items(
    pool: &SqlitePool,
    transaction_id: i64,
    items: &[RawTransactionItem],
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM raw_transaction_items WHERE transaction_id = ?")
        .bind(transaction_id)
        .execute(&mut *tx)
        .await?;

    for item in items {
        sqlx::query(
            "INSERT INTO raw_transaction_items (transaction_id, sku, quantity, unit_price)
             VALUES (?, ?, ?, ?)",
        )
        .bind(transaction_id)
        .bind(&item.sku)
        .bind(item.quantity)
        .bind(item.unit_price.to_string())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// All resolved lines of a batch, grouped by transaction id
pub async fn items_for_batch(
    pool: &SqlitePool,
    batch_id: Uuid,
) -> Result<HashMap<i64, Vec<RawTransactionItem>>> {
    let rows = sqlx::query(
        r#"
        SELECT i.* FROM raw_transaction_items i
        JOIN raw_transactions t ON t.id = i.transaction_id
        WHERE t.batch_id = ?
        ORDER BY i.transaction_id, i.id
        "#,
    )
    .bind(batch_id.to_string())
    .fetch_all(pool)
    .await?;

    let mut grouped: HashMap<i64, Vec<RawTransactionItem>> = HashMap::new();
    for row in &rows {
        let item = item_from_row(row)?;
        grouped.entry(item.transaction_id).or_default().push(item);
    }
    Ok(grouped)
}

/// Find the line under a transaction matching a SKU, case-insensitively
pub async fn item_for_sku(
    pool: &SqlitePool,
    transaction_id: i64,
    sku: &str,
) -> Result<Option<RawTransactionItem>> {
    let row = sqlx::query(
        "SELECT * FROM raw_transaction_items
         WHERE transaction_id = ? AND upper(sku) = upper(?)",
    )
    .bind(transaction_id)
    .bind(sku)
    .fetch_optional(pool)
    .await?;

    row.map(|r| item_from_row(&r)).transpose()
}

/// Rewrite one resolved line in place
pub async fn update_item(
    pool: &SqlitePool,
    item_id: i64,
    sku: &str,
    quantity: i64,
    unit_price: Decimal,
) -> Result<()> {
    sqlx::query(
        "UPDATE raw_transaction_items SET sku = ?, quantity = ?, unit_price = ? WHERE id = ?",
    )
    .bind(sku)
    .bind(quantity)
    .bind(unit_price.to_string())
    .bind(item_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Append a resolved line to a transaction
pub async fn append_item(pool: &SqlitePool, item: &RawTransactionItem) -> Result<()> {
    sqlx::query(
        "INSERT INTO raw_transaction_items (transaction_id, sku, quantity, unit_price)
         VALUES (?, ?, ?, ?)",
    )
    .bind(item.transaction_id)
    .bind(&item.sku)
    .bind(item.quantity)
    .bind(item.unit_price.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Every earnings row of a batch
pub async fn earnings_for_batch(pool: &SqlitePool, batch_id: Uuid) -> Result<Vec<RawEarning>> {
    let rows = sqlx::query("SELECT * FROM raw_earnings WHERE batch_id = ? ORDER BY id")
        .bind(batch_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(earning_from_row).collect()
}

fn transaction_from_row(row: &SqliteRow) -> Result<RawTransaction> {
    let batch_id: String = row.get("batch_id");
    let gross_amount: String = row.get("gross_amount");
    let transaction_date: String = row.get("transaction_date");

    Ok(RawTransaction {
        id: row.get("id"),
        batch_id: Uuid::parse_str(&batch_id)
            .map_err(|e| Error::Internal(format!("bad batch_id {:?}: {}", batch_id, e)))?,
        seller: row.get("seller"),
        order_number: row.get("order_number"),
        item_id: row.get("item_id"),
        title: row.get("title"),
        custom_label: row.get("custom_label"),
        quantity: row.get("quantity"),
        gross_amount: parse_decimal("gross_amount", &gross_amount)?,
        transaction_type: row.get("transaction_type"),
        transaction_date: parse_naive_datetime("transaction_date", &transaction_date)?,
    })
}

fn item_from_row(row: &SqliteRow) -> Result<RawTransactionItem> {
    let unit_price: String = row.get("unit_price");

    Ok(RawTransactionItem {
        id: row.get("id"),
        transaction_id: row.get("transaction_id"),
        sku: row.get("sku"),
        quantity: row.get("quantity"),
        unit_price: parse_decimal("unit_price", &unit_price)?,
    })
}

fn earning_from_row(row: &SqliteRow) -> Result<RawEarning> {
    let batch_id: String = row.get("batch_id");
    let gross_amount: String = row.get("gross_amount");
    let transaction_date: String = row.get("transaction_date");

    let fee = |column: &str| -> Result<Decimal> {
        let value: String = row.get(column);
        parse_decimal(column, &value)
    };

    Ok(RawEarning {
        id: row.get("id"),
        batch_id: Uuid::parse_str(&batch_id)
            .map_err(|e| Error::Internal(format!("bad batch_id {:?}: {}", batch_id, e)))?,
        seller: row.get("seller"),
        order_number: row.get("order_number"),
        item_id: row.get("item_id"),
        transaction_type: row.get("transaction_type"),
        transaction_date: parse_naive_datetime("transaction_date", &transaction_date)?,
        quantity: row.get("quantity"),
        gross_amount: parse_decimal("gross_amount", &gross_amount)?,
        fees: FeeAmounts {
            final_value: fee("fee_final_value")?,
            fixed: fee("fee_fixed")?,
            international: fee("fee_international")?,
            ad: fee("fee_ad")?,
        },
        shipping: ShipAmounts {
            regular: fee("ship_regular")?,
            fine: fee("ship_fine")?,
            overpay: fee("ship_overpay")?,
            return_label: fee("ship_return_label")?,
        },
    })
}
