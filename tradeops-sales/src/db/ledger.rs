//! Cleaned ledger persistence and dashboard reads

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::collections::BTreeMap;
use tradeops_common::{Error, Result};
use uuid::Uuid;

use super::{parse_decimal, parse_naive_date, DATE_FORMAT};
use crate::models::{Action, CleanedTransaction, FeeAmounts, ShipAmounts, SkuSlot};

/// Replace a batch's ledger rows with a freshly transformed set
///
/// Transform is re-enterable; deleting first keeps reruns from doubling
/// the ledger.
pub async fn replace_batch(
    pool: &SqlitePool,
    batch_id: Uuid,
    rows: &[CleanedTransaction],
) -> Result<usize> {
    let created_at = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM cleaned_transactions WHERE batch_id = ?")
        .bind(batch_id.to_string())
        .execute(&mut *tx)
        .await?;

    for row in rows {
        let slots = serde_json::to_string(&row.slots)
            .map_err(|e| Error::Internal(format!("failed to serialize slots: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO cleaned_transactions (
                batch_id, seller, order_number, item_id, action, ledger_date,
                quantity, amount, slots,
                fee_final_value, fee_fixed, fee_international, fee_ad,
                ship_regular, ship_fine, ship_overpay, ship_return_label,
                created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(batch_id.to_string())
        .bind(&row.seller)
        .bind(&row.order_number)
        .bind(&row.item_id)
        .bind(row.action.as_str())
        .bind(row.ledger_date.format(DATE_FORMAT).to_string())
        .bind(row.quantity)
        .bind(row.amount.to_string())
        .bind(slots)
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
    }

    tx.commit().await?;
    Ok(rows.len())
}

/// Ledger rows inside an inclusive Pacific date range
///
/// An empty seller list means every seller. Dates are stored as
/// `YYYY-MM-DD`, so lexicographic BETWEEN is chronological.
pub async fn rows_in_range(
    pool: &SqlitePool,
    start: NaiveDate,
    end: NaiveDate,
    sellers: &[String],
) -> Result<Vec<CleanedTransaction>> {
    let mut sql = String::from(
        "SELECT * FROM cleaned_transactions WHERE ledger_date BETWEEN ? AND ?",
    );
    if !sellers.is_empty() {
        let placeholders = vec!["?"; sellers.len()].join(", ");
        sql.push_str(&format!(" AND seller IN ({})", placeholders));
    }
    sql.push_str(" ORDER BY ledger_date, id");

    let mut query = sqlx::query(&sql)
        .bind(start.format(DATE_FORMAT).to_string())
        .bind(end.format(DATE_FORMAT).to_string());
    for seller in sellers {
        query = query.bind(seller);
    }

    let rows = query.fetch_all(pool).await?;
    rows.iter().map(cleaned_from_row).collect()
}

/// Headline numbers for the dashboard landing page
#[derive(Debug, Clone, Default, Serialize)]
pub struct LedgerStats {
    /// Raw transaction rows across all batches
    pub raw_count: i64,
    /// Cleaned ledger rows across all batches
    pub cleaned_count: i64,
    /// Earliest ledger date, if any rows exist
    pub min_date: Option<NaiveDate>,
    /// Latest ledger date, if any rows exist
    pub max_date: Option<NaiveDate>,
    /// Cleaned row count per action label
    pub action_counts: BTreeMap<String, i64>,
}

/// Compute global ledger statistics
pub async fn ledger_stats(pool: &SqlitePool) -> Result<LedgerStats> {
    let raw_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM raw_transactions")
        .fetch_one(pool)
        .await?;

    let cleaned_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cleaned_transactions")
        .fetch_one(pool)
        .await?;

    let bounds = sqlx::query(
        "SELECT MIN(ledger_date) AS min_date, MAX(ledger_date) AS max_date
         FROM cleaned_transactions",
    )
    .fetch_one(pool)
    .await?;

    let min_date: Option<String> = bounds.get("min_date");
    let max_date: Option<String> = bounds.get("max_date");

    let action_rows =
        sqlx::query("SELECT action, COUNT(*) AS n FROM cleaned_transactions GROUP BY action")
            .fetch_all(pool)
            .await?;

    let mut action_counts = BTreeMap::new();
    for row in &action_rows {
        let token: String = row.get("action");
        let action = Action::parse(&token)
            .ok_or_else(|| Error::Internal(format!("unknown action {:?}", token)))?;
        action_counts.insert(action.label().to_string(), row.get::<i64, _>("n"));
    }

    Ok(LedgerStats {
        raw_count,
        cleaned_count,
        min_date: min_date
            .map(|d| parse_naive_date("min_date", &d))
            .transpose()?,
        max_date: max_date
            .map(|d| parse_naive_date("max_date", &d))
            .transpose()?,
        action_counts,
    })
}

fn cleaned_from_row(row: &SqliteRow) -> Result<CleanedTransaction> {
    let batch_id: String = row.get("batch_id");
    let action: String = row.get("action");
    let ledger_date: String = row.get("ledger_date");
    let amount: String = row.get("amount");
    let slots: String = row.get("slots");

    let money = |column: &str| -> Result<rust_decimal::Decimal> {
        let value: String = row.get(column);
        parse_decimal(column, &value)
    };

    Ok(CleanedTransaction {
        id: row.get("id"),
        batch_id: Uuid::parse_str(&batch_id)
            .map_err(|e| Error::Internal(format!("bad batch_id {:?}: {}", batch_id, e)))?,
        seller: row.get("seller"),
        order_number: row.get("order_number"),
        item_id: row.get("item_id"),
        action: Action::parse(&action)
            .ok_or_else(|| Error::Internal(format!("unknown action {:?}", action)))?,
        ledger_date: parse_naive_date("ledger_date", &ledger_date)?,
        quantity: row.get("quantity"),
        amount: parse_decimal("amount", &amount)?,
        slots: serde_json::from_str::<Vec<SkuSlot>>(&slots)
            .map_err(|e| Error::Internal(format!("bad slots JSON: {}", e)))?,
        fees: FeeAmounts {
            final_value: money("fee_final_value")?,
            fixed: money("fee_fixed")?,
            international: money("fee_international")?,
            ad: money("fee_ad")?,
        },
        shipping: ShipAmounts {
            regular: money("ship_regular")?,
            fine: money("ship_fine")?,
            overpay: money("ship_overpay")?,
            return_label: money("ship_return_label")?,
        },
    })
}
