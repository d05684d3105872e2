//! Batch persistence and state claims
//!
//! Stage transitions go through `claim_status`: a conditional UPDATE that
//! only fires while the batch sits in one of the caller's allowed entry
//! states. Zero rows affected means another trigger got there first, and
//! the caller reports a conflict instead of double-running the stage.

use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tradeops_common::{Error, Result};
use uuid::Uuid;

use super::parse_utc;
use crate::models::{BatchStatus, EtlBatch};

/// Persist a freshly created batch
pub async fn insert_batch(pool: &SqlitePool, batch: &EtlBatch) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO etl_batches (
            batch_id, seller, status, progress, stage_message,
            fifo_ratio_re, fifo_ratio_cr, fifo_ratio_cc,
            trans_count, earn_count, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(batch.batch_id.to_string())
    .bind(&batch.seller)
    .bind(batch.status.as_str())
    .bind(batch.progress)
    .bind(&batch.stage_message)
    .bind(batch.fifo_ratio_re)
    .bind(batch.fifo_ratio_cr)
    .bind(batch.fifo_ratio_cc)
    .bind(batch.trans_count)
    .bind(batch.earn_count)
    .bind(batch.created_at.to_rfc3339())
    .bind(batch.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a batch by id
pub async fn load_batch(pool: &SqlitePool, batch_id: Uuid) -> Result<Option<EtlBatch>> {
    let row = sqlx::query("SELECT * FROM etl_batches WHERE batch_id = ?")
        .bind(batch_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|r| batch_from_row(&r)).transpose()
}

/// Atomically move a batch into `to` if it currently sits in one of the
/// `from` states
///
/// Returns false when the batch was in none of the entry states, which
/// callers surface as a 409. Progress only ever rises: the new state's
/// floor is applied through MAX.
pub async fn claim_status(
    pool: &SqlitePool,
    batch_id: Uuid,
    from: &[BatchStatus],
    to: BatchStatus,
    message: &str,
) -> Result<bool> {
    let placeholders = vec!["?"; from.len()].join(", ");
    let sql = format!(
        "UPDATE etl_batches
         SET status = ?, progress = MAX(progress, ?), stage_message = ?, updated_at = ?
         WHERE batch_id = ? AND status IN ({})",
        placeholders
    );

    let mut query = sqlx::query(&sql)
        .bind(to.as_str())
        .bind(to.progress_floor())
        .bind(message)
        .bind(Utc::now().to_rfc3339())
        .bind(batch_id.to_string());
    for status in from {
        query = query.bind(status.as_str());
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

/// Raise batch progress and refresh the stage message
///
/// MAX keeps progress monotone even if updates arrive out of order.
pub async fn update_progress(
    pool: &SqlitePool,
    batch_id: Uuid,
    progress: i64,
    message: &str,
) -> Result<()> {
    sqlx::query(
        "UPDATE etl_batches
         SET progress = MAX(progress, ?), stage_message = ?, updated_at = ?
         WHERE batch_id = ?",
    )
    .bind(progress)
    .bind(message)
    .bind(Utc::now().to_rfc3339())
    .bind(batch_id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Record how many raw rows the upload persisted
pub async fn update_counts(
    pool: &SqlitePool,
    batch_id: Uuid,
    trans_count: i64,
    earn_count: i64,
) -> Result<()> {
    sqlx::query(
        "UPDATE etl_batches SET trans_count = ?, earn_count = ?, updated_at = ? WHERE batch_id = ?",
    )
    .bind(trans_count)
    .bind(earn_count)
    .bind(Utc::now().to_rfc3339())
    .bind(batch_id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Drop a batch into the error state with a failure description
pub async fn mark_error(pool: &SqlitePool, batch_id: Uuid, message: &str) -> Result<()> {
    sqlx::query(
        "UPDATE etl_batches SET status = 'error', stage_message = ?, updated_at = ? WHERE batch_id = ?",
    )
    .bind(message)
    .bind(Utc::now().to_rfc3339())
    .bind(batch_id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Most recently created batches, newest first
pub async fn recent_batches(pool: &SqlitePool, limit: i64) -> Result<Vec<EtlBatch>> {
    let rows = sqlx::query("SELECT * FROM etl_batches ORDER BY created_at DESC LIMIT ?")
        .bind(limit)
        .fetch_all(pool)
        .await?;

    rows.iter().map(batch_from_row).collect()
}

/// Fail every batch a crashed process left mid-stage
///
/// Runs once at startup. Returns the ids that were moved to error so the
/// caller can log them.
pub async fn recover_interrupted(pool: &SqlitePool) -> Result<Vec<Uuid>> {
    let rows = sqlx::query(
        "SELECT batch_id FROM etl_batches WHERE status IN ('parsing', 'cleaning', 'transforming')",
    )
    .fetch_all(pool)
    .await?;

    let mut ids = Vec::with_capacity(rows.len());
    for row in &rows {
        let raw: String = row.get("batch_id");
        let id = Uuid::parse_str(&raw)
            .map_err(|e| Error::Internal(format!("bad batch_id {:?}: {}", raw, e)))?;
        ids.push(id);
    }

    if !ids.is_empty() {
        sqlx::query(
            "UPDATE etl_batches
             SET status = 'error', stage_message = ?, updated_at = ?
             WHERE status IN ('parsing', 'cleaning', 'transforming')",
        )
        .bind("Interrupted by service restart")
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await?;
    }

    Ok(ids)
}

fn batch_from_row(row: &SqliteRow) -> Result<EtlBatch> {
    let batch_id: String = row.get("batch_id");
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(EtlBatch {
        batch_id: Uuid::parse_str(&batch_id)
            .map_err(|e| Error::Internal(format!("bad batch_id {:?}: {}", batch_id, e)))?,
        seller: row.get("seller"),
        status: BatchStatus::parse(&status)
            .ok_or_else(|| Error::Internal(format!("unknown batch status {:?}", status)))?,
        progress: row.get("progress"),
        stage_message: row.get("stage_message"),
        fifo_ratio_re: row.get("fifo_ratio_re"),
        fifo_ratio_cr: row.get("fifo_ratio_cr"),
        fifo_ratio_cc: row.get("fifo_ratio_cc"),
        trans_count: row.get("trans_count"),
        earn_count: row.get("earn_count"),
        created_at: parse_utc("created_at", &created_at)?,
        updated_at: parse_utc("updated_at", &updated_at)?,
    })
}
