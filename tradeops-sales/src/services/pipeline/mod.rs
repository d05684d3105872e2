//! Batch ingestion pipeline
//!
//! Coordinates a batch through upload, parse, fix, and transform. Every
//! stage is triggered over HTTP and starts by claiming its entry state in
//! the database, so two concurrent triggers of the same stage resolve to
//! one worker and one 409.
//!
//! # State progression
//! uploaded -> parsing -> parsed -> cleaning -> cleaned -> transforming -> done
//!
//! Stage modules: parse (SKU extraction), fixes (operator corrections),
//! transform (ledger build + cost allocation). Upload lives here because
//! it creates the batch rather than advancing one.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tradeops_common::events::{EventBus, OpsEvent};
use tradeops_common::time::pacific_today;
use tradeops_common::{Error, Result};
use uuid::Uuid;

use crate::db;
use crate::models::{BatchStatus, EtlBatch};
use crate::services::allocator::CostAllocator;
use crate::services::normalizer;

mod fixes;
mod parse;
mod transform;

pub use parse::ParseOutcome;
pub use transform::TransformOutcome;

/// Upload payload: both export files plus the batch's allocation ratios
#[derive(Debug, Clone, Deserialize)]
pub struct UploadRequest {
    pub seller: String,
    #[serde(default)]
    pub fifo_ratio_re: f64,
    #[serde(default)]
    pub fifo_ratio_cr: f64,
    #[serde(default)]
    pub fifo_ratio_cc: f64,
    /// Raw lines of the transaction export
    pub transactions: Vec<String>,
    /// Raw lines of the earnings export
    pub earnings: Vec<String>,
}

/// What an accepted upload reports back
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub batch_id: Uuid,
    /// Transaction rows written
    pub trans_count: usize,
    /// Transaction rows skipped as natural-key duplicates
    pub trans_duplicates: usize,
    /// Earnings rows written
    pub earn_count: usize,
    /// Earnings rows skipped as natural-key duplicates
    pub earn_duplicates: usize,
}

/// The ingestion pipeline service
pub struct EtlPipeline {
    db: SqlitePool,
    event_bus: EventBus,
    allocator: Arc<dyn CostAllocator>,
    strict_catalog: bool,
}

impl EtlPipeline {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        allocator: Arc<dyn CostAllocator>,
        strict_catalog: bool,
    ) -> Self {
        Self {
            db,
            event_bus,
            allocator,
            strict_catalog,
        }
    }

    /// Validate and persist one paired export upload
    ///
    /// Uploads are all or nothing: any malformed row, future-dated row, or
    /// date-range mismatch rejects the whole request and no batch exists
    /// afterwards.
    pub async fn upload(&self, request: UploadRequest) -> Result<UploadOutcome> {
        let seller = request.seller.trim().to_string();
        if seller.is_empty() {
            return Err(Error::InvalidInput("seller is required".to_string()));
        }
        for (name, value) in [
            ("fifo_ratio_re", request.fifo_ratio_re),
            ("fifo_ratio_cr", request.fifo_ratio_cr),
            ("fifo_ratio_cc", request.fifo_ratio_cc),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidInput(format!(
                    "{} must be a non-negative number",
                    name
                )));
            }
        }

        let transactions = normalizer::parse_transactions(&request.transactions)?;
        let earnings = normalizer::parse_earnings(&request.earnings)?;

        let Some((trans_min, trans_max)) =
            normalizer::date_bounds(transactions.iter().map(|r| r.transaction_date.date()))
        else {
            return Err(Error::InvalidInput(
                "transaction export has no data rows".to_string(),
            ));
        };
        let Some((earn_min, earn_max)) =
            normalizer::date_bounds(earnings.iter().map(|r| r.transaction_date.date()))
        else {
            return Err(Error::InvalidInput(
                "earnings export has no data rows".to_string(),
            ));
        };

        let today = pacific_today();
        if trans_max > today {
            return Err(Error::InvalidInput(format!(
                "transaction export contains future-dated rows ({} is after {})",
                trans_max, today
            )));
        }
        if earn_max > today {
            return Err(Error::InvalidInput(format!(
                "earnings export contains future-dated rows ({} is after {})",
                earn_max, today
            )));
        }
        if (trans_min, trans_max) != (earn_min, earn_max) {
            return Err(Error::InvalidInput(format!(
                "export date ranges differ: transactions cover {} to {}, earnings cover {} to {}",
                trans_min, trans_max, earn_min, earn_max
            )));
        }

        let batch = EtlBatch::new(
            seller.clone(),
            request.fifo_ratio_re,
            request.fifo_ratio_cr,
            request.fifo_ratio_cc,
        );
        db::batches::insert_batch(&self.db, &batch).await?;

        let trans_counts =
            db::raw::insert_transactions(&self.db, batch.batch_id, &seller, &transactions).await?;
        let earn_counts =
            db::raw::insert_earnings(&self.db, batch.batch_id, &seller, &earnings).await?;
        db::batches::update_counts(
            &self.db,
            batch.batch_id,
            trans_counts.inserted as i64,
            earn_counts.inserted as i64,
        )
        .await?;

        tracing::info!(
            batch_id = %batch.batch_id,
            seller = %seller,
            trans_count = trans_counts.inserted,
            trans_duplicates = trans_counts.duplicates,
            earn_count = earn_counts.inserted,
            earn_duplicates = earn_counts.duplicates,
            "Batch uploaded"
        );
        self.event_bus.emit_lossy(OpsEvent::BatchCreated {
            batch_id: batch.batch_id,
            seller,
            timestamp: Utc::now(),
        });

        Ok(UploadOutcome {
            batch_id: batch.batch_id,
            trans_count: trans_counts.inserted,
            trans_duplicates: trans_counts.duplicates,
            earn_count: earn_counts.inserted,
            earn_duplicates: earn_counts.duplicates,
        })
    }

    /// Load a batch or report 404
    pub(crate) async fn load_batch_or_404(&self, batch_id: Uuid) -> Result<EtlBatch> {
        db::batches::load_batch(&self.db, batch_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("batch {} not found", batch_id)))
    }

    /// Claim a state transition and broadcast it
    ///
    /// `old` is the status observed just before the claim; it only feeds
    /// the event payload and the conflict message.
    pub(crate) async fn advance(
        &self,
        batch_id: Uuid,
        old: BatchStatus,
        from: &[BatchStatus],
        to: BatchStatus,
        message: &str,
    ) -> Result<()> {
        let claimed = db::batches::claim_status(&self.db, batch_id, from, to, message).await?;
        if !claimed {
            return Err(Error::Conflict(format!(
                "batch {} cannot enter {} (status was {})",
                batch_id, to, old
            )));
        }

        tracing::info!(batch_id = %batch_id, from = %old, to = %to, "Batch state changed");
        self.event_bus.emit_lossy(OpsEvent::BatchStateChanged {
            batch_id,
            old_status: old.to_string(),
            new_status: to.to_string(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Raise progress and broadcast it
    pub(crate) async fn progress(&self, batch_id: Uuid, progress: i64, message: &str) -> Result<()> {
        db::batches::update_progress(&self.db, batch_id, progress, message).await?;
        self.event_bus.emit_lossy(OpsEvent::BatchProgress {
            batch_id,
            progress,
            stage_message: message.to_string(),
            timestamp: Utc::now(),
        });
        Ok(())
    }
}
