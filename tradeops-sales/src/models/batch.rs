//! Ingestion batch state machine
//!
//! A batch is one paired upload of a transaction export and an earnings
//! export. It walks a fixed ladder of states; each stage trigger claims
//! its entry state in the database so concurrent triggers cannot
//! double-run a stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle states of an ingestion batch
///
/// The happy path is `uploaded -> parsing -> parsed -> cleaning ->
/// cleaned -> transforming -> done`. Any stage can drop the batch into
/// `error`; re-triggering the failed stage resumes from there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// Raw rows persisted, waiting for SKU extraction
    Uploaded,
    /// SKU extraction in progress
    Parsing,
    /// Extraction finished, operator fixes may be outstanding
    Parsed,
    /// Operator fixes being applied
    Cleaning,
    /// Fixes applied, ready for ledger transform
    Cleaned,
    /// Ledger rows being built and cost allocation running
    Transforming,
    /// Ledger committed and cost allocation acknowledged
    Done,
    /// A stage failed; stage_message carries the reason
    Error,
}

impl BatchStatus {
    /// Stable lowercase token stored in the database and used in events
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Uploaded => "uploaded",
            BatchStatus::Parsing => "parsing",
            BatchStatus::Parsed => "parsed",
            BatchStatus::Cleaning => "cleaning",
            BatchStatus::Cleaned => "cleaned",
            BatchStatus::Transforming => "transforming",
            BatchStatus::Done => "done",
            BatchStatus::Error => "error",
        }
    }

    /// Parse the stored token back into a status
    pub fn parse(value: &str) -> Option<BatchStatus> {
        match value {
            "uploaded" => Some(BatchStatus::Uploaded),
            "parsing" => Some(BatchStatus::Parsing),
            "parsed" => Some(BatchStatus::Parsed),
            "cleaning" => Some(BatchStatus::Cleaning),
            "cleaned" => Some(BatchStatus::Cleaned),
            "transforming" => Some(BatchStatus::Transforming),
            "done" => Some(BatchStatus::Done),
            "error" => Some(BatchStatus::Error),
            _ => None,
        }
    }

    /// Minimum progress value a batch carries once it enters this state
    ///
    /// Progress is monotone within a batch: stages only ever raise it.
    pub fn progress_floor(&self) -> i64 {
        match self {
            BatchStatus::Uploaded => 10,
            BatchStatus::Parsing => 30,
            BatchStatus::Parsed => 50,
            BatchStatus::Cleaning => 55,
            BatchStatus::Cleaned => 60,
            BatchStatus::Transforming => 80,
            BatchStatus::Done => 100,
            BatchStatus::Error => 0,
        }
    }

    /// States that indicate a stage was mid-flight (used for crash recovery)
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            BatchStatus::Parsing | BatchStatus::Cleaning | BatchStatus::Transforming
        )
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ingestion batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlBatch {
    /// Batch UUID assigned at upload
    pub batch_id: Uuid,
    /// Seller account the exports belong to
    pub seller: String,
    /// Current lifecycle state
    pub status: BatchStatus,
    /// Overall progress, 0-100, monotone per batch
    pub progress: i64,
    /// Operator-facing description of the current stage or failure
    pub stage_message: String,
    /// FIFO allocation ratio for the retail pool
    pub fifo_ratio_re: f64,
    /// FIFO allocation ratio for the credit pool
    pub fifo_ratio_cr: f64,
    /// FIFO allocation ratio for the cash pool
    pub fifo_ratio_cc: f64,
    /// Raw transaction rows persisted for this batch
    pub trans_count: i64,
    /// Raw earnings rows persisted for this batch
    pub earn_count: i64,
    /// When the batch was created
    pub created_at: DateTime<Utc>,
    /// Last state or progress change
    pub updated_at: DateTime<Utc>,
}

impl EtlBatch {
    /// Create a new batch in the uploaded state
    pub fn new(seller: String, fifo_ratio_re: f64, fifo_ratio_cr: f64, fifo_ratio_cc: f64) -> Self {
        let now = Utc::now();
        Self {
            batch_id: Uuid::new_v4(),
            seller,
            status: BatchStatus::Uploaded,
            progress: BatchStatus::Uploaded.progress_floor(),
            stage_message: "Upload received".to_string(),
            fifo_ratio_re,
            fifo_ratio_cr,
            fifo_ratio_cc,
            trans_count: 0,
            earn_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
