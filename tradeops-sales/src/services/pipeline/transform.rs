//! Transform stage: build the cleaned ledger and allocate inventory costs

use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tradeops_common::events::OpsEvent;
use tradeops_common::Result;
use uuid::Uuid;

use crate::db;
use crate::models::{
    Action, BatchStatus, CleanedTransaction, EtlBatch, RawEarning, SkuSlot, MAX_SKU_SLOTS,
};
use crate::services::allocator::{AllocationOutcome, AllocationRequest};

use super::EtlPipeline;

const TRANSFORM_ENTRY: &[BatchStatus] = &[
    BatchStatus::Cleaned,
    BatchStatus::Transforming,
    BatchStatus::Error,
];

/// What the transform stage reports back
#[derive(Debug, Clone, Serialize)]
pub struct TransformOutcome {
    pub batch_id: Uuid,
    /// Ledger rows committed for this batch
    pub cleaned_count: usize,
    /// Ledger rows per action label
    pub action_counts: BTreeMap<String, i64>,
    /// Units handed to the cost allocator
    pub allocation: AllocationOutcome,
}

impl EtlPipeline {
    /// Rebuild the batch's slice of the cleaned ledger
    ///
    /// Idempotent: the batch's previous ledger rows are deleted before the
    /// new ones are written, so a rerun after failure never double-counts.
    /// Any error inside the stage parks the batch in `error` with the
    /// failure message and broadcasts `BatchFailed`.
    pub async fn transform(&self, batch_id: Uuid) -> Result<TransformOutcome> {
        let batch = self.load_batch_or_404(batch_id).await?;
        self.advance(
            batch_id,
            batch.status,
            TRANSFORM_ENTRY,
            BatchStatus::Transforming,
            "Building cleaned ledger",
        )
        .await?;

        match self.run_transform(&batch).await {
            Ok(outcome) => {
                let message = format!("{} ledger rows committed", outcome.cleaned_count);
                self.advance(
                    batch_id,
                    BatchStatus::Transforming,
                    &[BatchStatus::Transforming],
                    BatchStatus::Done,
                    &message,
                )
                .await?;
                self.event_bus.emit_lossy(OpsEvent::BatchCompleted {
                    batch_id,
                    cleaned_count: outcome.cleaned_count as u64,
                    timestamp: Utc::now(),
                });
                tracing::info!(
                    batch_id = %batch_id,
                    cleaned_count = outcome.cleaned_count,
                    fifo_out = outcome.allocation.fifo_out_count,
                    fifo_return = outcome.allocation.fifo_return_count,
                    "Transform stage complete"
                );
                Ok(outcome)
            }
            Err(e) => {
                let message = format!("Transform failed: {}", e);
                tracing::error!(batch_id = %batch_id, error = %e, "Transform stage failed");
                db::batches::mark_error(&self.db, batch_id, &message).await?;
                self.event_bus.emit_lossy(OpsEvent::BatchFailed {
                    batch_id,
                    error_message: message,
                    timestamp: Utc::now(),
                });
                Err(e)
            }
        }
    }

    async fn run_transform(&self, batch: &EtlBatch) -> Result<TransformOutcome> {
        let rows = db::raw::transactions_for_batch(&self.db, batch.batch_id).await?;
        let mut items = db::raw::items_for_batch(&self.db, batch.batch_id).await?;
        let earnings = db::raw::earnings_for_batch(&self.db, batch.batch_id).await?;

        // Keyed on (order, item); when an order and its refund both carry
        // earnings rows the earlier export row wins.
        let mut earnings_by_key: HashMap<(String, String), &RawEarning> = HashMap::new();
        for earning in &earnings {
            earnings_by_key
                .entry((earning.order_number.clone(), earning.item_id.clone()))
                .or_insert(earning);
        }

        self.progress(batch.batch_id, 85, "Classifying transactions").await?;

        let mut cleaned = Vec::new();
        let mut action_counts: BTreeMap<String, i64> = BTreeMap::new();
        let mut out_quantity = 0i64;
        let mut return_quantity = 0i64;

        for row in &rows {
            let Some(action) = row.kind().action() else {
                continue;
            };

            let slots: Vec<SkuSlot> = items
                .remove(&row.id)
                .unwrap_or_default()
                .into_iter()
                .take(MAX_SKU_SLOTS)
                .map(|item| SkuSlot {
                    sku: item.sku,
                    quantity: item.quantity,
                })
                .collect();

            match action {
                Action::Sale => out_quantity += row.quantity,
                Action::Return => return_quantity += row.quantity.abs(),
                _ => {}
            }
            *action_counts.entry(action.label().to_string()).or_insert(0) += 1;

            let earning = earnings_by_key.get(&(row.order_number.clone(), row.item_id.clone()));
            cleaned.push(CleanedTransaction {
                id: 0,
                batch_id: batch.batch_id,
                seller: row.seller.clone(),
                order_number: row.order_number.clone(),
                item_id: row.item_id.clone(),
                action,
                ledger_date: row.transaction_date.date(),
                quantity: row.quantity,
                amount: row.gross_amount,
                slots,
                fees: earning.map(|e| e.fees.abs()).unwrap_or_default(),
                shipping: earning.map(|e| e.shipping.abs()).unwrap_or_default(),
            });
        }

        let cleaned_count = db::ledger::replace_batch(&self.db, batch.batch_id, &cleaned).await?;
        self.progress(batch.batch_id, 90, "Ledger committed; allocating inventory costs")
            .await?;

        let request = AllocationRequest {
            batch_id: batch.batch_id,
            seller: batch.seller.clone(),
            fifo_ratio_re: batch.fifo_ratio_re,
            fifo_ratio_cr: batch.fifo_ratio_cr,
            fifo_ratio_cc: batch.fifo_ratio_cc,
            out_quantity,
            return_quantity,
        };
        let allocation = self.allocator.allocate(&request).await?;

        Ok(TransformOutcome {
            batch_id: batch.batch_id,
            cleaned_count,
            action_counts,
            allocation,
        })
    }
}
