//! Fix stage: apply operator SKU corrections and grow the correction memory

use chrono::Utc;
use tradeops_common::Result;
use uuid::Uuid;

use crate::db;
use crate::models::{BatchStatus, CorrectionMap, RawTransactionItem, SkuCorrection, SkuFix};
use crate::services::resolver::SkuResolver;

use super::EtlPipeline;

const FIX_ENTRY: &[BatchStatus] = &[
    BatchStatus::Parsed,
    BatchStatus::Cleaning,
    BatchStatus::Cleaned,
    BatchStatus::Error,
];

impl EtlPipeline {
    /// Apply a set of operator fixes to the batch's extracted items
    ///
    /// Each accepted fix also lands in the correction memory keyed on
    /// (custom_label, bad_sku), so the next batch carrying the same label
    /// resolves without asking again. Fixes naming an unknown target SKU
    /// or a transaction outside the batch are skipped, not fatal.
    pub async fn apply_fixes(
        &self,
        batch_id: Uuid,
        fixes: &[SkuFix],
        confirmed_by: &str,
    ) -> Result<usize> {
        let batch = self.load_batch_or_404(batch_id).await?;
        self.advance(
            batch_id,
            batch.status,
            FIX_ENTRY,
            BatchStatus::Cleaning,
            "Applying operator SKU fixes",
        )
        .await?;

        let catalog = db::catalog::active_sku_set(&self.db).await?;
        let corrections = CorrectionMap::default();
        let resolver = SkuResolver::new(&catalog, &corrections, self.strict_catalog);

        let mut applied = 0usize;
        for fix in fixes {
            if fix.correct_qty <= 0 {
                tracing::warn!(
                    batch_id = %batch_id,
                    transaction_id = fix.transaction_id,
                    correct_qty = fix.correct_qty,
                    "Skipping fix: quantity must be positive"
                );
                continue;
            }
            if !resolver.catalog_accepts(&fix.correct_sku) {
                tracing::warn!(
                    batch_id = %batch_id,
                    transaction_id = fix.transaction_id,
                    correct_sku = %fix.correct_sku,
                    "Skipping fix: target SKU is not in the catalog"
                );
                continue;
            }
            let Some(transaction) =
                db::raw::find_transaction(&self.db, batch_id, fix.transaction_id).await?
            else {
                tracing::warn!(
                    batch_id = %batch_id,
                    transaction_id = fix.transaction_id,
                    "Skipping fix: transaction is not in this batch"
                );
                continue;
            };

            let canonical = fix.correct_sku.trim().to_uppercase();
            let unit_price =
                RawTransactionItem::compute_unit_price(transaction.gross_amount, fix.correct_qty);

            match db::raw::item_for_sku(&self.db, transaction.id, &fix.bad_sku).await? {
                Some(item) => {
                    db::raw::update_item(&self.db, item.id, &canonical, fix.correct_qty, unit_price)
                        .await?;
                }
                None => {
                    let item = RawTransactionItem::new(
                        transaction.id,
                        canonical.clone(),
                        fix.correct_qty,
                        unit_price,
                    );
                    db::raw::append_item(&self.db, &item).await?;
                }
            }

            let correction = SkuCorrection {
                custom_label: fix.custom_label.clone(),
                bad_sku: fix.bad_sku.clone(),
                correct_sku: canonical,
                correct_qty: fix.correct_qty,
                confirmed_by: confirmed_by.to_string(),
                confirmed_at: Utc::now(),
            };
            db::corrections::upsert_correction(&self.db, &correction).await?;
            applied += 1;
        }

        let message = format!("{} fixes applied", applied);
        self.advance(
            batch_id,
            BatchStatus::Cleaning,
            &[BatchStatus::Cleaning],
            BatchStatus::Cleaned,
            &message,
        )
        .await?;

        tracing::info!(batch_id = %batch_id, applied, submitted = fixes.len(), "Fix stage complete");
        Ok(applied)
    }
}
