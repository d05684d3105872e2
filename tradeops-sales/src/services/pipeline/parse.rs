//! Parse stage: resolve custom labels into catalog SKU lines

use serde::Serialize;
use tradeops_common::Result;
use uuid::Uuid;

use crate::db;
use crate::models::{BatchStatus, CorrectionMap, PendingSkuItem, RawTransactionItem};
use crate::services::resolver::SkuResolver;

use super::EtlPipeline;

/// Rows between progress updates
const PROGRESS_EVERY: usize = 50;

const PARSE_ENTRY: &[BatchStatus] = &[
    BatchStatus::Uploaded,
    BatchStatus::Parsing,
    BatchStatus::Parsed,
    BatchStatus::Error,
];

/// What the parse stage reports back
#[derive(Debug, Clone, Serialize)]
pub struct ParseOutcome {
    pub batch_id: Uuid,
    /// Order-bearing rows examined
    pub total_rows: usize,
    /// Rows fully resolved (catalog hits and auto-fixes)
    pub parsed_ok: usize,
    /// Rows still waiting on an operator
    pub needs_fix: usize,
    /// One entry per unresolved or auto-fixed SKU
    pub pending_items: Vec<PendingSkuItem>,
}

impl EtlPipeline {
    /// Extract SKU lines from every order-bearing transaction in the batch
    ///
    /// Idempotent: rerunning replaces each row's extracted items, so a
    /// catalog or correction update between runs changes the outcome
    /// without stacking duplicates.
    pub async fn parse(&self, batch_id: Uuid) -> Result<ParseOutcome> {
        let batch = self.load_batch_or_404(batch_id).await?;
        self.advance(
            batch_id,
            batch.status,
            PARSE_ENTRY,
            BatchStatus::Parsing,
            "Extracting SKUs from custom labels",
        )
        .await?;

        let catalog = db::catalog::active_sku_set(&self.db).await?;
        if catalog.is_empty() && !self.strict_catalog {
            tracing::warn!(
                batch_id = %batch_id,
                "Product catalog is empty; accepting every extracted SKU"
            );
        }
        let corrections =
            CorrectionMap::from_rows(&db::corrections::all_corrections(&self.db).await?);
        let resolver = SkuResolver::new(&catalog, &corrections, self.strict_catalog);

        let rows = db::raw::order_bearing_transactions(&self.db, batch_id).await?;
        let total_rows = rows.len();

        let mut parsed_ok = 0usize;
        let mut needs_fix = 0usize;
        let mut pending_items = Vec::new();

        for (index, row) in rows.iter().enumerate() {
            let resolution = resolver.resolve_label(row.id, &row.custom_label, row.gross_amount);

            let items: Vec<RawTransactionItem> = resolution
                .lines
                .iter()
                .map(|line| {
                    RawTransactionItem::new(row.id, line.sku.clone(), line.quantity, line.unit_price)
                })
                .collect();
            db::raw::replace_items(&self.db, row.id, &items).await?;

            if resolution.needs_fix {
                needs_fix += 1;
            } else {
                parsed_ok += 1;
            }
            pending_items.extend(resolution.pending);

            let done = index + 1;
            if done % PROGRESS_EVERY == 0 && done < total_rows {
                let progress = 30 + (20 * done as i64) / total_rows.max(1) as i64;
                self.progress(
                    batch_id,
                    progress,
                    &format!("Resolving SKUs ({}/{})", done, total_rows),
                )
                .await?;
            }
        }

        let message = format!("{} rows resolved, {} need fixes", parsed_ok, needs_fix);
        self.advance(
            batch_id,
            BatchStatus::Parsing,
            &[BatchStatus::Parsing],
            BatchStatus::Parsed,
            &message,
        )
        .await?;

        tracing::info!(
            batch_id = %batch_id,
            total_rows,
            parsed_ok,
            needs_fix,
            "Parse stage complete"
        );

        Ok(ParseOutcome {
            batch_id,
            total_rows,
            parsed_ok,
            needs_fix,
            pending_items,
        })
    }
}
