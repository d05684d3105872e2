//! Cost allocation stage
//!
//! After the ledger is committed, the sold and returned unit counts are
//! handed to the FIFO inventory costing service. Deployments without
//! that service fall back to an in-process ratio split so the pipeline
//! still reaches the done state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tradeops_common::config::ServiceConfig;
use tradeops_common::{Error, Result};
use uuid::Uuid;

/// What the transform stage hands to the allocator
#[derive(Debug, Clone, Serialize)]
pub struct AllocationRequest {
    pub batch_id: Uuid,
    pub seller: String,
    /// Retail pool ratio from the upload
    pub fifo_ratio_re: f64,
    /// Credit pool ratio from the upload
    pub fifo_ratio_cr: f64,
    /// Cash pool ratio from the upload
    pub fifo_ratio_cc: f64,
    /// Units sold in the batch
    pub out_quantity: i64,
    /// Units returned in the batch
    pub return_quantity: i64,
}

/// What the allocator acknowledged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllocationOutcome {
    /// Units the FIFO ledger consumed
    pub fifo_out_count: i64,
    /// Units the FIFO ledger restocked
    pub fifo_return_count: i64,
}

/// Seam between the pipeline and inventory costing
///
/// The transform stage only completes once an allocator acknowledges the
/// batch; a failure here leaves the batch in the error state for a rerun.
#[async_trait]
pub trait CostAllocator: Send + Sync {
    async fn allocate(&self, request: &AllocationRequest) -> Result<AllocationOutcome>;
}

/// Allocator backed by the FIFO costing service
pub struct HttpFifoAllocator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFifoAllocator {
    pub fn new(base_url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl CostAllocator for HttpFifoAllocator {
    async fn allocate(&self, request: &AllocationRequest) -> Result<AllocationOutcome> {
        let url = format!("{}/api/fifo/allocate", self.base_url);
        tracing::debug!(batch_id = %request.batch_id, url = %url, "Requesting FIFO allocation");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Internal(format!("FIFO service unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Internal(format!(
                "FIFO service returned {}: {}",
                status, body
            )));
        }

        response
            .json::<AllocationOutcome>()
            .await
            .map_err(|e| Error::Internal(format!("bad FIFO service response: {}", e)))
    }
}

/// In-process fallback that splits quantities by the batch ratios
///
/// Each pool consumes `round(quantity * ratio)`; the acknowledged count
/// is the sum over pools, so ratios that do not sum to one show up in the
/// numbers instead of being hidden.
pub struct RatioAllocator;

impl RatioAllocator {
    fn split(quantity: i64, ratios: [f64; 3]) -> i64 {
        ratios
            .iter()
            .map(|ratio| (quantity as f64 * ratio).round() as i64)
            .sum()
    }
}

#[async_trait]
impl CostAllocator for RatioAllocator {
    async fn allocate(&self, request: &AllocationRequest) -> Result<AllocationOutcome> {
        let ratios = [
            request.fifo_ratio_re,
            request.fifo_ratio_cr,
            request.fifo_ratio_cc,
        ];
        let outcome = AllocationOutcome {
            fifo_out_count: Self::split(request.out_quantity, ratios),
            fifo_return_count: Self::split(request.return_quantity, ratios),
        };
        tracing::debug!(
            batch_id = %request.batch_id,
            fifo_out_count = outcome.fifo_out_count,
            fifo_return_count = outcome.fifo_return_count,
            "Ratio allocation"
        );
        Ok(outcome)
    }
}

/// Pick the allocator for this deployment
pub fn allocator_from_config(config: &ServiceConfig) -> Result<Arc<dyn CostAllocator>> {
    match &config.fifo_service_url {
        Some(url) => {
            tracing::info!(url = %url, "Using FIFO costing service for allocation");
            Ok(Arc::new(HttpFifoAllocator::new(url.clone())?))
        }
        None => {
            tracing::info!("No FIFO service configured; using ratio allocation");
            Ok(Arc::new(RatioAllocator))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(out_quantity: i64, return_quantity: i64) -> AllocationRequest {
        AllocationRequest {
            batch_id: Uuid::new_v4(),
            seller: "seller-a".to_string(),
            fifo_ratio_re: 0.5,
            fifo_ratio_cr: 0.3,
            fifo_ratio_cc: 0.2,
            out_quantity,
            return_quantity,
        }
    }

    #[tokio::test]
    async fn ratio_allocation_splits_by_pool_and_sums() {
        let outcome = RatioAllocator.allocate(&request(100, 10)).await.unwrap();
        // 50 + 30 + 20 and 5 + 3 + 2
        assert_eq!(outcome.fifo_out_count, 100);
        assert_eq!(outcome.fifo_return_count, 10);
    }

    #[tokio::test]
    async fn ratio_allocation_rounds_per_pool() {
        let mut req = request(3, 0);
        req.fifo_ratio_re = 0.5;
        req.fifo_ratio_cr = 0.5;
        req.fifo_ratio_cc = 0.0;
        let outcome = RatioAllocator.allocate(&req).await.unwrap();
        // round(1.5) twice: 2 + 2
        assert_eq!(outcome.fifo_out_count, 4);
    }

    #[tokio::test]
    async fn zero_quantities_allocate_to_zero() {
        let outcome = RatioAllocator.allocate(&request(0, 0)).await.unwrap();
        assert_eq!(outcome.fifo_out_count, 0);
        assert_eq!(outcome.fifo_return_count, 0);
    }

    #[test]
    fn http_allocator_normalizes_trailing_slash() {
        let allocator = HttpFifoAllocator::new("http://localhost:5820/".to_string()).unwrap();
        assert_eq!(allocator.base_url, "http://localhost:5820");
    }
}
