//! Batch pipeline API handlers
//!
//! POST /api/etl/upload, parse, fix-sku, transform; GET /api/etl/status,
//! GET /api/etl/batches. Each stage endpoint drives exactly one state
//! transition; a stage already claimed by another caller answers 409.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{EtlBatch, SkuFix};
use crate::services::pipeline::{ParseOutcome, TransformOutcome, UploadOutcome, UploadRequest};
use crate::AppState;

/// POST /api/etl/fix-sku/{batch_id} request
#[derive(Debug, Deserialize)]
pub struct FixSkuRequest {
    pub fixes: Vec<SkuFix>,
    pub confirmed_by: String,
}

/// POST /api/etl/fix-sku/{batch_id} response
#[derive(Debug, Serialize)]
pub struct FixSkuResponse {
    pub batch_id: Uuid,
    pub fixed_count: usize,
}

/// POST /api/etl/transform/{batch_id} request
#[derive(Debug, Default, Deserialize)]
pub struct TransformRequest {
    #[serde(default)]
    pub security_code: Option<String>,
}

/// GET /api/etl/batches query
#[derive(Debug, Deserialize)]
pub struct BatchListQuery {
    pub limit: Option<i64>,
}

/// POST /api/etl/upload
///
/// Validates the paired exports and creates a batch in `uploaded`.
/// Any validation failure rejects the whole upload with 400 and no
/// batch is created.
pub async fn upload(
    State(state): State<AppState>,
    Json(request): Json<UploadRequest>,
) -> ApiResult<Json<UploadOutcome>> {
    let outcome = state.pipeline().upload(request).await?;
    Ok(Json(outcome))
}

/// POST /api/etl/parse/{batch_id}
///
/// Runs SKU resolution over the batch and returns the pending-fix list.
pub async fn parse(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> ApiResult<Json<ParseOutcome>> {
    let outcome = state.pipeline().parse(batch_id).await?;
    Ok(Json(outcome))
}

/// POST /api/etl/fix-sku/{batch_id}
///
/// Applies operator fixes and records each into the correction memory.
/// Skipped fixes lower `fixed_count` without failing the call.
pub async fn fix_sku(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
    Json(request): Json<FixSkuRequest>,
) -> ApiResult<Json<FixSkuResponse>> {
    let confirmed_by = request.confirmed_by.trim();
    if confirmed_by.is_empty() {
        return Err(ApiError::BadRequest("confirmed_by is required".to_string()));
    }

    let fixed_count = state
        .pipeline()
        .apply_fixes(batch_id, &request.fixes, confirmed_by)
        .await?;
    Ok(Json(FixSkuResponse {
        batch_id,
        fixed_count,
    }))
}

/// POST /api/etl/transform/{batch_id}
///
/// Hands the cleaned batch to the cost allocator and commits the ledger.
/// When a transform security code is configured the request must carry it.
pub async fn transform(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
    Json(request): Json<TransformRequest>,
) -> ApiResult<Json<TransformOutcome>> {
    if let Some(expected) = &state.config.transform_security_code {
        if request.security_code.as_deref() != Some(expected.as_str()) {
            return Err(ApiError::Unauthorized(
                "transform security code is missing or wrong".to_string(),
            ));
        }
    }

    let outcome = state.pipeline().transform(batch_id).await?;
    Ok(Json(outcome))
}

/// GET /api/etl/status/{batch_id}
///
/// Pure read for client polling; safe while a stage is running.
pub async fn status(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> ApiResult<Json<EtlBatch>> {
    let batch = crate::db::batches::load_batch(&state.db, batch_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("batch {} not found", batch_id)))?;
    Ok(Json(batch))
}

/// GET /api/etl/batches
///
/// Most recent batches, newest first.
pub async fn list_batches(
    State(state): State<AppState>,
    Query(query): Query<BatchListQuery>,
) -> ApiResult<Json<Vec<EtlBatch>>> {
    let limit = query.limit.unwrap_or(20).clamp(1, 200);
    let batches = crate::db::batches::recent_batches(&state.db, limit).await?;
    Ok(Json(batches))
}

/// Build batch pipeline routes
pub fn etl_routes() -> Router<AppState> {
    Router::new()
        .route("/api/etl/upload", post(upload))
        .route("/api/etl/parse/:batch_id", post(parse))
        .route("/api/etl/fix-sku/:batch_id", post(fix_sku))
        .route("/api/etl/transform/:batch_id", post(transform))
        .route("/api/etl/status/:batch_id", get(status))
        .route("/api/etl/batches", get(list_batches))
}
