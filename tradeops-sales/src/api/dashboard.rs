//! Dashboard API handlers
//!
//! GET /api/dashboard/stats and GET /api/dashboard/aggregate. Both read
//! settled ledger data only and never block on a running batch.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::db::ledger::LedgerStats;
use crate::error::{ApiError, ApiResult};
use crate::models::{Action, ChartType, FeeType, ShipType, ValueMode};
use crate::services::aggregation::{self, AggregateQuery, AggregateResult};
use crate::AppState;

/// GET /api/dashboard/aggregate query string
///
/// List parameters are comma-separated tokens, e.g.
/// `?start=2025-01-01&end=2025-01-31&actions=sale,return&mode=amount`.
#[derive(Debug, Deserialize)]
pub struct AggregateParams {
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(default)]
    pub sellers: Option<String>,
    #[serde(default)]
    pub chart: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub actions: Option<String>,
    #[serde(default)]
    pub ships: Option<String>,
    #[serde(default)]
    pub fees: Option<String>,
}

/// GET /api/dashboard/stats
pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<LedgerStats>> {
    let stats = crate::db::ledger::ledger_stats(&state.db).await?;
    Ok(Json(stats))
}

/// GET /api/dashboard/aggregate
pub async fn aggregate(
    State(state): State<AppState>,
    Query(params): Query<AggregateParams>,
) -> ApiResult<Json<AggregateResult>> {
    let chart = match params.chart.as_deref() {
        None | Some("") => ChartType::Line,
        Some(token) => ChartType::from_param(token)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown chart type: {}", token)))?,
    };
    let mode = match params.mode.as_deref() {
        None | Some("") => ValueMode::Amount,
        Some(token) => ValueMode::from_param(token)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown mode: {}", token)))?,
    };

    let query = AggregateQuery {
        start: params.start,
        end: params.end,
        sellers: split_csv(&params.sellers)
            .map(str::to_string)
            .collect(),
        chart,
        mode,
        actions: parse_list(&params.actions, Action::from_param, "action")?,
        ships: parse_list(&params.ships, ShipType::from_param, "shipping type")?,
        fees: parse_list(&params.fees, FeeType::from_param, "fee type")?,
    };

    let result = aggregation::aggregate(&state.db, &query).await?;
    Ok(Json(result))
}

/// Non-empty trimmed tokens of a comma-separated parameter
fn split_csv(raw: &Option<String>) -> impl Iterator<Item = &str> {
    raw.as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn parse_list<T>(
    raw: &Option<String>,
    parse: impl Fn(&str) -> Option<T>,
    what: &str,
) -> ApiResult<Vec<T>> {
    split_csv(raw)
        .map(|token| {
            parse(token).ok_or_else(|| ApiError::BadRequest(format!("unknown {}: {}", what, token)))
        })
        .collect()
}

/// Build dashboard routes
pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/api/dashboard/stats", get(stats))
        .route("/api/dashboard/aggregate", get(aggregate))
}
