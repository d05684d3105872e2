//! tradeops-sales library interface
//!
//! Exposes the application state, router, and service modules for
//! integration testing.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tradeops_common::config::ServiceConfig;
use tradeops_common::events::EventBus;

use crate::services::allocator::CostAllocator;
use crate::services::pipeline::EtlPipeline;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Service configuration resolved at startup
    pub config: Arc<ServiceConfig>,
    /// Cost allocator the transform stage delegates to
    pub allocator: Arc<dyn CostAllocator>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        config: ServiceConfig,
        allocator: Arc<dyn CostAllocator>,
    ) -> Self {
        Self {
            db,
            event_bus,
            config: Arc::new(config),
            allocator,
            startup_time: Utc::now(),
        }
    }

    /// Pipeline service bound to this state
    pub fn pipeline(&self) -> EtlPipeline {
        EtlPipeline::new(
            self.db.clone(),
            self.event_bus.clone(),
            self.allocator.clone(),
            self.config.strict_catalog,
        )
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::etl_routes())
        .route("/api/etl/events", get(api::etl_event_stream))
        .merge(api::dashboard_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
        .with_state(state)
}
