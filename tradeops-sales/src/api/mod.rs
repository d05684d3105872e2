//! HTTP API handlers for the sales ingestion service

pub mod dashboard;
pub mod etl;
pub mod health;
pub mod sse;

pub use dashboard::dashboard_routes;
pub use etl::etl_routes;
pub use health::health_routes;
pub use sse::etl_event_stream;
