//! Business logic services for the sales ingestion pipeline

pub mod aggregation;
pub mod allocator;
pub mod normalizer;
pub mod pipeline;
pub mod resolver;
