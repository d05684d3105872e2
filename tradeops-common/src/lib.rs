//! Shared types for the TradeOps back-office services
//!
//! Provides error types, the event bus, configuration loading, and the
//! Pacific reference-time helpers used by every service that touches the
//! sales ledger.

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
