//! # Observability
//!
//! Structured logging and metrics for the account service.

pub mod metrics;

mod logging;

pub use logging::init_tracing;
