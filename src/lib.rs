//! # Gatehouse
//!
//! A user-account lifecycle service: registration with email
//! verification, credential login issuing JWT session tokens, password
//! reset and change, and profile management.
//!
//! The crate is organized as:
//! - [`auth`]: account orchestration, purpose tokens, session tokens,
//!   password hashing, request validation
//! - [`storage`]: Postgres-backed user and role repositories
//! - [`notify`]: outbound email delivery for verification/reset links
//! - [`config`]: environment-driven configuration
//! - [`errors`]: the crate-wide error type
//! - [`observability`]: tracing setup and metrics counters

pub mod auth;
pub mod config;
pub mod domain;
pub mod errors;
pub mod notify;
pub mod observability;
pub mod storage;

pub use config::AppConfig;
pub use errors::{Error, Result};
pub use observability::init_tracing;

/// Crate version, from the build manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Service name used in logs and token issuer defaults.
pub const APP_NAME: &str = "gatehouse";
