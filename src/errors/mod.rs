//! # Error Handling
//!
//! Error types for the Gatehouse account service using `thiserror`.
//!
//! Expected business failures (validation, conflicts, bad tokens, bad
//! credentials) are typed variants that callers can match on; only
//! genuinely unexpected faults surface as `Database` or `Internal`.

use std::fmt;

/// Custom result type for Gatehouse operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Gatehouse account service
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Malformed or missing input
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Uniqueness violation (e.g. email already registered)
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        resource_type: String,
    },

    /// Unknown user or id
    #[error("Not found: {resource_type} '{id}'")]
    NotFound {
        resource_type: String,
        id: String,
    },

    /// Purpose-token or session-token failure
    #[error("Token error: {message}")]
    Token {
        message: String,
        kind: TokenErrorKind,
    },

    /// Bad credentials. Login collapses unknown-email and wrong-password
    /// into this single variant so callers cannot enumerate accounts.
    #[error("{message}")]
    Credential {
        message: String,
    },

    /// Persistence-layer failure with store-reported reasons passed
    /// through verbatim
    #[error("Store error: {}", reasons.join("; "))]
    Store {
        reasons: Vec<String>,
    },

    /// Email delivery failure
    #[error("Notification error: {message}")]
    Notification {
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
    },

    /// Database and storage errors
    #[error("Database error: {context}")]
    Database {
        #[source]
        source: sqlx::Error,
        context: String,
    },

    /// Internal server errors
    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

/// Token error subtypes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenErrorKind {
    DecodeFailed,
    StampMismatch,
    PurposeMismatch,
    Expired,
    InvalidSignature,
}

impl fmt::Display for TokenErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenErrorKind::DecodeFailed => write!(f, "decode_failed"),
            TokenErrorKind::StampMismatch => write!(f, "stamp_mismatch"),
            TokenErrorKind::PurposeMismatch => write!(f, "purpose_mismatch"),
            TokenErrorKind::Expired => write!(f, "expired"),
            TokenErrorKind::InvalidSignature => write!(f, "invalid_signature"),
        }
    }
}

impl Error {
    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create a conflict error
    pub fn conflict<M: Into<String>, R: Into<String>>(message: M, resource_type: R) -> Self {
        Self::Conflict { message: message.into(), resource_type: resource_type.into() }
    }

    /// Create a not found error
    pub fn not_found<R: Into<String>, I: Into<String>>(resource_type: R, id: I) -> Self {
        Self::NotFound { resource_type: resource_type.into(), id: id.into() }
    }

    /// Create a token error
    pub fn token<S: Into<String>>(message: S, kind: TokenErrorKind) -> Self {
        Self::Token { message: message.into(), kind }
    }

    /// Create a credential error
    pub fn credential<S: Into<String>>(message: S) -> Self {
        Self::Credential { message: message.into() }
    }

    /// Create a store error from store-reported reasons
    pub fn store(reasons: Vec<String>) -> Self {
        Self::Store { reasons }
    }

    /// Create a notification error
    pub fn notification<S: Into<String>>(message: S) -> Self {
        Self::Notification { message: message.into() }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create an internal server error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Get the HTTP status code a boundary layer should return for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation { .. } => 400,
            Error::Conflict { .. } => 409,
            Error::NotFound { .. } => 404,
            Error::Token { .. } => 422,
            Error::Credential { .. } => 401,
            Error::Store { .. } => 422,
            Error::Notification { .. } => 502,
            Error::Config { .. } => 500,
            Error::Database { .. } => 500,
            Error::Internal { .. } => 500,
        }
    }
}

// Error conversions for common external error types

impl From<sqlx::Error> for Error {
    fn from(error: sqlx::Error) -> Self {
        Self::Database { source: error, context: "Database operation failed".to_string() }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or_else(|| e.code.to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::validation(message)
    }
}
