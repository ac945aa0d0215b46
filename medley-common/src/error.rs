//! Common error types for Medley
//!
//! The domain variants form a closed taxonomy that the presentation layer
//! relies on: every error maps to a stable `kind()` string and a
//! `retryable()` flag, so downstream retry logic never has to parse
//! messages.

use thiserror::Error;

/// Common result type for Medley operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Medley services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No source produced an acceptable match
    #[error("Not found: {0}")]
    NotFound(String),

    /// A provider call failed after exhausting local retries
    #[error("Source error: {0}")]
    Source(String),

    /// Local or provider-signaled throttling
    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        /// Milliseconds until a retry is permitted, when known
        retry_after_ms: Option<u64>,
    },

    /// Malformed input to a lookup operation
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Missing or invalid credential for a provider
    #[error("Auth error: {0}")]
    Auth(String),

    /// An outbound call exceeded its deadline
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable kind tag for the presentation layer.
    ///
    /// Infrastructure variants (Database/Io/Config/Internal) collapse to
    /// `source-error`; callers never see them distinctly.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not-found",
            Error::Source(_) => "source-error",
            Error::RateLimited { .. } => "rate-limited",
            Error::Validation(_) => "validation-error",
            Error::Auth(_) => "auth-error",
            Error::Timeout(_) => "timeout",
            Error::Database(_) | Error::Io(_) | Error::Config(_) | Error::Internal(_) => {
                "source-error"
            }
        }
    }

    /// Whether the caller may safely retry the same request.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Error::Source(_) | Error::RateLimited { .. } | Error::Timeout(_)
        )
    }
}
