//! Error types for the Marquee service.

use thiserror::Error;

use crate::validator::ValidationErrors;

/// Main error type for Marquee operations.
///
/// Validation, not-found, conflict, duplicate and rate-limited outcomes are
/// expected results that the request layer turns into client responses.
/// `Transient`, `InvalidClientIdentity` and `PasswordHash` are internal
/// failures: their detail is logged, never shown to the client.
#[derive(Error, Debug)]
pub enum MarqueeError {
    /// Caller-fixable bad input, keyed by field name
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// Request that could not be parsed at all (body, path or query)
    #[error("bad request: {0}")]
    BadRequest(String),

    /// No record with the requested identifier
    #[error("record not found")]
    NotFound,

    /// Version mismatch (or vanished record) on a conditional write
    #[error("edit conflict")]
    EditConflict,

    /// A uniqueness constraint rejected the write
    #[error("duplicate value for {field}")]
    DuplicateValue { field: &'static str },

    /// Admission denied by the rate limiter
    #[error("rate limit exceeded")]
    RateLimited,

    /// The client identity could not be derived from the transport address
    #[error("invalid client identity: {0}")]
    InvalidClientIdentity(String),

    /// Backend unavailable or deadline exceeded
    #[error("transient failure: {0}")]
    Transient(String),

    /// Hashing or verifying a stored password failed
    #[error("password hash error: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MarqueeError {
    /// Shorthand for a single-field validation failure.
    pub fn invalid(field: &str, message: &str) -> Self {
        MarqueeError::Validation(ValidationErrors::single(field, message))
    }

    /// Whether this error is an internal failure rather than an expected outcome.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            MarqueeError::InvalidClientIdentity(_)
                | MarqueeError::Transient(_)
                | MarqueeError::PasswordHash(_)
                | MarqueeError::Config(_)
                | MarqueeError::Io(_)
        )
    }
}

impl From<ValidationErrors> for MarqueeError {
    fn from(errors: ValidationErrors) -> Self {
        MarqueeError::Validation(errors)
    }
}

/// Result type alias for Marquee operations.
pub type Result<T> = std::result::Result<T, MarqueeError>;
