//! Error types for the frontdesk domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the top-level [`Error`]
//! rolls them up with `#[from]` conversions.

use thiserror::Error;

/// The top-level error type for all frontdesk operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Gateway errors ---
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    // --- Extraction errors ---
    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The dispatcher's state-switch loop exceeded its iteration cap.
    /// Fatal for the turn; the state machine is rolled back to its
    /// pre-turn snapshot before this is surfaced.
    #[error("Exhausted state transitions after {limit} gateway calls in one turn")]
    ExhaustedTransitions { limit: usize },

    /// The grading collaborator could not obtain a parseable report
    /// within its re-ask budget.
    #[error("Malformed grading report: {0}")]
    MalformedReport(String),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures from the completion gateway (the remote LLM endpoint).
///
/// `Clone` so retry wrappers can hold the last error while re-attempting.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Gateway not configured: {0}")]
    NotConfigured(String),
}

impl GatewayError {
    /// Whether a retry wrapper should attempt this request again.
    ///
    /// Auth and configuration failures are permanent; network trouble,
    /// timeouts, rate limits, and 5xx responses are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Network(_) | GatewayError::Timeout(_) => true,
            GatewayError::RateLimited { .. } => true,
            GatewayError::ApiError { status_code, .. } => *status_code >= 500,
            GatewayError::AuthenticationFailed(_) | GatewayError::NotConfigured(_) => false,
        }
    }
}

/// Failures from the extraction module.
///
/// Extraction is all-or-nothing: any missing or malformed field fails the
/// whole record. These are recovered locally at finalize time — the turn
/// still completes with a failure notice and the store is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("Marker not found in assistant text")]
    MarkerNotFound,

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Invalid format for field: {0}")]
    InvalidFormat(String),
}

/// Failures from the record store.
///
/// `NotFound` is deliberately ambiguous between "no such id" and "wrong
/// credentials" so callers cannot probe which ids exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Record not found or credentials do not match")]
    NotFound,
}
