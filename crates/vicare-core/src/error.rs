// ── Core error types ──
//
// Caller-facing errors from vicare-core. Local failures (validation,
// not writable, missing context) are raised before any request leaves
// the process. The `From<vicare_api::Error>` impl translates remote
// failures 1:1; nothing in this crate retries.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach the API: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Remote errors ────────────────────────────────────────────────
    #[error("{entity} not found: {identifier}")]
    NotFound { entity: String, identifier: String },

    #[error("Rate limited -- retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Server failure (HTTP {status}): {message}")]
    ServerFailure { status: u16, message: String },

    #[error("API error: {message}")]
    Api {
        message: String,
        /// The API's `errorType` (e.g. "DEVICE_COMMUNICATION_ERROR").
        code: Option<String>,
        status: Option<u16>,
    },

    // ── Local (pre-flight) errors ────────────────────────────────────
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Feature '{feature}' is not writable: {reason}")]
    NotWritable { feature: String, reason: String },

    #[error("Cannot resolve '{feature}': {missing} is not in the fetched snapshot")]
    MissingContext { feature: String, missing: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// `true` for failures detected before any network call.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotWritable { .. } | Self::MissingContext { .. }
        )
    }

    pub(crate) fn not_found(entity: &str, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            identifier: identifier.into(),
        }
    }
}

// ── Validation ───────────────────────────────────────────────────────

/// A parameter value rejected by its declared constraint.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Invalid value {value} for parameter '{param}': {violation}")]
pub struct ValidationError {
    pub param: String,
    /// The offending value, rendered as JSON.
    pub value: String,
    pub violation: Violation,
}

/// Which rule a value broke.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Violation {
    #[error("required parameter is missing")]
    Missing,

    #[error("expected {expected}, got {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("must be below or equal to maximum {max}")]
    AboveMaximum { max: f64 },

    #[error("must be above or equal to minimum {min}")]
    BelowMinimum { min: f64 },

    #[error("not aligned to step {step} from {base}")]
    OffStep { step: f64, base: f64 },

    #[error("not one of the allowed options {options:?}")]
    NotAnOption { options: Vec<String> },

    #[error("shorter than minimum length {min_length}")]
    TooShort { min_length: usize },

    #[error("longer than maximum length {max_length}")]
    TooLong { max_length: usize },

    #[error("does not match pattern {pattern}")]
    PatternMismatch { pattern: String },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<vicare_api::Error> for CoreError {
    fn from(err: vicare_api::Error) -> Self {
        match err {
            vicare_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            vicare_api::Error::NotAuthenticated => CoreError::AuthenticationFailed {
                message: "not authenticated -- complete the authorization flow first".into(),
            },
            vicare_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else {
                    CoreError::ConnectionFailed {
                        reason: e.to_string(),
                    }
                }
            }
            vicare_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            vicare_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                reason: format!("TLS error: {msg}"),
            },
            vicare_api::Error::RateLimited { retry_after_secs } => {
                CoreError::RateLimited { retry_after_secs }
            }
            vicare_api::Error::NotFound { message } => CoreError::NotFound {
                entity: "Resource".into(),
                identifier: message,
            },
            vicare_api::Error::Api {
                status,
                message,
                error_type,
                ..
            } => CoreError::Api {
                message,
                code: error_type,
                status: Some(status),
            },
            vicare_api::Error::Server { status, message } => {
                CoreError::ServerFailure { status, message }
            }
            vicare_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            vicare_api::Error::Storage(msg) => CoreError::Config {
                message: format!("Token storage: {msg}"),
            },
        }
    }
}
