use thiserror::Error;

/// Top-level error type for the `vicare-api` crate.
///
/// Covers every wire-level failure mode: OAuth, transport, HTTP status
/// translation, payload decoding and token persistence.
/// `vicare-core` maps these into the caller-facing taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Credentials rejected, code exchange failed, or the refresh token
    /// was revoked. Never retried; the caller must re-authenticate.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// No token is loaded yet (no storage target and no code exchange).
    #[error("Not authenticated -- complete the authorization flow first")]
    NotAuthenticated,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Remote status ───────────────────────────────────────────────
    /// HTTP 429. The caller owns backoff; nothing here retries.
    #[error("Rate limited -- retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// HTTP 404 on the requested resource.
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Any other 4xx, carrying the API's structured error body.
    #[error("API error (HTTP {status}): {message}")]
    Api {
        status: u16,
        message: String,
        error_id: Option<String>,
        error_type: Option<String>,
    },

    /// HTTP 5xx.
    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// Reading or writing the token storage target failed.
    #[error("Token storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Returns `true` if re-running the authorization flow might resolve it.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::NotAuthenticated)
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::NotFound { .. } => true,
            _ => false,
        }
    }
}
