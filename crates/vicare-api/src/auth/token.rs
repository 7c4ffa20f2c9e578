// Token triple, storage targets and the clock the lifecycle reads.
//
// Both `TokenStore` and `Clock` are injected into the `TokenManager` so
// several accounts can coexist and tests can swap in fakes.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Error;

// ── Token ───────────────────────────────────────────────────────────

/// An issued OAuth token triple.
///
/// Serializes to the on-disk token file shape:
/// `{ "access_token": str, "refresh_token": str, "expires_at": float }`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,
    /// Absolute expiry in epoch seconds.
    pub expires_at: f64,
}

impl Token {
    /// `true` while `now` is still before `expires_at - buffer_secs`.
    pub fn is_valid_at(&self, now: f64, buffer_secs: f64) -> bool {
        now < self.expires_at - buffer_secs
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

// ── Clock ───────────────────────────────────────────────────────────

/// Source of "now" in epoch seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// Wall-clock time via `chrono`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[allow(clippy::as_conversions, clippy::cast_precision_loss)]
    fn now(&self) -> f64 {
        Utc::now().timestamp_millis() as f64 / 1000.0
    }
}

// ── Storage targets ─────────────────────────────────────────────────

/// Durable home for the token triple.
///
/// `save` always overwrites the previous contents wholesale.
pub trait TokenStore: Send + Sync {
    /// `Ok(None)` when nothing usable has been stored yet.
    fn load(&self) -> Result<Option<Token>, Error>;
    fn save(&self, token: &Token) -> Result<(), Error>;
}

/// JSON token file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<Token>, Error> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Storage(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };

        match serde_json::from_str::<Token>(&raw) {
            Ok(token) => {
                debug!(path = %self.path.display(), "loaded token file");
                Ok(Some(token))
            }
            Err(e) => {
                // An unparseable file is treated like an absent one: the
                // caller starts unauthenticated and the next login overwrites it.
                warn!(path = %self.path.display(), error = %e, "ignoring malformed token file");
                Ok(None)
            }
        }
    }

    fn save(&self, token: &Token) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::Storage(format!("failed to create {}: {e}", parent.display())))?;
            }
        }

        let body = serde_json::to_string_pretty(token)
            .map_err(|e| Error::Storage(format!("failed to encode token: {e}")))?;

        // Write-then-rename so a crash never leaves a half-written file.
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, body)
            .map_err(|e| Error::Storage(format!("failed to write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            Error::Storage(format!("failed to replace {}: {e}", self.path.display()))
        })?;

        debug!(path = %self.path.display(), "persisted token file");
        Ok(())
    }
}

/// In-process store. Useful as a fake and for sessions that must not touch disk.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<Token>>,
    saves: Mutex<usize>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: Token) -> Self {
        Self {
            token: Mutex::new(Some(token)),
            saves: Mutex::new(0),
        }
    }

    /// The last saved (or seeded) token.
    pub fn current(&self) -> Option<Token> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How many times `save` has been called.
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<Token>, Error> {
        Ok(self.current())
    }

    fn save(&self, token: &Token) -> Result<(), Error> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}
