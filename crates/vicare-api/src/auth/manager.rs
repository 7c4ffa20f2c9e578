// OAuth2 + PKCE token lifecycle
//
// Unauthenticated → Authorizing → Authenticated ⇄ Refreshing → Expired.
// The token triple lives behind an `ArcSwapOption` so reads never lock;
// refreshes are serialized by a single async mutex so concurrent callers
// that all see an expiring token share one refresh round trip.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwapOption;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::pkce::PkcePair;
use super::token::{Clock, SystemClock, Token, TokenStore};
use crate::error::Error;
use crate::transport::retry_after_secs;

/// Tokens are refreshed once they are this close to expiry.
pub const REFRESH_BUFFER_SECS: f64 = 60.0;

const DEFAULT_AUTHORIZE_URL: &str = "https://iam.viessmann-climatesolutions.com/idp/v3/authorize";
const DEFAULT_TOKEN_URL: &str = "https://iam.viessmann-climatesolutions.com/idp/v3/token";
const DEFAULT_SCOPE: &str = "IoT User offline_access";

// ── Configuration ───────────────────────────────────────────────────

/// Identity-provider settings for one OAuth client registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub authorize_url: Url,
    pub token_url: Url,
}

impl OAuthConfig {
    /// Config against the production identity provider.
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Result<Self, Error> {
        Ok(Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scope: DEFAULT_SCOPE.into(),
            authorize_url: Url::parse(DEFAULT_AUTHORIZE_URL)?,
            token_url: Url::parse(DEFAULT_TOKEN_URL)?,
        })
    }
}

// ── Lifecycle state ─────────────────────────────────────────────────

/// Observable lifecycle state of a [`TokenManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No token and no login attempt in progress.
    Unauthenticated,
    /// An authorization URL was issued; waiting for the code exchange.
    Authorizing,
    /// A token triple is held.
    Authenticated,
    /// A refresh round trip is in flight.
    Refreshing,
    /// The refresh token was rejected. Only a new code exchange recovers.
    Expired,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: f64,
}

// ── Manager ─────────────────────────────────────────────────────────

/// Issues, caches, refreshes and persists the OAuth token triple.
///
/// Explicitly constructed and passed around; there is no global cache,
/// so several accounts can coexist in one process.
pub struct TokenManager {
    http: reqwest::Client,
    config: OAuthConfig,
    token: ArcSwapOption<Token>,
    pending: ArcSwapOption<PkcePair>,
    refresh_guard: tokio::sync::Mutex<()>,
    unrecoverable: AtomicBool,
    store: Option<Arc<dyn TokenStore>>,
    clock: Arc<dyn Clock>,
}

impl TokenManager {
    /// Create a manager, seeding it from `store` when that holds a token.
    ///
    /// An unreadable store is logged and the manager starts unauthenticated;
    /// later saves still go to it.
    pub fn new(
        http: reqwest::Client,
        config: OAuthConfig,
        store: Option<Arc<dyn TokenStore>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let seeded = store.as_ref().and_then(|store| match store.load() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "token storage unreadable, starting unauthenticated");
                None
            }
        });
        if seeded.is_some() {
            debug!("token manager seeded from storage");
        }

        Self {
            http,
            config,
            token: ArcSwapOption::new(seeded.map(Arc::new)),
            pending: ArcSwapOption::empty(),
            refresh_guard: tokio::sync::Mutex::new(()),
            unrecoverable: AtomicBool::new(false),
            store,
            clock,
        }
    }

    /// Same as [`new`](Self::new) with the wall clock.
    pub fn with_system_clock(
        http: reqwest::Client,
        config: OAuthConfig,
        store: Option<Arc<dyn TokenStore>>,
    ) -> Self {
        Self::new(http, config, store, Arc::new(SystemClock))
    }

    pub fn state(&self) -> AuthState {
        if self.unrecoverable.load(Ordering::Acquire) {
            return AuthState::Expired;
        }
        if self.token.load().is_some() {
            return match self.refresh_guard.try_lock() {
                Ok(_) => AuthState::Authenticated,
                Err(_) => AuthState::Refreshing,
            };
        }
        if self.pending.load().is_some() {
            AuthState::Authorizing
        } else {
            AuthState::Unauthenticated
        }
    }

    /// The currently held token triple, valid or not.
    pub fn current_token(&self) -> Option<Arc<Token>> {
        self.token.load_full()
    }

    // ── Authorization code flow ──────────────────────────────────────

    /// Start a login attempt: bind a fresh PKCE pair and return the URL
    /// the user must open. Any earlier, unfinished attempt is discarded.
    pub fn authorization_url(&self) -> Url {
        let pair = PkcePair::generate();
        let mut url = self.config.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.config.scope)
            .append_pair("code_challenge", pair.challenge())
            .append_pair("code_challenge_method", "S256");

        self.pending.store(Some(Arc::new(pair)));
        url
    }

    /// Exchange an authorization code using the verifier bound by the
    /// last [`authorization_url`](Self::authorization_url) call.
    pub async fn exchange_code(&self, code: &str) -> Result<(), Error> {
        let pair = self.pending.load_full().ok_or_else(|| Error::Authentication {
            message: "no pending authorization -- request an authorization URL first".into(),
        })?;

        let _guard = self.refresh_guard.lock().await;

        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code", code),
            ("code_verifier", pair.verifier().expose_secret()),
        ];
        let resp = self.request_token(&form).await?;

        let refresh_token = resp.refresh_token.ok_or_else(|| Error::Authentication {
            message: "token response carried no refresh token (is offline_access in scope?)".into(),
        })?;
        let token = Token {
            access_token: resp.access_token,
            refresh_token,
            expires_at: self.clock.now() + resp.expires_in,
        };

        self.install(token);
        // A newer authorization_url() call keeps its own pair.
        self.pending.compare_and_swap(&pair, None);
        self.unrecoverable.store(false, Ordering::Release);
        debug!("authorization code exchanged");
        Ok(())
    }

    // ── Read path ────────────────────────────────────────────────────

    /// Return a usable access token, refreshing first when it is within
    /// [`REFRESH_BUFFER_SECS`] of expiry. No I/O happens on the fast path.
    pub async fn access_token(&self) -> Result<String, Error> {
        self.ensure_recoverable()?;
        if let Some(access) = self.fresh_access_token() {
            return Ok(access);
        }

        let _guard = self.refresh_guard.lock().await;

        // Another caller may have finished a refresh while we waited.
        self.ensure_recoverable()?;
        if let Some(access) = self.fresh_access_token() {
            return Ok(access);
        }

        let current = self.token.load_full().ok_or(Error::NotAuthenticated)?;
        debug!(expires_at = current.expires_at, "access token inside refresh buffer, refreshing");

        let fresh = match self.refresh(&current).await {
            Ok(token) => token,
            Err(e @ Error::Authentication { .. }) => {
                warn!(error = %e, "refresh token rejected; re-authentication required");
                self.unrecoverable.store(true, Ordering::Release);
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let access = fresh.access_token.clone();
        self.install(fresh);
        Ok(access)
    }

    fn fresh_access_token(&self) -> Option<String> {
        let guard = self.token.load();
        let token = guard.as_ref()?;
        token
            .is_valid_at(self.clock.now(), REFRESH_BUFFER_SECS)
            .then(|| token.access_token.clone())
    }

    fn ensure_recoverable(&self) -> Result<(), Error> {
        if self.unrecoverable.load(Ordering::Acquire) {
            return Err(Error::Authentication {
                message: "refresh token rejected -- re-authentication required".into(),
            });
        }
        Ok(())
    }

    // ── Token endpoint ───────────────────────────────────────────────

    async fn refresh(&self, current: &Token) -> Result<Token, Error> {
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", current.refresh_token.as_str()),
        ];
        let resp = self.request_token(&form).await?;

        Ok(Token {
            access_token: resp.access_token,
            // Some identity providers rotate the refresh token, some don't.
            refresh_token: resp
                .refresh_token
                .unwrap_or_else(|| current.refresh_token.clone()),
            expires_at: self.clock.now() + resp.expires_in,
        })
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse, Error> {
        debug!(url = %self.config.token_url, "POST token endpoint");

        let resp = self
            .http
            .post(self.config.token_url.clone())
            .form(form)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        let retry_after_secs = retry_after_secs(&resp);
        let body = resp.text().await.map_err(Error::Transport)?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body,
            });
        }

        match status.as_u16() {
            429 => Err(Error::RateLimited { retry_after_secs }),
            code if code >= 500 => Err(Error::Server {
                status: code,
                message: body,
            }),
            code => Err(Error::Authentication {
                message: format!("token endpoint returned HTTP {code}: {body}"),
            }),
        }
    }

    /// Replace the whole triple at once and persist it.
    fn install(&self, token: Token) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&token) {
                // The in-memory token is still good; the next login will
                // try to persist again.
                warn!(error = %e, "failed to persist token");
            }
        }
        self.token.store(Some(Arc::new(token)));
    }
}
