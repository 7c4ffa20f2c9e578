//! Shared configuration for ViCare clients.
//!
//! TOML profiles, token storage target selection (file, OS keyring or
//! memory only) and translation to `vicare_core::ClientConfig`. The core
//! crates never read files; applications go through this crate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use vicare_api::{FileTokenStore, OAuthConfig, TlsMode, Token, TokenStore};
use vicare_core::ClientConfig;

const KEYRING_SERVICE: &str = "vicare";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no profile named '{profile}' in the config file")]
    NoProfile { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named explicitly.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named account profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up `name`, or the default profile when `name` is `None`.
    pub fn profile<'a>(&'a self, name: Option<&'a str>) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|p| (name, p))
            .ok_or_else(|| ConfigError::NoProfile {
                profile: name.into(),
            })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

/// Where a profile keeps its token triple between runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStorage {
    /// JSON file, `token_file` or the platform data dir.
    #[default]
    File,
    /// OS keyring entry named after the profile.
    Keyring,
    /// Memory only; every run starts unauthenticated.
    None,
}

/// A named account profile.
#[derive(Debug, Deserialize, Serialize)]
pub struct Profile {
    /// OAuth client id registered in the developer portal.
    pub client_id: String,

    /// Redirect URI registered for that client.
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    /// Override the requested OAuth scope.
    pub scope: Option<String>,

    /// Override the API root.
    pub api_base_url: Option<String>,

    /// Override the identity provider's authorize endpoint.
    pub authorize_url: Option<String>,

    /// Override the identity provider's token endpoint.
    pub token_url: Option<String>,

    #[serde(default)]
    pub token_storage: TokenStorage,

    /// Token file path for `token_storage = "file"`.
    pub token_file: Option<PathBuf>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override timeout.
    pub timeout: Option<u64>,
}

fn default_redirect_uri() -> String {
    "http://localhost:4200/".into()
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "vicare", "vicare")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default token file for `profile_name`.
pub fn default_token_path(profile_name: &str) -> PathBuf {
    let file = format!("{profile_name}.json");
    project_dirs().map_or_else(
        || dirs_fallback().join("tokens").join(&file),
        |dirs| dirs.data_dir().join("tokens").join(&file),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("vicare");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load `path` merged over defaults, then `VICARE_`-prefixed env vars.
///
/// Nested keys use a double underscore:
/// `VICARE_PROFILES__HOME__CLIENT_ID` sets `profiles.home.client_id`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("VICARE_").split("__"));

    let config: Config = figment.extract()?;
    debug!(path = %path.display(), profiles = config.profiles.len(), "loaded config");
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Profile translation ─────────────────────────────────────────────

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL '{raw}': {e}"),
    })
}

/// Build a `ClientConfig` from a profile, falling back to `defaults`.
pub fn profile_to_client_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<ClientConfig, ConfigError> {
    if profile.client_id.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "client_id".into(),
            reason: "must not be empty".into(),
        });
    }

    let mut config = ClientConfig::new(profile.client_id.clone(), profile.redirect_uri.clone())
        .map_err(|e| ConfigError::Validation {
            field: "client_id".into(),
            reason: e.to_string(),
        })?;

    if let Some(ref raw) = profile.api_base_url {
        config.api_base_url = parse_url("api_base_url", raw)?;
    }
    apply_oauth_overrides(&mut config.oauth, profile)?;

    if let Some(ref ca_path) = profile.ca_cert {
        config.tls = TlsMode::CustomCa(ca_path.clone());
    }
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));

    Ok(config)
}

fn apply_oauth_overrides(oauth: &mut OAuthConfig, profile: &Profile) -> Result<(), ConfigError> {
    if let Some(ref scope) = profile.scope {
        oauth.scope.clone_from(scope);
    }
    if let Some(ref raw) = profile.authorize_url {
        oauth.authorize_url = parse_url("authorize_url", raw)?;
    }
    if let Some(ref raw) = profile.token_url {
        oauth.token_url = parse_url("token_url", raw)?;
    }
    Ok(())
}

/// The token storage target a profile asks for. `None` means memory only.
pub fn token_store_for(
    profile: &Profile,
    profile_name: &str,
) -> Result<Option<Arc<dyn TokenStore>>, ConfigError> {
    let store: Option<Arc<dyn TokenStore>> = match profile.token_storage {
        TokenStorage::File => {
            let path = profile
                .token_file
                .clone()
                .unwrap_or_else(|| default_token_path(profile_name));
            debug!(profile = profile_name, path = %path.display(), "using token file");
            Some(Arc::new(FileTokenStore::new(path)))
        }
        TokenStorage::Keyring => Some(Arc::new(KeyringTokenStore::new(profile_name)?)),
        TokenStorage::None => None,
    };
    Ok(store)
}

// ── Keyring storage ─────────────────────────────────────────────────

/// Token triple stored as JSON in the OS keyring.
pub struct KeyringTokenStore {
    entry: keyring::Entry,
}

impl KeyringTokenStore {
    pub fn new(profile_name: &str) -> Result<Self, ConfigError> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/token"))?;
        Ok(Self { entry })
    }
}

impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Result<Option<Token>, vicare_api::Error> {
        let raw = match self.entry.get_password() {
            Ok(raw) => raw,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(e) => return Err(vicare_api::Error::Storage(format!("keyring read failed: {e}"))),
        };
        match serde_json::from_str::<Token>(&raw) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                warn!(error = %e, "ignoring malformed keyring token");
                Ok(None)
            }
        }
    }

    fn save(&self, token: &Token) -> Result<(), vicare_api::Error> {
        let body = serde_json::to_string(token)
            .map_err(|e| vicare_api::Error::Storage(format!("failed to encode token: {e}")))?;
        self.entry
            .set_password(&body)
            .map_err(|e| vicare_api::Error::Storage(format!("keyring write failed: {e}")))
    }
}
