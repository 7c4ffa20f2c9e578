// ── Runtime connection configuration ──
//
// These types describe *how* to reach the ViCare cloud. They carry the
// OAuth client registration and connection tuning, but never touch disk.
// Applications (or vicare-config) construct a `ClientConfig` and hand it in.

use std::time::Duration;

use url::Url;
use vicare_api::{OAuthConfig, TlsMode, TransportConfig};

use crate::error::CoreError;

/// Configuration for one account session against the cloud API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root (e.g. `https://api.viessmann-climatesolutions.com`).
    pub api_base_url: Url,
    /// OAuth client registration and endpoints.
    pub oauth: OAuthConfig,
    /// Per-request timeout.
    pub timeout: Duration,
    /// TLS verification strategy.
    pub tls: TlsMode,
}

impl ClientConfig {
    /// Production endpoints for the given OAuth client.
    pub fn new(
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let oauth = OAuthConfig::new(client_id, redirect_uri)?;
        let api_base_url =
            Url::parse(vicare_api::client::DEFAULT_BASE_URL).map_err(|e| CoreError::Config {
                message: format!("invalid default API URL: {e}"),
            })?;

        Ok(Self {
            api_base_url,
            oauth,
            timeout: Duration::from_secs(30),
            tls: TlsMode::System,
        })
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls.clone(),
            timeout: self.timeout,
        }
    }
}
