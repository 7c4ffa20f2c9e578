// ViCare API HTTP client
//
// Wraps `reqwest::Client` with bearer-token injection, `{ data }` envelope
// unwrapping and the status → error translation. Endpoint methods sit at
// the bottom; everything above them is transport mechanics.

use std::sync::Arc;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::auth::TokenManager;
use crate::error::Error;
use crate::models::{
    ApiErrorBody, CommandResponse, DataEnvelope, DeviceInfo, GatewayInfo, InstallationInfo,
    RawFeature,
};
use crate::redact::redact;
use crate::transport::{TransportConfig, retry_after_secs};

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://api.viessmann-climatesolutions.com";

const INSTALLATIONS_PATH: &str = "/iot/v2/equipment/installations";
const GATEWAYS_PATH: &str = "/iot/v2/equipment/gateways";
const FEATURES_PATH: &str = "/iot/v2/features/installations";

/// Authenticated client for the ViCare cloud API.
///
/// Every request first asks the shared [`TokenManager`] for an access
/// token, so expiry and refresh are invisible to callers. Nothing here
/// retries: rate limits and server errors surface as [`Error`] values.
pub struct ViClient {
    http: reqwest::Client,
    base_url: Url,
    auth: Arc<TokenManager>,
}

impl ViClient {
    /// Create a client with its own `reqwest::Client` built from `transport`.
    pub fn new(
        base_url: Url,
        auth: Arc<TokenManager>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, auth))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, auth: Arc<TokenManager>) -> Self {
        Self {
            http,
            base_url,
            auth,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn auth(&self) -> &Arc<TokenManager> {
        &self.auth
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Resolve `path` against the API root. Absolute URLs (command
    /// descriptors carry them) pass through untouched.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(Url::parse(path)?);
        }
        let path = path.trim_start_matches('/');
        let full = format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path);
        Ok(Url::parse(&full)?)
    }

    fn features_url(
        &self,
        installation_id: i64,
        gateway_serial: &str,
        device_id: &str,
    ) -> Result<Url, Error> {
        self.api_url(&format!(
            "{FEATURES_PATH}/{installation_id}/gateways/{gateway_serial}/devices/{device_id}/features"
        ))
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send an authenticated GET and unwrap the `{ data }` envelope.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!(url = %redact(url.as_str()), "GET");

        let token = self.auth.access_token().await?;
        let resp = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(Error::Transport)?;

        let body = check_status(resp).await?;
        let envelope: DataEnvelope<T> =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: redact(&body),
            })?;
        Ok(envelope.data)
    }

    /// Send an authenticated POST with a JSON body, returning the raw response.
    pub(crate) async fn post(
        &self,
        url: Url,
        body: &impl Serialize,
    ) -> Result<reqwest::Response, Error> {
        debug!(url = %redact(url.as_str()), "POST");

        let token = self.auth.access_token().await?;
        self.http
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)
    }

    // ── Discovery ────────────────────────────────────────────────────

    /// `GET /iot/v2/equipment/installations`
    pub async fn installations(&self) -> Result<Vec<InstallationInfo>, Error> {
        debug!("listing installations");
        self.get(self.api_url(INSTALLATIONS_PATH)?).await
    }

    /// `GET /iot/v2/equipment/gateways`
    pub async fn gateways(&self) -> Result<Vec<GatewayInfo>, Error> {
        debug!("listing gateways");
        self.get(self.api_url(GATEWAYS_PATH)?).await
    }

    /// `GET /iot/v2/equipment/installations/{id}/gateways/{serial}/devices`
    pub async fn devices(
        &self,
        installation_id: i64,
        gateway_serial: &str,
    ) -> Result<Vec<DeviceInfo>, Error> {
        let url = self.api_url(&format!(
            "{INSTALLATIONS_PATH}/{installation_id}/gateways/{gateway_serial}/devices"
        ))?;
        self.get(url).await
    }

    // ── Features ─────────────────────────────────────────────────────

    /// Every feature resource of one device.
    pub async fn features(
        &self,
        installation_id: i64,
        gateway_serial: &str,
        device_id: &str,
    ) -> Result<Vec<RawFeature>, Error> {
        let url = self.features_url(installation_id, gateway_serial, device_id)?;
        self.get(url).await
    }

    /// A single feature resource by its dotted name.
    pub async fn feature(
        &self,
        installation_id: i64,
        gateway_serial: &str,
        device_id: &str,
        name: &str,
    ) -> Result<RawFeature, Error> {
        let base = self.features_url(installation_id, gateway_serial, device_id)?;
        let url = Url::parse(&format!("{base}/{name}"))?;
        self.get(url).await
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// POST a fully resolved parameter payload to a command URI.
    ///
    /// A 400/422 means the device understood and refused the request; it
    /// comes back as `success == false`, not as an error.
    pub async fn execute(
        &self,
        uri: &str,
        payload: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<CommandResponse, Error> {
        let url = self.api_url(uri)?;
        let resp = self.post(url, payload).await?;

        match check_status(resp).await {
            Ok(body) => parse_command_response(&body),
            Err(Error::Api {
                status: 400 | 422,
                message,
                error_type,
                ..
            }) => {
                debug!(?error_type, "command rejected by device");
                Ok(CommandResponse::rejected(Some(message), error_type))
            }
            Err(e) => Err(e),
        }
    }
}

fn parse_command_response(body: &str) -> Result<CommandResponse, Error> {
    if body.trim().is_empty() {
        return Ok(CommandResponse {
            success: true,
            message: None,
            reason: None,
        });
    }
    if let Ok(envelope) = serde_json::from_str::<DataEnvelope<CommandResponse>>(body) {
        return Ok(envelope.data);
    }
    serde_json::from_str(body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: redact(body),
    })
}

/// Translate a response status into the error taxonomy, returning the
/// body text on success.
async fn check_status(resp: reqwest::Response) -> Result<String, Error> {
    let status = resp.status();
    let retry_after_secs = retry_after_secs(&resp);

    let body = resp.text().await.map_err(Error::Transport)?;
    if status.is_success() {
        return Ok(body);
    }

    let detail: ApiErrorBody = serde_json::from_str(&body).unwrap_or_default();
    let message = detail
        .message
        .clone()
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    warn!(
        status = status.as_u16(),
        error_type = detail.error_type.as_deref().unwrap_or(""),
        error_id = detail.vi_error_id.as_deref().unwrap_or(""),
        message = %redact(&message),
        "API error"
    );

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Authentication { message },
        StatusCode::NOT_FOUND => Error::NotFound { message },
        StatusCode::TOO_MANY_REQUESTS => Error::RateLimited { retry_after_secs },
        s if s.is_server_error() => Error::Server {
            status: s.as_u16(),
            message,
        },
        s => Error::Api {
            status: s.as_u16(),
            message,
            error_id: detail.vi_error_id,
            error_type: detail.error_type,
        },
    })
}
