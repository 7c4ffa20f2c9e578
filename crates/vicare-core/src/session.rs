// ── Session ──
//
// The entry point applications hold: one authenticated API client plus
// the operations that turn its responses into immutable snapshots and
// resolved writes. Fetches suspend on the network; parsing, expansion
// and validation in between are synchronous.

use std::sync::Arc;

use futures::future::try_join_all;
use serde_json::{Map, Value};
use tracing::{debug, info};
use vicare_api::{
    CommandResponse, DeviceInfo, GatewayInfo, InstallationInfo, TokenManager, TokenStore,
    ViClient,
};

use crate::config::ClientConfig;
use crate::error::CoreError;
use crate::expand::is_valid_feature_name;
use crate::model::{Feature, FeatureValue, Resource};
use crate::resolve::{resolve_command, resolve_write};
use crate::snapshot::{Device, Gateway, Installation};

/// An account session against the cloud API.
///
/// Cheap to clone; clones share the client and the token manager.
#[derive(Clone)]
pub struct Session {
    client: Arc<ViClient>,
}

impl Session {
    pub fn new(client: Arc<ViClient>) -> Self {
        Self { client }
    }

    /// Build the HTTP client and token manager described by `config`.
    ///
    /// When `store` holds a token the session starts authenticated;
    /// otherwise drive [`TokenManager::authorization_url`] and
    /// [`TokenManager::exchange_code`] through [`auth`](Self::auth).
    pub fn connect(
        config: &ClientConfig,
        store: Option<Arc<dyn TokenStore>>,
    ) -> Result<Self, CoreError> {
        let http = config.transport().build_client()?;
        let auth = TokenManager::with_system_clock(http.clone(), config.oauth.clone(), store);
        let client = ViClient::with_client(http, config.api_base_url.clone(), Arc::new(auth));

        info!(base_url = %config.api_base_url, "session ready");
        Ok(Self::new(Arc::new(client)))
    }

    pub fn client(&self) -> &Arc<ViClient> {
        &self.client
    }

    pub fn auth(&self) -> &Arc<TokenManager> {
        self.client.auth()
    }

    // ── Discovery ───────────────────────────────────────────────────

    pub async fn installations(&self) -> Result<Vec<InstallationInfo>, CoreError> {
        Ok(self.client.installations().await?)
    }

    pub async fn gateways(&self) -> Result<Vec<GatewayInfo>, CoreError> {
        Ok(self.client.gateways().await?)
    }

    pub async fn devices(
        &self,
        installation_id: i64,
        serial: &str,
    ) -> Result<Vec<DeviceInfo>, CoreError> {
        Ok(self.client.devices(installation_id, serial).await?)
    }

    // ── Snapshots ───────────────────────────────────────────────────

    /// Fetch the complete Installation → Gateway → Device graph.
    pub async fn load_installation(&self, installation_id: i64) -> Result<Installation, CoreError> {
        let info = self
            .installations()
            .await?
            .into_iter()
            .find(|i| i.id == installation_id)
            .ok_or_else(|| CoreError::not_found("Installation", installation_id.to_string()))?;

        let gateways = self
            .gateways()
            .await?
            .into_iter()
            .filter(|g| g.installation_id == installation_id);

        let gateways = try_join_all(gateways.map(|g| self.load_gateway(g))).await?;

        debug!(
            installation_id,
            gateways = gateways.len(),
            "installation loaded"
        );
        Ok(Installation {
            id: info.id,
            description: info.description,
            gateways,
        })
    }

    async fn load_gateway(&self, info: GatewayInfo) -> Result<Gateway, CoreError> {
        let devices = self.devices(info.installation_id, &info.serial).await?;
        let devices = try_join_all(
            devices
                .iter()
                .map(|d| self.load_device(info.installation_id, &info.serial, d)),
        )
        .await?;

        Ok(Gateway {
            serial: info.serial,
            installation_id: info.installation_id,
            version: info.version,
            devices,
        })
    }

    /// Fetch every resource of one device and expand it into a snapshot.
    pub async fn load_device(
        &self,
        installation_id: i64,
        serial: &str,
        info: &DeviceInfo,
    ) -> Result<Device, CoreError> {
        let raw = self
            .client
            .features(installation_id, serial, &info.id)
            .await?;
        let device = Device::from_resources(
            installation_id,
            serial,
            info,
            raw.into_iter().map(Resource::from_raw),
        );

        debug!(
            device = %device.id,
            resources = device.resources().len(),
            features = device.features().len(),
            "device loaded"
        );
        Ok(device)
    }

    /// Re-fetch `device`. The returned snapshot is new; `device` is unchanged.
    pub async fn refresh_device(&self, device: &Device) -> Result<Device, CoreError> {
        let info = DeviceInfo {
            id: device.id.clone(),
            model_id: device.model_id.clone(),
            device_type: device.device_type.clone(),
            status: device.status.clone(),
            extra: Map::new(),
        };
        self.load_device(device.installation_id, &device.gateway_serial, &info)
            .await
    }

    /// Fetch a single resource of `device` by name.
    pub async fn fetch_resource(&self, device: &Device, name: &str) -> Result<Resource, CoreError> {
        if !is_valid_feature_name(name) {
            return Err(CoreError::not_found("Feature", format!("invalid name '{name}'")));
        }
        let raw = self
            .client
            .feature(
                device.installation_id,
                &device.gateway_serial,
                &device.id,
                name,
            )
            .await
            .map_err(|e| match e {
                vicare_api::Error::NotFound { .. } => CoreError::not_found("Feature", name),
                other => other.into(),
            })?;
        Ok(Resource::from_raw(raw))
    }

    // ── Writes ──────────────────────────────────────────────────────

    /// Set `feature` to `value`.
    ///
    /// Local failures (not writable, missing context, validation) are
    /// raised before any request. A device that refuses a well-formed
    /// command yields `Ok` with `success == false`.
    pub async fn write(
        &self,
        device: &Device,
        feature: &Feature,
        value: impl Into<FeatureValue>,
    ) -> Result<CommandResponse, CoreError> {
        let request = resolve_write(device, feature, &value.into())?;
        info!(feature = %feature.name, "writing feature");
        Ok(self.client.execute(&request.uri, &request.payload).await?)
    }

    /// Run `command_name` on one of `device`'s resources with explicit
    /// parameters.
    pub async fn execute_command(
        &self,
        device: &Device,
        resource_name: &str,
        command_name: &str,
        params: &Map<String, Value>,
    ) -> Result<CommandResponse, CoreError> {
        let resource = device
            .resource(resource_name)
            .ok_or_else(|| CoreError::MissingContext {
                feature: resource_name.to_owned(),
                missing: format!("resource '{resource_name}'"),
            })?;
        let request = resolve_command(resource, command_name, params)?;
        info!(resource = resource_name, command = command_name, "executing command");
        Ok(self.client.execute(&request.uri, &request.payload).await?)
    }
}
