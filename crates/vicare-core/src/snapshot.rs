// ── Immutable snapshots ──
//
// Installation → Gateway → Device → Feature, each level built once from
// fetched data and never mutated. Refreshing a device produces a new
// `Device`; callers holding the old one keep a consistent view.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::warn;
use vicare_api::DeviceInfo;

use crate::expand::expand;
use crate::model::{Feature, Resource};

/// One installation (a site) with every gateway and device under it.
#[derive(Debug, Clone)]
pub struct Installation {
    pub id: i64,
    pub description: Option<String>,
    pub gateways: Vec<Gateway>,
}

impl Installation {
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.gateways.iter().flat_map(|g| g.devices.iter())
    }
}

#[derive(Debug, Clone)]
pub struct Gateway {
    pub serial: String,
    pub installation_id: i64,
    pub version: Option<String>,
    pub devices: Vec<Device>,
}

/// A device and its features as of one fetch.
#[derive(Debug, Clone)]
pub struct Device {
    pub id: String,
    pub gateway_serial: String,
    pub installation_id: i64,
    pub model_id: String,
    pub device_type: String,
    pub status: String,
    pub fetched_at: DateTime<Utc>,
    resources: IndexMap<String, Arc<Resource>>,
    features: IndexMap<String, Feature>,
}

impl Device {
    /// Assemble a snapshot from fetched resources. Expansion runs here,
    /// so no partially expanded device is ever observable.
    ///
    /// Also usable with a subset of a device's resources; writes that
    /// need a resource outside that subset fail with `MissingContext`.
    pub fn from_resources(
        installation_id: i64,
        gateway_serial: impl Into<String>,
        info: &DeviceInfo,
        resources: impl IntoIterator<Item = Resource>,
    ) -> Self {
        let resources = resources
            .into_iter()
            .map(|r| (r.name.clone(), Arc::new(r)))
            .collect();

        Self::assemble(
            Identity {
                id: info.id.clone(),
                gateway_serial: gateway_serial.into(),
                installation_id,
                model_id: info.model_id.clone(),
                device_type: info.device_type.clone(),
                status: info.status.clone(),
            },
            resources,
        )
    }

    /// A new snapshot with `resource` added or replaced. `self` is untouched.
    #[must_use]
    pub fn with_resource(&self, resource: Resource) -> Self {
        let mut resources = self.resources.clone();
        resources.insert(resource.name.clone(), Arc::new(resource));
        Self::assemble(self.identity(), resources)
    }

    pub fn features(&self) -> impl ExactSizeIterator<Item = &Feature> {
        self.features.values()
    }

    /// Features whose source resource is enabled.
    pub fn enabled_features(&self) -> impl Iterator<Item = &Feature> {
        self.features.values().filter(|f| f.is_enabled)
    }

    pub fn feature(&self, name: &str) -> Option<&Feature> {
        self.features.get(name)
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.get(name).map(Arc::as_ref)
    }

    pub fn resources(&self) -> impl ExactSizeIterator<Item = &Resource> {
        self.resources.values().map(Arc::as_ref)
    }

    fn identity(&self) -> Identity {
        Identity {
            id: self.id.clone(),
            gateway_serial: self.gateway_serial.clone(),
            installation_id: self.installation_id,
            model_id: self.model_id.clone(),
            device_type: self.device_type.clone(),
            status: self.status.clone(),
        }
    }

    fn assemble(identity: Identity, resources: IndexMap<String, Arc<Resource>>) -> Self {
        let mut features: IndexMap<String, Feature> = IndexMap::new();
        for resource in resources.values() {
            for feature in expand(resource) {
                if features.contains_key(&feature.name) {
                    warn!(
                        feature = %feature.name,
                        resource = %resource.name,
                        "duplicate feature name, keeping the first"
                    );
                    continue;
                }
                features.insert(feature.name.clone(), feature);
            }
        }

        Self {
            id: identity.id,
            gateway_serial: identity.gateway_serial,
            installation_id: identity.installation_id,
            model_id: identity.model_id,
            device_type: identity.device_type,
            status: identity.status,
            fetched_at: Utc::now(),
            resources,
            features,
        }
    }
}

struct Identity {
    id: String,
    gateway_serial: String,
    installation_id: i64,
    model_id: String,
    device_type: String,
    status: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use vicare_api::RawFeature;

    use super::*;
    use crate::model::FeatureValue;

    fn info() -> DeviceInfo {
        serde_json::from_value(json!({
            "id": "0",
            "modelId": "E3_Vitodens_100",
            "deviceType": "heating",
            "status": "Online"
        }))
        .unwrap()
    }

    fn resource(value: serde_json::Value) -> Resource {
        let raw: RawFeature = serde_json::from_value(value).unwrap();
        Resource::from_raw(raw)
    }

    fn outside(temp: f64) -> Resource {
        resource(json!({
            "feature": "heating.sensors.temperature.outside",
            "properties": { "value": { "type": "number", "value": temp, "unit": "celsius" } }
        }))
    }

    #[test]
    fn snapshot_indexes_features_and_resources() {
        let pump = resource(json!({
            "feature": "heating.circuits.0.circulation.pump",
            "isEnabled": false,
            "properties": { "status": { "type": "string", "value": "off" } }
        }));
        let device = Device::from_resources(123, "7571381234567890", &info(), [outside(4.5), pump]);

        assert_eq!(device.features().len(), 2);
        assert_eq!(device.enabled_features().count(), 1);
        assert_eq!(
            device.feature("heating.sensors.temperature.outside").unwrap().value,
            FeatureValue::number(4.5).unwrap()
        );
        assert!(device.resource("heating.circuits.0.circulation.pump").is_some());
        assert_eq!(device.model_id, "E3_Vitodens_100");
    }

    #[test]
    fn with_resource_leaves_original_untouched() {
        let old = Device::from_resources(123, "7571381234567890", &info(), [outside(4.5)]);

        let new = old.with_resource(outside(6.0));

        let name = "heating.sensors.temperature.outside";
        assert_eq!(old.feature(name).unwrap().value, FeatureValue::number(4.5).unwrap());
        assert_eq!(new.feature(name).unwrap().value, FeatureValue::number(6.0).unwrap());
        assert_eq!(new.id, old.id);
    }
}
