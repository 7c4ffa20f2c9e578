// ViCare API response types
//
// Wire shapes for the discovery, feature and command endpoints. Every
// response is wrapped in a `{ "data": ... }` envelope. Fields use
// `#[serde(default)]` liberally because device firmware decides which
// keys show up; anything not modelled explicitly lands in `extra`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

// ── Envelopes ────────────────────────────────────────────────────────

/// Standard `{ "data": ... }` envelope.
#[derive(Debug, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

/// Error body returned alongside 4xx/5xx statuses.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    #[serde(default)]
    pub vi_error_id: Option<String>,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

// ── Discovery ────────────────────────────────────────────────────────

/// One entry of `GET /iot/v2/equipment/installations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationInfo {
    pub id: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub installation_type: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One entry of `GET /iot/v2/equipment/gateways`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayInfo {
    pub serial: String,
    pub installation_id: i64,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub gateway_type: Option<String>,
    #[serde(default)]
    pub aggregated_status: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One entry of `GET .../installations/{id}/gateways/{serial}/devices`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub id: String,
    #[serde(default)]
    pub model_id: String,
    #[serde(default)]
    pub device_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ── Features ─────────────────────────────────────────────────────────

/// A raw feature resource exactly as the API nests it.
///
/// ```json
/// { "feature": "heating.circuits.0.heating.curve",
///   "isEnabled": true, "isReady": true,
///   "properties": { "slope": { "type": "number", "value": 1.4 } },
///   "commands": { "setCurve": { "uri": "...", "params": { ... } } } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFeature {
    pub feature: String,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    #[serde(default = "default_true")]
    pub is_ready: bool,
    #[serde(default)]
    pub properties: IndexMap<String, serde_json::Value>,
    #[serde(default)]
    pub commands: IndexMap<String, RawCommand>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// A command descriptor nested under a feature's `commands`.
///
/// `params` stay as raw JSON here; `vicare-core` resolves them into typed
/// constraints once, at parse time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCommand {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub is_executable: bool,
    #[serde(default)]
    pub params: IndexMap<String, serde_json::Value>,
}

// ── Commands ─────────────────────────────────────────────────────────

/// Outcome of a single command POST.
///
/// A well-formed request the device refuses still yields a value here
/// (`success == false`) rather than an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl CommandResponse {
    pub fn rejected(message: Option<String>, reason: Option<String>) -> Self {
        Self {
            success: false,
            message,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn raw_feature_defaults_missing_flags_to_true() {
        let raw: RawFeature = serde_json::from_value(json!({
            "feature": "heating.boiler.sensors.temperature.main",
            "properties": { "value": { "type": "number", "value": 12.5, "unit": "celsius" } }
        }))
        .unwrap();

        assert!(raw.is_enabled);
        assert!(raw.is_ready);
        assert!(raw.commands.is_empty());
    }

    #[test]
    fn command_params_keep_declaration_order() {
        let raw: RawCommand = serde_json::from_value(json!({
            "uri": "/x",
            "params": { "slope": {}, "shift": {}, "alpha": {} }
        }))
        .unwrap();

        let names: Vec<_> = raw.params.keys().map(String::as_str).collect();
        assert_eq!(names, ["slope", "shift", "alpha"]);
        assert!(raw.is_executable);
    }

    #[test]
    fn device_info_keeps_unknown_fields() {
        let info: DeviceInfo = serde_json::from_value(json!({
            "id": "0",
            "modelId": "E3_Vitodens_100_0421",
            "deviceType": "heating",
            "status": "Online",
            "roles": ["type:boiler"]
        }))
        .unwrap();

        assert_eq!(info.model_id, "E3_Vitodens_100_0421");
        assert!(info.extra.contains_key("roles"));
    }
}
