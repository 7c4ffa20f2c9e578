// ── Parsed resources ──
//
// A `Resource` is a raw feature resource with its commands resolved into
// typed parameter declarations. Property payloads stay as JSON: the
// expander decides how to flatten them.

use indexmap::IndexMap;
use serde_json::Value;
use vicare_api::{RawCommand, RawFeature};

use crate::constraint::ParamConstraint;

/// One fetched feature resource. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    /// Dotted resource name (e.g. `heating.circuits.0.heating.curve`).
    pub name: String,
    pub is_enabled: bool,
    pub is_ready: bool,
    pub properties: IndexMap<String, Value>,
    pub commands: IndexMap<String, CommandSpec>,
    pub timestamp: Option<String>,
}

/// A named command with its parameters in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub name: String,
    pub uri: Option<String>,
    pub is_executable: bool,
    pub params: IndexMap<String, ParamSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub required: bool,
    pub constraint: ParamConstraint,
}

impl Resource {
    pub fn from_raw(raw: RawFeature) -> Self {
        let commands = raw
            .commands
            .into_iter()
            .map(|(name, cmd)| {
                let spec = CommandSpec::from_raw(&name, cmd);
                (name, spec)
            })
            .collect();

        Self {
            name: raw.feature,
            is_enabled: raw.is_enabled,
            is_ready: raw.is_ready,
            properties: raw.properties,
            commands,
            timestamp: raw.timestamp,
        }
    }

    /// The data carried by property `key`, with metadata stripped.
    ///
    /// `{"type":"number","value":1.4}` yields `1.4`; a bare payload yields
    /// itself.
    pub fn property_value(&self, key: &str) -> Option<&Value> {
        self.properties.get(key).map(payload_value)
    }
}

impl CommandSpec {
    pub fn from_raw(name: &str, raw: RawCommand) -> Self {
        let params = raw
            .params
            .iter()
            .map(|(param, decl)| {
                let spec = ParamSpec {
                    name: param.clone(),
                    required: decl.get("required").and_then(Value::as_bool) != Some(false),
                    constraint: ParamConstraint::from_json(param, decl),
                };
                (param.clone(), spec)
            })
            .collect();

        Self {
            name: raw.name.unwrap_or_else(|| name.to_owned()),
            uri: raw.uri,
            is_executable: raw.is_executable,
            params,
        }
    }

    /// Executable commands with a target URI can back a control.
    pub fn is_writable(&self) -> bool {
        self.is_executable && self.uri.is_some()
    }

    /// Names of the parameters that must be sent, in declaration order.
    pub fn required_params(&self) -> Vec<String> {
        self.params
            .values()
            .filter(|p| p.required)
            .map(|p| p.name.clone())
            .collect()
    }
}

/// Strip the metadata wrapper from a property payload.
pub(crate) fn payload_value(payload: &Value) -> &Value {
    match payload {
        Value::Object(map) => map.get("value").unwrap_or(payload),
        other => other,
    }
}

/// The `unit` declared on a property payload, if any.
pub(crate) fn payload_unit(payload: &Value) -> Option<&str> {
    payload.get("unit").and_then(Value::as_str)
}
