// ── Feature expansion ──
//
// Turns one nested resource into flat scalar features. A resource whose
// data keys are all "primary" (`value`, `status`, ...) is a single
// feature under its own name; anything else is composite and yields one
// child per data key. Structured payloads are walked down to scalars so
// no feature value is ever a list or a map.

use serde_json::Value;
use tracing::trace;

use crate::model::resource::{payload_unit, payload_value};
use crate::model::{CommandSpec, Feature, FeatureControl, FeatureValue, ParamSpec, Resource};

/// Keys that carry the single value of a simple resource, in precedence order.
const PRIMARY_KEYS: [&str; 5] = ["value", "status", "active", "enabled", "strength"];

/// Keys that describe other properties and are never features themselves.
const METADATA_KEYS: [&str; 5] = ["unit", "type", "displayValue", "components", "links"];

/// Bounds are metadata when bare, data when they carry their own payload.
const BOUND_KEYS: [&str; 2] = ["min", "max"];

/// Expand `resource` into its flat features.
///
/// Deterministic: the same resource always yields the same features in
/// the same order. A resource without data properties yields none.
pub fn expand(resource: &Resource) -> Vec<Feature> {
    let default_unit = resource.properties.get("unit").and_then(Value::as_str);
    let data_keys: Vec<&str> = resource
        .properties
        .iter()
        .filter(|(key, payload)| !is_metadata(key, payload))
        .map(|(key, _)| key.as_str())
        .collect();

    let mut out = Vec::new();
    if data_keys.is_empty() {
        return out;
    }

    if data_keys.iter().all(|k| PRIMARY_KEYS.contains(k)) {
        if let Some(key) = PRIMARY_KEYS.iter().find(|k| data_keys.contains(*k)) {
            emit(resource, key, resource.name.clone(), default_unit, &mut out);
        }
    } else {
        for key in data_keys {
            let name = if key == "value" {
                resource.name.clone()
            } else {
                format!("{}.{key}", resource.name)
            };
            emit(resource, key, name, default_unit, &mut out);
        }
    }

    trace!(resource = %resource.name, features = out.len(), "expanded");
    out
}

/// `true` if `name` follows the `segment(.segment)*` grammar.
pub fn is_valid_feature_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .split('.')
            .all(|seg| !seg.is_empty() && seg.chars().all(|c| c.is_ascii_alphanumeric()))
}

pub(crate) fn is_metadata(key: &str, payload: &Value) -> bool {
    METADATA_KEYS.contains(&key) || (BOUND_KEYS.contains(&key) && !payload.is_object())
}

/// The parameter of `command` that property `key` feeds, if any.
///
/// Matches by name, then the `temperature` alias, then (for
/// single-parameter commands) by the key appearing in the command name.
pub(crate) fn param_for_key<'a>(
    command_name: &str,
    command: &'a CommandSpec,
    key: &str,
) -> Option<&'a ParamSpec> {
    if !command.is_writable() {
        return None;
    }
    if let Some(param) = command.params.get(key) {
        return Some(param);
    }
    if key == "temperature" {
        if let Some(param) = command.params.get("targetTemperature") {
            return Some(param);
        }
    }
    if command.params.len() == 1 {
        let only = command.params.values().next()?;
        if key == "value" || command_name.to_lowercase().contains(&key.to_lowercase()) {
            return Some(only);
        }
    }
    None
}

fn emit(
    resource: &Resource,
    key: &str,
    name: String,
    default_unit: Option<&str>,
    out: &mut Vec<Feature>,
) {
    let Some(payload) = resource.properties.get(key) else {
        return;
    };
    let unit = payload_unit(payload).or(default_unit);
    let data = payload_value(payload);

    match FeatureValue::from_json(data) {
        Some(value) => out.push(Feature {
            control: control_for(resource, key),
            name,
            value,
            unit: unit.map(str::to_owned),
            is_ready: resource.is_ready,
            is_enabled: resource.is_enabled,
        }),
        None => flatten(resource, &name, data, unit, out),
    }
}

/// Walk a structured payload down to read-only scalar leaves.
fn flatten(
    resource: &Resource,
    name: &str,
    data: &Value,
    unit: Option<&str>,
    out: &mut Vec<Feature>,
) {
    match data {
        Value::Null => {}
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten(resource, &format!("{name}.{i}"), item, unit, out);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                if METADATA_KEYS.contains(&key.as_str()) {
                    continue;
                }
                flatten(resource, &format!("{name}.{key}"), item, unit, out);
            }
        }
        scalar => {
            if let Some(value) = FeatureValue::from_json(scalar) {
                out.push(Feature {
                    name: name.to_owned(),
                    value,
                    unit: unit.map(str::to_owned),
                    is_ready: resource.is_ready,
                    is_enabled: resource.is_enabled,
                    control: None,
                });
            }
        }
    }
}

fn control_for(resource: &Resource, key: &str) -> Option<FeatureControl> {
    resource.commands.iter().find_map(|(command_name, command)| {
        let param = param_for_key(command_name, command, key)?;
        let uri = command.uri.clone()?;
        let required_params = command
            .params
            .values()
            .filter(|p| p.required || p.name == param.name)
            .map(|p| p.name.clone())
            .collect();

        Some(FeatureControl {
            command_name: command_name.clone(),
            param_name: param.name.clone(),
            required_params,
            parent_feature_name: resource.name.clone(),
            uri,
            constraint: param.constraint.clone(),
        })
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use vicare_api::RawFeature;

    use super::*;

    fn resource(value: Value) -> Resource {
        let raw: RawFeature = serde_json::from_value(value).unwrap();
        Resource::from_raw(raw)
    }

    fn curve() -> Resource {
        resource(json!({
            "feature": "heating.circuits.0.heating.curve",
            "isEnabled": true,
            "isReady": true,
            "properties": {
                "slope": { "value": 1.4, "type": "number" },
                "shift": { "value": 0, "type": "number" }
            },
            "commands": {
                "setCurve": {
                    "uri": "/x",
                    "params": {
                        "slope": { "type": "number", "constraints": { "min": 0.2, "max": 3.5, "stepping": 0.1 } },
                        "shift": { "type": "number", "constraints": { "min": -13, "max": 40, "stepping": 1 } }
                    }
                }
            }
        }))
    }

    fn names(features: &[Feature]) -> Vec<&str> {
        features.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn composite_curve_expands_to_writable_children() {
        let features = expand(&curve());

        assert_eq!(
            names(&features),
            [
                "heating.circuits.0.heating.curve.slope",
                "heating.circuits.0.heating.curve.shift"
            ]
        );
        assert_eq!(features[0].value, FeatureValue::number(1.4).unwrap());
        assert_eq!(features[1].value, FeatureValue::from(0_i64));

        let control = features[0].control.as_ref().unwrap();
        assert_eq!(control.command_name, "setCurve");
        assert_eq!(control.param_name, "slope");
        assert_eq!(control.required_params, ["slope", "shift"]);
        assert_eq!(control.parent_feature_name, "heating.circuits.0.heating.curve");
        assert_eq!(control.uri, "/x");
        assert_eq!(control.min(), Some(0.2));
        assert_eq!(control.max(), Some(3.5));
        assert_eq!(control.step(), Some(0.1));

        assert_eq!(
            features[1].control.as_ref().unwrap().param_name,
            "shift"
        );
    }

    #[test]
    fn bare_value_with_unit_is_one_read_only_feature() {
        let res = resource(json!({
            "feature": "heating.boiler.sensors.temperature.main",
            "properties": { "value": 12.5, "unit": "celsius" }
        }));

        let features = expand(&res);

        assert_eq!(
            features,
            [Feature {
                name: "heating.boiler.sensors.temperature.main".into(),
                value: FeatureValue::number(12.5).unwrap(),
                unit: Some("celsius".into()),
                is_ready: true,
                is_enabled: true,
                control: None,
            }]
        );
    }

    #[test]
    fn simple_resource_prefers_value_over_status() {
        let res = resource(json!({
            "feature": "heating.dhw.sensors.temperature.hotWaterStorage",
            "properties": {
                "status": { "type": "string", "value": "connected" },
                "value": { "type": "number", "value": 45.2, "unit": "celsius" }
            }
        }));

        let features = expand(&res);

        assert_eq!(features.len(), 1);
        assert_eq!(features[0].value, FeatureValue::number(45.2).unwrap());
        assert_eq!(features[0].unit.as_deref(), Some("celsius"));
    }

    #[test]
    fn single_parameter_command_controls_simple_value() {
        let res = resource(json!({
            "feature": "heating.dhw.temperature.main",
            "properties": { "value": { "type": "number", "value": 50, "unit": "celsius" } },
            "commands": {
                "setTargetTemperature": {
                    "uri": "/dhw",
                    "params": { "temperature": { "type": "number", "constraints": { "min": 10, "max": 60, "stepping": 1 } } }
                }
            }
        }));

        let features = expand(&res);
        let control = features[0].control.as_ref().unwrap();

        assert_eq!(control.command_name, "setTargetTemperature");
        assert_eq!(control.param_name, "temperature");
        assert_eq!(control.required_params, ["temperature"]);
    }

    #[test]
    fn control_exposes_declared_options() {
        let mode = resource(json!({
            "feature": "heating.circuits.0.operating.modes.active",
            "properties": { "value": { "type": "string", "value": "dhw" } },
            "commands": {
                "setMode": {
                    "uri": "/mode",
                    "params": { "mode": { "type": "string", "constraints": { "enum": ["standby", "dhw"] } } }
                }
            }
        }));
        let level = resource(json!({
            "feature": "ventilation.operating.level",
            "properties": { "value": { "type": "number", "value": 2 } },
            "commands": {
                "setLevel": {
                    "uri": "/level",
                    "params": { "level": { "type": "integer", "constraints": { "enum": [1, 2, 3] } } }
                }
            }
        }));

        let mode = expand(&mode);
        let mode = mode[0].control.as_ref().unwrap();
        assert_eq!(mode.options(), Some(&["standby".to_owned(), "dhw".to_owned()][..]));
        assert_eq!(mode.numeric_options(), None);

        let level = expand(&level);
        let level = level[0].control.as_ref().unwrap();
        assert_eq!(level.numeric_options(), Some(&[1.0, 2.0, 3.0][..]));
        assert_eq!(level.options(), None);
    }

    #[test]
    fn composite_value_key_keeps_resource_name() {
        let res = resource(json!({
            "feature": "heating.dhw.temperature.hysteresis",
            "properties": {
                "value": { "type": "number", "value": 5, "unit": "kelvin" },
                "switchOnValue": { "type": "number", "value": 5, "unit": "kelvin" },
                "switchOffValue": { "type": "number", "value": 0, "unit": "kelvin" }
            },
            "commands": {
                "setHysteresis": {
                    "uri": "/h",
                    "params": { "hysteresis": { "type": "number" } }
                },
                "setHysteresisSwitchOnValue": {
                    "uri": "/h-on",
                    "params": { "hysteresis": { "type": "number" } }
                },
                "setHysteresisSwitchOffValue": {
                    "uri": "/h-off",
                    "params": { "hysteresis": { "type": "number" } }
                }
            }
        }));

        let features = expand(&res);

        assert_eq!(
            names(&features),
            [
                "heating.dhw.temperature.hysteresis",
                "heating.dhw.temperature.hysteresis.switchOnValue",
                "heating.dhw.temperature.hysteresis.switchOffValue"
            ]
        );
        let commands: Vec<_> = features
            .iter()
            .map(|f| f.control.as_ref().unwrap().command_name.as_str())
            .collect();
        assert_eq!(
            commands,
            ["setHysteresis", "setHysteresisSwitchOnValue", "setHysteresisSwitchOffValue"]
        );
    }

    #[test]
    fn composite_yields_one_feature_per_key() {
        let res = resource(json!({
            "feature": "heating.power.consumption.summary.dhw",
            "properties": {
                "currentDay": { "type": "number", "value": 0.4, "unit": "kilowattHour" },
                "lastSevenDays": { "type": "number", "value": 6.1, "unit": "kilowattHour" },
                "currentMonth": { "type": "number", "value": 11.3, "unit": "kilowattHour" },
                "lastMonth": { "type": "number", "value": 27.9, "unit": "kilowattHour" },
                "lastYear": { "type": "number", "value": 301.0, "unit": "kilowattHour" }
            }
        }));

        let features = expand(&res);
        let prefix = format!("{}.", res.name);
        let suffixes: Vec<_> = features
            .iter()
            .map(|f| f.name.strip_prefix(&prefix).unwrap())
            .collect();
        let keys: Vec<_> = res.properties.keys().map(String::as_str).collect();

        assert_eq!(suffixes, keys);
        assert!(features.iter().all(|f| f.control.is_none()));
    }

    #[test]
    fn expanding_a_rewrapped_simple_feature_is_a_fixed_point() {
        let res = resource(json!({
            "feature": "heating.outside.temperature",
            "isReady": false,
            "properties": { "value": { "type": "number", "value": -3.5, "unit": "celsius" } }
        }));

        let first = expand(&res);
        let feature = &first[0];
        let rewrapped = resource(json!({
            "feature": feature.name,
            "isReady": feature.is_ready,
            "isEnabled": feature.is_enabled,
            "properties": { "value": { "value": feature.value, "unit": feature.unit } }
        }));

        assert_eq!(expand(&rewrapped), first);
        assert_eq!(expand(&res), first);
    }

    #[test]
    fn empty_properties_yield_no_features() {
        let res = resource(json!({ "feature": "heating.circuits", "properties": {} }));

        assert!(expand(&res).is_empty());
    }

    #[test]
    fn structured_payloads_flatten_to_read_only_scalars() {
        let res = resource(json!({
            "feature": "heating.gas.consumption.heating",
            "properties": {
                "day": { "type": "array", "value": [1.2, 3.4, null], "unit": "cubicMeter" },
                "dayValueReadAt": { "type": "string", "value": "2024-01-01T00:00:00Z" }
            },
            "commands": {
                "reset": { "uri": "/reset", "params": { "day": { "type": "array" } } }
            }
        }));

        let features = expand(&res);

        assert_eq!(
            names(&features),
            [
                "heating.gas.consumption.heating.day.0",
                "heating.gas.consumption.heating.day.1",
                "heating.gas.consumption.heating.dayValueReadAt"
            ]
        );
        assert_eq!(features[0].unit.as_deref(), Some("cubicMeter"));
        assert!(features.iter().all(|f| f.control.is_none()));
        assert!(features.iter().all(|f| is_valid_feature_name(&f.name)));
    }

    #[test]
    fn nested_entries_flatten_by_key() {
        let res = resource(json!({
            "feature": "device.messages.errors.raw",
            "properties": {
                "entries": {
                    "type": "array",
                    "value": [{ "errorCode": "F.160", "timestamp": "2024-01-01T00:00:00Z" }]
                }
            }
        }));

        let features = expand(&res);

        assert_eq!(
            names(&features),
            [
                "device.messages.errors.raw.entries.0.errorCode",
                "device.messages.errors.raw.entries.0.timestamp"
            ]
        );
    }

    #[test]
    fn non_executable_command_gives_no_control() {
        let res = resource(json!({
            "feature": "heating.circuits.0.operating.modes.active",
            "isEnabled": false,
            "properties": { "value": { "type": "string", "value": "dhw" } },
            "commands": {
                "setMode": {
                    "uri": "/mode",
                    "isExecutable": false,
                    "params": { "mode": { "type": "string", "constraints": { "enum": ["dhw", "standby"] } } }
                }
            }
        }));

        let features = expand(&res);

        assert_eq!(features.len(), 1);
        assert!(!features[0].is_enabled);
        assert!(features[0].control.is_none());
    }

    #[test]
    fn bare_bounds_are_metadata() {
        let res = resource(json!({
            "feature": "heating.circuits.0.temperature.levels",
            "properties": {
                "value": 21,
                "min": 3,
                "max": 37,
                "unit": "celsius"
            }
        }));

        let features = expand(&res);

        assert_eq!(names(&features), ["heating.circuits.0.temperature.levels"]);
    }

    #[test]
    fn feature_name_grammar() {
        assert!(is_valid_feature_name("heating.circuits.0.heating.curve"));
        assert!(is_valid_feature_name("device"));
        assert!(!is_valid_feature_name(""));
        assert!(!is_valid_feature_name("heating..curve"));
        assert!(!is_valid_feature_name("heating.curve."));
        assert!(!is_valid_feature_name("heating/curve"));
        assert!(!is_valid_feature_name("heating.cur ve"));
    }
}
