// ── Command resolution ──
//
// Maps a write intent back onto the remote command contract. Commands
// take all their parameters at once, so a write to one flat feature must
// carry the current values of its siblings. Those come from the parent
// resource already in the snapshot; nothing here touches the network.

use serde_json::{Map, Value};
use tracing::debug;

use crate::constraint::validate;
use crate::error::{CoreError, ValidationError, Violation};
use crate::expand::{is_metadata, param_for_key};
use crate::model::{CommandSpec, Feature, FeatureValue, Resource};
use crate::snapshot::Device;

/// A fully validated command invocation, ready to POST.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub uri: String,
    pub payload: Map<String, Value>,
}

/// Resolve setting `feature` to `new_value` into a command invocation.
///
/// Every parameter in the payload is validated, not only the one being
/// changed: a sibling whose current value violates its own constraint
/// fails the whole write.
pub fn resolve_write(
    device: &Device,
    feature: &Feature,
    new_value: &FeatureValue,
) -> Result<WriteRequest, CoreError> {
    let control = feature
        .control
        .as_ref()
        .ok_or_else(|| CoreError::NotWritable {
            feature: feature.name.clone(),
            reason: "no command controls this value".into(),
        })?;

    let parent = device
        .resource(&control.parent_feature_name)
        .ok_or_else(|| CoreError::MissingContext {
            feature: feature.name.clone(),
            missing: format!("resource '{}'", control.parent_feature_name),
        })?;
    let command =
        parent
            .commands
            .get(&control.command_name)
            .ok_or_else(|| CoreError::MissingContext {
                feature: feature.name.clone(),
                missing: format!(
                    "command '{}' on '{}'",
                    control.command_name, parent.name
                ),
            })?;

    let mut payload = Map::new();
    for param in &control.required_params {
        let value = if *param == control.param_name {
            new_value.to_json()
        } else {
            current_param_value(parent, &control.command_name, command, param).ok_or_else(
                || CoreError::MissingContext {
                    feature: feature.name.clone(),
                    missing: format!("current value of parameter '{param}'"),
                },
            )?
        };
        payload.insert(param.clone(), value);
    }

    validate_payload(command, &payload)?;

    debug!(
        feature = %feature.name,
        command = %control.command_name,
        params = payload.len(),
        "resolved write"
    );
    Ok(WriteRequest {
        uri: control.uri.clone(),
        payload,
    })
}

/// Resolve an explicit invocation of `command_name` on `resource`.
///
/// Required parameters must be present; extra parameters are passed
/// through as given.
pub fn resolve_command(
    resource: &Resource,
    command_name: &str,
    params: &Map<String, Value>,
) -> Result<WriteRequest, CoreError> {
    let Some(command) = resource.commands.get(command_name) else {
        let available: Vec<&str> = resource.commands.keys().map(String::as_str).collect();
        return Err(CoreError::not_found(
            "Command",
            format!(
                "'{command_name}' on '{}' (available: {})",
                resource.name,
                available.join(", ")
            ),
        ));
    };

    let uri = match (&command.uri, command.is_executable) {
        (Some(uri), true) => uri.clone(),
        (None, _) => {
            return Err(CoreError::NotWritable {
                feature: resource.name.clone(),
                reason: format!("command '{command_name}' has no target URI"),
            });
        }
        (Some(_), false) => {
            return Err(CoreError::NotWritable {
                feature: resource.name.clone(),
                reason: format!("command '{command_name}' is not executable right now"),
            });
        }
    };

    if let Some(missing) = command
        .params
        .values()
        .find(|p| p.required && !params.contains_key(&p.name))
    {
        return Err(ValidationError {
            param: missing.name.clone(),
            value: "<missing>".into(),
            violation: Violation::Missing,
        }
        .into());
    }

    validate_payload(command, params)?;

    Ok(WriteRequest {
        uri,
        payload: params.clone(),
    })
}

fn validate_payload(command: &CommandSpec, payload: &Map<String, Value>) -> Result<(), CoreError> {
    for (name, value) in payload {
        if let Some(spec) = command.params.get(name) {
            validate(name, value, &spec.constraint)?;
        }
    }
    Ok(())
}

/// Current value of `param`, read from whichever property of `parent`
/// feeds it.
fn current_param_value(
    parent: &Resource,
    command_name: &str,
    command: &CommandSpec,
    param: &str,
) -> Option<Value> {
    parent
        .properties
        .iter()
        .filter(|(key, payload)| !is_metadata(key, payload))
        .find(|(key, _)| {
            param_for_key(command_name, command, key).is_some_and(|p| p.name == param)
        })
        .and_then(|(key, _)| parent.property_value(key))
        .filter(|v| !v.is_null())
        .cloned()
}
