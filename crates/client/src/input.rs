//! Flow input assembly and validation.
//!
//! Default input is built from registered function ids and each tool's `flow_input`, then
//! overridden by configured values for the keys the tool reads. Configured values come from the
//! private store first and the shared store second, so shared values win.

use flowsmith_types::{ConfigurationError, ToolDefinition};
use flowsmith_util::LayeredConfig;
use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Value};
use tracing::debug;

/// Key every flow input is nested under.
pub const INPUT_KEY: &str = "input";

/// Default input for `tools`, wrapped under `input`.
pub fn default_input(function_ids: &IndexMap<String, String>, tools: &[ToolDefinition], config: &LayeredConfig<'_>, section: &str) -> Value {
    let mut input = JsonMap::new();
    for (key, id) in function_ids {
        input.insert(key.clone(), Value::String(id.clone()));
    }

    let configured = config.section(section);
    for tool in tools {
        for (key, value) in &tool.flow_input {
            input.insert(key.clone(), value.clone());
        }
        for key in tool.input_keys() {
            if let Some(value) = configured.get(key) {
                debug!(tool = %tool.id, key, "using configured input value");
                input.insert(key.to_string(), Value::String(value.clone()));
            }
        }
    }

    let mut wrapped = JsonMap::new();
    wrapped.insert(INPUT_KEY.to_string(), Value::Object(input));
    Value::Object(wrapped)
}

/// Overlay caller input onto `base`.
///
/// The caller input must be exactly `{"input": {...}}` with a non-empty object; anything else is
/// a [`ConfigurationError::MalformedFlowInput`].
pub fn merge_input(mut base: Value, caller: Option<&Value>) -> Result<Value, ConfigurationError> {
    let Some(caller) = caller else {
        return Ok(base);
    };
    let overrides = caller_overrides(caller)?;

    if !base.is_object() {
        base = Value::Object(JsonMap::new());
    }
    let Some(envelope) = base.as_object_mut() else {
        return Ok(base);
    };
    let target = envelope.entry(INPUT_KEY).or_insert_with(|| Value::Object(JsonMap::new()));
    if !target.is_object() {
        *target = Value::Object(JsonMap::new());
    }
    if let Some(target) = target.as_object_mut() {
        for (key, value) in overrides {
            target.insert(key.clone(), value.clone());
        }
    }
    Ok(base)
}

fn caller_overrides(caller: &Value) -> Result<&JsonMap<String, Value>, ConfigurationError> {
    let malformed = || ConfigurationError::MalformedFlowInput {
        keys: caller.as_object().map(|object| object.keys().cloned().collect()).unwrap_or_default(),
    };
    let object = caller.as_object().ok_or_else(malformed)?;
    if object.len() != 1 {
        return Err(malformed());
    }
    match object.get(INPUT_KEY).and_then(Value::as_object) {
        Some(inner) if !inner.is_empty() => Ok(inner),
        _ => Err(malformed()),
    }
}

/// Verify every tool's required keys are present under `input`.
pub fn check_input(tools: &[ToolDefinition], flow_input: &Value) -> Result<(), ConfigurationError> {
    let input = flow_input.get(INPUT_KEY);
    for tool in tools {
        for key in &tool.required_input {
            if input.and_then(|input| input.get(key)).is_none() {
                return Err(ConfigurationError::missing_required_input(&tool.id, key));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowsmith_util::MemoryConfigStore;
    use serde_json::json;

    fn tool() -> ToolDefinition {
        ToolDefinition::new("transfer")
            .with_input("source_path", "/default")
            .with_required_input("destination_path")
    }

    #[test]
    fn configured_values_override_defaults_and_shared_wins() {
        let shared = MemoryConfigStore::new().with_section("client", [("destination_path", "/shared")]);
        let private = MemoryConfigStore::new().with_section("client", [("destination_path", "/private"), ("source_path", "/private-src")]);
        let ids: IndexMap<String, String> = [("hello_function_id".to_string(), "fn-1".to_string())].into_iter().collect();

        let input = default_input(&ids, &[tool()], &LayeredConfig::new(&shared, &private), "client");
        assert_eq!(
            input,
            json!({ "input": {
                "hello_function_id": "fn-1",
                "source_path": "/private-src",
                "destination_path": "/shared"
            }})
        );
    }

    #[test]
    fn caller_input_must_use_the_envelope() {
        let base = json!({ "input": { "a": 1 } });
        assert_eq!(merge_input(base.clone(), None).unwrap(), base);

        let merged = merge_input(base.clone(), Some(&json!({ "input": { "a": 2, "b": 3 } }))).unwrap();
        assert_eq!(merged, json!({ "input": { "a": 2, "b": 3 } }));

        for bad in [json!({ "a": 1 }), json!({ "input": {} }), json!({ "input": { "a": 1 }, "extra": 1 }), json!([1])] {
            assert!(matches!(merge_input(base.clone(), Some(&bad)), Err(ConfigurationError::MalformedFlowInput { .. })));
        }
    }

    #[test]
    fn missing_required_input_names_tool_and_key() {
        let error = check_input(&[tool()], &json!({ "input": { "source_path": "/x" } })).unwrap_err();
        assert_eq!(error, ConfigurationError::missing_required_input("transfer", "destination_path"));
        assert!(check_input(&[tool()], &json!({ "input": { "destination_path": "/y" } })).is_ok());
    }
}
