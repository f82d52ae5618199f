//! Reusable tool definitions.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::flow::FlowDefinition;
use crate::function::FunctionDefinition;
use crate::modifier::ModifierSet;

/// A reusable unit contributing remote functions and a fragment of workflow state.
///
/// When `flow_definition` is absent the fragment is generated from `functions`, with `modifiers`
/// applied to the generated states.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ToolDefinition {
    /// Stable identifier used to look the tool up in a registry.
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub functions: Vec<FunctionDefinition>,
    #[serde(default)]
    pub flow_definition: Option<FlowDefinition>,
    /// Default flow input contributed by this tool.
    #[serde(default)]
    pub flow_input: IndexMap<String, Value>,
    /// Input keys that must be present before a run can start.
    #[serde(default)]
    pub required_input: Vec<String>,
    #[serde(default)]
    pub modifiers: ModifierSet,
}

impl ToolDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_function(mut self, function: FunctionDefinition) -> Self {
        self.functions.push(function);
        self
    }

    pub fn with_flow(mut self, flow: FlowDefinition) -> Self {
        self.flow_definition = Some(flow);
        self
    }

    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.flow_input.insert(key.into(), value.into());
        self
    }

    pub fn with_required_input(mut self, key: impl Into<String>) -> Self {
        self.required_input.push(key.into());
        self
    }

    pub fn with_modifiers(mut self, modifiers: ModifierSet) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Keys this tool reads from flow input: its defaults plus its required keys.
    pub fn input_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.flow_input.keys().map(String::as_str).collect();
        for required in &self.required_input {
            if !keys.contains(&required.as_str()) {
                keys.push(required);
            }
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_manifest_entry() {
        let yaml = r#"
id: hello-world
description: Say hello
functions:
  - name: hello_world
    source: "def hello_world(data): return 'hi'"
flow_input:
  compute_endpoint: ep-uuid
required_input: [compute_endpoint, name]
modifiers:
  hello_world:
    payload: name
"#;
        let tool: ToolDefinition = serde_yaml::from_str(yaml).expect("tool parses");
        assert_eq!(tool.id, "hello-world");
        assert_eq!(tool.functions[0].name, "hello_world");
        assert_eq!(tool.input_keys(), vec!["compute_endpoint", "name"]);
        assert_eq!(tool.modifiers.len(), 1);
    }
}
