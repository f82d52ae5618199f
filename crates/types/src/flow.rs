//! Workflow state graph definitions.
//!
//! A flow is a mapping of named states to their definitions. Parameter values inside a state are
//! either literals or path expressions (strings starting with `$.`). The workflow engine tells the
//! two apart by key: a key ending in `.$` holds a path to resolve from live execution data, a
//! plain key holds a literal.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value};

/// Prefix marking a value as "resolve from run-time data".
pub const PATH_SENTINEL: &str = "$.";

/// Suffix appended to a parameter key whose value is a path expression.
pub const REFERENCE_SUFFIX: &str = ".$";

pub const PARAMETERS_KEY: &str = "Parameters";
pub const TASKS_KEY: &str = "tasks";

/// A single state definition: parameter name to value or reference.
pub type StateDefinition = JsonMap<String, Value>;

/// Canonical workflow definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FlowDefinition {
    #[serde(rename = "Comment", default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(rename = "StartAt")]
    pub start_at: String,
    /// States in authoring order.
    #[serde(rename = "States")]
    pub states: IndexMap<String, StateDefinition>,
    /// Any other top-level keys the author supplied, carried through untouched.
    #[serde(flatten)]
    pub extra: JsonMap<String, Value>,
}

impl FlowDefinition {
    pub fn state(&self, name: &str) -> Option<&StateDefinition> {
        self.states.get(name)
    }

    pub fn state_mut(&mut self, name: &str) -> Option<&mut StateDefinition> {
        self.states.get_mut(name)
    }

    pub fn state_names(&self) -> impl Iterator<Item = &str> {
        self.states.keys().map(String::as_str)
    }

    /// Names of states marked `"End": true`, in authoring order.
    pub fn terminal_states(&self) -> Vec<String> {
        self.states
            .iter()
            .filter(|(_, state)| state.get("End").and_then(Value::as_bool).unwrap_or(false))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Returns true when the value is a string carrying the path-reference sentinel.
pub fn is_path_expression(value: &Value) -> bool {
    value.as_str().is_some_and(|text| text.starts_with(PATH_SENTINEL))
}

/// The reference-suffixed twin of a parameter key (`payload` -> `payload.$`).
pub fn reference_key(key: &str) -> String {
    format!("{key}{REFERENCE_SUFFIX}")
}
