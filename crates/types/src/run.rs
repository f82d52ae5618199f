//! Run state and the options passed to the remote flow service.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value};

/// Polled status of a remote run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunStatus {
    Active,
    Succeeded,
    Failed,
    /// Any status the remote service reports that this client does not model (for example,
    /// `INACTIVE`). Treated as non-terminal.
    Other(String),
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Active => "ACTIVE",
            RunStatus::Succeeded => "SUCCEEDED",
            RunStatus::Failed => "FAILED",
            RunStatus::Other(other) => other,
        }
    }
}

impl From<String> for RunStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "ACTIVE" => RunStatus::Active,
            "SUCCEEDED" => RunStatus::Succeeded,
            "FAILED" => RunStatus::Failed,
            _ => RunStatus::Other(value),
        }
    }
}

impl From<RunStatus> for String {
    fn from(value: RunStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response of a run start or a status fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRun {
    pub action_id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub details: Value,
    #[serde(flatten)]
    pub extra: JsonMap<String, Value>,
}

impl FlowRun {
    pub fn new(action_id: impl Into<String>, status: RunStatus) -> Self {
        Self {
            action_id: action_id.into(),
            status,
            details: Value::Null,
            extra: JsonMap::new(),
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// The remote-reported human-readable description, if any.
    pub fn description(&self) -> Option<&str> {
        self.details.get("description").and_then(Value::as_str)
    }
}

/// Result of deploying a flow: its id and the authorization scope issued for running it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedFlow {
    pub id: String,
    pub scope: String,
}

/// Options sent when deploying or updating a flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeployOptions {
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub visible_to: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runnable_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub administered_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub input_schema: Value,
}

/// Options sent when starting a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub manage_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub monitor_by: Vec<String>,
}
