//! Persisted registration records.
//!
//! Records live in the private config section named after the client. Each artifact stores its
//! remote id and content checksum under predictable keys so a later run can decide whether the
//! artifact can be reused.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const FLOW_ID_KEY: &str = "flow_id";
pub const FLOW_CHECKSUM_KEY: &str = "flow_checksum";
pub const FLOW_SCOPE_KEY: &str = "flow_scope";

/// Config key holding a function's remote id (also used as its flow input key).
pub fn function_id_key(function_name: &str) -> String {
    format!("{function_name}_function_id")
}

/// Config key holding a function's registered checksum.
pub fn function_checksum_key(function_name: &str) -> String {
    format!("{function_name}_function_checksum")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Function,
    Flow,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Function => f.write_str("function"),
            ArtifactKind::Flow => f.write_str("flow"),
        }
    }
}

/// Names one logical artifact tracked by the checksum ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub kind: ArtifactKind,
    pub name: String,
}

impl ArtifactRef {
    pub fn function(name: impl Into<String>) -> Self {
        Self {
            kind: ArtifactKind::Function,
            name: name.into(),
        }
    }

    pub fn flow(name: impl Into<String>) -> Self {
        Self {
            kind: ArtifactKind::Flow,
            name: name.into(),
        }
    }

    /// Config key for the artifact's remote id.
    pub fn id_key(&self) -> String {
        match self.kind {
            ArtifactKind::Function => function_id_key(&self.name),
            ArtifactKind::Flow => FLOW_ID_KEY.to_string(),
        }
    }

    /// Config key for the artifact's checksum.
    pub fn checksum_key(&self) -> String {
        match self.kind {
            ArtifactKind::Function => function_checksum_key(&self.name),
            ArtifactKind::Flow => FLOW_CHECKSUM_KEY.to_string(),
        }
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.name)
    }
}

/// One row of the checksum ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub artifact: ArtifactRef,
    pub remote_id: String,
    pub checksum: String,
    /// Authorization scope issued for a deployed flow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_artifact_kind() {
        let function = ArtifactRef::function("hello_world");
        assert_eq!(function.id_key(), "hello_world_function_id");
        assert_eq!(function.checksum_key(), "hello_world_function_checksum");
        assert_eq!(function.to_string(), "function 'hello_world'");

        let flow = ArtifactRef::flow("my_client");
        assert_eq!(flow.id_key(), FLOW_ID_KEY);
        assert_eq!(flow.checksum_key(), FLOW_CHECKSUM_KEY);
    }
}
