//! Project manifest: the tools a project defines and the client built from them.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use flowsmith_client::ClientDefinition;
use flowsmith_engine::ToolRegistry;
use flowsmith_types::{FlowDefinition, ModifierSet, ToolDefinition};
use serde::Deserialize;

pub const DEFAULT_MANIFEST: &str = "flowsmith.yaml";

#[derive(Debug, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    pub client: ClientManifest,
}

#[derive(Debug, Deserialize)]
pub struct ClientManifest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Tool ids, in flow order.
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub flow_definition: Option<FlowDefinition>,
    #[serde(default)]
    pub modifiers: ModifierSet,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub subscription_id: Option<String>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("reading manifest {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing manifest {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Resolve the client's tool ids against the manifest's tools.
    pub fn client_definition(self) -> Result<ClientDefinition> {
        let registry: ToolRegistry = self.tools.into_iter().collect();
        let tools = registry.resolve_all(&self.client.tools)?;
        Ok(ClientDefinition {
            name: self.client.name,
            description: self.client.description,
            tools,
            flow_definition: self.client.flow_definition,
            modifiers: self.client.modifiers,
            group: self.client.group,
            subscription_id: self.client.subscription_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
tools:
  - id: hello
    description: Say hello
    functions:
      - name: hello_world
        source: |
          def hello_world(data):
              return f"hello {data['name']}"
    flow_input:
      name: world
client:
  name: HelloClient
  tools: [hello]
  group: 2f9ee8cb-1a3c-4b1e-9a3f-8c1b1d2e3f40
  modifiers:
    hello_world:
      payload: name
      WaitTime: 60
"#;

    #[test]
    fn manifest_resolves_tools_by_id() {
        let definition = Manifest::parse(MANIFEST).unwrap().client_definition().unwrap();
        assert_eq!(definition.name, "HelloClient");
        assert_eq!(definition.tools.len(), 1);
        assert_eq!(definition.tools[0].functions[0].name, "hello_world");
        assert_eq!(definition.modifiers.len(), 1);
    }

    #[test]
    fn unknown_tool_ids_are_reported() {
        let text = MANIFEST.replace("tools: [hello]", "tools: [hello, transfer]");
        let error = Manifest::parse(&text).unwrap().client_definition().unwrap_err();
        assert!(error.to_string().contains("transfer"));
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_MANIFEST);
        fs::write(&path, MANIFEST).unwrap();
        assert_eq!(Manifest::load(&path).unwrap().client.name, "HelloClient");
        assert!(Manifest::load(&dir.path().join("missing.yaml")).is_err());
    }
}
