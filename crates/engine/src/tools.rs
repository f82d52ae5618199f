//! Explicit tool registry keyed by stable ids.

use flowsmith_types::ToolDefinition;
use flowsmith_types::errors::ConfigurationError;
use indexmap::IndexMap;
use tracing::warn;

/// Tools available to clients, populated by the embedding application.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, ToolDefinition>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool previously registered under the same id.
    pub fn register(&mut self, tool: ToolDefinition) {
        if let Some(previous) = self.tools.insert(tool.id.clone(), tool) {
            warn!(tool = %previous.id, "replaced previously registered tool");
        }
    }

    pub fn with_tool(mut self, tool: ToolDefinition) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, id: &str) -> Result<&ToolDefinition, ConfigurationError> {
        self.tools.get(id).ok_or_else(|| ConfigurationError::UnknownTool { id: id.to_string() })
    }

    /// Look up several tools, preserving the requested order.
    pub fn resolve_all<S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<ToolDefinition>, ConfigurationError> {
        ids.iter().map(|id| self.get(id.as_ref()).cloned()).collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl FromIterator<ToolDefinition> for ToolRegistry {
    fn from_iter<I: IntoIterator<Item = ToolDefinition>>(iter: I) -> Self {
        let mut registry = ToolRegistry::new();
        for tool in iter {
            registry.register(tool);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_tools_in_requested_order() {
        let registry: ToolRegistry = [ToolDefinition::new("a"), ToolDefinition::new("b")].into_iter().collect();
        let tools = registry.resolve_all(&["b", "a"]).unwrap();
        assert_eq!(tools.iter().map(|tool| tool.id.as_str()).collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn unknown_tool_is_a_configuration_error() {
        let registry = ToolRegistry::new().with_tool(ToolDefinition::new("a"));
        assert_eq!(registry.get("zzz").unwrap_err(), ConfigurationError::UnknownTool { id: "zzz".into() });
    }
}
