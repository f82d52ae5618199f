//! Compilation of a client's tools into one canonical flow.

use flowsmith_types::errors::ConfigurationError;
use flowsmith_types::{FlowDefinition, ModifierSet, ToolDefinition};
use flowsmith_util::checksum_value;
use tracing::debug;

use crate::generation::{combine_flows, tool_flow};
use crate::modifiers::ModifierEngine;
use crate::reference::ReferenceTable;

/// What a client contributes on top of its tools.
#[derive(Debug, Clone, Default)]
pub struct FlowSource {
    /// Explicit flow; when absent the tools' fragments are combined.
    pub definition: Option<FlowDefinition>,
    /// Comment for a combined flow.
    pub description: Option<String>,
    /// Client-level modifiers, applied to the final flow.
    pub modifiers: ModifierSet,
}

/// A fully resolved flow and the lookup table it was resolved against.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFlow {
    pub definition: FlowDefinition,
    pub table: ReferenceTable,
    /// Checksum of the resolved definition's canonical JSON.
    pub checksum: String,
}

/// Build the reference table, assemble the flow and resolve client modifiers.
///
/// Modifiers are validated before any flow is assembled.
pub fn compile_flow(tools: &[ToolDefinition], source: &FlowSource) -> Result<CompiledFlow, ConfigurationError> {
    let table = ReferenceTable::from_tools(tools);
    let engine = ModifierEngine::new(&table, &source.modifiers)?;

    let mut definition = match &source.definition {
        Some(definition) => definition.clone(),
        None => {
            let fragments = tools.iter().map(tool_flow).collect::<Result<Vec<_>, _>>()?;
            combine_flows(fragments, source.description.as_deref())?
        }
    };
    engine.apply_modifiers(&mut definition)?;

    let checksum = flow_checksum(&definition)?;
    debug!(states = definition.states.len(), checksum = %checksum, "compiled flow");
    Ok(CompiledFlow {
        definition,
        table,
        checksum,
    })
}

/// Checksum of a resolved flow definition.
pub fn flow_checksum(definition: &FlowDefinition) -> Result<String, ConfigurationError> {
    checksum_value(definition).map_err(|error| ConfigurationError::InvalidFlowDefinition { reason: error.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowsmith_types::FunctionDefinition;
    use serde_json::json;

    fn tools() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::new("first").with_function(FunctionDefinition::new("mock_func", "a")),
            ToolDefinition::new("second").with_function(FunctionDefinition::new("gen_tool_func", "b")),
        ]
    }

    #[test]
    fn combines_tools_and_applies_client_modifiers() {
        let source = FlowSource {
            description: Some("Example Docs".into()),
            modifiers: ModifierSet::new().with("gen_tool_func", "payload", "mock_func"),
            ..FlowSource::default()
        };
        let compiled = compile_flow(&tools(), &source).unwrap();
        assert_eq!(compiled.definition.comment.as_deref(), Some("Example Docs"));
        assert_eq!(compiled.definition.states.len(), 2);
        assert_eq!(
            compiled.definition.states["GenToolFunc"]["Parameters"]["tasks"][0]["payload.$"],
            json!("$.MockFunc.details.results")
        );
        assert_eq!(compiled.table.len(), 2);
    }

    #[test]
    fn checksum_is_taken_after_resolution() {
        let plain = compile_flow(&tools(), &FlowSource::default()).unwrap();
        let modified = compile_flow(
            &tools(),
            &FlowSource {
                modifiers: ModifierSet::new().with("mock_func", "WaitTime", 600),
                ..FlowSource::default()
            },
        )
        .unwrap();
        assert_ne!(plain.checksum, modified.checksum);
        assert_eq!(plain.checksum, compile_flow(&tools(), &FlowSource::default()).unwrap().checksum);
    }

    #[test]
    fn invalid_modifiers_fail_before_assembly() {
        let tools = vec![ToolDefinition::new("empty")];
        let source = FlowSource {
            modifiers: ModifierSet::new().with("ghost", "WaitTime", 1),
            ..FlowSource::default()
        };
        assert!(matches!(
            compile_flow(&tools, &source),
            Err(ConfigurationError::UnknownModifierTarget { .. })
        ));
        assert_eq!(
            compile_flow(&tools, &FlowSource::default()).unwrap_err(),
            ConfigurationError::MissingFlowFragment { tool: "empty".into() }
        );
    }
}
