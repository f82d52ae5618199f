//! Flow generation and composition.
//!
//! Tools without an explicit fragment get one generated from their functions: one `Action` state
//! per function, chained in order. A client's flow is the combination of its tools' fragments, each
//! fragment's terminal states continuing into the next fragment's start state.

use flowsmith_types::errors::ConfigurationError;
use flowsmith_types::registration::function_id_key;
use flowsmith_types::{FlowDefinition, FunctionDefinition, ModifierSet, StateDefinition, ToolDefinition};
use serde_json::{Map as JsonMap, Value, json};
use tracing::debug;

use crate::modifiers::ModifierEngine;
use crate::reference::ReferenceTable;

/// Flow input key holding the compute endpoint for generated call tasks.
pub const DEFAULT_ENDPOINT_INPUT: &str = "compute_endpoint";
/// Action provider that executes remote function calls.
pub const COMPUTE_ACTION_URL: &str = "https://compute.actions.globus.org";
/// Seconds a generated action state waits for its call to complete.
pub const DEFAULT_WAIT_TIME: u64 = 300;

/// Generate the action state calling `function`.
pub fn generate_state(function: &FunctionDefinition, state_name: &str) -> StateDefinition {
    let mut state = JsonMap::new();
    if let Some(description) = function.description.as_deref() {
        state.insert("Comment".into(), Value::String(description.to_string()));
    }
    state.insert("Type".into(), json!("Action"));
    state.insert("ActionUrl".into(), json!(COMPUTE_ACTION_URL));
    state.insert(
        "Parameters".into(),
        json!({
            "tasks": [{
                "endpoint.$": format!("$.input.{DEFAULT_ENDPOINT_INPUT}"),
                "function.$": format!("$.input.{}", function_id_key(&function.name)),
                "payload.$": "$.input",
            }]
        }),
    );
    state.insert("ResultPath".into(), Value::String(format!("$.{state_name}")));
    state.insert("WaitTime".into(), json!(DEFAULT_WAIT_TIME));
    state
}

/// Chain generated states for `functions`, then apply `modifiers` to the result.
pub fn generate_flow(functions: &[FunctionDefinition], comment: Option<&str>, modifiers: &ModifierSet) -> Result<FlowDefinition, ConfigurationError> {
    let table = ReferenceTable::from_functions(functions);
    let engine = ModifierEngine::new(&table, modifiers)?;
    let state_names: Vec<String> = table.descriptors().iter().map(|descriptor| descriptor.state_name.clone()).collect();
    let Some(start_at) = state_names.first().cloned() else {
        return Err(ConfigurationError::MissingFlowDefinition {
            reason: "no functions to generate states from".into(),
        });
    };

    let mut flow = FlowDefinition {
        comment: Some(
            comment
                .map(str::to_string)
                .unwrap_or_else(|| format!("Flow with states: {}", state_names.join(", "))),
        ),
        start_at,
        ..FlowDefinition::default()
    };
    for (index, (function, state_name)) in functions.iter().zip(&state_names).enumerate() {
        let mut state = generate_state(function, state_name);
        match state_names.get(index + 1) {
            Some(next) => state.insert("Next".into(), Value::String(next.clone())),
            None => state.insert("End".into(), Value::Bool(true)),
        };
        flow.states.insert(state_name.clone(), state);
    }

    engine.apply_modifiers(&mut flow)?;
    debug!(states = flow.states.len(), "generated flow");
    Ok(flow)
}

/// The fragment a tool contributes: its explicit definition, or one generated from its functions.
pub fn tool_flow(tool: &ToolDefinition) -> Result<FlowDefinition, ConfigurationError> {
    if let Some(flow) = &tool.flow_definition {
        return Ok(flow.clone());
    }
    if tool.functions.is_empty() {
        return Err(ConfigurationError::MissingFlowFragment { tool: tool.id.clone() });
    }
    generate_flow(&tool.functions, tool.description.as_deref(), &tool.modifiers)
}

/// Combine fragments in order into one flow.
///
/// Terminal states of each fragment are rewired to continue at the next fragment's `StartAt`.
/// When two fragments define the same state, the later definition replaces the earlier one.
pub fn combine_flows(fragments: Vec<FlowDefinition>, comment: Option<&str>) -> Result<FlowDefinition, ConfigurationError> {
    let mut fragments = fragments.into_iter();
    let Some(mut combined) = fragments.next() else {
        return Err(ConfigurationError::MissingFlowDefinition {
            reason: "no flow fragments to combine".into(),
        });
    };

    for fragment in fragments {
        for terminal in combined.terminal_states() {
            if let Some(state) = combined.state_mut(&terminal) {
                state.remove("End");
                state.insert("Next".into(), Value::String(fragment.start_at.clone()));
            }
        }
        for (name, state) in fragment.states {
            if combined.states.insert(name.clone(), state).is_some() {
                debug!(state = %name, "fragment state replaces an earlier definition");
            }
        }
    }

    combined.comment = Some(match comment {
        Some(comment) => comment.to_string(),
        None => format!("Flow with states: {}", combined.state_names().collect::<Vec<_>>().join(", ")),
    });
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_func() -> FunctionDefinition {
        FunctionDefinition::new("mock_func", "def mock_func(data): pass").with_description("Test mock function")
    }

    fn mock_func2() -> FunctionDefinition {
        FunctionDefinition::new("mock_func2", "def mock_func2(data): pass")
    }

    #[test]
    fn generates_single_state_flow() {
        let tool = ToolDefinition::new("mock-tool").with_function(mock_func());
        let tool = ToolDefinition {
            description: Some("Mock Tool".into()),
            ..tool
        };
        let flow = tool_flow(&tool).unwrap();
        assert_eq!(flow.comment.as_deref(), Some("Mock Tool"));
        assert_eq!(flow.start_at, "MockFunc");
        let state = &flow.states["MockFunc"];
        assert_eq!(state["Comment"], json!("Test mock function"));
        assert_eq!(state["End"], json!(true));
        assert_eq!(state["ResultPath"], json!("$.MockFunc"));
        assert_eq!(state["WaitTime"], json!(300));
        let task = &state["Parameters"]["tasks"][0];
        assert_eq!(task["function.$"], json!("$.input.mock_func_function_id"));
        assert_eq!(task["endpoint.$"], json!("$.input.compute_endpoint"));
        assert_eq!(task["payload.$"], json!("$.input"));
    }

    #[test]
    fn chains_multiple_states() {
        let tool = ToolDefinition::new("mock-tool").with_function(mock_func()).with_function(mock_func2());
        let flow = tool_flow(&tool).unwrap();
        assert_eq!(flow.comment.as_deref(), Some("Flow with states: MockFunc, MockFunc2"));
        assert_eq!(flow.states["MockFunc"]["Next"], json!("MockFunc2"));
        assert!(flow.states["MockFunc"].get("End").is_none());
        assert_eq!(flow.terminal_states(), vec!["MockFunc2".to_string()]);
    }

    #[test]
    fn tool_modifiers_apply_to_generated_states() {
        let tool = ToolDefinition::new("mock-tool")
            .with_function(mock_func())
            .with_function(mock_func2())
            .with_modifiers(
                ModifierSet::new()
                    .with("mock_func", "endpoint", "my_weirdly_named_endpoint")
                    .with("mock_func2", "payload", "mock_func"),
            );
        let flow = tool_flow(&tool).unwrap();
        assert_eq!(
            flow.states["MockFunc"]["Parameters"]["tasks"][0]["endpoint.$"],
            json!("$.input.my_weirdly_named_endpoint")
        );
        assert_eq!(
            flow.states["MockFunc2"]["Parameters"]["tasks"][0]["payload.$"],
            json!("$.MockFunc.details.results")
        );
    }

    #[test]
    fn explicit_fragment_is_used_as_is() {
        let explicit: FlowDefinition = serde_json::from_value(json!({
            "StartAt": "Custom",
            "States": { "Custom": { "Type": "Pass", "End": true } }
        }))
        .unwrap();
        let tool = ToolDefinition::new("custom").with_function(mock_func()).with_flow(explicit.clone());
        assert_eq!(tool_flow(&tool).unwrap(), explicit);
    }

    #[test]
    fn tool_without_fragment_or_functions_is_rejected() {
        let error = tool_flow(&ToolDefinition::new("empty")).unwrap_err();
        assert_eq!(error, ConfigurationError::MissingFlowFragment { tool: "empty".into() });
    }

    #[test]
    fn combining_rewires_terminal_states() {
        let first = tool_flow(&ToolDefinition::new("a").with_function(mock_func())).unwrap();
        let second = tool_flow(&ToolDefinition::new("b").with_function(mock_func2())).unwrap();
        let combined = combine_flows(vec![first, second], Some("Example Docs")).unwrap();

        assert_eq!(combined.comment.as_deref(), Some("Example Docs"));
        assert_eq!(combined.start_at, "MockFunc");
        assert_eq!(combined.states.len(), 2);
        assert_eq!(combined.states["MockFunc"]["Next"], json!("MockFunc2"));
        assert!(combined.states["MockFunc"].get("End").is_none());
        assert_eq!(combined.terminal_states(), vec!["MockFunc2".to_string()]);
    }

    #[test]
    fn combining_nothing_is_an_error() {
        assert!(matches!(
            combine_flows(Vec::new(), None),
            Err(ConfigurationError::MissingFlowDefinition { .. })
        ));
    }
}
