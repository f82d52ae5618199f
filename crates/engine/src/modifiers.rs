//! Modifier resolution.
//!
//! A [`ModifierEngine`] validates a [`ModifierSet`] against a [`ReferenceTable`] when it is built,
//! then rewrites flow states so every symbolic reference becomes a path expression. All failures
//! surface before the flow is touched.

use flowsmith_types::errors::ConfigurationError;
use flowsmith_types::flow::{PARAMETERS_KEY, TASKS_KEY, reference_key};
use flowsmith_types::{CallModifier, FlowDefinition, FunctionRef, ModifierKind, ModifierSet, ModifierValue, StateDefinition, StateModifier, is_path_expression};
use serde_json::{Map as JsonMap, Value};
use tracing::debug;

use crate::reference::{ReferenceTable, result_path};

/// A modifier value after reference resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue {
    /// Written under `<key>.$` when it is a path expression, otherwise under `<key>`.
    Value(Value),
    /// Written under `<key>` as-is.
    Verbatim(Value),
}

/// Resolve a modifier value against the reference table.
///
/// Returns `None` only for an explicit function reference that the table does not know.
pub fn resolve_modifier_value(table: &ReferenceTable, value: &ModifierValue) -> Option<ResolvedValue> {
    let resolved = match value {
        ModifierValue::Function(identifier) => {
            let state_name = table.state_name_of(identifier)?;
            Value::String(result_path(state_name))
        }
        ModifierValue::Text(text) if text.starts_with(flowsmith_types::flow::PATH_SENTINEL) => Value::String(text.clone()),
        ModifierValue::Text(text) => match table.resolve_text(text) {
            Some(descriptor) => Value::String(result_path(&descriptor.state_name)),
            None => Value::String(format!("$.input.{text}")),
        },
        ModifierValue::Json(value) => value.clone(),
        ModifierValue::Literal(value) => return Some(ResolvedValue::Verbatim(value.clone())),
    };
    Some(ResolvedValue::Value(resolved))
}

/// Write `key` on `item`, replacing any previous `key` or `key.$` entry.
pub fn generic_set_modifier(item: &mut JsonMap<String, Value>, key: &str, value: &ResolvedValue) {
    let reference = reference_key(key);
    item.remove(key);
    item.remove(&reference);

    match value {
        ResolvedValue::Value(value) if is_path_expression(value) => {
            debug!(modifier = %reference, value = %value, "set modifier");
            item.insert(reference, value.clone());
        }
        ResolvedValue::Value(value) | ResolvedValue::Verbatim(value) => {
            debug!(modifier = key, value = %value, "set modifier");
            item.insert(key.to_string(), value.clone());
        }
    }
}

/// Apply one resolved modifier to a state.
pub fn apply_modifier(state: &mut StateDefinition, kind: ModifierKind, value: &ResolvedValue) {
    match kind {
        ModifierKind::Call(CallModifier::Tasks) => {
            let parameters = state.entry(PARAMETERS_KEY).or_insert_with(|| Value::Object(JsonMap::new()));
            if !parameters.is_object() {
                *parameters = Value::Object(JsonMap::new());
            }
            if let Value::Object(parameters) = parameters {
                generic_set_modifier(parameters, TASKS_KEY, value);
            }
        }
        ModifierKind::Call(call) => {
            let key = ModifierKind::Call(call).key();
            let tasks = state
                .get_mut(PARAMETERS_KEY)
                .and_then(Value::as_object_mut)
                .and_then(|parameters| parameters.get_mut(TASKS_KEY))
                .and_then(Value::as_array_mut);
            match tasks {
                Some(tasks) => {
                    for task in tasks.iter_mut().filter_map(Value::as_object_mut) {
                        generic_set_modifier(task, key, value);
                    }
                }
                None => debug!(modifier = key, "state has no call tasks, nothing to modify"),
            }
        }
        ModifierKind::State(modifier) => {
            let key = ModifierKind::State(modifier).key();
            // A previous InputPath rewrite leaves the path under the plain key.
            let rewritten = modifier == StateModifier::InputPath && state.get(key).is_some_and(is_path_expression);
            generic_set_modifier(state, key, value);
            if modifier == StateModifier::InputPath && (state.remove(PARAMETERS_KEY).is_some() || rewritten) {
                if let Some(path) = state.remove(&reference_key(key)) {
                    state.insert(key.to_string(), path);
                }
            }
        }
    }
}

/// A validated directive: the target's state and its modifiers, already resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDirective {
    pub target: FunctionRef,
    pub state_name: String,
    pub modifiers: Vec<(ModifierKind, ResolvedValue)>,
}

/// Validate every directive against the reference table and resolve its values.
///
/// Fails on unknown targets, unsupported kinds, and explicit function references in values that
/// the table does not know.
pub fn check_modifiers(table: &ReferenceTable, modifiers: &ModifierSet) -> Result<Vec<ResolvedDirective>, ConfigurationError> {
    debug!(directives = modifiers.len(), "checking modifiers");
    let mut resolved = Vec::with_capacity(modifiers.len());

    for directive in modifiers.directives() {
        let Some(descriptor) = table.resolve(&directive.target) else {
            return Err(ConfigurationError::unknown_modifier_target(
                directive.target.label(),
                table.function_names(),
            ));
        };

        let mut directive_modifiers = Vec::with_capacity(directive.modifiers.len());
        for (raw_kind, value) in &directive.modifiers {
            let kind: ModifierKind = raw_kind
                .parse()
                .map_err(|kind: String| ConfigurationError::unsupported_modifier_kind(directive.target.label(), kind))?;
            let Some(value) = resolve_modifier_value(table, value) else {
                let label = match value {
                    ModifierValue::Function(identifier) => identifier.label().to_string(),
                    other => format!("{other:?}"),
                };
                return Err(ConfigurationError::unknown_modifier_target(label, table.function_names()));
            };
            directive_modifiers.push((kind, value));
        }

        resolved.push(ResolvedDirective {
            target: directive.target.clone(),
            state_name: descriptor.state_name.clone(),
            modifiers: directive_modifiers,
        });
    }
    Ok(resolved)
}

/// Validated modifiers ready to rewrite flows.
#[derive(Debug, Clone, PartialEq)]
pub struct ModifierEngine {
    directives: Vec<ResolvedDirective>,
}

impl ModifierEngine {
    pub fn new(table: &ReferenceTable, modifiers: &ModifierSet) -> Result<Self, ConfigurationError> {
        Ok(Self {
            directives: check_modifiers(table, modifiers)?,
        })
    }

    /// Build from untyped JSON, which must be a mapping of target to mapping.
    pub fn from_json(table: &ReferenceTable, modifiers: &Value) -> Result<Self, ConfigurationError> {
        Self::new(table, &ModifierSet::from_json(modifiers)?)
    }

    pub fn directives(&self) -> &[ResolvedDirective] {
        &self.directives
    }

    /// Rewrite the targeted states of `flow`.
    ///
    /// Every targeted state is checked for existence before the first write; on error the flow is
    /// left untouched. Applying the same engine twice yields the same flow as applying it once.
    pub fn apply_modifiers(&self, flow: &mut FlowDefinition) -> Result<(), ConfigurationError> {
        if let Some(missing) = self.directives.iter().find(|directive| flow.state(&directive.state_name).is_none()) {
            return Err(ConfigurationError::MissingState {
                target: missing.target.label().to_string(),
                state: missing.state_name.clone(),
            });
        }

        for directive in &self.directives {
            let Some(state) = flow.state_mut(&directive.state_name) else {
                continue;
            };
            // InputPath replaces Parameters, so it goes after any call modifier that writes them.
            let input_path = ModifierKind::State(StateModifier::InputPath);
            let (input_paths, others): (Vec<_>, Vec<_>) =
                directive.modifiers.iter().partition(|(kind, _)| *kind == input_path);
            for (kind, value) in others.into_iter().chain(input_paths) {
                debug!(state = %directive.state_name, modifier = %kind, "applying modifier");
                apply_modifier(state, *kind, value);
            }
        }
        Ok(())
    }
}
