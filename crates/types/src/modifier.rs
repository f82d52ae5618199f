//! Declarative flow modifiers.
//!
//! A modifier directive targets one configured function and overrides parts of the state that
//! calls it. Modifier kinds form a closed set split into two classes: function-call modifiers act
//! on the call tasks nested under the state's `Parameters`, state modifiers act on the state
//! itself.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::errors::ConfigurationError;
use crate::function::{FunctionDescriptor, FunctionRef};

/// Modifiers acting on the remote-call tasks of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallModifier {
    Endpoint,
    Payload,
    Tasks,
}

/// Modifiers acting on the state definition itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateModifier {
    InputPath,
    ResultPath,
    WaitTime,
}

/// A supported modifier kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierKind {
    Call(CallModifier),
    State(StateModifier),
}

impl ModifierKind {
    /// Every supported modifier key, in documentation order.
    pub const SUPPORTED: [&'static str; 6] = ["endpoint", "payload", "tasks", "InputPath", "ResultPath", "WaitTime"];

    /// The parameter key this modifier writes.
    pub fn key(&self) -> &'static str {
        match self {
            ModifierKind::Call(CallModifier::Endpoint) => "endpoint",
            ModifierKind::Call(CallModifier::Payload) => "payload",
            ModifierKind::Call(CallModifier::Tasks) => "tasks",
            ModifierKind::State(StateModifier::InputPath) => "InputPath",
            ModifierKind::State(StateModifier::ResultPath) => "ResultPath",
            ModifierKind::State(StateModifier::WaitTime) => "WaitTime",
        }
    }
}

impl FromStr for ModifierKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "endpoint" => Ok(ModifierKind::Call(CallModifier::Endpoint)),
            "payload" => Ok(ModifierKind::Call(CallModifier::Payload)),
            "tasks" => Ok(ModifierKind::Call(CallModifier::Tasks)),
            "InputPath" => Ok(ModifierKind::State(StateModifier::InputPath)),
            "ResultPath" => Ok(ModifierKind::State(StateModifier::ResultPath)),
            "WaitTime" => Ok(ModifierKind::State(StateModifier::WaitTime)),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for ModifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The value of a single modifier before reference resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum ModifierValue {
    /// An explicit reference to a configured function; resolves to its result path.
    Function(FunctionRef),
    /// Text naming a function, a state, a path expression, or a flow input key.
    Text(String),
    /// Any non-text JSON value (numbers, task lists, objects), written unchanged.
    Json(Value),
    /// A value written verbatim under the plain key, bypassing reference resolution.
    Literal(Value),
}

impl ModifierValue {
    pub fn function(identifier: impl Into<FunctionRef>) -> Self {
        ModifierValue::Function(identifier.into())
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        ModifierValue::Literal(value.into())
    }
}

impl From<Value> for ModifierValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => ModifierValue::Text(text),
            other => ModifierValue::Json(other),
        }
    }
}

impl From<&str> for ModifierValue {
    fn from(value: &str) -> Self {
        ModifierValue::Text(value.to_string())
    }
}

impl From<String> for ModifierValue {
    fn from(value: String) -> Self {
        ModifierValue::Text(value)
    }
}

impl From<i32> for ModifierValue {
    fn from(value: i32) -> Self {
        ModifierValue::Json(Value::from(value))
    }
}

impl From<i64> for ModifierValue {
    fn from(value: i64) -> Self {
        ModifierValue::Json(Value::from(value))
    }
}

impl From<FunctionDescriptor> for ModifierValue {
    fn from(value: FunctionDescriptor) -> Self {
        ModifierValue::Function(FunctionRef::Descriptor(value))
    }
}

impl From<&FunctionDescriptor> for ModifierValue {
    fn from(value: &FunctionDescriptor) -> Self {
        ModifierValue::Function(FunctionRef::Descriptor(value.clone()))
    }
}

/// All modifiers targeting one function. Kinds stay as raw keys until validated.
#[derive(Debug, Clone, PartialEq)]
pub struct ModifierDirective {
    pub target: FunctionRef,
    pub modifiers: IndexMap<String, ModifierValue>,
}

/// An ordered collection of modifier directives.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub struct ModifierSet {
    directives: Vec<ModifierDirective>,
}

impl ModifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one modifier, merging into an existing directive for the same target.
    pub fn with(mut self, target: impl Into<FunctionRef>, kind: impl Into<String>, value: impl Into<ModifierValue>) -> Self {
        self.insert(target.into(), kind.into(), value.into());
        self
    }

    pub fn insert(&mut self, target: FunctionRef, kind: String, value: ModifierValue) {
        if let Some(directive) = self.directives.iter_mut().find(|directive| directive.target == target) {
            directive.modifiers.insert(kind, value);
            return;
        }
        let mut modifiers = IndexMap::new();
        modifiers.insert(kind, value);
        self.directives.push(ModifierDirective { target, modifiers });
    }

    pub fn directives(&self) -> &[ModifierDirective] {
        &self.directives
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    /// Build a modifier set from untyped JSON, which must be a mapping of target to mapping.
    pub fn from_json(value: &Value) -> Result<Self, ConfigurationError> {
        let Value::Object(targets) = value else {
            return Err(ConfigurationError::invalid_modifier_set(format!(
                "expected a mapping of function identifiers, got {}",
                json_kind(value)
            )));
        };

        let mut set = ModifierSet::new();
        for (target, modifiers) in targets {
            let Value::Object(modifiers) = modifiers else {
                return Err(ConfigurationError::invalid_modifier_set(format!(
                    "modifiers for '{target}' must be a mapping, got {}",
                    json_kind(modifiers)
                )));
            };
            for (kind, value) in modifiers {
                set.insert(FunctionRef::Name(target.clone()), kind.clone(), ModifierValue::from(value.clone()));
            }
        }
        Ok(set)
    }
}

impl TryFrom<Value> for ModifierSet {
    type Error = ConfigurationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        if value.is_null() {
            return Ok(ModifierSet::new());
        }
        ModifierSet::from_json(&value)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
