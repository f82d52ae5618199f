//! Lookup table over the functions configured for one compilation pass.

use flowsmith_types::{FunctionDefinition, FunctionDescriptor, FunctionRef, ToolDefinition};
use flowsmith_util::{checksum_bytes, state_name};

/// `$.<stateName>.details.results`, where a state's remote call leaves its output.
pub fn result_path(state_name: &str) -> String {
    format!("$.{state_name}.details.results")
}

/// Build the descriptor for a function: derived state name and content checksum.
pub fn describe_function(function: &FunctionDefinition) -> FunctionDescriptor {
    FunctionDescriptor {
        name: function.name.clone(),
        state_name: state_name(&function.name),
        checksum: checksum_bytes(&function.serialized_form()),
    }
}

/// Ordered index of configured functions.
///
/// Lookups are first-match by insertion order, so when two tools configure functions with the
/// same name (or names that derive the same state name) the earlier tool wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceTable {
    entries: Vec<FunctionDescriptor>,
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tools<'a>(tools: impl IntoIterator<Item = &'a ToolDefinition>) -> Self {
        Self::from_functions(tools.into_iter().flat_map(|tool| tool.functions.iter()))
    }

    pub fn from_functions<'a>(functions: impl IntoIterator<Item = &'a FunctionDefinition>) -> Self {
        let mut table = Self::new();
        for function in functions {
            table.push(function);
        }
        table
    }

    pub fn push(&mut self, function: &FunctionDefinition) {
        self.entries.push(describe_function(function));
    }

    /// Resolve a function name, a descriptor, or a derived state name.
    pub fn resolve(&self, identifier: &FunctionRef) -> Option<&FunctionDescriptor> {
        match identifier {
            FunctionRef::Name(text) => self.resolve_text(text),
            FunctionRef::Descriptor(descriptor) => self
                .entries
                .iter()
                .find(|entry| entry.name == descriptor.name && entry.checksum == descriptor.checksum),
        }
    }

    /// Resolve text as a function name first, then as a derived state name.
    pub fn resolve_text(&self, text: &str) -> Option<&FunctionDescriptor> {
        self.entries
            .iter()
            .find(|entry| entry.name == text)
            .or_else(|| self.entries.iter().find(|entry| entry.state_name == text))
    }

    pub fn state_name_of(&self, identifier: &FunctionRef) -> Option<&str> {
        self.resolve(identifier).map(|descriptor| descriptor.state_name.as_str())
    }

    /// Configured function names in insertion order, without duplicates.
    pub fn function_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            if !names.contains(&entry.name) {
                names.push(entry.name.clone());
            }
        }
        names
    }

    pub fn descriptors(&self) -> &[FunctionDescriptor] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
