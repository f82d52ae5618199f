//! Remote function definitions and descriptors.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A remote-executable function contributed by a tool.
///
/// The `source` is the executable body shipped to the function service. Two definitions with the
/// same name and body serialize identically, which is what checksums are computed over.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionDefinition {
    /// Stable function name (for example, `hello_world`).
    pub name: String,
    /// Human-readable description, used as the generated state's `Comment`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Executable body registered with the function service.
    #[serde(default)]
    pub source: String,
    /// Optional language hint forwarded to the function service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl FunctionDefinition {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            source: source.into(),
            language: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Serialized executable form of the function.
    ///
    /// Only the fields that change what runs remotely participate; the description does not.
    pub fn serialized_form(&self) -> Vec<u8> {
        #[derive(Serialize)]
        struct Executable<'a> {
            name: &'a str,
            language: Option<&'a str>,
            source: &'a str,
        }

        let executable = Executable {
            name: &self.name,
            language: self.language.as_deref(),
            source: &self.source,
        };
        serde_json::to_vec(&executable).unwrap_or_default()
    }
}

/// Identifies one configured function: its name, derived state name and content checksum.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct FunctionDescriptor {
    pub name: String,
    pub state_name: String,
    /// Hex-encoded sha256 of the function's serialized form.
    pub checksum: String,
}

/// A reference to a configured function, either by identifier text or by descriptor.
///
/// Identifier text may be a function name or a derived state name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FunctionRef {
    Name(String),
    Descriptor(FunctionDescriptor),
}

impl FunctionRef {
    /// The text used when reporting this reference back to the user.
    pub fn label(&self) -> &str {
        match self {
            FunctionRef::Name(name) => name,
            FunctionRef::Descriptor(descriptor) => &descriptor.name,
        }
    }
}

impl fmt::Display for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<&str> for FunctionRef {
    fn from(value: &str) -> Self {
        FunctionRef::Name(value.to_string())
    }
}

impl From<String> for FunctionRef {
    fn from(value: String) -> Self {
        FunctionRef::Name(value)
    }
}

impl From<FunctionDescriptor> for FunctionRef {
    fn from(value: FunctionDescriptor) -> Self {
        FunctionRef::Descriptor(value)
    }
}

impl From<&FunctionDescriptor> for FunctionRef {
    fn from(value: &FunctionDescriptor) -> Self {
        FunctionRef::Descriptor(value.clone())
    }
}
