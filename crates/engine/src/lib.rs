//! # Flowsmith Engine
//!
//! Compiles tool definitions into one canonical flow definition with every symbolic reference
//! resolved to a path expression.
//!
//! ## Usage
//!
//! ```rust
//! use flowsmith_engine::{FlowSource, compile_flow};
//! use flowsmith_types::{FunctionDefinition, ModifierSet, ToolDefinition};
//!
//! let tools = vec![
//!     ToolDefinition::new("hello")
//!         .with_function(FunctionDefinition::new("hello_world", "def hello_world(data): return 'hi'")),
//! ];
//! let source = FlowSource {
//!     modifiers: ModifierSet::new().with("hello_world", "payload", "name"),
//!     ..FlowSource::default()
//! };
//! let compiled = compile_flow(&tools, &source)?;
//! assert_eq!(compiled.definition.start_at, "HelloWorld");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`reference`**: ordered lookup of configured functions and their derived state names
//! - **`modifiers`**: validation and application of modifier directives
//! - **`generation`**: state generation for tools and composition of fragments
//! - **`compile`**: the end-to-end compilation pass and the post-resolution checksum
//! - **`tools`**: explicit registry of tools keyed by id

pub mod compile;
pub mod generation;
pub mod modifiers;
pub mod reference;
pub mod tools;

pub use compile::{CompiledFlow, FlowSource, compile_flow, flow_checksum};
pub use generation::{DEFAULT_ENDPOINT_INPUT, combine_flows, generate_flow, tool_flow};
pub use modifiers::{ModifierEngine, ResolvedDirective, ResolvedValue, apply_modifier, check_modifiers, generic_set_modifier};
pub use reference::{ReferenceTable, describe_function, result_path};
pub use tools::ToolRegistry;
