//! Shared type definitions for Flowsmith.
//!
//! The types in this crate describe the data that flows between the compilation engine, the
//! registration cache, and the run orchestrator:
//!
//! - **`function`**: remote-executable function definitions and their derived descriptors
//! - **`flow`**: the workflow state graph and the path-expression conventions it relies on
//! - **`modifier`**: declarative modifier directives and the closed set of modifier kinds
//! - **`tool`**: reusable tool definitions contributing functions and flow fragments
//! - **`registration`**: persisted registration records and their config keys
//! - **`run`**: transient run state, deploy and run options
//! - **`errors`**: the error taxonomy shared by every crate in the workspace

pub mod errors;
pub mod flow;
pub mod function;
pub mod modifier;
pub mod registration;
pub mod run;
pub mod tool;

pub use errors::{AuthError, ConfigurationError, RegistrationError, RemoteServiceError};
pub use flow::{FlowDefinition, StateDefinition, is_path_expression};
pub use function::{FunctionDefinition, FunctionDescriptor, FunctionRef};
pub use modifier::{CallModifier, ModifierDirective, ModifierKind, ModifierSet, ModifierValue, StateModifier};
pub use registration::{ArtifactKind, ArtifactRef, RegistrationRecord};
pub use run::{DeployOptions, DeployedFlow, FlowRun, RunOptions, RunStatus};
pub use tool::ToolDefinition;
