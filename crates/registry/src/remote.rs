//! Interfaces to the remote services and the credential source.
//!
//! Implementations must report failures as [`RemoteServiceError`] (or [`AuthError`] for the
//! credential source) carrying the remote detail unchanged; callers match on that detail.

use flowsmith_types::{AuthError, DeployOptions, DeployedFlow, FlowDefinition, FlowRun, FunctionDefinition, RemoteServiceError, RunOptions};
use indexmap::IndexMap;
use serde_json::Value;

/// Access tokens keyed by the scope they were issued for.
pub type Authorizations = IndexMap<String, String>;

/// Source of access tokens.
pub trait CredentialProvider: Send + Sync {
    /// Current scope to token mapping. Scopes without a token are absent.
    fn authorizations(&self) -> Authorizations;

    /// Obtain tokens for `scopes`. With `force`, tokens are re-issued even when present.
    fn refresh(&self, scopes: &[String], force: bool) -> Result<(), AuthError>;

    /// Drop every stored token.
    fn revoke(&self) -> Result<(), AuthError>;

    /// Token for one scope.
    fn token_for(&self, scope: &str) -> Option<String> {
        self.authorizations().get(scope).cloned()
    }
}

/// Remote function registry.
pub trait FunctionService: Send + Sync {
    /// Register `function` and return its remote id.
    fn register(&self, function: &FunctionDefinition) -> Result<String, RemoteServiceError>;

    /// Bytes that identify the function's executable content for checksumming.
    fn serialize_for_checksum(&self, function: &FunctionDefinition) -> Vec<u8> {
        function.serialized_form()
    }
}

/// Remote flow service.
pub trait FlowService: Send + Sync {
    fn deploy(&self, definition: &FlowDefinition, options: &DeployOptions) -> Result<DeployedFlow, RemoteServiceError>;

    /// Replace the definition of an existing flow. Fails with a not-found error when `flow_id` is
    /// unknown to the service.
    fn update(&self, flow_id: &str, definition: &FlowDefinition, options: &DeployOptions) -> Result<DeployedFlow, RemoteServiceError>;

    fn start_run(&self, flow_id: &str, flow_scope: &str, input: &Value, options: &RunOptions) -> Result<FlowRun, RemoteServiceError>;

    fn fetch_status(&self, flow_id: &str, flow_scope: &str, action_id: &str) -> Result<FlowRun, RemoteServiceError>;
}
