//! The flow client: owns one compiled flow and runs it against the remote services.

use std::sync::Arc;

use flowsmith_engine::{CompiledFlow, FlowSource, compile_flow};
use flowsmith_registry::{CredentialProvider, FlowService, FunctionService, RegistrationCache};
use flowsmith_types::{
    AuthError, ConfigurationError, DeployOptions, DeployedFlow, FlowDefinition, FlowRun, FunctionDefinition, ModifierSet, RegistrationError,
    RunOptions, RunStatus, ToolDefinition,
};
use flowsmith_util::{ConfigStore, LayeredConfig, section_name, state_name};
use indexmap::IndexMap;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::input::{INPUT_KEY, check_input, default_input, merge_input};
use crate::permissions::{PrincipalKind, apply_deploy_permissions, apply_run_permissions, principal_urn};
use crate::polling::{PollBudget, log_active_status, poll_until_terminal};
use crate::ClientError;

/// Web page showing a run.
pub const RUN_URL_BASE: &str = "https://app.globus.org/flows";

/// What a client is made of.
#[derive(Debug, Clone, Default)]
pub struct ClientDefinition {
    /// Client name; its snake-case form names the config section.
    pub name: String,
    pub description: Option<String>,
    pub tools: Vec<ToolDefinition>,
    /// Explicit flow replacing the combination of tool fragments.
    pub flow_definition: Option<FlowDefinition>,
    pub modifiers: ModifierSet,
    /// Group granted visibility, run and admin rights on the flow and its runs.
    pub group: Option<String>,
    pub subscription_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Log in automatically when a scope is missing after registration or rejected by the
    /// flow service.
    pub auto_login: bool,
    /// Register functions and deploy the flow when they are missing or changed.
    pub auto_register: bool,
    pub poll: PollBudget,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            auto_login: true,
            auto_register: true,
            poll: PollBudget::default(),
        }
    }
}

/// Remote collaborators.
#[derive(Clone)]
pub struct Services {
    pub functions: Arc<dyn FunctionService>,
    pub flows: Arc<dyn FlowService>,
    pub credentials: Arc<dyn CredentialProvider>,
    /// Scopes needed before the flow scope is known.
    pub base_scopes: Vec<String>,
}

/// Shared (user-edited) and private (client-managed) configuration.
#[derive(Clone)]
pub struct Stores {
    pub shared: Arc<dyn ConfigStore>,
    pub private: Arc<dyn ConfigStore>,
}

/// Parameters of a single run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Caller input, which must be `{"input": {...}}`.
    pub input: Option<Value>,
    /// Start from the default input assembled from function ids, tool defaults and config.
    pub use_defaults: bool,
    pub label: Option<String>,
    pub tags: Vec<String>,
}

impl Default for RunRequest {
    fn default() -> Self {
        Self {
            input: None,
            use_defaults: true,
            label: None,
            tags: Vec::new(),
        }
    }
}

impl RunRequest {
    pub fn with_input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }
}

pub struct FlowClient {
    definition: ClientDefinition,
    compiled: CompiledFlow,
    section: String,
    options: ClientOptions,
    services: Services,
    stores: Stores,
    cache: RegistrationCache,
}

impl FlowClient {
    /// Compile the client's flow and open its registration section.
    ///
    /// Modifier errors surface here, before any remote call.
    pub fn new(definition: ClientDefinition, services: Services, stores: Stores, options: ClientOptions) -> Result<Self, ClientError> {
        let source = FlowSource {
            definition: definition.flow_definition.clone(),
            description: definition.description.clone(),
            modifiers: definition.modifiers.clone(),
        };
        let compiled = compile_flow(&definition.tools, &source)?;
        let section = section_name(&definition.name);
        let cache = RegistrationCache::new(stores.private.clone(), section.clone(), options.auto_register);
        debug!(client = %definition.name, section = %section, checksum = %compiled.checksum, "compiled flow");

        Ok(Self {
            definition,
            compiled,
            section,
            options,
            services,
            stores,
            cache,
        })
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn tools(&self) -> &[ToolDefinition] {
        &self.definition.tools
    }

    /// The fully resolved flow definition.
    pub fn flow_definition(&self) -> &FlowDefinition {
        &self.compiled.definition
    }

    pub fn flow_checksum(&self) -> &str {
        &self.compiled.checksum
    }

    /// Functions of every tool, first definition of each name.
    pub fn functions(&self) -> Vec<&FunctionDefinition> {
        let mut seen: Vec<&FunctionDefinition> = Vec::new();
        for function in self.definition.tools.iter().flat_map(|tool| tool.functions.iter()) {
            if !seen.iter().any(|known| known.name == function.name) {
                seen.push(function);
            }
        }
        seen
    }

    /// Scope of the stored flow, if one has been deployed.
    pub fn flow_scope(&self) -> Option<String> {
        self.cache.stored_flow().map(|flow| flow.scope).filter(|scope| !scope.is_empty())
    }

    /// Base scopes plus the stored flow scope.
    pub fn scopes(&self) -> Vec<String> {
        let mut scopes = self.services.base_scopes.clone();
        if let Some(scope) = self.flow_scope()
            && !scopes.contains(&scope)
        {
            scopes.push(scope);
        }
        scopes
    }

    pub fn missing_scopes(&self) -> Vec<String> {
        let authorizations = self.services.credentials.authorizations();
        self.scopes().into_iter().filter(|scope| !authorizations.contains_key(scope)).collect()
    }

    pub fn is_logged_in(&self) -> bool {
        self.missing_scopes().is_empty()
    }

    /// Obtain tokens for every scope. Skipped when already logged in unless `force` is set.
    pub fn login(&self, force: bool) -> Result<(), ClientError> {
        if !force && self.is_logged_in() {
            debug!(client = %self.definition.name, "already logged in");
            return Ok(());
        }
        self.services.credentials.refresh(&self.scopes(), force)?;
        info!(client = %self.definition.name, "logged in");
        Ok(())
    }

    pub fn logout(&self) -> Result<(), ClientError> {
        self.services.credentials.revoke()?;
        info!(client = %self.definition.name, "logged out");
        Ok(())
    }

    fn group_principals(&self) -> Vec<String> {
        self.definition
            .group
            .iter()
            .map(|group| principal_urn(PrincipalKind::Group, group))
            .collect()
    }

    /// Options sent when deploying or updating the flow.
    pub fn deploy_options(&self) -> DeployOptions {
        let mut options = DeployOptions {
            title: format!("{} Flow", state_name(&self.definition.name)),
            subscription_id: self.definition.subscription_id.clone(),
            input_schema: json!({}),
            ..DeployOptions::default()
        };
        apply_deploy_permissions(&mut options, &self.group_principals());
        options
    }

    /// Options sent when starting a run.
    pub fn run_options(&self, request: &RunRequest) -> RunOptions {
        let mut options = RunOptions {
            label: request.label.clone(),
            tags: request.tags.clone(),
            ..RunOptions::default()
        };
        apply_run_permissions(&mut options, &self.group_principals());
        options
    }

    /// Remote ids of every function keyed `<fn>_function_id`, registering as allowed.
    pub fn function_ids(&self) -> Result<IndexMap<String, String>, ClientError> {
        Ok(self.cache.function_ids(self.services.functions.as_ref(), self.functions())?)
    }

    /// The deployed flow, deploying or updating it as allowed.
    pub fn flow(&self) -> Result<DeployedFlow, ClientError> {
        Ok(self.cache.flow(
            self.services.flows.as_ref(),
            &self.compiled.definition,
            &self.compiled.checksum,
            &self.deploy_options(),
        )?)
    }

    /// Register every function, then the flow.
    pub fn register(&self) -> Result<DeployedFlow, ClientError> {
        self.function_ids()?;
        self.flow()
    }

    fn config(&self) -> LayeredConfig<'_> {
        LayeredConfig::new(self.stores.shared.as_ref(), self.stores.private.as_ref())
    }

    /// Default flow input: function ids, tool defaults and configured overrides.
    pub fn get_input(&self) -> Result<Value, ClientError> {
        let ids = self.function_ids()?;
        Ok(default_input(&ids, &self.definition.tools, &self.config(), &self.section))
    }

    pub fn check_input(&self, flow_input: &Value) -> Result<(), ClientError> {
        Ok(check_input(&self.definition.tools, flow_input)?)
    }

    /// Start a run.
    ///
    /// Input is validated and authorizations are checked before anything is registered. A start
    /// rejected because the flow scope has no tokens is retried once after a forced refresh of
    /// that scope when `auto_login` is on.
    pub fn run_flow(&self, request: &RunRequest) -> Result<FlowRun, ClientError> {
        let base = if request.use_defaults {
            default_input(&IndexMap::new(), &self.definition.tools, &self.config(), &self.section)
        } else {
            json!({ INPUT_KEY: {} })
        };
        let mut flow_input = merge_input(base, request.input.as_ref())?;
        self.check_input(&flow_input)?;

        let missing = self.missing_scopes();
        if !missing.is_empty() {
            return Err(AuthError::NotAuthenticated { missing_scopes: missing }.into());
        }

        // The flow calls its functions by id, so they are registered even when defaults are off.
        let function_ids = self.function_ids()?;
        if request.use_defaults {
            add_defaults(&mut flow_input, function_ids);
        }
        let flow = self.flow()?;
        self.ensure_flow_scope(&flow)?;

        let options = self.run_options(request);
        let run = self.start_with_reauth(&flow, &flow_input, &options)?;
        if run.status == RunStatus::Failed {
            let detail = run.description().unwrap_or(run.status.as_str()).to_string();
            return Err(ConfigurationError::RunFailed { detail }.into());
        }
        info!(action_id = %run.action_id, url = %run_url(&flow.id, &run.action_id), status = %run.status, "started run");
        Ok(run)
    }

    fn ensure_flow_scope(&self, flow: &DeployedFlow) -> Result<(), ClientError> {
        if self.services.credentials.token_for(&flow.scope).is_some() {
            return Ok(());
        }
        if !self.options.auto_login {
            return Err(AuthError::NeedsReauth {
                missing_scopes: vec![flow.scope.clone()],
            }
            .into());
        }
        info!(scope = %flow.scope, "flow scope not yet authorized, logging in");
        self.login(false)
    }

    fn start_with_reauth(&self, flow: &DeployedFlow, flow_input: &Value, options: &RunOptions) -> Result<FlowRun, ClientError> {
        let flows = self.services.flows.as_ref();
        match flows.start_run(&flow.id, &flow.scope, flow_input, options) {
            Ok(run) => Ok(run),
            Err(error) if error.reports_missing_scope(&flow.scope) => {
                if !self.options.auto_login {
                    return Err(AuthError::NeedsReauth {
                        missing_scopes: vec![flow.scope.clone()],
                    }
                    .into());
                }
                warn!(flow = %flow.id, scope = %flow.scope, "flow service could not use the flow scope, re-authenticating once");
                self.services.credentials.refresh(std::slice::from_ref(&flow.scope), true)?;
                Ok(flows.start_run(&flow.id, &flow.scope, flow_input, options)?)
            }
            Err(error) => Err(error.into()),
        }
    }

    fn stored_flow(&self) -> Result<DeployedFlow, ClientError> {
        self.cache.stored_flow().ok_or_else(|| {
            RegistrationError::NotRegistered {
                artifact: self.cache.flow_artifact(),
                section: self.section.clone(),
            }
            .into()
        })
    }

    pub fn get_status(&self, action_id: &str) -> Result<FlowRun, ClientError> {
        let flow = self.stored_flow()?;
        Ok(self.services.flows.fetch_status(&flow.id, &flow.scope, action_id)?)
    }

    /// Poll a run until it finishes, handing every status to `on_status`.
    pub fn progress<C>(&self, action_id: &str, budget: &PollBudget, cancel: &CancellationToken, on_status: C) -> Result<FlowRun, ClientError>
    where
        C: FnMut(&FlowRun),
    {
        let flow = self.stored_flow()?;
        let flows = self.services.flows.as_ref();
        poll_until_terminal(
            action_id,
            budget,
            cancel,
            || Ok(flows.fetch_status(&flow.id, &flow.scope, action_id)?),
            on_status,
        )
    }

    /// [`FlowClient::progress`] with the configured budget and the logging callback.
    pub fn wait(&self, action_id: &str, cancel: &CancellationToken) -> Result<FlowRun, ClientError> {
        self.progress(action_id, &self.options.poll, cancel, log_active_status)
    }

    /// Output recorded for `state_name` in the run's details.
    pub fn get_details(&self, action_id: &str, state_name: &str) -> Result<Option<Value>, ClientError> {
        let run = self.get_status(action_id)?;
        Ok(run.details.get("output").and_then(|output| output.get(state_name)).cloned())
    }

    pub fn run_url(&self, action_id: &str) -> Result<String, ClientError> {
        Ok(run_url(&self.stored_flow()?.id, action_id))
    }
}

/// Add default values under `input` without replacing caller-provided keys.
fn add_defaults(flow_input: &mut Value, defaults: IndexMap<String, String>) {
    let Some(input) = flow_input.get_mut(INPUT_KEY).and_then(Value::as_object_mut) else {
        return;
    };
    for (key, value) in defaults {
        input.entry(key).or_insert(Value::String(value));
    }
}

pub fn run_url(flow_id: &str, action_id: &str) -> String {
    format!("{RUN_URL_BASE}/{flow_id}/runs/{action_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_never_replace_caller_values() {
        let mut input = json!({ "input": { "hello_function_id": "pinned" } });
        let defaults: IndexMap<String, String> = [
            ("hello_function_id".to_string(), "fn-1".to_string()),
            ("other_function_id".to_string(), "fn-2".to_string()),
        ]
        .into_iter()
        .collect();
        add_defaults(&mut input, defaults);
        assert_eq!(input, json!({ "input": { "hello_function_id": "pinned", "other_function_id": "fn-2" } }));
    }

    #[test]
    fn run_url_points_at_the_run_page() {
        assert_eq!(run_url("f-1", "a-1"), "https://app.globus.org/flows/f-1/runs/a-1");
    }
}
