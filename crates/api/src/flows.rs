use std::sync::Arc;

use flowsmith_registry::{CredentialProvider, FlowService};
use flowsmith_types::{DeployOptions, DeployedFlow, FlowDefinition, FlowRun, RemoteServiceError, RunOptions};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::{ApiClient, ServiceEndpoint};

#[derive(Debug, Serialize)]
struct FlowBody<'a> {
    definition: &'a FlowDefinition,
    #[serde(flatten)]
    options: &'a DeployOptions,
}

#[derive(Debug, Serialize)]
struct RunBody<'a> {
    body: &'a Value,
    #[serde(flatten)]
    options: &'a RunOptions,
}

/// Flow service over HTTP.
#[derive(Clone)]
pub struct FlowsApiClient {
    api: ApiClient,
}

impl FlowsApiClient {
    pub fn new(credentials: Arc<dyn CredentialProvider>) -> Result<Self, RemoteServiceError> {
        Ok(Self {
            api: ApiClient::new(ServiceEndpoint::Flows, credentials)?,
        })
    }

    pub fn from_api(api: ApiClient) -> Self {
        Self { api }
    }

    fn write_flow(&self, method: Method, path: &str, definition: &FlowDefinition, options: &DeployOptions) -> Result<DeployedFlow, RemoteServiceError> {
        let request = self
            .api
            .request(method, path, ServiceEndpoint::Flows.scope())
            .json(&FlowBody { definition, options });
        let response = self.api.blocking(self.api.send_json(request))?;
        deployed_flow(&response)
    }

    fn decode_run(response: Value) -> Result<FlowRun, RemoteServiceError> {
        serde_json::from_value(response).map_err(|error| RemoteServiceError::new("flows", format!("invalid run response: {error}")))
    }
}

fn deployed_flow(response: &Value) -> Result<DeployedFlow, RemoteServiceError> {
    let field = |key: &str| {
        response
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| RemoteServiceError::new("flows", format!("flow response did not include '{key}'")))
    };
    Ok(DeployedFlow {
        id: field("id")?,
        scope: field("globus_auth_scope")?,
    })
}

impl FlowService for FlowsApiClient {
    fn deploy(&self, definition: &FlowDefinition, options: &DeployOptions) -> Result<DeployedFlow, RemoteServiceError> {
        self.write_flow(Method::POST, "/flows", definition, options)
    }

    fn update(&self, flow_id: &str, definition: &FlowDefinition, options: &DeployOptions) -> Result<DeployedFlow, RemoteServiceError> {
        self.write_flow(Method::PUT, &format!("/flows/{flow_id}"), definition, options)
    }

    fn start_run(&self, flow_id: &str, flow_scope: &str, input: &Value, options: &RunOptions) -> Result<FlowRun, RemoteServiceError> {
        let request = self
            .api
            .request(Method::POST, &format!("/flows/{flow_id}/run"), flow_scope)
            .json(&RunBody { body: input, options });
        let response = self.api.blocking(self.api.send_json(request))?;
        Self::decode_run(response)
    }

    fn fetch_status(&self, _flow_id: &str, flow_scope: &str, action_id: &str) -> Result<FlowRun, RemoteServiceError> {
        let request = self.api.request(Method::GET, &format!("/runs/{action_id}"), flow_scope);
        let response = self.api.blocking(self.api.send_json(request))?;
        Self::decode_run(response)
    }
}
