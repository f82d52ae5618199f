use std::sync::Arc;

use flowsmith_registry::{CredentialProvider, FunctionService};
use flowsmith_types::{FunctionDefinition, RemoteServiceError};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::{ApiClient, ServiceEndpoint};

#[derive(Debug, Serialize)]
struct RegisterFunctionBody<'a> {
    function_name: &'a str,
    function_code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<&'a str>,
}

/// Function registry over HTTP.
#[derive(Clone)]
pub struct FunctionsApiClient {
    api: ApiClient,
}

impl FunctionsApiClient {
    pub fn new(credentials: Arc<dyn CredentialProvider>) -> Result<Self, RemoteServiceError> {
        Ok(Self {
            api: ApiClient::new(ServiceEndpoint::Functions, credentials)?,
        })
    }

    pub fn from_api(api: ApiClient) -> Self {
        Self { api }
    }
}

impl FunctionService for FunctionsApiClient {
    fn register(&self, function: &FunctionDefinition) -> Result<String, RemoteServiceError> {
        let body = RegisterFunctionBody {
            function_name: &function.name,
            function_code: &function.source,
            description: function.description.as_deref(),
            language: function.language.as_deref(),
        };
        let request = self
            .api
            .request(Method::POST, "/v2/functions", ServiceEndpoint::Functions.scope())
            .json(&body);
        let response = self.api.blocking(self.api.send_json(request))?;
        let function_id = response
            .get("function_uuid")
            .or_else(|| response.get("function_id"))
            .and_then(Value::as_str)
            .ok_or_else(|| RemoteServiceError::new("functions", "registration response did not include a function id"))?;
        debug!(function = %function.name, id = function_id, "function service accepted registration");
        Ok(function_id.to_string())
    }
}
