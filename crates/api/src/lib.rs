//! HTTP bindings for the remote function and flow services.
//!
//! - [`ApiClient`] wraps a configured `reqwest::Client` with a validated base URL and bearer
//!   tokens taken from a [`CredentialProvider`].
//! - [`FunctionsApiClient`] implements [`flowsmith_registry::FunctionService`].
//! - [`FlowsApiClient`] implements [`flowsmith_registry::FlowService`].
//!
//! The registry traits are synchronous; requests run through
//! [`flowsmith_util::block_on_future`]. Non-success responses become [`RemoteServiceError`]s with
//! the remote `code` and detail preserved.
//!
//! Base URLs come from `FLOWSMITH_FUNCTIONS_API_BASE` / `FLOWSMITH_FLOWS_API_BASE` when set.

use std::env;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use flowsmith_registry::CredentialProvider;
use flowsmith_types::RemoteServiceError;
use flowsmith_util::{block_on_future, redact_sensitive};
use reqwest::{Client, Method, RequestBuilder, Url, header};
use serde_json::Value;
use tracing::debug;

mod flows;
mod functions;

pub use flows::FlowsApiClient;
pub use functions::FunctionsApiClient;

/// Hostnames allowed for local development regardless of scheme.
const LOCALHOST_DOMAINS: &[&str] = &["localhost", "127.0.0.1"];

/// A remote service and where to find it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceEndpoint {
    Functions,
    Flows,
}

impl ServiceEndpoint {
    pub fn name(&self) -> &'static str {
        match self {
            ServiceEndpoint::Functions => "functions",
            ServiceEndpoint::Flows => "flows",
        }
    }

    pub fn env_var(&self) -> &'static str {
        match self {
            ServiceEndpoint::Functions => "FLOWSMITH_FUNCTIONS_API_BASE",
            ServiceEndpoint::Flows => "FLOWSMITH_FLOWS_API_BASE",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ServiceEndpoint::Functions => "https://compute.api.globus.org",
            ServiceEndpoint::Flows => "https://flows.globus.org",
        }
    }

    /// Scope needed to manage resources on this service.
    pub fn scope(&self) -> &'static str {
        match self {
            ServiceEndpoint::Functions => "https://auth.globus.org/scopes/facd7ccc-c5f4-42aa-916b-a0e270e2c2a9/all",
            ServiceEndpoint::Flows => "https://auth.globus.org/scopes/eec9b274-0c81-4334-bdc2-54e90e689b9a/manage_flows",
        }
    }

    /// Base URL from the environment override, or the default.
    pub fn base_url(&self) -> String {
        env::var(self.env_var())
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| self.default_base_url().to_string())
    }
}

/// Scopes needed to register functions and deploy flows.
pub fn base_scopes() -> Vec<String> {
    [ServiceEndpoint::Functions, ServiceEndpoint::Flows]
        .iter()
        .map(|endpoint| endpoint.scope().to_string())
        .collect()
}

/// Thin wrapper around a configured `reqwest::Client` for one service.
#[derive(Clone)]
pub struct ApiClient {
    pub endpoint: ServiceEndpoint,
    pub base_url: String,
    pub http: Client,
    pub user_agent: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl ApiClient {
    /// Build a client for `endpoint` using the environment-configured base URL.
    pub fn new(endpoint: ServiceEndpoint, credentials: Arc<dyn CredentialProvider>) -> Result<Self, RemoteServiceError> {
        Self::with_base_url(endpoint, endpoint.base_url(), credentials)
    }

    pub fn with_base_url(endpoint: ServiceEndpoint, base_url: impl Into<String>, credentials: Arc<dyn CredentialProvider>) -> Result<Self, RemoteServiceError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        validate_base_url(endpoint, &base_url)?;

        let mut default_headers = header::HeaderMap::new();
        default_headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        let http = Client::builder()
            .default_headers(default_headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|error| RemoteServiceError::new(endpoint.name(), format!("failed to build http client: {error}")))?;

        Ok(Self {
            endpoint,
            base_url,
            http,
            user_agent: format!("flowsmith/{}; {}", env!("CARGO_PKG_VERSION"), env::consts::OS),
            credentials,
        })
    }

    /// Build a request for an API-relative path, authorized with the token for `scope`.
    pub fn request(&self, method: Method, path: &str, scope: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(service = self.endpoint.name(), %method, %url, "building request");

        let builder = self.http.request(method, url).header(header::USER_AGENT, &self.user_agent);
        match self.credentials.token_for(scope) {
            Some(token) => builder.bearer_auth(token),
            None => {
                debug!(service = self.endpoint.name(), scope, "no token for scope, sending unauthenticated");
                builder
            }
        }
    }

    /// Send a request and decode a JSON response body.
    pub async fn send_json(&self, builder: RequestBuilder) -> Result<Value, RemoteServiceError> {
        let service = self.endpoint.name();
        let response = builder
            .send()
            .await
            .map_err(|error| RemoteServiceError::new(service, format!("network error: {error}")))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            debug!(service, status = status.as_u16(), body = %redact_sensitive(&text), "request failed");
            return Err(error_from_response(service, status.as_u16(), &text));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|error| RemoteServiceError::new(service, format!("invalid response body: {error}")).with_status(status.as_u16()))
    }

    /// Run an async request from synchronous code.
    pub(crate) fn blocking<F, T>(&self, future: F) -> Result<T, RemoteServiceError>
    where
        F: Future<Output = Result<T, RemoteServiceError>>,
    {
        block_on_future(async move { Ok::<_, std::io::Error>(future.await) })
            .map_err(|error| RemoteServiceError::new(self.endpoint.name(), format!("failed to start async runtime: {error}")))?
    }
}

/// Map a non-success response to a [`RemoteServiceError`].
///
/// JSON bodies contribute their `code` and their first present of `detail`, `message` or
/// `error` (string or nested object) as the detail; other bodies are used verbatim.
pub fn error_from_response(service: &str, status: u16, body: &str) -> RemoteServiceError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let detail = parsed
        .as_ref()
        .and_then(|value| ["detail", "message", "error"].iter().find_map(|key| value.get(*key)))
        .map(|detail| match detail {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| body.trim().to_string());
    let detail = if detail.is_empty() { format!("HTTP {status}") } else { detail };

    let mut error = RemoteServiceError::new(service, detail).with_status(status);
    if let Some(code) = parsed.as_ref().and_then(|value| value.get("code")).and_then(Value::as_str) {
        error = error.with_code(code);
    }
    error
}

/// Reject non-HTTPS base URLs unless they point at localhost.
fn validate_base_url(endpoint: ServiceEndpoint, base: &str) -> Result<(), RemoteServiceError> {
    let invalid = |detail: String| RemoteServiceError::new(endpoint.name(), detail);
    let parsed = Url::parse(base).map_err(|error| invalid(format!("Invalid {} URL '{}': {}", endpoint.env_var(), base, error)))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| invalid(format!("{} must include a host", endpoint.env_var())))?;

    if LOCALHOST_DOMAINS.iter().any(|&allowed| host.eq_ignore_ascii_case(allowed)) {
        return Ok(());
    }
    if parsed.scheme() != "https" {
        return Err(invalid(format!(
            "{} must use https for non-localhost hosts; got '{}://'",
            endpoint.env_var(),
            parsed.scheme()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_detail_and_code_are_preserved() {
        let error = error_from_response(
            "flows",
            400,
            r#"{"code": "UNABLE_TO_GET_TOKENS", "detail": "Unable to get tokens for scopes: https://auth/scopes/f/run"}"#,
        );
        assert_eq!(error.status, Some(400));
        assert_eq!(error.code.as_deref(), Some("UNABLE_TO_GET_TOKENS"));
        assert!(error.reports_missing_scope("https://auth/scopes/f/run"));
    }

    #[test]
    fn non_json_bodies_are_used_verbatim() {
        let error = error_from_response("functions", 502, "bad gateway\n");
        assert_eq!(error.detail, "bad gateway");
        assert_eq!(error_from_response("functions", 500, "").detail, "HTTP 500");
        assert!(error_from_response("flows", 404, r#"{"code": "NOT_FOUND", "message": "gone"}"#).is_not_found());
    }

    #[test]
    fn base_url_must_be_https_unless_local() {
        assert!(validate_base_url(ServiceEndpoint::Flows, "https://flows.example.org").is_ok());
        assert!(validate_base_url(ServiceEndpoint::Flows, "http://localhost:8080").is_ok());
        assert!(validate_base_url(ServiceEndpoint::Flows, "http://flows.example.org").is_err());
        assert!(validate_base_url(ServiceEndpoint::Flows, "not a url").is_err());
    }

    #[test]
    fn base_url_honors_env_override() {
        temp_env::with_var("FLOWSMITH_FLOWS_API_BASE", Some("http://127.0.0.1:9000"), || {
            assert_eq!(ServiceEndpoint::Flows.base_url(), "http://127.0.0.1:9000");
        });
        temp_env::with_var("FLOWSMITH_FLOWS_API_BASE", None::<&str>, || {
            assert_eq!(ServiceEndpoint::Flows.base_url(), ServiceEndpoint::Flows.default_base_url());
        });
        assert_eq!(base_scopes().len(), 2);
    }
}
