//! Error taxonomy shared across Flowsmith crates.
//!
//! - [`ConfigurationError`]: malformed modifiers, missing input, malformed input envelopes and
//!   remote-reported run failures. Never retried.
//! - [`RegistrationError`]: missing or stale registrations. Recoverable by auto-registration.
//! - [`AuthError`]: missing or stale authorizations. Recoverable by login/refresh.
//! - [`RemoteServiceError`]: opaque failures from remote services, propagated verbatim.

use thiserror::Error;

use crate::modifier::ModifierKind;
use crate::registration::ArtifactRef;

/// Marker the flow service puts in its error detail when it cannot obtain dependent tokens.
pub const MISSING_SCOPE_MARKER: &str = "unable to get tokens for scopes";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Flow modifiers must be a mapping of function identifiers to modifier mappings: {reason}")]
    InvalidModifierSet { reason: String },

    #[error("Modifier target '{target}' does not exist. Allowed targets include: {}", .allowed.join(", "))]
    UnknownModifierTarget { target: String, allowed: Vec<String> },

    #[error("Unsupported modifier '{kind}' for '{target}'. The only supported modifiers are: {}", ModifierKind::SUPPORTED.join(", "))]
    UnsupportedModifierKind { target: String, kind: String },

    #[error("Modifier target '{target}' refers to state '{state}', which is not part of the flow")]
    MissingState { target: String, state: String },

    #[error("Tool '{tool}' requires flow input value: '{key}'")]
    MissingRequiredInput { tool: String, key: String },

    #[error("Malformed input to flow, all input must be nested under 'input', got keys: {keys:?}")]
    MalformedFlowInput { keys: Vec<String> },

    #[error("Tool '{tool}' has no flow definition and no functions to generate one from")]
    MissingFlowFragment { tool: String },

    #[error("No tool registered under '{id}'")]
    UnknownTool { id: String },

    #[error("No flow definition available: {reason}")]
    MissingFlowDefinition { reason: String },

    #[error("Flow definition cannot be serialized: {reason}")]
    InvalidFlowDefinition { reason: String },

    #[error("Flow failed: {detail}")]
    RunFailed { detail: String },
}

impl ConfigurationError {
    pub fn invalid_modifier_set(reason: impl Into<String>) -> Self {
        Self::InvalidModifierSet { reason: reason.into() }
    }

    pub fn unknown_modifier_target(target: impl Into<String>, allowed: Vec<String>) -> Self {
        Self::UnknownModifierTarget {
            target: target.into(),
            allowed,
        }
    }

    pub fn unsupported_modifier_kind(target: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::UnsupportedModifierKind {
            target: target.into(),
            kind: kind.into(),
        }
    }

    pub fn missing_required_input(tool: impl Into<String>, key: impl Into<String>) -> Self {
        Self::MissingRequiredInput {
            tool: tool.into(),
            key: key.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("No registration for {artifact} in section '{section}'")]
    NotRegistered { artifact: ArtifactRef, section: String },

    #[error("{artifact} has changed and needs to be re-registered (section '{section}')")]
    ArtifactObsolete { artifact: ArtifactRef, section: String },
}

impl RegistrationError {
    /// The artifact this error is about.
    pub fn artifact(&self) -> &ArtifactRef {
        match self {
            RegistrationError::NotRegistered { artifact, .. } | RegistrationError::ArtifactObsolete { artifact, .. } => artifact,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Not logged in, missing scopes: {}", .missing_scopes.join(", "))]
    NotAuthenticated { missing_scopes: Vec<String> },

    #[error("Re-authentication required for scopes: {}", .missing_scopes.join(", "))]
    NeedsReauth { missing_scopes: Vec<String> },

    #[error("Login failed: {reason}")]
    LoginFailed { reason: String },
}

impl AuthError {
    pub fn missing_scopes(&self) -> &[String] {
        match self {
            AuthError::NotAuthenticated { missing_scopes } | AuthError::NeedsReauth { missing_scopes } => missing_scopes,
            AuthError::LoginFailed { .. } => &[],
        }
    }
}

/// Opaque failure reported by a remote service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{service} service error: {detail}")]
pub struct RemoteServiceError {
    /// Which service failed (for example, `functions` or `flows`).
    pub service: String,
    /// HTTP status, when the failure came from a response.
    pub status: Option<u16>,
    /// Service-specific error code (for example, `NOT_FOUND`).
    pub code: Option<String>,
    /// Remote-reported failure detail.
    pub detail: String,
}

impl RemoteServiceError {
    pub fn new(service: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            status: None,
            code: None,
            detail: detail.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
            || self
                .code
                .as_deref()
                .is_some_and(|code| code.eq_ignore_ascii_case("not found") || code.eq_ignore_ascii_case("not_found"))
    }

    /// True when the service could not obtain tokens for `scope`.
    ///
    /// When the detail lists the scopes it failed on, `scope` must be among them.
    pub fn reports_missing_scope(&self, scope: &str) -> bool {
        let detail = self.detail.to_ascii_lowercase();
        let Some(position) = detail.find(MISSING_SCOPE_MARKER) else {
            return false;
        };
        let mut listed = self.detail[position + MISSING_SCOPE_MARKER.len()..]
            .split(|c: char| c.is_whitespace() || c == ',')
            .map(|entry| entry.trim_matches(|c: char| matches!(c, ':' | '.' | ';' | '\'' | '"' | '[' | ']' | '(' | ')' | '{' | '}')))
            .filter(|entry| !entry.is_empty())
            .peekable();
        listed.peek().is_none() || listed.any(|entry| entry == scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_scope_detection_matches_flow_scope() {
        let scope = "https://auth.example.org/scopes/flow-1/run";
        let error = RemoteServiceError::new("flows", format!("Unable to get tokens for scopes: {scope}")).with_status(400);
        assert!(error.reports_missing_scope(scope));
        assert!(!error.reports_missing_scope("https://auth.example.org/scopes/other/run"));

        let bare = RemoteServiceError::new("flows", "unable to get tokens for scopes");
        assert!(bare.reports_missing_scope(scope));

        let unrelated = RemoteServiceError::new("flows", "internal error").with_status(500);
        assert!(!unrelated.reports_missing_scope(scope));
    }

    #[test]
    fn missing_scope_detection_compares_whole_scopes() {
        let scope = "https://auth.example.org/scopes/flow-1/run";
        let longer = RemoteServiceError::new("flows", format!("Unable to get tokens for scopes: {scope}/more"));
        assert!(!longer.reports_missing_scope(scope));

        let listed = RemoteServiceError::new("flows", format!("Unable to get tokens for scopes: ['other', '{scope}']."));
        assert!(listed.reports_missing_scope(scope));
        assert!(listed.reports_missing_scope("other"));
        assert!(!listed.reports_missing_scope("oth"));
    }

    #[test]
    fn not_found_uses_status_or_code() {
        assert!(RemoteServiceError::new("flows", "gone").with_status(404).is_not_found());
        assert!(RemoteServiceError::new("flows", "gone").with_code("Not Found").is_not_found());
        assert!(!RemoteServiceError::new("flows", "boom").with_status(500).is_not_found());
    }

    #[test]
    fn messages_carry_actionable_detail() {
        let error = RegistrationError::ArtifactObsolete {
            artifact: ArtifactRef::function("hello"),
            section: "my_client".into(),
        };
        assert!(error.to_string().contains("function 'hello'"));

        let error = AuthError::NeedsReauth {
            missing_scopes: vec!["scope-a".into()],
        };
        assert_eq!(error.missing_scopes(), ["scope-a".to_string()]);
        assert!(error.to_string().contains("scope-a"));
    }
}
