//! Credential providers.
//!
//! Interactive login is delegated to a [`LoginHandler`]; providers only decide when to call it and
//! where tokens are kept.

use std::sync::Mutex;

use flowsmith_registry::{Authorizations, CredentialProvider};
use flowsmith_types::AuthError;
use flowsmith_util::{load_secret, remove_secret, store_secret};
use tracing::{debug, info, warn};

/// Obtains tokens for a set of scopes.
pub trait LoginHandler: Send + Sync {
    fn login(&self, scopes: &[String]) -> Result<Authorizations, AuthError>;
}

impl<T: LoginHandler + ?Sized> LoginHandler for Box<T> {
    fn login(&self, scopes: &[String]) -> Result<Authorizations, AuthError> {
        (**self).login(scopes)
    }
}

/// Issues one pre-obtained token for every requested scope.
pub struct TokenLogin {
    token: String,
}

impl TokenLogin {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

impl LoginHandler for TokenLogin {
    fn login(&self, scopes: &[String]) -> Result<Authorizations, AuthError> {
        if self.token.trim().is_empty() {
            return Err(AuthError::LoginFailed {
                reason: "no access token provided".into(),
            });
        }
        Ok(scopes.iter().map(|scope| (scope.clone(), self.token.clone())).collect())
    }
}

/// Refuses to log in; for non-interactive runs that must already hold tokens.
pub struct NoLogin;

impl LoginHandler for NoLogin {
    fn login(&self, scopes: &[String]) -> Result<Authorizations, AuthError> {
        Err(AuthError::NotAuthenticated {
            missing_scopes: scopes.to_vec(),
        })
    }
}

fn scopes_to_request(current: &Authorizations, scopes: &[String], force: bool) -> Vec<String> {
    if force {
        return scopes.to_vec();
    }
    scopes.iter().filter(|scope| !current.contains_key(scope.as_str())).cloned().collect()
}

/// Tokens held in memory only.
pub struct MemoryCredentials {
    tokens: Mutex<Authorizations>,
    login: Box<dyn LoginHandler>,
}

impl MemoryCredentials {
    pub fn new(login: impl LoginHandler + 'static) -> Self {
        Self {
            tokens: Mutex::new(Authorizations::new()),
            login: Box::new(login),
        }
    }

    pub fn with_tokens(self, tokens: Authorizations) -> Self {
        self.tokens.lock().expect("credentials lock poisoned").extend(tokens);
        self
    }
}

impl CredentialProvider for MemoryCredentials {
    fn authorizations(&self) -> Authorizations {
        self.tokens.lock().expect("credentials lock poisoned").clone()
    }

    fn refresh(&self, scopes: &[String], force: bool) -> Result<(), AuthError> {
        let mut tokens = self.tokens.lock().expect("credentials lock poisoned");
        let requested = scopes_to_request(&tokens, scopes, force);
        if requested.is_empty() {
            return Ok(());
        }
        tokens.extend(self.login.login(&requested)?);
        Ok(())
    }

    fn revoke(&self) -> Result<(), AuthError> {
        self.tokens.lock().expect("credentials lock poisoned").clear();
        Ok(())
    }
}

/// Tokens persisted as one JSON secret per client section.
pub struct KeyringCredentials {
    secret_name: String,
    tokens: Mutex<Option<Authorizations>>,
    login: Box<dyn LoginHandler>,
}

impl KeyringCredentials {
    pub fn new(section: &str, login: impl LoginHandler + 'static) -> Self {
        Self {
            secret_name: format!("{section}-tokens"),
            tokens: Mutex::new(None),
            login: Box::new(login),
        }
    }

    fn load(&self) -> Authorizations {
        match load_secret(&self.secret_name) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|error| {
                warn!(secret = %self.secret_name, %error, "stored tokens are unreadable, ignoring them");
                Authorizations::new()
            }),
            Ok(None) => Authorizations::new(),
            Err(error) => {
                warn!(secret = %self.secret_name, %error, "failed to read stored tokens");
                Authorizations::new()
            }
        }
    }

    fn auth_failure(error: impl ToString) -> AuthError {
        AuthError::LoginFailed { reason: error.to_string() }
    }
}

impl CredentialProvider for KeyringCredentials {
    fn authorizations(&self) -> Authorizations {
        let mut tokens = self.tokens.lock().expect("credentials lock poisoned");
        tokens.get_or_insert_with(|| self.load()).clone()
    }

    fn refresh(&self, scopes: &[String], force: bool) -> Result<(), AuthError> {
        let mut guard = self.tokens.lock().expect("credentials lock poisoned");
        let tokens = guard.get_or_insert_with(|| self.load());
        let requested = scopes_to_request(tokens, scopes, force);
        if requested.is_empty() {
            debug!("already holding tokens for every requested scope");
            return Ok(());
        }

        info!(scopes = ?requested, "requesting tokens");
        tokens.extend(self.login.login(&requested)?);
        let serialized = serde_json::to_string(tokens).map_err(Self::auth_failure)?;
        store_secret(&self.secret_name, &serialized).map_err(Self::auth_failure)?;
        Ok(())
    }

    fn revoke(&self) -> Result<(), AuthError> {
        remove_secret(&self.secret_name).map_err(Self::auth_failure)?;
        *self.tokens.lock().expect("credentials lock poisoned") = Some(Authorizations::new());
        info!(secret = %self.secret_name, "revoked stored tokens");
        Ok(())
    }
}
