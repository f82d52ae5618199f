//! Secret storage for login tokens.
//!
//! Secrets live in the OS keychain by default. Setting `FLOWSMITH_SECRETS_BACKEND=env` switches to
//! reading them from process environment variables, which keeps CI runs keychain-free.

use thiserror::Error;
use tracing::debug;

static SERVICE: &str = "flowsmith";
/// Environment variable used to select the secret backend.
pub const SECRETS_BACKEND_ENV_VAR: &str = "FLOWSMITH_SECRETS_BACKEND";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretsBackend {
    /// OS keychain via `keyring`.
    Keychain,
    /// Read-only: secret `NAME` is read from the environment variable `NAME` (upper-cased, with
    /// non-alphanumerics replaced by `_`).
    Environment,
}

impl SecretsBackend {
    fn from_env_var(raw: Option<String>) -> Self {
        match raw.unwrap_or_default().trim().to_ascii_lowercase().as_str() {
            "env" => Self::Environment,
            _ => Self::Keychain,
        }
    }
}

/// Determine the currently configured secrets backend.
pub fn secrets_backend() -> SecretsBackend {
    SecretsBackend::from_env_var(std::env::var(SECRETS_BACKEND_ENV_VAR).ok())
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SecretsError {
    #[error("Missing secret: {name} - {error}")]
    MissingSecret { name: String, error: String },

    #[error("Keyring error for {name}: {error}")]
    KeyringError { name: String, error: String },
}

impl SecretsError {
    fn keyring(name: &str, error: impl ToString) -> Self {
        Self::KeyringError {
            name: name.to_string(),
            error: error.to_string(),
        }
    }
}

fn environment_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

/// Load a secret, returning `Ok(None)` when it has never been stored.
pub fn load_secret(name: &str) -> Result<Option<String>, SecretsError> {
    match secrets_backend() {
        SecretsBackend::Environment => Ok(std::env::var(environment_name(name)).ok()),
        SecretsBackend::Keychain => {
            let entry = keyring::Entry::new(SERVICE, name).map_err(|error| SecretsError::keyring(name, error))?;
            match entry.get_password() {
                Ok(value) => Ok(Some(value)),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(error) => Err(SecretsError::MissingSecret {
                    name: name.to_string(),
                    error: error.to_string(),
                }),
            }
        }
    }
}

/// Store a secret in the OS keychain. A no-op for the environment backend.
pub fn store_secret(name: &str, value: &str) -> Result<(), SecretsError> {
    if secrets_backend() == SecretsBackend::Environment {
        debug!(secret = name, "environment secrets backend is read-only, skipping store");
        return Ok(());
    }
    let entry = keyring::Entry::new(SERVICE, name).map_err(|error| SecretsError::keyring(name, error))?;
    entry.set_password(value).map_err(|error| SecretsError::keyring(name, error))?;
    debug!(secret = name, "stored secret in keychain");
    Ok(())
}

/// Remove a secret from the OS keychain. Removing a missing secret succeeds.
pub fn remove_secret(name: &str) -> Result<(), SecretsError> {
    if secrets_backend() == SecretsBackend::Environment {
        return Ok(());
    }
    let entry = keyring::Entry::new(SERVICE, name).map_err(|error| SecretsError::keyring(name, error))?;
    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => {
            debug!(secret = name, "removed secret from keychain");
            Ok(())
        }
        Err(error) => Err(SecretsError::keyring(name, error)),
    }
}
