use flowsmith_registry::CacheError;
use flowsmith_types::{AuthError, ConfigurationError, RegistrationError, RemoteServiceError};
use flowsmith_util::ConfigStoreError;
use thiserror::Error;

/// Every failure a [`crate::FlowClient`] operation can report.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Remote(#[from] RemoteServiceError),
    #[error("failed to persist registration: {0}")]
    Store(#[from] ConfigStoreError),
    #[error("Run '{action_id}' did not reach a terminal status after {polls} polls")]
    PollTimeout { action_id: String, polls: u32 },
    #[error("Stopped waiting for run '{action_id}'")]
    PollCancelled { action_id: String },
    #[error("async runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

impl From<CacheError> for ClientError {
    fn from(error: CacheError) -> Self {
        match error {
            CacheError::Registration(error) => ClientError::Registration(error),
            CacheError::Remote(error) => ClientError::Remote(error),
            CacheError::Store(error) => ClientError::Store(error),
        }
    }
}

impl ClientError {
    /// Scopes a login would need to fix this error, if it is an auth error.
    pub fn missing_scopes(&self) -> &[String] {
        match self {
            ClientError::Auth(error) => error.missing_scopes(),
            _ => &[],
        }
    }
}
