//! Shared helpers for Flowsmith crates: naming, checksums, persisted configuration, secrets and the
//! sync-over-async bridge used by the remote service bindings.

pub mod async_runtime;
pub mod checksum;
pub mod config_store;
pub mod naming;
pub mod path_processing;
pub mod secrets;
pub mod text_processing;

pub use async_runtime::block_on_future;
pub use checksum::{canonical_json, checksum_bytes, checksum_value};
pub use config_store::{
    CONFIG_PATH_ENV, ConfigStore, ConfigStoreError, JsonConfigStore, LayeredConfig, MemoryConfigStore, SECRETS_PATH_ENV,
    default_private_config_path, default_shared_config_path,
};
pub use naming::{section_name, state_name};
pub use path_processing::expand_tilde;
pub use secrets::{SECRETS_BACKEND_ENV_VAR, SecretsBackend, SecretsError, load_secret, remove_secret, secrets_backend, store_secret};
pub use text_processing::redact_sensitive;
