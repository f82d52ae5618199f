//! Registration cache and drift detection.
//!
//! Each artifact (a function, the client's flow) is recorded in the private config section with
//! its remote id and content checksum. On every run the stored checksum is compared with the
//! current one:
//!
//! | stored record        | `auto_register` | outcome                                  |
//! |----------------------|-----------------|------------------------------------------|
//! | absent               | on              | register, persist, reuse                 |
//! | absent               | off             | [`RegistrationError::NotRegistered`]     |
//! | present, matching    | any             | reuse the stored id, no remote call      |
//! | present, mismatching | on              | re-register, overwrite, persist          |
//! | present, mismatching | off             | [`RegistrationError::ArtifactObsolete`]  |

use std::sync::Arc;

use flowsmith_types::registration::{FLOW_SCOPE_KEY, function_id_key};
use flowsmith_types::{
    ArtifactKind, ArtifactRef, DeployOptions, DeployedFlow, FlowDefinition, FunctionDefinition, RegistrationError, RegistrationRecord,
    RemoteServiceError,
};
use flowsmith_util::{ConfigStore, ConfigStoreError, checksum_bytes};
use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::remote::{FlowService, FunctionService};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error(transparent)]
    Remote(#[from] RemoteServiceError),
    #[error("failed to persist registration: {0}")]
    Store(#[from] ConfigStoreError),
}

/// State of one artifact relative to its current content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactState {
    Absent,
    Valid(RegistrationRecord),
    Obsolete(RegistrationRecord),
}

/// Checksum ledger over one config section.
pub struct RegistrationCache {
    store: Arc<dyn ConfigStore>,
    section: String,
    auto_register: bool,
}

impl RegistrationCache {
    /// Create a cache over `section`, creating the section if it is missing.
    pub fn new(store: Arc<dyn ConfigStore>, section: impl Into<String>, auto_register: bool) -> Self {
        let section = section.into();
        if store.ensure_section(&section) {
            debug!(section = %section, "created registration section");
        }
        Self {
            store,
            section,
            auto_register,
        }
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn auto_register(&self) -> bool {
        self.auto_register
    }

    /// The flow artifact tracked by this cache.
    pub fn flow_artifact(&self) -> ArtifactRef {
        ArtifactRef::flow(self.section.clone())
    }

    /// Stored record for an artifact.
    ///
    /// A function record needs both id and checksum. A flow record needs id and scope; its
    /// checksum may be missing, in which case it never matches. Empty values count as missing.
    pub fn record(&self, artifact: &ArtifactRef) -> Option<RegistrationRecord> {
        let remote_id = self.stored(&artifact.id_key())?;
        let checksum = self.stored(&artifact.checksum_key());
        let scope = match artifact.kind {
            ArtifactKind::Function => None,
            ArtifactKind::Flow => Some(self.stored(FLOW_SCOPE_KEY)?),
        };
        let checksum = match (artifact.kind, checksum) {
            (_, Some(checksum)) => checksum,
            (ArtifactKind::Flow, None) => String::new(),
            (ArtifactKind::Function, None) => return None,
        };
        Some(RegistrationRecord {
            artifact: artifact.clone(),
            remote_id,
            checksum,
            scope,
        })
    }

    /// Compare the stored record for `artifact` with `checksum`.
    pub fn state(&self, artifact: &ArtifactRef, checksum: &str) -> ArtifactState {
        match self.record(artifact) {
            None => ArtifactState::Absent,
            Some(record) if record.checksum == checksum => ArtifactState::Valid(record),
            Some(record) => ArtifactState::Obsolete(record),
        }
    }

    /// Checksum of a function as the function service serializes it.
    pub fn function_checksum(&self, functions: &dyn FunctionService, function: &FunctionDefinition) -> String {
        checksum_bytes(&functions.serialize_for_checksum(function))
    }

    /// Remote id for `function`, registering it when allowed and needed.
    pub fn function_id(&self, functions: &dyn FunctionService, function: &FunctionDefinition) -> Result<String, CacheError> {
        let artifact = ArtifactRef::function(function.name.clone());
        let checksum = self.function_checksum(functions, function);
        match self.state(&artifact, &checksum) {
            ArtifactState::Valid(record) => {
                debug!(function = %function.name, id = %record.remote_id, "reusing registered function");
                return Ok(record.remote_id);
            }
            ArtifactState::Absent => self.require_auto_register(RegistrationError::NotRegistered {
                artifact: artifact.clone(),
                section: self.section.clone(),
            })?,
            ArtifactState::Obsolete(record) => {
                self.require_auto_register(RegistrationError::ArtifactObsolete {
                    artifact: artifact.clone(),
                    section: self.section.clone(),
                })?;
                info!(function = %function.name, previous = %record.remote_id, "function changed, re-registering");
            }
        }

        let remote_id = functions.register(function)?;
        self.persist(&artifact, &remote_id, &checksum, None)?;
        info!(function = %function.name, id = %remote_id, "registered function");
        Ok(remote_id)
    }

    /// Remote ids for every function, keyed by their flow input key (`<fn>_function_id`).
    pub fn function_ids<'a>(
        &self,
        functions: &dyn FunctionService,
        definitions: impl IntoIterator<Item = &'a FunctionDefinition>,
    ) -> Result<IndexMap<String, String>, CacheError> {
        let mut ids = IndexMap::new();
        for function in definitions {
            let remote_id = self.function_id(functions, function)?;
            ids.insert(function_id_key(&function.name), remote_id);
        }
        Ok(ids)
    }

    /// Deployed flow for `definition`, deploying or updating it when allowed and needed.
    ///
    /// `checksum` must be the checksum of the fully resolved definition.
    pub fn flow(&self, flows: &dyn FlowService, definition: &FlowDefinition, checksum: &str, options: &DeployOptions) -> Result<DeployedFlow, CacheError> {
        let artifact = self.flow_artifact();
        let stored_id = match self.state(&artifact, checksum) {
            ArtifactState::Valid(record) => {
                debug!(flow = %record.remote_id, "reusing deployed flow");
                return Ok(DeployedFlow {
                    id: record.remote_id,
                    scope: record.scope.unwrap_or_default(),
                });
            }
            ArtifactState::Absent => {
                self.require_auto_register(RegistrationError::NotRegistered {
                    artifact: artifact.clone(),
                    section: self.section.clone(),
                })?;
                self.stored(&artifact.id_key())
            }
            ArtifactState::Obsolete(record) => {
                self.require_auto_register(RegistrationError::ArtifactObsolete {
                    artifact: artifact.clone(),
                    section: self.section.clone(),
                })?;
                info!(flow = %record.remote_id, "flow changed, updating");
                Some(record.remote_id)
            }
        };

        let deployed = match stored_id {
            Some(flow_id) => match flows.update(&flow_id, definition, options) {
                Ok(deployed) => deployed,
                Err(error) if error.is_not_found() => {
                    warn!(flow = %flow_id, "stored flow no longer exists, deploying a new one");
                    flows.deploy(definition, options)?
                }
                Err(error) => return Err(error.into()),
            },
            None => flows.deploy(definition, options)?,
        };

        self.persist(&artifact, &deployed.id, checksum, Some(&deployed.scope))?;
        info!(flow = %deployed.id, scope = %deployed.scope, "deployed flow");
        Ok(deployed)
    }

    /// The stored flow, regardless of whether it is current.
    pub fn stored_flow(&self) -> Option<DeployedFlow> {
        self.record(&self.flow_artifact()).map(|record| DeployedFlow {
            id: record.remote_id,
            scope: record.scope.unwrap_or_default(),
        })
    }

    fn require_auto_register(&self, error: RegistrationError) -> Result<(), CacheError> {
        if self.auto_register {
            return Ok(());
        }
        Err(error.into())
    }

    fn stored(&self, key: &str) -> Option<String> {
        self.store.get(&self.section, key).filter(|value| !value.is_empty())
    }

    /// Stage and save the record. A failed save restores the previous values so the unsaved
    /// record is never reused.
    fn persist(&self, artifact: &ArtifactRef, remote_id: &str, checksum: &str, scope: Option<&str>) -> Result<(), CacheError> {
        let mut staged = vec![(artifact.id_key(), remote_id), (artifact.checksum_key(), checksum)];
        if let Some(scope) = scope {
            staged.push((FLOW_SCOPE_KEY.to_string(), scope));
        }

        let previous: Vec<(String, Option<String>)> = staged
            .iter()
            .map(|(key, _)| (key.clone(), self.store.get(&self.section, key)))
            .collect();
        for (key, value) in &staged {
            self.store.set(&self.section, key, value);
        }

        if let Err(error) = self.store.save() {
            warn!(section = %self.section, artifact = %artifact, error = %error, "failed to save registration, rolling back");
            for (key, value) in previous {
                match value {
                    Some(value) => self.store.set(&self.section, &key, &value),
                    None => {
                        self.store.remove(&self.section, &key);
                    }
                }
            }
            return Err(error.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowsmith_types::registration::{FLOW_CHECKSUM_KEY, FLOW_ID_KEY};
    use flowsmith_util::MemoryConfigStore;

    #[test]
    fn function_record_without_checksum_is_absent() {
        let store = Arc::new(MemoryConfigStore::new().with_section("client", [("hello_function_id", "fn-1")]));
        let cache = RegistrationCache::new(store, "client", false);
        assert_eq!(cache.state(&ArtifactRef::function("hello"), "abc"), ArtifactState::Absent);
    }

    #[test]
    fn flow_record_without_scope_is_absent() {
        let store = Arc::new(MemoryConfigStore::new().with_section("client", [(FLOW_ID_KEY, "flow-1"), (FLOW_CHECKSUM_KEY, "abc")]));
        let cache = RegistrationCache::new(store, "client", false);
        assert_eq!(cache.state(&cache.flow_artifact(), "abc"), ArtifactState::Absent);
        assert_eq!(cache.stored_flow(), None);
    }

    #[test]
    fn flow_record_without_checksum_is_obsolete() {
        let store = Arc::new(MemoryConfigStore::new().with_section("client", [(FLOW_ID_KEY, "flow-1"), (FLOW_SCOPE_KEY, "scope")]));
        let cache = RegistrationCache::new(store, "client", false);
        assert!(matches!(cache.state(&cache.flow_artifact(), "abc"), ArtifactState::Obsolete(_)));
    }

    #[test]
    fn empty_stored_values_are_absent() {
        let store = Arc::new(MemoryConfigStore::new().with_section(
            "client",
            [("hello_function_id", ""), ("hello_function_checksum", "abc"), (FLOW_ID_KEY, ""), (FLOW_SCOPE_KEY, "scope")],
        ));
        let cache = RegistrationCache::new(store.clone(), "client", false);
        assert_eq!(cache.state(&ArtifactRef::function("hello"), "abc"), ArtifactState::Absent);
        assert_eq!(cache.state(&cache.flow_artifact(), "abc"), ArtifactState::Absent);

        store.set("client", FLOW_ID_KEY, "flow-1");
        store.set("client", FLOW_SCOPE_KEY, "");
        assert_eq!(cache.stored_flow(), None);
    }

    #[test]
    fn creates_missing_section() {
        let store = Arc::new(MemoryConfigStore::new());
        let cache = RegistrationCache::new(store.clone(), "client", true);
        assert_eq!(cache.section(), "client");
        assert!(!store.ensure_section("client"));
    }
}
