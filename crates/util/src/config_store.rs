//! Persisted configuration sections.
//!
//! Configuration is a two-level mapping of section name to key/value strings. Flowsmith keeps two
//! files: a shared file (checked in next to a project, holding user-facing overrides) and a private
//! file under the user's config directory (holding registration records). A [`LayeredConfig`] reads
//! both, with shared values taking precedence.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::path_processing::{expand_tilde, flowsmith_config_file, path_from_env_or};

/// Environment variable overriding the shared config file location.
pub const CONFIG_PATH_ENV: &str = "FLOWSMITH_CONFIG_PATH";
/// Environment variable overriding the private config file location.
pub const SECRETS_PATH_ENV: &str = "FLOWSMITH_SECRETS_PATH";

pub const SHARED_CONFIG_FILE_NAME: &str = "flowsmith.json";
pub const PRIVATE_CONFIG_FILE_NAME: &str = "registrations.json";

#[derive(Debug, Error)]
pub enum ConfigStoreError {
    #[error("config I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("config serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ConfigStoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

type Section = IndexMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
struct ConfigFile {
    sections: IndexMap<String, Section>,
}

impl ConfigFile {
    fn get(&self, section: &str, key: &str) -> Option<String> {
        self.sections.get(section).and_then(|entries| entries.get(key)).cloned()
    }

    fn set(&mut self, section: &str, key: &str, value: &str) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, section: &str, key: &str) -> bool {
        self.sections
            .get_mut(section)
            .is_some_and(|entries| entries.shift_remove(key).is_some())
    }

    fn ensure_section(&mut self, section: &str) -> bool {
        if self.sections.contains_key(section) {
            return false;
        }
        self.sections.insert(section.to_string(), Section::new());
        true
    }
}

/// Key/value configuration grouped into named sections.
///
/// Mutations are held in memory until [`ConfigStore::save`] is called, so a caller can stage several
/// related keys and persist them together.
pub trait ConfigStore: Send + Sync {
    fn get(&self, section: &str, key: &str) -> Option<String>;

    fn set(&self, section: &str, key: &str, value: &str);

    /// Remove a key, returning whether it was present.
    fn remove(&self, section: &str, key: &str) -> bool;

    /// Snapshot of every key in a section. Empty when the section does not exist.
    fn section(&self, section: &str) -> IndexMap<String, String>;

    /// Create an empty section if missing. Returns `true` when the section was created.
    fn ensure_section(&self, section: &str) -> bool;

    /// Persist staged changes.
    fn save(&self) -> Result<(), ConfigStoreError>;
}

/// JSON-backed store persisted on disk.
pub struct JsonConfigStore {
    path: PathBuf,
    file: Mutex<ConfigFile>,
}

impl JsonConfigStore {
    /// Open the store at `path`. A missing file yields an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigStoreError> {
        let path = expand_tilde(&path.into().to_string_lossy());
        let file = load_config_file(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Open the shared config at its default location.
    pub fn shared_default() -> Result<Self, ConfigStoreError> {
        Self::open(default_shared_config_path())
    }

    /// Open the private config at its default location.
    pub fn private_default() -> Result<Self, ConfigStoreError> {
        Self::open(default_private_config_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for JsonConfigStore {
    fn get(&self, section: &str, key: &str) -> Option<String> {
        self.file.lock().expect("config lock poisoned").get(section, key)
    }

    fn set(&self, section: &str, key: &str, value: &str) {
        self.file.lock().expect("config lock poisoned").set(section, key, value);
    }

    fn remove(&self, section: &str, key: &str) -> bool {
        self.file.lock().expect("config lock poisoned").remove(section, key)
    }

    fn section(&self, section: &str) -> IndexMap<String, String> {
        let file = self.file.lock().expect("config lock poisoned");
        file.sections.get(section).cloned().unwrap_or_default()
    }

    fn ensure_section(&self, section: &str) -> bool {
        self.file.lock().expect("config lock poisoned").ensure_section(section)
    }

    fn save(&self) -> Result<(), ConfigStoreError> {
        let file = self.file.lock().expect("config lock poisoned");
        write_config_file(&self.path, &file)
    }
}

/// In-memory store used by tests and dry runs. Counts saves so callers can assert persistence.
#[derive(Default)]
pub struct MemoryConfigStore {
    file: Mutex<ConfigFile>,
    saves: AtomicUsize,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a section with entries.
    pub fn with_section<K, V>(self, section: &str, entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        {
            let mut file = self.file.lock().expect("config lock poisoned");
            file.ensure_section(section);
            for (key, value) in entries {
                file.set(section, key.as_ref(), value.as_ref());
            }
        }
        self
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, section: &str, key: &str) -> Option<String> {
        self.file.lock().expect("config lock poisoned").get(section, key)
    }

    fn set(&self, section: &str, key: &str, value: &str) {
        self.file.lock().expect("config lock poisoned").set(section, key, value);
    }

    fn remove(&self, section: &str, key: &str) -> bool {
        self.file.lock().expect("config lock poisoned").remove(section, key)
    }

    fn section(&self, section: &str) -> IndexMap<String, String> {
        let file = self.file.lock().expect("config lock poisoned");
        file.sections.get(section).cloned().unwrap_or_default()
    }

    fn ensure_section(&self, section: &str) -> bool {
        self.file.lock().expect("config lock poisoned").ensure_section(section)
    }

    fn save(&self) -> Result<(), ConfigStoreError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Shared and private configuration read together.
pub struct LayeredConfig<'a> {
    shared: &'a dyn ConfigStore,
    private: &'a dyn ConfigStore,
}

impl<'a> LayeredConfig<'a> {
    pub fn new(shared: &'a dyn ConfigStore, private: &'a dyn ConfigStore) -> Self {
        Self { shared, private }
    }

    /// Look a key up, preferring the shared layer.
    pub fn get(&self, section: &str, key: &str) -> Option<String> {
        self.shared.get(section, key).or_else(|| self.private.get(section, key))
    }

    /// Private section entries overlaid by shared ones.
    pub fn section(&self, section: &str) -> IndexMap<String, String> {
        let mut merged = self.private.section(section);
        merged.extend(self.shared.section(section));
        merged
    }
}

/// Shared config path: `$FLOWSMITH_CONFIG_PATH`, else `flowsmith.json` in the working directory.
pub fn default_shared_config_path() -> PathBuf {
    path_from_env_or(CONFIG_PATH_ENV, || PathBuf::from(SHARED_CONFIG_FILE_NAME))
}

/// Private config path: `$FLOWSMITH_SECRETS_PATH`, else the user config directory.
pub fn default_private_config_path() -> PathBuf {
    path_from_env_or(SECRETS_PATH_ENV, || flowsmith_config_file(PRIVATE_CONFIG_FILE_NAME))
}

fn load_config_file(path: &Path) -> Result<ConfigFile, ConfigStoreError> {
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<ConfigFile>(&content) {
            Ok(file) => Ok(file),
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to parse config file, starting empty");
                Ok(ConfigFile::default())
            }
        },
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(error) => Err(ConfigStoreError::io(path, error)),
    }
}

fn write_config_file(path: &Path, file: &ConfigFile) -> Result<(), ConfigStoreError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|error| ConfigStoreError::io(parent, error))?;
    }
    let content = serde_json::to_string_pretty(file)?;
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, content).map_err(|error| ConfigStoreError::io(&staging, error))?;
    fs::rename(&staging, path).map_err(|error| ConfigStoreError::io(path, error))?;
    debug!(path = %path.display(), "saved config");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn json_store_persists_sections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("registrations.json");
        let store = JsonConfigStore::open(&path).unwrap();
        assert!(store.ensure_section("hello_client"));
        assert!(!store.ensure_section("hello_client"));
        store.set("hello_client", "flow_id", "flow-1");
        store.set("hello_client", "flow_checksum", "abc");
        store.save().unwrap();

        drop(store);
        let reloaded = JsonConfigStore::open(&path).unwrap();
        assert_eq!(reloaded.get("hello_client", "flow_id").as_deref(), Some("flow-1"));
        assert_eq!(reloaded.section("hello_client").len(), 2);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn unsaved_changes_are_not_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registrations.json");
        let store = JsonConfigStore::open(&path).unwrap();
        store.set("section", "key", "value");

        let reloaded = JsonConfigStore::open(&path).unwrap();
        assert_eq!(reloaded.get("section", "key"), None);
    }

    #[test]
    fn malformed_file_yields_empty_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registrations.json");
        fs::write(&path, "{ not json").unwrap();
        let store = JsonConfigStore::open(&path).unwrap();
        assert!(store.section("anything").is_empty());
    }

    #[test]
    fn shared_layer_takes_precedence() {
        let shared = MemoryConfigStore::new().with_section("hello_client", [("name", "shared")]);
        let private = MemoryConfigStore::new().with_section("hello_client", [("name", "private"), ("flow_id", "f-1")]);
        let layered = LayeredConfig::new(&shared, &private);
        assert_eq!(layered.get("hello_client", "name").as_deref(), Some("shared"));
        assert_eq!(layered.get("hello_client", "flow_id").as_deref(), Some("f-1"));
        assert_eq!(layered.section("hello_client")["name"], "shared");
    }

    #[test]
    fn memory_store_counts_saves_and_removes_keys() {
        let store = MemoryConfigStore::new();
        store.set("s", "k", "v");
        assert!(store.remove("s", "k"));
        assert!(!store.remove("s", "k"));
        store.save().unwrap();
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn default_paths_honor_env_overrides() {
        temp_env::with_vars(
            [(CONFIG_PATH_ENV, Some("/tmp/shared.json")), (SECRETS_PATH_ENV, Some("~/private.json"))],
            || {
                assert_eq!(default_shared_config_path(), PathBuf::from("/tmp/shared.json"));
                assert_eq!(default_private_config_path(), expand_tilde("~/private.json"));
            },
        );
        temp_env::with_var(CONFIG_PATH_ENV, None::<&str>, || {
            assert_eq!(default_shared_config_path(), PathBuf::from(SHARED_CONFIG_FILE_NAME));
        });
    }
}
