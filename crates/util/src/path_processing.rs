use std::env;
use std::path::PathBuf;

use dirs_next::{config_dir, home_dir};

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    let p = path.trim();
    if p == "~" {
        return home_dir().unwrap_or_else(|| PathBuf::from("~"));
    }
    if let Some(rest) = p.strip_prefix("~/") {
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }
    if let Some(rest) = p.strip_prefix("~\\") {
        // Windows-style
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }
    PathBuf::from(p)
}

/// Path from `env_var` when set and non-empty, otherwise `fallback`.
pub fn path_from_env_or(env_var: &str, fallback: impl FnOnce() -> PathBuf) -> PathBuf {
    match env::var(env_var) {
        Ok(path) if !path.trim().is_empty() => expand_tilde(&path),
        _ => fallback(),
    }
}

/// `<config dir>/flowsmith/<file_name>`, falling back to the working directory.
pub fn flowsmith_config_file(file_name: &str) -> PathBuf {
    config_dir().unwrap_or_else(|| PathBuf::from(".")).join("flowsmith").join(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_wins_and_expands_tilde() {
        temp_env::with_var("FLOWSMITH_TEST_PATH", Some("~/custom/config.json"), || {
            let path = path_from_env_or("FLOWSMITH_TEST_PATH", || PathBuf::from("fallback.json"));
            assert_eq!(path, expand_tilde("~/custom/config.json"));
        });
        temp_env::with_var("FLOWSMITH_TEST_PATH", Some("  "), || {
            let path = path_from_env_or("FLOWSMITH_TEST_PATH", || PathBuf::from("fallback.json"));
            assert_eq!(path, PathBuf::from("fallback.json"));
        });
    }

    #[test]
    fn plain_paths_are_untouched() {
        assert_eq!(expand_tilde(" relative/file.json "), PathBuf::from("relative/file.json"));
        assert!(flowsmith_config_file("secrets.json").ends_with("flowsmith/secrets.json"));
    }
}
