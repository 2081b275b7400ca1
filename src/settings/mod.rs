//! Scoped key/value settings storage.
//!
//! Settings live at two levels:
//! - **Module** - Values that apply to a single module
//! - **Global** - Values shared by every module without its own settings
//!
//! The store itself never falls back between scopes; precedence is decided by
//! the resolvers in [`crate::config`].
//!
//! ## Data directory
//!
//! Persisted data for a workspace lives under
//! `<base>/<12 hex chars of sha256(canonical workspace root)>/` where `<base>`
//! is `$APTCONF_DATA_DIR` or `~/.local/share/aptconf`:
//!
//! ```text
//! settings.kdl                    global settings
//! factorypath.kdl                 global factory path
//! modules/<module>/settings.kdl   module settings
//! modules/<module>/factorypath.kdl
//! ```

pub mod file;

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

pub use file::FileSettingsStore;

/// Environment variable overriding the base data directory.
pub const DATA_DIR_ENV: &str = "APTCONF_DATA_DIR";

/// The level at which a setting applies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigScope {
    /// Settings of a single module
    Module(String),
    /// Workspace-wide settings
    Global,
}

impl ConfigScope {
    /// Build a scope from an optional module name.
    pub fn from_module(module: Option<&str>) -> Self {
        match module {
            Some(name) => ConfigScope::Module(name.to_string()),
            None => ConfigScope::Global,
        }
    }

    /// Module name, if this is a module scope.
    pub fn module_name(&self) -> Option<&str> {
        match self {
            ConfigScope::Module(name) => Some(name),
            ConfigScope::Global => None,
        }
    }

    /// Scopes to consult for this scope, most specific first.
    pub fn chain(&self) -> Vec<ConfigScope> {
        match self {
            ConfigScope::Module(_) => vec![self.clone(), ConfigScope::Global],
            ConfigScope::Global => vec![ConfigScope::Global],
        }
    }
}

impl fmt::Display for ConfigScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigScope::Module(name) => write!(f, "module:{}", name),
            ConfigScope::Global => write!(f, "global"),
        }
    }
}

/// Scoped string key/value store.
///
/// Mutations are buffered until [`SettingsStore::flush`] is called for the
/// scope. Reads always observe buffered mutations.
pub trait SettingsStore {
    /// Get a value.
    fn get(&self, scope: &ConfigScope, key: &str) -> Option<String>;

    /// Set a value.
    fn set(&mut self, scope: &ConfigScope, key: &str, value: &str);

    /// Remove a value. Removing a missing key is a no-op.
    fn remove(&mut self, scope: &ConfigScope, key: &str);

    /// All keys present in a scope, sorted.
    fn keys(&self, scope: &ConfigScope) -> Vec<String>;

    /// Write buffered changes of a scope to durable storage.
    fn flush(&mut self, scope: &ConfigScope) -> Result<()>;
}

/// In-memory settings store. `flush` is a no-op.
#[derive(Debug, Clone, Default)]
pub struct MemorySettingsStore {
    scopes: HashMap<ConfigScope, BTreeMap<String, String>>,
}

impl MemorySettingsStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, scope: &ConfigScope, key: &str) -> Option<String> {
        self.scopes.get(scope).and_then(|m| m.get(key).cloned())
    }

    fn set(&mut self, scope: &ConfigScope, key: &str, value: &str) {
        self.scopes
            .entry(scope.clone())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, scope: &ConfigScope, key: &str) {
        if let Some(map) = self.scopes.get_mut(scope) {
            map.remove(key);
        }
    }

    fn keys(&self, scope: &ConfigScope) -> Vec<String> {
        self.scopes
            .get(scope)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn flush(&mut self, _scope: &ConfigScope) -> Result<()> {
        Ok(())
    }
}

/// Get the data directory for a workspace.
///
/// Uses a hash of the canonical workspace root to create a unique directory
/// under the base data directory.
pub fn get_data_dir(workspace_root: &Path) -> Result<PathBuf> {
    let base = match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::data_dir()
            .ok_or_else(|| Error::Other("Could not determine data directory".to_string()))?
            .join("aptconf"),
    };

    let canonical = workspace_root.canonicalize().map_err(|e| {
        Error::Other(format!("Could not canonicalize workspace root: {}", e))
    })?;

    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string_lossy().as_bytes());
    let hash_hex = format!("{:x}", hasher.finalize());

    Ok(base.join(&hash_hex[..12]))
}

/// Directory holding the persisted files of a scope.
pub fn scope_dir(data_dir: &Path, scope: &ConfigScope) -> PathBuf {
    match scope {
        ConfigScope::Global => data_dir.to_path_buf(),
        ConfigScope::Module(name) => data_dir.join("modules").join(encode_dir_name(name)),
    }
}

/// Encode a module name as a single directory name.
///
/// Bytes outside `[A-Za-z0-9._-]` are percent-escaped, so distinct names never
/// share a directory. Names made only of dots are escaped entirely.
fn encode_dir_name(name: &str) -> String {
    if name.is_empty() {
        return "%".to_string();
    }
    let all_dots = name.bytes().all(|b| b == b'.');
    let mut encoded = String::with_capacity(name.len());
    for b in name.bytes() {
        if !all_dots && (b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-')) {
            encoded.push(b as char);
        } else {
            encoded.push_str(&format!("%{:02X}", b));
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_scope_display() {
        assert_eq!(ConfigScope::Global.to_string(), "global");
        assert_eq!(ConfigScope::Module("app".to_string()).to_string(), "module:app");
    }

    #[test]
    fn test_scope_chain() {
        let module = ConfigScope::Module("app".to_string());
        assert_eq!(module.chain(), vec![module.clone(), ConfigScope::Global]);
        assert_eq!(ConfigScope::Global.chain(), vec![ConfigScope::Global]);
    }

    #[test]
    fn test_memory_store_scopes_are_independent() {
        let mut store = MemorySettingsStore::new();
        let module = ConfigScope::Module("app".to_string());

        store.set(&ConfigScope::Global, "a", "1");
        store.set(&module, "b", "2");

        assert_eq!(store.get(&ConfigScope::Global, "a").as_deref(), Some("1"));
        assert_eq!(store.get(&module, "a"), None);
        assert_eq!(store.keys(&module), vec!["b".to_string()]);

        store.remove(&module, "b");
        store.remove(&module, "missing");
        assert!(store.keys(&module).is_empty());
    }

    #[test]
    fn test_encode_dir_name() {
        assert_eq!(encode_dir_name("app"), "app");
        assert_eq!(encode_dir_name("group/app"), "group%2Fapp");
        assert_eq!(encode_dir_name("group_app"), "group_app");
        assert_eq!(encode_dir_name("a%2Fb"), "a%252Fb");
        assert_eq!(encode_dir_name("caf\u{e9}"), "caf%C3%A9");
        assert_eq!(encode_dir_name(".."), "%2E%2E");
        assert_eq!(encode_dir_name("a.b"), "a.b");
        assert_eq!(encode_dir_name(""), "%");
    }

    #[test]
    fn test_similar_module_names_get_distinct_dirs() {
        let data = Path::new("/data");
        let names = ["a/b", "a_b", "a b", "a%2Fb", "a\\b"];
        let dirs: std::collections::HashSet<PathBuf> = names
            .iter()
            .map(|name| scope_dir(data, &ConfigScope::Module(name.to_string())))
            .collect();
        assert_eq!(dirs.len(), names.len());
    }

    #[test]
    fn test_scope_dir() {
        let data = Path::new("/data");
        assert_eq!(scope_dir(data, &ConfigScope::Global), PathBuf::from("/data"));
        assert_eq!(
            scope_dir(data, &ConfigScope::Module("app".to_string())),
            PathBuf::from("/data/modules/app")
        );
    }

    #[test]
    #[serial]
    fn test_get_data_dir_uses_env_override() {
        let base = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();

        // SAFETY: serialized with other env-mutating tests
        unsafe { std::env::set_var(DATA_DIR_ENV, base.path()) };
        let dir = get_data_dir(workspace.path()).unwrap();
        unsafe { std::env::remove_var(DATA_DIR_ENV) };

        assert_eq!(dir.parent().unwrap(), base.path());
        assert_eq!(dir.file_name().unwrap().len(), 12);
    }

    #[test]
    #[serial]
    fn test_get_data_dir_is_stable() {
        let base = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();

        unsafe { std::env::set_var(DATA_DIR_ENV, base.path()) };
        let first = get_data_dir(workspace.path()).unwrap();
        let second = get_data_dir(workspace.path()).unwrap();
        unsafe { std::env::remove_var(DATA_DIR_ENV) };

        assert_eq!(first, second);
    }
}
