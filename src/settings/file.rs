//! KDL-file backed settings store.
//!
//! Each scope is persisted to its own `settings.kdl`:
//!
//! ```kdl
//! module "app"
//! setting "apt.enabled" "true"
//! setting "apt.processorOptions/debug" "aptconf.NULLVALUE"
//! ```
//!
//! The `module` node names the scope of a module file; the global file has
//! none. All files are loaded when the store is opened and rewritten whole on
//! flush.

use super::{ConfigScope, SettingsStore, scope_dir};
use crate::{Error, Result};
use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Settings file name inside a scope directory.
pub const SETTINGS_FILE: &str = "settings.kdl";

/// Settings store persisting each scope to a KDL file under the data directory.
#[derive(Debug)]
pub struct FileSettingsStore {
    data_dir: PathBuf,
    scopes: HashMap<ConfigScope, BTreeMap<String, String>>,
    dirty: HashSet<ConfigScope>,
}

impl FileSettingsStore {
    /// Open the store, loading every persisted scope.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let mut scopes = HashMap::new();

        let global_path = data_dir.join(SETTINGS_FILE);
        if global_path.exists() {
            let (_, values) = read_settings_file(&global_path)?;
            scopes.insert(ConfigScope::Global, values);
        }

        let modules_dir = data_dir.join("modules");
        if modules_dir.is_dir() {
            for entry in fs::read_dir(&modules_dir)? {
                let path = entry?.path().join(SETTINGS_FILE);
                if !path.exists() {
                    continue;
                }
                match read_settings_file(&path)? {
                    (Some(module), values) => {
                        scopes.insert(ConfigScope::Module(module), values);
                    }
                    (None, _) => {
                        tracing::warn!(path = %path.display(), "Settings file has no module node, skipping");
                    }
                }
            }
        }

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            scopes,
            dirty: HashSet::new(),
        })
    }

    /// Path of the settings file for a scope.
    pub fn settings_path(&self, scope: &ConfigScope) -> PathBuf {
        scope_dir(&self.data_dir, scope).join(SETTINGS_FILE)
    }
}

impl SettingsStore for FileSettingsStore {
    fn get(&self, scope: &ConfigScope, key: &str) -> Option<String> {
        self.scopes.get(scope).and_then(|m| m.get(key).cloned())
    }

    fn set(&mut self, scope: &ConfigScope, key: &str, value: &str) {
        self.scopes
            .entry(scope.clone())
            .or_default()
            .insert(key.to_string(), value.to_string());
        self.dirty.insert(scope.clone());
    }

    fn remove(&mut self, scope: &ConfigScope, key: &str) {
        if let Some(map) = self.scopes.get_mut(scope)
            && map.remove(key).is_some()
        {
            self.dirty.insert(scope.clone());
        }
    }

    fn keys(&self, scope: &ConfigScope) -> Vec<String> {
        self.scopes
            .get(scope)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn flush(&mut self, scope: &ConfigScope) -> Result<()> {
        if !self.dirty.contains(scope) {
            return Ok(());
        }

        let path = self.settings_path(scope);
        let values = self.scopes.get(scope).cloned().unwrap_or_default();
        if values.is_empty() {
            if path.exists() {
                fs::remove_file(&path)?;
            }
        } else {
            write_file_synced(&path, &settings_to_kdl(scope, &values).to_string())?;
        }

        self.dirty.remove(scope);
        tracing::debug!(%scope, path = %path.display(), "Flushed settings");
        Ok(())
    }
}

fn settings_to_kdl(scope: &ConfigScope, values: &BTreeMap<String, String>) -> KdlDocument {
    let mut doc = KdlDocument::new();

    if let ConfigScope::Module(name) = scope {
        let mut node = KdlNode::new("module");
        node.push(KdlEntry::new(KdlValue::String(name.clone())));
        doc.nodes_mut().push(node);
    }

    for (key, value) in values {
        let mut node = KdlNode::new("setting");
        node.push(KdlEntry::new(KdlValue::String(key.clone())));
        node.push(KdlEntry::new(KdlValue::String(value.clone())));
        doc.nodes_mut().push(node);
    }

    doc.autoformat();
    doc
}

fn read_settings_file(path: &Path) -> Result<(Option<String>, BTreeMap<String, String>)> {
    let content = fs::read_to_string(path)?;
    let doc: KdlDocument = content.parse()?;

    let mut module = None;
    let mut values = BTreeMap::new();
    for node in doc.nodes() {
        let args: Vec<&str> = node
            .entries()
            .iter()
            .filter(|e| e.name().is_none())
            .filter_map(|e| e.value().as_string())
            .collect();
        match (node.name().value(), args.as_slice()) {
            ("module", [name]) => module = Some(name.to_string()),
            ("setting", [key, value]) => {
                values.insert(key.to_string(), value.to_string());
            }
            (other, _) => {
                return Err(Error::Other(format!(
                    "Invalid '{}' node in {}",
                    other,
                    path.display()
                )));
            }
        }
    }

    Ok((module, values))
}

/// Write a file and sync it to disk, creating parent directories as needed.
///
/// The content is written to a sibling temp file and renamed into place so
/// readers never observe a partially written file.
pub(crate) fn write_file_synced(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}
