//! Per-scope factory path registry.
//!
//! ## Defaults
//!
//! A module without a persisted factory path uses the global one. The global
//! scope without a persisted factory path uses the built-in plugins declared
//! in the workspace manifest.
//!
//! ## Concurrency
//!
//! Every mutation reads the current list, builds the new one and persists it
//! while holding one registry-wide lock, so concurrent mutators never lose
//! updates. Reads do not take the lock.
//!
//! After a change is persisted, every registered [`FactoryPathListener`]
//! receives [`FactoryPathEvent::Changed`] for the scope.

use super::codec::{decode_factory_path, encode_factory_path};
use super::events::{FactoryPathEvent, FactoryPathListener};
use super::{FactoryContainer, FactoryPath};
use crate::settings::file::write_file_synced;
use crate::settings::{ConfigScope, scope_dir};
use crate::workspace::Workspace;
use crate::{Error, Result};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

/// Factory path file name inside a scope directory.
pub const FACTORY_PATH_FILE: &str = "factorypath.kdl";

/// Persists encoded factory path documents per scope.
pub trait FactoryPathStore: Send + Sync {
    /// Read the document of a scope, or `None` if none is persisted.
    fn read(&self, scope: &ConfigScope) -> Result<Option<String>>;

    /// Replace the document of a scope.
    fn write(&self, scope: &ConfigScope, content: &str) -> Result<()>;

    /// Delete the document of a scope. Deleting a missing document is a no-op.
    fn remove(&self, scope: &ConfigScope) -> Result<()>;

    /// Whether a document is persisted for a scope.
    fn exists(&self, scope: &ConfigScope) -> bool;
}

/// Stores each scope's document as `factorypath.kdl` in its data directory.
#[derive(Debug, Clone)]
pub struct FileFactoryPathStore {
    data_dir: PathBuf,
}

impl FileFactoryPathStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
        }
    }

    /// Path of the document for a scope.
    pub fn path(&self, scope: &ConfigScope) -> PathBuf {
        scope_dir(&self.data_dir, scope).join(FACTORY_PATH_FILE)
    }
}

impl FactoryPathStore for FileFactoryPathStore {
    fn read(&self, scope: &ConfigScope) -> Result<Option<String>> {
        let path = self.path(scope);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn write(&self, scope: &ConfigScope, content: &str) -> Result<()> {
        write_file_synced(&self.path(scope), content)
    }

    fn remove(&self, scope: &ConfigScope) -> Result<()> {
        let path = self.path(scope);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn exists(&self, scope: &ConfigScope) -> bool {
        self.path(scope).exists()
    }
}

/// In-memory document store.
#[derive(Debug, Default)]
pub struct MemoryFactoryPathStore {
    documents: RwLock<HashMap<ConfigScope, String>>,
}

impl MemoryFactoryPathStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FactoryPathStore for MemoryFactoryPathStore {
    fn read(&self, scope: &ConfigScope) -> Result<Option<String>> {
        let documents = self.documents.read().map_err(|_| lock_poisoned())?;
        Ok(documents.get(scope).cloned())
    }

    fn write(&self, scope: &ConfigScope, content: &str) -> Result<()> {
        let mut documents = self.documents.write().map_err(|_| lock_poisoned())?;
        documents.insert(scope.clone(), content.to_string());
        Ok(())
    }

    fn remove(&self, scope: &ConfigScope) -> Result<()> {
        let mut documents = self.documents.write().map_err(|_| lock_poisoned())?;
        documents.remove(scope);
        Ok(())
    }

    fn exists(&self, scope: &ConfigScope) -> bool {
        self.documents
            .read()
            .map(|d| d.contains_key(scope))
            .unwrap_or(false)
    }
}

fn lock_poisoned() -> Error {
    Error::Other("Factory path lock poisoned".to_string())
}

/// Built-in factory path: the manifest's plugins with their default flags.
pub fn builtin_factory_path(workspace: &Workspace) -> FactoryPath {
    workspace
        .plugins
        .iter()
        .map(|p| (FactoryContainer::plugin(p.id.clone()), p.enabled))
        .collect()
}

/// Registry of factory paths for every scope.
pub struct FactoryPathRegistry<S: FactoryPathStore> {
    store: S,
    builtin: FactoryPath,
    write_lock: Mutex<()>,
    listeners: Vec<Arc<dyn FactoryPathListener>>,
}

impl<S: FactoryPathStore> FactoryPathRegistry<S> {
    /// Create a registry over a store with the given built-in factory path.
    pub fn new(store: S, builtin: FactoryPath) -> Self {
        Self {
            store,
            builtin,
            write_lock: Mutex::new(()),
            listeners: Vec::new(),
        }
    }

    /// Register a listener for change events.
    pub fn add_listener(&mut self, listener: Arc<dyn FactoryPathListener>) {
        self.listeners.push(listener);
    }

    // === Reads ===

    /// Persisted factory path of a scope, if any.
    pub fn persisted(&self, scope: &ConfigScope) -> Result<Option<FactoryPath>> {
        self.store
            .read(scope)?
            .map(|text| decode_factory_path(&text))
            .transpose()
    }

    /// Factory path a scope uses when it has none of its own.
    pub fn default_factory_path(&self, scope: &ConfigScope) -> Result<FactoryPath> {
        match scope {
            ConfigScope::Module(_) => self.all_containers(&ConfigScope::Global),
            ConfigScope::Global => Ok(self.builtin.clone()),
        }
    }

    /// Effective factory path of a scope, disabled containers included.
    pub fn all_containers(&self, scope: &ConfigScope) -> Result<FactoryPath> {
        match self.persisted(scope)? {
            Some(path) => Ok(path),
            None => self.default_factory_path(scope),
        }
    }

    /// Enabled containers of a scope, in order.
    pub fn enabled_containers(&self, scope: &ConfigScope) -> Result<Vec<FactoryContainer>> {
        Ok(self.all_containers(scope)?.enabled())
    }

    /// Whether a scope persists a factory path that differs from its default.
    pub fn has_explicit_factory_path(&self, scope: &ConfigScope) -> Result<bool> {
        match self.persisted(scope)? {
            Some(path) => Ok(path != self.default_factory_path(scope)?),
            None => Ok(false),
        }
    }

    /// Whether a scope has a persisted factory path at all, whatever it holds.
    pub fn factory_path_file_exists(&self, scope: &ConfigScope) -> bool {
        self.store.exists(scope)
    }

    // === Mutations ===

    /// Merge containers into the effective factory path of a scope.
    ///
    /// Listed containers keep their position and take the new flag; new
    /// containers are appended in the given order.
    pub fn add_containers(
        &self,
        scope: &ConfigScope,
        containers: &IndexMap<FactoryContainer, bool>,
    ) -> Result<FactoryPath> {
        let _guard = self.write_lock.lock().map_err(|_| lock_poisoned())?;
        let mut path = self.all_containers(scope)?;
        path.merge(containers);
        self.persist(scope, Some(&path));
        Ok(path)
    }

    /// Remove a container from the effective factory path of a scope.
    ///
    /// Returns `false`, and persists nothing, if the container was not listed.
    pub fn remove_container(&self, scope: &ConfigScope, container: &FactoryContainer) -> Result<bool> {
        let _guard = self.write_lock.lock().map_err(|_| lock_poisoned())?;
        let mut path = self.all_containers(scope)?;
        if !path.remove(container) {
            return Ok(false);
        }
        self.persist(scope, Some(&path));
        Ok(true)
    }

    /// Replace the factory path of a scope. `None` reverts to the default.
    pub fn set_factory_path(&self, scope: &ConfigScope, path: Option<&FactoryPath>) -> Result<()> {
        let _guard = self.write_lock.lock().map_err(|_| lock_poisoned())?;
        self.persist(scope, path);
        Ok(())
    }

    /// Write or delete the document, then notify listeners.
    fn persist(&self, scope: &ConfigScope, path: Option<&FactoryPath>) {
        let result = match path {
            Some(path) => self.store.write(scope, &encode_factory_path(path)),
            None => self.store.remove(scope),
        };
        if let Err(e) = result {
            tracing::warn!(%scope, error = %e, "Failed to persist factory path");
            return;
        }

        tracing::debug!(%scope, containers = path.map(|p| p.len()), "Persisted factory path");
        let event = FactoryPathEvent::Changed(scope.clone());
        for listener in &self.listeners {
            listener.on_factory_path_event(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factorypath::LoaderState;
    use crate::test_utils::{TestEnv, module};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use tempfile::TempDir;

    fn builtin() -> FactoryPath {
        FactoryPath::from_iter([
            (FactoryContainer::plugin("builtin.on"), true),
            (FactoryContainer::plugin("builtin.off"), false),
        ])
    }

    fn registry() -> FactoryPathRegistry<MemoryFactoryPathStore> {
        FactoryPathRegistry::new(MemoryFactoryPathStore::new(), builtin())
    }

    fn changes(items: &[(FactoryContainer, bool)]) -> IndexMap<FactoryContainer, bool> {
        items.iter().cloned().collect()
    }

    #[derive(Default)]
    struct CountingListener {
        events: Mutex<Vec<FactoryPathEvent>>,
    }

    impl FactoryPathListener for CountingListener {
        fn on_factory_path_event(&self, event: &FactoryPathEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    struct BrokenStore;

    impl FactoryPathStore for BrokenStore {
        fn read(&self, _scope: &ConfigScope) -> Result<Option<String>> {
            Ok(None)
        }
        fn write(&self, _scope: &ConfigScope, _content: &str) -> Result<()> {
            Err(Error::Other("read-only".to_string()))
        }
        fn remove(&self, _scope: &ConfigScope) -> Result<()> {
            Err(Error::Other("read-only".to_string()))
        }
        fn exists(&self, _scope: &ConfigScope) -> bool {
            false
        }
    }

    #[test]
    fn test_defaults_chain_to_builtin() {
        let registry = registry();
        assert_eq!(registry.all_containers(&ConfigScope::Global).unwrap(), builtin());
        assert_eq!(registry.all_containers(&module("app")).unwrap(), builtin());
        assert_eq!(
            registry.enabled_containers(&module("app")).unwrap(),
            vec![FactoryContainer::plugin("builtin.on")]
        );
    }

    #[test]
    fn test_module_inherits_persisted_global() {
        let registry = registry();
        registry
            .add_containers(
                &ConfigScope::Global,
                &changes(&[(FactoryContainer::path("/libs/gen.jar"), true)]),
            )
            .unwrap();

        let app = registry.all_containers(&module("app")).unwrap();
        assert_eq!(app.len(), 3);
        assert_eq!(app.all()[2], FactoryContainer::path("/libs/gen.jar"));
        assert!(!registry.factory_path_file_exists(&module("app")));
    }

    #[test]
    fn test_add_containers_merges_in_place() {
        let registry = registry();
        let path = registry
            .add_containers(
                &module("app"),
                &changes(&[
                    (FactoryContainer::path("/x.jar"), true),
                    (FactoryContainer::plugin("builtin.off"), true),
                ]),
            )
            .unwrap();

        assert_eq!(
            path.all(),
            vec![
                FactoryContainer::plugin("builtin.on"),
                FactoryContainer::plugin("builtin.off"),
                FactoryContainer::path("/x.jar"),
            ]
        );
        assert_eq!(registry.persisted(&module("app")).unwrap(), Some(path));
        // Global untouched
        assert!(registry.persisted(&ConfigScope::Global).unwrap().is_none());
    }

    #[test]
    fn test_remove_container() {
        let registry = registry();
        assert!(
            registry
                .remove_container(&module("app"), &FactoryContainer::plugin("builtin.on"))
                .unwrap()
        );
        assert!(
            !registry
                .remove_container(&module("app"), &FactoryContainer::plugin("builtin.on"))
                .unwrap()
        );
        assert_eq!(
            registry.all_containers(&module("app")).unwrap().all(),
            vec![FactoryContainer::plugin("builtin.off")]
        );
    }

    #[test]
    fn test_explicit_predicates_differ() {
        let registry = registry();
        let app = module("app");

        // Persisted copy identical to the default
        registry.set_factory_path(&app, Some(&builtin())).unwrap();
        assert!(registry.factory_path_file_exists(&app));
        assert!(!registry.has_explicit_factory_path(&app).unwrap());

        registry
            .add_containers(&app, &changes(&[(FactoryContainer::plugin("extra"), true)]))
            .unwrap();
        assert!(registry.has_explicit_factory_path(&app).unwrap());

        registry.set_factory_path(&app, None).unwrap();
        assert!(!registry.factory_path_file_exists(&app));
        assert!(!registry.has_explicit_factory_path(&app).unwrap());
    }

    #[test]
    fn test_explicit_follows_global_changes() {
        let registry = registry();
        let app = module("app");
        registry.set_factory_path(&app, Some(&builtin())).unwrap();

        registry
            .add_containers(
                &ConfigScope::Global,
                &changes(&[(FactoryContainer::plugin("global.extra"), true)]),
            )
            .unwrap();

        // The module copy now differs from its (changed) default
        assert!(registry.has_explicit_factory_path(&app).unwrap());
    }

    #[test]
    fn test_listeners_receive_changes() {
        let listener = Arc::new(CountingListener::default());
        let mut registry = registry();
        registry.add_listener(listener.clone());

        registry
            .add_containers(&module("app"), &changes(&[(FactoryContainer::plugin("p"), true)]))
            .unwrap();
        registry
            .remove_container(&module("app"), &FactoryContainer::plugin("missing"))
            .unwrap();
        registry.set_factory_path(&ConfigScope::Global, None).unwrap();

        let events = listener.events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                FactoryPathEvent::Changed(module("app")),
                FactoryPathEvent::Changed(ConfigScope::Global),
            ]
        );
    }

    #[test]
    fn test_loader_state_is_reset_on_change() {
        let state = Arc::new(LoaderState::new());
        let mut registry = registry();
        registry.add_listener(state.clone());

        state.record(&module("app"), registry.enabled_containers(&module("app")).unwrap());
        registry
            .add_containers(&module("app"), &changes(&[(FactoryContainer::plugin("p"), true)]))
            .unwrap();

        assert!(state.loaded(&module("app")).is_none());
    }

    #[test]
    fn test_persist_failure_is_swallowed() {
        let listener = Arc::new(CountingListener::default());
        let mut registry = FactoryPathRegistry::new(BrokenStore, builtin());
        registry.add_listener(listener.clone());

        let path = registry
            .add_containers(&module("app"), &changes(&[(FactoryContainer::plugin("p"), true)]))
            .unwrap();
        assert_eq!(path.len(), 3);
        assert!(registry.set_factory_path(&module("app"), None).is_ok());
        assert!(listener.events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_document_propagates() {
        let store = MemoryFactoryPathStore::new();
        store
            .write(&module("app"), r#"factorypath { entry kind="jar" id="x" enabled=#true }"#)
            .unwrap();
        let registry = FactoryPathRegistry::new(store, builtin());

        assert!(matches!(
            registry.all_containers(&module("app")),
            Err(Error::MalformedFactoryPath(_))
        ));
        assert!(registry.factory_path_file_exists(&module("app")));
    }

    #[test]
    fn test_concurrent_mutations_do_not_lose_updates() {
        let registry = Arc::new(registry());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for j in 0..10 {
                        let container = FactoryContainer::path(format!("/libs/{}-{}.jar", i, j));
                        registry
                            .add_containers(&ConfigScope::Global, &changes(&[(container, true)]))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.all_containers(&ConfigScope::Global).unwrap().len(), 2 + 80);
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileFactoryPathStore::new(dir.path());
        let registry = FactoryPathRegistry::new(store.clone(), builtin());

        registry
            .add_containers(&module("app"), &changes(&[(FactoryContainer::path("/g.jar"), false)]))
            .unwrap();

        let file = dir.path().join("modules").join("app").join(FACTORY_PATH_FILE);
        assert_eq!(store.path(&module("app")), file);
        assert!(file.exists());

        let reopened = FactoryPathRegistry::new(FileFactoryPathStore::new(dir.path()), builtin());
        assert_eq!(
            reopened.all_containers(&module("app")).unwrap().is_enabled(&FactoryContainer::path("/g.jar")),
            Some(false)
        );

        reopened.set_factory_path(&module("app"), None).unwrap();
        assert!(!file.exists());
    }

    #[test]
    fn test_builtin_from_manifest() {
        let env = TestEnv::new();
        let path = builtin_factory_path(&env.workspace());
        assert_eq!(
            path.all(),
            vec![
                FactoryContainer::plugin("org.example.builtin"),
                FactoryContainer::plugin("org.example.disabled"),
            ]
        );
        assert_eq!(path.enabled(), vec![FactoryContainer::plugin("org.example.builtin")]);
    }
}
