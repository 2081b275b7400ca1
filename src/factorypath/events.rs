//! Change notifications for factory paths.
//!
//! Anything that caches processors loaded from a factory path registers a
//! [`FactoryPathListener`] with the registry and drops its cache when a
//! [`FactoryPathEvent`] arrives.

use super::FactoryContainer;
use crate::settings::ConfigScope;
use std::collections::HashMap;
use std::sync::Mutex;

/// A factory path change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactoryPathEvent {
    /// The persisted factory path of a scope changed. A global change affects
    /// every module that inherits the global list.
    Changed(ConfigScope),
}

/// Receives factory path change notifications.
pub trait FactoryPathListener: Send + Sync {
    fn on_factory_path_event(&self, event: &FactoryPathEvent);
}

/// Cache of containers loaded per scope.
///
/// Dropped for a module when that module's factory path changes, and
/// dropped entirely when the global factory path changes.
#[derive(Debug, Default)]
pub struct LoaderState {
    loaded: Mutex<HashMap<ConfigScope, Vec<FactoryContainer>>>,
}

impl LoaderState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record containers loaded for a scope.
    pub fn record(&self, scope: &ConfigScope, containers: Vec<FactoryContainer>) {
        if let Ok(mut loaded) = self.loaded.lock() {
            loaded.insert(scope.clone(), containers);
        }
    }

    /// Containers loaded for a scope, if still cached.
    pub fn loaded(&self, scope: &ConfigScope) -> Option<Vec<FactoryContainer>> {
        self.loaded.lock().ok()?.get(scope).cloned()
    }

    /// Number of cached scopes.
    pub fn cached_scopes(&self) -> usize {
        self.loaded.lock().map(|l| l.len()).unwrap_or(0)
    }

    /// Drop every cached scope.
    pub fn reset(&self) {
        if let Ok(mut loaded) = self.loaded.lock() {
            loaded.clear();
        }
    }
}

impl FactoryPathListener for LoaderState {
    fn on_factory_path_event(&self, event: &FactoryPathEvent) {
        match event {
            FactoryPathEvent::Changed(ConfigScope::Global) => {
                tracing::debug!("Global factory path changed, dropping all loaded processors");
                self.reset();
            }
            FactoryPathEvent::Changed(scope) => {
                tracing::debug!(%scope, "Factory path changed, dropping loaded processors");
                if let Ok(mut loaded) = self.loaded.lock() {
                    loaded.remove(scope);
                }
            }
        }
    }
}
