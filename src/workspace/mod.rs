//! Workspace collaborators: module metadata and named path variables.
//!
//! The resolvers in this crate never read module metadata directly. They go
//! through two traits:
//! - [`MetadataProvider`] - Module lookup, dependency entries, output dirs, levels
//! - [`PathVariableTable`] - Named path variables (`name -> absolute path`)
//!
//! [`Workspace`] implements both from a `workspace.kdl` manifest; see
//! [`manifest`] for the schema.

pub mod manifest;

use crate::factorypath::{ContainerKind, FactoryContainer, ProcessorSource};
use crate::models::{DependencyEntry, Module};
use crate::{Error, Result};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

pub use manifest::MANIFEST_FILE;

/// Provides module metadata for the workspace.
///
/// Every call reads the current state; implementations must not assume the
/// caller caches anything between calls.
pub trait MetadataProvider {
    /// Absolute workspace root.
    fn workspace_root(&self) -> &Path;

    /// Look up a module by name.
    fn module(&self, name: &str) -> Result<Module>;

    /// Dependency entries of a module in declaration order.
    fn entries(&self, name: &str) -> Result<Vec<DependencyEntry>> {
        Ok(self.module(name)?.entries)
    }

    /// Absolute binary output directory of a module.
    fn output_dir(&self, name: &str) -> Result<PathBuf> {
        Ok(self.module(name)?.output_dir())
    }

    /// Declared source level of a module.
    fn source_level(&self, name: &str) -> Result<Option<String>> {
        Ok(self.module(name)?.source_level)
    }

    /// Declared target level of a module.
    fn target_level(&self, name: &str) -> Result<Option<String>> {
        Ok(self.module(name)?.target_level)
    }

    /// Root directory of a module, or `None` if no such module exists.
    fn module_root(&self, name: &str) -> Option<PathBuf> {
        self.module(name).ok().map(|m| m.root)
    }

    /// Resolve a workspace-relative path (`/<module>/rest`) to an absolute path.
    ///
    /// Returns `None` if the first segment does not name a module.
    fn resolve_workspace_path(&self, path: &str) -> Option<PathBuf> {
        let (first, rest) = split_first_segment(path)?;
        let root = self.module_root(first)?;
        Some(if rest.is_empty() { root } else { root.join(rest) })
    }
}

/// Named path variable table.
pub trait PathVariableTable {
    /// Resolve a variable name to an absolute path.
    fn resolve(&self, name: &str) -> Option<PathBuf>;
}

impl PathVariableTable for HashMap<String, PathBuf> {
    fn resolve(&self, name: &str) -> Option<PathBuf> {
        self.get(name).cloned()
    }
}

/// Split `/first/rest/of/path` into `("first", "rest/of/path")`.
///
/// Leading separators are skipped; returns `None` for an empty path.
pub(crate) fn split_first_segment(path: &str) -> Option<(&str, &str)> {
    let trimmed = path.trim_start_matches(['/', '\\']);
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.find(['/', '\\']) {
        Some(idx) => Some((&trimmed[..idx], trimmed[idx + 1..].trim_start_matches(['/', '\\']))),
        None => Some((trimmed, "")),
    }
}

/// A processor plugin that ships with the installation.
///
/// Built-in plugins form the ultimate default factory path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDeclaration {
    /// Plugin identifier
    pub id: String,
    /// Whether the plugin is enabled when no factory path is persisted
    pub enabled: bool,
    /// Annotation patterns the plugin advertises, in order
    pub supports: Vec<String>,
}

/// Patterns advertised by a path-based processor archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorPathDeclaration {
    /// Archive path as it appears in factory paths
    pub id: String,
    /// Annotation patterns the archive advertises, in order
    pub supports: Vec<String>,
}

/// A workspace loaded from a `workspace.kdl` manifest.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    /// Absolute workspace root
    pub root: PathBuf,
    /// Modules by name, in manifest order
    pub modules: IndexMap<String, Module>,
    /// Named path variables
    pub variables: HashMap<String, PathBuf>,
    /// Built-in processor plugins
    pub plugins: Vec<PluginDeclaration>,
    /// Path-based processor archives with advertised patterns
    pub processor_paths: Vec<ProcessorPathDeclaration>,
}

impl Workspace {
    /// Create an empty workspace rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Load the manifest from `<root>/workspace.kdl`.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(MANIFEST_FILE);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::Other(format!(
                "Failed to read workspace manifest {}: {}",
                path.display(),
                e
            ))
        })?;
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        manifest::parse_manifest(&root, &content)
    }

    /// Add a module, replacing any module with the same name.
    pub fn add_module(&mut self, module: Module) {
        self.modules.insert(module.name.clone(), module);
    }

    /// Define a named path variable.
    pub fn set_variable(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) {
        self.variables.insert(name.into(), path.into());
    }

    /// Patterns a container advertises, in order.
    ///
    /// Containers the manifest does not describe advertise nothing.
    pub fn advertised_patterns(&self, container: &FactoryContainer) -> Vec<String> {
        let supports = match container.kind {
            ContainerKind::Plugin => self
                .plugins
                .iter()
                .find(|p| p.id == container.id)
                .map(|p| &p.supports),
            ContainerKind::Path => self
                .processor_paths
                .iter()
                .find(|p| p.id == container.id)
                .map(|p| &p.supports),
        };
        supports.cloned().unwrap_or_default()
    }

    /// Pair each container with its advertised patterns, keeping order.
    pub fn processor_sources(&self, containers: &[FactoryContainer]) -> Vec<ProcessorSource> {
        containers
            .iter()
            .map(|c| ProcessorSource::new(c.clone(), self.advertised_patterns(c)))
            .collect()
    }
}

impl MetadataProvider for Workspace {
    fn workspace_root(&self) -> &Path {
        &self.root
    }

    fn module(&self, name: &str) -> Result<Module> {
        self.modules
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ModuleNotFound(name.to_string()))
    }

    fn module_root(&self, name: &str) -> Option<PathBuf> {
        self.modules.get(name).map(|m| m.root.clone())
    }
}

impl PathVariableTable for Workspace {
    fn resolve(&self, name: &str) -> Option<PathBuf> {
        self.variables.get(name).cloned()
    }
}

/// Check that a path has no parent (`..`) components.
pub(crate) fn is_contained(path: &Path) -> bool {
    !path.components().any(|c| matches!(c, Component::ParentDir))
}
