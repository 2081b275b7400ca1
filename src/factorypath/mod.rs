//! Factory paths: ordered, enableable lists of processor containers.
//!
//! A factory path tells the build driver where annotation processors come
//! from and in which order they are consulted. Each scope (module or global)
//! may persist its own list; see [`registry`] for defaults and persistence,
//! [`codec`] for the document format and [`matcher`] for dispatching an
//! annotation name to a container.

pub mod codec;
pub mod events;
pub mod matcher;
pub mod registry;

use crate::config::PathVariableResolver;
use crate::{Error, Result};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

pub use codec::{decode_factory_path, encode_factory_path};
pub use events::{FactoryPathEvent, FactoryPathListener, LoaderState};
pub use matcher::{ProcessorSource, find_responsible};
pub use registry::{FactoryPathRegistry, FactoryPathStore, FileFactoryPathStore, MemoryFactoryPathStore};

/// Kind of a factory container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    /// A processor archive on disk, identified by its path
    Path,
    /// A processor plugin shipped with the installation, identified by its id
    Plugin,
}

impl ContainerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerKind::Path => "path",
            ContainerKind::Plugin => "plugin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "path" => Some(ContainerKind::Path),
            "plugin" => Some(ContainerKind::Plugin),
            _ => None,
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A source of annotation processors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FactoryContainer {
    pub kind: ContainerKind,
    pub id: String,
}

impl FactoryContainer {
    /// Create a container, rejecting an empty id.
    pub fn new(kind: ContainerKind, id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Factory container id must not be empty".to_string(),
            ));
        }
        Ok(Self { kind, id })
    }

    /// A processor archive container.
    pub fn path(id: impl Into<String>) -> Self {
        Self {
            kind: ContainerKind::Path,
            id: id.into(),
        }
    }

    /// A plugin container.
    pub fn plugin(id: impl Into<String>) -> Self {
        Self {
            kind: ContainerKind::Plugin,
            id: id.into(),
        }
    }

    /// Location of the processor archive on disk.
    ///
    /// Path variables in the id are substituted. Plugins have no archive
    /// location and return `None`.
    pub fn resolve_path(&self, resolver: &PathVariableResolver<'_>) -> Option<PathBuf> {
        match self.kind {
            ContainerKind::Path => Some(PathBuf::from(resolver.resolve(&self.id, None))),
            ContainerKind::Plugin => None,
        }
    }
}

impl fmt::Display for FactoryContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// One row of a factory path, as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FactoryPathEntry {
    pub kind: ContainerKind,
    pub id: String,
    pub enabled: bool,
}

/// An ordered list of containers, each enabled or disabled.
///
/// A container appears at most once. Updating the flag of a container keeps
/// its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactoryPath {
    entries: IndexMap<FactoryContainer, bool>,
}

impl FactoryPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Enabled flag of a container, or `None` if it is not listed.
    pub fn is_enabled(&self, container: &FactoryContainer) -> Option<bool> {
        self.entries.get(container).copied()
    }

    /// Set the flag of a container, appending it if it is not listed.
    pub fn set(&mut self, container: FactoryContainer, enabled: bool) {
        self.entries.insert(container, enabled);
    }

    /// Merge containers into the list.
    ///
    /// Listed containers get their flag updated in place; new containers are
    /// appended in the given order.
    pub fn merge(&mut self, containers: &IndexMap<FactoryContainer, bool>) {
        for (container, enabled) in containers {
            self.set(container.clone(), *enabled);
        }
    }

    /// Remove a container, keeping the order of the rest.
    ///
    /// Returns `false` if the container was not listed.
    pub fn remove(&mut self, container: &FactoryContainer) -> bool {
        self.entries.shift_remove(container).is_some()
    }

    /// Every container in order, with its flag.
    pub fn iter(&self) -> impl Iterator<Item = (&FactoryContainer, bool)> {
        self.entries.iter().map(|(c, e)| (c, *e))
    }

    /// Every container in order.
    pub fn all(&self) -> Vec<FactoryContainer> {
        self.entries.keys().cloned().collect()
    }

    /// Enabled containers in order.
    pub fn enabled(&self) -> Vec<FactoryContainer> {
        self.iter()
            .filter(|(_, enabled)| *enabled)
            .map(|(c, _)| c.clone())
            .collect()
    }

    /// Rows for reporting.
    pub fn to_entries(&self) -> Vec<FactoryPathEntry> {
        self.iter()
            .map(|(c, enabled)| FactoryPathEntry {
                kind: c.kind,
                id: c.id.clone(),
                enabled,
            })
            .collect()
    }
}

impl FromIterator<(FactoryContainer, bool)> for FactoryPath {
    fn from_iter<I: IntoIterator<Item = (FactoryContainer, bool)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
