//! Data models for the build graph.
//!
//! This module defines the structures handed out by a metadata provider:
//! - `Module` - A compiled unit with its own dependency list and outputs
//! - `DependencyEntry` - One declared dependency of a module
//!
//! Modules are owned by the provider and fetched fresh on every resolution.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Kind of a dependency entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// A binary archive or class folder
    Library,
    /// A source folder of the declaring module
    Source,
    /// Another module of the workspace
    ModuleReference,
}

impl EntryKind {
    /// Get the string representation used in manifests.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Library => "library",
            EntryKind::Source => "source",
            EntryKind::ModuleReference => "module-ref",
        }
    }

    /// Parse from a manifest node name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "library" => Some(EntryKind::Library),
            "source" => Some(EntryKind::Source),
            "module-ref" => Some(EntryKind::ModuleReference),
            _ => None,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A declared dependency of a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEntry {
    /// Entry kind
    pub kind: EntryKind,

    /// Path for libraries and sources, module name for module references
    pub path: String,

    /// Whether the entry is only visible to test code
    #[serde(default)]
    pub test: bool,
}

impl DependencyEntry {
    /// Create a library entry.
    pub fn library(path: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::Library,
            path: path.into(),
            test: false,
        }
    }

    /// Create a source folder entry.
    pub fn source(path: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::Source,
            path: path.into(),
            test: false,
        }
    }

    /// Create a reference to another module.
    pub fn module_ref(name: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::ModuleReference,
            path: name.into(),
            test: false,
        }
    }

    /// Mark the entry as test-scoped.
    pub fn test_scoped(mut self) -> Self {
        self.test = true;
        self
    }
}

/// A module of the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Unique module name
    pub name: String,

    /// Absolute module root directory
    pub root: PathBuf,

    /// Binary output location, relative to `root` unless absolute
    pub output: PathBuf,

    /// Declared source language level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_level: Option<String>,

    /// Declared target language level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_level: Option<String>,

    /// Dependency entries in declaration order
    #[serde(default)]
    pub entries: Vec<DependencyEntry>,
}

impl Module {
    /// Create a module with the default `bin` output location and no entries.
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            output: PathBuf::from("bin"),
            source_level: None,
            target_level: None,
            entries: Vec::new(),
        }
    }

    /// Absolute binary output directory.
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.output)
    }
}
