//! Classpath and sourcepath closure of a module.
//!
//! The closure is everything a processor run for a module can see:
//!
//! - **classpath** - the module's libraries, then for every referenced module
//!   (transitively) its output directory followed by its own libraries
//! - **sourcepath** - the module's own source folders; referenced modules
//!   never contribute sources
//!
//! Both lists keep the order of first discovery and contain no duplicates.
//! A visited set of module names, seeded with the target, is threaded through
//! the walk so cyclic references terminate and every module is expanded at
//! most once, whatever the shape of the graph.

use crate::models::{DependencyEntry, EntryKind, Module};
use crate::workspace::MetadataProvider;
use crate::{Error, Result};
use indexmap::IndexSet;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Separator between entries of a path list.
pub const PATH_LIST_SEPARATOR: char = if cfg!(windows) { ';' } else { ':' };

/// Resolved build inputs of a module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Closure {
    /// Classpath entries in discovery order
    pub classpath: Vec<String>,
    /// Source folders of the module
    pub sourcepath: Vec<String>,
    /// Binary output directory of the module
    pub output_dir: PathBuf,
    /// Generated source directory of the module
    pub generated_source_dir: PathBuf,
    /// Declared source level
    pub source_level: Option<String>,
    /// Declared target level
    pub target_level: Option<String>,
}

impl Closure {
    /// Classpath joined with the platform path-list separator.
    pub fn classpath_string(&self) -> String {
        join_path_list(&self.classpath)
    }

    /// Sourcepath joined with the platform path-list separator.
    pub fn sourcepath_string(&self) -> String {
        join_path_list(&self.sourcepath)
    }
}

fn join_path_list(entries: &[String]) -> String {
    entries.join(&PATH_LIST_SEPARATOR.to_string())
}

/// State shared by every step of one closure walk.
struct Walk {
    classpath: IndexSet<String>,
    sourcepath: IndexSet<String>,
    visited: HashSet<String>,
    include_tests: bool,
}

impl Walk {
    fn skips(&self, entry: &DependencyEntry) -> bool {
        entry.test && !self.include_tests
    }
}

/// Computes module closures from current metadata. Nothing is cached.
pub struct ClosureBuilder<'a> {
    metadata: &'a dyn MetadataProvider,
}

impl<'a> ClosureBuilder<'a> {
    /// Create a builder over a metadata provider.
    pub fn new(metadata: &'a dyn MetadataProvider) -> Self {
        Self { metadata }
    }

    /// Compute the closure of `module`.
    ///
    /// Test-scoped entries are only followed when `include_tests` is set.
    /// `gen_src_dir` is the generated source folder name, relative to the
    /// module root. Any metadata failure aborts the walk.
    pub fn build(&self, module: &str, include_tests: bool, gen_src_dir: &str) -> Result<Closure> {
        let target = self.metadata.module(module)?;
        let mut walk = Walk {
            classpath: IndexSet::new(),
            sourcepath: IndexSet::new(),
            visited: HashSet::from([target.name.clone()]),
            include_tests,
        };

        for entry in &target.entries {
            if walk.skips(entry) {
                continue;
            }
            match entry.kind {
                EntryKind::Library => {
                    walk.classpath.insert(self.library_path(&entry.path));
                }
                EntryKind::Source => match self.source_dir(&target, &entry.path) {
                    Some(dir) => {
                        walk.sourcepath.insert(dir);
                    }
                    None => {
                        tracing::debug!(module, source = %entry.path, "Skipping unresolvable source folder");
                    }
                },
                EntryKind::ModuleReference => self.add_module(&entry.path, &mut walk)?,
            }
        }

        Ok(Closure {
            classpath: walk.classpath.into_iter().collect(),
            sourcepath: walk.sourcepath.into_iter().collect(),
            output_dir: self.metadata.output_dir(module)?,
            generated_source_dir: target.root.join(gen_src_dir),
            source_level: self.metadata.source_level(module)?,
            target_level: self.metadata.target_level(module)?,
        })
    }

    /// Add a referenced module: its output directory, its libraries and,
    /// recursively, the modules it references.
    fn add_module(&self, name: &str, walk: &mut Walk) -> Result<()> {
        if !walk.visited.insert(name.to_string()) {
            return Ok(());
        }

        let output_dir = match self.metadata.output_dir(name) {
            Ok(dir) => dir,
            Err(Error::ModuleNotFound(_)) => {
                tracing::debug!(module = name, "Skipping reference to unknown module");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        walk.classpath.insert(path_string(&output_dir));

        for entry in self.metadata.entries(name)? {
            if walk.skips(&entry) {
                continue;
            }
            match entry.kind {
                EntryKind::Library => {
                    walk.classpath.insert(self.library_path(&entry.path));
                }
                EntryKind::ModuleReference => self.add_module(&entry.path, walk)?,
                EntryKind::Source => {}
            }
        }
        Ok(())
    }

    /// Library paths that name an existing workspace resource resolve through
    /// the provider; anything else is taken as absolute.
    fn library_path(&self, path: &str) -> String {
        match self.workspace_resource(path) {
            Some(resolved) => path_string(&resolved),
            None => path.to_string(),
        }
    }

    fn workspace_resource(&self, path: &str) -> Option<PathBuf> {
        self.metadata
            .resolve_workspace_path(path)
            .filter(|resolved| resolved.exists())
    }

    /// Absolute source folder, or `None` if it does not exist.
    fn source_dir(&self, module: &Module, path: &str) -> Option<String> {
        let candidate = if Path::new(path).is_absolute() {
            self.workspace_resource(path)
                .unwrap_or_else(|| PathBuf::from(path))
        } else {
            module.root.join(path)
        };
        candidate.is_dir().then(|| path_string(&candidate))
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
