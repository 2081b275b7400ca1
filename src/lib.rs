//! aptconf - annotation processor configuration for modular builds.
//!
//! This library resolves everything a build driver needs before running
//! annotation processors against a module: the effective processor options,
//! the classpath/sourcepath closure of the module, and the ordered set of
//! factory containers (processor sources) that are enabled for it.

pub mod cli;
pub mod closure;
pub mod commands;
pub mod config;
pub mod factorypath;
pub mod models;
pub mod settings;
pub mod workspace;

/// Test utilities shared by unit tests.
#[cfg(test)]
pub(crate) mod test_utils {
    use crate::settings::ConfigScope;
    use crate::workspace::Workspace;
    use std::path::Path;
    use tempfile::TempDir;

    /// A small workspace used across unit tests:
    ///
    /// - `app` depends on `core` and `util`, has test sources and a test library
    /// - `core` depends on `util`
    /// - `util` depends back on `app` (cycle)
    pub const SAMPLE_MANIFEST: &str = r#"
variable "LIBS" "/opt/libs"

plugin "org.example.builtin" enabled=#true {
    supports "*"
}
plugin "org.example.disabled" enabled=#false {
    supports "org.example.*"
}

module "app" output="bin" source="17" target="17" {
    library "/opt/libs/guava.jar"
    library "/opt/libs/junit.jar" test=#true
    source "src/main/java"
    source "src/test/java" test=#true
    source "missing"
    module-ref "core"
    module-ref "util"
}

module "core" output="target/classes" source="11" target="11" {
    library "/core/lib/inner.jar"
    source "src"
    module-ref "util"
}

module "util" output="out" {
    library "/opt/libs/guava.jar"
    module-ref "app"
}
"#;

    /// Test environment with a temporary workspace root and data directory.
    pub struct TestEnv {
        /// Workspace root holding `workspace.kdl` and module directories
        pub workspace_dir: TempDir,
        /// Isolated data directory for persisted settings
        pub data_dir: TempDir,
    }

    impl TestEnv {
        /// Create an environment with the sample manifest and its source folders.
        pub fn new() -> Self {
            Self::with_manifest(SAMPLE_MANIFEST)
        }

        /// Create an environment with a custom manifest.
        pub fn with_manifest(manifest: &str) -> Self {
            let workspace_dir = TempDir::new().unwrap();
            std::fs::write(workspace_dir.path().join("workspace.kdl"), manifest).unwrap();
            for dir in ["app/src/main/java", "app/src/test/java", "core/src"] {
                std::fs::create_dir_all(workspace_dir.path().join(dir)).unwrap();
            }
            std::fs::create_dir_all(workspace_dir.path().join("core/lib")).unwrap();
            std::fs::write(workspace_dir.path().join("core/lib/inner.jar"), b"").unwrap();
            Self {
                workspace_dir,
                data_dir: TempDir::new().unwrap(),
            }
        }

        /// Get the workspace root.
        pub fn root(&self) -> &Path {
            self.workspace_dir.path()
        }

        /// Get the data directory.
        pub fn data_path(&self) -> &Path {
            self.data_dir.path()
        }

        /// Load the workspace manifest.
        pub fn workspace(&self) -> Workspace {
            Workspace::load(self.root()).unwrap()
        }
    }

    impl Default for TestEnv {
        fn default() -> Self {
            Self::new()
        }
    }

    /// Shorthand for a module scope.
    pub fn module(name: &str) -> ConfigScope {
        ConfigScope::Module(name.to_string())
    }
}

/// Library-level error type for aptconf operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("KDL error: {0}")]
    Kdl(#[from] kdl::KdlError),

    #[error("Malformed factory path: {0}")]
    MalformedFactoryPath(String),

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Module metadata unavailable: {0}")]
    Metadata(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for aptconf operations.
pub type Result<T> = std::result::Result<T, Error>;
