//! Common test utilities for aptconf integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't pollute
//! the user's `~/.local/share/aptconf/` directory.

#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
pub use tempfile::TempDir;

/// Manifest used by most integration tests.
///
/// - `app` depends on `core`, has test sources and a test-only library
/// - `core` depends on `util`
/// - `util` depends back on `core` (cycle)
pub const MANIFEST: &str = r#"
variable "LIBS" "/opt/libs"

plugin "org.example.builtin" enabled=#true {
    supports "*"
}
plugin "org.example.persistence" enabled=#false {
    supports "javax.persistence.*"
}

processor-path "%LIBS%/gen.jar" {
    supports "com.example.Generated"
}

module "app" output="bin" source="17" target="17" {
    library "/opt/libs/guava.jar"
    library "/opt/libs/junit.jar" test=#true
    source "src/main/java"
    source "src/test/java" test=#true
    module-ref "core"
}

module "core" output="target/classes" {
    library "/opt/libs/guava.jar"
    source "src"
    module-ref "util"
}

module "util" output="out" {
    library "/opt/libs/util-dep.jar"
    module-ref "core"
}
"#;

/// A test environment with an isolated workspace and data storage.
///
/// Each `TestEnv` creates two temporary directories:
/// - `workspace_dir`: Holds `workspace.kdl` and the module folders
/// - `data_dir`: Holds aptconf's data (via `APTCONF_DATA_DIR` env var)
///
/// The `aptconf()` method returns a `Command` that sets `APTCONF_DATA_DIR`
/// per-invocation, making tests parallel-safe.
pub struct TestEnv {
    pub workspace_dir: TempDir,
    pub data_dir: TempDir,
}

impl TestEnv {
    /// Create an environment with the default manifest.
    pub fn new() -> Self {
        Self::with_manifest(MANIFEST)
    }

    /// Create an environment with a custom manifest.
    pub fn with_manifest(manifest: &str) -> Self {
        let env = Self {
            workspace_dir: TempDir::new().unwrap(),
            data_dir: TempDir::new().unwrap(),
        };
        fs::write(env.workspace_path().join("workspace.kdl"), manifest).unwrap();
        for dir in ["app/src/main/java", "app/src/test/java", "core/src"] {
            fs::create_dir_all(env.workspace_path().join(dir)).unwrap();
        }
        env
    }

    /// Get a Command for the aptconf binary with isolated data directory.
    pub fn aptconf(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_aptconf"));
        cmd.current_dir(self.workspace_dir.path());
        cmd.env("APTCONF_DATA_DIR", self.data_dir.path());
        cmd.env_remove("APTCONF_WORKSPACE");
        cmd.env_remove("APTCONF_LOG");
        cmd
    }

    /// Run a command and parse its JSON output.
    pub fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.aptconf().args(args).output().unwrap();
        assert!(
            output.status.success(),
            "aptconf {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }

    /// Get the workspace root.
    pub fn workspace_path(&self) -> &Path {
        self.workspace_dir.path()
    }

    /// Canonical workspace root, as aptconf reports paths.
    pub fn canonical_root(&self) -> PathBuf {
        self.workspace_dir.path().canonicalize().unwrap()
    }

    /// Get the data directory base.
    pub fn data_path(&self) -> &Path {
        self.data_dir.path()
    }

    /// Data directory of this workspace (same hash logic as aptconf).
    pub fn workspace_data_path(&self) -> PathBuf {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_root().to_string_lossy().as_bytes());
        let hash_hex = format!("{:x}", hasher.finalize());
        self.data_path().join(&hash_hex[..12])
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
