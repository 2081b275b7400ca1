//! KDL parser for workspace manifests.
//!
//! Manifest structure:
//! ```kdl
//! variable "LIBS" "/opt/libs"
//!
//! plugin "org.example.gen" enabled=#true {
//!     supports "com.example.*"
//! }
//!
//! processor-path "/opt/libs/gen.jar" {
//!     supports "javax.persistence.Entity"
//! }
//!
//! module "core" output="bin" source="17" target="17" {
//!     library "/opt/libs/guava.jar"
//!     source "src/main/java"
//!     source "src/test/java" test=#true
//!     module-ref "util"
//! }
//! ```
//!
//! A module's root defaults to `<workspace root>/<name>` and may be set with
//! `root="..."` (relative paths are taken from the workspace root).

use super::{PluginDeclaration, ProcessorPathDeclaration, Workspace};
use crate::models::{DependencyEntry, EntryKind, Module};
use crate::{Error, Result};
use kdl::{KdlDocument, KdlNode};
use std::path::{Path, PathBuf};

/// Manifest file name inside the workspace root.
pub const MANIFEST_FILE: &str = "workspace.kdl";

/// Parse a manifest document for the workspace rooted at `root`.
pub fn parse_manifest(root: &Path, kdl_str: &str) -> Result<Workspace> {
    let doc: KdlDocument = kdl_str.parse()?;
    let mut workspace = Workspace::new(root);

    for node in doc.nodes() {
        match node.name().value() {
            "variable" => {
                let args = positional_strings(node);
                let [name, path] = args.as_slice() else {
                    return Err(Error::InvalidInput(
                        "variable node takes a name and a path".to_string(),
                    ));
                };
                workspace.set_variable(name.clone(), PathBuf::from(path));
            }
            "plugin" => {
                let id = get_name_arg(node, "plugin")?;
                let enabled = get_bool_attr(node, "enabled")?.unwrap_or(true);
                workspace.plugins.push(PluginDeclaration {
                    id,
                    enabled,
                    supports: parse_supports(node),
                });
            }
            "processor-path" => {
                let id = get_name_arg(node, "processor-path")?;
                workspace.processor_paths.push(ProcessorPathDeclaration {
                    id,
                    supports: parse_supports(node),
                });
            }
            "module" => {
                let module = parse_module_node(root, node)?;
                if workspace.modules.contains_key(&module.name) {
                    return Err(Error::InvalidInput(format!(
                        "Duplicate module '{}' in manifest",
                        module.name
                    )));
                }
                workspace.add_module(module);
            }
            other => {
                tracing::debug!(node = other, "Ignoring unknown manifest node");
            }
        }
    }

    Ok(workspace)
}

fn parse_module_node(workspace_root: &Path, node: &KdlNode) -> Result<Module> {
    let name = get_name_arg(node, "module")?;
    let root = match get_optional_string_attr(node, "root") {
        Some(root) => workspace_root.join(root),
        None => workspace_root.join(&name),
    };

    let mut module = Module::new(name, root);
    if let Some(output) = get_optional_string_attr(node, "output") {
        module.output = PathBuf::from(output);
    }
    module.source_level = get_optional_string_attr(node, "source");
    module.target_level = get_optional_string_attr(node, "target");

    if let Some(children) = node.children() {
        for child in children.nodes() {
            let child_name = child.name().value();
            let Some(kind) = EntryKind::parse(child_name) else {
                return Err(Error::InvalidInput(format!(
                    "Unknown dependency entry '{}' in module '{}'",
                    child_name, module.name
                )));
            };
            let path = get_name_arg(child, child_name)?;
            module.entries.push(DependencyEntry {
                kind,
                path,
                test: get_bool_attr(child, "test")?.unwrap_or(false),
            });
        }
    }

    Ok(module)
}

fn parse_supports(node: &KdlNode) -> Vec<String> {
    let mut patterns = Vec::new();
    if let Some(children) = node.children() {
        for child in children.nodes() {
            if child.name().value() == "supports" {
                patterns.extend(positional_strings(child));
            }
        }
    }
    patterns
}

fn positional_strings(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

/// Get the first positional string argument of a node.
fn get_name_arg(node: &KdlNode, what: &str) -> Result<String> {
    positional_strings(node)
        .into_iter()
        .next()
        .ok_or_else(|| Error::InvalidInput(format!("{} node must have a string argument", what)))
}

fn get_optional_string_attr(node: &KdlNode, attr_name: &str) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().map(|n| n.value()) == Some(attr_name))
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_bool_attr(node: &KdlNode, attr_name: &str) -> Result<Option<bool>> {
    match node
        .entries()
        .iter()
        .find(|e| e.name().map(|n| n.value()) == Some(attr_name))
    {
        Some(entry) => entry.value().as_bool().map(Some).ok_or_else(|| {
            Error::InvalidInput(format!(
                "Attribute '{}' on '{}' must be a boolean",
                attr_name,
                node.name().value()
            ))
        }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::SAMPLE_MANIFEST;

    #[test]
    fn test_parse_sample_manifest() {
        let ws = parse_manifest(Path::new("/w"), SAMPLE_MANIFEST).unwrap();

        assert_eq!(ws.modules.len(), 3);
        let names: Vec<&str> = ws.modules.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["app", "core", "util"]);

        let app = &ws.modules["app"];
        assert_eq!(app.root, PathBuf::from("/w/app"));
        assert_eq!(app.output, PathBuf::from("bin"));
        assert_eq!(app.source_level.as_deref(), Some("17"));
        assert_eq!(app.entries.len(), 7);
        assert_eq!(app.entries[1], DependencyEntry::library("/opt/libs/junit.jar").test_scoped());
        assert_eq!(app.entries[5], DependencyEntry::module_ref("core"));

        let util = &ws.modules["util"];
        assert_eq!(util.output, PathBuf::from("out"));
        assert!(util.source_level.is_none());

        assert_eq!(ws.variables.get("LIBS"), Some(&PathBuf::from("/opt/libs")));
        assert_eq!(ws.plugins.len(), 2);
        assert!(ws.plugins[0].enabled);
        assert!(!ws.plugins[1].enabled);
        assert_eq!(ws.plugins[1].supports, vec!["org.example.*".to_string()]);
    }

    #[test]
    fn test_parse_custom_root() {
        let ws = parse_manifest(
            Path::new("/w"),
            r#"module "lib" root="nested/lib" output="/abs/out""#,
        )
        .unwrap();
        let lib = &ws.modules["lib"];
        assert_eq!(lib.root, PathBuf::from("/w/nested/lib"));
        assert_eq!(lib.output_dir(), PathBuf::from("/abs/out"));
    }

    #[test]
    fn test_parse_processor_path() {
        let ws = parse_manifest(
            Path::new("/w"),
            r#"processor-path "/opt/gen.jar" {
                supports "a.B" "c.*"
            }"#,
        )
        .unwrap();
        assert_eq!(ws.processor_paths[0].id, "/opt/gen.jar");
        assert_eq!(ws.processor_paths[0].supports, vec!["a.B", "c.*"]);
    }

    #[test]
    fn test_parse_rejects_unknown_entry() {
        let result = parse_manifest(
            Path::new("/w"),
            r#"module "m" {
                container "JRE"
            }"#,
        );
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_parse_rejects_duplicate_module() {
        let result = parse_manifest(Path::new("/w"), "module \"m\"\nmodule \"m\"\n");
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_parse_rejects_non_bool_test_flag() {
        let result = parse_manifest(
            Path::new("/w"),
            r#"module "m" {
                library "/a.jar" test="yes"
            }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_invalid_kdl() {
        assert!(matches!(
            parse_manifest(Path::new("/w"), "module \"unterminated"),
            Err(Error::Kdl(_))
        ));
    }
}
