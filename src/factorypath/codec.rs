//! Persisted factory path documents.
//!
//! ```kdl
//! factorypath {
//!     entry kind="path" id="/libs/gen.jar" enabled=#true
//!     entry kind="plugin" id="org.example.gen" enabled=#false
//! }
//! ```
//!
//! Decoding is strict: anything other than this shape is an
//! [`Error::MalformedFactoryPath`].

use super::{ContainerKind, FactoryContainer, FactoryPath};
use crate::{Error, Result};
use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};

const ROOT_NODE: &str = "factorypath";
const ENTRY_NODE: &str = "entry";

/// Encode a factory path as a KDL document.
pub fn encode_factory_path(path: &FactoryPath) -> String {
    let mut children = KdlDocument::new();
    for (container, enabled) in path.iter() {
        let mut node = KdlNode::new(ENTRY_NODE);
        node.push(KdlEntry::new_prop(
            "kind",
            KdlValue::String(container.kind.as_str().to_string()),
        ));
        node.push(KdlEntry::new_prop("id", KdlValue::String(container.id.clone())));
        node.push(KdlEntry::new_prop("enabled", KdlValue::Bool(enabled)));
        children.nodes_mut().push(node);
    }

    let mut root = KdlNode::new(ROOT_NODE);
    root.set_children(children);

    let mut doc = KdlDocument::new();
    doc.nodes_mut().push(root);
    doc.autoformat();
    doc.to_string()
}

/// Decode a factory path document.
pub fn decode_factory_path(text: &str) -> Result<FactoryPath> {
    let doc: KdlDocument = text
        .parse()
        .map_err(|e: kdl::KdlError| malformed(format!("not a KDL document: {}", e)))?;

    let root = match doc.nodes() {
        [root] => root,
        [] => return Err(malformed("document is empty")),
        _ => return Err(malformed("expected a single root node")),
    };
    if root.name().value() != ROOT_NODE {
        return Err(malformed(format!(
            "expected root node '{}', found '{}'",
            ROOT_NODE,
            root.name().value()
        )));
    }

    let mut path = FactoryPath::new();
    let Some(children) = root.children() else {
        return Ok(path);
    };

    for node in children.nodes() {
        if node.name().value() != ENTRY_NODE {
            return Err(malformed(format!(
                "unexpected node '{}' in factory path",
                node.name().value()
            )));
        }

        let kind_name = string_attr(node, "kind")?;
        let kind = ContainerKind::parse(kind_name)
            .ok_or_else(|| malformed(format!("unknown container kind '{}'", kind_name)))?;
        let id = string_attr(node, "id")?;
        let enabled = attr(node, "enabled")?
            .as_bool()
            .ok_or_else(|| malformed("attribute 'enabled' must be a boolean"))?;

        let container =
            FactoryContainer::new(kind, id).map_err(|_| malformed("container id must not be empty"))?;
        path.set(container, enabled);
    }

    Ok(path)
}

fn malformed(message: impl Into<String>) -> Error {
    Error::MalformedFactoryPath(message.into())
}

fn attr<'a>(node: &'a KdlNode, name: &str) -> Result<&'a KdlValue> {
    node.entries()
        .iter()
        .find(|e| e.name().map(|n| n.value()) == Some(name))
        .map(|e| e.value())
        .ok_or_else(|| malformed(format!("entry is missing attribute '{}'", name)))
}

fn string_attr<'a>(node: &'a KdlNode, name: &str) -> Result<&'a str> {
    attr(node, name)?
        .as_string()
        .ok_or_else(|| malformed(format!("attribute '{}' must be a string", name)))
}
