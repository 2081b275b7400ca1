//! Dispatch an annotation name to the container responsible for it.
//!
//! Each source advertises an ordered list of patterns:
//!
//! - `*` matches every name
//! - `com.example.*` matches names starting with the pattern minus its last
//!   two characters (`com.example`)
//! - anything else must equal the name exactly
//!
//! Sources are consulted in factory path order, and the first source with any
//! matching pattern wins, however specific a later source's pattern is.

use super::FactoryContainer;
use serde::Serialize;

const WILDCARD: &str = "*";

/// A container together with the annotation patterns it advertises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessorSource {
    pub container: FactoryContainer,
    pub patterns: Vec<String>,
}

impl ProcessorSource {
    pub fn new(container: FactoryContainer, patterns: Vec<String>) -> Self {
        Self {
            container,
            patterns,
        }
    }

    /// First advertised pattern matching `name`.
    pub fn matching_pattern(&self, name: &str) -> Option<&str> {
        self.patterns
            .iter()
            .map(String::as_str)
            .find(|pattern| pattern_matches(pattern, name))
    }
}

/// Whether a single pattern matches an annotation name.
pub fn pattern_matches(pattern: &str, name: &str) -> bool {
    if pattern == name || pattern == WILDCARD {
        return true;
    }
    if !pattern.ends_with(WILDCARD) {
        return false;
    }
    // Drops the wildcard and the character before it
    match pattern.char_indices().rev().nth(1) {
        Some((idx, _)) => name.starts_with(&pattern[..idx]),
        None => false,
    }
}

/// First source responsible for `name`, in list order.
pub fn find_responsible<'a>(sources: &'a [ProcessorSource], name: &str) -> Option<&'a ProcessorSource> {
    let found = sources.iter().find(|s| s.matching_pattern(name).is_some());
    match found {
        Some(source) => tracing::debug!(name, container = %source.container, "Found responsible processor source"),
        None => tracing::debug!(name, "No processor source claims annotation"),
    }
    found
}
