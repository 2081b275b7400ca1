//! Path variable substitution for option values.
//!
//! A value starting with a `%NAME%` token has the token replaced by a path:
//!
//! - `%ROOT%/<module>/rest` - root of `<module>` followed by `/rest`
//! - `%MODULE.DIR%/rest` - root of the module being resolved followed by `/rest`
//! - `%OTHER%/rest` - the named path variable `OTHER` followed by `/rest`
//!
//! Anything that cannot be resolved is returned unchanged. Substitution
//! never fails.

use crate::workspace::{MetadataProvider, PathVariableTable};
use regex::Regex;
use std::sync::LazyLock;

/// Built-in token for the workspace root.
pub const ROOT_VARIABLE: &str = "ROOT";

/// Built-in token for the root of the module being resolved.
pub const MODULE_DIR_VARIABLE: &str = "MODULE.DIR";

/// A leading `%token%`: a non-empty run without `%`, space or path separators.
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^%([^%/\\ ]+)%").expect("valid token regex"));

/// Resolves path-variable tokens against workspace metadata.
pub struct PathVariableResolver<'a> {
    metadata: &'a dyn MetadataProvider,
    variables: &'a dyn PathVariableTable,
}

impl<'a> PathVariableResolver<'a> {
    /// Create a resolver over a metadata provider and a variable table.
    pub fn new(metadata: &'a dyn MetadataProvider, variables: &'a dyn PathVariableTable) -> Self {
        Self {
            metadata,
            variables,
        }
    }

    /// Substitute a leading path variable in `value`.
    ///
    /// `current_module` enables the `%MODULE.DIR%` token.
    pub fn resolve(&self, value: &str, current_module: Option<&str>) -> String {
        let Some(captures) = TOKEN_RE.captures(value) else {
            return value.to_string();
        };
        let token = &captures[1];
        let remainder = &value[captures[0].len()..];

        let substituted = match token {
            ROOT_VARIABLE => self.resolve_root(remainder),
            MODULE_DIR_VARIABLE => current_module
                .and_then(|name| self.metadata.module_root(name))
                .map(|root| format!("{}{}", root.display(), remainder)),
            name => self
                .variables
                .resolve(name)
                .map(|path| format!("{}{}", path.display(), remainder)),
        };

        match substituted {
            Some(resolved) => {
                tracing::debug!(value, %resolved, "Resolved path variable");
                resolved
            }
            None => value.to_string(),
        }
    }

    /// `%ROOT%/<module>/rest`: the first segment names a module.
    fn resolve_root(&self, remainder: &str) -> Option<String> {
        let trimmed = remainder.trim_start_matches(['/', '\\']);
        let (module, tail) = match trimmed.find(['/', '\\']) {
            Some(idx) => (&trimmed[..idx], &trimmed[idx..]),
            None => (trimmed, ""),
        };
        if module.is_empty() {
            return None;
        }
        let root = self.metadata.module_root(module)?;
        Some(format!("{}{}", root.display(), tail))
    }
}
