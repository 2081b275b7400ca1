//! Effective processor configuration for a module.
//!
//! ## Option Precedence
//!
//! Processor options are resolved as a whole map, never key by key:
//!
//! 1. Module per-option keys (`apt.processorOptions/<key>`)
//! 2. Global per-option keys
//! 3. Module legacy blob (`apt.processorOptions`)
//! 4. Global legacy blob
//!
//! The first source holding anything wins; the rest are ignored entirely.
//!
//! ## Setting Precedence
//!
//! Scalar settings resolve key by key: module > global > built-in default.
//!
//! ## Automatic Options
//!
//! [`ProcessorConfig::processor_options`] adds options derived from the
//! module's closure on top of the configured ones: `-classpath`,
//! `-sourcepath`, `-d`, `-s`, `-source` and `-target`.

use super::pathvars::PathVariableResolver;
use super::{
    OPTION_KEY_PREFIX, OptionMap, Setting, decode_option_value, encode_option_value, option_key,
    parse_legacy_options,
};
use crate::closure::ClosureBuilder;
use crate::settings::{ConfigScope, SettingsStore};
use crate::workspace::{MetadataProvider, PathVariableTable, is_contained};
use crate::{Error, Result};
use std::fmt;
use std::path::Path;

/// Prefix shared by every key this crate writes.
const SETTINGS_PREFIX: &str = "apt.";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from the module scope
    Module(String),
    /// Value from the global scope
    Global,
    /// Parsed from the legacy options blob of a scope
    Legacy(ConfigScope),
    /// Built-in default value
    Default,
}

impl ValueSource {
    fn from_scope(scope: &ConfigScope) -> Self {
        match scope {
            ConfigScope::Module(name) => ValueSource::Module(name.clone()),
            ConfigScope::Global => ValueSource::Global,
        }
    }
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSource::Module(name) => write!(f, "module:{}", name),
            ValueSource::Global => write!(f, "global"),
            ValueSource::Legacy(scope) => write!(f, "legacy:{}", scope),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    /// The resolved value
    pub value: T,
    /// Where the value came from
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    /// Create a new resolved value.
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Check that a generated source directory name is usable.
///
/// The name must be non-empty, relative to the module root and must not
/// climb out of it.
pub fn validate_gen_src_dir(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(
            "Generated source directory must not be empty".to_string(),
        ));
    }
    let path = Path::new(trimmed);
    if path.is_absolute() || trimmed.starts_with(['/', '\\']) {
        return Err(Error::InvalidInput(format!(
            "Generated source directory must be relative to the module: {}",
            name
        )));
    }
    if !is_contained(path) {
        return Err(Error::InvalidInput(format!(
            "Generated source directory must stay inside the module: {}",
            name
        )));
    }
    Ok(())
}

/// Reads and writes processor configuration through a settings store.
///
/// Every mutating call persists the affected scope immediately. Persistence
/// failures are logged and swallowed; the store's in-memory state stays
/// authoritative.
pub struct ProcessorConfig<'a> {
    store: &'a mut dyn SettingsStore,
    metadata: &'a dyn MetadataProvider,
    variables: &'a dyn PathVariableTable,
}

impl<'a> ProcessorConfig<'a> {
    /// Create a configuration view.
    pub fn new(
        store: &'a mut dyn SettingsStore,
        metadata: &'a dyn MetadataProvider,
        variables: &'a dyn PathVariableTable,
    ) -> Self {
        Self {
            store,
            metadata,
            variables,
        }
    }

    // === Processor Options ===

    /// Configured options for a scope, without path variables resolved.
    pub fn raw_options(&self, scope: &ConfigScope) -> Resolved<OptionMap> {
        let chain = scope.chain();
        for candidate in &chain {
            let options = self.scope_options(candidate);
            if !options.is_empty() {
                return Resolved::new(options, ValueSource::from_scope(candidate));
            }
        }
        for candidate in chain {
            if let Some(blob) = self.store.get(&candidate, Setting::LegacyOptions.key()) {
                return Resolved::new(parse_legacy_options(&blob), ValueSource::Legacy(candidate));
            }
        }
        Resolved::new(OptionMap::new(), ValueSource::Default)
    }

    /// Per-option keys stored directly in one scope.
    fn scope_options(&self, scope: &ConfigScope) -> OptionMap {
        self.store
            .keys(scope)
            .into_iter()
            .filter_map(|key| {
                let option = key.strip_prefix(OPTION_KEY_PREFIX)?.to_string();
                let value = self.store.get(scope, &key)?;
                Some((option, decode_option_value(value)))
            })
            .collect()
    }

    /// Effective options for running processors against `module`.
    ///
    /// Configured values have path variables resolved, then the automatic
    /// options are added, replacing configured options of the same name. If
    /// the closure cannot be computed the configured options are returned
    /// alone and the failure is logged.
    pub fn processor_options(&self, module: &str, include_tests: bool) -> Result<OptionMap> {
        if let Err(e @ Error::ModuleNotFound(_)) = self.metadata.module(module) {
            return Err(e);
        }
        let scope = ConfigScope::Module(module.to_string());

        let resolver = PathVariableResolver::new(self.metadata, self.variables);
        let raw = self.raw_options(&scope);
        tracing::debug!(module, source = %raw.source, count = raw.value.len(), "Loaded raw processor options");

        let mut options: OptionMap = raw
            .value
            .into_iter()
            .map(|(key, value)| {
                let value = value.map(|v| resolver.resolve(&v, Some(module)));
                (key, value)
            })
            .collect();

        let gen_dir = if include_tests {
            self.gen_test_src_dir(&scope)
        } else {
            self.gen_src_dir(&scope)
        };

        match ClosureBuilder::new(self.metadata).build(module, include_tests, &gen_dir) {
            Ok(closure) => {
                options.insert("-classpath".to_string(), Some(closure.classpath_string()));
                options.insert("-sourcepath".to_string(), Some(closure.sourcepath_string()));
                options.insert(
                    "-d".to_string(),
                    Some(closure.output_dir.to_string_lossy().into_owned()),
                );
                options.insert(
                    "-s".to_string(),
                    Some(closure.generated_source_dir.to_string_lossy().into_owned()),
                );
                if let Some(level) = closure.source_level {
                    options.insert("-source".to_string(), Some(level));
                }
                if let Some(level) = closure.target_level {
                    options.insert("-target".to_string(), Some(level));
                }
            }
            Err(e) => {
                tracing::warn!(module, error = %e, "Could not compute classpath closure; returning configured options only");
            }
        }

        Ok(options)
    }

    /// Replace every option of a scope.
    ///
    /// Existing per-option keys and the legacy blob of the scope are removed.
    pub fn set_options(&mut self, scope: &ConfigScope, options: &OptionMap) -> Result<()> {
        if options.keys().any(|k| k.is_empty()) {
            return Err(Error::InvalidInput(
                "Processor option key must not be empty".to_string(),
            ));
        }

        for key in self.store.keys(scope) {
            if key.starts_with(OPTION_KEY_PREFIX) {
                self.store.remove(scope, &key);
            }
        }
        self.store.remove(scope, Setting::LegacyOptions.key());

        for (key, value) in options {
            self.store
                .set(scope, &option_key(key), encode_option_value(value.as_deref()));
        }

        self.flush(scope);
        Ok(())
    }

    /// Add or replace one option in the effective options of a scope.
    ///
    /// If the scope currently inherits its options, the inherited map is
    /// copied into the scope first.
    pub fn add_option(&mut self, scope: &ConfigScope, key: &str, value: Option<&str>) -> Result<()> {
        if key.is_empty() {
            return Err(Error::InvalidInput(
                "Processor option key must not be empty".to_string(),
            ));
        }
        let mut options = self.raw_options(scope).value;
        options.insert(key.to_string(), value.map(|v| v.to_string()));
        self.set_options(scope, &options)
    }

    /// Remove one option from the effective options of a scope.
    ///
    /// Returns `false` if the option was not present.
    pub fn remove_option(&mut self, scope: &ConfigScope, key: &str) -> Result<bool> {
        let mut options = self.raw_options(scope).value;
        if options.remove(key).is_none() {
            return Ok(false);
        }
        self.set_options(scope, &options)?;
        Ok(true)
    }

    /// Remove every option stored in a scope, legacy blob included.
    ///
    /// A module scope falls back to the global options afterwards.
    pub fn clear_options(&mut self, scope: &ConfigScope) -> Result<()> {
        self.set_options(scope, &OptionMap::new())
    }

    /// Rewrite the legacy blob of a scope as per-option keys.
    ///
    /// Returns `false` if the scope has no legacy blob. Per-option keys
    /// already present in the scope take precedence over the blob.
    pub fn migrate_legacy_options(&mut self, scope: &ConfigScope) -> Result<bool> {
        let Some(blob) = self.store.get(scope, Setting::LegacyOptions.key()) else {
            return Ok(false);
        };

        let mut options = parse_legacy_options(&blob);
        options.extend(self.scope_options(scope));
        self.set_options(scope, &options)?;
        tracing::debug!(%scope, count = options.len(), "Migrated legacy processor options");
        Ok(true)
    }

    // === Scalar Settings ===

    /// Resolve a scalar setting: module > global > default.
    pub fn setting(&self, scope: &ConfigScope, setting: Setting) -> Resolved<Option<String>> {
        for candidate in scope.chain() {
            if let Some(value) = self.store.get(&candidate, setting.key()) {
                return Resolved::new(Some(value), ValueSource::from_scope(&candidate));
            }
        }
        Resolved::new(
            setting.default_value().map(|v| v.to_string()),
            ValueSource::Default,
        )
    }

    /// Set or clear (`None`) a scalar setting in one scope.
    pub fn set_setting(
        &mut self,
        scope: &ConfigScope,
        setting: Setting,
        value: Option<&str>,
    ) -> Result<()> {
        match value {
            Some(value) => {
                validate_setting(setting, value)?;
                self.store.set(scope, setting.key(), value.trim());
            }
            None => self.store.remove(scope, setting.key()),
        }
        self.flush(scope);
        Ok(())
    }

    fn bool_setting(&self, scope: &ConfigScope, setting: Setting) -> bool {
        self.setting(scope, setting)
            .value
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    fn string_setting(&self, scope: &ConfigScope, setting: Setting) -> String {
        self.setting(scope, setting).value.unwrap_or_default()
    }

    /// Whether annotation processing is enabled.
    pub fn is_enabled(&self, scope: &ConfigScope) -> bool {
        self.bool_setting(scope, Setting::Enabled)
    }

    /// Enable or disable annotation processing.
    pub fn set_enabled(&mut self, scope: &ConfigScope, enabled: bool) -> Result<()> {
        self.set_setting(scope, Setting::Enabled, Some(bool_literal(enabled)))
    }

    /// Whether processors run during reconcile.
    pub fn is_reconcile_enabled(&self, scope: &ConfigScope) -> bool {
        self.bool_setting(scope, Setting::Reconcile)
    }

    /// Enable or disable processing during reconcile.
    pub fn set_reconcile_enabled(&mut self, scope: &ConfigScope, enabled: bool) -> Result<()> {
        self.set_setting(scope, Setting::Reconcile, Some(bool_literal(enabled)))
    }

    /// Generated source directory name.
    pub fn gen_src_dir(&self, scope: &ConfigScope) -> String {
        self.string_setting(scope, Setting::GenSrcDir)
    }

    /// Set the generated source directory name.
    pub fn set_gen_src_dir(&mut self, scope: &ConfigScope, dir: &str) -> Result<()> {
        self.set_setting(scope, Setting::GenSrcDir, Some(dir))
    }

    /// Generated test source directory name.
    pub fn gen_test_src_dir(&self, scope: &ConfigScope) -> String {
        self.string_setting(scope, Setting::GenTestSrcDir)
    }

    /// Set the generated test source directory name.
    pub fn set_gen_test_src_dir(&mut self, scope: &ConfigScope, dir: &str) -> Result<()> {
        self.set_setting(scope, Setting::GenTestSrcDir, Some(dir))
    }

    // === Module-Specific Settings ===

    /// Whether a module stores any settings of its own.
    pub fn has_module_specific_settings(&self, module: &str) -> bool {
        self.store
            .keys(&ConfigScope::Module(module.to_string()))
            .iter()
            .any(|k| k.starts_with(SETTINGS_PREFIX))
    }

    /// Turn module-specific settings on or off.
    ///
    /// Turning them on pins the currently effective values into the module
    /// scope; turning them off removes every setting from it. Only module
    /// scopes have module-specific settings.
    pub fn set_module_specific_settings(&mut self, scope: &ConfigScope, enabled: bool) -> Result<()> {
        let Some(module) = scope.module_name() else {
            return Err(Error::InvalidInput(
                "Module-specific settings cannot be changed at global scope".to_string(),
            ));
        };

        if enabled {
            for setting in Setting::ALL {
                if setting == Setting::LegacyOptions {
                    continue;
                }
                if self.store.get(scope, setting.key()).is_none()
                    && let Some(value) = self.setting(scope, setting).value
                {
                    self.store.set(scope, setting.key(), &value);
                }
            }
            if self.scope_options(scope).is_empty()
                && self.store.get(scope, Setting::LegacyOptions.key()).is_none()
            {
                let inherited = self.raw_options(&ConfigScope::Global).value;
                for (key, value) in &inherited {
                    self.store
                        .set(scope, &option_key(key), encode_option_value(value.as_deref()));
                }
            }
        } else {
            for key in self.store.keys(scope) {
                if key.starts_with(SETTINGS_PREFIX) {
                    self.store.remove(scope, &key);
                }
            }
        }

        tracing::debug!(module, enabled, "Changed module-specific settings");
        self.flush(scope);
        Ok(())
    }

    fn flush(&mut self, scope: &ConfigScope) {
        if let Err(e) = self.store.flush(scope) {
            tracing::warn!(%scope, error = %e, "Failed to persist settings");
        }
    }
}

fn bool_literal(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

fn validate_setting(setting: Setting, value: &str) -> Result<()> {
    match setting {
        Setting::Enabled | Setting::Reconcile => {
            let trimmed = value.trim();
            if trimmed.eq_ignore_ascii_case("true") || trimmed.eq_ignore_ascii_case("false") {
                Ok(())
            } else {
                Err(Error::InvalidInput(format!(
                    "{} must be 'true' or 'false', got '{}'",
                    setting, value
                )))
            }
        }
        Setting::GenSrcDir | Setting::GenTestSrcDir => validate_gen_src_dir(value),
        Setting::LegacyOptions => Ok(()),
    }
}
