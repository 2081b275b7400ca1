//! Command implementations for the aptconf CLI.
//!
//! Each command loads the workspace manifest and its persisted data, performs
//! one operation and returns a result that renders as JSON or as text:
//! - `options` - Processor options (effective, raw, edits, migration)
//! - `legacy` - Legacy option blob parsing
//! - `closure` - Classpath closure of a module
//! - `factorypath` - Factory path listing and edits
//! - `match` - Annotation dispatch
//! - `settings` - Scalar settings

use crate::closure::{Closure, ClosureBuilder};
use crate::config::{
    OptionMap, PathVariableResolver, ProcessorConfig, Setting, parse_legacy_options,
};
use crate::factorypath::registry::builtin_factory_path;
use crate::factorypath::{
    ContainerKind, FactoryContainer, FactoryPathRegistry, FileFactoryPathStore, find_responsible,
};
use crate::settings::{ConfigScope, FileSettingsStore, get_data_dir};
use crate::workspace::{MetadataProvider, Workspace};
use crate::{Error, Result};
use indexmap::IndexMap;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!(r#"{{"error": "{}"}}"#, e))
}

/// Render an option map as `key=value` / `key` lines.
fn format_options(options: &OptionMap) -> String {
    if options.is_empty() {
        return "(no options)".to_string();
    }
    options
        .iter()
        .map(|(key, value)| match value {
            Some(value) => format!("  {}={}", key, value),
            None => format!("  {}", key),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Loaded workspace plus its data directory.
struct Context {
    workspace: Workspace,
    data_dir: PathBuf,
}

impl Context {
    fn open(workspace_path: &Path) -> Result<Self> {
        let workspace = Workspace::load(workspace_path)?;
        let data_dir = get_data_dir(&workspace.root)?;
        tracing::debug!(root = %workspace.root.display(), data_dir = %data_dir.display(), "Opened workspace");
        Ok(Self {
            workspace,
            data_dir,
        })
    }

    /// Scope for an optional module name, checking that the module exists.
    fn scope(&self, module: Option<&str>) -> Result<ConfigScope> {
        if let Some(name) = module {
            self.workspace.module(name)?;
        }
        Ok(ConfigScope::from_module(module))
    }

    fn settings(&self) -> Result<FileSettingsStore> {
        FileSettingsStore::open(&self.data_dir)
    }

    fn registry(&self) -> FactoryPathRegistry<FileFactoryPathStore> {
        FactoryPathRegistry::new(
            FileFactoryPathStore::new(&self.data_dir),
            builtin_factory_path(&self.workspace),
        )
    }
}

fn container(id: &str, plugin: bool) -> Result<FactoryContainer> {
    let kind = if plugin {
        ContainerKind::Plugin
    } else {
        ContainerKind::Path
    };
    FactoryContainer::new(kind, id)
}

// === Options ===

/// Effective processor options for a module.
#[derive(Serialize)]
pub struct OptionsShow {
    pub module: String,
    pub tests: bool,
    pub options: OptionMap,
}

impl Output for OptionsShow {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let what = if self.tests { "test " } else { "" };
        format!(
            "Processor options for {}{}:\n{}",
            what,
            self.module,
            format_options(&self.options)
        )
    }
}

/// Show the effective processor options of a module.
pub fn options_show(workspace_path: &Path, module: &str, tests: bool) -> Result<OptionsShow> {
    let ctx = Context::open(workspace_path)?;
    let mut store = ctx.settings()?;
    let config = ProcessorConfig::new(&mut store, &ctx.workspace, &ctx.workspace);
    let options = config.processor_options(module, tests)?;
    Ok(OptionsShow {
        module: module.to_string(),
        tests,
        options,
    })
}

/// Configured options of a scope.
#[derive(Serialize)]
pub struct OptionsRaw {
    pub scope: String,
    pub source: String,
    pub options: OptionMap,
}

impl Output for OptionsRaw {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Options for {} (from {}):\n{}",
            self.scope,
            self.source,
            format_options(&self.options)
        )
    }
}

/// Show the configured options of a scope.
pub fn options_raw(workspace_path: &Path, module: Option<&str>) -> Result<OptionsRaw> {
    let ctx = Context::open(workspace_path)?;
    let scope = ctx.scope(module)?;
    let mut store = ctx.settings()?;
    let config = ProcessorConfig::new(&mut store, &ctx.workspace, &ctx.workspace);
    let raw = config.raw_options(&scope);
    Ok(OptionsRaw {
        scope: scope.to_string(),
        source: raw.source.to_string(),
        options: raw.value,
    })
}

/// Result of changing options.
#[derive(Serialize)]
pub struct OptionsChanged {
    pub scope: String,
    pub action: String,
    pub changed: bool,
    pub options: OptionMap,
}

impl Output for OptionsChanged {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.changed {
            format!(
                "{} options for {}:\n{}",
                self.action,
                self.scope,
                format_options(&self.options)
            )
        } else {
            format!("Nothing to do for {} ({})", self.scope, self.action.to_lowercase())
        }
    }
}

/// Add or replace one option.
pub fn options_set(
    workspace_path: &Path,
    key: &str,
    value: Option<&str>,
    module: Option<&str>,
) -> Result<OptionsChanged> {
    let ctx = Context::open(workspace_path)?;
    let scope = ctx.scope(module)?;
    let mut store = ctx.settings()?;
    let mut config = ProcessorConfig::new(&mut store, &ctx.workspace, &ctx.workspace);
    config.add_option(&scope, key, value)?;
    Ok(OptionsChanged {
        options: config.raw_options(&scope).value,
        scope: scope.to_string(),
        action: "Updated".to_string(),
        changed: true,
    })
}

/// Remove one option.
pub fn options_rm(workspace_path: &Path, key: &str, module: Option<&str>) -> Result<OptionsChanged> {
    let ctx = Context::open(workspace_path)?;
    let scope = ctx.scope(module)?;
    let mut store = ctx.settings()?;
    let mut config = ProcessorConfig::new(&mut store, &ctx.workspace, &ctx.workspace);
    let changed = config.remove_option(&scope, key)?;
    Ok(OptionsChanged {
        options: config.raw_options(&scope).value,
        scope: scope.to_string(),
        action: "Removed".to_string(),
        changed,
    })
}

/// Remove every option of a scope.
pub fn options_clear(workspace_path: &Path, module: Option<&str>) -> Result<OptionsChanged> {
    let ctx = Context::open(workspace_path)?;
    let scope = ctx.scope(module)?;
    let mut store = ctx.settings()?;
    let mut config = ProcessorConfig::new(&mut store, &ctx.workspace, &ctx.workspace);
    config.clear_options(&scope)?;
    Ok(OptionsChanged {
        options: config.raw_options(&scope).value,
        scope: scope.to_string(),
        action: "Cleared".to_string(),
        changed: true,
    })
}

/// Convert the legacy blob of a scope.
pub fn options_migrate(workspace_path: &Path, module: Option<&str>) -> Result<OptionsChanged> {
    let ctx = Context::open(workspace_path)?;
    let scope = ctx.scope(module)?;
    let mut store = ctx.settings()?;
    let mut config = ProcessorConfig::new(&mut store, &ctx.workspace, &ctx.workspace);
    let changed = config.migrate_legacy_options(&scope)?;
    Ok(OptionsChanged {
        options: config.raw_options(&scope).value,
        scope: scope.to_string(),
        action: "Migrated".to_string(),
        changed,
    })
}

// === Legacy ===

/// Options parsed from a legacy blob.
#[derive(Serialize)]
pub struct LegacyParsed {
    pub options: OptionMap,
}

impl Output for LegacyParsed {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format_options(&self.options)
    }
}

/// Parse a legacy blob. Needs no workspace.
pub fn legacy_parse(blob: &str) -> LegacyParsed {
    LegacyParsed {
        options: parse_legacy_options(blob),
    }
}

// === Closure ===

/// Classpath closure of a module.
#[derive(Serialize)]
pub struct ClosureResult {
    pub module: String,
    pub tests: bool,
    #[serde(flatten)]
    pub closure: Closure,
}

impl Output for ClosureResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!("Closure of {}:", self.module)];
        lines.push("  classpath:".to_string());
        lines.extend(self.closure.classpath.iter().map(|p| format!("    {}", p)));
        lines.push("  sourcepath:".to_string());
        lines.extend(self.closure.sourcepath.iter().map(|p| format!("    {}", p)));
        lines.push(format!("  output: {}", self.closure.output_dir.display()));
        lines.push(format!(
            "  generated sources: {}",
            self.closure.generated_source_dir.display()
        ));
        if let Some(level) = &self.closure.source_level {
            lines.push(format!("  source level: {}", level));
        }
        if let Some(level) = &self.closure.target_level {
            lines.push(format!("  target level: {}", level));
        }
        lines.join("\n")
    }
}

/// Compute the classpath closure of a module.
pub fn closure(workspace_path: &Path, module: &str, tests: bool) -> Result<ClosureResult> {
    let ctx = Context::open(workspace_path)?;
    let mut store = ctx.settings()?;
    let scope = ConfigScope::Module(module.to_string());
    let config = ProcessorConfig::new(&mut store, &ctx.workspace, &ctx.workspace);
    let gen_dir = if tests {
        config.gen_test_src_dir(&scope)
    } else {
        config.gen_src_dir(&scope)
    };
    let closure = ClosureBuilder::new(&ctx.workspace).build(module, tests, &gen_dir)?;
    Ok(ClosureResult {
        module: module.to_string(),
        tests,
        closure,
    })
}

// === Factory Path ===

/// One factory path row with its resolved archive location.
#[derive(Serialize)]
pub struct FactoryPathRow {
    pub kind: ContainerKind,
    pub id: String,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// A factory path listing.
#[derive(Serialize)]
pub struct FactoryPathList {
    pub scope: String,
    pub explicit: bool,
    pub count: usize,
    pub entries: Vec<FactoryPathRow>,
}

impl Output for FactoryPathList {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let origin = if self.explicit { "own" } else { "inherited" };
        let mut lines = vec![format!(
            "Factory path for {} ({}, {} container(s)):",
            self.scope, origin, self.count
        )];
        for row in &self.entries {
            let mark = if row.enabled { "x" } else { " " };
            let location = row
                .location
                .as_deref()
                .filter(|l| *l != row.id)
                .map(|l| format!(" -> {}", l))
                .unwrap_or_default();
            lines.push(format!("  [{}] {} {}{}", mark, row.kind, row.id, location));
        }
        lines.join("\n")
    }
}

fn list_rows(ctx: &Context, scope: &ConfigScope, enabled_only: bool) -> Result<FactoryPathList> {
    let registry = ctx.registry();
    let resolver = PathVariableResolver::new(&ctx.workspace, &ctx.workspace);
    let path = registry.all_containers(scope)?;
    let entries: Vec<FactoryPathRow> = path
        .iter()
        .filter(|(_, enabled)| *enabled || !enabled_only)
        .map(|(c, enabled)| FactoryPathRow {
            kind: c.kind,
            id: c.id.clone(),
            enabled,
            location: c
                .resolve_path(&resolver)
                .map(|p| p.to_string_lossy().into_owned()),
        })
        .collect();
    Ok(FactoryPathList {
        scope: scope.to_string(),
        explicit: registry.has_explicit_factory_path(scope)?,
        count: entries.len(),
        entries,
    })
}

/// List the effective factory path of a scope.
pub fn factorypath_list(
    workspace_path: &Path,
    module: Option<&str>,
    enabled_only: bool,
) -> Result<FactoryPathList> {
    let ctx = Context::open(workspace_path)?;
    let scope = ctx.scope(module)?;
    list_rows(&ctx, &scope, enabled_only)
}

/// Add a container or change its flag.
pub fn factorypath_add(
    workspace_path: &Path,
    id: &str,
    plugin: bool,
    enabled: bool,
    module: Option<&str>,
) -> Result<FactoryPathList> {
    let ctx = Context::open(workspace_path)?;
    let scope = ctx.scope(module)?;
    let mut containers = IndexMap::new();
    containers.insert(container(id, plugin)?, enabled);
    ctx.registry().add_containers(&scope, &containers)?;
    list_rows(&ctx, &scope, false)
}

/// Remove a container.
pub fn factorypath_rm(
    workspace_path: &Path,
    id: &str,
    plugin: bool,
    module: Option<&str>,
) -> Result<FactoryPathList> {
    let ctx = Context::open(workspace_path)?;
    let scope = ctx.scope(module)?;
    let target = container(id, plugin)?;
    if !ctx.registry().remove_container(&scope, &target)? {
        return Err(Error::InvalidInput(format!(
            "{} is not on the factory path of {}",
            target, scope
        )));
    }
    list_rows(&ctx, &scope, false)
}

/// Revert a scope to its default factory path.
pub fn factorypath_reset(workspace_path: &Path, module: Option<&str>) -> Result<FactoryPathList> {
    let ctx = Context::open(workspace_path)?;
    let scope = ctx.scope(module)?;
    ctx.registry().set_factory_path(&scope, None)?;
    list_rows(&ctx, &scope, false)
}

/// Whether a scope has its own factory path.
#[derive(Serialize)]
pub struct FactoryPathStatus {
    pub scope: String,
    pub file_exists: bool,
    pub explicit: bool,
    pub enabled: usize,
    pub total: usize,
}

impl Output for FactoryPathStatus {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let state = match (self.file_exists, self.explicit) {
            (true, true) => "own factory path",
            (true, false) => "own factory path (same as default)",
            (false, _) => "default factory path",
        };
        format!(
            "{}: {}, {} of {} container(s) enabled",
            self.scope, state, self.enabled, self.total
        )
    }
}

/// Report the factory path status of a scope.
pub fn factorypath_status(workspace_path: &Path, module: Option<&str>) -> Result<FactoryPathStatus> {
    let ctx = Context::open(workspace_path)?;
    let scope = ctx.scope(module)?;
    let registry = ctx.registry();
    let path = registry.all_containers(&scope)?;
    Ok(FactoryPathStatus {
        scope: scope.to_string(),
        file_exists: registry.factory_path_file_exists(&scope),
        explicit: registry.has_explicit_factory_path(&scope)?,
        enabled: path.enabled().len(),
        total: path.len(),
    })
}

// === Match ===

/// The container responsible for an annotation.
#[derive(Serialize)]
pub struct MatchResult {
    pub name: String,
    pub scope: String,
    pub container: Option<FactoryContainer>,
    pub pattern: Option<String>,
}

impl Output for MatchResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        match (&self.container, &self.pattern) {
            (Some(container), Some(pattern)) => format!(
                "{} is handled by {} (pattern '{}')",
                self.name, container, pattern
            ),
            _ => format!("No enabled container in {} handles {}", self.scope, self.name),
        }
    }
}

/// Find the enabled container responsible for an annotation.
pub fn match_annotation(workspace_path: &Path, name: &str, module: Option<&str>) -> Result<MatchResult> {
    let ctx = Context::open(workspace_path)?;
    let scope = ctx.scope(module)?;
    let enabled = ctx.registry().enabled_containers(&scope)?;
    let sources = ctx.workspace.processor_sources(&enabled);
    let found = find_responsible(&sources, name);
    Ok(MatchResult {
        name: name.to_string(),
        scope: scope.to_string(),
        container: found.map(|s| s.container.clone()),
        pattern: found
            .and_then(|s| s.matching_pattern(name))
            .map(|p| p.to_string()),
    })
}

// === Settings ===

/// A setting with its resolved value.
#[derive(Serialize)]
pub struct SettingRow {
    pub key: String,
    pub value: Option<String>,
    pub source: String,
}

/// Every setting of a scope.
#[derive(Serialize)]
pub struct SettingsShow {
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_specific: Option<bool>,
    pub settings: Vec<SettingRow>,
}

impl Output for SettingsShow {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!("Settings for {}:", self.scope)];
        if let Some(specific) = self.module_specific {
            lines.push(format!("  module-specific: {}", specific));
        }
        for row in &self.settings {
            lines.push(format!(
                "  {} = {} ({})",
                row.key,
                row.value.as_deref().unwrap_or("(unset)"),
                row.source
            ));
        }
        lines.join("\n")
    }
}

/// Show every setting of a scope.
pub fn settings_show(workspace_path: &Path, module: Option<&str>) -> Result<SettingsShow> {
    let ctx = Context::open(workspace_path)?;
    let scope = ctx.scope(module)?;
    let mut store = ctx.settings()?;
    let config = ProcessorConfig::new(&mut store, &ctx.workspace, &ctx.workspace);
    let settings = Setting::ALL
        .iter()
        .map(|setting| {
            let resolved = config.setting(&scope, *setting);
            SettingRow {
                key: setting.key().to_string(),
                value: resolved.value,
                source: resolved.source.to_string(),
            }
        })
        .collect();
    Ok(SettingsShow {
        module_specific: module.map(|m| config.has_module_specific_settings(m)),
        scope: scope.to_string(),
        settings,
    })
}

/// A setting change.
#[derive(Serialize)]
pub struct SettingUpdated {
    pub scope: String,
    pub key: String,
    pub value: Option<String>,
}

impl Output for SettingUpdated {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        match &self.value {
            Some(value) => format!("Set {} = {} for {}", self.key, value, self.scope),
            None => format!("Cleared {} for {}", self.key, self.scope),
        }
    }
}

/// Set or clear one setting.
pub fn settings_set(
    workspace_path: &Path,
    name: &str,
    value: Option<&str>,
    module: Option<&str>,
) -> Result<SettingUpdated> {
    let setting = Setting::parse(name)
        .ok_or_else(|| Error::InvalidInput(format!("Unknown setting: {}", name)))?;
    let ctx = Context::open(workspace_path)?;
    let scope = ctx.scope(module)?;
    let mut store = ctx.settings()?;
    let mut config = ProcessorConfig::new(&mut store, &ctx.workspace, &ctx.workspace);
    let value = match value {
        Some(v) if setting.is_boolean() => Some(v.trim().to_lowercase()),
        other => other.map(|v| v.to_string()),
    };
    config.set_setting(&scope, setting, value.as_deref())?;
    Ok(SettingUpdated {
        scope: scope.to_string(),
        key: setting.key().to_string(),
        value: config.setting(&scope, setting).value,
    })
}

/// Module-specific settings toggled.
#[derive(Serialize)]
pub struct ModuleSpecificChanged {
    pub module: String,
    pub module_specific: bool,
}

impl Output for ModuleSpecificChanged {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.module_specific {
            format!("{} now uses module-specific settings", self.module)
        } else {
            format!("{} now inherits global settings", self.module)
        }
    }
}

/// Turn module-specific settings on or off.
pub fn settings_module_specific(
    workspace_path: &Path,
    module: &str,
    enabled: bool,
) -> Result<ModuleSpecificChanged> {
    let ctx = Context::open(workspace_path)?;
    let scope = ctx.scope(Some(module))?;
    let mut store = ctx.settings()?;
    let mut config = ProcessorConfig::new(&mut store, &ctx.workspace, &ctx.workspace);
    config.set_module_specific_settings(&scope, enabled)?;
    Ok(ModuleSpecificChanged {
        module: module.to_string(),
        module_specific: config.has_module_specific_settings(module),
    })
}
