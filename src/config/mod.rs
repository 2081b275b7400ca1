//! Processor configuration for modules.
//!
//! Settings are stored as plain strings in a [`crate::settings::SettingsStore`]
//! under the following keys:
//!
//! - `apt.enabled` - Whether annotation processing runs at all (default `false`)
//! - `apt.reconcile` - Whether processors run while editing (default `true`)
//! - `apt.genSrcDir` - Generated source folder (default `.apt_generated`)
//! - `apt.genTestSrcDir` - Generated test source folder (default `.apt_generated_tests`)
//! - `apt.processorOptions` - Legacy free-text option blob (default unset)
//! - `apt.processorOptions/<key>` - One processor option per key
//!
//! ## Precedence
//!
//! For scalar settings: module > global > built-in default, key by key.
//! For processor options: the first scope holding *any* option wins entirely;
//! scopes are never merged key by key.
//!
//! Use the [`resolver`] module for resolution and the [`legacy`] module for
//! the legacy blob format.

pub mod legacy;
pub mod pathvars;
pub mod resolver;

use std::collections::BTreeMap;
use std::fmt;

pub use legacy::{parse_legacy_options, serialize_legacy_options};
pub use pathvars::{MODULE_DIR_VARIABLE, PathVariableResolver, ROOT_VARIABLE};
pub use resolver::{ProcessorConfig, Resolved, ValueSource};

/// Processor options. `None` is a flag option without a value.
pub type OptionMap = BTreeMap<String, Option<String>>;

/// Prefix of per-option keys in the settings store.
pub const OPTION_KEY_PREFIX: &str = "apt.processorOptions/";

/// Reserved value standing in for a null option value in the store.
pub const NULL_VALUE: &str = "aptconf.NULLVALUE";

/// A scalar setting with a documented default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Setting {
    /// Annotation processing toggle
    Enabled,
    /// Run processors during reconcile (as-you-type) builds
    Reconcile,
    /// Generated source directory name
    GenSrcDir,
    /// Generated test source directory name
    GenTestSrcDir,
    /// Consolidated legacy options blob
    LegacyOptions,
}

impl Setting {
    /// Every setting, in display order.
    pub const ALL: [Setting; 5] = [
        Setting::Enabled,
        Setting::Reconcile,
        Setting::GenSrcDir,
        Setting::GenTestSrcDir,
        Setting::LegacyOptions,
    ];

    /// Store key.
    pub fn key(&self) -> &'static str {
        match self {
            Setting::Enabled => "apt.enabled",
            Setting::Reconcile => "apt.reconcile",
            Setting::GenSrcDir => "apt.genSrcDir",
            Setting::GenTestSrcDir => "apt.genTestSrcDir",
            Setting::LegacyOptions => "apt.processorOptions",
        }
    }

    /// Built-in default value.
    pub fn default_value(&self) -> Option<&'static str> {
        match self {
            Setting::Enabled => Some("false"),
            Setting::Reconcile => Some("true"),
            Setting::GenSrcDir => Some(".apt_generated"),
            Setting::GenTestSrcDir => Some(".apt_generated_tests"),
            Setting::LegacyOptions => None,
        }
    }

    /// Parse from a store key or a short CLI name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "apt.enabled" | "enabled" => Some(Setting::Enabled),
            "apt.reconcile" | "reconcile" => Some(Setting::Reconcile),
            "apt.genSrcDir" | "gen-src-dir" => Some(Setting::GenSrcDir),
            "apt.genTestSrcDir" | "gen-test-src-dir" => Some(Setting::GenTestSrcDir),
            "apt.processorOptions" | "legacy-options" => Some(Setting::LegacyOptions),
            _ => None,
        }
    }

    /// Whether the value is a boolean literal.
    pub fn is_boolean(&self) -> bool {
        matches!(self, Setting::Enabled | Setting::Reconcile)
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Store key for a processor option.
pub fn option_key(key: &str) -> String {
    format!("{}{}", OPTION_KEY_PREFIX, key)
}

/// Encode an option value for the store.
pub fn encode_option_value(value: Option<&str>) -> &str {
    value.unwrap_or(NULL_VALUE)
}

/// Decode an option value read from the store.
pub fn decode_option_value(raw: String) -> Option<String> {
    if raw == NULL_VALUE { None } else { Some(raw) }
}
