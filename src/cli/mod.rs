//! CLI argument definitions for aptconf.

use clap::{Args, Parser, Subcommand};

/// aptconf - Annotation processor configuration for modular builds.
///
/// Start with `aptconf options show <module>` to see what a build would pass
/// to annotation processors.
#[derive(Parser, Debug)]
#[command(name = "aptconf")]
#[command(author, version, about = "Resolve annotation processor configuration for workspace modules", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Run as if aptconf was started in <path> instead of the current directory.
    /// The path must contain a workspace.kdl manifest.
    /// Can also be set via APTCONF_WORKSPACE environment variable.
    #[arg(short = 'C', long = "workspace", global = true, env = "APTCONF_WORKSPACE")]
    pub workspace_path: Option<std::path::PathBuf>,

    /// Enable debug logging on stderr (overridden by APTCONF_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Selects the module scope; omitted means global.
#[derive(Args, Debug, Clone, Default)]
pub struct ScopeArgs {
    /// Module to operate on (global scope if omitted)
    #[arg(short, long)]
    pub module: Option<String>,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Processor option commands
    Options {
        #[command(subcommand)]
        command: OptionsCommands,
    },

    /// Legacy option blob tools
    Legacy {
        #[command(subcommand)]
        command: LegacyCommands,
    },

    /// Show the classpath closure of a module
    Closure {
        /// Module name
        module: String,

        /// Include test-scoped entries
        #[arg(long)]
        tests: bool,
    },

    /// Factory path commands
    Factorypath {
        #[command(subcommand)]
        command: FactorypathCommands,
    },

    /// Find the factory container responsible for an annotation
    Match {
        /// Fully qualified annotation name
        name: String,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Scalar setting commands
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
}

/// Processor option subcommands
#[derive(Subcommand, Debug)]
pub enum OptionsCommands {
    /// Show the effective options passed to processors for a module
    Show {
        /// Module name
        module: String,

        /// Resolve for test compilation
        #[arg(long)]
        tests: bool,
    },

    /// Show configured options without path variables or automatic options
    Raw {
        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Add or replace an option
    Set {
        /// Option key (without -A)
        key: String,

        /// Option value; omit for a flag option
        value: Option<String>,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Remove an option
    Rm {
        /// Option key
        key: String,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Remove every option of a scope
    Clear {
        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Convert a legacy option blob into per-option keys
    Migrate {
        #[command(flatten)]
        scope: ScopeArgs,
    },
}

/// Legacy blob subcommands
#[derive(Subcommand, Debug)]
pub enum LegacyCommands {
    /// Parse a legacy option blob (e.g. '-Afoo=bar -Abaz')
    Parse {
        /// The blob to parse
        #[arg(allow_hyphen_values = true)]
        blob: String,
    },
}

/// Factory path subcommands
#[derive(Subcommand, Debug)]
pub enum FactorypathCommands {
    /// List the effective factory path
    List {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Only show enabled containers
        #[arg(long)]
        enabled: bool,
    },

    /// Add a container or change its enabled flag
    Add {
        /// Archive path, or plugin id with --plugin
        id: String,

        /// The id names a plugin
        #[arg(long)]
        plugin: bool,

        /// Add the container disabled
        #[arg(long)]
        disabled: bool,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Remove a container
    Rm {
        /// Archive path, or plugin id with --plugin
        id: String,

        /// The id names a plugin
        #[arg(long)]
        plugin: bool,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Delete the persisted factory path so the default applies again
    Reset {
        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Show whether a scope has its own factory path
    Status {
        #[command(flatten)]
        scope: ScopeArgs,
    },
}

/// Scalar setting subcommands
#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Show every setting with its source
    Show {
        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Set a setting; omit the value to clear it
    Set {
        /// Setting name (enabled, reconcile, gen-src-dir, gen-test-src-dir, legacy-options)
        name: String,

        /// New value
        #[arg(allow_hyphen_values = true)]
        value: Option<String>,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Turn module-specific settings on or off
    ModuleSpecific {
        /// Module name
        module: String,

        /// Stop using module-specific settings and inherit global ones
        #[arg(long)]
        off: bool,
    },
}
