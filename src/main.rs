//! aptconf CLI - Annotation processor configuration for modular builds.

use aptconf::cli::{
    Cli, Commands, FactorypathCommands, LegacyCommands, OptionsCommands, SettingsCommands,
};
use aptconf::commands::{self, Output};
use clap::Parser;
use std::env;
use std::path::{Path, PathBuf};
use std::process;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "APTCONF_LOG";

fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;

    setup_tracing(cli.verbose);

    // Determine workspace path: --workspace flag > APTCONF_WORKSPACE env > cwd
    let workspace_path = resolve_workspace_path(cli.workspace_path, human);

    if let Err(e) = run_command(cli.command, &workspace_path, human) {
        tracing::debug!(error = ?e, "Command failed");
        if human {
            eprintln!("Error: {}", e);
        } else {
            eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
        }
        process::exit(1);
    }
}

/// Install a stderr subscriber. `APTCONF_LOG` wins over `--verbose`.
fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("aptconf=debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Resolve the workspace path from the explicit flag or the current directory.
///
/// An explicit path must exist; it is used literally.
fn resolve_workspace_path(explicit_path: Option<PathBuf>, human: bool) -> PathBuf {
    match explicit_path {
        Some(path) => {
            if !path.exists() {
                let message = format!("Specified workspace path does not exist: {}", path.display());
                if human {
                    eprintln!("Error: {}", message);
                } else {
                    eprintln!("{}", serde_json::json!({ "error": message }));
                }
                process::exit(1);
            }
            path
        }
        None => env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn run_command(command: Commands, workspace_path: &Path, human: bool) -> Result<(), aptconf::Error> {
    match command {
        Commands::Options { command } => match command {
            OptionsCommands::Show { module, tests } => {
                let result = commands::options_show(workspace_path, &module, tests)?;
                output(&result, human);
            }
            OptionsCommands::Raw { scope } => {
                let result = commands::options_raw(workspace_path, scope.module.as_deref())?;
                output(&result, human);
            }
            OptionsCommands::Set { key, value, scope } => {
                let result = commands::options_set(
                    workspace_path,
                    &key,
                    value.as_deref(),
                    scope.module.as_deref(),
                )?;
                output(&result, human);
            }
            OptionsCommands::Rm { key, scope } => {
                let result = commands::options_rm(workspace_path, &key, scope.module.as_deref())?;
                output(&result, human);
            }
            OptionsCommands::Clear { scope } => {
                let result = commands::options_clear(workspace_path, scope.module.as_deref())?;
                output(&result, human);
            }
            OptionsCommands::Migrate { scope } => {
                let result = commands::options_migrate(workspace_path, scope.module.as_deref())?;
                output(&result, human);
            }
        },

        Commands::Legacy { command } => match command {
            LegacyCommands::Parse { blob } => {
                output(&commands::legacy_parse(&blob), human);
            }
        },

        Commands::Closure { module, tests } => {
            let result = commands::closure(workspace_path, &module, tests)?;
            output(&result, human);
        }

        Commands::Factorypath { command } => match command {
            FactorypathCommands::List { scope, enabled } => {
                let result =
                    commands::factorypath_list(workspace_path, scope.module.as_deref(), enabled)?;
                output(&result, human);
            }
            FactorypathCommands::Add {
                id,
                plugin,
                disabled,
                scope,
            } => {
                let result = commands::factorypath_add(
                    workspace_path,
                    &id,
                    plugin,
                    !disabled,
                    scope.module.as_deref(),
                )?;
                output(&result, human);
            }
            FactorypathCommands::Rm { id, plugin, scope } => {
                let result =
                    commands::factorypath_rm(workspace_path, &id, plugin, scope.module.as_deref())?;
                output(&result, human);
            }
            FactorypathCommands::Reset { scope } => {
                let result = commands::factorypath_reset(workspace_path, scope.module.as_deref())?;
                output(&result, human);
            }
            FactorypathCommands::Status { scope } => {
                let result = commands::factorypath_status(workspace_path, scope.module.as_deref())?;
                output(&result, human);
            }
        },

        Commands::Match { name, scope } => {
            let result = commands::match_annotation(workspace_path, &name, scope.module.as_deref())?;
            output(&result, human);
        }

        Commands::Settings { command } => match command {
            SettingsCommands::Show { scope } => {
                let result = commands::settings_show(workspace_path, scope.module.as_deref())?;
                output(&result, human);
            }
            SettingsCommands::Set { name, value, scope } => {
                let result = commands::settings_set(
                    workspace_path,
                    &name,
                    value.as_deref(),
                    scope.module.as_deref(),
                )?;
                output(&result, human);
            }
            SettingsCommands::ModuleSpecific { module, off } => {
                let result = commands::settings_module_specific(workspace_path, &module, !off)?;
                output(&result, human);
            }
        },
    }
    Ok(())
}

fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
