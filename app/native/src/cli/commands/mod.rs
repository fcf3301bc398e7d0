//! CLI command definitions using Clap.
//!
//! Commands are grouped into submodules:
//!
//! - `engine` - start the engine and talk to a running one
//! - `layout` - show, save and restore the layout of one workspace
//! - `store` - inspect and reset the fingerprint store

use std::io;
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Generator, Shell, generate};

use crate::error::MuscleError;
use crate::{config, schema};

pub mod engine;
pub mod layout;
pub mod store;

pub use store::StoreCommands;

/// Application version from Cargo.toml.
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Muscle - layout muscle memory for i3 and sway.
///
/// Remembers how you arrange windows on each workspace and puts them back
/// the same way when the same set of windows shows up again.
#[derive(Parser, Debug)]
#[command(name = "muscle")]
#[command(author, version = APP_VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a custom configuration file.
    ///
    /// Overrides the default configuration file search paths.
    /// Supports JSONC format (JSON with comments).
    #[arg(long, short, global = true, value_name = "PATH")]
    pub config: Option<String>,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
#[command(next_display_order = None)]
pub enum Commands {
    /// Start the layout engine (default).
    ///
    /// Connects to i3 or sway, learns layouts as you edit them and restores
    /// them when the same windows come back. Exits with status 1 when the
    /// window manager connection is lost.
    Run {
        /// Store file to use instead of the configured one.
        #[arg(long, value_name = "PATH")]
        store: Option<PathBuf>,
    },

    /// Resume snapshotting and restoring in the running engine.
    Enable,

    /// Pause snapshotting and restoring in the running engine.
    ///
    /// Events are still observed while paused.
    Disable,

    /// Show the state of the running engine.
    Status {
        /// Output as JSON.
        #[arg(long, short)]
        json: bool,
    },

    /// Print the layout of the focused workspace.
    #[command(after_long_help = r#"Examples:
  muscle show                  # Tree of the focused workspace
  muscle show --workspace 3    # Tree of workspace 3
  muscle show --json           # Serialized tree"#)]
    Show {
        /// Output as JSON.
        #[arg(long, short)]
        json: bool,

        /// Workspace name or number instead of the focused one.
        #[arg(long, short, value_name = "NAME")]
        workspace: Option<String>,
    },

    /// Save the layout of a workspace to a file.
    Save {
        /// Layout file to write.
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Workspace name or number instead of the focused one.
        #[arg(long, short, value_name = "NAME")]
        workspace: Option<String>,
    },

    /// Apply a saved layout to a workspace.
    ///
    /// The workspace must hold the same number of windows in the same
    /// nesting as the saved layout.
    Restore {
        /// Layout file to read.
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Workspace name or number instead of the focused one.
        #[arg(long, short, value_name = "NAME")]
        workspace: Option<String>,
    },

    /// Fingerprint store commands.
    #[command(subcommand)]
    Store(StoreCommands),

    /// Output Muscle configuration JSON Schema.
    ///
    /// Outputs a JSON Schema to stdout that describes the structure of the
    /// configuration file. Can be redirected to a file for use with editors
    /// that support JSON Schema validation.
    Schema,

    /// Generate shell completions.
    ///
    /// Usage:
    ///   eval "$(muscle completions --shell zsh)"
    ///   muscle completions --shell bash > ~/.local/share/bash-completion/completions/muscle
    ///   muscle completions --shell fish > ~/.config/fish/completions/muscle.fish
    Completions {
        /// The shell to generate completions for.
        #[arg(long, short, value_enum)]
        shell: Shell,
    },
}

impl Cli {
    /// Returns the custom config path if specified via --config flag.
    #[must_use]
    pub fn config_path(&self) -> Option<PathBuf> { self.config.as_ref().map(PathBuf::from) }

    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command execution fails.
    pub fn execute(&self) -> Result<(), MuscleError> {
        if let Some(path) = self.config_path() {
            if !path.exists() {
                return Err(MuscleError::Config(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            config::set_custom_config_path(path);
        }

        match &self.command {
            None => engine::run(None),
            Some(Commands::Run { store }) => engine::run(store.as_ref()),
            Some(Commands::Enable) => engine::set_enabled(true),
            Some(Commands::Disable) => engine::set_enabled(false),
            Some(Commands::Status { json }) => engine::status(*json),
            Some(Commands::Show { json, workspace }) => layout::show(*json, workspace.as_deref()),
            Some(Commands::Save { file, workspace }) => layout::save(file, workspace.as_deref()),
            Some(Commands::Restore { file, workspace }) => layout::restore(file, workspace.as_deref()),
            Some(Commands::Store(cmd)) => store::execute(cmd),

            Some(Commands::Schema) => {
                println!("{}", schema::print_schema());
                Ok(())
            }

            Some(Commands::Completions { shell }) => {
                Self::print_completions(*shell);
                Ok(())
            }
        }
    }

    /// Print shell completions to stdout.
    fn print_completions<G: Generator>(generator: G) {
        let mut cmd = Self::command();
        generate(generator, &mut cmd, "muscle", &mut io::stdout());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // CLI parsing tests
    // ========================================================================

    #[test]
    fn test_cli_defaults_to_run() {
        let cli = Cli::try_parse_from(["muscle"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_parses_run_with_store() {
        let cli = Cli::try_parse_from(["muscle", "run", "--store", "/tmp/layouts.json"]).unwrap();
        match cli.command {
            Some(Commands::Run { store }) => {
                assert_eq!(store, Some(PathBuf::from("/tmp/layouts.json")));
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_parses_toggles() {
        let cli = Cli::try_parse_from(["muscle", "enable"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Enable)));

        let cli = Cli::try_parse_from(["muscle", "disable"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Disable)));
    }

    #[test]
    fn test_cli_parses_status_json() {
        let cli = Cli::try_parse_from(["muscle", "status", "--json"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Status { json: true })));
    }

    #[test]
    fn test_cli_parses_show_workspace() {
        let cli = Cli::try_parse_from(["muscle", "show", "-w", "3"]).unwrap();
        match cli.command {
            Some(Commands::Show { json, workspace }) => {
                assert!(!json);
                assert_eq!(workspace.as_deref(), Some("3"));
            }
            _ => panic!("Expected Show command"),
        }
    }

    #[test]
    fn test_cli_parses_save_and_restore() {
        let cli = Cli::try_parse_from(["muscle", "save", "coding.json"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Save { ref file, workspace: None }) if file == &PathBuf::from("coding.json")));

        let cli = Cli::try_parse_from(["muscle", "restore", "coding.json", "--workspace", "2"]).unwrap();
        match cli.command {
            Some(Commands::Restore { file, workspace }) => {
                assert_eq!(file, PathBuf::from("coding.json"));
                assert_eq!(workspace.as_deref(), Some("2"));
            }
            _ => panic!("Expected Restore command"),
        }
    }

    #[test]
    fn test_cli_requires_file_for_save() {
        assert!(Cli::try_parse_from(["muscle", "save"]).is_err());
    }

    #[test]
    fn test_cli_parses_store_reset_filters() {
        let cli =
            Cli::try_parse_from(["muscle", "store", "reset", "--output", "DP-1", "--workspace", "1"])
                .unwrap();
        match cli.command {
            Some(Commands::Store(StoreCommands::Reset { output, workspace })) => {
                assert_eq!(output.as_deref(), Some("DP-1"));
                assert_eq!(workspace.as_deref(), Some("1"));
            }
            _ => panic!("Expected Store Reset command"),
        }
    }

    #[test]
    fn test_cli_parses_store_list_and_path() {
        let cli = Cli::try_parse_from(["muscle", "store", "list", "--json"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Store(StoreCommands::List { json: true }))));

        let cli = Cli::try_parse_from(["muscle", "store", "path"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Store(StoreCommands::Path))));
    }

    #[test]
    fn test_cli_parses_schema() {
        let cli = Cli::try_parse_from(["muscle", "schema"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Schema)));
    }

    #[test]
    fn test_cli_parses_completions_zsh() {
        let cli = Cli::try_parse_from(["muscle", "completions", "--shell", "zsh"]).unwrap();
        match cli.command {
            Some(Commands::Completions { shell }) => assert_eq!(shell, Shell::Zsh),
            _ => panic!("Expected Completions command"),
        }
    }

    #[test]
    fn test_app_version_is_not_empty() {
        assert!(!APP_VERSION.is_empty());
    }

    // ========================================================================
    // Global flag tests
    // ========================================================================

    #[test]
    fn test_cli_parses_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["muscle", "status", "--config", "/path/to/config.json"]).unwrap();
        assert_eq!(cli.config_path(), Some(PathBuf::from("/path/to/config.json")));
    }

    #[test]
    fn test_cli_parses_verbose_short_flag() {
        let cli = Cli::try_parse_from(["muscle", "-v", "run"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn test_cli_config_path_returns_none_when_not_specified() {
        let cli = Cli::try_parse_from(["muscle", "schema"]).unwrap();
        assert!(cli.config_path().is_none());
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let cli = Cli::try_parse_from(["muscle", "-c", "/nonexistent/muscle.jsonc", "schema"]).unwrap();
        assert!(matches!(cli.execute(), Err(MuscleError::Config(_))));
    }
}
