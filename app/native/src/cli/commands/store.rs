//! Fingerprint store CLI commands.

use std::path::Path;

use clap::Subcommand;
use colored::Colorize;
use tabled::settings::object::Columns;
use tabled::settings::{Alignment, Modify, Style};
use tabled::{Table, Tabled};

use crate::cli::output::print_highlighted_json;
use crate::config::resolve_store_path;
use crate::control;
use crate::daemon;
use crate::error::MuscleError;
use crate::store::{FingerprintStore, StoreKey, StoredLayout, now_millis};

/// Store subcommands.
#[derive(Subcommand, Debug)]
#[command(next_display_order = None)]
pub enum StoreCommands {
    /// List remembered layouts, most recently seen first.
    List {
        /// Output as JSON.
        #[arg(long, short)]
        json: bool,
    },

    /// Forget remembered layouts.
    ///
    /// Without filters every layout is forgotten. Stop the engine first,
    /// otherwise it keeps the layouts it has in memory.
    #[command(after_long_help = r#"Examples:
  muscle store reset                          # Forget everything
  muscle store reset --output DP-1            # Forget layouts on DP-1
  muscle store reset --output DP-1 -w 3       # Forget workspace 3 on DP-1"#)]
    Reset {
        /// Only forget layouts on this output.
        #[arg(long, short, value_name = "NAME")]
        output: Option<String>,

        /// Only forget layouts of this workspace.
        #[arg(long, short, value_name = "NAME")]
        workspace: Option<String>,
    },

    /// Print the path of the store file.
    Path,
}

/// Execute a store subcommand.
///
/// # Errors
///
/// Returns an error if the store cannot be read or written.
pub fn execute(cmd: &StoreCommands) -> Result<(), MuscleError> {
    let path = resolve_store_path(None);

    match cmd {
        StoreCommands::List { json } => list(&path, *json),
        StoreCommands::Reset { output, workspace } => {
            if daemon::is_running(&control::socket_path()) {
                eprintln!(
                    "{} the engine is running and will write back the layouts it remembers",
                    "Warning:".yellow()
                );
            }
            let removed = reset(&path, output.as_deref(), workspace.as_deref())?;
            println!("{} {removed} layouts", "Forgot".green());
            Ok(())
        }
        StoreCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

/// One row of `muscle store list`.
#[derive(Tabled)]
struct LayoutRow {
    #[tabled(rename = "Output")]
    output: String,
    #[tabled(rename = "Workspace")]
    workspace: String,
    #[tabled(rename = "Fingerprint")]
    fingerprint: String,
    #[tabled(rename = "Windows")]
    windows: usize,
    #[tabled(rename = "Last seen")]
    last_seen: String,
}

fn list(path: &Path, json: bool) -> Result<(), MuscleError> {
    let store = FingerprintStore::load(path)?;
    let entries = sorted_entries(&store);

    if json {
        let value: Vec<serde_json::Value> = entries
            .iter()
            .map(|(key, stored)| {
                serde_json::json!({
                    "output": key.scope.output,
                    "workspace": key.scope.workspace,
                    "fingerprint": key.fingerprint,
                    "windows": stored.tree.leaf_count(),
                    "lastSeen": stored.last_seen,
                    "tree": stored.tree.root,
                })
            })
            .collect();
        print_highlighted_json(&serde_json::Value::Array(value));
        return Ok(());
    }

    if entries.is_empty() {
        println!("No layouts remembered yet ({})", path.display());
        return Ok(());
    }

    let rows = rows(&entries, now_millis());
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..4)).with(Alignment::right()))
        .to_string();

    println!("{}", format!("Layouts ({})", entries.len()).bold());
    println!("{table}");
    Ok(())
}

fn reset(path: &Path, output: Option<&str>, workspace: Option<&str>) -> Result<usize, MuscleError> {
    let mut store = FingerprintStore::load(path)?;
    Ok(store.remove_matching(output, workspace)?)
}

fn sorted_entries(store: &FingerprintStore) -> Vec<(&StoreKey, &StoredLayout)> {
    let mut entries: Vec<_> = store.iter().collect();
    entries.sort_by(|a, b| b.1.last_seen.cmp(&a.1.last_seen));
    entries
}

fn rows(entries: &[(&StoreKey, &StoredLayout)], now: u64) -> Vec<LayoutRow> {
    entries
        .iter()
        .map(|(key, stored)| LayoutRow {
            output: key.scope.output.clone(),
            workspace: key.scope.workspace.clone(),
            fingerprint: key.fingerprint.short().to_string(),
            windows: stored.tree.leaf_count(),
            last_seen: format_age(now.saturating_sub(stored.last_seen)),
        })
        .collect()
}

/// Formats a millisecond age as the largest whole unit.
fn format_age(age_ms: u64) -> String {
    let secs = age_ms / 1000;
    match secs {
        0..60 => "just now".to_string(),
        60..3600 => format!("{}m ago", secs / 60),
        3600..86_400 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86_400),
    }
}
