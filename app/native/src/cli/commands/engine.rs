//! Engine commands: `run`, `enable`, `disable`, `status`.

use std::path::PathBuf;

use colored::Colorize;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::cli::output;
use crate::control::{self, ControlError, ControlRequest};
use crate::daemon;
use crate::error::MuscleError;

/// Starts the engine in the foreground.
///
/// # Errors
///
/// Returns an error if startup fails or the engine stops on a fatal error.
pub fn run(store: Option<&PathBuf>) -> Result<(), MuscleError> { daemon::run(store) }

/// Flips snapshotting and restoring in the running engine.
///
/// # Errors
///
/// Returns an error if no engine is running or it does not answer.
pub fn set_enabled(enabled: bool) -> Result<(), MuscleError> {
    let request = if enabled { ControlRequest::Enable } else { ControlRequest::Disable };
    let data = control::request_data(&control::socket_path(), request).map_err(not_running_hint)?;

    let now_enabled = data.get("enabled").and_then(serde_json::Value::as_bool).unwrap_or(enabled);
    if now_enabled {
        println!("{}", "Layout memory enabled.".green());
    } else {
        println!("{}", "Layout memory disabled.".yellow());
    }
    Ok(())
}

/// Prints the state of the running engine.
///
/// # Errors
///
/// Returns an error if no engine is running or it does not answer.
pub fn status(json: bool) -> Result<(), MuscleError> {
    let data = control::request_data(&control::socket_path(), ControlRequest::Status)
        .map_err(not_running_hint)?;

    if json {
        output::print_highlighted_json(&data);
        return Ok(());
    }

    let text = |key: &str| match &data[key] {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "-".to_string(),
        other => other.to_string(),
    };
    let flag = |key: &str| output::format_bool(data[key].as_bool().unwrap_or(false));

    let mut builder = Builder::default();
    builder.push_record(["Enabled".to_string(), flag("enabled")]);
    builder.push_record(["Store".to_string(), text("storePath")]);
    builder.push_record(["Stored layouts".to_string(), text("storedLayouts")]);
    builder.push_record(["Unsaved changes".to_string(), flag("unsavedChanges")]);
    builder.push_record(["Events handled".to_string(), text("eventsHandled")]);
    builder.push_record(["Snapshots".to_string(), text("snapshotsTaken")]);
    builder.push_record(["Replays".to_string(), text("replaysRun")]);

    let busy = data["busyScopes"].as_array().map_or(0, Vec::len);
    builder.push_record(["Busy scopes".to_string(), busy.to_string()]);

    println!("{}", "Muscle".bold());
    println!("{}", builder.build().with(Style::rounded()));
    Ok(())
}

fn not_running_hint(err: ControlError) -> MuscleError {
    match err {
        ControlError::NotRunning => MuscleError::Control(
            "muscle is not running. Start it with `muscle run` (e.g. exec from your i3/sway config)."
                .to_string(),
        ),
        other => other.into(),
    }
}
