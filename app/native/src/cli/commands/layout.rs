//! `show`, `save` and `restore`: named layouts outside the engine.

use std::path::Path;

use colored::Colorize;

use crate::cli::output::print_highlighted_json;
use crate::config::get_config;
use crate::daemon::explicit_socket;
use crate::engine::restore::apply_layout;
use crate::engine::{EngineSettings, RestoreOutcome};
use crate::error::MuscleError;
use crate::ipc::{I3Connection, RawNode, WindowManager, resolve_socket_path};
use crate::layout::{LayoutNode, LayoutTree, Scope, fingerprint};
use crate::store::file::{read_layout_file, write_layout_file};

/// Prints the layout of a workspace as a tree or as JSON.
///
/// # Errors
///
/// Returns an error if the manager cannot be reached or the workspace does
/// not exist or is empty.
pub fn show(json: bool, workspace: Option<&str>) -> Result<(), MuscleError> {
    let mut wm = connect()?;
    let raw = wm.tree()?;
    let scope = resolve_scope(&raw, workspace)?;
    let tree = live_tree(&raw, &scope)?;

    if json {
        print_highlighted_json(&serde_json::to_value(&tree)?);
    } else {
        print!("{}", render_tree(&tree));
    }
    Ok(())
}

/// Writes the layout of a workspace to `file`.
///
/// # Errors
///
/// Returns an error if the layout cannot be read or the file written.
pub fn save(file: &Path, workspace: Option<&str>) -> Result<(), MuscleError> {
    let mut wm = connect()?;
    let raw = wm.tree()?;
    let scope = resolve_scope(&raw, workspace)?;
    let tree = live_tree(&raw, &scope)?;

    write_layout_file(file, &tree)?;
    println!(
        "{} {} ({} windows) to {}",
        "Saved".green(),
        scope.to_string().bold(),
        tree.leaf_count(),
        file.display()
    );
    Ok(())
}

/// Applies the layout saved in `file` to a workspace.
///
/// # Errors
///
/// Returns an error if the file cannot be read, the workspace has another
/// shape than the saved layout, or the replay aborts.
pub fn restore(file: &Path, workspace: Option<&str>) -> Result<(), MuscleError> {
    let mut target = read_layout_file(file)?;
    let mut wm = connect()?;
    let raw = wm.tree()?;
    let scope = resolve_scope(&raw, workspace)?;
    target.scope = scope.clone();

    let settings = EngineSettings::from_config(get_config());
    let outcome = apply_layout(&mut wm, &scope, &target, &settings)?;
    println!("{}", describe(&scope, outcome)?);
    Ok(())
}

fn connect() -> Result<I3Connection, MuscleError> {
    let config = get_config();
    let path = resolve_socket_path(explicit_socket(&config.ipc.socket_path))?;
    Ok(I3Connection::connect(&path)?)
}

fn resolve_scope(raw: &RawNode, workspace: Option<&str>) -> Result<Scope, MuscleError> {
    match workspace {
        Some(name) => Scope::named(raw, name)
            .ok_or_else(|| MuscleError::InvalidArguments(format!("No workspace named '{name}'"))),
        None => Scope::focused(raw)
            .ok_or_else(|| MuscleError::InvalidArguments("No focused workspace".to_string())),
    }
}

fn live_tree(raw: &RawNode, scope: &Scope) -> Result<LayoutTree, MuscleError> {
    LayoutTree::from_raw(raw, scope).ok_or_else(|| no_windows(scope))
}

fn no_windows(scope: &Scope) -> MuscleError {
    MuscleError::InvalidArguments(format!("Workspace {scope} has no tiled windows"))
}

/// Turns the result of a file restore into a message, or an error when the
/// layout was not applied.
fn describe(scope: &Scope, outcome: RestoreOutcome) -> Result<String, MuscleError> {
    match outcome {
        RestoreOutcome::Empty => Err(no_windows(scope)),
        RestoreOutcome::AlreadyMatching { .. } => {
            Ok(format!("{} already matches the saved layout", scope.to_string().bold()))
        }
        RestoreOutcome::Replayed { commands, .. } => Ok(format!(
            "{} {} ({commands} commands)",
            "Restored".green(),
            scope.to_string().bold()
        )),
        RestoreOutcome::Refused { error, .. } => Err(error.into()),
        RestoreOutcome::Aborted { sent, error, .. } => {
            Err(MuscleError::Replay(format!("{error} after {sent} commands")))
        }
        RestoreOutcome::Busy | RestoreOutcome::NoMatch => {
            Err(MuscleError::Command(format!("Workspace {scope} was not restored")))
        }
    }
}

// ============================================================================
// Tree rendering
// ============================================================================

/// Renders a tree with box-drawing guides, one node per line.
fn render_tree(tree: &LayoutTree) -> String {
    let mut out = format!(
        "{} {}\n{}\n",
        tree.scope.to_string().bold(),
        fingerprint(tree).short().dimmed(),
        node_label(&tree.root, 1.0)
    );
    render_children(&tree.root, "", &mut out);
    out
}

fn render_children(node: &LayoutNode, prefix: &str, out: &mut String) {
    let shares = node.child_shares();
    let last = node.children.len().saturating_sub(1);

    for (i, (child, share)) in node.children.iter().zip(shares).enumerate() {
        let (branch, indent) = if i == last { ("└── ", "    ") } else { ("├── ", "│   ") };
        out.push_str(prefix);
        out.push_str(branch);
        out.push_str(&node_label(child, share));
        out.push('\n');
        render_children(child, &format!("{prefix}{indent}"), out);
    }
}

fn node_label(node: &LayoutNode, share: f64) -> String {
    let percent = format!("{:>3.0}%", share * 100.0);
    match (&node.hint, node.is_leaf()) {
        (Some(hint), true) => format!("{percent} {}", hint.cyan()),
        (None, true) => format!("{percent} {}", node.kind.label()),
        (_, false) => format!("{percent} {}", node.kind.label().yellow()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::replay::PlanError;
    use crate::engine::ReplayAbort;
    use crate::ipc::fake::{container, root, window, workspace};
    use crate::layout::Fingerprint;

    fn sample() -> RawNode {
        root("DP-1", vec![
            workspace(10, "1", "splith", vec![
                window(11, "foot", 0.6),
                container(20, "splitv", 0.4, vec![window(21, "firefox", 0.5), window(22, "mpv", 0.5)]),
            ]),
            workspace(30, "2", "splith", vec![]),
        ])
    }

    fn any_fingerprint() -> Fingerprint {
        fingerprint(&LayoutTree::from_raw(&sample(), &Scope::new("DP-1", "1")).unwrap())
    }

    #[test]
    fn test_render_tree_draws_every_node() {
        colored::control::set_override(false);
        let tree = LayoutTree::from_raw(&sample(), &Scope::new("DP-1", "1")).unwrap();
        let rendered = render_tree(&tree);
        let lines: Vec<&str> = rendered.lines().collect();

        assert!(lines[0].starts_with("DP-1/1 "));
        assert_eq!(lines[1], "100% split horizontal");
        assert_eq!(lines[2], "├──  60% foot");
        assert_eq!(lines[3], "└──  40% split vertical");
        assert_eq!(lines[4], "    ├──  50% firefox");
        assert_eq!(lines[5], "    └──  50% mpv");
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_resolve_scope_by_name_or_number() {
        let raw = sample();
        assert_eq!(resolve_scope(&raw, Some("2")).unwrap(), Scope::new("DP-1", "2"));
        assert!(matches!(resolve_scope(&raw, Some("9")), Err(MuscleError::InvalidArguments(_))));
    }

    #[test]
    fn test_empty_workspace_has_no_tree() {
        let raw = sample();
        assert!(matches!(
            live_tree(&raw, &Scope::new("DP-1", "2")),
            Err(MuscleError::InvalidArguments(_))
        ));
    }

    #[test]
    fn test_describe_successful_outcomes() {
        colored::control::set_override(false);
        let scope = Scope::new("DP-1", "1");

        let replayed = RestoreOutcome::Replayed {
            fingerprint: any_fingerprint(),
            commands: 3,
        };
        assert_eq!(describe(&scope, replayed).unwrap(), "Restored DP-1/1 (3 commands)");

        let matching = RestoreOutcome::AlreadyMatching {
            fingerprint: any_fingerprint(),
        };
        assert!(describe(&scope, matching).unwrap().contains("already matches"));
    }

    #[test]
    fn test_describe_failed_outcomes() {
        let scope = Scope::new("DP-1", "1");

        let refused = RestoreOutcome::Refused {
            fingerprint: any_fingerprint(),
            error: PlanError::ShapeMismatch,
        };
        assert!(matches!(describe(&scope, refused), Err(MuscleError::Replay(_))));

        let aborted = RestoreOutcome::Aborted {
            fingerprint: any_fingerprint(),
            sent: 1,
            error: ReplayAbort::WindowVanished { con_id: 12 },
        };
        let err = describe(&scope, aborted).unwrap_err();
        assert!(err.to_string().contains("container 12 vanished"));

        assert!(describe(&scope, RestoreOutcome::Empty).is_err());
    }
}
