use std::path::{Path, PathBuf};

use crate::cli::commands::InitArgs;
use crate::io::lock::FileLock;
use crate::io::project_io::{self, WORKSPACE_DIR};
use crate::ops::seed::seed_tree;
use crate::ops::tree_ops::TaskTree;

/// What `tt init` did, for the summary line.
#[derive(Debug)]
struct InitReport {
    dir: PathBuf,
    nodes: usize,
    reset: bool,
}

pub fn cmd_init(args: InitArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let root = super::start_dir()?;

    // Check for a parent workspace and warn
    if let Some(parent) = root.parent()
        && let Ok(parent_root) = project_io::discover_workspace(parent)
    {
        eprintln!(
            "note: parent workspace found at {}/",
            parent_root.join(WORKSPACE_DIR).display()
        );
    }

    let report = init_at(&root, args.force)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "dir": report.dir.display().to_string(),
                "nodes": report.nodes,
                "reset": report.reset,
            }))?
        );
        return Ok(());
    }

    let verb = if report.reset { "Reset" } else { "Initialized" };
    println!(
        "{} tasktree workspace in {}/ ({} node{})",
        verb,
        report.dir.display(),
        report.nodes,
        if report.nodes == 1 { "" } else { "s" }
    );
    Ok(())
}

fn init_at(root: &Path, force: bool) -> Result<InitReport, Box<dyn std::error::Error>> {
    let existing = root.join(WORKSPACE_DIR);
    if existing.is_dir() && !force {
        return Err(format!(
            "tasktree workspace already exists in {}/ (use --force to reset it)",
            existing.display()
        )
        .into());
    }

    let dir = project_io::init_workspace(root, force)?;
    let workspace = project_io::load_workspace(root)?;
    let _lock = FileLock::acquire_default(&dir)?;
    let (mut session, _) = project_io::open_session(&workspace)?;

    // A fresh open already seeded the store; a reset has to replace it.
    if force {
        let tree = if workspace.config.store.seed_on_empty {
            seed_tree()?
        } else {
            TaskTree::new()
        };
        session.replace(tree);
        super::ensure_saved(&session)?;
    }

    Ok(InitReport {
        dir,
        nodes: session.tree().len(),
        reset: force,
    })
}
