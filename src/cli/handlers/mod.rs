mod init;
pub use init::cmd_init;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, Utc};

/// Global override for the workspace directory (set by -C flag)
static PROJECT_DIR_OVERRIDE: OnceLock<PathBuf> = OnceLock::new();

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::blob_store::FileBlobStore;
use crate::io::lock::FileLock;
use crate::io::project_io::{self, ProjectError};
use crate::io::recovery;
use crate::io::session::{LoadOutcome, SaveStatus, Session};
use crate::model::path::NodePath;
use crate::model::workspace::Workspace;
use crate::ops::search;

type CmdResult = Result<(), Box<dyn std::error::Error>>;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;

    // Store -C override for load_workspace_cwd()
    if let Some(ref dir) = cli.project_dir {
        set_project_dir(dir)?;
    }

    match cli.command {
        None => Err("no subcommand given (try `tt --help`)".into()),
        Some(cmd) => match cmd {
            Commands::Init(args) => cmd_init(args, json),

            // Read commands
            Commands::List(args) => cmd_list(args, json),
            Commands::Show(args) => cmd_show(args, json),
            Commands::Search(args) => cmd_search(args, json),

            // Write commands
            Commands::Add(args) => cmd_add(args, json),
            Commands::Sub(args) => cmd_sub(args, json),
            Commands::Edit(args) => cmd_edit(args, json),
            Commands::Rm(args) => cmd_rm(args, json),
            Commands::Toggle(args) => cmd_toggle(args, json),
            Commands::Expand(args) => cmd_expand(args, json),

            // Maintenance
            Commands::Recovery(args) => cmd_recovery(args, json),
        },
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn set_project_dir(dir: &str) -> CmdResult {
    let abs = std::fs::canonicalize(dir)
        .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?;
    // A second call with the same process is harmless; keep the first.
    let _ = PROJECT_DIR_OVERRIDE.set(abs);
    Ok(())
}

/// Directory commands start from: the -C override, else the cwd.
fn start_dir() -> Result<PathBuf, ProjectError> {
    match PROJECT_DIR_OVERRIDE.get() {
        Some(dir) => Ok(dir.clone()),
        None => std::env::current_dir().map_err(ProjectError::IoError),
    }
}

fn load_workspace_cwd() -> Result<Workspace, ProjectError> {
    let root = project_io::discover_workspace(&start_dir()?)?;
    project_io::load_workspace(&root)
}

/// Open the stored tree for reading, reporting a corrupt blob on stderr.
/// Opening can seed an empty store, so the lock is held while it does.
fn open_tree(workspace: &Workspace) -> Result<Session<FileBlobStore>, Box<dyn std::error::Error>> {
    let _lock = FileLock::acquire_default(&workspace.dir)?;
    let (session, outcome) = project_io::open_session(workspace)?;
    if let LoadOutcome::Corrupt(e) = outcome {
        eprintln!(
            "warning: stored tree is unreadable ({}); showing an empty tree. \
             The original was copied to the recovery log.",
            e
        );
    }
    Ok(session)
}

/// Open the stored tree for a write. The caller holds the lock. A corrupt
/// store is never overwritten by an ordinary write; only `tt init --force`
/// resets it.
fn open_tree_for_write(
    workspace: &Workspace,
) -> Result<Session<FileBlobStore>, Box<dyn std::error::Error>> {
    let (session, outcome) = project_io::open_session(workspace)?;
    if let LoadOutcome::Corrupt(e) = outcome {
        return Err(format!(
            "stored tree is unreadable ({}); run `tt init --force` to reset it. \
             The original was copied to the recovery log.",
            e
        )
        .into());
    }
    Ok(session)
}

/// Fail the command if its change never reached the store.
fn ensure_saved(session: &Session<FileBlobStore>) -> CmdResult {
    match session.save_status() {
        SaveStatus::Clean => Ok(()),
        SaveStatus::Pending => Err(format!(
            "change was not saved: {}",
            session.last_save_error().unwrap_or("unknown error")
        )
        .into()),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_mutation(
    path: &NodePath,
    id: u64,
    done: Option<bool>,
    expanded: Option<bool>,
) -> CmdResult {
    print_json(&MutationJson {
        path: path.to_string(),
        id,
        done,
        expanded,
    })
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_list(args: ListArgs, json: bool) -> CmdResult {
    let workspace = load_workspace_cwd()?;
    let session = open_tree(&workspace)?;
    let tree = session.tree();

    let indices = search::filter_tasks(tree, args.filter.as_deref().unwrap_or(""));

    if json {
        let nodes: Vec<NodeJson> = indices
            .iter()
            .map(|&i| node_to_json(tree, &tree.tasks()[i], &NodePath::top(i)))
            .collect();
        return print_json(&nodes);
    }

    if indices.is_empty() {
        if tree.is_empty() {
            println!("no tasks (add one with `tt add <title>`)");
        } else {
            println!("no tasks match the filter");
        }
        return Ok(());
    }
    for i in indices {
        for line in format_node_tree(tree, &tree.tasks()[i], &NodePath::top(i), 0) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_show(args: PathArg, json: bool) -> CmdResult {
    let workspace = load_workspace_cwd()?;
    let mut session = open_tree(&workspace)?;
    session.select(&args.path)?;
    let tree = session.tree();
    let Some(node) = tree.inspected() else {
        return Err(format!("nothing at {}", args.path).into());
    };

    if json {
        return print_json(&node_to_json(tree, node, &args.path));
    }
    for line in format_node_detail(tree, node, &args.path) {
        println!("{}", line);
    }
    Ok(())
}

fn cmd_search(args: SearchArgs, json: bool) -> CmdResult {
    let workspace = load_workspace_cwd()?;
    let session = open_tree(&workspace)?;
    let tree = session.tree();
    let re = search::compile_pattern(&args.pattern)
        .ok_or_else(|| format!("invalid search pattern: {}", args.pattern))?;
    let hits = search::search_nodes(tree, &re);

    if json {
        let hits: Vec<SearchHitJson> = hits.iter().map(|h| hit_to_json(tree, h)).collect();
        return print_json(&hits);
    }

    // One line per node even when title and description both match
    let mut seen = HashSet::new();
    for hit in &hits {
        if !seen.insert(hit.path.clone()) {
            continue;
        }
        let node = tree.resolve(&hit.path)?;
        println!("{}", format_node_line(tree, node, &hit.path));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_add(args: AddArgs, json: bool) -> CmdResult {
    let workspace = load_workspace_cwd()?;
    let _lock = FileLock::acquire_default(&workspace.dir)?;
    let mut session = open_tree_for_write(&workspace)?;

    let id = session.apply(|tree| tree.add_task(&args.title, args.description.clone()))?;
    ensure_saved(&session)?;

    let path = NodePath::top(session.tree().tasks().len() - 1);
    if json {
        return print_mutation(&path, id.0, None, None);
    }
    println!("{}", path);
    Ok(())
}

fn cmd_sub(args: SubArgs, json: bool) -> CmdResult {
    let workspace = load_workspace_cwd()?;
    let _lock = FileLock::acquire_default(&workspace.dir)?;
    let mut session = open_tree_for_write(&workspace)?;

    let id = session.apply(|tree| {
        tree.add_subtask(&args.parent, &args.title, args.description.clone())
    })?;
    ensure_saved(&session)?;

    let count = session.tree().resolve(&args.parent)?.children.len();
    let path = args.parent.child(count - 1);
    if json {
        return print_mutation(&path, id.0, None, None);
    }
    println!("{}", path);
    Ok(())
}

fn cmd_edit(args: EditArgs, json: bool) -> CmdResult {
    if args.title.is_none() && args.description.is_none() {
        return Err("nothing to change: pass --title and/or --description".into());
    }
    let workspace = load_workspace_cwd()?;
    let _lock = FileLock::acquire_default(&workspace.dir)?;
    let mut session = open_tree_for_write(&workspace)?;

    let current = session.tree().resolve(&args.path)?;
    let title = args.title.unwrap_or_else(|| current.title.clone());
    let description = args.description.or_else(|| current.description.clone());
    let id = current.id;

    session.apply(|tree| tree.edit_node(&args.path, &title, description))?;
    ensure_saved(&session)?;

    if json {
        return print_mutation(&args.path, id.0, None, None);
    }
    println!("updated {}", args.path);
    Ok(())
}

fn cmd_rm(args: PathArg, json: bool) -> CmdResult {
    let workspace = load_workspace_cwd()?;
    let _lock = FileLock::acquire_default(&workspace.dir)?;
    let mut session = open_tree_for_write(&workspace)?;

    let removed = session.delete(&args.path)?;
    ensure_saved(&session)?;

    if json {
        return print_mutation(&args.path, removed.id.0, None, None);
    }
    let count = removed.subtree_len();
    let extra = if count > 1 {
        format!(" and {} subtask(s)", count - 1)
    } else {
        String::new()
    };
    println!("deleted {} \"{}\"{}", args.path, removed.title, extra);
    Ok(())
}

fn cmd_toggle(args: PathArg, json: bool) -> CmdResult {
    let workspace = load_workspace_cwd()?;
    let _lock = FileLock::acquire_default(&workspace.dir)?;
    let mut session = open_tree_for_write(&workspace)?;

    let done = session.apply(|tree| tree.toggle_completion(&args.path))?;
    ensure_saved(&session)?;

    let tree = session.tree();
    let node = tree.resolve(&args.path)?;
    if json {
        return print_mutation(&args.path, node.id.0, Some(done), None);
    }
    println!("{}", format_node_line(tree, node, &args.path));
    Ok(())
}

fn cmd_expand(args: PathArg, json: bool) -> CmdResult {
    let workspace = load_workspace_cwd()?;
    let _lock = FileLock::acquire_default(&workspace.dir)?;
    let mut session = open_tree_for_write(&workspace)?;

    let expanded = session.apply(|tree| tree.toggle_expansion(&args.path))?;
    ensure_saved(&session)?;

    let id = session.tree().resolve(&args.path)?.id;
    if json {
        return print_mutation(&args.path, id.0, None, Some(expanded));
    }
    println!(
        "{} {}",
        args.path,
        if expanded { "expanded" } else { "collapsed" }
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Recovery log
// ---------------------------------------------------------------------------

const DEFAULT_RECOVERY_LIMIT: usize = 10;

fn cmd_recovery(args: RecoveryCmd, json: bool) -> CmdResult {
    let workspace = load_workspace_cwd()?;

    match args.action {
        Some(RecoveryAction::Path) => {
            println!("{}", recovery::recovery_log_path(&workspace.dir).display());
            Ok(())
        }
        Some(RecoveryAction::Prune(prune)) => {
            let before = prune.before.as_deref().map(parse_timestamp).transpose()?;
            let _lock = FileLock::acquire_default(&workspace.dir)?;
            let removed = recovery::prune_recovery(&workspace.dir, before, prune.all)?;
            if json {
                return print_json(&serde_json::json!({ "removed": removed }));
            }
            println!("pruned {} recovery entr{}", removed, if removed == 1 { "y" } else { "ies" });
            Ok(())
        }
        None => {
            let limit = args.limit.unwrap_or(DEFAULT_RECOVERY_LIMIT);
            let entries = recovery::read_recovery_entries(&workspace.dir, Some(limit));
            if json {
                let values: Vec<serde_json::Value> = entries.iter().map(|e| e.to_json()).collect();
                return print_json(&values);
            }
            if entries.is_empty() {
                println!("recovery log is empty");
                return Ok(());
            }
            for entry in &entries {
                print!("{}", entry.to_markdown());
            }
            Ok(())
        }
    }
}

/// Accept RFC 3339 or a bare `YYYY-MM-DD` (midnight UTC).
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("invalid timestamp '{}' (expected YYYY-MM-DD or RFC 3339)", s))
}
