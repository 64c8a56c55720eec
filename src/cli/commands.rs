use clap::{Args, Parser, Subcommand};

use crate::model::path::NodePath;

#[derive(Parser)]
#[command(name = "tt", about = concat!("tasktree v", env!("CARGO_PKG_VERSION"), " - tasks all the way down"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different workspace directory
    #[arg(short = 'C', long = "project-dir", global = true)]
    pub project_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a tasktree workspace in the current directory
    Init(InitArgs),
    /// Print the task tree
    List(ListArgs),
    /// Show one task or subtask
    Show(PathArg),
    /// Add a top-level task
    Add(AddArgs),
    /// Add a subtask under PARENT
    Sub(SubArgs),
    /// Change a node's title and/or description
    Edit(EditArgs),
    /// Delete a node and everything under it
    Rm(PathArg),
    /// Toggle a node's completion
    Toggle(PathArg),
    /// Toggle whether a node's children are shown in the TUI
    Expand(PathArg),
    /// Search titles and descriptions by regex
    Search(SearchArgs),
    /// View or manage the recovery log
    Recovery(RecoveryCmd),
}

// ---------------------------------------------------------------------------
// Args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct InitArgs {
    /// Reset an existing workspace: rewrite the config and replace the
    /// stored tree
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct ListArgs {
    /// Only tasks whose title (or any subtask title) contains this text
    #[arg(long)]
    pub filter: Option<String>,
}

#[derive(Args)]
pub struct PathArg {
    /// Dotted node path, e.g. 0 or 0.2.1
    pub path: NodePath,
}

#[derive(Args)]
pub struct AddArgs {
    /// Task title
    pub title: String,
    /// Task description
    #[arg(short, long)]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct SubArgs {
    /// Path of the parent node
    pub parent: NodePath,
    /// Subtask title
    pub title: String,
    /// Subtask description
    #[arg(short, long)]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct EditArgs {
    /// Path of the node to edit
    pub path: NodePath,
    /// New title (default: keep current)
    #[arg(long)]
    pub title: Option<String>,
    /// New description; pass "" to clear it (default: keep current)
    #[arg(short, long)]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Regex pattern (case-insensitive)
    pub pattern: String,
}

// ---------------------------------------------------------------------------
// Recovery log
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct RecoveryCmd {
    #[command(subcommand)]
    pub action: Option<RecoveryAction>,
    /// Maximum number of entries to show (default: 10)
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Subcommand)]
pub enum RecoveryAction {
    /// Remove old entries
    Prune(RecoveryPruneArgs),
    /// Print the path to the recovery log
    Path,
}

#[derive(Args)]
pub struct RecoveryPruneArgs {
    /// Remove entries older than this timestamp (default: 30 days ago)
    #[arg(long)]
    pub before: Option<String>,
    /// Remove all entries
    #[arg(long)]
    pub all: bool,
}
