use std::fs;
use std::path::{Path, PathBuf};

use crate::io::blob_store::FileBlobStore;
use crate::io::config_io::{self, CONFIG_FILE};
use crate::io::session::{LoadOutcome, Session, SessionError, SessionOptions};
use crate::model::workspace::Workspace;

/// Name of the workspace directory
pub const WORKSPACE_DIR: &str = "tasktree";

/// Error type for workspace I/O
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("not a tasktree workspace: no tasktree/ directory found (run `tt init`)")]
    NotAProject,
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config.toml: {0}")]
    ConfigParseError(#[from] toml::de::Error),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Walk up from `start` looking for `tasktree/config.toml`.
pub fn discover_workspace(start: &Path) -> Result<PathBuf, ProjectError> {
    let mut current = start.to_path_buf();
    loop {
        let dir = current.join(WORKSPACE_DIR);
        if dir.is_dir() && dir.join(CONFIG_FILE).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(ProjectError::NotAProject);
        }
    }
}

/// Load the workspace rooted at `root`.
pub fn load_workspace(root: &Path) -> Result<Workspace, ProjectError> {
    let dir = root.join(WORKSPACE_DIR);
    if !dir.is_dir() {
        return Err(ProjectError::NotAProject);
    }
    let config = config_io::read_config(&dir)?;
    Ok(Workspace {
        root: root.to_path_buf(),
        dir,
        config,
    })
}

/// Create `tasktree/` with its config and store directory. Returns the
/// workspace directory.
pub fn init_workspace(root: &Path, force: bool) -> Result<PathBuf, ProjectError> {
    let dir = root.join(WORKSPACE_DIR);
    fs::create_dir_all(dir.join("store"))?;
    config_io::write_default_config(&dir, force)?;
    Ok(dir)
}

/// Open the workspace's tree through a file-backed session.
pub fn open_session(
    workspace: &Workspace,
) -> Result<(Session<FileBlobStore>, LoadOutcome), SessionError> {
    let store = FileBlobStore::new(workspace.store_dir());
    let options = SessionOptions::from_config(&workspace.config.store, Some(workspace.dir.clone()));
    Session::open(store, options)
}
