use std::path::PathBuf;

use super::config::Config;

/// A discovered tasktree workspace
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Directory containing `tasktree/`
    pub root: PathBuf,
    /// Path to the `tasktree/` directory
    pub dir: PathBuf,
    /// Parsed config.toml
    pub config: Config,
}

impl Workspace {
    /// Directory holding the blob files
    pub fn store_dir(&self) -> PathBuf {
        self.dir.join("store")
    }
}
