use std::fs;
use std::path::Path;

use crate::io::project_io::ProjectError;
use crate::model::config::Config;

pub const CONFIG_FILE: &str = "config.toml";

/// Written by `tt init`. Every value shown is the default.
pub const CONFIG_TEMPLATE: &str = r##"# tasktree workspace configuration

[store]
# Blob key the task tree is saved under (store/<key>.json)
key = "tasks"
# Populate a sample set of tasks when nothing has been saved yet
seed_on_empty = true
# Save attempts per change before the save is left pending
save_retries = 3

[ui]
show_key_hints = true

# Uncomment to override theme colors ("#RRGGBB").
# [ui.colors]
# background = "#0C001B"
# text = "#B0AAFF"
# text_bright = "#FFFFFF"
# highlight = "#FB4196"
# dim = "#7D78BF"
# done = "#44FF88"
# error = "#FF4444"
# selection_bg = "#3D1438"
"##;

/// Read and parse `config.toml` from the workspace directory.
pub fn read_config(dir: &Path) -> Result<Config, ProjectError> {
    let path = dir.join(CONFIG_FILE);
    let text = fs::read_to_string(&path).map_err(|e| ProjectError::ReadError {
        path: path.clone(),
        source: e,
    })?;
    Ok(toml::from_str(&text)?)
}

/// Write the default config template. Existing files are left alone
/// unless `overwrite` is set.
pub fn write_default_config(dir: &Path, overwrite: bool) -> Result<(), ProjectError> {
    let path = dir.join(CONFIG_FILE);
    if path.exists() && !overwrite {
        return Ok(());
    }
    fs::write(&path, CONFIG_TEMPLATE).map_err(|e| ProjectError::ReadError { path, source: e })
}
