pub mod config;
pub mod run;

use std::path::PathBuf;

/// Resolve the configuration directory: explicit flag or the XDG default.
pub fn config_base(dir: Option<PathBuf>) -> PathBuf {
    dir.unwrap_or_else(livebot_paths::config_dir)
}
