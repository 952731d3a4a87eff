//! XDG Base Directory paths for livebot.
//!
//! CLI tools should use XDG paths for cross-platform consistency,
//! not platform-native paths. This matches tools like gh, docker, kubectl.

use std::path::PathBuf;

/// Get the livebot config directory.
///
/// Returns `$XDG_CONFIG_HOME/livebot` if set, otherwise `~/.config/livebot`.
/// This is where the option documents and their backup are stored.
///
/// # Examples
///
/// ```
/// use livebot_paths::config_dir;
///
/// let config = config_dir();
/// let user_options = config.join("options.json");
/// ```
pub fn config_dir() -> PathBuf {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config).join("livebot")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".config/livebot")
    } else {
        PathBuf::from(".config/livebot")
    }
}

/// Get the livebot data directory.
///
/// Returns `$XDG_DATA_HOME/livebot` if set, otherwise `~/.local/share/livebot`.
pub fn data_dir() -> PathBuf {
    if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg_data).join("livebot")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".local/share/livebot")
    } else {
        PathBuf::from(".local/share/livebot")
    }
}
