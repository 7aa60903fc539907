//! Standard config locations

use std::path::PathBuf;

/// Per-user config directory for tinmix
///
/// Returns `<config dir>/tinmix`, e.g. `~/.config/tinmix` on Linux, or
/// `./tinmix` if the platform has no config directory.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tinmix")
}

/// Default location of the mixer config file
pub fn default_config_path() -> PathBuf {
    config_dir().join("mixer.yaml")
}
