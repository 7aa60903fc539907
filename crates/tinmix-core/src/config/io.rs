//! YAML configuration files
//!
//! Two flavours of loading: [`load_config`] is forgiving and falls back to
//! defaults (for the implicit per-user file), [`read_config`] fails loudly
//! (for a file the user named explicitly).

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Load a config file, using defaults if it is missing or unreadable
///
/// # Type Parameters
/// * `T` - Config type implementing `DeserializeOwned` and `Default`
///
/// # Arguments
/// * `path` - YAML file, usually [`default_config_path`](super::default_config_path)
///
/// # Example
///
/// ```ignore
/// let config: MixerConfig = load_config(&default_config_path());
/// ```
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::info!("load_config: {:?} not found, using defaults", path);
        return T::default();
    }

    match read_config(path) {
        Ok(config) => {
            log::info!("load_config: loaded {:?}", path);
            config
        }
        Err(e) => {
            log::warn!("load_config: {:#}, using defaults", e);
            T::default()
        }
    }
}

/// Read and parse a config file, reporting any failure
pub fn read_config<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    serde_yaml::from_str(&contents).with_context(|| format!("Failed to parse config file {:?}", path))
}

/// Write a config file, creating parent directories as needed
///
/// # Arguments
/// * `config` - Value to serialize as YAML
/// * `path` - Destination; overwritten if it exists
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;
    std::fs::write(path, yaml).with_context(|| format!("Failed to write config file {:?}", path))?;

    log::info!("save_config: wrote {:?}", path);
    Ok(())
}
