//! Configuration for the mixer and its output
//!
//! ```ignore
//! use tinmix_core::config::{default_config_path, load_config, MixerConfig};
//!
//! let config: MixerConfig = load_config(&default_config_path());
//! config.validate()?;
//! ```

mod io;
mod mixer;
mod paths;

pub use io::{load_config, read_config, save_config};
pub use mixer::{MixerConfig, MAX_BUFFER_FRAMES};
pub use paths::{config_dir, default_config_path};
