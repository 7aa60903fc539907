//! tinmix - real-time PCM mixing and streaming playback
//!
//! Renders several simultaneous sounds into one mono 16-bit stream on demand
//! of an audio callback. Short clips are decoded once into a
//! [`SharedBuffer`] and played from memory; long ones are streamed, decoded
//! and resampled on a background thread into a lock-free ring that the
//! callback drains. The real-time thread never blocks, allocates or frees.
//!
//! ```ignore
//! use tinmix_core::audio::CpalDriver;
//! use tinmix_core::file::SymphoniaFile;
//! use tinmix_core::{Manager, MixerConfig};
//!
//! let config = MixerConfig::default();
//! let mut manager = Manager::new(CpalDriver::open(&config)?, config)?;
//! manager.start()?;
//!
//! let music = manager.streaming_decoder(Box::new(SymphoniaFile::open("music.ogg")?));
//! let music = manager.play(Box::new(music))?;
//!
//! let click = manager.decoder().decode(&mut SymphoniaFile::open("click.wav")?, 0x100)?;
//! manager.play_buffer(&click)?;
//! ```

pub mod audio;
pub mod buffer;
pub mod config;
pub mod decoder;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod file;
pub mod source;
pub mod types;

pub use buffer::SharedBuffer;
pub use config::MixerConfig;
pub use decoder::Decoder;
pub use engine::Manager;
pub use error::{MixerError, MixerResult};
pub use source::{BufferSource, Source, StreamingDecoder};
pub use types::*;
