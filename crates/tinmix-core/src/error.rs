//! Error types for the mixer

use thiserror::Error;

/// Errors that can occur while decoding, mixing or driving audio output
#[derive(Error, Debug)]
pub enum MixerError {
    /// Every source slot is in use
    #[error("Source limit reached ({limit} active)")]
    CapacityExhausted { limit: usize },

    /// The PCM producer failed while reading
    #[error("Failed to read PCM data: {0}")]
    Read(String),

    /// Codec or container error from the file adapter
    #[error("Decode error: {0}")]
    Decode(String),

    /// Rate converter could not be created or failed while processing
    #[error("Resampler error: {0}")]
    Resampler(String),

    /// No audio output device available
    #[error("No audio output device found: {0}")]
    NoDevice(String),

    /// Failed to build, start or run the output stream
    #[error("Audio stream error: {0}")]
    Stream(String),

    /// The driver has no free output channel
    #[error("No free output channel")]
    ChannelUnavailable,

    /// Failed to spawn the decode service thread
    #[error("Failed to spawn thread: {0}")]
    ThreadSpawn(String),

    /// Configuration values out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// File system error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for mixer operations
pub type MixerResult<T> = Result<T, MixerError>;
