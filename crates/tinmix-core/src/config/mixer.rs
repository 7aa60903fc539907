//! Mixer configuration
//!
//! Sizes of the preallocated structures, background thread pacing and output
//! preferences. Every field has a default, so a YAML file only needs to list
//! what it changes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dsp::{ResampleQuality, MIN_STAGING};
use crate::error::{MixerError, MixerResult};
use crate::types::DEFAULT_OUTPUT_RATE;

/// Largest callback buffer the output driver preallocates for (frames)
pub const MAX_BUFFER_FRAMES: usize = 8192;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Maximum number of simultaneously active sources
    /// Default: 32
    pub max_sources: usize,

    /// Ring capacity of each streaming source in samples (one slot stays unused)
    /// Default: 0x8000
    pub ring_capacity: usize,

    /// Raw decode chunk in samples, at least [`MIN_STAGING`]
    /// Default: 0x2000
    pub staging_size: usize,

    /// Decode service sleep when no source had work (ms)
    /// Default: 10
    pub idle_sleep_ms: u64,

    /// How often `stop` re-checks a busy driver before giving up
    /// Default: 1000
    pub drain_retries: u32,

    /// Delay between drain checks (ms)
    /// Default: 10
    pub drain_interval_ms: u64,

    /// Rate converter quality
    pub quality: ResampleQuality,

    /// Requested output rate; `None` uses the device default
    pub output_rate: Option<u32>,

    /// Requested callback buffer size in frames
    /// Default: 512
    pub buffer_frames: u32,

    /// Output device name; `None` uses the default device
    pub device: Option<String>,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            max_sources: 32,
            ring_capacity: 0x8000,
            staging_size: 0x2000,
            idle_sleep_ms: 10,
            drain_retries: 1000,
            drain_interval_ms: 10,
            quality: ResampleQuality::default(),
            output_rate: None,
            buffer_frames: 512,
            device: None,
        }
    }
}

impl MixerConfig {
    /// Reject values the engine cannot work with
    pub fn validate(&self) -> MixerResult<()> {
        if self.max_sources == 0 {
            return Err(MixerError::InvalidConfig("max_sources must be at least 1".into()));
        }
        if self.ring_capacity < 2 {
            return Err(MixerError::InvalidConfig(format!(
                "ring_capacity {} is too small (minimum 2)",
                self.ring_capacity
            )));
        }
        if self.staging_size < MIN_STAGING {
            return Err(MixerError::InvalidConfig(format!(
                "staging_size {} is too small (minimum {})",
                self.staging_size, MIN_STAGING
            )));
        }
        if self.output_rate == Some(0) {
            return Err(MixerError::InvalidConfig("output_rate must be non-zero".into()));
        }
        if self.buffer_frames == 0 || self.buffer_frames as usize > MAX_BUFFER_FRAMES {
            return Err(MixerError::InvalidConfig(format!(
                "buffer_frames {} outside 1..={}",
                self.buffer_frames, MAX_BUFFER_FRAMES
            )));
        }
        Ok(())
    }

    /// Requested rate, or the fallback when neither config nor device has one
    pub fn output_rate_or_default(&self) -> u32 {
        self.output_rate.unwrap_or(DEFAULT_OUTPUT_RATE)
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }
}
