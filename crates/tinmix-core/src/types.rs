//! Common types for tinmix
//!
//! Sample format, volume scale and the small value types shared between
//! sources, the manager and the output drivers.

use std::fmt;

/// PCM sample type (mono, 16-bit signed)
pub type Sample = i16;

/// Unity gain in 8.8 fixed point
pub const UNITY_VOLUME: i32 = 0x100;

/// Output rate used when neither the config nor the device specify one
pub const DEFAULT_OUTPUT_RATE: u32 = 44100;

/// Identifier handed out by the manager for every accepted source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

/// How the driver wants the callback to treat the target buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MixMode {
    /// Target holds garbage; the first source overwrites it
    #[default]
    Overwrite,
    /// Target already holds audio (or silence); every source adds into it
    Additive,
}

/// Result of asking a source for samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mixed {
    /// Number of samples written into the output
    pub samples: usize,
    /// Source has nothing more to give and should be removed
    pub finished: bool,
}

impl Mixed {
    /// Samples produced, more may follow
    #[inline]
    pub fn more(samples: usize) -> Self {
        Self { samples, finished: false }
    }

    /// Last samples of a finite source
    #[inline]
    pub fn last(samples: usize) -> Self {
        Self { samples, finished: true }
    }
}
