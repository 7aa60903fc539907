//! Mixable sources
//!
//! A [`Source`] is anything the real-time callback can ask for "up to N
//! samples". Two kinds ship with the crate:
//!
//! - [`BufferSource`]: plays a pre-decoded [`SharedBuffer`](crate::SharedBuffer) once
//! - [`StreamingDecoder`]: loops a [`PcmFile`](crate::file::PcmFile) forever,
//!   decoding on the background thread into a lock-free ring
//!
//! # Threading contract
//!
//! All methods take `&self` because the manager shares one instance between
//! the audio thread (`mix`) and the decode service thread (`poll`). For any
//! given source exactly one thread ever calls `mix` and exactly one ever
//! calls `poll`; implementations rely on that instead of locking.

mod buffer_source;
mod ring;
mod streaming;

pub use buffer_source::BufferSource;
pub use ring::SampleRing;
pub use streaming::StreamingDecoder;

use std::sync::Arc;

use crate::types::{Mixed, Sample};

/// Something that contributes samples to the output mix
pub trait Source: Send + Sync {
    /// Write up to `out.len()` samples into `out`
    ///
    /// Overwrites when `additive` is false, otherwise adds with saturation.
    /// Called on the real-time thread: must not block or allocate.
    fn mix(&self, out: &mut [Sample], additive: bool) -> Mixed;

    /// Whether this source needs `poll` calls from the decode service
    fn pollable(&self) -> bool;

    /// Do background work; returns true if anything was done
    fn poll(&self) -> bool {
        false
    }

    /// Set the 8.8 fixed-point playback volume
    ///
    /// Sources without a volume control ignore this.
    fn set_volume(&self, _volume: i32) {}

    /// Whether the manager is responsible for destroying this source
    ///
    /// Sources shared through an `Arc` report `false`: the manager only
    /// releases its reference and the caller's handle keeps the value alive.
    fn owned(&self) -> bool {
        true
    }
}

impl<S: Source + ?Sized> Source for Arc<S> {
    fn mix(&self, out: &mut [Sample], additive: bool) -> Mixed {
        (**self).mix(out, additive)
    }

    fn pollable(&self) -> bool {
        (**self).pollable()
    }

    fn poll(&self) -> bool {
        (**self).poll()
    }

    fn set_volume(&self, volume: i32) {
        (**self).set_volume(volume)
    }

    fn owned(&self) -> bool {
        false
    }
}
