//! One-shot playback of a shared buffer

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::buffer::SharedBuffer;
use crate::dsp;
use crate::types::{Mixed, Sample, UNITY_VOLUME};

use super::Source;

/// Plays a [`SharedBuffer`] from start to end, then reports finished
pub struct BufferSource {
    buffer: SharedBuffer,
    /// Read position in samples, only touched by the mixing thread
    cursor: AtomicUsize,
    volume: i32,
}

impl BufferSource {
    pub fn new(buffer: SharedBuffer) -> Self {
        Self::with_volume(buffer, UNITY_VOLUME)
    }

    /// Play at an 8.8 fixed-point volume
    pub fn with_volume(buffer: SharedBuffer, volume: i32) -> Self {
        Self {
            buffer,
            cursor: AtomicUsize::new(0),
            volume,
        }
    }

    pub fn buffer(&self) -> &SharedBuffer {
        &self.buffer
    }

    /// Samples already played
    pub fn position(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }
}

impl Source for BufferSource {
    fn mix(&self, out: &mut [Sample], additive: bool) -> Mixed {
        let samples = self.buffer.samples();
        let pos = self.cursor.load(Ordering::Relaxed);
        let n = (samples.len() - pos).min(out.len());

        dsp::mix(additive, &mut out[..n], &samples[pos..pos + n], self.volume);
        self.cursor.store(pos + n, Ordering::Relaxed);

        if pos + n == samples.len() {
            Mixed::last(n)
        } else {
            Mixed::more(n)
        }
    }

    fn pollable(&self) -> bool {
        false
    }
}
