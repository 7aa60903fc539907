//! Single-producer/single-consumer sample ring
//!
//! Fixed capacity C with independent reader and writer cursors. Equal
//! cursors mean empty; the slot just behind the reader is never written, so
//! at most C - 1 samples are buffered and "full" never looks like "empty".
//!
//! The producer writes only the region ahead of the published writer and
//! publishes with a release store; the consumer reads only behind the writer
//! it acquired and publishes its own cursor the same way. Slots are atomics
//! accessed with relaxed ordering, so the whole exchange is lock-free and
//! contains no unsafe code. Correctness relies on one producer thread and one
//! consumer thread per ring.

use std::sync::atomic::{AtomicI16, AtomicUsize, Ordering};

use crate::dsp;
use crate::types::Sample;

/// Samples staged on the stack per mix call into `dsp::mix`
const MIX_CHUNK: usize = 256;

pub struct SampleRing {
    slots: Box<[AtomicI16]>,
    reader: AtomicUsize,
    writer: AtomicUsize,
}

impl SampleRing {
    /// Create a ring holding at most `capacity - 1` samples
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 2, "ring capacity must be at least 2");
        Self {
            slots: (0..capacity).map(|_| AtomicI16::new(0)).collect(),
            reader: AtomicUsize::new(0),
            writer: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Samples published and not yet consumed
    pub fn readable(&self) -> usize {
        let writer = self.writer.load(Ordering::Acquire);
        let reader = self.reader.load(Ordering::Acquire);
        (writer + self.capacity() - reader) % self.capacity()
    }

    /// Free slots the producer may fill (one slot always stays reserved)
    pub fn writable(&self) -> usize {
        let reader = self.reader.load(Ordering::Acquire);
        let writer = self.writer.load(Ordering::Relaxed);
        (reader + self.capacity() - 1 - writer) % self.capacity()
    }

    /// Producer: append as many of `samples` as fit and publish them
    ///
    /// Returns the number written. Must only be called from the producer thread.
    pub fn write(&self, samples: &[Sample]) -> usize {
        let cap = self.capacity();
        let writer = self.writer.load(Ordering::Relaxed);
        let n = self.writable().min(samples.len());
        if n == 0 {
            return 0;
        }

        // Up to two runs: to the end of storage, then from the start
        let first = n.min(cap - writer);
        for (slot, &s) in self.slots[writer..writer + first].iter().zip(&samples[..first]) {
            slot.store(s, Ordering::Relaxed);
        }
        for (slot, &s) in self.slots[..n - first].iter().zip(&samples[first..n]) {
            slot.store(s, Ordering::Relaxed);
        }

        self.writer.store((writer + n) % cap, Ordering::Release);
        n
    }

    /// Consumer: mix up to `out.len()` published samples into `out`
    ///
    /// Returns the number consumed (0 when nothing is ready). Must only be
    /// called from the consumer thread. Never blocks or allocates.
    pub fn mix_into(&self, out: &mut [Sample], additive: bool, volume: i32) -> usize {
        let cap = self.capacity();
        let writer = self.writer.load(Ordering::Acquire);
        let reader = self.reader.load(Ordering::Relaxed);
        let available = (writer + cap - reader) % cap;
        let n = available.min(out.len());
        if n == 0 {
            return 0;
        }

        let first = n.min(cap - reader);
        self.mix_run(reader, &mut out[..first], additive, volume);
        if n > first {
            self.mix_run(0, &mut out[first..n], additive, volume);
        }

        self.reader.store((reader + n) % cap, Ordering::Release);
        n
    }

    /// Mix one contiguous run of slots starting at `start`
    fn mix_run(&self, start: usize, out: &mut [Sample], additive: bool, volume: i32) {
        let mut chunk = [0 as Sample; MIX_CHUNK];
        for (offset, dst) in (0..out.len()).step_by(MIX_CHUNK).zip(out.chunks_mut(MIX_CHUNK)) {
            let slots = &self.slots[start + offset..start + offset + dst.len()];
            for (c, slot) in chunk.iter_mut().zip(slots) {
                *c = slot.load(Ordering::Relaxed);
            }
            dsp::mix(additive, dst, &chunk[..slots.len()], volume);
        }
    }
}
