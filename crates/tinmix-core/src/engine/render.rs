//! Real-time mixing callback
//!
//! Each cycle copies the active list under the spinlock into a preallocated
//! local array, releases the lock, mixes every source, then briefly re-takes
//! the lock to move finished sources to the pending queue. The lock is never
//! held while a source runs, and nothing here allocates or frees: dropping
//! the local handles at most enqueues a source on the collector.

use std::sync::Arc;

use crate::audio::RenderCallback;
use crate::types::{MixMode, Sample, SourceId};

use super::spinlock::LockOwner;
use super::state::{EngineShared, Entry};

pub(crate) struct Renderer {
    shared: Arc<EngineShared>,
    /// Snapshot of the active list for the current cycle
    sources: Vec<Entry>,
    /// Sources that reported end of stream this cycle
    finished: Vec<SourceId>,
}

impl Renderer {
    pub fn new(shared: Arc<EngineShared>) -> Self {
        let limit = shared.limit;
        Self {
            shared,
            sources: Vec::with_capacity(limit),
            finished: Vec::with_capacity(limit),
        }
    }

    /// Move this cycle's finished sources from active to pending
    ///
    /// Whatever does not fit stays active; a finished source keeps reporting
    /// finished, so it is picked up again next cycle.
    fn retire_finished(&mut self) {
        let mut state = self.shared.state.lock(LockOwner::AUDIO);
        for &id in &self.finished {
            if state.pending_full() {
                break;
            }
            state.retire(id);
        }
    }
}

impl RenderCallback for Renderer {
    fn generate(&mut self, target: &mut [Sample], mode: MixMode) -> usize {
        {
            let state = self.shared.state.lock(LockOwner::AUDIO);
            self.sources.extend(state.active.iter().cloned());
        }

        let mut additive = mode == MixMode::Additive;
        let mut produced = 0;

        for entry in &self.sources {
            let mixed = entry.source.mix(target, additive);
            if !additive {
                // Later sources add on top of silence past the first one's output
                target[mixed.samples..].fill(0);
                additive = true;
            }
            produced = produced.max(mixed.samples);
            if mixed.finished {
                self.finished.push(entry.id);
            }
        }

        if !self.finished.is_empty() {
            self.retire_finished();
            self.finished.clear();
        }
        self.sources.clear();

        produced
    }
}
