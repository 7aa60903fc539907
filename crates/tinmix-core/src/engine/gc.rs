//! Deferred destruction of sources
//!
//! Sources are shared between the control thread, the decode service and the
//! audio callback through `basedrop::Shared` handles instead of `Arc`. If the
//! audio thread happens to drop the last handle, nothing is freed there: the
//! pointer is pushed onto the collector's lock-free queue and the destructor
//! runs the next time the manager collects.
//!
//! Unlike a free-running GC thread, the collector here is owned by the
//! [`Manager`](super::Manager) and only collects while it reaps, so a removed
//! source is always destroyed on the control thread and the moment it happens
//! is deterministic.
//!
//! ```ignore
//! let mut gc = SourceCollector::new();
//! let shared = gc.share(Box::new(BufferSource::new(clip)));
//! let for_audio = shared.clone();
//! drop(shared);
//! drop(for_audio); // may happen on the audio thread: only enqueues
//! gc.collect();    // destructor runs here
//! ```

use basedrop::{Collector, Handle, Shared};

use crate::source::Source;

/// Source handle that is safe to drop on any thread
pub type SharedSource = Shared<Box<dyn Source>>;

pub struct SourceCollector {
    collector: Collector,
    handle: Handle,
}

impl SourceCollector {
    pub fn new() -> Self {
        let collector = Collector::new();
        let handle = collector.handle();
        Self { collector, handle }
    }

    /// Wrap a source so its destruction is deferred to [`Self::collect`]
    pub fn share(&self, source: Box<dyn Source>) -> SharedSource {
        Shared::new(&self.handle, source)
    }

    /// Run every destructor queued since the last call
    pub fn collect(&mut self) {
        self.collector.collect();
    }
}

impl Default for SourceCollector {
    fn default() -> Self {
        Self::new()
    }
}
