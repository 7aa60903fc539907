//! State shared between the manager, the audio callback and the decode service

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::SourceId;

use super::gc::SharedSource;
use super::spinlock::SpinLock;

/// Poll version telling the decode service to exit
pub(crate) const STOP_VERSION: u64 = u64::MAX;

/// One accepted source
#[derive(Clone)]
pub(crate) struct Entry {
    pub id: SourceId,
    pub source: SharedSource,
    pub pollable: bool,
    pub owned: bool,
}

/// Source collections guarded by the spinlock
///
/// All three are allocated once at their final capacity and never pushed
/// past it, so mutating them under the lock never allocates.
pub(crate) struct ActiveState {
    /// Mixed every callback, in play order
    pub active: Vec<Entry>,
    /// Polled by the decode service; may still hold sources already moved
    /// to `pending` until the next reap
    pub polled: Vec<Entry>,
    /// Finished or stopped, waiting to be reaped on the control thread
    pub pending: Vec<Entry>,
    limit: usize,
}

impl ActiveState {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            active: Vec::with_capacity(limit),
            // Every polled source is either active or pending
            polled: Vec::with_capacity(limit * 2),
            pending: Vec::with_capacity(limit),
            limit,
        }
    }

    pub fn pending_full(&self) -> bool {
        self.pending.len() >= self.limit
    }

    /// Move an active source to the pending queue
    ///
    /// Returns false if `id` is not active or the queue has no room.
    pub fn retire(&mut self, id: SourceId) -> bool {
        if self.pending_full() {
            return false;
        }
        match self.active.iter().position(|e| e.id == id) {
            Some(pos) => {
                let entry = self.active.remove(pos);
                self.pending.push(entry);
                true
            }
            None => false,
        }
    }
}

pub(crate) struct EngineShared {
    pub state: SpinLock<ActiveState>,
    pub limit: usize,
    poll_version: AtomicU64,
}

impl EngineShared {
    pub fn new(limit: usize) -> Self {
        Self {
            state: SpinLock::new(ActiveState::with_limit(limit)),
            limit,
            poll_version: AtomicU64::new(0),
        }
    }

    pub fn poll_version(&self) -> u64 {
        self.poll_version.load(Ordering::Acquire)
    }

    /// Tell the decode service the poll set changed
    ///
    /// Never moves the version off the stop sentinel.
    pub fn bump_poll_version(&self) {
        let _ = self
            .poll_version
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                (v != STOP_VERSION).then(|| (v + 1) % STOP_VERSION)
            });
    }

    pub fn request_stop(&self) {
        self.poll_version.store(STOP_VERSION, Ordering::Release);
    }

    pub fn reset_poll_version(&self) {
        self.poll_version.store(0, Ordering::Release);
    }
}
