//! Background decode service
//!
//! Keeps a private snapshot of the poll set and refreshes it only when the
//! poll version moves. Polls every source once per pass, yields after a busy
//! pass and sleeps after an idle one. Exits when the version is set to the
//! stop sentinel.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::spinlock::LockOwner;
use super::state::{EngineShared, Entry, STOP_VERSION};

pub(crate) const THREAD_NAME: &str = "tinmix-decode";

pub(crate) fn run(shared: Arc<EngineShared>, idle_sleep: Duration) {
    let mut snapshot: Vec<Entry> = Vec::with_capacity(shared.limit * 2);
    let mut seen_version = None;

    log::debug!("decode service: started");

    loop {
        let version = shared.poll_version();
        if version == STOP_VERSION {
            break;
        }

        if seen_version != Some(version) {
            // Release old handles before taking the lock
            snapshot.clear();
            let state = shared.state.lock(LockOwner::SERVICE);
            snapshot.extend(state.polled.iter().cloned());
            drop(state);
            seen_version = Some(version);
        }

        let mut worked = false;
        for entry in &snapshot {
            worked |= entry.source.poll();
        }

        if worked {
            thread::yield_now();
        } else {
            thread::sleep(idle_sleep);
        }
    }

    snapshot.clear();
    log::debug!("decode service: stopped");
}
