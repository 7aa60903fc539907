//! Mixing engine - source manager, real-time callback, decode service
//!
//! - [`Manager`]: control-thread API (start/stop/play/stop_source)
//! - `render`: the callback the output driver runs on its real-time thread
//! - `service`: the background thread feeding streaming sources
//! - [`SpinLock`]: owner-tagged lock guarding the shared source lists
//! - `gc`: deferred destruction so the audio thread never frees a source

mod gc;
mod manager;
mod render;
mod service;
mod spinlock;
mod state;

pub use gc::{SharedSource, SourceCollector};
pub use manager::Manager;
pub use spinlock::{LockOwner, SpinGuard, SpinLock};
