//! Driver pumped by hand
//!
//! `ManualDriver` has no device behind it: whoever holds the [`ManualPump`]
//! plays the role of the hardware and pulls buffers whenever it likes. Used
//! by tests and for rendering a mix offline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{MixerError, MixerResult};
use crate::types::{MixMode, Sample};

use super::driver::{AudioDriver, ChannelId, RenderCallback};

/// The only channel a manual driver offers
const CHANNEL: ChannelId = ChannelId(0);

#[derive(Default)]
struct Slot {
    callback: Mutex<Option<Box<dyn RenderCallback>>>,
    started: AtomicBool,
    acquired: AtomicBool,
}

impl Slot {
    fn callback(&self) -> MutexGuard<'_, Option<Box<dyn RenderCallback>>> {
        self.callback.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Single-channel driver without a device
pub struct ManualDriver {
    rate: u32,
    slot: Arc<Slot>,
}

impl ManualDriver {
    pub fn new(rate: u32) -> Self {
        Self {
            rate,
            slot: Arc::new(Slot::default()),
        }
    }

    /// Handle that drives the registered callback
    pub fn pump(&self) -> ManualPump {
        ManualPump {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl AudioDriver for ManualDriver {
    fn output_rate(&self) -> u32 {
        self.rate
    }

    fn acquire_channel(&mut self) -> MixerResult<ChannelId> {
        if self.slot.acquired.swap(true, Ordering::AcqRel) {
            return Err(MixerError::ChannelUnavailable);
        }
        Ok(CHANNEL)
    }

    fn register(&mut self, _channel: ChannelId, callback: Box<dyn RenderCallback>) -> MixerResult<()> {
        *self.slot.callback() = Some(callback);
        Ok(())
    }

    fn unregister(&mut self, _channel: ChannelId) {
        let previous = self.slot.callback().take();
        drop(previous);
    }

    fn start(&mut self, _channel: ChannelId) -> MixerResult<()> {
        self.slot.started.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&mut self, _channel: ChannelId) {
        self.slot.started.store(false, Ordering::Release);
    }

    fn is_busy(&self, _channel: ChannelId) -> bool {
        // `unregister` already waited for any in-flight pump
        false
    }

    fn release_channel(&mut self, _channel: ChannelId) {
        self.slot.acquired.store(false, Ordering::Release);
    }
}

/// Stand-in for the hardware clock of a [`ManualDriver`]
#[derive(Clone)]
pub struct ManualPump {
    slot: Arc<Slot>,
}

impl ManualPump {
    /// Run one callback cycle into `out`
    ///
    /// Returns the number of valid samples, 0 when the channel is stopped
    /// or nothing is registered.
    pub fn pump(&self, out: &mut [Sample], mode: MixMode) -> usize {
        if !self.slot.started.load(Ordering::Acquire) {
            return 0;
        }
        match self.slot.callback().as_mut() {
            Some(callback) => callback.generate(out, mode),
            None => 0,
        }
    }

    pub fn is_started(&self) -> bool {
        self.slot.started.load(Ordering::Acquire)
    }
}
