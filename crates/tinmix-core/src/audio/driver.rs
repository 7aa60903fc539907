//! Output driver contract
//!
//! The manager never talks to a sound API directly. It asks an
//! [`AudioDriver`] for a channel, hands it a [`RenderCallback`] and starts
//! it. The driver then calls `generate` periodically from its real-time
//! thread with a mono target buffer.

use std::fmt;

use crate::error::MixerResult;
use crate::types::{MixMode, Sample};

/// Output channel handed out by a driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(pub u32);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel#{}", self.0)
    }
}

/// Producer of output samples, called on the real-time thread
pub trait RenderCallback: Send {
    /// Fill up to `target.len()` samples
    ///
    /// In [`MixMode::Overwrite`] the target content is undefined on entry; in
    /// [`MixMode::Additive`] it already holds audio to mix into. Returns how
    /// many leading samples hold valid output; the driver treats the rest as
    /// silence. Must not block, allocate or free.
    fn generate(&mut self, target: &mut [Sample], mode: MixMode) -> usize;
}

/// Platform audio output
pub trait AudioDriver {
    /// Rate in Hz the driver consumes samples at
    fn output_rate(&self) -> u32;

    /// Reserve an output channel
    fn acquire_channel(&mut self) -> MixerResult<ChannelId>;

    /// Install the callback for `channel`, replacing any previous one
    fn register(&mut self, channel: ChannelId, callback: Box<dyn RenderCallback>) -> MixerResult<()>;

    /// Remove and drop the callback for `channel`
    ///
    /// Once this returns the callback is no longer invoked.
    fn unregister(&mut self, channel: ChannelId);

    fn start(&mut self, channel: ChannelId) -> MixerResult<()>;

    fn stop(&mut self, channel: ChannelId);

    /// Whether the real-time thread is still inside a callback for `channel`
    fn is_busy(&self, channel: ChannelId) -> bool;

    fn release_channel(&mut self, channel: ChannelId);
}
