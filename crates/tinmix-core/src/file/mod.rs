//! PCM producers
//!
//! A `PcmFile` is anything that can hand out mono 16-bit samples at a fixed
//! rate and start over from the beginning. The mixer never parses containers
//! itself; it only sees this trait.
//!
//! - [`RawFile`]: raw native-endian PCM held in a [`SharedBuffer`](crate::SharedBuffer)
//! - [`SymphoniaFile`]: any container/codec symphonia can open, downmixed to mono

mod raw;
mod codec;

pub use self::raw::RawFile;
pub use self::codec::SymphoniaFile;

use crate::error::MixerResult;
use crate::types::Sample;

/// Source of raw mono PCM
pub trait PcmFile: Send {
    /// Fill `out` with up to `out.len()` samples
    ///
    /// Returns the number of samples written; `Ok(0)` means end of data.
    fn read(&mut self, out: &mut [Sample]) -> MixerResult<usize>;

    /// Sample rate in Hz
    fn rate(&self) -> u32;

    /// Restart from the first sample
    fn rewind(&mut self) -> MixerResult<()>;
}

impl<F: PcmFile + ?Sized> PcmFile for Box<F> {
    fn read(&mut self, out: &mut [Sample]) -> MixerResult<usize> {
        (**self).read(out)
    }

    fn rate(&self) -> u32 {
        (**self).rate()
    }

    fn rewind(&mut self) -> MixerResult<()> {
        (**self).rewind()
    }
}
