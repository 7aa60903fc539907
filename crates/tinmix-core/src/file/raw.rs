//! In-memory raw PCM

use crate::buffer::SharedBuffer;
use crate::error::MixerResult;
use crate::types::Sample;

use super::PcmFile;

/// Raw mono PCM served from a shared buffer
#[derive(Debug, Clone)]
pub struct RawFile {
    buffer: SharedBuffer,
    pos: usize,
    rate: u32,
}

impl RawFile {
    pub fn new(buffer: SharedBuffer, rate: u32) -> Self {
        Self { buffer, pos: 0, rate }
    }

    /// Current read position in samples
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl PcmFile for RawFile {
    fn read(&mut self, out: &mut [Sample]) -> MixerResult<usize> {
        let samples = &self.buffer.samples()[self.pos..];
        let n = samples.len().min(out.len());
        out[..n].copy_from_slice(&samples[..n]);
        self.pos += n;
        Ok(n)
    }

    fn rate(&self) -> u32 {
        self.rate
    }

    fn rewind(&mut self) -> MixerResult<()> {
        self.pos = 0;
        Ok(())
    }
}
