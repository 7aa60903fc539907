//! Looping decode-and-resample source
//!
//! The decode service thread calls [`StreamingDecoder::poll`] to pull raw PCM
//! from a [`PcmFile`], run it through a rate converter and push the result
//! into a [`SampleRing`]. The audio thread drains the ring from `mix`. When
//! the file runs out it is rewound, so the stream never ends by itself; the
//! owner removes it explicitly.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::dsp::{open_converter, RateConverter, ResampleQuality, MIN_STAGING};
use crate::file::PcmFile;
use crate::types::{Mixed, Sample, UNITY_VOLUME};

use super::ring::SampleRing;
use super::Source;

/// Everything the producer side touches
///
/// Only the decode service thread locks this, so the lock is never contended
/// with the audio thread.
struct DecodeState {
    file: Box<dyn PcmFile>,
    /// Raw samples at the file's rate, `staging[..filled]` valid
    staging: Vec<Sample>,
    filled: usize,
    /// Created on first use, replaced when the file's rate changes
    converter: Option<Box<dyn RateConverter>>,
    /// Converter output before it is stored into the ring
    converted: Vec<Sample>,
    output_rate: u32,
    quality: ResampleQuality,
}

impl DecodeState {
    /// Top up staging until it is more than half full or the file wraps
    fn fill_staging(&mut self) -> bool {
        let mut worked = false;
        let half = self.staging.len() / 2;

        while self.filled <= half {
            match self.file.read(&mut self.staging[self.filled..]) {
                Ok(0) => {
                    // Loop forever; an empty file just rewinds once per poll
                    if let Err(e) = self.file.rewind() {
                        log::warn!("StreamingDecoder: rewind failed: {}", e);
                    }
                    break;
                }
                Ok(n) => {
                    self.filled += n;
                    worked = true;
                }
                Err(e) => {
                    log::warn!("StreamingDecoder: read failed: {}", e);
                    break;
                }
            }
        }

        worked
    }

    /// Make sure the converter matches the file's current rate
    fn refresh_converter(&mut self) {
        let in_rate = self.file.rate();
        let stale = self
            .converter
            .as_ref()
            .map_or(true, |c| c.rates() != (in_rate, self.output_rate));

        if stale {
            match open_converter(in_rate, self.output_rate, self.quality) {
                Ok(converter) => {
                    log::debug!(
                        "StreamingDecoder: converter {}Hz -> {}Hz",
                        in_rate,
                        self.output_rate
                    );
                    self.converter = Some(converter);
                }
                Err(e) => {
                    log::warn!("StreamingDecoder: {}", e);
                    self.converter = None;
                }
            }
        }
    }
}

/// Continuously decoded, looping stream
pub struct StreamingDecoder {
    ring: SampleRing,
    state: Mutex<DecodeState>,
    volume: AtomicI32,
}

impl StreamingDecoder {
    /// Stream `file` at `output_rate`
    ///
    /// # Arguments
    ///
    /// * `file` - PCM to loop; rewound every time it runs out
    /// * `output_rate` - Rate the ring is filled at, normally the driver's
    /// * `ring_capacity` - Ring size in samples (one slot stays unused); bounds
    ///   the latency between decode and playback
    /// * `staging_size` - Raw read chunk, raised to [`MIN_STAGING`] if smaller
    /// * `quality` - Interpolation used when the file's rate differs
    ///
    /// # Panics
    ///
    /// If `ring_capacity` is below 2.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let file = SymphoniaFile::open("music.ogg")?;
    /// let stream = StreamingDecoder::new(Box::new(file), 44100, 0x8000, 0x2000, ResampleQuality::Fast);
    /// stream.set_volume(0x80);
    /// manager.play(Box::new(stream))?;
    /// ```
    pub fn new(
        file: Box<dyn PcmFile>,
        output_rate: u32,
        ring_capacity: usize,
        staging_size: usize,
        quality: ResampleQuality,
    ) -> Self {
        let ring = SampleRing::new(ring_capacity);
        let converted = vec![0; ring.capacity()];

        Self {
            ring,
            state: Mutex::new(DecodeState {
                file,
                staging: vec![0; staging_size.max(MIN_STAGING)],
                filled: 0,
                converter: None,
                converted,
                output_rate,
                quality,
            }),
            volume: AtomicI32::new(UNITY_VOLUME),
        }
    }

    /// Set the 8.8 fixed-point playback volume
    pub fn set_volume(&self, volume: i32) {
        self.volume.store(volume, Ordering::Relaxed);
    }

    pub fn volume(&self) -> i32 {
        self.volume.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Resampled samples waiting to be mixed
    pub fn buffered(&self) -> usize {
        self.ring.readable()
    }

    fn lock_state(&self) -> MutexGuard<'_, DecodeState> {
        // A panic mid-poll leaves nothing half-published in the ring
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Source for StreamingDecoder {
    fn mix(&self, out: &mut [Sample], additive: bool) -> Mixed {
        Mixed::more(self.ring.mix_into(out, additive, self.volume()))
    }

    fn pollable(&self) -> bool {
        true
    }

    fn set_volume(&self, volume: i32) {
        self.volume.store(volume, Ordering::Relaxed);
    }

    fn poll(&self) -> bool {
        let mut guard = self.lock_state();
        let state = &mut *guard;

        let mut worked = state.fill_staging();

        let space = self.ring.writable();
        if space == 0 || state.filled == 0 {
            return worked;
        }

        let filled = state.filled;
        state.refresh_converter();
        let Some(converter) = state.converter.as_mut() else {
            return worked;
        };
        let (consumed, produced) =
            converter.process(&state.staging[..filled], &mut state.converted[..space]);

        let stored = self.ring.write(&state.converted[..produced]);
        debug_assert_eq!(stored, produced);

        state.staging.copy_within(consumed..filled, 0);
        state.filled -= consumed;

        worked |= consumed > 0 || produced > 0;
        worked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SharedBuffer;
    use crate::error::{MixerError, MixerResult};
    use crate::file::RawFile;

    fn raw(samples: &[Sample], rate: u32) -> Box<dyn PcmFile> {
        Box::new(RawFile::new(SharedBuffer::from_samples(samples), rate))
    }

    #[test]
    fn test_empty_file_polls_without_spinning() {
        let stream = StreamingDecoder::new(raw(&[], 44100), 44100, 64, 16, ResampleQuality::Fast);
        assert!(!stream.poll());
        assert!(!stream.poll());

        let mut out = [7; 8];
        assert_eq!(stream.mix(&mut out, false), Mixed::more(0));
        assert_eq!(out, [7; 8]);
    }

    #[test]
    fn test_loops_forever_at_equal_rates() {
        let stream = StreamingDecoder::new(raw(&[1, 2, 3], 8000), 8000, 16, 8, ResampleQuality::Fast);
        while stream.poll() && stream.buffered() < 9 {}

        let mut out = [0; 9];
        assert_eq!(stream.mix(&mut out, false), Mixed::more(9));
        assert_eq!(out, [1, 2, 3, 1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn test_ring_never_overfills() {
        let stream = StreamingDecoder::new(raw(&[5; 100], 8000), 8000, 32, 16, ResampleQuality::Fast);
        for _ in 0..20 {
            stream.poll();
        }
        assert_eq!(stream.buffered(), 31);

        // Draining frees exactly the slots that get refilled
        let mut out = [0; 10];
        assert_eq!(stream.mix(&mut out, false), Mixed::more(10));
        assert!(stream.poll());
        assert_eq!(stream.buffered(), 31);
    }

    #[test]
    fn test_volume_applies_to_mix() {
        let stream = StreamingDecoder::new(raw(&[400; 4], 8000), 8000, 16, 8, ResampleQuality::Fast);
        stream.set_volume(0x80);
        assert_eq!(stream.volume(), 0x80);
        stream.poll();

        let mut out = [0; 4];
        stream.mix(&mut out, false);
        assert_eq!(out, [200; 4]);
    }

    #[test]
    fn test_resamples_to_output_rate() {
        let stream = StreamingDecoder::new(raw(&[1000; 4096], 22050), 44100, 0x2000, 0x800, ResampleQuality::Fast);
        for _ in 0..8 {
            stream.poll();
        }
        // Upsampling by two yields roughly twice what was consumed
        assert!(stream.buffered() > 1024, "buffered {}", stream.buffered());
    }

    #[test]
    fn test_small_staging_still_resamples() {
        let stream = StreamingDecoder::new(raw(&[1000; 4096], 22050), 44100, 0x2000, 128, ResampleQuality::Fast);
        let worked = (0..50).filter(|_| stream.poll()).count();
        assert!(worked > 1, "only {} productive polls", worked);
        assert!(stream.buffered() > 0);
    }

    struct RateSwitch {
        calls: usize,
    }

    impl PcmFile for RateSwitch {
        fn read(&mut self, out: &mut [Sample]) -> MixerResult<usize> {
            self.calls += 1;
            let n = out.len().min(300);
            out[..n].fill(100);
            Ok(n)
        }

        fn rate(&self) -> u32 {
            if self.calls > 2 {
                16000
            } else {
                8000
            }
        }

        fn rewind(&mut self) -> MixerResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_converter_follows_rate_change() {
        let stream = StreamingDecoder::new(
            Box::new(RateSwitch { calls: 0 }),
            8000,
            0x1000,
            0x400,
            ResampleQuality::Fast,
        );
        stream.poll();
        assert_eq!(stream.lock_state().converter.as_ref().unwrap().rates(), (8000, 8000));

        let mut out = vec![0; 0x1000];
        stream.mix(&mut out, false);
        stream.poll();
        assert_eq!(stream.lock_state().converter.as_ref().unwrap().rates(), (16000, 8000));
    }

    struct Broken;

    impl PcmFile for Broken {
        fn read(&mut self, _out: &mut [Sample]) -> MixerResult<usize> {
            Err(MixerError::Read("device gone".into()))
        }

        fn rate(&self) -> u32 {
            8000
        }

        fn rewind(&mut self) -> MixerResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_read_error_is_not_work() {
        let stream = StreamingDecoder::new(Box::new(Broken), 8000, 16, 8, ResampleQuality::Fast);
        assert!(!stream.poll());
        assert_eq!(stream.buffered(), 0);
    }
}
