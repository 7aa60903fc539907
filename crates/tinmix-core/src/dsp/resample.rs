//! Streaming sample rate conversion
//!
//! The engine treats rate conversion as an opaque primitive: feed it whatever
//! input is staged, take whatever output fits, and keep the unconsumed tail
//! for next time. `RateConverter` is that contract. Two implementations:
//!
//! - [`PassThrough`] for equal rates (exact copy, no latency)
//! - [`RubatoConverter`] wrapping rubato's `FastFixedIn` polynomial resampler
//!
//! Rubato works on fixed input chunks, so the adapter only consumes whole
//! chunks from the caller and buffers any output that did not fit.

use std::collections::VecDeque;

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use serde::{Deserialize, Serialize};

use crate::error::{MixerError, MixerResult};
use crate::types::Sample;

/// Input frames per rubato processing block
const CHUNK_FRAMES: usize = 256;

/// Smallest raw staging buffer a converter is guaranteed to make progress on
///
/// Staging is topped up to just over half full before each conversion, and
/// that half must hold at least one whole block.
pub const MIN_STAGING: usize = 4 * CHUNK_FRAMES;

/// Interpolation quality for rate conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResampleQuality {
    /// Linear interpolation (cheapest)
    #[default]
    Fast,
    /// Cubic polynomial
    Balanced,
    /// Septic polynomial
    High,
}

impl ResampleQuality {
    fn degree(self) -> PolynomialDegree {
        match self {
            ResampleQuality::Fast => PolynomialDegree::Linear,
            ResampleQuality::Balanced => PolynomialDegree::Cubic,
            ResampleQuality::High => PolynomialDegree::Septic,
        }
    }
}

/// Mono streaming rate converter
pub trait RateConverter: Send {
    /// (input rate, output rate) in Hz
    fn rates(&self) -> (u32, u32);

    /// Convert as much of `input` as fits into `output`
    ///
    /// Returns `(consumed, produced)`. Unconsumed input must be offered
    /// again on the next call.
    fn process(&mut self, input: &[Sample], output: &mut [Sample]) -> (usize, usize);

    /// Convert a final partial block and flush internal state into `out`
    fn finish(&mut self, input: &[Sample], out: &mut Vec<Sample>);
}

/// Open a converter for `in_rate` → `out_rate`
pub fn open_converter(
    in_rate: u32,
    out_rate: u32,
    quality: ResampleQuality,
) -> MixerResult<Box<dyn RateConverter>> {
    if in_rate == 0 || out_rate == 0 {
        return Err(MixerError::Resampler(format!(
            "invalid rates {}Hz -> {}Hz",
            in_rate, out_rate
        )));
    }
    if in_rate == out_rate {
        return Ok(Box::new(PassThrough { rate: in_rate }));
    }
    Ok(Box::new(RubatoConverter::new(in_rate, out_rate, quality)?))
}

/// Identity conversion for matching rates
pub struct PassThrough {
    rate: u32,
}

impl PassThrough {
    pub fn new(rate: u32) -> Self {
        Self { rate }
    }
}

impl RateConverter for PassThrough {
    fn rates(&self) -> (u32, u32) {
        (self.rate, self.rate)
    }

    fn process(&mut self, input: &[Sample], output: &mut [Sample]) -> (usize, usize) {
        let n = input.len().min(output.len());
        output[..n].copy_from_slice(&input[..n]);
        (n, n)
    }

    fn finish(&mut self, input: &[Sample], out: &mut Vec<Sample>) {
        out.extend_from_slice(input);
    }
}

/// Polynomial resampler backed by rubato
pub struct RubatoConverter {
    inner: FastFixedIn<f32>,
    in_rate: u32,
    out_rate: u32,
    /// One input block converted to f32
    scratch_in: Vec<f32>,
    /// One output block from rubato
    scratch_out: Vec<f32>,
    /// Converted samples that did not fit in the caller's output yet
    pending: VecDeque<Sample>,
}

impl RubatoConverter {
    pub fn new(in_rate: u32, out_rate: u32, quality: ResampleQuality) -> MixerResult<Self> {
        let inner = FastFixedIn::<f32>::new(
            out_rate as f64 / in_rate as f64,
            1.0, // fixed ratio
            quality.degree(),
            CHUNK_FRAMES,
            1,
        )
        .map_err(|e| MixerError::Resampler(e.to_string()))?;

        let scratch_out = vec![0.0; inner.output_frames_max()];
        log::debug!(
            "RubatoConverter: {}Hz -> {}Hz ({:?})",
            in_rate,
            out_rate,
            quality
        );

        Ok(Self {
            inner,
            in_rate,
            out_rate,
            scratch_in: vec![0.0; CHUNK_FRAMES],
            scratch_out,
            pending: VecDeque::new(),
        })
    }

    /// Move buffered output into `output`, returning how many were written
    fn drain_pending(&mut self, output: &mut [Sample]) -> usize {
        let n = self.pending.len().min(output.len());
        for (slot, sample) in output.iter_mut().zip(self.pending.drain(..n)) {
            *slot = sample;
        }
        n
    }

    fn push_output(&mut self, frames: usize) {
        self.pending
            .extend(self.scratch_out[..frames].iter().map(|&v| to_sample(v)));
    }

    fn load_input(&mut self, input: &[Sample]) {
        for (dst, &src) in self.scratch_in.iter_mut().zip(input) {
            *dst = to_float(src);
        }
    }
}

impl RateConverter for RubatoConverter {
    fn rates(&self) -> (u32, u32) {
        (self.in_rate, self.out_rate)
    }

    fn process(&mut self, input: &[Sample], output: &mut [Sample]) -> (usize, usize) {
        let mut consumed = 0;
        let mut produced = 0;

        loop {
            produced += self.drain_pending(&mut output[produced..]);
            if produced == output.len() {
                break;
            }

            let need = self.inner.input_frames_next();
            if input.len() - consumed < need {
                break;
            }

            self.load_input(&input[consumed..consumed + need]);
            match self.inner.process_into_buffer(
                &[&self.scratch_in[..need]],
                &mut [&mut self.scratch_out[..]],
                None,
            ) {
                Ok((_, frames)) => {
                    consumed += need;
                    self.push_output(frames);
                }
                Err(e) => {
                    log::warn!("RubatoConverter: process failed: {}", e);
                    break;
                }
            }
        }

        (consumed, produced)
    }

    fn finish(&mut self, input: &[Sample], out: &mut Vec<Sample>) {
        out.extend(self.pending.drain(..));

        // Whole blocks first, then the short tail through the partial path
        let mut offset = 0;
        for block in input.chunks(CHUNK_FRAMES) {
            self.load_input(block);
            let wave_in: &[&[f32]] = &[&self.scratch_in[..block.len()]];
            let wave_out: &mut [&mut [f32]] = &mut [&mut self.scratch_out[..]];
            let result = if block.len() == CHUNK_FRAMES {
                self.inner.process_into_buffer(wave_in, wave_out, None)
            } else {
                self.inner
                    .process_partial_into_buffer(Some(wave_in), wave_out, None)
            };
            match result {
                Ok((_, frames)) => self.push_output(frames),
                Err(e) => {
                    log::warn!("RubatoConverter: flush failed at {}: {}", offset, e);
                    break;
                }
            }
            offset += block.len();
        }

        // Push out whatever is still held in the interpolation window
        match self.inner.process_partial_into_buffer(
            None::<&[&[f32]]>,
            &mut [&mut self.scratch_out[..]],
            None,
        ) {
            Ok((_, frames)) => self.push_output(frames),
            Err(e) => log::warn!("RubatoConverter: final flush failed: {}", e),
        }

        out.extend(self.pending.drain(..));
    }
}

#[inline]
fn to_float(sample: Sample) -> f32 {
    sample as f32 / 32768.0
}

#[inline]
fn to_sample(value: f32) -> Sample {
    (value * 32768.0).round().clamp(-32768.0, 32767.0) as Sample
}

/// Run staged input through a converter, appending to `out`
///
/// Feeds every staged sample in `staging[..*filled]`, appends the produced
/// samples to `out`, then compacts the unconsumed remainder to the front of
/// `staging` and updates `filled`. Returns the number of input samples
/// consumed.
pub fn resample(
    converter: &mut dyn RateConverter,
    staging: &mut [Sample],
    filled: &mut usize,
    out: &mut Vec<Sample>,
) -> usize {
    let (in_rate, out_rate) = converter.rates();
    let mut consumed = 0;

    loop {
        let remaining = *filled - consumed;
        let estimate = (remaining as u64 * out_rate as u64 / in_rate as u64) as usize + CHUNK_FRAMES;
        let start = out.len();
        out.resize(start + estimate, 0);

        let (used, produced) = converter.process(&staging[consumed..*filled], &mut out[start..]);
        out.truncate(start + produced);
        consumed += used;

        // Output space ran out before input did: go around again
        if produced < estimate {
            break;
        }
    }

    staging.copy_within(consumed..*filled, 0);
    *filled -= consumed;
    consumed
}
