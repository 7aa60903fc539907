//! One-shot decoding of a whole file into a [`SharedBuffer`]
//!
//! Used for short clips that are played many times: decode once at the
//! output rate, then hand the buffer to as many
//! [`BufferSource`](crate::source::BufferSource)s as needed.

use crate::buffer::SharedBuffer;
use crate::dsp::{apply_volume, open_converter, resample, ResampleQuality, MIN_STAGING};
use crate::error::{MixerError, MixerResult};
use crate::file::PcmFile;
use crate::types::{Sample, UNITY_VOLUME};

/// Reusable whole-file transcoder
pub struct Decoder {
    output_rate: u32,
    quality: ResampleQuality,
    staging: Vec<Sample>,
}

impl Decoder {
    /// `staging_size` is raised to [`MIN_STAGING`] if smaller
    pub fn new(output_rate: u32, staging_size: usize, quality: ResampleQuality) -> Self {
        Self {
            output_rate,
            quality,
            staging: vec![0; staging_size.max(MIN_STAGING)],
        }
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Decode `file` from its current position to the end
    ///
    /// An empty file gives an empty buffer.
    ///
    /// # Arguments
    ///
    /// * `file` - PCM at any rate; converted to [`output_rate`](Self::output_rate)
    /// * `volume` - 8.8 fixed-point gain baked into the result, or
    ///   [`UNITY_VOLUME`] to keep the samples untouched
    ///
    /// # Errors
    ///
    /// [`MixerError::Read`] if the file fails mid-way, or a resampler error
    /// if the rates cannot be converted.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mut decoder = manager.decoder();
    /// let click = decoder.decode(&mut SymphoniaFile::open("click.wav")?, 0xC0)?;
    /// manager.play_buffer(&click)?;
    /// ```
    pub fn decode(&mut self, file: &mut dyn PcmFile, volume: i32) -> MixerResult<SharedBuffer> {
        let in_rate = file.rate();
        let mut converter = open_converter(in_rate, self.output_rate, self.quality)?;
        let mut output = Vec::new();
        let mut filled = 0;
        let mut total_in = 0;

        loop {
            let read = file.read(&mut self.staging[filled..]).map_err(|e| match e {
                MixerError::Read(_) => e,
                other => MixerError::Read(other.to_string()),
            })?;
            if read == 0 {
                break;
            }
            filled += read;
            total_in += read;
            resample(converter.as_mut(), &mut self.staging, &mut filled, &mut output);
        }

        converter.finish(&self.staging[..filled], &mut output);

        if volume != UNITY_VOLUME {
            apply_volume(&mut output, volume);
        }

        log::debug!(
            "Decoder: {} samples at {}Hz -> {} samples at {}Hz",
            total_in,
            in_rate,
            output.len(),
            self.output_rate
        );

        Ok(SharedBuffer::from_samples(&output))
    }
}
