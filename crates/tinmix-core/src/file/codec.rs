//! Compressed/containerised audio via symphonia
//!
//! Opens anything the enabled symphonia features can probe (WAV, FLAC, Ogg
//! Vorbis), decodes packet by packet and downmixes to mono 16-bit. Rewinding
//! reopens the file, which is cheaper to get right than seeking every codec.

use std::fs::File;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder as CodecDecoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{MixerError, MixerResult};
use crate::types::Sample;

use super::PcmFile;

/// Probed reader + codec for one pass over the file
struct OpenStream {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn CodecDecoder>,
    track_id: u32,
    rate: u32,
}

fn open_stream(path: &Path) -> MixerResult<OpenStream> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| MixerError::Decode(format!("Failed to probe {:?}: {}", path, e)))?;
    let format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| MixerError::Decode(format!("No audio track in {:?}", path)))?;

    let track_id = track.id;
    let rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| MixerError::Decode(format!("Unknown sample rate in {:?}", path)))?;

    let decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| MixerError::Decode(format!("Failed to create decoder: {}", e)))?;

    Ok(OpenStream {
        format,
        decoder,
        track_id,
        rate,
    })
}

/// Mono PCM decoded on demand from an audio file
pub struct SymphoniaFile {
    path: PathBuf,
    stream: OpenStream,
    /// Downmixed samples of the last decoded packet
    pending: Vec<Sample>,
    pending_pos: usize,
}

impl SymphoniaFile {
    /// Open and probe an audio file
    pub fn open(path: impl AsRef<Path>) -> MixerResult<Self> {
        let path = path.as_ref().to_path_buf();
        let stream = open_stream(&path)?;
        log::info!("SymphoniaFile: opened {:?} at {}Hz", path, stream.rate);
        Ok(Self {
            path,
            stream,
            pending: Vec::new(),
            pending_pos: 0,
        })
    }

    /// Decode the next packet of our track into `pending`
    ///
    /// Returns `Ok(false)` at end of stream.
    fn decode_next(&mut self) -> MixerResult<bool> {
        loop {
            let packet = match self.stream.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => return Ok(false),
                Err(e) => return Err(MixerError::Decode(e.to_string())),
            };

            if packet.track_id() != self.stream.track_id {
                continue;
            }

            match self.stream.decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let channels = spec.channels.count().max(1);
                    let mut interleaved = SampleBuffer::<Sample>::new(decoded.capacity() as u64, spec);
                    interleaved.copy_interleaved_ref(decoded);

                    self.pending.clear();
                    self.pending_pos = 0;
                    self.pending.extend(interleaved.samples().chunks(channels).map(|frame| {
                        let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                        (sum / frame.len() as i32) as Sample
                    }));

                    if !self.pending.is_empty() {
                        return Ok(true);
                    }
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    log::warn!("SymphoniaFile: skipping corrupt packet: {}", e);
                }
                Err(e) => return Err(MixerError::Decode(e.to_string())),
            }
        }
    }
}

impl PcmFile for SymphoniaFile {
    fn read(&mut self, out: &mut [Sample]) -> MixerResult<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        if self.pending_pos == self.pending.len() && !self.decode_next()? {
            return Ok(0);
        }

        let available = &self.pending[self.pending_pos..];
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.pending_pos += n;
        Ok(n)
    }

    fn rate(&self) -> u32 {
        self.stream.rate
    }

    fn rewind(&mut self) -> MixerResult<()> {
        self.stream = open_stream(&self.path)?;
        self.pending.clear();
        self.pending_pos = 0;
        log::debug!("SymphoniaFile: rewound {:?}", self.path);
        Ok(())
    }
}
