//! cpal output driver
//!
//! Runs the mono mix on cpal's audio thread and writes it to every channel
//! of an f32 output stream.
//!
//! ```text
//! ┌──────────────────┐  register/unregister  ┌─────────────────────┐
//! │  control thread  │──────(mutex)─────────►│   callback slot     │
//! └──────────────────┘                       └──────────┬──────────┘
//!                                                       │ try_lock
//!                                                       ▼
//!                                            ┌─────────────────────┐
//!                                            │  cpal audio thread  │
//!                                            │  i16 scratch → f32  │
//!                                            └─────────────────────┘
//! ```
//!
//! The audio thread only ever `try_lock`s the slot. If the control thread is
//! swapping callbacks at that moment the buffer is silence instead of a
//! stall.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, Stream, StreamConfig, SupportedStreamConfig};

use crate::config::{MixerConfig, MAX_BUFFER_FRAMES};
use crate::error::{MixerError, MixerResult};
use crate::types::{MixMode, Sample};

use super::device::find_output_device;
use super::driver::{AudioDriver, ChannelId, RenderCallback};

const CHANNEL: ChannelId = ChannelId(0);

#[derive(Default)]
struct CallbackSlot {
    callback: Mutex<Option<Box<dyn RenderCallback>>>,
    busy: AtomicBool,
}

impl CallbackSlot {
    fn callback(&self) -> MutexGuard<'_, Option<Box<dyn RenderCallback>>> {
        self.callback.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Audio output through the platform's default (or a named) cpal device
pub struct CpalDriver {
    device: cpal::Device,
    device_name: String,
    stream_config: StreamConfig,
    slot: Arc<CallbackSlot>,
    stream: Option<Stream>,
    acquired: bool,
}

impl CpalDriver {
    /// Open the configured device without starting a stream
    pub fn open(config: &MixerConfig) -> MixerResult<Self> {
        let device = find_output_device(config.device.as_deref())?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        log::info!("CpalDriver: using device {}", device_name);

        let supported = pick_output_config(&device, config.output_rate)?;
        let stream_config = StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size: BufferSize::Fixed(config.buffer_frames),
        };

        log::info!(
            "CpalDriver: {} channels, {}Hz, {} frames (~{:.1}ms)",
            stream_config.channels,
            stream_config.sample_rate.0,
            config.buffer_frames,
            config.buffer_frames as f32 / stream_config.sample_rate.0 as f32 * 1000.0
        );

        Ok(Self {
            device,
            device_name,
            stream_config,
            slot: Arc::new(CallbackSlot::default()),
            stream: None,
            acquired: false,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn channels(&self) -> u16 {
        self.stream_config.channels
    }

    fn build_stream(&self) -> MixerResult<Stream> {
        let slot = Arc::clone(&self.slot);
        let channels = self.stream_config.channels as usize;
        let mut scratch: Vec<Sample> = vec![0; MAX_BUFFER_FRAMES];

        self.device
            .build_output_stream(
                &self.stream_config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    slot.busy.store(true, Ordering::Release);

                    let frames = (data.len() / channels).min(scratch.len());
                    let produced = match slot.callback.try_lock() {
                        Ok(mut guard) => match guard.as_mut() {
                            Some(callback) => callback.generate(&mut scratch[..frames], MixMode::Overwrite),
                            None => 0,
                        },
                        Err(_) => 0,
                    };

                    // Mono to every channel, silence past what was produced
                    for (i, frame) in data.chunks_mut(channels).enumerate() {
                        let value = if i < produced {
                            scratch[i] as f32 / 32768.0
                        } else {
                            0.0
                        };
                        frame.fill(value);
                    }

                    slot.busy.store(false, Ordering::Release);
                },
                move |err| {
                    log::error!("CpalDriver: stream error: {}", err);
                },
                None,
            )
            .map_err(|e| MixerError::Stream(e.to_string()))
    }
}

/// Choose an f32 output config, preferring the requested rate
fn pick_output_config(
    device: &cpal::Device,
    requested_rate: Option<u32>,
) -> MixerResult<SupportedStreamConfig> {
    let default = device
        .default_output_config()
        .map_err(|e| MixerError::NoDevice(e.to_string()))?;
    let target_rate = requested_rate.unwrap_or(default.sample_rate().0);

    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| MixerError::Stream(e.to_string()))?
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .collect();

    let in_range = supported.iter().find(|c| {
        target_rate >= c.min_sample_rate().0 && target_rate <= c.max_sample_rate().0
    });

    match in_range {
        Some(range) => Ok(range.clone().with_sample_rate(cpal::SampleRate(target_rate))),
        None => match supported.first() {
            Some(range) => {
                let fallback = range.max_sample_rate();
                log::warn!(
                    "CpalDriver: device doesn't support {}Hz, falling back to {}Hz",
                    target_rate,
                    fallback.0
                );
                Ok(range.clone().with_sample_rate(fallback))
            }
            None => Err(MixerError::Stream("device has no f32 output config".to_string())),
        },
    }
}

impl AudioDriver for CpalDriver {
    fn output_rate(&self) -> u32 {
        self.stream_config.sample_rate.0
    }

    fn acquire_channel(&mut self) -> MixerResult<ChannelId> {
        if self.acquired {
            return Err(MixerError::ChannelUnavailable);
        }
        self.acquired = true;
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
        let stream = self.build_stream()?;
        stream
            .play()
            .map_err(|e| MixerError::Stream(e.to_string()))?;
        self.stream = Some(stream);
        log::info!("CpalDriver: stream started");
        Ok(())
    }

    fn stop(&mut self, _channel: ChannelId) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::warn!("CpalDriver: pause failed: {}", e);
            }
            log::info!("CpalDriver: stream stopped");
        }
    }

    fn is_busy(&self, _channel: ChannelId) -> bool {
        self.slot.busy.load(Ordering::Acquire)
    }

    fn release_channel(&mut self, _channel: ChannelId) {
        self.acquired = false;
    }
}
