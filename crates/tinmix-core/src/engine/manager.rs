//! Source manager
//!
//! The manager is the control-thread face of the engine. It owns the output
//! driver, the bounded set of active sources and the decode service thread.
//!
//! # Threads
//!
//! ```text
//!  control thread            decode service              audio thread
//!  ──────────────            ──────────────              ────────────
//!  play() ──push──► active ◄──────────────────────────── snapshot, mix
//!         ──push──► polled ──snapshot on version bump──► poll()
//!                   pending ◄───────── finished ──────── move under lock
//!  reap() ◄─swap─── pending
//!    └─ drop + collect (destructors run here)
//! ```
//!
//! One spinlock guards all three lists. It is held only across
//! allocation-free `Vec` operations, never while a source runs.
//!
//! # Lifetime of a source
//!
//! Sources passed to [`Manager::play`] become manager-owned and are destroyed
//! during a reap on the control thread once they finish or are stopped. To
//! keep a handle yourself, pass an `Arc<S>`: the manager then only releases
//! its reference (see [`Source::owned`]).
//!
//! # Loop track
//!
//! One streaming source can be designated the loop track (background music)
//! with [`Manager::play_loop`]. Starting a new loop retires the previous one,
//! and [`Manager::set_loop_volume`] applies to whichever stream is current and
//! to every later one.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::audio::{AudioDriver, ChannelId};
use crate::buffer::SharedBuffer;
use crate::config::MixerConfig;
use crate::decoder::Decoder;
use crate::error::{MixerError, MixerResult};
use crate::file::PcmFile;
use crate::source::{BufferSource, Source, StreamingDecoder};
use crate::types::{SourceId, UNITY_VOLUME};

use super::gc::SourceCollector;
use super::render::Renderer;
use super::service;
use super::spinlock::LockOwner;
use super::state::{EngineShared, Entry};

pub struct Manager<D: AudioDriver> {
    driver: D,
    config: MixerConfig,
    output_rate: u32,
    shared: Arc<EngineShared>,
    gc: SourceCollector,
    /// Spare queue swapped with `pending` during a reap
    reaped: Vec<Entry>,
    next_id: u64,
    channel: Option<ChannelId>,
    service: Option<JoinHandle<()>>,
    /// Current loop track, kept so its volume can change while it plays
    looping: Option<Entry>,
    loop_volume: i32,
}

impl<D: AudioDriver> Manager<D> {
    /// Create a stopped manager driving `driver`
    pub fn new(driver: D, config: MixerConfig) -> MixerResult<Self> {
        config.validate()?;
        let output_rate = driver.output_rate();
        let limit = config.max_sources;

        log::info!(
            "Manager: {} sources max, output {}Hz",
            limit,
            output_rate
        );

        Ok(Self {
            driver,
            output_rate,
            shared: Arc::new(EngineShared::new(limit)),
            gc: SourceCollector::new(),
            reaped: Vec::with_capacity(limit),
            next_id: 1,
            channel: None,
            service: None,
            looping: None,
            loop_volume: UNITY_VOLUME,
            config,
        })
    }

    /// Acquire an output channel, start mixing and spawn the decode service
    ///
    /// # Panics
    ///
    /// If the manager is already running.
    pub fn start(&mut self) -> MixerResult<()> {
        assert!(!self.is_running(), "Manager::start called while running");

        self.reap();
        self.shared.reset_poll_version();

        let channel = self.driver.acquire_channel()?;
        let renderer = Renderer::new(Arc::clone(&self.shared));
        if let Err(e) = self.driver.register(channel, Box::new(renderer)) {
            self.driver.release_channel(channel);
            return Err(e);
        }
        if let Err(e) = self.driver.start(channel) {
            self.driver.unregister(channel);
            self.driver.release_channel(channel);
            return Err(e);
        }

        let shared = Arc::clone(&self.shared);
        let idle_sleep = self.config.idle_sleep();
        let spawned = thread::Builder::new()
            .name(service::THREAD_NAME.to_string())
            .spawn(move || service::run(shared, idle_sleep));

        match spawned {
            Ok(handle) => {
                self.service = Some(handle);
                self.channel = Some(channel);
                log::info!("Manager: started on {}", channel);
                Ok(())
            }
            Err(e) => {
                self.driver.unregister(channel);
                self.driver.stop(channel);
                self.driver.release_channel(channel);
                Err(MixerError::ThreadSpawn(e.to_string()))
            }
        }
    }

    /// Stop mixing and join the decode service
    ///
    /// With `wait_for_drain` the driver is given up to
    /// `drain_retries × drain_interval` to leave its callback. Active sources
    /// stay active and resume on the next [`start`](Self::start). Does
    /// nothing when not running.
    pub fn stop(&mut self, wait_for_drain: bool) {
        let Some(channel) = self.channel.take() else {
            return;
        };

        self.shared.request_stop();
        self.driver.unregister(channel);
        self.driver.stop(channel);

        if wait_for_drain {
            let mut retries = 0;
            while self.driver.is_busy(channel) && retries < self.config.drain_retries {
                thread::sleep(self.config.drain_interval());
                retries += 1;
            }
            if self.driver.is_busy(channel) {
                log::warn!("Manager: driver still busy after {} retries", retries);
            }
        }

        if let Some(handle) = self.service.take() {
            if handle.join().is_err() {
                log::error!("Manager: decode service panicked");
            }
        }

        self.reap();
        self.driver.release_channel(channel);
        log::info!("Manager: stopped");
    }

    /// Start playing `source`
    ///
    /// Finished and stopped sources are reaped first, so their slots are
    /// free again.
    ///
    /// # Arguments
    ///
    /// * `source` - Boxed source; manager-owned unless it is an `Arc<S>`
    ///
    /// # Returns
    ///
    /// The id to pass to [`stop_source`](Self::stop_source), or
    /// [`MixerError::CapacityExhausted`] when every slot is taken. A rejected
    /// source is dropped before returning.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let stream = manager.streaming_decoder(Box::new(SymphoniaFile::open("rain.ogg")?));
    /// let id = manager.play(Box::new(stream))?;
    /// // ...
    /// manager.stop_source(id);
    /// ```
    pub fn play(&mut self, source: Box<dyn Source>) -> MixerResult<SourceId> {
        self.insert(source).map(|entry| entry.id)
    }

    /// Register `source`, returning a clone of its entry
    fn insert(&mut self, source: Box<dyn Source>) -> MixerResult<Entry> {
        self.reap();

        let limit = self.shared.limit;
        if self.active_count() >= limit {
            log::warn!("Manager: rejecting source, {} already active", limit);
            drop(source);
            return Err(MixerError::CapacityExhausted { limit });
        }

        let id = SourceId(self.next_id);
        self.next_id += 1;

        let entry = Entry {
            id,
            pollable: source.pollable(),
            owned: source.owned(),
            source: self.gc.share(source),
        };
        let pollable = entry.pollable;

        {
            let mut state = self.shared.state.lock(LockOwner::CONTROL);
            if pollable {
                state.polled.push(entry.clone());
            }
            state.active.push(entry.clone());
        }

        if pollable {
            self.shared.bump_poll_version();
        }

        log::debug!(
            "Manager: playing {} ({})",
            id,
            if pollable { "streaming" } else { "buffer" }
        );
        Ok(entry)
    }

    /// Play a pre-decoded clip once
    pub fn play_buffer(&mut self, buffer: &SharedBuffer) -> MixerResult<SourceId> {
        self.play(Box::new(BufferSource::new(buffer.clone())))
    }

    /// Remove a source before it finishes
    ///
    /// Returns false if `id` is not active (unknown, finished or already
    /// stopped).
    pub fn stop_source(&mut self, id: SourceId) -> bool {
        let retired = loop {
            let mut state = self.shared.state.lock(LockOwner::CONTROL);
            if state.retire(id) {
                break true;
            }
            if !state.pending_full() {
                break false;
            }
            drop(state);
            self.reap();
        };

        if retired {
            if self.looping.as_ref().is_some_and(|l| l.id == id) {
                self.looping = None;
            }
            self.reap();
        }
        retired
    }

    /// Make `file` the loop track, replacing the current one
    ///
    /// The new stream starts at the current [`loop_volume`](Self::loop_volume).
    /// The previous loop is stopped first, so switching never needs a spare
    /// slot.
    ///
    /// # Example
    ///
    /// ```ignore
    /// manager.play_loop(Box::new(SymphoniaFile::open("menu.ogg")?))?;
    /// manager.set_loop_volume(0x80);
    /// // entering a level
    /// manager.play_loop(Box::new(SymphoniaFile::open("level1.ogg")?))?;
    /// ```
    pub fn play_loop(&mut self, file: Box<dyn PcmFile>) -> MixerResult<SourceId> {
        self.stop_loop();

        let stream = self.streaming_decoder(file);
        stream.set_volume(self.loop_volume);
        let entry = self.insert(Box::new(stream))?;
        let id = entry.id;
        self.looping = Some(entry);

        log::info!("Manager: loop track is now {}", id);
        Ok(id)
    }

    /// Stop the loop track; returns false if there was none
    pub fn stop_loop(&mut self) -> bool {
        match self.looping.take() {
            Some(entry) => {
                let id = entry.id;
                drop(entry);
                self.stop_source(id)
            }
            None => false,
        }
    }

    /// Set the 8.8 fixed-point volume of the current and future loop tracks
    pub fn set_loop_volume(&mut self, volume: i32) {
        self.loop_volume = volume;
        if let Some(entry) = &self.looping {
            entry.source.set_volume(volume);
        }
    }

    pub fn loop_volume(&self) -> i32 {
        self.loop_volume
    }

    /// Id of the current loop track
    pub fn loop_id(&self) -> Option<SourceId> {
        self.looping.as_ref().map(|entry| entry.id)
    }

    /// Destroy or release everything the audio thread has retired
    ///
    /// Always collects, even with nothing pending: a source removed earlier
    /// may only now have lost its last handle in the decode service.
    fn reap(&mut self) {
        let swapped = {
            let mut state = self.shared.state.lock(LockOwner::CONTROL);
            if state.pending.is_empty() {
                false
            } else {
                std::mem::swap(&mut state.pending, &mut self.reaped);
                let reaped = &self.reaped;
                state
                    .polled
                    .retain(|polled| !reaped.iter().any(|r| r.id == polled.id));
                true
            }
        };

        if swapped {
            self.shared.bump_poll_version();

            for entry in self.reaped.drain(..) {
                if entry.owned {
                    log::debug!("Manager: destroying {}", entry.id);
                } else {
                    log::debug!("Manager: releasing {}", entry.id);
                }
            }
        }
        self.gc.collect();
    }

    pub fn is_running(&self) -> bool {
        self.channel.is_some()
    }

    pub fn active_count(&self) -> usize {
        self.shared.state.lock(LockOwner::CONTROL).active.len()
    }

    /// Sources the decode service polls (includes finished ones not yet reaped)
    pub fn poll_count(&self) -> usize {
        self.shared.state.lock(LockOwner::CONTROL).polled.len()
    }

    /// Finished or stopped sources waiting for a reap
    pub fn pending_count(&self) -> usize {
        self.shared.state.lock(LockOwner::CONTROL).pending.len()
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    pub fn max_sources(&self) -> usize {
        self.shared.limit
    }

    pub fn config(&self) -> &MixerConfig {
        &self.config
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// One-shot decoder targeting this manager's output rate
    pub fn decoder(&self) -> Decoder {
        Decoder::new(self.output_rate, self.config.staging_size, self.config.quality)
    }

    /// Streaming source for `file` sized from the config
    pub fn streaming_decoder(&self, file: Box<dyn PcmFile>) -> StreamingDecoder {
        StreamingDecoder::new(
            file,
            self.output_rate,
            self.config.ring_capacity,
            self.config.staging_size,
            self.config.quality,
        )
    }
}

impl<D: AudioDriver> Drop for Manager<D> {
    fn drop(&mut self) {
        self.stop(true);
        self.looping = None;

        let (active, polled, pending) = {
            let mut state = self.shared.state.lock(LockOwner::CONTROL);
            (
                std::mem::take(&mut state.active),
                std::mem::take(&mut state.polled),
                std::mem::take(&mut state.pending),
            )
        };
        drop((active, polled, pending));
        self.gc.collect();
    }
}
