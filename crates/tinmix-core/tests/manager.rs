//! End-to-end behaviour of the manager driven through `ManualDriver`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tinmix_core::audio::{ManualDriver, ManualPump};
use tinmix_core::file::{PcmFile, RawFile};
use tinmix_core::{
    BufferSource, Manager, MixMode, MixerConfig, MixerError, MixerResult, Mixed, Sample,
    SharedBuffer, Source,
};

const RATE: u32 = 8000;

fn manager(limit: usize) -> (Manager<ManualDriver>, ManualPump) {
    let driver = ManualDriver::new(RATE);
    let pump = driver.pump();
    let config = MixerConfig {
        max_sources: limit,
        ring_capacity: 256,
        staging_size: 1024,
        idle_sleep_ms: 1,
        drain_retries: 10,
        drain_interval_ms: 1,
        ..Default::default()
    };
    (Manager::new(driver, config).unwrap(), pump)
}

/// Finite source that counts its own destruction
struct Counted {
    remaining: AtomicUsize,
    drops: Arc<AtomicUsize>,
}

impl Counted {
    fn new(samples: usize, drops: &Arc<AtomicUsize>) -> Box<dyn Source> {
        Box::new(Self {
            remaining: AtomicUsize::new(samples),
            drops: Arc::clone(drops),
        })
    }
}

impl Source for Counted {
    fn mix(&self, out: &mut [Sample], additive: bool) -> Mixed {
        let left = self.remaining.load(Ordering::Relaxed);
        let n = left.min(out.len());
        if !additive {
            out[..n].fill(1);
        }
        self.remaining.store(left - n, Ordering::Relaxed);
        if left == n {
            Mixed::last(n)
        } else {
            Mixed::more(n)
        }
    }

    fn pollable(&self) -> bool {
        false
    }
}

impl Drop for Counted {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Endless pollable source that counts polls and its destruction
struct CountedStream {
    polls: Arc<AtomicUsize>,
    drops: Arc<AtomicUsize>,
}

impl Source for CountedStream {
    fn mix(&self, _out: &mut [Sample], _additive: bool) -> Mixed {
        Mixed::more(0)
    }

    fn pollable(&self) -> bool {
        true
    }

    fn poll(&self) -> bool {
        self.polls.fetch_add(1, Ordering::SeqCst);
        false
    }
}

impl Drop for CountedStream {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Raw PCM that counts when it is closed
struct CountedFile {
    inner: RawFile,
    drops: Arc<AtomicUsize>,
}

impl CountedFile {
    fn new(samples: &[Sample], drops: &Arc<AtomicUsize>) -> Box<dyn PcmFile> {
        Box::new(Self {
            inner: RawFile::new(SharedBuffer::from_samples(samples), RATE),
            drops: Arc::clone(drops),
        })
    }
}

impl PcmFile for CountedFile {
    fn read(&mut self, out: &mut [Sample]) -> MixerResult<usize> {
        self.inner.read(out)
    }

    fn rate(&self) -> u32 {
        self.inner.rate()
    }

    fn rewind(&mut self) -> MixerResult<()> {
        self.inner.rewind()
    }
}

impl Drop for CountedFile {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

fn pump_until(pump: &ManualPump, wanted: usize, timeout: Duration) -> Vec<Sample> {
    let deadline = Instant::now() + timeout;
    let mut collected = Vec::new();
    let mut out = [0 as Sample; 32];
    while collected.len() < wanted && Instant::now() < deadline {
        let n = pump.pump(&mut out, MixMode::Overwrite);
        collected.extend_from_slice(&out[..n]);
        if n == 0 {
            thread::sleep(Duration::from_millis(1));
        }
    }
    collected
}

#[test]
fn buffer_plays_in_callback_sized_chunks_then_is_queued() {
    let (mut mgr, pump) = manager(4);
    mgr.start().unwrap();

    let samples: Vec<Sample> = (0..100).collect();
    let clip = SharedBuffer::from_samples(&samples);
    mgr.play_buffer(&clip).unwrap();

    let mut out = [0 as Sample; 40];
    assert_eq!(pump.pump(&mut out, MixMode::Overwrite), 40);
    assert_eq!(out[39], 39);
    assert_eq!(pump.pump(&mut out, MixMode::Overwrite), 40);
    assert_eq!(pump.pump(&mut out, MixMode::Overwrite), 20);
    assert_eq!(&out[..20], &samples[80..]);

    assert_eq!(mgr.active_count(), 0);
    assert_eq!(mgr.pending_count(), 1);
    assert_eq!(pump.pump(&mut out, MixMode::Overwrite), 0);

    mgr.stop(true);
    assert_eq!(mgr.pending_count(), 0);
    assert_eq!(clip.ref_count(), 1);
}

#[test]
fn third_source_rejected_at_limit_two() {
    let (mut mgr, _pump) = manager(2);
    let drops = Arc::new(AtomicUsize::new(0));

    mgr.play(Counted::new(10, &drops)).unwrap();
    mgr.play(Counted::new(10, &drops)).unwrap();

    let err = mgr.play(Counted::new(10, &drops)).unwrap_err();
    assert!(matches!(err, MixerError::CapacityExhausted { limit: 2 }));
    assert_eq!(mgr.active_count(), 2);
    assert_eq!(drops.load(Ordering::SeqCst), 1, "rejected source destroyed on the spot");
}

#[test]
fn removed_sources_destroyed_exactly_once() {
    let (mut mgr, pump) = manager(3);
    let drops = Arc::new(AtomicUsize::new(0));
    mgr.start().unwrap();

    let mut played = 0;
    let mut out = [0 as Sample; 16];
    for round in 0..20 {
        while mgr.active_count() < 3 {
            mgr.play(Counted::new(5 + round, &drops)).unwrap();
            played += 1;
        }
        assert!(mgr.active_count() <= mgr.max_sources());
        pump.pump(&mut out, MixMode::Overwrite);
    }

    // Either stopped explicitly or rejected; destroyed once either way
    played += 1;
    if let Ok(id) = mgr.play(Counted::new(1000, &drops)) {
        assert!(mgr.stop_source(id));
    }

    drop(mgr);
    assert_eq!(drops.load(Ordering::SeqCst), played);
}

#[test]
fn streaming_source_loops_its_file() {
    let (mut mgr, pump) = manager(4);
    mgr.start().unwrap();

    let samples: Vec<Sample> = (1..=50).collect();
    let file = RawFile::new(SharedBuffer::from_samples(&samples), RATE);
    let stream = mgr.streaming_decoder(Box::new(file));
    let id = mgr.play(Box::new(stream)).unwrap();
    assert_eq!(mgr.poll_count(), 1);

    let heard = pump_until(&pump, 120, Duration::from_secs(5));
    assert_eq!(heard.len(), 120, "decode service did not keep up");
    for (i, &s) in heard.iter().enumerate() {
        assert_eq!(s, (i % 50) as Sample + 1, "sample {}", i);
    }

    // Never finishes on its own
    assert_eq!(mgr.active_count(), 1);
    assert!(mgr.stop_source(id));
    assert_eq!(mgr.poll_count(), 0);
    mgr.stop(true);
}

#[test]
fn empty_stream_is_silent_and_stops_cleanly() {
    let (mut mgr, pump) = manager(4);
    mgr.start().unwrap();

    let file = RawFile::new(SharedBuffer::new(), RATE);
    let stream = mgr.streaming_decoder(Box::new(file));
    mgr.play(Box::new(stream)).unwrap();

    let mut out = [0 as Sample; 16];
    for _ in 0..10 {
        assert_eq!(pump.pump(&mut out, MixMode::Overwrite), 0);
        thread::sleep(Duration::from_millis(2));
    }

    mgr.stop(true);
    assert!(!mgr.is_running());
}

#[test]
fn caller_owned_source_is_released_not_destroyed() {
    let (mut mgr, pump) = manager(4);
    mgr.start().unwrap();

    let source = Arc::new(BufferSource::new(SharedBuffer::from_samples(&[3; 10])));
    mgr.play(Box::new(Arc::clone(&source))).unwrap();

    let mut out = [0 as Sample; 32];
    assert_eq!(pump.pump(&mut out, MixMode::Overwrite), 10);
    mgr.stop(true);

    assert_eq!(Arc::strong_count(&source), 1);
    assert_eq!(source.position(), 10);
}

#[test]
fn sources_mix_additively() {
    let (mut mgr, pump) = manager(4);
    mgr.start().unwrap();

    mgr.play_buffer(&SharedBuffer::from_samples(&[100; 8])).unwrap();
    mgr.play_buffer(&SharedBuffer::from_samples(&[i16::MAX; 4])).unwrap();

    let mut out = [0 as Sample; 8];
    assert_eq!(pump.pump(&mut out, MixMode::Overwrite), 8);
    assert_eq!(&out[..4], &[i16::MAX; 4]);
    assert_eq!(&out[4..], &[100; 4]);
    mgr.stop(true);
}

#[test]
fn stopped_stream_destroyed_before_manager_drop() {
    let (mut mgr, pump) = manager(4);
    mgr.start().unwrap();

    let polls = Arc::new(AtomicUsize::new(0));
    let drops = Arc::new(AtomicUsize::new(0));
    let id = mgr
        .play(Box::new(CountedStream {
            polls: Arc::clone(&polls),
            drops: Arc::clone(&drops),
        }))
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while polls.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    assert!(mgr.stop_source(id));

    // Later plays reap, and reaping collects whatever the service released
    let tick = SharedBuffer::from_samples(&[1; 4]);
    let mut out = [0 as Sample; 8];
    while drops.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
        mgr.play_buffer(&tick).unwrap();
        pump.pump(&mut out, MixMode::Overwrite);
    }
    assert_eq!(drops.load(Ordering::SeqCst), 1, "destroyed while running");

    mgr.stop(true);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    drop(mgr);
    assert_eq!(drops.load(Ordering::SeqCst), 1, "destroyed exactly once");
}

#[test]
fn stopped_stream_destroyed_by_stop() {
    let (mut mgr, _pump) = manager(4);
    mgr.start().unwrap();

    let polls = Arc::new(AtomicUsize::new(0));
    let drops = Arc::new(AtomicUsize::new(0));
    let id = mgr
        .play(Box::new(CountedStream {
            polls: Arc::clone(&polls),
            drops: Arc::clone(&drops),
        }))
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while polls.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    assert!(mgr.stop_source(id));

    // The joined service no longer holds a handle
    mgr.stop(true);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn loop_track_switches_between_files() {
    let (mut mgr, pump) = manager(4);
    mgr.start().unwrap();
    let closed = Arc::new(AtomicUsize::new(0));

    mgr.play_loop(CountedFile::new(&[400; 50], &closed)).unwrap();
    let heard = pump_until(&pump, 60, Duration::from_secs(5));
    assert_eq!(heard.len(), 60);
    assert!(heard.iter().all(|&s| s == 400));

    mgr.play_loop(CountedFile::new(&[-400; 50], &closed)).unwrap();
    assert_eq!(mgr.active_count(), 1);
    let heard = pump_until(&pump, 60, Duration::from_secs(5));
    assert_eq!(heard.len(), 60);
    assert!(heard.iter().all(|&s| s == -400), "old loop still audible");

    mgr.set_loop_volume(0x80);
    let heard = pump_until(&pump, 20, Duration::from_secs(5));
    assert_eq!(heard.len(), 20);
    assert!(heard.iter().all(|&s| s == -200));

    mgr.stop(true);
    assert_eq!(closed.load(Ordering::SeqCst), 1, "first loop closed");
    drop(mgr);
    assert_eq!(closed.load(Ordering::SeqCst), 2);
}
