//! Reference-counted immutable audio payload
//!
//! `SharedBuffer` is what pre-decoded clips travel in. Cloning a handle is an
//! atomic increment; the payload is freed when the last handle goes away.
//! Once a second handle exists the bytes can no longer be mutated, which is
//! what lets the decode thread, the control thread and the audio callback
//! read the same clip without any locking.

use std::path::Path;
use std::sync::Arc;

use crate::error::MixerResult;
use crate::types::Sample;

struct Payload {
    /// Storage is kept as samples so the 16-bit view is always aligned
    samples: Box<[Sample]>,
    /// Payload length in bytes (may be odd for raw loads)
    len: usize,
}

impl Payload {
    fn zeroed(len: usize) -> Self {
        Self {
            samples: vec![0; len.div_ceil(2)].into_boxed_slice(),
            len,
        }
    }

    fn bytes(&self) -> &[u8] {
        &bytemuck::cast_slice(&self.samples[..])[..self.len]
    }
}

/// Shared, immutable byte payload
///
/// An empty handle (`SharedBuffer::default()`) holds no payload and reports a
/// size of zero.
#[derive(Clone, Default)]
pub struct SharedBuffer {
    payload: Option<Arc<Payload>>,
}

impl SharedBuffer {
    /// Create an empty handle with no payload
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a zero-filled payload of `len` bytes
    pub fn with_size(len: usize) -> Self {
        Self {
            payload: Some(Arc::new(Payload::zeroed(len))),
        }
    }

    /// Copy external bytes into a new payload (native-endian PCM)
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut payload = Payload::zeroed(bytes.len());
        bytemuck::cast_slice_mut::<Sample, u8>(&mut payload.samples[..])[..bytes.len()]
            .copy_from_slice(bytes);
        Self {
            payload: Some(Arc::new(payload)),
        }
    }

    /// Copy PCM samples into a new payload
    pub fn from_samples(samples: &[Sample]) -> Self {
        Self {
            payload: Some(Arc::new(Payload {
                samples: samples.into(),
                len: samples.len() * 2,
            })),
        }
    }

    /// Read a whole file into a new payload
    pub fn load(path: &Path) -> MixerResult<Self> {
        let bytes = std::fs::read(path)?;
        log::debug!("SharedBuffer: loaded {} bytes from {:?}", bytes.len(), path);
        Ok(Self::from_bytes(&bytes))
    }

    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.payload.as_ref().map_or(0, |p| p.len)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Raw payload bytes
    pub fn data(&self) -> &[u8] {
        self.payload.as_ref().map(|p| p.bytes()).unwrap_or_default()
    }

    /// Payload viewed as 16-bit samples (a trailing odd byte is ignored)
    pub fn samples(&self) -> &[Sample] {
        self.payload
            .as_ref()
            .map(|p| &p.samples[..p.len / 2])
            .unwrap_or_default()
    }

    /// Mutable bytes, only while this handle is the sole holder
    ///
    /// Returns `None` once the payload has been shared, so content can never
    /// change under another reader.
    pub fn data_mut(&mut self) -> Option<&mut [u8]> {
        let payload = Arc::get_mut(self.payload.as_mut()?)?;
        let len = payload.len;
        Some(&mut bytemuck::cast_slice_mut::<Sample, u8>(&mut payload.samples[..])[..len])
    }

    /// Number of live handles sharing this payload (0 when empty)
    pub fn ref_count(&self) -> usize {
        self.payload.as_ref().map_or(0, Arc::strong_count)
    }

    /// Drop this handle's reference, freeing the payload if it was the last
    pub fn release(&mut self) {
        self.payload = None;
    }

    /// Whether two handles point at the same payload
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.payload, &other.payload) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("size", &self.size())
            .field("refs", &self.ref_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_empty_buffer() {
        let buffer = SharedBuffer::new();
        assert_eq!(buffer.size(), 0);
        assert!(buffer.data().is_empty());
        assert!(buffer.samples().is_empty());
        assert_eq!(buffer.ref_count(), 0);
    }

    #[test]
    fn test_with_size_is_zeroed() {
        let buffer = SharedBuffer::with_size(9);
        assert_eq!(buffer.size(), 9);
        assert!(buffer.data().iter().all(|&b| b == 0));
        assert_eq!(buffer.samples().len(), 4);
        assert_eq!(buffer.ref_count(), 1);
    }

    #[test]
    fn test_from_bytes_copies() {
        let bytes = [1u8, 2, 3, 4, 5];
        let buffer = SharedBuffer::from_bytes(&bytes);
        assert_eq!(buffer.data(), &bytes);
        assert_eq!(buffer.samples().len(), 2);
    }

    #[test]
    fn test_sample_view_matches_input() {
        let samples = [0i16, 1, -1, i16::MAX, i16::MIN];
        let buffer = SharedBuffer::from_samples(&samples);
        assert_eq!(buffer.size(), 10);
        assert_eq!(buffer.samples(), &samples);
    }

    #[test]
    fn test_clone_and_drop_restores_count() {
        let buffer = SharedBuffer::from_samples(&[1, 2, 3]);
        let before = buffer.ref_count();
        {
            let copy = buffer.clone();
            assert!(copy.ptr_eq(&buffer));
            assert_eq!(buffer.ref_count(), before + 1);
        }
        assert_eq!(buffer.ref_count(), before);
    }

    #[test]
    fn test_release_keeps_other_handles_alive() {
        let mut first = SharedBuffer::from_samples(&[5, 6]);
        let second = first.clone();
        first.release();
        assert_eq!(first.size(), 0);
        assert_eq!(second.ref_count(), 1);
        assert_eq!(second.samples(), &[5, 6]);
    }

    #[test]
    fn test_mutation_only_while_unique() {
        let mut buffer = SharedBuffer::with_size(4);
        buffer.data_mut().unwrap()[0] = 0x7f;
        let copy = buffer.clone();
        assert!(buffer.data_mut().is_none());
        drop(copy);
        assert!(buffer.data_mut().is_some());
        assert_eq!(buffer.data()[0], 0x7f);
    }

    #[test]
    fn test_concurrent_clone_drop() {
        let buffer = SharedBuffer::from_samples(&[42; 64]);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let local = buffer.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let copy = local.clone();
                        assert_eq!(copy.samples()[63], 42);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(buffer.ref_count(), 1);
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.raw");
        std::fs::write(&path, [0u8, 1, 2, 3]).unwrap();
        let buffer = SharedBuffer::load(&path).unwrap();
        assert_eq!(buffer.data(), &[0, 1, 2, 3]);
        assert!(SharedBuffer::load(&dir.path().join("missing.raw")).is_err());
    }
}
