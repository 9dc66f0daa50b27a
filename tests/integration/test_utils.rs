//! Test utilities for integration tests.
//!
//! This module provides synthetic images, a scratch store configuration and
//! a codec wrapper that counts encode and decode calls.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use image::{Rgba, RgbaImage};

use plate_store::error::CodecError;
use plate_store::{ImageCodec, PlateConfig, PlateStore, TileCodec};

/// Block size used by every integration test.
pub const BLOCK: u32 = 4;

// =============================================================================
// Counting Codec
// =============================================================================

/// A codec that delegates to [`ImageCodec`] and counts calls.
///
/// Every tile write encodes exactly once, so `encode_count` is the number of
/// writes the store performed.
#[derive(Default)]
pub struct CountingCodec {
    inner: ImageCodec,
    encodes: AtomicUsize,
    decodes: AtomicUsize,
}

impl CountingCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encode_count(&self) -> usize {
        self.encodes.load(Ordering::SeqCst)
    }

    pub fn decode_count(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }
}

impl TileCodec for CountingCodec {
    fn encode(&self, image: &RgbaImage, file_type: &str) -> Result<Bytes, CodecError> {
        self.encodes.fetch_add(1, Ordering::SeqCst);
        self.inner.encode(image, file_type)
    }

    fn decode(&self, data: &[u8], file_type: &str) -> Result<RgbaImage, CodecError> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        self.inner.decode(data, file_type)
    }

    fn supports(&self, file_type: &str) -> bool {
        self.inner.supports(file_type)
    }
}

// =============================================================================
// Store Helpers
// =============================================================================

/// Small-block configuration with staging files kept inside `dir`.
pub fn scratch_config(dir: &Path) -> PlateConfig {
    PlateConfig::default()
        .with_block_size(BLOCK)
        .with_workers(4)
        .with_queue_capacity(8)
        .with_staging_dir(dir.join("staging"))
}

pub async fn open_store(dir: &Path) -> PlateStore {
    PlateStore::open(dir.join("test.plate"), scratch_config(dir))
        .await
        .unwrap()
}

/// Open a store whose codec calls can be observed.
pub async fn open_counted(dir: &Path, config: PlateConfig) -> (PlateStore, Arc<CountingCodec>) {
    let codec = Arc::new(CountingCodec::new());
    let store = PlateStore::open_with_codec(dir.join("test.plate"), config, codec.clone())
        .await
        .unwrap();
    (store, codec)
}

// =============================================================================
// Synthetic Images
// =============================================================================

/// An opaque image whose pixels encode their own position.
pub fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
    })
}

pub fn solid(width: u32, height: u32, value: u8) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([value, value, value, 255]))
}

/// Number of files left in the staging directory.
pub fn staging_leftovers(dir: &Path) -> usize {
    std::fs::read_dir(dir.join("staging"))
        .map(|entries| entries.count())
        .unwrap_or(0)
}
