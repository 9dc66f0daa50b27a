//! The plate store façade.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          PlateStore                          │
//! │   read()      write()      insert()           mipmap()       │
//! │     │            │            │                  │           │
//! │     │            │       WriteQueue ──▶ write() ◀┘           │
//! │     ▼            ▼                                           │
//! │  ┌───────┐  ┌──────────────┐  ┌─────────┐  ┌────────────┐    │
//! │  │ Index │  │ StagingFile  │  │ BlobSet │  │ TileCodec  │    │
//! │  └───────┘  └──────────────┘  └─────────┘  └────────────┘    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every tile payload becomes durable through [`PlateStore::write`]: encode
//! into a staging file, ask the index for a blob, append, commit.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{imageops, RgbaImage};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::mipmap::{self, MipmapReport};
use super::queue::{WriteJob, WriteQueue};
use crate::config::PlateConfig;
use crate::error::{BlobError, IndexError, PlateError};
use crate::index::{Index, IndexRecord, INDEX_FILE_NAME};
use crate::io::{BlobSet, StagingFile};
use crate::tile::{
    block_count, image_blocks, pyramid_levels, ImageCodec, TileCodec, TileCoordinate,
};

// =============================================================================
// Results
// =============================================================================

/// Result of reading one coordinate.
///
/// `image` is `None` when the coordinate is allocated but not yet generated.
#[derive(Debug, Clone)]
pub struct TileRead {
    pub record: IndexRecord,
    pub image: Option<RgbaImage>,
}

impl TileRead {
    pub fn is_valid(&self) -> bool {
        self.record.valid
    }
}

/// Outcome of ingesting one image.
#[derive(Debug)]
pub struct InsertReport {
    /// Level the blocks were written at
    pub level: u32,

    /// Number of block columns
    pub block_cols: u32,

    /// Number of block rows
    pub block_rows: u32,

    /// Blocks written successfully
    pub written: usize,

    /// Blocks that failed to write
    pub failures: Vec<(TileCoordinate, PlateError)>,
}

impl InsertReport {
    pub fn block_count(&self) -> usize {
        self.block_cols as usize * self.block_rows as usize
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.written == self.block_count()
    }
}

/// Summary of a store's index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlateStats {
    pub depth: u32,
    pub records: usize,
    pub valid: usize,
    pub blobs: BTreeMap<u32, u64>,
}

// =============================================================================
// Shared State
// =============================================================================

/// State shared by every handle to one store and by its write workers.
pub(crate) struct PlateCore {
    root: PathBuf,
    name: String,
    index: Index,
    blobs: BlobSet,
    codec: Arc<dyn TileCodec>,
    config: PlateConfig,
    mipmap_lock: Mutex<()>,
}

impl PlateCore {
    pub(crate) fn index(&self) -> &Index {
        &self.index
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE_NAME)
    }

    pub(crate) async fn read(&self, coord: TileCoordinate) -> Result<TileRead, PlateError> {
        let record = self.index.read_request(coord).await?;
        if !record.valid {
            return Ok(TileRead {
                record,
                image: None,
            });
        }

        let staging = StagingFile::reserve(&self.config.staging_dir, &record.file_type);
        self.blobs
            .read_to_file(
                record.blob_id,
                staging.path(),
                record.blob_offset,
                record.block_size,
            )
            .await?;
        let image = staging.read(self.codec.as_ref(), &record.file_type).await?;

        Ok(TileRead {
            record,
            image: Some(image),
        })
    }

    pub(crate) async fn write(
        &self,
        coord: TileCoordinate,
        image: &RgbaImage,
    ) -> Result<(), PlateError> {
        if !coord.is_within_level() {
            return Err(IndexError::InvalidCoordinate(coord).into());
        }

        let file_type = self.index.default_file_type().to_string();
        let staging = StagingFile::from_image(
            &self.config.staging_dir,
            image,
            &file_type,
            self.codec.as_ref(),
        )
        .await?;
        let size = staging.file_size().await?;

        let blob_id = self.index.write_request(size).await;
        let (offset, block_size) = self.blobs.append_from_file(blob_id, staging.path()).await?;

        let record = IndexRecord::new(blob_id, offset, block_size, file_type);
        self.index.write_complete(coord, record).await?;
        Ok(())
    }
}

impl Drop for PlateCore {
    fn drop(&mut self) {
        let path = self.index_path();
        match self.index.save_blocking(&path) {
            Ok(()) => debug!(path = %path.display(), "Saved tile index"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to save tile index"),
        }
    }
}

// =============================================================================
// Plate Store
// =============================================================================

/// A tiled, multi-resolution image store rooted at one directory.
///
/// Cloning is cheap; all clones share one index. The index is saved when the
/// last handle (and the last running write worker) is dropped.
///
/// # Example
///
/// ```ignore
/// use plate_store::{PlateConfig, PlateStore, TileCoordinate};
///
/// let store = PlateStore::open("/data/moon.plate", PlateConfig::default()).await?;
/// let report = store.insert(&image).await?;
/// store.mipmap().await?;
///
/// let root = store.read(TileCoordinate::ROOT).await?;
/// store.close().await?;
/// ```
#[derive(Clone)]
pub struct PlateStore {
    core: Arc<PlateCore>,
}

impl PlateStore {
    /// Open the store at `path` with the default image codec.
    pub async fn open(path: impl AsRef<Path>, config: PlateConfig) -> Result<Self, PlateError> {
        let codec = Arc::new(ImageCodec::with_jpeg_quality(config.jpeg_quality));
        Self::open_with_codec(path, config, codec).await
    }

    /// Open the store at `path`, creating it if it does not exist.
    ///
    /// An existing store keeps its persisted block size and file type. An
    /// index that cannot be read is replaced by an empty one.
    pub async fn open_with_codec(
        path: impl AsRef<Path>,
        config: PlateConfig,
        codec: Arc<dyn TileCodec>,
    ) -> Result<Self, PlateError> {
        config.validate().map_err(PlateError::InvalidConfig)?;

        let root = path.as_ref().to_path_buf();
        let index_path = root.join(INDEX_FILE_NAME);
        let fresh_index =
            || Index::new(config.block_size, config.file_type.clone(), config.max_blob_size);

        let index = if !exists(&root).await {
            tokio::fs::create_dir_all(&root)
                .await
                .map_err(|e| BlobError::io(&root, e))?;
            debug!(path = %root.display(), "Created new plate");
            fresh_index()
        } else if !exists(&index_path).await {
            debug!(path = %root.display(), "Plate has no index, starting empty");
            fresh_index()
        } else {
            match Index::load(&index_path).await {
                Ok(index) => {
                    let depth = index.max_depth().await;
                    debug!(path = %root.display(), depth, "Reopened plate");
                    index
                }
                Err(e) => {
                    warn!(
                        path = %index_path.display(),
                        error = %e,
                        "Could not read plate index, creating a new empty index"
                    );
                    fresh_index()
                }
            }
        };

        if !codec.supports(index.default_file_type()) {
            return Err(PlateError::InvalidConfig(format!(
                "file type '{}' is not supported by the codec",
                index.default_file_type()
            )));
        }

        tokio::fs::create_dir_all(&config.staging_dir)
            .await
            .map_err(|e| BlobError::io(&config.staging_dir, e))?;

        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());

        Ok(Self {
            core: Arc::new(PlateCore {
                blobs: BlobSet::new(&root),
                root,
                name,
                index,
                codec,
                config,
                mipmap_lock: Mutex::new(()),
            }),
        })
    }

    // -------------------------------------------------------------------------
    // Tile access
    // -------------------------------------------------------------------------

    /// Read one tile.
    ///
    /// Fails with [`IndexError::TileNotFound`] if the coordinate was never
    /// allocated. An allocated but ungenerated tile returns a record with
    /// `valid == false` and no image.
    pub async fn read(&self, coord: TileCoordinate) -> Result<TileRead, PlateError> {
        self.core.read(coord).await
    }

    /// Encode `image` and commit it at `coord`, replacing any previous tile.
    pub async fn write(&self, coord: TileCoordinate, image: &RgbaImage) -> Result<(), PlateError> {
        self.core.write(coord, image).await
    }

    /// Start a pool of write workers sized by the store's configuration.
    pub fn write_queue(&self) -> WriteQueue {
        WriteQueue::start(
            Arc::clone(&self.core),
            self.core.config.workers,
            self.core.config.queue_capacity,
        )
    }

    // -------------------------------------------------------------------------
    // Bulk operations
    // -------------------------------------------------------------------------

    /// Split `image` into blocks and write them all at the finest level.
    ///
    /// The level is `ceil(log2(max(block_cols, block_rows)))`. Blocks on the
    /// right and bottom edges may be smaller than the block size. Returns once
    /// every block has been written or has failed.
    pub async fn insert(&self, image: &RgbaImage) -> Result<InsertReport, PlateError> {
        let block_size = self.default_block_size();
        let (width, height) = image.dimensions();
        let block_cols = block_count(width, block_size);
        let block_rows = block_count(height, block_size);
        let level = pyramid_levels(block_cols, block_rows);

        info!(
            plate = %self.core.name,
            width,
            height,
            block_cols,
            block_rows,
            levels = level + 1,
            "Inserting image"
        );

        let queue = self.write_queue();
        for block in image_blocks(width, height, block_size, block_size) {
            let coord = TileCoordinate::new(block.x / block_size, block.y / block_size, level);
            let tile = imageops::crop_imm(image, block.x, block.y, block.width, block.height)
                .to_image();
            debug!(coord = %coord, bbox = %block, "Queueing block");
            queue.submit(WriteJob::new(coord, tile)).await?;
        }
        let report = queue.join().await;

        Ok(InsertReport {
            level,
            block_cols,
            block_rows,
            written: report.completed,
            failures: report.failures,
        })
    }

    /// Generate every pending tile, starting at the root.
    pub async fn mipmap(&self) -> Result<MipmapReport, PlateError> {
        self.mipmap_from(TileCoordinate::ROOT).await
    }

    /// Generate every pending tile in the subtree rooted at `coord`.
    pub async fn mipmap_from(&self, coord: TileCoordinate) -> Result<MipmapReport, PlateError> {
        let _guard = self.core.mipmap_lock.lock().await;
        let report = mipmap::generate(&self.core, coord).await?;
        info!(
            plate = %self.core.name,
            start = %coord,
            generated = report.generated,
            "Mipmap complete"
        );
        Ok(report)
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    /// Write the index to disk.
    pub async fn save(&self) -> Result<(), PlateError> {
        let path = self.core.index_path();
        self.core.index.save(&path).await?;
        debug!(path = %path.display(), "Saved tile index");
        Ok(())
    }

    /// Save and release this handle, reporting any save error.
    pub async fn close(self) -> Result<(), PlateError> {
        self.save().await
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn path(&self) -> &Path {
        &self.core.root
    }

    /// Deepest level holding a committed tile.
    pub async fn depth(&self) -> u32 {
        self.core.index.max_depth().await
    }

    pub fn default_block_size(&self) -> u32 {
        self.core.index.default_block_size()
    }

    pub fn default_file_type(&self) -> &str {
        self.core.index.default_file_type()
    }

    /// All records, sorted by level, row and column.
    pub async fn records(&self) -> Vec<(TileCoordinate, IndexRecord)> {
        self.core.index.records().await
    }

    pub async fn stats(&self) -> PlateStats {
        let index = &self.core.index;
        PlateStats {
            depth: index.max_depth().await,
            records: index.len().await,
            valid: index.valid_count().await,
            blobs: index.blob_lengths().await,
        }
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

// =============================================================================
// Tests
// =============================================================================
