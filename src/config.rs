//! Configuration for plate stores and the `plate` command-line tool.
//!
//! [`PlateConfig`] tunes a store when it is created or opened. The CLI types
//! map command-line flags and `PLATE_*` environment variables onto it.
//!
//! # Environment Variables
//!
//! - `PLATE_BLOCK_SIZE` - Tile edge length in pixels (default: 256)
//! - `PLATE_FILE_TYPE` - Tile encoding for new plates (default: png)
//! - `PLATE_MAX_BLOB_SIZE` - Blob roll-over size in bytes (default: 1 GiB)
//! - `PLATE_WORKERS` - Ingestion worker count (default: CPU count)
//! - `PLATE_QUEUE_CAPACITY` - Pending ingestion jobs before `insert` waits (default: 64)
//! - `PLATE_STAGING_DIR` - Directory for staging files (default: system temp dir)
//! - `PLATE_JPEG_QUALITY` - JPEG quality for `jpg` tiles (default: 80)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::index::DEFAULT_MAX_BLOB_SIZE;
use crate::tile::{is_valid_quality, DEFAULT_JPEG_QUALITY};

// =============================================================================
// Default Values
// =============================================================================

/// Default tile edge length in pixels.
pub const DEFAULT_BLOCK_SIZE: u32 = 256;

/// Largest accepted tile edge length.
pub const MAX_BLOCK_SIZE: u32 = 8192;

/// Default tile encoding.
pub const DEFAULT_FILE_TYPE: &str = "png";

/// Default number of ingestion jobs that may wait in the queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Default worker count: one per available CPU.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

// =============================================================================
// Store Configuration
// =============================================================================

/// Tuning for one plate store.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateConfig {
    /// Tile edge length in pixels for new plates
    pub block_size: u32,

    /// Encoding tag for new plates
    pub file_type: String,

    /// Size at which writes roll over to a new blob file
    pub max_blob_size: u64,

    /// Number of concurrent ingestion workers
    pub workers: usize,

    /// Bound on queued ingestion jobs
    pub queue_capacity: usize,

    /// Directory holding staging files
    pub staging_dir: PathBuf,

    /// JPEG quality used by the default codec
    pub jpeg_quality: u8,
}

impl Default for PlateConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            file_type: DEFAULT_FILE_TYPE.to_string(),
            max_blob_size: DEFAULT_MAX_BLOB_SIZE,
            workers: default_workers(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            staging_dir: std::env::temp_dir(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl PlateConfig {
    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_file_type(mut self, file_type: impl Into<String>) -> Self {
        self.file_type = file_type.into();
        self
    }

    pub fn with_max_blob_size(mut self, max_blob_size: u64) -> Self {
        self.max_blob_size = max_blob_size;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_staging_dir(mut self, staging_dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = staging_dir.into();
        self
    }

    pub fn with_jpeg_quality(mut self, jpeg_quality: u8) -> Self {
        self.jpeg_quality = jpeg_quality;
        self
    }

    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
            return Err(format!(
                "block_size must be between 1 and {}",
                MAX_BLOCK_SIZE
            ));
        }

        if self.file_type.trim().is_empty() {
            return Err("file_type must not be empty".to_string());
        }

        if self.max_blob_size == 0 {
            return Err("max_blob_size must be greater than 0".to_string());
        }

        if self.workers == 0 {
            return Err("workers must be greater than 0".to_string());
        }

        if self.queue_capacity == 0 {
            return Err("queue_capacity must be greater than 0".to_string());
        }

        if !is_valid_quality(self.jpeg_quality) {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }

        Ok(())
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// Plate - build and inspect tiled image pyramids.
#[derive(Parser, Debug, Clone)]
#[command(name = "plate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Ingest an image file into a plate.
    Insert(InsertArgs),

    /// Build the coarser pyramid levels of a plate.
    Mipmap(StoreArgs),

    /// Print a summary of a plate.
    Info(StoreArgs),

    /// Write one tile of a plate to an image file.
    Extract(ExtractArgs),
}

/// Options shared by every subcommand that opens a plate.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Plate directory (created if missing).
    pub plate: PathBuf,

    /// Tile edge length in pixels for new plates.
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE, env = "PLATE_BLOCK_SIZE")]
    pub block_size: u32,

    /// Tile encoding for new plates (png, jpg, tif).
    #[arg(long, default_value = DEFAULT_FILE_TYPE, env = "PLATE_FILE_TYPE")]
    pub file_type: String,

    /// Blob file size in bytes before rolling over to a new blob.
    #[arg(long, default_value_t = DEFAULT_MAX_BLOB_SIZE, env = "PLATE_MAX_BLOB_SIZE")]
    pub max_blob_size: u64,

    /// Number of ingestion workers (default: number of CPUs).
    #[arg(long, env = "PLATE_WORKERS")]
    pub workers: Option<usize>,

    /// Maximum number of queued ingestion jobs.
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY, env = "PLATE_QUEUE_CAPACITY")]
    pub queue_capacity: usize,

    /// Directory for staging files (default: system temp dir).
    #[arg(long, env = "PLATE_STAGING_DIR")]
    pub staging_dir: Option<PathBuf>,

    /// JPEG quality for jpg tiles (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "PLATE_JPEG_QUALITY")]
    pub jpeg_quality: u8,
}

impl StoreArgs {
    /// Build the store configuration these arguments describe.
    pub fn to_config(&self) -> PlateConfig {
        let mut config = PlateConfig::default()
            .with_block_size(self.block_size)
            .with_file_type(self.file_type.clone())
            .with_max_blob_size(self.max_blob_size)
            .with_queue_capacity(self.queue_capacity)
            .with_jpeg_quality(self.jpeg_quality);
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        if let Some(ref dir) = self.staging_dir {
            config = config.with_staging_dir(dir.clone());
        }
        config
    }
}

#[derive(Args, Debug, Clone)]
pub struct InsertArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Image file to ingest.
    pub image: PathBuf,

    /// Build the pyramid levels after ingestion.
    #[arg(long, default_value_t = false)]
    pub mipmap: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Tile column.
    pub col: u32,

    /// Tile row.
    pub row: u32,

    /// Pyramid level (0 = coarsest).
    pub level: u32,

    /// Output image path; the format follows the extension.
    pub output: PathBuf,
}

// =============================================================================
// Tests
// =============================================================================
