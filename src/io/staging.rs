//! Scoped temporary tile files.
//!
//! A [`StagingFile`] carries one tile's encoded bytes between the in-memory
//! image and a blob's byte stream. The file is deleted when the value is
//! dropped, including on error paths. A failed delete is only a warning:
//! a leaked temp file is harmless, a lost tile is not.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use image::RgbaImage;
use tracing::{debug, warn};

use crate::error::{BlobError, PlateError};
use crate::tile::{normalize_file_type, TileCodec};

/// Prefix shared by all staging file names
pub const STAGING_PREFIX: &str = "plate_tile";

/// Process-wide sequence number for staging file names
static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// A uniquely named temporary file holding one encoded tile.
#[derive(Debug)]
pub struct StagingFile {
    path: PathBuf,
}

impl StagingFile {
    /// Build a collision-free path inside `dir` with the given extension.
    ///
    /// Names combine the process id with a process-wide counter, so
    /// concurrent workers and concurrent processes never share a name.
    pub fn unique_path(dir: &Path, file_type: &str) -> PathBuf {
        let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
        dir.join(format!(
            "{}_{}_{}.{}",
            STAGING_PREFIX,
            std::process::id(),
            seq,
            normalize_file_type(file_type)
        ))
    }

    /// Encode `image` into a new staging file right away.
    pub async fn from_image(
        dir: &Path,
        image: &RgbaImage,
        file_type: &str,
        codec: &dyn TileCodec,
    ) -> Result<Self, PlateError> {
        let data = codec.encode(image, file_type)?;

        let staging = Self {
            path: Self::unique_path(dir, file_type),
        };
        tokio::fs::write(&staging.path, &data)
            .await
            .map_err(|e| BlobError::io(&staging.path, e))?;

        debug!(
            path = %staging.path.display(),
            bytes = data.len(),
            "Created staging file"
        );
        Ok(staging)
    }

    /// Take ownership of a file that already exists (or is about to).
    pub fn adopt(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        debug!(path = %path.display(), "Assumed control of staging file");
        Self { path }
    }

    /// Claim a fresh unique path for a file that will be written next.
    pub fn reserve(dir: &Path, file_type: &str) -> Self {
        Self::adopt(Self::unique_path(dir, file_type))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name component of the staging path.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Size of the staged file in bytes.
    pub async fn file_size(&self) -> Result<u64, BlobError> {
        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| BlobError::io(&self.path, e))?;
        Ok(metadata.len())
    }

    /// Decode the staged bytes back into an image.
    pub async fn read(
        &self,
        codec: &dyn TileCodec,
        file_type: &str,
    ) -> Result<RgbaImage, PlateError> {
        let data = tokio::fs::read(&self.path)
            .await
            .map_err(|e| BlobError::io(&self.path, e))?;
        Ok(codec.decode(&data, file_type)?)
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Destroyed staging file"),
            // Reserved but never written
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove staging file"
            ),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
