//! Append-only blob files.
//!
//! A blob is a numbered file (`plate_<id>.blob`) holding the encoded bytes of
//! many tiles back to back. Bytes are only ever appended; a range handed out
//! by [`BlobSet::append_from_file`] is never rewritten.
//!
//! Appends to one blob id must be serialized, which [`BlobSet`] does with a
//! lock per id. Appends to different ids never contend, and reads of
//! committed ranges need no lock at all.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::error::BlobError;

/// File name of the blob with the given id.
pub fn blob_file_name(blob_id: u32) -> String {
    format!("plate_{}.blob", blob_id)
}

// =============================================================================
// Blob
// =============================================================================

/// One append-only blob file.
#[derive(Debug, Clone)]
pub struct Blob {
    id: u32,
    path: PathBuf,
}

impl Blob {
    /// Blob `id` inside the plate directory `root`.
    pub fn new(root: &Path, id: u32) -> Self {
        Self {
            id,
            path: root.join(blob_file_name(id)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current length in bytes. A blob that was never written has length 0.
    pub async fn len(&self) -> Result<u64, BlobError> {
        match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => Ok(metadata.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(BlobError::io(&self.path, e)),
        }
    }

    /// Append the whole of `source` and return `(offset, size)` of the new range.
    ///
    /// Unlocked; outside this module appends go through [`BlobSet::append_from_file`].
    pub(crate) async fn write_from_file(&self, source: &Path) -> Result<(u64, u32), BlobError> {
        let mut input = File::open(source)
            .await
            .map_err(|e| BlobError::io(source, e))?;
        let source_len = input
            .metadata()
            .await
            .map_err(|e| BlobError::io(source, e))?
            .len();
        let size = u32::try_from(source_len)
            .map_err(|_| BlobError::TileTooLarge { size: source_len })?;

        let mut output = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| BlobError::io(&self.path, e))?;
        let offset = output
            .metadata()
            .await
            .map_err(|e| BlobError::io(&self.path, e))?
            .len();

        let copied = tokio::io::copy(&mut input, &mut output)
            .await
            .map_err(|e| BlobError::io(&self.path, e))?;
        output
            .flush()
            .await
            .map_err(|e| BlobError::io(&self.path, e))?;
        output
            .sync_data()
            .await
            .map_err(|e| BlobError::io(&self.path, e))?;

        if copied != u64::from(size) {
            return Err(BlobError::Io {
                path: source.display().to_string(),
                message: format!(
                    "staging file changed during append: expected {} bytes, copied {}",
                    size, copied
                ),
            });
        }

        Ok((offset, size))
    }

    /// Copy exactly `size` bytes starting at `offset` into a new file at `dest`.
    ///
    /// A range past the end of the blob is a [`BlobError::RangeOutOfBounds`].
    pub async fn read_to_file(&self, dest: &Path, offset: u64, size: u32) -> Result<(), BlobError> {
        let requested = u64::from(size);
        let out_of_bounds = |blob_size: u64| BlobError::RangeOutOfBounds {
            blob_id: self.id,
            offset,
            requested,
            size: blob_size,
        };

        let mut input = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(out_of_bounds(0)),
            Err(e) => return Err(BlobError::io(&self.path, e)),
        };
        let blob_size = input
            .metadata()
            .await
            .map_err(|e| BlobError::io(&self.path, e))?
            .len();

        let end = offset.checked_add(requested).ok_or(out_of_bounds(blob_size))?;
        if end > blob_size {
            return Err(out_of_bounds(blob_size));
        }

        input
            .seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| BlobError::io(&self.path, e))?;

        let mut output = File::create(dest)
            .await
            .map_err(|e| BlobError::io(dest, e))?;
        let copied = tokio::io::copy(&mut input.take(requested), &mut output)
            .await
            .map_err(|e| BlobError::io(dest, e))?;
        output.flush().await.map_err(|e| BlobError::io(dest, e))?;

        if copied != requested {
            return Err(out_of_bounds(offset + copied));
        }
        Ok(())
    }
}

// =============================================================================
// Blob Set
// =============================================================================

/// The blobs of one plate directory, with one append lock per blob id.
pub struct BlobSet {
    root: PathBuf,
    locks: Mutex<HashMap<u32, Arc<Mutex<()>>>>,
}

impl BlobSet {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn blob(&self, blob_id: u32) -> Blob {
        Blob::new(&self.root, blob_id)
    }

    async fn lock_for(&self, blob_id: u32) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(blob_id).or_default())
    }

    /// Append `source` to blob `blob_id` while holding that blob's lock.
    pub async fn append_from_file(
        &self,
        blob_id: u32,
        source: &Path,
    ) -> Result<(u64, u32), BlobError> {
        let lock = self.lock_for(blob_id).await;
        let _guard = lock.lock().await;
        self.blob(blob_id).write_from_file(source).await
    }

    /// Extract a committed range of blob `blob_id` into `dest`.
    pub async fn read_to_file(
        &self,
        blob_id: u32,
        dest: &Path,
        offset: u64,
        size: u32,
    ) -> Result<(), BlobError> {
        self.blob(blob_id).read_to_file(dest, offset, size).await
    }
}

// =============================================================================
// Tests
// =============================================================================
