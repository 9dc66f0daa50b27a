//! On-disk form of the index.
//!
//! The snapshot is a single JSON document (`plate.index`). Saves go to
//! `plate.index.tmp` first and are renamed over the old file, so a crash
//! mid-save leaves the previous snapshot intact.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::record::IndexRecord;
use crate::error::IndexError;
use crate::tile::TileCoordinate;

/// Current snapshot format version.
pub const INDEX_VERSION: u32 = 1;

/// File name of the index inside a plate directory.
pub const INDEX_FILE_NAME: &str = "plate.index";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct IndexSnapshot {
    pub version: u32,
    pub default_block_size: u32,
    pub default_file_type: String,
    pub max_blob_size: u64,
    pub max_depth: u32,
    pub current_blob: u32,
    /// Committed length of each blob id
    pub blobs: BTreeMap<u32, u64>,
    pub records: Vec<SnapshotEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SnapshotEntry {
    pub coord: TileCoordinate,
    pub record: IndexRecord,
}

impl IndexSnapshot {
    pub fn to_bytes(&self) -> Result<Vec<u8>, IndexError> {
        serde_json::to_vec(self).map_err(|e| IndexError::Serialization(e.to_string()))
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, IndexError> {
        let snapshot: IndexSnapshot =
            serde_json::from_slice(data).map_err(|e| IndexError::Serialization(e.to_string()))?;
        if snapshot.version != INDEX_VERSION {
            return Err(IndexError::UnsupportedVersion(snapshot.version));
        }
        Ok(snapshot)
    }

    pub async fn read(path: &Path) -> Result<Self, IndexError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| IndexError::io(path, e))?;
        Self::from_bytes(&data)
    }

    /// Write via a temp file and rename.
    pub async fn write(&self, path: &Path) -> Result<(), IndexError> {
        let data = self.to_bytes()?;
        let temp_path = temp_path_for(path);
        tokio::fs::write(&temp_path, &data)
            .await
            .map_err(|e| IndexError::io(&temp_path, e))?;
        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|e| IndexError::io(path, e))
    }

    /// Blocking variant of [`write`](Self::write) for use outside a runtime.
    pub fn write_blocking(&self, path: &Path) -> Result<(), IndexError> {
        let data = self.to_bytes()?;
        let temp_path = temp_path_for(path);
        std::fs::write(&temp_path, &data).map_err(|e| IndexError::io(&temp_path, e))?;
        std::fs::rename(&temp_path, path).map_err(|e| IndexError::io(path, e))
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
