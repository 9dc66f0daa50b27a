use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use tokio::sync::RwLock;
use tracing::debug;

use super::record::{IndexRecord, TileLookup};
use super::snapshot::{IndexSnapshot, SnapshotEntry, INDEX_VERSION};
use crate::error::IndexError;
use crate::tile::TileCoordinate;

/// Default upper bound on a single blob file before rolling over: 1 GiB.
pub const DEFAULT_MAX_BLOB_SIZE: u64 = 1024 * 1024 * 1024;

/// Mutable part of the index, guarded by one lock.
#[derive(Debug, Default)]
struct IndexState {
    records: HashMap<TileCoordinate, IndexRecord>,
    blobs: BTreeMap<u32, u64>,
    current_blob: u32,
    max_depth: u32,
}

/// Directory of tile locations and the blob allocation policy.
///
/// The index is the only component that knows where tiles live. Lookups take
/// a shared lock; `write_request`, `write_complete` and snapshotting are
/// mutually exclusive with each other.
#[derive(Debug)]
pub struct Index {
    default_block_size: u32,
    default_file_type: String,
    max_blob_size: u64,
    state: RwLock<IndexState>,
}

impl Index {
    /// Create an empty index.
    pub fn new(default_block_size: u32, default_file_type: impl Into<String>, max_blob_size: u64) -> Self {
        Self {
            default_block_size,
            default_file_type: default_file_type.into(),
            max_blob_size: max_blob_size.max(1),
            state: RwLock::new(IndexState::default()),
        }
    }

    /// Load a saved index snapshot.
    pub async fn load(path: &Path) -> Result<Self, IndexError> {
        let snapshot = IndexSnapshot::read(path).await?;
        let records = snapshot.records.len();
        let index = Self::from_snapshot(snapshot);
        debug!(path = %path.display(), records, "Loaded tile index");
        Ok(index)
    }

    fn from_snapshot(snapshot: IndexSnapshot) -> Self {
        let records = snapshot
            .records
            .into_iter()
            .map(|entry| (entry.coord, entry.record))
            .collect();

        Self {
            default_block_size: snapshot.default_block_size,
            default_file_type: snapshot.default_file_type,
            max_blob_size: snapshot.max_blob_size.max(1),
            state: RwLock::new(IndexState {
                records,
                blobs: snapshot.blobs,
                current_blob: snapshot.current_blob,
                max_depth: snapshot.max_depth,
            }),
        }
    }

    fn snapshot(&self, state: &IndexState) -> IndexSnapshot {
        let mut records: Vec<SnapshotEntry> = state
            .records
            .iter()
            .map(|(coord, record)| SnapshotEntry {
                coord: *coord,
                record: record.clone(),
            })
            .collect();
        records.sort_by_key(|entry| entry.coord.sort_key());

        IndexSnapshot {
            version: INDEX_VERSION,
            default_block_size: self.default_block_size,
            default_file_type: self.default_file_type.clone(),
            max_blob_size: self.max_blob_size,
            max_depth: state.max_depth,
            current_blob: state.current_blob,
            blobs: state.blobs.clone(),
            records,
        }
    }

    /// Persist the whole index to `path`.
    pub async fn save(&self, path: &Path) -> Result<(), IndexError> {
        // The read guard is held until the file is renamed into place so
        // that no commit lands between snapshot and write.
        let state = self.state.read().await;
        self.snapshot(&state).write(path).await
    }

    /// Persist without an async runtime. Fails if a writer holds the lock.
    pub fn save_blocking(&self, path: &Path) -> Result<(), IndexError> {
        let state = self.state.try_read().map_err(|_| IndexError::Io {
            path: path.display().to_string(),
            message: "index is locked by a writer".to_string(),
        })?;
        self.snapshot(&state).write_blocking(path)
    }

    // -------------------------------------------------------------------------
    // Lookups
    // -------------------------------------------------------------------------

    /// Look a coordinate up, distinguishing "never allocated" from "pending".
    pub async fn lookup(&self, coord: TileCoordinate) -> TileLookup {
        let state = self.state.read().await;
        match state.records.get(&coord) {
            Some(record) => TileLookup::Allocated(record.clone()),
            None => TileLookup::NotAllocated,
        }
    }

    /// Return the record for `coord`, or [`IndexError::TileNotFound`].
    ///
    /// A record with `valid == false` is returned as `Ok`.
    pub async fn read_request(&self, coord: TileCoordinate) -> Result<IndexRecord, IndexError> {
        self.lookup(coord).await.into_record(coord)
    }

    // -------------------------------------------------------------------------
    // Allocation
    // -------------------------------------------------------------------------

    /// Pick the blob the next `size` bytes should be appended to.
    ///
    /// Nothing is reserved. The current blob is used unless it already holds
    /// data and would grow past the size bound, in which case a new blob id
    /// is opened.
    pub async fn write_request(&self, size: u64) -> u32 {
        let mut state = self.state.write().await;
        let current = state.current_blob;
        let used = state.blobs.get(&current).copied().unwrap_or(0);

        if used > 0 && used.saturating_add(size) > self.max_blob_size {
            let next = state
                .blobs
                .keys()
                .next_back()
                .map_or(current, |&id| id.max(current))
                + 1;
            state.current_blob = next;
            debug!(
                previous = current,
                blob_id = next,
                used,
                "Rolling over to new blob"
            );
            next
        } else {
            current
        }
    }

    /// Commit `record` for `coord`, replacing any previous record.
    ///
    /// Every ancestor of `coord` that is not yet in the index is allocated
    /// as a pending (`valid == false`) record.
    pub async fn write_complete(
        &self,
        coord: TileCoordinate,
        mut record: IndexRecord,
    ) -> Result<(), IndexError> {
        if !coord.is_within_level() {
            return Err(IndexError::InvalidCoordinate(coord));
        }
        record.valid = true;

        let mut state = self.state.write().await;

        let end = record.blob_end();
        let used = state.blobs.entry(record.blob_id).or_insert(0);
        *used = (*used).max(end);
        state.max_depth = state.max_depth.max(coord.level);

        for ancestor in coord.ancestors() {
            state
                .records
                .entry(ancestor)
                .or_insert_with(|| IndexRecord::pending(self.default_file_type.clone()));
        }
        state.records.insert(coord, record);

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Configuration and diagnostics
    // -------------------------------------------------------------------------

    /// Deepest level ever committed.
    pub async fn max_depth(&self) -> u32 {
        self.state.read().await.max_depth
    }

    pub fn default_block_size(&self) -> u32 {
        self.default_block_size
    }

    pub fn default_file_type(&self) -> &str {
        &self.default_file_type
    }

    pub fn max_blob_size(&self) -> u64 {
        self.max_blob_size
    }

    /// Number of allocated coordinates, pending ones included.
    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.records.is_empty()
    }

    /// Number of coordinates with a committed payload.
    pub async fn valid_count(&self) -> usize {
        self.state
            .read()
            .await
            .records
            .values()
            .filter(|r| r.valid)
            .count()
    }

    /// Every record, ordered by level, then row, then column.
    pub async fn records(&self) -> Vec<(TileCoordinate, IndexRecord)> {
        let state = self.state.read().await;
        let mut records: Vec<_> = state
            .records
            .iter()
            .map(|(coord, record)| (*coord, record.clone()))
            .collect();
        records.sort_by_key(|(coord, _)| coord.sort_key());
        records
    }

    /// Committed length of each blob id.
    pub async fn blob_lengths(&self) -> BTreeMap<u32, u64> {
        self.state.read().await.blobs.clone()
    }
}

// =============================================================================
// Tests
// =============================================================================
