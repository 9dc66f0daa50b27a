//! Single-tile and ingestion tests.
//!
//! Tests verify:
//! - Written tiles read back bit-identical
//! - Never-allocated coordinates are NotFound, pending ones are not errors
//! - Ingested blocks cover the source image exactly
//! - Small blob bounds roll writes over to new blob files

use image::imageops;

use plate_store::error::{BlobError, IndexError};
use plate_store::io::blob_file_name;
use plate_store::tile::image_blocks;
use plate_store::{PlateError, PlateStore, TileCoordinate};

use super::test_utils::{gradient, open_store, scratch_config, solid, staging_leftovers, BLOCK};

// =============================================================================
// Round Trip
// =============================================================================

#[tokio::test]
async fn test_round_trip_is_bit_identical() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;

    let tiles = [
        (TileCoordinate::new(0, 0, 2), gradient(BLOCK, BLOCK)),
        (TileCoordinate::new(3, 1, 2), solid(BLOCK, BLOCK, 200)),
        (TileCoordinate::new(2, 3, 2), gradient(3, 1)),
    ];
    for (coord, tile) in &tiles {
        store.write(*coord, tile).await.unwrap();
    }

    for (coord, tile) in &tiles {
        let read = store.read(*coord).await.unwrap();
        assert!(read.record.valid);
        assert_eq!(read.image.as_ref(), Some(tile), "tile {} differs", coord);
    }
    assert_eq!(staging_leftovers(dir.path()), 0);
}

#[tokio::test]
async fn test_overwrite_returns_latest() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;
    let coord = TileCoordinate::new(1, 1, 1);

    store.write(coord, &solid(BLOCK, BLOCK, 10)).await.unwrap();
    let first = store.read(coord).await.unwrap().record;
    store.write(coord, &solid(BLOCK, BLOCK, 20)).await.unwrap();
    let second = store.read(coord).await.unwrap();

    assert_eq!(second.image.unwrap(), solid(BLOCK, BLOCK, 20));
    assert!(second.record.blob_offset > first.blob_offset);
}

#[tokio::test]
async fn test_jpeg_plate_round_trip_is_close() {
    let dir = tempfile::tempdir().unwrap();
    let config = scratch_config(dir.path())
        .with_block_size(16)
        .with_file_type("jpg")
        .with_jpeg_quality(95);
    let store = PlateStore::open(dir.path().join("jpeg.plate"), config)
        .await
        .unwrap();

    let tile = solid(16, 16, 120);
    store.write(TileCoordinate::ROOT, &tile).await.unwrap();
    let read = store.read(TileCoordinate::ROOT).await.unwrap();
    assert_eq!(read.record.file_type, "jpg");

    let image = read.image.unwrap();
    assert_eq!(image.dimensions(), (16, 16));
    for (a, b) in image.pixels().zip(tile.pixels()) {
        for channel in 0..3 {
            assert!((a.0[channel] as i16 - b.0[channel] as i16).abs() <= 4);
        }
        assert_eq!(a.0[3], 255);
    }
}

// =============================================================================
// Unallocated vs Pending
// =============================================================================

#[tokio::test]
async fn test_unallocated_vs_pending() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;
    store
        .write(TileCoordinate::new(5, 2, 3), &gradient(BLOCK, BLOCK))
        .await
        .unwrap();

    // Ancestors of the committed tile are allocated but not generated
    for coord in [
        TileCoordinate::new(2, 1, 2),
        TileCoordinate::new(1, 0, 1),
        TileCoordinate::ROOT,
    ] {
        let read = store.read(coord).await.unwrap();
        assert!(!read.record.valid, "{} should be pending", coord);
        assert!(read.image.is_none());
    }

    // Siblings and cousins outside the footprint were never allocated
    for coord in [
        TileCoordinate::new(4, 2, 3),
        TileCoordinate::new(0, 0, 2),
        TileCoordinate::new(0, 0, 1),
    ] {
        let err = store.read(coord).await.unwrap_err();
        assert!(
            matches!(err, PlateError::Index(IndexError::TileNotFound(c)) if c == coord),
            "{} should be NotFound, got {:?}",
            coord,
            err
        );
    }
}

#[tokio::test]
async fn test_write_rejects_levels_past_max() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;

    let deep = TileCoordinate::new(u32::MAX, 0, 200_000);
    let err = store.write(deep, &gradient(BLOCK, BLOCK)).await.unwrap_err();
    assert!(matches!(
        err,
        PlateError::Index(IndexError::InvalidCoordinate(c)) if c == deep
    ));

    assert!(store.records().await.is_empty());
    assert_eq!(store.depth().await, 0);
    assert_eq!(store.mipmap().await.unwrap().generated, 0);
}

// =============================================================================
// Ingestion
// =============================================================================

#[tokio::test]
async fn test_insert_covers_image() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;

    let image = gradient(8, 12);
    let report = store.insert(&image).await.unwrap();
    assert_eq!((report.block_cols, report.block_rows), (2, 3));
    assert_eq!(report.level, 2);
    assert_eq!(report.written, 6);
    assert!(report.is_complete());
    assert_eq!(store.depth().await, 2);

    for block in image_blocks(8, 12, BLOCK, BLOCK) {
        let coord = TileCoordinate::new(block.x / BLOCK, block.y / BLOCK, 2);
        let expected =
            imageops::crop_imm(&image, block.x, block.y, block.width, block.height).to_image();
        let read = store.read(coord).await.unwrap();
        assert_eq!(read.image.unwrap(), expected, "block {}", coord);
    }

    // Outside the 2x3 grid at level 2
    assert!(store
        .read(TileCoordinate::new(3, 0, 2))
        .await
        .unwrap_err()
        .is_not_found());
    assert_eq!(staging_leftovers(dir.path()), 0);
}

#[tokio::test]
async fn test_insert_partial_edge_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;

    let report = store.insert(&gradient(9, 5)).await.unwrap();
    assert_eq!((report.block_cols, report.block_rows), (3, 2));
    assert_eq!(report.level, 2);

    let corner = store
        .read(TileCoordinate::new(2, 1, 2))
        .await
        .unwrap()
        .image
        .unwrap();
    assert_eq!(corner.dimensions(), (1, 1));
}

#[tokio::test]
async fn test_empty_image_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;

    let report = store.insert(&gradient(0, 0)).await.unwrap();
    assert_eq!(report.written, 0);
    assert!(report.failures.is_empty());
    assert!(store.records().await.is_empty());
}

// =============================================================================
// Blob Allocation
// =============================================================================

#[tokio::test]
async fn test_blob_rollover() {
    let dir = tempfile::tempdir().unwrap();
    let config = scratch_config(dir.path()).with_max_blob_size(1);
    let store = PlateStore::open(dir.path().join("roll.plate"), config)
        .await
        .unwrap();

    for col in 0..3 {
        store
            .write(TileCoordinate::new(col, 0, 2), &solid(BLOCK, BLOCK, col as u8))
            .await
            .unwrap();
    }

    let mut blob_ids: Vec<u32> = store
        .records()
        .await
        .into_iter()
        .filter(|(_, record)| record.valid)
        .map(|(_, record)| record.blob_id)
        .collect();
    blob_ids.sort_unstable();
    assert_eq!(blob_ids, vec![0, 1, 2]);

    for id in 0..3 {
        assert!(store.path().join(blob_file_name(id)).is_file());
    }
    for col in 0..3 {
        let read = store.read(TileCoordinate::new(col, 0, 2)).await.unwrap();
        assert_eq!(read.image.unwrap(), solid(BLOCK, BLOCK, col as u8));
    }
}

#[tokio::test]
async fn test_truncated_blob_is_range_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;
    let coord = TileCoordinate::new(0, 1, 1);
    store.write(coord, &gradient(BLOCK, BLOCK)).await.unwrap();

    let blob = store.path().join(blob_file_name(0));
    let file = std::fs::OpenOptions::new().write(true).open(&blob).unwrap();
    file.set_len(3).unwrap();

    let err = store.read(coord).await.unwrap_err();
    assert!(matches!(
        err,
        PlateError::Blob(BlobError::RangeOutOfBounds { blob_id: 0, .. })
    ));
}

#[tokio::test]
async fn test_failed_append_removes_staging_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;
    let coord = TileCoordinate::new(1, 0, 1);

    // A directory in place of the first blob makes the append fail after staging
    std::fs::create_dir(store.path().join(blob_file_name(0))).unwrap();

    let err = store.write(coord, &gradient(BLOCK, BLOCK)).await.unwrap_err();
    assert!(
        matches!(err, PlateError::Blob(BlobError::Io { .. })),
        "expected blob io error, got {:?}",
        err
    );
    assert_eq!(staging_leftovers(dir.path()), 0);
    assert!(store.read(coord).await.unwrap_err().is_not_found());
    assert!(store.records().await.is_empty());
}
