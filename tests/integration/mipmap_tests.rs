//! Pyramid generation tests.
//!
//! Tests verify:
//! - Every ancestor of ingested data becomes valid
//! - A second run performs no writes
//! - Subtrees without ingested data stay NotFound
//! - Partial coverage composites with transparent placeholders

use plate_store::{PlateStore, TileCoordinate};

use super::test_utils::{open_counted, open_store, scratch_config, solid, BLOCK};

async fn assert_valid(store: &PlateStore, coord: TileCoordinate) {
    let read = store.read(coord).await.unwrap();
    assert!(read.record.valid, "{} should be valid", coord);
    assert!(read.image.is_some());
}

#[tokio::test]
async fn test_mipmap_generates_all_ancestors() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;

    // 2 x 3 blocks at level 2
    store.insert(&solid(8, 12, 90)).await.unwrap();
    let report = store.mipmap().await.unwrap();
    assert_eq!(report.generated, 3);

    assert_valid(&store, TileCoordinate::new(0, 0, 1)).await;
    assert_valid(&store, TileCoordinate::new(0, 1, 1)).await;
    assert_valid(&store, TileCoordinate::ROOT).await;

    let full = store.read(TileCoordinate::new(0, 0, 1)).await.unwrap();
    let full = full.image.unwrap();
    assert_eq!(full.dimensions(), (BLOCK, BLOCK));
    assert!(full.get_pixel(1, 1).0[3] > 0);

    // Bottom row of level 1 only has children on its top half
    let half = store.read(TileCoordinate::new(0, 1, 1)).await.unwrap();
    assert_eq!(half.image.unwrap().dimensions(), (BLOCK, BLOCK / 2));

    let root = store.read(TileCoordinate::ROOT).await.unwrap();
    assert_eq!(root.image.unwrap().dimensions(), (2, 3));
}

#[tokio::test]
async fn test_mipmap_is_memoized() {
    let dir = tempfile::tempdir().unwrap();
    let (store, codec) = open_counted(dir.path(), scratch_config(dir.path())).await;

    store.insert(&solid(8, 12, 30)).await.unwrap();
    assert_eq!(codec.encode_count(), 6);

    assert_eq!(store.mipmap().await.unwrap().generated, 3);
    assert_eq!(codec.encode_count(), 9);
    let decodes = codec.decode_count();
    assert!(decodes > 0);

    assert_eq!(store.mipmap().await.unwrap().generated, 0);
    assert_eq!(
        store
            .mipmap_from(TileCoordinate::new(0, 0, 1))
            .await
            .unwrap()
            .generated,
        0
    );
    assert_eq!(codec.encode_count(), 9);
    assert_eq!(codec.decode_count(), decodes);
}

#[tokio::test]
async fn test_untouched_subtrees_stay_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;

    store.insert(&solid(8, 12, 60)).await.unwrap();
    store.mipmap().await.unwrap();

    for coord in [
        TileCoordinate::new(1, 0, 1),
        TileCoordinate::new(1, 1, 1),
        TileCoordinate::new(2, 0, 2),
        TileCoordinate::new(0, 3, 2),
    ] {
        let err = store.read(coord).await.unwrap_err();
        assert!(err.is_not_found(), "{} should be NotFound", coord);
    }
}

#[tokio::test]
async fn test_partial_children_use_transparent_placeholders() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;

    store
        .write(TileCoordinate::new(3, 3, 2), &solid(BLOCK, BLOCK, 255))
        .await
        .unwrap();
    let report = store.mipmap().await.unwrap();
    assert_eq!(report.generated, 2);

    let parent = store.read(TileCoordinate::new(1, 1, 1)).await.unwrap();
    let parent = parent.image.unwrap();
    assert_eq!(parent.dimensions(), (BLOCK, BLOCK));
    // Far corner from the only child is transparent
    assert_eq!(parent.get_pixel(0, 0).0[3], 0);
    assert!(parent.get_pixel(3, 3).0[3] > 0);

    let root = store.read(TileCoordinate::ROOT).await.unwrap();
    assert_eq!(root.image.unwrap().dimensions(), (BLOCK, BLOCK));
}

#[tokio::test]
async fn test_mipmap_from_subtree() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;
    store.insert(&solid(8, 12, 45)).await.unwrap();

    let report = store
        .mipmap_from(TileCoordinate::new(0, 1, 1))
        .await
        .unwrap();
    assert_eq!(report.generated, 1);
    assert!(!store.read(TileCoordinate::ROOT).await.unwrap().record.valid);

    assert_eq!(store.mipmap().await.unwrap().generated, 2);
}

#[tokio::test]
async fn test_mipmap_on_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;
    assert_eq!(store.mipmap().await.unwrap().generated, 0);
    assert!(store.records().await.is_empty());
}

#[tokio::test]
async fn test_deep_pyramid_terminates() {
    let dir = tempfile::tempdir().unwrap();
    let config = scratch_config(dir.path()).with_block_size(1);
    let store = PlateStore::open(dir.path().join("deep.plate"), config)
        .await
        .unwrap();

    // 1-pixel blocks: a 16 x 1 image lands at level 4
    let report = store.insert(&solid(16, 1, 200)).await.unwrap();
    assert_eq!(report.level, 4);

    // Level 3 has 8 tiles, level 2 has 4, level 1 has 2, plus the root
    let mipmap = store.mipmap().await.unwrap();
    assert_eq!(mipmap.generated, 8 + 4 + 2 + 1);

    let valid = store
        .records()
        .await
        .into_iter()
        .filter(|(_, record)| record.valid)
        .count();
    assert_eq!(valid, 16 + 15);
}
