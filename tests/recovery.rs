use std::sync::Arc;

use faster_recovery::checkpoint::{CheckpointKind, CheckpointStore, DirectoryLayout, HybridLogCheckpointInfo, IndexCheckpointInfo};
use faster_recovery::config::RecoveryConfig;
use faster_recovery::error::Error;
use faster_recovery::hash_index::{tag_of, HashIndex};
use faster_recovery::index_restorer::IndexRestorer;
use faster_recovery::io::file::FileExt;
use faster_recovery::io::{Io, StdIO};
use faster_recovery::record::{self, RecordInfo};
use faster_recovery::recovery_driver::RecoveryDriver;

fn hash_of(key: &[u8]) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut h = std::collections::hash_map::DefaultHasher::new();
    key.hash(&mut h);
    h.finish()
}

struct Fixture {
    _root: tempfile::TempDir,
    root_path: std::path::PathBuf,
    log_path: std::path::PathBuf,
}

fn write_page(page_size: u32, records: &[(u16, u64, &[u8], &[u8])]) -> Vec<u8> {
    let mut page = Vec::new();
    for (version, previous, key, value) in records {
        let info = RecordInfo::new(*version, *previous, false);
        page.extend_from_slice(&record::encode(&info, key, value));
    }
    page.resize(page_size as usize, 0);
    page
}

fn setup(page_size: u32, pages: &[Vec<u8>]) -> Fixture {
    let _ = tracing_subscriber::fmt::try_init();
    let root = tempfile::tempdir().unwrap();
    let io = StdIO::default();
    let log_path = root.path().join("hlog.dat");
    let file = io.open(true, true, true, &log_path).unwrap();
    for (i, page) in pages.iter().enumerate() {
        file.write_all_at(page, i as u64 * page_size as u64).unwrap();
    }
    Fixture {
        root_path: root.path().to_path_buf(),
        log_path,
        _root: root,
    }
}

#[tokio::test]
async fn recovers_latest_version_and_rewinds_stale_records() {
    let page_size = 1024u32;
    let pages = vec![write_page(
        page_size,
        &[
            (1, 0, b"alive", b"v1"),
            (2, 0, b"stale", b"v2-too-new"),
        ],
    )];
    let fixture = setup(page_size, &pages);

    let io = StdIO::default();
    let layout = DirectoryLayout::new(fixture.root_path.clone());
    let store = Arc::new(CheckpointStore::new(io.clone(), layout));

    let index_token = io.uuid();
    store
        .write_index_checkpoint(
            index_token,
            &IndexCheckpointInfo {
                final_logical_address: 0,
                object_log_segment_offsets: vec![],
            },
        )
        .unwrap();

    let log_token = io.uuid();
    store
        .write_log_checkpoint(
            log_token,
            &HybridLogCheckpointInfo {
                version: 1,
                flushed_logical_address: 0,
                final_logical_address: page_size as u64,
                start_logical_address: 0,
                continue_tokens: Default::default(),
            },
        )
        .unwrap();

    let index = Arc::new(HashIndex::with_capacity(16));
    let config = RecoveryConfig::new(fixture.root_path.clone(), fixture.log_path.clone(), page_size, 4);
    let driver = RecoveryDriver::new(io, store, index.clone(), config);

    let stats = driver.recover().await.unwrap();
    assert_eq!(stats.installed, 1);
    assert_eq!(stats.rewound, 1);
    assert_eq!(stats.new_version, 2);

    let alive_hash = hash_of(b"alive");
    assert!(index.lookup(alive_hash, tag_of(alive_hash)).is_some());
    let stale_hash = hash_of(b"stale");
    // previous_address for "stale" is 0, which is not < start_logical_address (0),
    // so the slot is left untouched rather than installed.
    assert!(index.lookup(stale_hash, tag_of(stale_hash)).is_none());
}

#[tokio::test]
async fn rejects_incompatible_checkpoint_pair() {
    let page_size = 1024u32;
    let pages = vec![write_page(page_size, &[])];
    let fixture = setup(page_size, &pages);

    let io = StdIO::default();
    let layout = DirectoryLayout::new(fixture.root_path.clone());
    let store = Arc::new(CheckpointStore::new(io.clone(), layout));

    let index_token = io.uuid();
    store
        .write_index_checkpoint(
            index_token,
            &IndexCheckpointInfo {
                final_logical_address: 10_000,
                object_log_segment_offsets: vec![],
            },
        )
        .unwrap();

    // A non-empty hash-table chunk: a correct driver must never let this
    // reach the live index, since the pair below is incompatible.
    IndexRestorer::write_chunk(&store, index_token, 0, &[(42, 4_096)]).unwrap();

    let log_token = io.uuid();
    store
        .write_log_checkpoint(
            log_token,
            &HybridLogCheckpointInfo {
                version: 1,
                flushed_logical_address: 0,
                final_logical_address: 8_000,
                start_logical_address: 0,
                continue_tokens: Default::default(),
            },
        )
        .unwrap();

    let index = Arc::new(HashIndex::with_capacity(16));
    let config = RecoveryConfig::new(fixture.root_path.clone(), fixture.log_path.clone(), page_size, 4);
    let driver = RecoveryDriver::new(io, store, index.clone(), config);

    let err = driver.recover().await.unwrap_err();
    assert!(matches!(err, Error::Incompatible { index_final: 10_000, log_final: 8_000 }));
    assert!(
        index.lookup(42, tag_of(42)).is_none(),
        "a rejected incompatible pair must not mutate the live index"
    );
}

#[tokio::test]
async fn incomplete_checkpoint_is_pruned_and_ignored() {
    let page_size = 1024u32;
    let pages = vec![write_page(page_size, &[(1, 0, b"k", b"v")])];
    let fixture = setup(page_size, &pages);

    let io = StdIO::default();
    let layout = DirectoryLayout::new(fixture.root_path.clone());
    let store = Arc::new(CheckpointStore::new(io.clone(), layout));

    // A half-written checkpoint: info.dat present, no completed.dat.
    let half_written = io.uuid();
    let half_dir = store.layout().index_checkpoint_dir(half_written);
    std::fs::create_dir_all(&half_dir).unwrap();
    std::fs::write(half_dir.join("info.dat"), b"garbage").unwrap();

    let index_token = io.uuid();
    std::thread::sleep(std::time::Duration::from_millis(5));
    store
        .write_index_checkpoint(
            index_token,
            &IndexCheckpointInfo {
                final_logical_address: 0,
                object_log_segment_offsets: vec![],
            },
        )
        .unwrap();
    IndexRestorer::write_chunk(&store, index_token, 0, &[]).unwrap();

    let log_token = io.uuid();
    store
        .write_log_checkpoint(
            log_token,
            &HybridLogCheckpointInfo {
                version: 1,
                flushed_logical_address: 0,
                final_logical_address: page_size as u64,
                start_logical_address: 0,
                continue_tokens: Default::default(),
            },
        )
        .unwrap();

    let index = Arc::new(HashIndex::with_capacity(16));
    let config = RecoveryConfig::new(fixture.root_path.clone(), fixture.log_path.clone(), page_size, 4);
    let driver = RecoveryDriver::new(io, store.clone(), index, config);

    driver.recover().await.unwrap();
    assert!(!half_dir.exists(), "incomplete checkpoint should have been pruned");
    assert_eq!(store.latest_token(CheckpointKind::IndexOnly).unwrap(), index_token);
}

#[tokio::test]
async fn bounded_ring_replays_more_pages_than_its_capacity() {
    let page_size = 128u32;
    let num_pages = 12u64;
    let mut pages = Vec::new();
    for i in 0..num_pages {
        let key = format!("k{i}");
        pages.push(write_page(page_size, &[(1, 0, key.as_bytes(), b"v")]));
    }
    let fixture = setup(page_size, &pages);

    let io = StdIO::default();
    let layout = DirectoryLayout::new(fixture.root_path.clone());
    let store = Arc::new(CheckpointStore::new(io.clone(), layout));

    let index_token = io.uuid();
    store
        .write_index_checkpoint(
            index_token,
            &IndexCheckpointInfo {
                final_logical_address: 0,
                object_log_segment_offsets: vec![],
            },
        )
        .unwrap();

    let log_token = io.uuid();
    store
        .write_log_checkpoint(
            log_token,
            &HybridLogCheckpointInfo {
                version: 1,
                flushed_logical_address: 0,
                final_logical_address: num_pages * page_size as u64,
                start_logical_address: 0,
                continue_tokens: Default::default(),
            },
        )
        .unwrap();

    let index = Arc::new(HashIndex::with_capacity(32));
    // ring_capacity (4) is far smaller than num_pages (12): replay must
    // recycle frames via the flush-triggered read-ahead to get through the
    // whole log without growing memory.
    let config = RecoveryConfig::new(fixture.root_path.clone(), fixture.log_path.clone(), page_size, 4);
    let driver = RecoveryDriver::new(io, store, index.clone(), config);

    let stats = driver.recover().await.unwrap();
    assert_eq!(stats.pages_replayed, num_pages);
    assert_eq!(stats.installed, num_pages as usize);
}
