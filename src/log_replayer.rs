use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::address::{self, LogicalAddress};
use crate::error::Result;
use crate::hash_index::{tag_of, HashBucketEntry, HashIndex};
use crate::io::Io;
use crate::page_io::PageIo;
use crate::record;

/// `hash64` is deliberately `DefaultHasher`-based (fixed keys, no per-process
/// randomization) so that replay is reproducible across runs in tests.
fn hash64(key: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub pages_replayed: u64,
    pub installed: usize,
    pub rewound: usize,
}

/// Walks the log tail page by page, installing each record with
/// `version <= version` into the hash index and invalidating (and, where
/// possible, rewinding) every record with a higher version.
pub struct LogReplayer;

impl LogReplayer {
    #[tracing::instrument(skip(page_io, index))]
    pub async fn replay<IO: Io>(
        page_io: &Arc<PageIo<IO>>,
        index: &HashIndex,
        from_address: LogicalAddress,
        until_address: LogicalAddress,
        page_size: u32,
        version: u16,
    ) -> Result<ReplayStats> {
        let start_page = address::page_of(from_address, page_size);
        let end_page = address::page_ceil(until_address, page_size);
        page_io.prime(start_page);

        let mut stats = ReplayStats::default();
        for page in start_page..end_page {
            page_io.wait_read(page).await?;

            let page_start_addr = address::page_start(page, page_size);
            let page_end_addr = address::page_end(page, page_size);
            let page_from = if from_address > page_start_addr {
                (from_address - page_start_addr) as usize
            } else {
                0
            };
            let page_until = if until_address < page_end_addr {
                (until_address - page_start_addr) as usize
            } else {
                page_size as usize
            };

            page_io.with_frame_mut(page, |bytes| {
                recover_from_page(
                    bytes,
                    page_start_addr,
                    page_from,
                    page_until,
                    version,
                    from_address,
                    index,
                    &mut stats,
                )
            });

            page_io.flush_page(page);
            stats.pages_replayed += 1;
        }

        for page in start_page..end_page {
            page_io.wait_flush(page).await?;
        }

        Ok(stats)
    }
}

/// The inner per-page record walk. `start_recovery_address` is the lower
/// bound of the fuzzy region (`from_address`): a rewound record whose
/// `previous_address` falls below it is installed directly since no further
/// replay pass will ever reach a more authoritative version of that key.
/// `previous_address == 0` is the sentinel for "no ancestor" rather than a
/// real address, so it is never installed even though `0 < start_recovery_address`
/// would otherwise hold whenever the fuzzy region doesn't start at the
/// beginning of the log.
fn recover_from_page(
    bytes: &mut [u8],
    page_start_addr: LogicalAddress,
    page_from: usize,
    page_until: usize,
    version: u16,
    start_recovery_address: LogicalAddress,
    index: &HashIndex,
    stats: &mut ReplayStats,
) {
    let mut pointer = page_from;
    while pointer < page_until {
        let info = record::read_info(&bytes[pointer..]);

        if info.is_null() {
            pointer += 8;
            continue;
        }

        if info.is_invalid() {
            pointer += record::record_size(&bytes[pointer..]);
            continue;
        }

        let record_size = record::record_size(&bytes[pointer..]);
        debug_assert!(
            pointer + record_size <= page_until,
            "record at {pointer} (size {record_size}) crosses the page boundary at {page_until}"
        );
        let key = record::read_key(&bytes[pointer..]);
        let hash = hash64(key);
        let tag = tag_of(hash);
        let (handle, _existing) = index.find_or_create_tag(hash, tag, start_recovery_address);
        let logical_address = page_start_addr + pointer as u64;

        if info.version() <= version {
            index.install(&handle, HashBucketEntry::new(tag, logical_address));
            stats.installed += 1;
        } else {
            let mut fixed = info;
            fixed.set_invalid(true);
            record::write_info(&mut bytes[pointer..], &fixed);

            if info.previous_address() != 0 && info.previous_address() < start_recovery_address {
                index.install(&handle, HashBucketEntry::new(tag, info.previous_address()));
            }
            stats.rewound += 1;
        }

        pointer += record_size;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::file::FileExt;
    use crate::io::{Io, StdIO};
    use crate::record::RecordInfo;

    fn put(buf: &mut Vec<u8>, version: u16, previous_address: u64, tombstone: bool, key: &[u8], value: &[u8]) {
        let info = RecordInfo::new(version, previous_address, tombstone);
        buf.extend_from_slice(&record::encode(&info, key, value));
    }

    #[tokio::test]
    async fn installs_records_at_or_below_version() {
        let io = StdIO::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log");
        let page_size = 1024u32;

        let mut page = Vec::new();
        put(&mut page, 1, 0, false, b"k1", b"v1");
        put(&mut page, 2, 0, false, b"k2", b"v2");
        page.resize(page_size as usize, 0);

        let file = io.open(true, true, true, &path).unwrap();
        file.write_all_at(&page, 0).unwrap();
        let device = Arc::new(file);

        let page_io = PageIo::<StdIO>::new(device, None, page_size, 4, 1);
        let index = HashIndex::with_capacity(16);

        let stats = LogReplayer::replay(&page_io, &index, 0, page.len() as u64, page_size, 1)
            .await
            .unwrap();

        assert_eq!(stats.installed, 1);
        assert_eq!(stats.rewound, 1);
        assert!(index.lookup(hash64(b"k1"), tag_of(hash64(b"k1"))).is_some());
        assert!(index.lookup(hash64(b"k2"), tag_of(hash64(b"k2"))).is_none());
    }

    #[tokio::test]
    async fn rewinds_to_previous_address_below_fuzzy_region() {
        let io = StdIO::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log");
        let page_size = 1024u32;

        // Two null headers (16 bytes) precede the scan window; a v2 record
        // whose previous_address (8) predates it should rewind the bucket to 8.
        let from_address = 16u64;
        let mut page = vec![0u8; from_address as usize];
        put(&mut page, 2, 8, false, b"key", b"value");
        page.resize(page_size as usize, 0);

        let file = io.open(true, true, true, &path).unwrap();
        file.write_all_at(&page, 0).unwrap();
        let device = Arc::new(file);

        let page_io = PageIo::<StdIO>::new(device, None, page_size, 4, 1);
        let index = HashIndex::with_capacity(16);

        let stats = LogReplayer::replay(&page_io, &index, from_address, page.len() as u64, page_size, 1)
            .await
            .unwrap();

        assert_eq!(stats.rewound, 1);
        let hash = hash64(b"key");
        assert_eq!(index.lookup(hash, tag_of(hash)).unwrap().address(), 8);
    }

    #[tokio::test]
    async fn rewind_with_no_ancestor_leaves_bucket_untouched() {
        let io = StdIO::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log");
        let page_size = 1024u32;

        // previous_address is 0 (no real ancestor), even though the fuzzy
        // region starts past address 0: the record must not install a bogus
        // entry pointing at logical address 0.
        let from_address = 16u64;
        let mut page = vec![0u8; from_address as usize];
        put(&mut page, 2, 0, false, b"key", b"value");
        page.resize(page_size as usize, 0);

        let file = io.open(true, true, true, &path).unwrap();
        file.write_all_at(&page, 0).unwrap();
        let device = Arc::new(file);

        let page_io = PageIo::<StdIO>::new(device, None, page_size, 4, 1);
        let index = HashIndex::with_capacity(16);

        let stats = LogReplayer::replay(&page_io, &index, from_address, page.len() as u64, page_size, 1)
            .await
            .unwrap();

        assert_eq!(stats.rewound, 1);
        let hash = hash64(b"key");
        assert!(index.lookup(hash, tag_of(hash)).is_none());
    }
}
