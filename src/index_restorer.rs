use std::io::Read;

use uuid::Uuid;

use crate::checkpoint::{CheckpointStore, IndexCheckpointInfo};
use crate::error::Result;
use crate::hash_index::HashIndex;
use crate::io::Io;

fn read_file(path: &std::path::Path) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    std::fs::File::open(path)?.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Materialises the fuzzy hash index captured in an index checkpoint into a
/// live [`HashIndex`], and hands back the checkpoint's metadata so the
/// caller can copy `object_log_segment_offsets` into the log and pick up
/// `final_logical_address` for the compatibility check.
pub struct IndexRestorer;

impl IndexRestorer {
    #[tracing::instrument(skip(store, index))]
    pub fn restore<IO: Io>(
        store: &CheckpointStore<IO>,
        token: Uuid,
        index: &HashIndex,
    ) -> Result<IndexCheckpointInfo> {
        let info = store.load_index_info(token)?;
        let mut chunk = 0u32;
        let mut installed = 0usize;
        loop {
            let path = store.layout().hash_table_chunk_path(token, chunk);
            if !path.exists() {
                break;
            }
            let bytes = read_file(&path)?;
            for entry in bytes.chunks_exact(16) {
                let hash = u64::from_le_bytes(entry[0..8].try_into().unwrap());
                let address = u64::from_le_bytes(entry[8..16].try_into().unwrap());
                index.restore_entry(hash, address);
                installed += 1;
            }
            chunk += 1;
        }
        tracing::debug!(installed, chunks = chunk, "restored fuzzy index");
        Ok(info)
    }

    /// Test/setup helper mirroring how a checkpoint creator would persist
    /// one hash-table chunk: a flat sequence of `(hash: u64, address: u64)`
    /// little-endian pairs.
    pub fn write_chunk<IO: Io>(
        store: &CheckpointStore<IO>,
        token: Uuid,
        chunk: u32,
        entries: &[(u64, u64)],
    ) -> Result<()> {
        let mut buf = Vec::with_capacity(entries.len() * 16);
        for (hash, address) in entries {
            buf.extend_from_slice(&hash.to_le_bytes());
            buf.extend_from_slice(&address.to_le_bytes());
        }
        std::fs::write(store.layout().hash_table_chunk_path(token, chunk), buf)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::checkpoint::DirectoryLayout;
    use crate::hash_index::tag_of;
    use crate::io::StdIO;

    #[test]
    fn restore_installs_every_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(StdIO::default(), DirectoryLayout::new(tmp.path()));
        let token = Uuid::new_v4();
        store
            .write_index_checkpoint(
                token,
                &IndexCheckpointInfo {
                    final_logical_address: 4096,
                    object_log_segment_offsets: vec![0, 4096],
                },
            )
            .unwrap();
        IndexRestorer::write_chunk(&store, token, 0, &[(10, 100), (20, 200)]).unwrap();

        let index = HashIndex::with_capacity(16);
        let info = IndexRestorer::restore(&store, token, &index).unwrap();
        assert_eq!(info.final_logical_address, 4096);
        assert_eq!(index.lookup(10, tag_of(10)).unwrap().address(), 100);
        assert_eq!(index.lookup(20, tag_of(20)).unwrap().address(), 200);
    }
}
