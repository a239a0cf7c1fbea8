use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::io::Io;

use super::info::{HybridLogCheckpointInfo, IndexCheckpointInfo};
use super::layout::{CheckpointKind, DirectoryLayout, COMPLETED_MARKER, INFO_FILE};

/// Discovers, prunes, and loads checkpoint metadata from disk.
pub struct CheckpointStore<IO> {
    io: IO,
    layout: DirectoryLayout,
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    std::fs::File::open(path)?.read_to_end(&mut buf)?;
    Ok(buf)
}

fn list_tokens(dir: &Path) -> Vec<(Uuid, SystemTime)> {
    if !dir.exists() {
        return Vec::new();
    }
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .filter_map(|e| {
            let token = Uuid::parse_str(e.file_name().to_str()?).ok()?;
            let modified = e.metadata().ok()?.modified().ok()?;
            Some((token, modified))
        })
        .collect()
}

impl<IO: Io> CheckpointStore<IO> {
    pub fn new(io: IO, layout: DirectoryLayout) -> Self {
        Self { io, layout }
    }

    pub fn layout(&self) -> &DirectoryLayout {
        &self.layout
    }

    /// Deletes every checkpoint folder lacking a `completed.dat` marker.
    /// Safe against concurrent checkpoint creators: a folder only appears
    /// with the marker once its writer has fsynced everything else.
    #[tracing::instrument(skip(self))]
    pub fn prune_incomplete(&self) -> Result<()> {
        for dir in [
            self.layout.index_checkpoints_dir(),
            self.layout.log_checkpoints_dir(),
        ] {
            for (token, _) in list_tokens(&dir) {
                let folder = dir.join(token.to_string());
                if !folder.join(COMPLETED_MARKER).exists() {
                    tracing::warn!(?folder, "pruning incomplete checkpoint");
                    std::fs::remove_dir_all(&folder)?;
                }
            }
        }
        Ok(())
    }

    /// Returns the token of the most recently modified complete checkpoint
    /// of the given kind's directory, or `NoCheckpoint` if none exists.
    pub fn latest_token(&self, kind: CheckpointKind) -> Result<Uuid> {
        let dir = match kind {
            CheckpointKind::IndexOnly => self.layout.index_checkpoints_dir(),
            CheckpointKind::HybridLogOnly => self.layout.log_checkpoints_dir(),
            CheckpointKind::Full => {
                panic!("latest_token is only defined for a single checkpoint kind")
            }
        };
        list_tokens(&dir)
            .into_iter()
            .filter(|(token, _)| self.is_safe(*token, kind).unwrap_or(false))
            .max_by_key(|(_, modified)| *modified)
            .map(|(token, _)| token)
            .ok_or_else(|| Error::NoCheckpoint(dir))
    }

    /// `true` iff the given token's folder(s) contain a `completed.dat`
    /// marker. `Full` requires both an index and a log checkpoint at the
    /// *same* token.
    pub fn is_safe(&self, token: Uuid, kind: CheckpointKind) -> Result<bool> {
        let check = |dir: PathBuf| dir.join(COMPLETED_MARKER).exists();
        Ok(match kind {
            CheckpointKind::IndexOnly => check(self.layout.index_checkpoint_dir(token)),
            CheckpointKind::HybridLogOnly => check(self.layout.log_checkpoint_dir(token)),
            CheckpointKind::Full => {
                check(self.layout.index_checkpoint_dir(token))
                    && check(self.layout.log_checkpoint_dir(token))
            }
        })
    }

    pub fn load_index_info(&self, token: Uuid) -> Result<IndexCheckpointInfo> {
        let dir = self.layout.index_checkpoint_dir(token);
        if !dir.join(COMPLETED_MARKER).exists() {
            return Err(Error::MissingMarker(dir));
        }
        let path = dir.join(INFO_FILE);
        let bytes = read_file(&path)?;
        IndexCheckpointInfo::decode(&bytes, &path)
    }

    pub fn load_log_info(&self, token: Uuid) -> Result<HybridLogCheckpointInfo> {
        let dir = self.layout.log_checkpoint_dir(token);
        if !dir.join(COMPLETED_MARKER).exists() {
            return Err(Error::MissingMarker(dir));
        }
        let path = dir.join(INFO_FILE);
        let bytes = read_file(&path)?;
        HybridLogCheckpointInfo::decode(&bytes, &path)
    }

    /// Test/setup helper: writes a complete checkpoint folder with the given
    /// info, via the injected `Io`.
    pub fn write_index_checkpoint(&self, token: Uuid, info: &IndexCheckpointInfo) -> Result<()> {
        let dir = self.layout.index_checkpoint_dir(token);
        self.io.create_dir_all(&dir)?;
        std::fs::write(dir.join(INFO_FILE), info.encode())?;
        std::fs::write(dir.join(COMPLETED_MARKER), [])?;
        Ok(())
    }

    pub fn write_log_checkpoint(&self, token: Uuid, info: &HybridLogCheckpointInfo) -> Result<()> {
        let dir = self.layout.log_checkpoint_dir(token);
        self.io.create_dir_all(&dir)?;
        std::fs::write(dir.join(INFO_FILE), info.encode())?;
        std::fs::write(dir.join(COMPLETED_MARKER), [])?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::StdIO;
    use std::collections::HashMap;

    fn store(root: &Path) -> CheckpointStore<StdIO> {
        CheckpointStore::new(StdIO::default(), DirectoryLayout::new(root))
    }

    #[test]
    fn prune_removes_folders_without_marker() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        let token = Uuid::new_v4();
        let dir = store.layout().index_checkpoint_dir(token);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(INFO_FILE), b"whatever").unwrap();

        store.prune_incomplete().unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn latest_token_picks_newest_complete() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());

        let older = Uuid::new_v4();
        store
            .write_index_checkpoint(
                older,
                &IndexCheckpointInfo {
                    final_logical_address: 10,
                    object_log_segment_offsets: vec![],
                },
            )
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let newer = Uuid::new_v4();
        store
            .write_index_checkpoint(
                newer,
                &IndexCheckpointInfo {
                    final_logical_address: 20,
                    object_log_segment_offsets: vec![],
                },
            )
            .unwrap();

        assert_eq!(
            store.latest_token(CheckpointKind::IndexOnly).unwrap(),
            newer
        );
    }

    #[test]
    fn missing_marker_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        let token = Uuid::new_v4();
        let dir = store.layout().index_checkpoint_dir(token);
        std::fs::create_dir_all(&dir).unwrap();
        assert!(matches!(
            store.load_index_info(token),
            Err(Error::MissingMarker(_))
        ));
    }

    #[test]
    fn log_checkpoint_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = store(tmp.path());
        let token = Uuid::new_v4();
        let info = HybridLogCheckpointInfo {
            version: 1,
            flushed_logical_address: 0,
            final_logical_address: 4096,
            start_logical_address: 0,
            continue_tokens: HashMap::new(),
        };
        store.write_log_checkpoint(token, &info).unwrap();
        let loaded = store.load_log_info(token).unwrap();
        assert_eq!(loaded, info);
    }
}
