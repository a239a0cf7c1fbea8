use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Distinguishes the two independent checkpoint kinds recovery reasons about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointKind {
    IndexOnly,
    HybridLogOnly,
    /// Both an index and a log checkpoint are present and compatible.
    Full,
}

/// Resolves on-disk paths for index and log checkpoints by token, per:
///
/// ```text
/// <root>/index-checkpoints/<token>/{completed.dat,info.dat,ht.<n>.dat}
/// <root>/cpr-checkpoints/<token>/{completed.dat,info.dat,snapshot.dat,snapshot.obj.dat}
/// ```
#[derive(Debug, Clone)]
pub struct DirectoryLayout {
    root: PathBuf,
}

pub const COMPLETED_MARKER: &str = "completed.dat";
pub const INFO_FILE: &str = "info.dat";
pub const SNAPSHOT_FILE: &str = "snapshot.dat";
pub const SNAPSHOT_OBJ_FILE: &str = "snapshot.obj.dat";

impl DirectoryLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_checkpoints_dir(&self) -> PathBuf {
        self.root.join("index-checkpoints")
    }

    pub fn log_checkpoints_dir(&self) -> PathBuf {
        self.root.join("cpr-checkpoints")
    }

    pub fn index_checkpoint_dir(&self, token: Uuid) -> PathBuf {
        self.index_checkpoints_dir().join(token.to_string())
    }

    pub fn log_checkpoint_dir(&self, token: Uuid) -> PathBuf {
        self.log_checkpoints_dir().join(token.to_string())
    }

    pub fn index_info_path(&self, token: Uuid) -> PathBuf {
        self.index_checkpoint_dir(token).join(INFO_FILE)
    }

    pub fn log_info_path(&self, token: Uuid) -> PathBuf {
        self.log_checkpoint_dir(token).join(INFO_FILE)
    }

    pub fn snapshot_path(&self, token: Uuid) -> PathBuf {
        self.log_checkpoint_dir(token).join(SNAPSHOT_FILE)
    }

    pub fn snapshot_object_path(&self, token: Uuid) -> PathBuf {
        self.log_checkpoint_dir(token).join(SNAPSHOT_OBJ_FILE)
    }

    pub fn hash_table_chunk_path(&self, token: Uuid, chunk: u32) -> PathBuf {
        self.index_checkpoint_dir(token).join(format!("ht.{chunk}.dat"))
    }
}
