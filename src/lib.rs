#![allow(async_fn_in_trait)]

pub mod address;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod hash_index;
pub mod index_restorer;
pub mod io;
pub mod log_replayer;
pub mod name;
pub mod page_io;
pub mod record;
pub mod recovery_driver;

pub use checkpoint::{CheckpointKind, CheckpointStore, DirectoryLayout, HybridLogCheckpointInfo, IndexCheckpointInfo};
pub use config::{RecoveryConfig, ReplayMode};
pub use error::{Error, Result};
pub use hash_index::HashIndex;
pub use recovery_driver::{RecoveryDriver, RecoveryStats};
