//! Checkpoint directory layout, metadata encoding, and the store that
//! discovers, prunes, and loads checkpoints from disk.

mod info;
mod layout;
mod store;

pub use info::{HybridLogCheckpointInfo, IndexCheckpointInfo};
pub use layout::{CheckpointKind, DirectoryLayout};
pub use store::CheckpointStore;
