use std::path::PathBuf;

/// Replay strategy for the tail of the log between a log checkpoint's
/// `flushed_logical_address` and its `final_logical_address`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayMode {
    /// The fuzzy region is still resident on the main log device; pages are
    /// read, fixed up and flushed back in place.
    FoldOver,
    /// The fuzzy region was snapshotted to a side file; pages are read from
    /// the snapshot and written forward onto the main log device.
    Snapshot,
}

/// Knobs a caller supplies once, up front, rather than through a global or a
/// config file. `RecoveryDriver` takes a `RecoveryConfig` by value at
/// construction time and never mutates it.
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Root directory under which `index-checkpoints/` and
    /// `cpr-checkpoints/` live.
    pub checkpoint_root: PathBuf,
    /// Path of the main log device. This is the `IDevice` recovery is
    /// handed; the log itself is an external collaborator.
    pub log_device_path: PathBuf,
    /// Path of the fuzzy-region snapshot device, required when
    /// `replay_mode` is [`ReplayMode::Snapshot`].
    pub snapshot_device_path: Option<PathBuf>,
    /// Byte size of one log page. Must match the value the log was written
    /// with; recovery has no way to infer it.
    pub page_size: u32,
    /// Number of page frames kept resident in memory during replay (`C` in
    /// the design notes). Bounds peak memory regardless of log length.
    pub ring_capacity: usize,
    /// How many pages of warm window to keep below the log tail once
    /// recovery hands off to steady-state operation.
    pub head_offset_lag_in_pages: u64,
    pub replay_mode: ReplayMode,
}

impl RecoveryConfig {
    pub fn new(
        checkpoint_root: impl Into<PathBuf>,
        log_device_path: impl Into<PathBuf>,
        page_size: u32,
        ring_capacity: usize,
    ) -> Self {
        assert!(ring_capacity > 0, "ring_capacity must be at least 1");
        Self {
            checkpoint_root: checkpoint_root.into(),
            log_device_path: log_device_path.into(),
            snapshot_device_path: None,
            page_size,
            ring_capacity,
            head_offset_lag_in_pages: 1,
            replay_mode: ReplayMode::FoldOver,
        }
    }

    pub fn with_snapshot_device(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_device_path = Some(path.into());
        self.replay_mode = ReplayMode::Snapshot;
        self
    }

    pub fn with_head_offset_lag_in_pages(mut self, lag: u64) -> Self {
        self.head_offset_lag_in_pages = lag;
        self
    }
}
