use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::address::{self, LogicalAddress};
use crate::checkpoint::{CheckpointKind, CheckpointStore};
use crate::config::{RecoveryConfig, ReplayMode};
use crate::error::Error;
use crate::error::Result;
use crate::hash_index::HashIndex;
use crate::index_restorer::IndexRestorer;
use crate::io::Io;
use crate::log_replayer::LogReplayer;
use crate::name::SessionId;
use crate::page_io::PageIo;

/// Summary of a completed recovery pass, handed back to the caller so it can
/// resume steady-state operation and log what happened.
#[derive(Debug, Clone)]
pub struct RecoveryStats {
    pub installed: usize,
    pub rewound: usize,
    pub pages_replayed: u64,
    /// The store's new logical epoch: one past the log checkpoint's version.
    pub new_version: u16,
    pub head_address: LogicalAddress,
    pub tail_address: LogicalAddress,
    pub object_log_segment_offsets: Vec<u64>,
    pub continue_tokens: Arc<RwLock<HashMap<SessionId, LogicalAddress>>>,
    pub elapsed: Duration,
}

/// Orchestrates checkpoint discovery, fuzzy index restoration, log replay,
/// and warm-window restoration. Collaborators are injected at construction
/// time rather than reached through process-wide state.
pub struct RecoveryDriver<IO: Io> {
    io: IO,
    checkpoints: Arc<CheckpointStore<IO>>,
    index: Arc<HashIndex>,
    config: RecoveryConfig,
}

impl<IO: Io> RecoveryDriver<IO> {
    pub fn new(io: IO, checkpoints: Arc<CheckpointStore<IO>>, index: Arc<HashIndex>, config: RecoveryConfig) -> Self {
        Self {
            io,
            checkpoints,
            index,
            config,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn recover(&self) -> Result<RecoveryStats> {
        let start = Instant::now();

        self.checkpoints.prune_incomplete()?;

        let index_token = self.checkpoints.latest_token(CheckpointKind::IndexOnly)?;
        let log_token = self.checkpoints.latest_token(CheckpointKind::HybridLogOnly)?;

        let log_info = self.checkpoints.load_log_info(log_token)?;
        let index_info = self.checkpoints.load_index_info(index_token)?;

        if index_info.final_logical_address > log_info.final_logical_address {
            return Err(Error::Incompatible {
                index_final: index_info.final_logical_address,
                log_final: log_info.final_logical_address,
            });
        }

        // Only mutate the live index once the pair above is known compatible:
        // restoring first would leave real installs on the table for a
        // rejected recovery attempt.
        let index_info = IndexRestorer::restore(&self.checkpoints, index_token, &self.index)?;

        let new_version = log_info.version.checked_add(1).expect("version overflow");

        let page_size = self.config.page_size;
        let log_file = self.io.open(false, true, true, &self.config.log_device_path)?;
        let device = Arc::new(log_file);

        let snapshot = match self.config.replay_mode {
            ReplayMode::FoldOver => None,
            ReplayMode::Snapshot => {
                let path = self
                    .config
                    .snapshot_device_path
                    .as_ref()
                    .expect("snapshot replay mode requires a snapshot_device_path");
                let snapshot_file = self.io.open(false, true, false, path)?;
                let first_page = address::page_of(log_info.flushed_logical_address, page_size);
                Some((Arc::new(snapshot_file), first_page))
            }
        };

        let end_page = address::page_ceil(log_info.final_logical_address, page_size);
        let page_io = PageIo::<IO>::new(device, snapshot, page_size, self.config.ring_capacity, end_page);

        let replay_stats = LogReplayer::replay(
            &page_io,
            &self.index,
            log_info.start_logical_address,
            log_info.final_logical_address,
            page_size,
            log_info.version,
        )
        .await?;

        let (head_address, tail_address) = self.restore_page_window(&page_io, log_info.final_logical_address).await?;

        tracing::info!(
            installed = replay_stats.installed,
            rewound = replay_stats.rewound,
            pages = replay_stats.pages_replayed,
            new_version,
            "recovery complete"
        );

        Ok(RecoveryStats {
            installed: replay_stats.installed,
            rewound: replay_stats.rewound,
            pages_replayed: replay_stats.pages_replayed,
            new_version,
            head_address,
            tail_address,
            object_log_segment_offsets: index_info.object_log_segment_offsets,
            continue_tokens: Arc::new(RwLock::new(log_info.continue_tokens)),
            elapsed: start.elapsed(),
        })
    }

    async fn restore_page_window(
        &self,
        page_io: &Arc<PageIo<IO>>,
        final_logical_address: LogicalAddress,
    ) -> Result<(LogicalAddress, LogicalAddress)> {
        let page_size = self.config.page_size;
        let tail_page = address::page_of(final_logical_address, page_size);
        let extra = if final_logical_address > address::page_start(tail_page, page_size) {
            1
        } else {
            0
        };
        let head_page = tail_page
            .saturating_add(extra)
            .saturating_sub(self.config.head_offset_lag_in_pages);

        page_io.read_window(head_page, tail_page + 1).await?;

        Ok((address::page_start(head_page, page_size), final_logical_address))
    }
}
