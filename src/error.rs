use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while locating, validating, or replaying a checkpoint pair.
///
/// Every variant is fatal to the recovery attempt in progress: the caller is
/// expected to abort startup rather than attempt a partial recovery.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no usable checkpoint found under {0}")]
    NoCheckpoint(PathBuf),
    #[error("checkpoint metadata at {path} is corrupt: {reason}")]
    CorruptMetadata { path: PathBuf, reason: String },
    #[error("checkpoint {0} is missing its completed.dat marker")]
    MissingMarker(PathBuf),
    #[error(
        "index checkpoint (final={index_final}) is not compatible with log checkpoint (final={log_final})"
    )]
    Incompatible { index_final: u64, log_final: u64 },
    #[error("page i/o failed for page {page}: {source}")]
    IoFailed {
        page: u64,
        #[source]
        source: std::io::Error,
    },
}
