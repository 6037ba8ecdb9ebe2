//! Error types for checkpoint and history persistence.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while writing or reading persisted state.
///
/// All of them are fatal to the run.
#[derive(Debug, Error)]
pub enum RestartError {
    /// An I/O error occurred during read or write.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The file to restore from does not exist.
    #[error("restart file {} not found", path.display())]
    Missing {
        /// The path that was looked up.
        path: PathBuf,
    },
    /// The file does not start with the expected magic bytes.
    #[error("invalid magic bytes (expected {expected:?})")]
    InvalidMagic {
        /// Magic this reader expects.
        expected: [u8; 4],
    },
    /// The format version is not supported by this build.
    #[error("unsupported format version {found}")]
    UnsupportedVersion {
        /// The version found in the file.
        found: u8,
    },
    /// The content could not be decoded.
    #[error("malformed data: {detail}")]
    Malformed {
        /// What went wrong.
        detail: String,
    },
    /// Stored and recomputed checksums disagree.
    #[error("checksum mismatch: stored={stored:#018x}, computed={computed:#018x}")]
    ChecksumMismatch {
        /// Checksum read from the file.
        stored: u64,
        /// Checksum of the bytes actually read.
        computed: u64,
    },
    /// Replay asked for a history record that was never written.
    #[error("velocity history has no record for step {step}, iteration {iteration}")]
    HistoryKeyMissing {
        /// Driver step.
        step: u64,
        /// Nonlinear iteration within the step.
        iteration: u32,
    },
}

impl RestartError {
    pub(crate) fn malformed(detail: impl Into<String>) -> Self {
        Self::Malformed {
            detail: detail.into(),
        }
    }
}
