//! Checkpoint/restart persistence for Aerolink.
//!
//! Two binary formats, both little-endian and checksummed with FNV-1a:
//!
//! - checkpoints (`<out_root>.chkp`): the four-slot field ring of one
//!   turbine plus the step index and the solver's checkpoint handle,
//!   replaced atomically on every write;
//! - velocity histories (`<out_root>.velhist`): append-only samples keyed
//!   by `(step, iteration)` with the way each sample drove the substeps,
//!   replayed to warm-start solvers.
//!
//! # Architecture
//!
//! - [`write_checkpoint`] / [`read_checkpoint`] for whole-file checkpoints
//! - [`HistoryWriter`] records to any `Write` sink
//! - [`HistoryReader`] indexes a recorded stream for keyed replay

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub mod checkpoint;
pub mod codec;
pub mod error;
pub mod hash;
pub mod history;
pub mod types;

pub use checkpoint::{decode_checkpoint, encode_checkpoint, read_checkpoint, write_checkpoint};
pub use error::RestartError;
pub use hash::checksum;
pub use history::{HistoryReader, HistoryWriter};
pub use types::{Checkpoint, HistoryHeader, HistoryRecord, SubstepDrive, TurbineDims};

/// Magic bytes at the start of every checkpoint file.
pub const CHECKPOINT_MAGIC: [u8; 4] = *b"AERC";

/// Magic bytes at the start of every velocity-history file.
pub const HISTORY_MAGIC: [u8; 4] = *b"AERV";

/// Current binary format version of checkpoint files.
pub const FORMAT_VERSION: u8 = 1;

/// Current binary format version of velocity-history files.
pub const HISTORY_VERSION: u8 = 2;

/// Largest velocity-node count a history header may declare.
pub const MAX_HISTORY_NODES: u32 = 1 << 24;

fn with_suffix(out_root: &Path, suffix: &str) -> PathBuf {
    let mut s = OsString::from(out_root.as_os_str());
    s.push(suffix);
    PathBuf::from(s)
}

/// Checkpoint file of the turbine writing under `out_root`.
pub fn checkpoint_path(out_root: &Path) -> PathBuf {
    with_suffix(out_root, ".chkp")
}

/// Velocity-history file of the turbine writing under `out_root`.
pub fn history_path(out_root: &Path) -> PathBuf {
    with_suffix(out_root, ".velhist")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_extend_the_root() {
        let root = Path::new("/run/turb.3");
        assert_eq!(checkpoint_path(root), PathBuf::from("/run/turb.3.chkp"));
        assert_eq!(history_path(root), PathBuf::from("/run/turb.3.velhist"));
    }
}
