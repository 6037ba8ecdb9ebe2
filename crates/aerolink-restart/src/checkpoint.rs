//! Checkpoint encoding and atomic file replacement.
//!
//! # Format
//!
//! ```text
//! [MAGIC "AERC"] [VERSION u8]
//! [turbine u32] [n_blades u32] [n_vel u32] [n_force u32]
//! [step u64] [history_depth u8] [solver_handle str]
//! [slot n-2] [slot n-1] [slot n] [slot n+1]   each: 9 f64 arrays
//! [checksum u64]                              FNV-1a of all preceding bytes
//! ```
//!
//! A checkpoint is encoded fully in memory, written to `<path>.tmp`,
//! synced, and renamed over `<path>`. The previous checkpoint survives any
//! failure before the rename.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use aerolink_core::{FieldKind, NodeFields, StepId, TurbineId};

use crate::codec::*;
use crate::error::RestartError;
use crate::hash::checksum;
use crate::types::{Checkpoint, TurbineDims};
use crate::{CHECKPOINT_MAGIC, FORMAT_VERSION};

/// Serialize a checkpoint, checksum included.
pub fn encode_checkpoint(ckpt: &Checkpoint) -> Result<Vec<u8>, RestartError> {
    let mut buf = Vec::new();
    let w: &mut dyn Write = &mut buf;
    w.write_all(&CHECKPOINT_MAGIC)?;
    write_u8(w, FORMAT_VERSION)?;
    write_u32_le(w, ckpt.dims.turbine.0)?;
    write_u32_le(w, ckpt.dims.n_blades)?;
    write_u32_le(w, ckpt.dims.n_vel)?;
    write_u32_le(w, ckpt.dims.n_force)?;
    write_u64_le(w, ckpt.step.0)?;
    write_u8(w, ckpt.history_depth)?;
    write_str(w, &ckpt.solver_handle)?;
    for slot in &ckpt.slots {
        for kind in FieldKind::ALL {
            write_f64_array(w, slot.field(kind))?;
        }
    }
    let sum = checksum(&buf);
    buf.extend_from_slice(&sum.to_le_bytes());
    Ok(buf)
}

/// Decode and verify a checkpoint.
pub fn decode_checkpoint(bytes: &[u8]) -> Result<Checkpoint, RestartError> {
    if bytes.len() < 8 {
        return Err(RestartError::malformed(format!(
            "checkpoint truncated to {} bytes",
            bytes.len()
        )));
    }
    let (body, tail) = bytes.split_at(bytes.len() - 8);
    let mut stored = [0u8; 8];
    stored.copy_from_slice(tail);
    let stored = u64::from_le_bytes(stored);

    let mut r: &[u8] = body;
    // Magic and version first so a foreign file is reported as such.
    read_preamble(&mut r, CHECKPOINT_MAGIC, FORMAT_VERSION).map_err(truncated)?;
    let computed = checksum(body);
    if stored != computed {
        return Err(RestartError::ChecksumMismatch { stored, computed });
    }

    let dims = TurbineDims {
        turbine: TurbineId(read_u32_le(&mut r)?),
        n_blades: read_u32_le(&mut r)?,
        n_vel: read_u32_le(&mut r)?,
        n_force: read_u32_le(&mut r)?,
    };
    let step = StepId(read_u64_le(&mut r)?);
    let history_depth = read_u8(&mut r)?;
    if !(1..=3).contains(&history_depth) {
        return Err(RestartError::malformed(format!(
            "history depth {history_depth} outside 1..=3"
        )));
    }
    let solver_handle = read_str(&mut r)?;
    let mut slot = || -> Result<NodeFields, RestartError> {
        let mut f = NodeFields::new(dims.n_vel as usize, dims.n_force as usize);
        for kind in FieldKind::ALL {
            read_f64_array_into(&mut r, f.field_mut(kind), kind.name())?;
        }
        Ok(f)
    };
    let slots = [slot()?, slot()?, slot()?, slot()?];
    if !r.is_empty() {
        return Err(RestartError::malformed(format!(
            "{} trailing bytes after the last slot",
            r.len()
        )));
    }
    Ok(Checkpoint {
        dims,
        step,
        history_depth,
        solver_handle,
        slots,
    })
}

fn truncated(e: RestartError) -> RestartError {
    match e {
        RestartError::Io(io) if io.kind() == io::ErrorKind::UnexpectedEof => {
            RestartError::malformed("checkpoint header truncated")
        }
        other => other,
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut s = OsString::from(path.as_os_str());
    s.push(".tmp");
    PathBuf::from(s)
}

/// Atomically replace the checkpoint at `path`.
pub fn write_checkpoint(path: &Path, ckpt: &Checkpoint) -> Result<(), RestartError> {
    let bytes = encode_checkpoint(ckpt)?;
    let tmp = tmp_path(path);
    let written = (|| -> io::Result<()> {
        let mut f = File::create(&tmp)?;
        f.write_all(&bytes)?;
        f.sync_all()?;
        drop(f);
        fs::rename(&tmp, path)
    })();
    if let Err(e) = written {
        // The tmp file may not exist; only the write error matters.
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    info!(
        turbine = ckpt.dims.turbine.0,
        step = ckpt.step.0,
        bytes = bytes.len(),
        path = %path.display(),
        "checkpoint written"
    );
    Ok(())
}

/// Read and verify the checkpoint at `path`.
pub fn read_checkpoint(path: &Path) -> Result<Checkpoint, RestartError> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(RestartError::Missing {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(e.into()),
    };
    let ckpt = decode_checkpoint(&bytes)?;
    debug!(turbine = ckpt.dims.turbine.0, step = ckpt.step.0, "checkpoint read");
    Ok(ckpt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::rand_core::{RngCore, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn sample(seed: u64) -> Checkpoint {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let dims = TurbineDims {
            turbine: TurbineId(4),
            n_blades: 2,
            n_vel: 5,
            n_force: 9,
        };
        let mut slot = || {
            let mut f = NodeFields::new(5, 9);
            for kind in FieldKind::ALL {
                for v in f.field_mut(kind) {
                    *v = f64::from_bits(rng.next_u64() >> 2);
                }
            }
            f
        };
        Checkpoint {
            dims,
            step: StepId(1234),
            history_depth: 3,
            solver_handle: "t4.1234".into(),
            slots: [slot(), slot(), slot(), slot()],
        }
    }

    #[test]
    fn round_trip_is_bit_identical() {
        let ckpt = sample(7);
        let bytes = encode_checkpoint(&ckpt).unwrap();
        let back = decode_checkpoint(&bytes).unwrap();
        for (a, b) in ckpt.slots.iter().zip(&back.slots) {
            for kind in FieldKind::ALL {
                let bits_a: Vec<u64> = a.field(kind).iter().map(|v| v.to_bits()).collect();
                let bits_b: Vec<u64> = b.field(kind).iter().map(|v| v.to_bits()).collect();
                assert_eq!(bits_a, bits_b, "{}", kind.name());
            }
        }
        assert_eq!(back.step, ckpt.step);
        assert_eq!(back.solver_handle, ckpt.solver_handle);
        assert_eq!(encode_checkpoint(&back).unwrap(), bytes);
    }

    #[test]
    fn flipped_byte_is_detected() {
        let mut bytes = encode_checkpoint(&sample(1)).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0x40;
        assert!(matches!(
            decode_checkpoint(&bytes),
            Err(RestartError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn every_truncation_is_rejected() {
        let bytes = encode_checkpoint(&sample(2)).unwrap();
        for len in (0..bytes.len()).step_by(37) {
            assert!(decode_checkpoint(&bytes[..len]).is_err(), "length {len}");
        }
    }

    #[test]
    fn foreign_file_reports_magic() {
        let mut bytes = encode_checkpoint(&sample(3)).unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            decode_checkpoint(&bytes),
            Err(RestartError::InvalidMagic { .. })
        ));
    }

    #[test]
    fn atomic_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t4.chkp");
        let ckpt = sample(5);
        write_checkpoint(&path, &ckpt).unwrap();
        assert!(!tmp_path(&path).exists());
        assert_eq!(read_checkpoint(&path).unwrap(), ckpt);
    }

    #[test]
    fn failed_write_keeps_previous_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t4.chkp");
        let first = sample(8);
        write_checkpoint(&path, &first).unwrap();
        // A directory in place of the tmp file makes the create fail.
        fs::create_dir(tmp_path(&path)).unwrap();
        let mut second = sample(9);
        second.step = StepId(2000);
        assert!(matches!(
            write_checkpoint(&path, &second),
            Err(RestartError::Io(_))
        ));
        assert_eq!(read_checkpoint(&path).unwrap(), first);
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.chkp");
        assert!(matches!(
            read_checkpoint(&path),
            Err(RestartError::Missing { .. })
        ));
    }
}
