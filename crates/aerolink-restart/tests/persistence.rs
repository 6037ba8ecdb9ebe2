//! File-level checkpoint and history behaviour.

use aerolink_core::{FieldKind, NodeFields, StepId, TurbineId};
use aerolink_restart::{
    checkpoint_path, history_path, read_checkpoint, write_checkpoint, Checkpoint,
    HistoryHeader, HistoryReader, HistoryWriter, RestartError, SubstepDrive, TurbineDims,
};
use proptest::prelude::*;

fn checkpoint(step: u64, fill: f64) -> Checkpoint {
    let mut slot = NodeFields::new(4, 7);
    for kind in FieldKind::ALL {
        for (i, v) in slot.field_mut(kind).iter_mut().enumerate() {
            *v = fill + i as f64 * 0.125;
        }
    }
    Checkpoint {
        dims: TurbineDims {
            turbine: TurbineId(0),
            n_blades: 3,
            n_vel: 4,
            n_force: 7,
        },
        step: StepId(step),
        history_depth: 3,
        solver_handle: format!("turb0.{step}"),
        slots: [slot.clone(), slot.clone(), slot.clone(), slot],
    }
}

#[test]
fn overwrite_replaces_whole_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = checkpoint_path(&dir.path().join("turb0"));
    write_checkpoint(&path, &checkpoint(10, 1.0)).unwrap();
    write_checkpoint(&path, &checkpoint(20, 2.0)).unwrap();
    let back = read_checkpoint(&path).unwrap();
    assert_eq!(back.step, StepId(20));
    assert_eq!(back, checkpoint(20, 2.0));
}

#[test]
fn truncated_file_on_disk_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = checkpoint_path(&dir.path().join("turb0"));
    write_checkpoint(&path, &checkpoint(10, 1.0)).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() / 3]).unwrap();
    let err = read_checkpoint(&path).unwrap_err();
    assert!(matches!(
        err,
        RestartError::ChecksumMismatch { .. } | RestartError::Malformed { .. }
    ));
}

#[test]
fn history_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = history_path(&dir.path().join("turb0"));
    let header = HistoryHeader {
        turbine: TurbineId(0),
        n_vel: 4,
    };
    {
        let mut w = HistoryWriter::create(&path, header).unwrap();
        for step in 1..=5u64 {
            w.append(step, 0, SubstepDrive::Held, &[step as f64; 12], &[1.0; 12])
                .unwrap();
        }
        w.flush().unwrap();
    }
    let r = HistoryReader::open(&path).unwrap();
    assert_eq!(r.len(), 5);
    for step in 1..=5u64 {
        assert_eq!(r.record(step, 0).unwrap().x_vel, vec![step as f64; 12]);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn any_single_bit_flip_is_caught(byte in 0usize..4096, bit in 0u8..8) {
        let dir = tempfile::tempdir().unwrap();
        let path = checkpoint_path(&dir.path().join("turb0"));
        write_checkpoint(&path, &checkpoint(7, 3.0)).unwrap();
        let mut bytes = std::fs::read(&path).unwrap();
        let at = byte % bytes.len();
        bytes[at] ^= 1 << bit;
        std::fs::write(&path, &bytes).unwrap();
        prop_assert!(read_checkpoint(&path).is_err());
    }
}
