//! Velocity-history recording and replay.
//!
//! # Format
//!
//! ```text
//! [MAGIC "AERV"] [VERSION u8] [turbine u32] [n_vel u32]
//! [Record 1] [Record 2] ... [Record N]
//! ```
//!
//! Each record is `[step u64] [iteration u32] [drive u8] [fraction f64]
//! [x_vel f64 array] [vel_vel f64 array] [checksum u64]`, the checksum
//! covering the record's own bytes. `drive` is 0 for an interpolated
//! nonlinear iteration, 1 for held substeps and 2 for a single fractional
//! substep; `fraction` is only meaningful for the last. Records are appended in the order they are produced. When a
//! key appears more than once (a run resumed from an earlier step), the
//! last occurrence wins.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use indexmap::IndexMap;
use tracing::debug;

use aerolink_core::TurbineId;

use crate::codec::*;
use crate::error::RestartError;
use crate::hash::checksum;
use crate::types::{HistoryHeader, HistoryRecord, SubstepDrive};
use crate::{HISTORY_MAGIC, HISTORY_VERSION, MAX_HISTORY_NODES};

fn encode_header(w: &mut dyn Write, header: &HistoryHeader) -> Result<(), RestartError> {
    w.write_all(&HISTORY_MAGIC)?;
    write_u8(w, HISTORY_VERSION)?;
    write_u32_le(w, header.turbine.0)?;
    write_u32_le(w, header.n_vel)?;
    Ok(())
}

fn decode_header(r: &mut dyn Read) -> Result<HistoryHeader, RestartError> {
    read_preamble(r, HISTORY_MAGIC, HISTORY_VERSION)?;
    let turbine = TurbineId(read_u32_le(r)?);
    let n_vel = read_u32_le(r)?;
    if n_vel > MAX_HISTORY_NODES {
        return Err(RestartError::malformed(format!(
            "history header declares {n_vel} velocity nodes (limit {MAX_HISTORY_NODES})"
        )));
    }
    Ok(HistoryHeader { turbine, n_vel })
}

fn encode_body(
    w: &mut dyn Write,
    step: u64,
    iteration: u32,
    drive: SubstepDrive,
    x_vel: &[f64],
    vel_vel: &[f64],
) -> Result<(), RestartError> {
    write_u64_le(w, step)?;
    write_u32_le(w, iteration)?;
    write_u8(w, drive.tag())?;
    let fraction = match drive {
        SubstepDrive::Fraction(s) => s,
        _ => 0.0,
    };
    w.write_all(&fraction.to_le_bytes())?;
    write_f64_array(w, x_vel)?;
    write_f64_array(w, vel_vel)?;
    Ok(())
}

/// Appends velocity samples to a history stream.
pub struct HistoryWriter<W: Write> {
    writer: W,
    header: HistoryHeader,
    records_written: u64,
    scratch: Vec<u8>,
}

impl<W: Write> HistoryWriter<W> {
    /// Start a new stream, writing the header immediately.
    pub fn new(mut writer: W, header: HistoryHeader) -> Result<Self, RestartError> {
        encode_header(&mut writer, &header)?;
        Ok(Self::continuing(writer, header))
    }

    /// Continue a stream whose header is already in place.
    fn continuing(writer: W, header: HistoryHeader) -> Self {
        Self {
            writer,
            header,
            records_written: 0,
            scratch: Vec::new(),
        }
    }

    /// Header of the stream.
    pub fn header(&self) -> &HistoryHeader {
        &self.header
    }

    /// Append the samples for `(step, iteration)`, driven as `drive`.
    pub fn append(
        &mut self,
        step: u64,
        iteration: u32,
        drive: SubstepDrive,
        x_vel: &[f64],
        vel_vel: &[f64],
    ) -> Result<(), RestartError> {
        let expected = 3 * self.header.n_vel as usize;
        if x_vel.len() != expected || vel_vel.len() != expected {
            return Err(RestartError::malformed(format!(
                "history record for step {step} has {}/{} values, expected {expected}",
                x_vel.len(),
                vel_vel.len()
            )));
        }
        self.scratch.clear();
        encode_body(&mut self.scratch, step, iteration, drive, x_vel, vel_vel)?;
        let sum = checksum(&self.scratch);
        self.writer.write_all(&self.scratch)?;
        self.writer.write_all(&sum.to_le_bytes())?;
        self.records_written += 1;
        Ok(())
    }

    /// Number of records appended through this writer.
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Flush buffered records to the sink.
    pub fn flush(&mut self) -> Result<(), RestartError> {
        self.writer.flush()?;
        Ok(())
    }
}

impl HistoryWriter<BufWriter<File>> {
    /// Create (truncating) the history file at `path`.
    pub fn create(path: &Path, header: HistoryHeader) -> Result<Self, RestartError> {
        Self::new(BufWriter::new(File::create(path)?), header)
    }

    /// Open the history file at `path` for appending, creating it if it
    /// does not exist. An existing header must match `header`.
    pub fn append_to(path: &Path, header: HistoryHeader) -> Result<Self, RestartError> {
        match File::open(path) {
            Ok(f) => {
                let found = decode_header(&mut BufReader::new(f))?;
                if found != header {
                    return Err(RestartError::malformed(format!(
                        "history header {found:?} does not match {header:?}"
                    )));
                }
                let f = OpenOptions::new().append(true).open(path)?;
                Ok(Self::continuing(BufWriter::new(f), header))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::create(path, header),
            Err(e) => Err(e.into()),
        }
    }
}

/// An indexed, fully loaded history stream.
#[derive(Clone, Debug)]
pub struct HistoryReader {
    header: HistoryHeader,
    records: IndexMap<(u64, u32), HistoryRecord>,
}

impl HistoryReader {
    /// Read and index every record of a stream.
    pub fn from_reader(mut r: impl Read) -> Result<Self, RestartError> {
        let header = decode_header(&mut r)?;
        let mut records = IndexMap::new();
        while let Some(rec) = decode_record(&mut r, header.n_vel as usize)? {
            records.insert((rec.step, rec.iteration), rec);
        }
        debug!(
            turbine = header.turbine.0,
            records = records.len(),
            "velocity history loaded"
        );
        Ok(Self { header, records })
    }

    /// Open and index the history file at `path`.
    pub fn open(path: &Path) -> Result<Self, RestartError> {
        Self::from_reader(BufReader::new(open_existing(path)?))
    }

    /// Read only the header of the history file at `path`, so it can be
    /// checked before any record is loaded.
    pub fn read_header(path: &Path) -> Result<HistoryHeader, RestartError> {
        decode_header(&mut BufReader::new(open_existing(path)?))
    }

    /// Header of the stream.
    pub fn header(&self) -> &HistoryHeader {
        &self.header
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if the stream holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The record for `(step, iteration)`. Absence is fatal to replay.
    pub fn record(&self, step: u64, iteration: u32) -> Result<&HistoryRecord, RestartError> {
        self.records
            .get(&(step, iteration))
            .ok_or(RestartError::HistoryKeyMissing { step, iteration })
    }

    /// Number of nonlinear iterations recorded for `step`.
    pub fn nlin_iters(&self, step: u64) -> u32 {
        self.records
            .keys()
            .filter(|(s, _)| *s == step)
            .map(|&(_, it)| it + 1)
            .max()
            .unwrap_or(0)
    }
}

fn open_existing(path: &Path) -> Result<File, RestartError> {
    File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => RestartError::Missing {
            path: path.to_path_buf(),
        },
        _ => e.into(),
    })
}

/// Decode one record, or `None` on a clean end of stream.
fn decode_record(r: &mut dyn Read, n_vel: usize) -> Result<Option<HistoryRecord>, RestartError> {
    // Distinguish clean EOF (no bytes) from a truncated step field.
    let mut step_buf = [0u8; 8];
    let mut filled = 0;
    while filled < 8 {
        match r.read(&mut step_buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(RestartError::malformed(format!(
                    "truncated history record: got {filled} of 8 bytes for the step"
                )))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    let step = u64::from_le_bytes(step_buf);
    let iteration = read_u32_le(r)?;
    let tag = read_u8(r)?;
    let fraction = f64::from_bits(read_u64_le(r)?);
    let drive = match tag {
        0 => SubstepDrive::Interpolated,
        1 => SubstepDrive::Held,
        2 => SubstepDrive::Fraction(fraction),
        t => {
            return Err(RestartError::malformed(format!(
                "unknown substep drive {t} in history record for step {step}"
            )))
        }
    };
    let mut x_vel = vec![0.0; 3 * n_vel];
    let mut vel_vel = vec![0.0; 3 * n_vel];
    read_f64_array_into(r, &mut x_vel, "x_vel")?;
    read_f64_array_into(r, &mut vel_vel, "vel_vel")?;
    let stored = read_u64_le(r)?;

    let mut bytes = Vec::with_capacity(21 + 16 * x_vel.len() + 8);
    encode_body(&mut bytes, step, iteration, drive, &x_vel, &vel_vel)?;
    let computed = checksum(&bytes);
    if stored != computed {
        return Err(RestartError::ChecksumMismatch { stored, computed });
    }
    Ok(Some(HistoryRecord {
        step,
        iteration,
        drive,
        x_vel,
        vel_vel,
    }))
}
