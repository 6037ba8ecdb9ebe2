//! Little-endian primitives shared by the checkpoint and history formats.
//!
//! Strings and `f64` arrays are length-prefixed with a `u32`.

use std::io::{Read, Write};

use crate::error::RestartError;

// ── Primitive writers ───────────────────────────────────────────

/// Write a single byte.
pub fn write_u8(w: &mut dyn Write, v: u8) -> Result<(), RestartError> {
    w.write_all(&[v])?;
    Ok(())
}

/// Write a little-endian u32.
pub fn write_u32_le(w: &mut dyn Write, v: u32) -> Result<(), RestartError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian u64.
pub fn write_u64_le(w: &mut dyn Write, v: u64) -> Result<(), RestartError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a length-prefixed UTF-8 string.
pub fn write_str(w: &mut dyn Write, s: &str) -> Result<(), RestartError> {
    write_u32_le(w, s.len() as u32)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

/// Write a length-prefixed `f64` array. Values keep their exact bits.
pub fn write_f64_array(w: &mut dyn Write, values: &[f64]) -> Result<(), RestartError> {
    write_u32_le(w, values.len() as u32)?;
    for v in values {
        w.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

// ── Primitive readers ───────────────────────────────────────────

/// Read a single byte.
pub fn read_u8(r: &mut dyn Read) -> Result<u8, RestartError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Read a little-endian u32.
pub fn read_u32_le(r: &mut dyn Read) -> Result<u32, RestartError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read a little-endian u64.
pub fn read_u64_le(r: &mut dyn Read) -> Result<u64, RestartError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Read a length-prefixed UTF-8 string.
pub fn read_str(r: &mut dyn Read) -> Result<String, RestartError> {
    let len = read_u32_le(r)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| RestartError::malformed(format!("invalid UTF-8 string: {e}")))
}

/// Read a length-prefixed `f64` array into `out`, which must already have
/// the expected length.
pub fn read_f64_array_into(
    r: &mut dyn Read,
    out: &mut [f64],
    what: &str,
) -> Result<(), RestartError> {
    let len = read_u32_le(r)? as usize;
    if len != out.len() {
        return Err(RestartError::malformed(format!(
            "{what}: expected {} values, found {len}",
            out.len()
        )));
    }
    let mut buf = [0u8; 8];
    for v in out.iter_mut() {
        r.read_exact(&mut buf)?;
        *v = f64::from_le_bytes(buf);
    }
    Ok(())
}

/// Check a four-byte magic and a one-byte version.
pub fn read_preamble(
    r: &mut dyn Read,
    magic: [u8; 4],
    version: u8,
) -> Result<(), RestartError> {
    let mut found = [0u8; 4];
    r.read_exact(&mut found)?;
    if found != magic {
        return Err(RestartError::InvalidMagic { expected: magic });
    }
    let v = read_u8(r)?;
    if v != version {
        return Err(RestartError::UnsupportedVersion { found: v });
    }
    Ok(())
}
