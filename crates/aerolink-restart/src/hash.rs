//! FNV-1a checksums over encoded bytes.
//!
//! Not cryptographic; used to detect truncated or corrupted files.

/// FNV-1a offset basis for 64-bit.
const FNV_OFFSET: u64 = 0xcbf29ce484222325;
/// FNV-1a prime for 64-bit.
const FNV_PRIME: u64 = 0x00000100000001B3;

/// Checksum of `bytes`.
pub fn checksum(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(FNV_OFFSET, |h, &b| (h ^ u64::from(b)).wrapping_mul(FNV_PRIME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_offset_basis() {
        assert_eq!(checksum(&[]), FNV_OFFSET);
    }

    #[test]
    fn known_vector() {
        // FNV-1a 64 of "a".
        assert_eq!(checksum(b"a"), 0xaf63dc4c8601ec8c);
    }

    #[test]
    fn order_matters() {
        assert_ne!(checksum(b"ab"), checksum(b"ba"));
    }
}
