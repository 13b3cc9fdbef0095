//! # Bitstring Codec
//!
//! Packing, GZIP compression, and base64url framing for a `StatusList`'s
//! `encodedList` column: a GZIP + `Base64UrlUnpadded` pipeline over a
//! per-row bitstring mutated incrementally via read-modify-write.
//!
//! Entries are packed most-significant-bit first within each byte. Since
//! `statusSize` is always one of `1, 2, 4, 8`, a field's bit offset
//! (`index * statusSize`) is always a multiple of its own width, so no
//! field ever crosses a byte boundary — the packing never needs to split
//! a value across two bytes.

use std::io::{Read, Write};

use base64ct::{Base64UrlUnpadded, Encoding};
use flate2::write::GzEncoder;
use flate2::read::GzDecoder;
use flate2::Compression;

use crate::convert::StatusSize;
use crate::error::RepoError;

/// Build a zero-filled bitstring sized for `total_entries` slots of
/// `status_size` bits each.
#[must_use]
pub fn zeroes(total_entries: u32, status_size: StatusSize) -> Vec<u8> {
    let byte_len = total_entries as usize * status_size.bits() as usize;
    vec![0u8; byte_len.div_ceil(8)]
}

/// `base64url(GZIP(bytes))`, no padding.
pub fn encode(bytes: &[u8]) -> Result<String, RepoError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .map_err(|e| RepoError::Internal(format!("gzip compression failed: {e}")))?;
    let compressed =
        encoder.finish().map_err(|e| RepoError::Internal(format!("gzip compression failed: {e}")))?;
    Ok(Base64UrlUnpadded::encode_string(&compressed))
}

/// Reverse of [`encode`]. A decoded length that does not match
/// `expected_len` is a fatal corruption error, never silently truncated
/// or padded.
pub fn decode(encoded: &str, expected_len: usize) -> Result<Vec<u8>, RepoError> {
    let compressed = Base64UrlUnpadded::decode_vec(encoded)
        .map_err(|e| RepoError::Corruption(format!("invalid base64url encodedList: {e}")))?;
    let mut bytes = Vec::new();
    GzDecoder::new(&compressed[..])
        .read_to_end(&mut bytes)
        .map_err(|e| RepoError::Corruption(format!("invalid gzip encodedList: {e}")))?;
    if bytes.len() != expected_len {
        return Err(RepoError::Corruption(format!(
            "decoded bitstring is {} bytes, expected {expected_len}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

/// Byte index and intra-byte shift/mask for the `statusSize`-wide field
/// at `index`, counting bits most-significant-first within each byte.
const fn field_location(index: u32, status_size: u8) -> (usize, u32, u8) {
    let offset = index as usize * status_size as usize;
    let byte_index = offset / 8;
    let bit_in_byte = offset % 8;
    let shift = 8 - bit_in_byte as u32 - u32::from(status_size);
    let mask = ((1u16 << status_size) - 1) as u8;
    (byte_index, shift, mask)
}

/// Read the `statusSize`-wide value at `index` out of a decoded
/// bitstring.
pub fn read_bits(bytes: &[u8], index: u32, status_size: StatusSize) -> Result<u64, RepoError> {
    let (byte_index, shift, mask) = field_location(index, status_size.bits());
    let byte = *bytes
        .get(byte_index)
        .ok_or_else(|| RepoError::Corruption(format!("status index {index} out of range for bitstring")))?;
    Ok(u64::from((byte >> shift) & mask))
}

/// Overwrite the `statusSize`-wide field at `index` with `value`.
/// `value` must already have been range-checked against `status_size`.
pub fn write_bits(bytes: &mut [u8], index: u32, status_size: StatusSize, value: u64) -> Result<(), RepoError> {
    let (byte_index, shift, mask) = field_location(index, status_size.bits());
    let byte = bytes
        .get_mut(byte_index)
        .ok_or_else(|| RepoError::Corruption(format!("status index {index} out of range for bitstring")))?;
    #[allow(clippy::cast_possible_truncation)]
    let value_byte = value as u8 & mask;
    *byte = (*byte & !(mask << shift)) | (value_byte << shift);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_length() {
        let bytes = zeroes(131_072, StatusSize::new(1).unwrap());
        assert_eq!(bytes.len(), 16_384);
        let encoded = encode(&bytes).unwrap();
        let decoded = decode(&encoded, bytes.len()).unwrap();
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn decode_rejects_length_mismatch() {
        let bytes = zeroes(131_072, StatusSize::new(1).unwrap());
        let encoded = encode(&bytes).unwrap();
        assert!(decode(&encoded, bytes.len() + 1).is_err());
    }

    #[test]
    fn two_bit_entries_pack_msb_first_within_byte() {
        // statusSize=2, set index 3 to value 2 (binary 10): byte 0 becomes
        // 00_00_00_10 (positions 0..3, msb-first within each 2-bit field).
        let status_size = StatusSize::new(2).unwrap();
        let mut bytes = vec![0u8; 32_768];
        write_bits(&mut bytes, 3, status_size, 2).unwrap();
        assert_eq!(bytes[0], 0b0000_0010);
        assert!(bytes[1..].iter().all(|b| *b == 0));
        assert_eq!(read_bits(&bytes, 3, status_size).unwrap(), 2);
        assert_eq!(read_bits(&bytes, 0, status_size).unwrap(), 0);
    }

    #[test]
    fn single_bit_entries_pack_msb_first() {
        let status_size = StatusSize::new(1).unwrap();
        let mut bytes = vec![0u8; 1];
        write_bits(&mut bytes, 0, status_size, 1).unwrap();
        assert_eq!(bytes[0], 0b1000_0000);
        write_bits(&mut bytes, 7, status_size, 1).unwrap();
        assert_eq!(bytes[0], 0b1000_0001);
    }

    #[test]
    fn eight_bit_entries_occupy_whole_bytes() {
        let status_size = StatusSize::new(8).unwrap();
        let mut bytes = vec![0u8; 2];
        write_bits(&mut bytes, 1, status_size, 200).unwrap();
        assert_eq!(bytes, vec![0, 200]);
    }

    #[test]
    fn out_of_range_index_is_corruption() {
        let status_size = StatusSize::new(1).unwrap();
        let bytes = vec![0u8; 1];
        assert!(read_bits(&bytes, 100, status_size).is_err());
    }
}
