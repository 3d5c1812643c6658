// Shared binary reading utilities for the in-memory format parsers
//
// All readers are bounds-checked and return None instead of panicking, so a
// truncated or hostile buffer degrades into "field absent".

/// Byte order of a structure (TIFF headers declare theirs, BMFF/EBML are big-endian)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

// =============================================================================
// Read at Offset Functions
// =============================================================================

/// Borrow `len` bytes at `offset`
#[inline]
pub fn slice_at(data: &[u8], offset: usize, len: usize) -> Option<&[u8]> {
    let end = offset.checked_add(len)?;
    data.get(offset..end)
}

/// Read u8 at specific offset
#[inline]
pub fn read_u8_at(data: &[u8], offset: usize) -> Option<u8> {
    data.get(offset).copied()
}

/// Read u16 at specific offset
pub fn read_u16_at(data: &[u8], offset: usize, endian: Endian) -> Option<u16> {
    let b = slice_at(data, offset, 2)?;
    let arr = [b[0], b[1]];
    Some(match endian {
        Endian::Little => u16::from_le_bytes(arr),
        Endian::Big => u16::from_be_bytes(arr),
    })
}

/// Read u32 at specific offset
pub fn read_u32_at(data: &[u8], offset: usize, endian: Endian) -> Option<u32> {
    let b = slice_at(data, offset, 4)?;
    let arr = [b[0], b[1], b[2], b[3]];
    Some(match endian {
        Endian::Little => u32::from_le_bytes(arr),
        Endian::Big => u32::from_be_bytes(arr),
    })
}

/// Read u64 at specific offset
pub fn read_u64_at(data: &[u8], offset: usize, endian: Endian) -> Option<u64> {
    let b = slice_at(data, offset, 8)?;
    let mut arr = [0u8; 8];
    arr.copy_from_slice(b);
    Some(match endian {
        Endian::Little => u64::from_le_bytes(arr),
        Endian::Big => u64::from_be_bytes(arr),
    })
}

/// Read an unsigned big-endian integer of 1..=8 bytes
pub fn read_uint_be(data: &[u8]) -> Option<u64> {
    if data.is_empty() || data.len() > 8 {
        return None;
    }
    Some(data.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

/// Read a big-endian IEEE float stored in 4 or 8 bytes
pub fn read_float_be(data: &[u8]) -> Option<f64> {
    match data.len() {
        4 => Some(f64::from(f32::from_be_bytes([data[0], data[1], data[2], data[3]]))),
        8 => {
            let mut arr = [0u8; 8];
            arr.copy_from_slice(data);
            Some(f64::from_be_bytes(arr))
        }
        _ => None,
    }
}

// =============================================================================
// String Helpers
// =============================================================================

/// Decode a NUL-terminated/padded ASCII field, trimming trailing padding
pub fn read_ascii(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).trim().to_string()
}

// =============================================================================
// EBML Variable-Length Integers
// =============================================================================

/// Read an EBML element ID (marker bits kept). Returns (id, length)
pub fn read_ebml_id(data: &[u8], offset: usize) -> Option<(u32, usize)> {
    let first = read_u8_at(data, offset)?;
    let len = first.leading_zeros() as usize + 1;
    if len > 4 {
        return None;
    }
    let bytes = slice_at(data, offset, len)?;
    let id = bytes.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
    Some((id, len))
}

/// Read an EBML data size (marker bit stripped). Returns (size, length);
/// `size` is None for the reserved "unknown size" value.
pub fn read_ebml_size(data: &[u8], offset: usize) -> Option<(Option<u64>, usize)> {
    let first = read_u8_at(data, offset)?;
    let len = first.leading_zeros() as usize + 1;
    if len > 8 {
        return None;
    }
    let bytes = slice_at(data, offset, len)?;
    let mask = if len == 8 { 0 } else { 0xFFu8 >> len };
    let mut value = u64::from(bytes[0] & mask);
    for b in &bytes[1..] {
        value = (value << 8) | u64::from(*b);
    }
    let unknown = value == (1u64 << (7 * len)) - 1;
    Some((if unknown { None } else { Some(value) }, len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endian_reads() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        assert_eq!(read_u16_at(&data, 0, Endian::Little), Some(0x0201));
        assert_eq!(read_u16_at(&data, 0, Endian::Big), Some(0x0102));
        assert_eq!(read_u32_at(&data, 4, Endian::Big), Some(0x05060708));
        assert_eq!(read_u64_at(&data, 0, Endian::Big), Some(0x0102030405060708));
    }

    #[test]
    fn test_out_of_bounds_is_none() {
        let data = [0x01, 0x02];
        assert_eq!(read_u32_at(&data, 0, Endian::Little), None);
        assert_eq!(read_u16_at(&data, 1, Endian::Little), None);
        assert_eq!(slice_at(&data, usize::MAX, 2), None);
    }

    #[test]
    fn test_read_ascii_trims_padding() {
        assert_eq!(read_ascii(b"Canon\0\0\0"), "Canon");
        assert_eq!(read_ascii(b"EOS 5D  "), "EOS 5D");
    }

    #[test]
    fn test_ebml_vints() {
        // 0x1A45DFA3 is a 4-byte ID
        assert_eq!(read_ebml_id(&[0x1A, 0x45, 0xDF, 0xA3], 0), Some((0x1A45DFA3, 4)));
        // 0x81 => size 1
        assert_eq!(read_ebml_size(&[0x81], 0), Some((Some(1), 1)));
        // 0x40 0x02 => size 2 in two bytes
        assert_eq!(read_ebml_size(&[0x40, 0x02], 0), Some((Some(2), 2)));
        // 0xFF => unknown size
        assert_eq!(read_ebml_size(&[0xFF], 0), Some((None, 1)));
        // 0x01 FF FF FF FF FF FF FF => unknown size (8 bytes)
        assert_eq!(
            read_ebml_size(&[0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF], 0),
            Some((None, 8))
        );
    }

    #[test]
    fn test_uint_and_float() {
        assert_eq!(read_uint_be(&[0x0F, 0x42, 0x40]), Some(1_000_000));
        assert_eq!(read_float_be(&1234.5f64.to_be_bytes()), Some(1234.5));
        assert_eq!(read_float_be(&[0, 0]), None);
    }
}
