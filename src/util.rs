//! Utility functions for binary data processing.
//!
//! Scalar reads take an explicit [`Endian`] because images may be big-endian
//! (PowerPC) or little-endian. Reads are bounds-checked and return `None`
//! instead of panicking.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

// =============================================================================
// Endianness
// =============================================================================

/// Byte order of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endian {
    /// Least significant byte first
    Little,
    /// Most significant byte first
    Big,
}

impl Endian {
    /// Returns the byte order of the host.
    #[inline]
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endian::Big
        } else {
            Endian::Little
        }
    }

    /// Returns true if data in this byte order must be swapped on the host.
    #[inline]
    pub fn needs_swap(self) -> bool {
        self != Self::native()
    }
}

// =============================================================================
// Bounds-Checked Reads
// =============================================================================

/// Reads a u16 at `offset`.
#[inline]
pub fn read_u16(data: &[u8], offset: usize, endian: Endian) -> Option<u16> {
    let bytes = data.get(offset..offset.checked_add(2)?)?;
    Some(match endian {
        Endian::Little => LittleEndian::read_u16(bytes),
        Endian::Big => BigEndian::read_u16(bytes),
    })
}

/// Reads a u32 at `offset`.
#[inline]
pub fn read_u32(data: &[u8], offset: usize, endian: Endian) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(match endian {
        Endian::Little => LittleEndian::read_u32(bytes),
        Endian::Big => BigEndian::read_u32(bytes),
    })
}

/// Reads a u64 at `offset`.
#[inline]
pub fn read_u64(data: &[u8], offset: usize, endian: Endian) -> Option<u64> {
    let bytes = data.get(offset..offset.checked_add(8)?)?;
    Some(match endian {
        Endian::Little => LittleEndian::read_u64(bytes),
        Endian::Big => BigEndian::read_u64(bytes),
    })
}

/// Reads a pointer-sized value at `offset`.
#[inline]
pub fn read_ptr(data: &[u8], offset: usize, is_64: bool, endian: Endian) -> Option<u64> {
    if is_64 {
        read_u64(data, offset, endian)
    } else {
        read_u32(data, offset, endian).map(u64::from)
    }
}

/// Reads a NUL-terminated string starting at `offset`.
///
/// Returns `None` when no terminator exists before the end of `data`.
#[inline]
pub fn read_cstr(data: &[u8], offset: usize) -> Option<&str> {
    let tail = data.get(offset..)?;
    let end = memchr::memchr(0, tail)?;
    std::str::from_utf8(&tail[..end]).ok()
}

/// Reads a NUL-padded fixed-width name such as `segname`.
#[inline]
pub fn fixed_name(raw: &[u8]) -> &str {
    let end = memchr::memchr(0, raw).unwrap_or(raw.len());
    std::str::from_utf8(&raw[..end]).unwrap_or("")
}

// =============================================================================
// LEB128
// =============================================================================

/// Reads an unsigned LEB128 value with fast paths for common cases.
///
/// Returns `(value, bytes_consumed)` or `None` if invalid.
#[inline(always)]
pub fn read_uleb128_fast(data: &[u8]) -> Option<(u64, usize)> {
    if data.is_empty() {
        return None;
    }

    let b0 = data[0];

    // Single byte (0-127)
    if b0 < 0x80 {
        return Some((b0 as u64, 1));
    }

    if data.len() < 2 {
        return None;
    }

    let b1 = data[1];

    if b1 < 0x80 {
        let value = ((b0 & 0x7F) as u64) | ((b1 as u64) << 7);
        return Some((value, 2));
    }

    let mut result: u64 = 0;
    let mut shift = 0u32;

    for (i, &byte) in data.iter().enumerate() {
        if shift >= 64 {
            return None;
        }

        result |= ((byte & 0x7F) as u64) << shift;
        shift += 7;

        if byte < 0x80 {
            return Some((result, i + 1));
        }
    }

    None
}

/// Reads a signed LEB128 value.
#[inline(always)]
pub fn read_sleb128_fast(data: &[u8]) -> Option<(i64, usize)> {
    if data.is_empty() {
        return None;
    }

    let b0 = data[0];

    if b0 < 0x80 {
        let value = if (b0 & 0x40) != 0 {
            (b0 as i64) | !0x7F_i64
        } else {
            b0 as i64
        };
        return Some((value, 1));
    }

    let mut result: i64 = 0;
    let mut shift = 0u32;

    for (i, &byte) in data.iter().enumerate() {
        if shift >= 64 {
            return None;
        }
        result |= ((byte & 0x7F) as i64) << shift;
        shift += 7;

        if byte < 0x80 {
            if shift < 64 && (byte & 0x40) != 0 {
                result |= !0_i64 << shift;
            }
            return Some((result, i + 1));
        }
    }

    None
}

/// Writes an unsigned LEB128 value to a buffer.
pub fn write_uleb128(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Writes a signed LEB128 value to a buffer.
pub fn write_sleb128(mut value: i64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
        out.push(if done { byte } else { byte | 0x80 });
        if done {
            break;
        }
    }
}

// =============================================================================
// Pointer Authentication
// =============================================================================

/// Keeps the low 32 bits of an authenticated-pointer addend, sign-extended.
///
/// The upper bits of an `ARM64_RELOC_AUTHENTICATED_POINTER` addend carry the
/// key, diversity and address-discrimination fields.
#[inline]
pub const fn strip_auth_addend(raw: u64) -> u64 {
    (raw as u32 as i32) as i64 as u64
}

/// Sign-extends the low `bits` bits of `value`.
#[inline]
pub const fn sign_extend(value: u64, bits: u32) -> i64 {
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}
