//! Chained fixup parsing (`LC_DYLD_CHAINED_FIXUPS`).
//!
//! Chained fixups replace the rebase and bind opcode streams on newer images.
//! Every page of a fixed-up segment starts a linked list of pointer slots;
//! each slot encodes either a rebase target or an import ordinal plus the
//! distance to the next slot.

use tracing::{debug, trace};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::constants::chained::*;
use super::context::{MachOFile, SegmentInfo};
use super::constants::LC_DYLD_CHAINED_FIXUPS;
use super::impl_swap;
use crate::error::{Error, Result};
use crate::util::{read_cstr, read_u16, read_u32, read_u64, sign_extend};

// =============================================================================
// Structures
// =============================================================================

/// `dyld_chained_fixups_header`.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct ChainedFixupsHeader {
    /// Version (0)
    pub fixups_version: u32,
    /// Offset of `dyld_chained_starts_in_image`
    pub starts_offset: u32,
    /// Offset of the imports table
    pub imports_offset: u32,
    /// Offset of the symbol string pool
    pub symbols_offset: u32,
    /// Number of imports
    pub imports_count: u32,
    /// Import encoding (`DYLD_CHAINED_IMPORT*`)
    pub imports_format: u32,
    /// Symbol pool compression (0 = none)
    pub symbols_format: u32,
}

impl ChainedFixupsHeader {
    /// Size of the header.
    pub const SIZE: usize = 28;
}

impl_swap!(ChainedFixupsHeader {
    fixups_version, starts_offset, imports_offset, symbols_offset, imports_count,
    imports_format, symbols_format
});

/// Size of the fixed part of `dyld_chained_starts_in_segment`.
///
/// The C struct packs a `u64` at offset 8 after a `u16` pair, so it is read
/// field by field.
const STARTS_IN_SEGMENT_SIZE: usize = 22;

/// One entry of the chained imports table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainedImport {
    /// Library ordinal (zero or negative for the special ordinals)
    pub lib_ordinal: i64,
    /// Weak import
    pub weak: bool,
    /// Symbol name
    pub name: String,
    /// Addend
    pub addend: i64,
}

/// A decoded chained pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainedTarget {
    /// Rebase to a virtual address
    Rebase(u64),
    /// Bind to the import at `ordinal`
    Bind {
        /// Index into the imports table
        ordinal: u32,
        /// Addend encoded in the slot
        addend: i64,
    },
}

/// A fixup slot after resolving imports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainedFixup {
    /// The slot is rebased to `target`.
    Rebase {
        /// Address of the slot
        address: u64,
        /// Rebased virtual address
        target: u64,
    },
    /// The slot binds to an imported symbol.
    Bind {
        /// Address of the slot
        address: u64,
        /// Library ordinal
        lib_ordinal: i64,
        /// Symbol name
        symbol_name: String,
        /// Import addend plus slot addend
        addend: i64,
    },
}

// =============================================================================
// Pointer Decoding
// =============================================================================

/// Returns the stride in bytes between chained slots for a pointer format.
pub fn chained_stride(pointer_format: u16) -> Option<u64> {
    match pointer_format {
        DYLD_CHAINED_PTR_ARM64E
        | DYLD_CHAINED_PTR_ARM64E_USERLAND
        | DYLD_CHAINED_PTR_ARM64E_USERLAND24 => Some(8),
        DYLD_CHAINED_PTR_64 | DYLD_CHAINED_PTR_64_OFFSET | DYLD_CHAINED_PTR_32 => Some(4),
        _ => None,
    }
}

/// Decodes one chained pointer.
///
/// Returns the target and the distance to the next slot in strides (zero
/// ends the chain). `base` is the load address of the mach header, used by
/// the offset-based formats.
pub fn decode_chained_pointer(pointer_format: u16, raw: u64, base: u64) -> Option<(ChainedTarget, u64)> {
    match pointer_format {
        DYLD_CHAINED_PTR_64 | DYLD_CHAINED_PTR_64_OFFSET => {
            let next = (raw >> 51) & 0xFFF;
            if raw >> 63 != 0 {
                let ordinal = (raw & 0xFF_FFFF) as u32;
                let addend = ((raw >> 24) & 0xFF) as i64;
                Some((ChainedTarget::Bind { ordinal, addend }, next))
            } else {
                let target = raw & 0xF_FFFF_FFFF;
                let target = if pointer_format == DYLD_CHAINED_PTR_64_OFFSET {
                    base.wrapping_add(target)
                } else {
                    target
                };
                Some((ChainedTarget::Rebase(target), next))
            }
        }

        DYLD_CHAINED_PTR_ARM64E
        | DYLD_CHAINED_PTR_ARM64E_USERLAND
        | DYLD_CHAINED_PTR_ARM64E_USERLAND24 => {
            let next = (raw >> 51) & 0x7FF;
            let auth = raw >> 63 != 0;
            let bind = (raw >> 62) & 1 != 0;

            if bind {
                let ordinal = if pointer_format == DYLD_CHAINED_PTR_ARM64E_USERLAND24 {
                    (raw & 0xFF_FFFF) as u32
                } else {
                    (raw & 0xFFFF) as u32
                };
                let addend = if auth {
                    0
                } else {
                    sign_extend((raw >> 32) & 0x7_FFFF, 19)
                };
                Some((ChainedTarget::Bind { ordinal, addend }, next))
            } else if auth {
                let target = base.wrapping_add(raw & 0xFFFF_FFFF);
                Some((ChainedTarget::Rebase(target), next))
            } else {
                let target = raw & 0x7FF_FFFF_FFFF;
                let target = if pointer_format == DYLD_CHAINED_PTR_ARM64E {
                    target
                } else {
                    base.wrapping_add(target)
                };
                Some((ChainedTarget::Rebase(target), next))
            }
        }

        DYLD_CHAINED_PTR_32 => {
            let next = (raw >> 26) & 0x1F;
            if (raw >> 31) & 1 != 0 {
                let ordinal = (raw & 0xF_FFFF) as u32;
                let addend = ((raw >> 20) & 0x3F) as i64;
                Some((ChainedTarget::Bind { ordinal, addend }, next))
            } else {
                Some((ChainedTarget::Rebase(raw & 0x3FF_FFFF), next))
            }
        }

        _ => None,
    }
}

// =============================================================================
// Image Walk
// =============================================================================

impl<'data> MachOFile<'data> {
    fn parse_imports(
        &self,
        blob: &[u8],
        header: &ChainedFixupsHeader,
    ) -> Result<Vec<ChainedImport>> {
        if header.symbols_format != 0 {
            return Err(Error::parse(
                header.symbols_offset as usize,
                "compressed chained symbol pool",
            ));
        }

        let endian = self.endian();
        let base = header.imports_offset as usize;
        let symbols = header.symbols_offset as usize;
        let truncated = |offset: usize| Error::parse(offset, "truncated chained imports");

        let mut imports = Vec::with_capacity(header.imports_count as usize);
        for i in 0..header.imports_count as usize {
            let (lib_ordinal, weak, name_offset, addend) = match header.imports_format {
                DYLD_CHAINED_IMPORT => {
                    let offset = base + i * 4;
                    let raw = read_u32(blob, offset, endian).ok_or_else(|| truncated(offset))?;
                    ((raw & 0xFF) as u8 as i8 as i64, (raw >> 8) & 1 != 0, raw >> 9, 0)
                }
                DYLD_CHAINED_IMPORT_ADDEND => {
                    let offset = base + i * 8;
                    let raw = read_u32(blob, offset, endian).ok_or_else(|| truncated(offset))?;
                    let addend =
                        read_u32(blob, offset + 4, endian).ok_or_else(|| truncated(offset))?;
                    (
                        (raw & 0xFF) as u8 as i8 as i64,
                        (raw >> 8) & 1 != 0,
                        raw >> 9,
                        addend as i32 as i64,
                    )
                }
                DYLD_CHAINED_IMPORT_ADDEND64 => {
                    let offset = base + i * 16;
                    let raw = read_u64(blob, offset, endian).ok_or_else(|| truncated(offset))?;
                    let addend =
                        read_u64(blob, offset + 8, endian).ok_or_else(|| truncated(offset))?;
                    (
                        (raw & 0xFFFF) as u16 as i16 as i64,
                        (raw >> 16) & 1 != 0,
                        (raw >> 32) as u32,
                        addend as i64,
                    )
                }
                other => {
                    return Err(Error::parse(
                        base,
                        format!("unknown chained import format {}", other),
                    ))
                }
            };

            let name = read_cstr(blob, symbols + name_offset as usize)
                .ok_or_else(|| truncated(symbols + name_offset as usize))?;
            imports.push(ChainedImport {
                lib_ordinal,
                weak,
                name: name.to_string(),
                addend,
            });
        }

        Ok(imports)
    }

    /// Walks every fixup chain of the image.
    ///
    /// Slots with an unknown pointer format or an import ordinal out of range
    /// are skipped.
    pub fn chained_fixups(&self) -> Result<Vec<ChainedFixup>> {
        let Some(command) = self.linkedit_data(LC_DYLD_CHAINED_FIXUPS) else {
            return Ok(Vec::new());
        };
        let blob = self.read_at(command.dataoff as usize, command.datasize as usize)?;
        let header: ChainedFixupsHeader = self.read_struct(command.dataoff as usize)?;
        let imports = self.parse_imports(blob, &header)?;

        let endian = self.endian();
        let starts = header.starts_offset as usize;
        let seg_count = read_u32(blob, starts, endian)
            .ok_or_else(|| Error::parse(starts, "truncated chained starts"))?;

        let mut fixups = Vec::new();
        for seg_index in 0..seg_count as usize {
            let info_offset = read_u32(blob, starts + 4 + seg_index * 4, endian)
                .ok_or_else(|| Error::parse(starts, "truncated chained starts"))?;
            if info_offset == 0 {
                continue;
            }
            let Some(segment) = self.segments().get(seg_index) else {
                debug!("chained starts reference missing segment {}", seg_index);
                continue;
            };
            self.walk_segment_chains(
                blob,
                starts + info_offset as usize,
                segment,
                &imports,
                &mut fixups,
            )?;
        }

        debug!("walked {} chained fixups", fixups.len());
        Ok(fixups)
    }

    fn walk_segment_chains(
        &self,
        blob: &[u8],
        offset: usize,
        segment: &SegmentInfo,
        imports: &[ChainedImport],
        fixups: &mut Vec<ChainedFixup>,
    ) -> Result<()> {
        let endian = self.endian();
        let truncated = || Error::parse(offset, "truncated chained segment info");

        let page_size = read_u16(blob, offset + 4, endian).ok_or_else(truncated)? as u64;
        let pointer_format = read_u16(blob, offset + 6, endian).ok_or_else(truncated)?;
        let page_count = read_u16(blob, offset + 20, endian).ok_or_else(truncated)?;

        let Some(stride) = chained_stride(pointer_format) else {
            debug!(
                "segment {} uses unsupported chained pointer format {}",
                segment.name, pointer_format
            );
            return Ok(());
        };

        let base = self.base_address();
        let max_slots = page_size / stride + 1;

        for page in 0..page_count as usize {
            let start = read_u16(blob, offset + STARTS_IN_SEGMENT_SIZE + page * 2, endian)
                .ok_or_else(truncated)?;
            if start == DYLD_CHAINED_PTR_START_NONE || start & DYLD_CHAINED_PTR_START_MULTI != 0 {
                continue;
            }

            let mut slot = page as u64 * page_size + start as u64;
            for _ in 0..max_slots {
                let file_offset = (segment.fileoff + slot) as usize;
                let raw = if pointer_format == DYLD_CHAINED_PTR_32 {
                    read_u32(self.data(), file_offset, endian).map(u64::from)
                } else {
                    read_u64(self.data(), file_offset, endian)
                };
                let Some(raw) = raw else {
                    debug!("chain in {} runs past the file at {:#x}", segment.name, file_offset);
                    break;
                };
                let Some((target, next)) = decode_chained_pointer(pointer_format, raw, base) else {
                    break;
                };

                let address = segment.vmaddr + slot;
                match target {
                    ChainedTarget::Rebase(target) => {
                        trace!("chained rebase {:#x} -> {:#x}", address, target);
                        fixups.push(ChainedFixup::Rebase { address, target });
                    }
                    ChainedTarget::Bind { ordinal, addend } => match imports.get(ordinal as usize) {
                        Some(import) => fixups.push(ChainedFixup::Bind {
                            address,
                            lib_ordinal: import.lib_ordinal,
                            symbol_name: import.name.clone(),
                            addend: import.addend.wrapping_add(addend),
                        }),
                        None => debug!("chained bind at {:#x} has bad ordinal {}", address, ordinal),
                    },
                }

                if next == 0 {
                    break;
                }
                slot += next * stride;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ptr64_rebase_and_bind() {
        let rebase = 0x1_0000_4000u64 | (3 << 51);
        assert_eq!(
            decode_chained_pointer(DYLD_CHAINED_PTR_64, rebase, 0),
            Some((ChainedTarget::Rebase(0x1_0000_4000), 3))
        );

        let bind = (1u64 << 63) | (5 << 24) | 7;
        assert_eq!(
            decode_chained_pointer(DYLD_CHAINED_PTR_64, bind, 0),
            Some((ChainedTarget::Bind { ordinal: 7, addend: 5 }, 0))
        );
    }

    #[test]
    fn test_decode_ptr64_offset_adds_base() {
        let raw = 0x4000u64 | (1 << 51);
        assert_eq!(
            decode_chained_pointer(DYLD_CHAINED_PTR_64_OFFSET, raw, 0x1_0000_0000),
            Some((ChainedTarget::Rebase(0x1_0000_4000), 1))
        );
    }

    #[test]
    fn test_decode_arm64e() {
        // authenticated rebase: offset in the low 32 bits
        let auth = (1u64 << 63) | (0x1234 << 32) | 0x8000 | (2 << 51);
        assert_eq!(
            decode_chained_pointer(DYLD_CHAINED_PTR_ARM64E_USERLAND, auth, 0x1_0000_0000),
            Some((ChainedTarget::Rebase(0x1_0000_8000), 2))
        );

        // plain bind with a negative 19-bit addend
        let bind = (1u64 << 62) | (0x7_FFFF << 32) | 3;
        assert_eq!(
            decode_chained_pointer(DYLD_CHAINED_PTR_ARM64E, bind, 0),
            Some((ChainedTarget::Bind { ordinal: 3, addend: -1 }, 0))
        );

        // userland24 carries a 24-bit ordinal
        let bind24 = (1u64 << 62) | 0x12_3456;
        assert_eq!(
            decode_chained_pointer(DYLD_CHAINED_PTR_ARM64E_USERLAND24, bind24, 0),
            Some((ChainedTarget::Bind { ordinal: 0x12_3456, addend: 0 }, 0))
        );
    }

    #[test]
    fn test_decode_ptr32() {
        let raw = 0x2000u64 | (4 << 26);
        assert_eq!(
            decode_chained_pointer(DYLD_CHAINED_PTR_32, raw, 0),
            Some((ChainedTarget::Rebase(0x2000), 4))
        );
        assert_eq!(chained_stride(DYLD_CHAINED_PTR_32), Some(4));
        assert_eq!(decode_chained_pointer(99, raw, 0), None);
    }
}
