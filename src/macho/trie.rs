//! Export trie and bind opcode parsing.
//!
//! Exported names come from walking the `LC_DYLD_INFO` or
//! `LC_DYLD_EXPORTS_TRIE` trie depth-first. Bind opcodes are decoded into
//! per-slot records so the ObjC reader can name external references.

use tracing::debug;

use super::constants::*;
use super::context::MachOFile;
use crate::error::{Error, Result};
use crate::util::{read_sleb128_fast, read_uleb128_fast};

// =============================================================================
// LEB128 Decoding
// =============================================================================

/// Reads an unsigned LEB128 value at `offset` in `data`.
#[inline(always)]
fn read_uleb128(data: &[u8], offset: usize) -> Result<(u64, usize)> {
    data.get(offset..)
        .and_then(read_uleb128_fast)
        .ok_or(Error::InvalidUleb128 { offset })
}

/// Reads a signed LEB128 value at `offset` in `data`.
#[inline(always)]
fn read_sleb128(data: &[u8], offset: usize) -> Result<(i64, usize)> {
    data.get(offset..)
        .and_then(read_sleb128_fast)
        .ok_or(Error::InvalidUleb128 { offset })
}

/// Reads a NUL-terminated label, returning it and the offset past the NUL.
fn read_label(data: &[u8], offset: usize) -> (&[u8], usize) {
    let tail = data.get(offset..).unwrap_or_default();
    let len = memchr::memchr(0, tail).unwrap_or(tail.len());
    (&tail[..len], offset + len + 1)
}

// =============================================================================
// Export Info
// =============================================================================

/// Information about an exported symbol.
#[derive(Debug, Clone)]
pub struct ExportInfo {
    /// Symbol name
    pub name: String,
    /// Export flags
    pub flags: u64,
    /// Symbol address (relative to the mach header)
    pub address: u64,
    /// For re-exports: ordinal of the source dylib
    pub reexport_ordinal: Option<u32>,
    /// For re-exports: imported symbol name (if different)
    pub reexport_name: Option<String>,
}

impl ExportInfo {
    /// Returns true if this is a re-export.
    #[inline]
    pub fn is_reexport(&self) -> bool {
        (self.flags & EXPORT_SYMBOL_FLAGS_REEXPORT) != 0
    }

    /// Returns true if this is a weak definition.
    #[inline]
    pub fn is_weak(&self) -> bool {
        (self.flags & EXPORT_SYMBOL_FLAGS_WEAK_DEFINITION) != 0
    }

    /// Returns true if this is a thread-local variable.
    #[inline]
    pub fn is_thread_local(&self) -> bool {
        self.kind() == EXPORT_SYMBOL_FLAGS_KIND_THREAD_LOCAL
    }

    /// Returns true if the address is absolute rather than image-relative.
    #[inline]
    pub fn is_absolute(&self) -> bool {
        self.kind() == EXPORT_SYMBOL_FLAGS_KIND_ABSOLUTE
    }

    /// Returns the symbol kind.
    #[inline]
    pub fn kind(&self) -> u64 {
        self.flags & EXPORT_SYMBOL_FLAGS_KIND_MASK
    }
}

// =============================================================================
// Export Trie Parser
// =============================================================================

/// Parser for export tries.
pub struct ExportTrieParser<'a> {
    data: &'a [u8],
}

impl<'a> ExportTrieParser<'a> {
    /// Creates a new parser for the given export trie data.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Parses all exports from the trie.
    pub fn parse_all(&self) -> Result<Vec<ExportInfo>> {
        let mut exports = Vec::new();
        if !self.data.is_empty() {
            let mut visited = Vec::new();
            self.parse_node(0, String::new(), &mut visited, &mut exports)?;
        }
        Ok(exports)
    }

    /// Recursive node parser.
    ///
    /// `visited` holds the node offsets on the current path; a child edge
    /// pointing back into the path is malformed.
    fn parse_node(
        &self,
        offset: usize,
        prefix: String,
        visited: &mut Vec<usize>,
        exports: &mut Vec<ExportInfo>,
    ) -> Result<()> {
        if offset >= self.data.len() || visited.contains(&offset) {
            return Err(Error::InvalidExportTrie { offset });
        }
        visited.push(offset);

        let (terminal_size, bytes_read) = read_uleb128(self.data, offset)?;
        let mut cursor = offset + bytes_read;

        if terminal_size > 0 {
            let export = self.parse_terminal_info(cursor, &prefix)?;
            exports.push(export);
        }
        cursor += terminal_size as usize;

        if cursor < self.data.len() {
            let child_count = self.data[cursor] as usize;
            cursor += 1;

            for _ in 0..child_count {
                let (label, next) = read_label(self.data, cursor);
                let label = String::from_utf8_lossy(label);
                cursor = next;

                let (child_offset, bytes) = read_uleb128(self.data, cursor)?;
                cursor += bytes;

                let child_prefix = format!("{}{}", prefix, label);
                self.parse_node(child_offset as usize, child_prefix, visited, exports)?;
            }
        }

        visited.pop();
        Ok(())
    }

    /// Parses terminal export info.
    fn parse_terminal_info(&self, offset: usize, name: &str) -> Result<ExportInfo> {
        let (flags, bytes) = read_uleb128(self.data, offset)?;
        let mut cursor = offset + bytes;

        let mut export = ExportInfo {
            name: name.to_string(),
            flags,
            address: 0,
            reexport_ordinal: None,
            reexport_name: None,
        };

        if (flags & EXPORT_SYMBOL_FLAGS_REEXPORT) != 0 {
            let (ordinal, bytes) = read_uleb128(self.data, cursor)?;
            cursor += bytes;
            export.reexport_ordinal = Some(ordinal as u32);

            let (import_name, _) = read_label(self.data, cursor);
            if !import_name.is_empty() {
                export.reexport_name = Some(String::from_utf8_lossy(import_name).into_owned());
            }
        } else {
            // Stub-and-resolver entries carry the stub address first.
            let (addr, _) = read_uleb128(self.data, cursor)?;
            export.address = addr;
        }

        Ok(export)
    }
}

// =============================================================================
// Bind Opcode Parser
// =============================================================================

/// A binding record from parsing bind opcodes.
#[derive(Debug, Clone)]
pub struct BindRecord {
    /// Segment index
    pub segment_index: u8,
    /// Offset within segment
    pub segment_offset: u64,
    /// Binding type
    pub bind_type: u8,
    /// Symbol name
    pub symbol_name: String,
    /// Dylib ordinal (zero or negative for the special ordinals)
    pub ordinal: i64,
    /// Addend
    pub addend: i64,
}

/// Parses bind info opcodes.
///
/// `pointer_size` is the slot stride used by the `DO_BIND` family.
pub fn parse_bind_info(data: &[u8], pointer_size: u64) -> Result<Vec<BindRecord>> {
    use bind_opcodes::*;

    let mut records = Vec::new();
    let mut cursor = 0usize;

    let mut segment_index: u8 = 0;
    let mut segment_offset: u64 = 0;
    let mut bind_type: u8 = 0;
    let mut symbol_name = String::new();
    let mut ordinal: i64 = 0;
    let mut addend: i64 = 0;

    let record = |segment_offset: u64,
                  segment_index: u8,
                  bind_type: u8,
                  symbol_name: &str,
                  ordinal: i64,
                  addend: i64| BindRecord {
        segment_index,
        segment_offset,
        bind_type,
        symbol_name: symbol_name.to_string(),
        ordinal,
        addend,
    };

    while cursor < data.len() {
        let byte = data[cursor];
        let opcode = byte & BIND_OPCODE_MASK;
        let immediate = byte & BIND_IMMEDIATE_MASK;
        cursor += 1;

        match opcode {
            BIND_OPCODE_DONE => {
                // Lazy bind streams use DONE as a separator; a regular stream
                // ends here.
                break;
            }

            BIND_OPCODE_SET_DYLIB_ORDINAL_IMM => {
                ordinal = immediate as i64;
            }

            BIND_OPCODE_SET_DYLIB_ORDINAL_ULEB => {
                let (val, bytes) = read_uleb128(data, cursor)?;
                cursor += bytes;
                ordinal = val as i64;
            }

            BIND_OPCODE_SET_DYLIB_SPECIAL_IMM => {
                ordinal = if immediate == 0 {
                    BIND_SPECIAL_DYLIB_SELF
                } else {
                    (BIND_OPCODE_MASK | immediate) as i8 as i64
                };
            }

            BIND_OPCODE_SET_SYMBOL_TRAILING_FLAGS_IMM => {
                let (name, next) = read_label(data, cursor);
                symbol_name = String::from_utf8_lossy(name).into_owned();
                cursor = next;
            }

            BIND_OPCODE_SET_TYPE_IMM => {
                bind_type = immediate;
            }

            BIND_OPCODE_SET_ADDEND_SLEB => {
                let (val, bytes) = read_sleb128(data, cursor)?;
                cursor += bytes;
                addend = val;
            }

            BIND_OPCODE_SET_SEGMENT_AND_OFFSET_ULEB => {
                segment_index = immediate;
                let (val, bytes) = read_uleb128(data, cursor)?;
                cursor += bytes;
                segment_offset = val;
            }

            BIND_OPCODE_ADD_ADDR_ULEB => {
                let (val, bytes) = read_uleb128(data, cursor)?;
                cursor += bytes;
                segment_offset = segment_offset.wrapping_add(val);
            }

            BIND_OPCODE_DO_BIND => {
                records.push(record(
                    segment_offset,
                    segment_index,
                    bind_type,
                    &symbol_name,
                    ordinal,
                    addend,
                ));
                segment_offset = segment_offset.wrapping_add(pointer_size);
            }

            BIND_OPCODE_DO_BIND_ADD_ADDR_ULEB => {
                records.push(record(
                    segment_offset,
                    segment_index,
                    bind_type,
                    &symbol_name,
                    ordinal,
                    addend,
                ));
                let (val, bytes) = read_uleb128(data, cursor)?;
                cursor += bytes;
                segment_offset = segment_offset.wrapping_add(pointer_size).wrapping_add(val);
            }

            BIND_OPCODE_DO_BIND_ADD_ADDR_IMM_SCALED => {
                records.push(record(
                    segment_offset,
                    segment_index,
                    bind_type,
                    &symbol_name,
                    ordinal,
                    addend,
                ));
                segment_offset = segment_offset
                    .wrapping_add(pointer_size + immediate as u64 * pointer_size);
            }

            BIND_OPCODE_DO_BIND_ULEB_TIMES_SKIPPING_ULEB => {
                let (count, bytes1) = read_uleb128(data, cursor)?;
                cursor += bytes1;
                let (skip, bytes2) = read_uleb128(data, cursor)?;
                cursor += bytes2;

                for _ in 0..count {
                    records.push(record(
                        segment_offset,
                        segment_index,
                        bind_type,
                        &symbol_name,
                        ordinal,
                        addend,
                    ));
                    segment_offset = segment_offset.wrapping_add(pointer_size).wrapping_add(skip);
                }
            }

            BIND_OPCODE_THREADED => {
                // Threaded binds only appear alongside chained fixups, which
                // are walked separately.
                if immediate == 0 {
                    let (_, bytes) = read_uleb128(data, cursor)?;
                    cursor += bytes;
                }
            }

            _ => {
                debug!("unknown bind opcode {:#x} at {:#x}", byte, cursor - 1);
                return Err(Error::parse(cursor - 1, format!("unknown bind opcode {:#x}", byte)));
            }
        }
    }

    Ok(records)
}

// =============================================================================
// Image Queries
// =============================================================================

/// A bind record resolved to a virtual address.
#[derive(Debug, Clone)]
pub struct Bind {
    /// Address of the bound slot
    pub address: u64,
    /// Symbol name
    pub symbol_name: String,
    /// Dylib ordinal
    pub ordinal: i64,
    /// Addend
    pub addend: i64,
}

impl<'data> MachOFile<'data> {
    /// Returns the raw export trie, from `LC_DYLD_INFO[_ONLY]` or
    /// `LC_DYLD_EXPORTS_TRIE`.
    pub fn export_trie(&self) -> Result<Option<&'data [u8]>> {
        let range = if let Some(command) = self.linkedit_data(LC_DYLD_EXPORTS_TRIE) {
            Some((command.dataoff, command.datasize))
        } else {
            self.dyld_info()
                .filter(|info| info.export_size != 0)
                .map(|info| (info.export_off, info.export_size))
        };

        match range {
            Some((offset, size)) if size != 0 => {
                self.read_at(offset as usize, size as usize).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Enumerates exported symbols from the export trie.
    pub fn exports(&self) -> Result<Vec<ExportInfo>> {
        match self.export_trie()? {
            Some(trie) => ExportTrieParser::new(trie).parse_all(),
            None => Ok(Vec::new()),
        }
    }

    /// Enumerates the regular (non-lazy) bind entries.
    ///
    /// Records whose segment index is out of range are dropped.
    pub fn binds(&self) -> Result<Vec<Bind>> {
        let Some(info) = self.dyld_info() else {
            return Ok(Vec::new());
        };
        if info.bind_size == 0 {
            return Ok(Vec::new());
        }

        let data = self.read_at(info.bind_off as usize, info.bind_size as usize)?;
        let records = parse_bind_info(data, self.pointer_size())?;

        Ok(records
            .into_iter()
            .filter_map(|record| {
                let Some(segment) = self.segments().get(record.segment_index as usize) else {
                    debug!(
                        "bind of {} references missing segment {}",
                        record.symbol_name, record.segment_index
                    );
                    return None;
                };
                Some(Bind {
                    address: segment.vmaddr.wrapping_add(record.segment_offset),
                    symbol_name: record.symbol_name,
                    ordinal: record.ordinal,
                    addend: record.addend,
                })
            })
            .collect())
    }
}
