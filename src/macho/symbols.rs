//! Symbol table and relocation entries.

use super::constants::*;
use super::context::{MachOFile, SectionInfo};
use super::structs::*;
use crate::error::{Error, Result};
use crate::util::read_cstr;

// =============================================================================
// Symbols
// =============================================================================

/// A symbol table entry, widened to 64 bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// Symbol name
    pub name: String,
    /// Type flag
    pub n_type: u8,
    /// Section ordinal or NO_SECT
    pub n_sect: u8,
    /// Description flags
    pub n_desc: u16,
    /// Value (address for defined symbols)
    pub value: u64,
}

impl Symbol {
    /// Returns true for debugging (stab) entries.
    #[inline]
    pub fn is_stab(&self) -> bool {
        self.n_type & N_STAB != 0
    }

    /// Returns true if the symbol is external.
    #[inline]
    pub fn is_external(&self) -> bool {
        self.n_type & N_EXT != 0
    }

    /// Returns true if the symbol is a private external.
    #[inline]
    pub fn is_private_external(&self) -> bool {
        self.n_type & N_PEXT != 0
    }

    /// Returns true if the symbol is undefined.
    #[inline]
    pub fn is_undefined(&self) -> bool {
        !self.is_stab() && self.n_type & N_TYPE == N_UNDF
    }

    /// Returns true if the symbol is defined in a section or absolute.
    #[inline]
    pub fn is_defined(&self) -> bool {
        !self.is_stab() && matches!(self.n_type & N_TYPE, N_SECT | N_ABS)
    }

    /// Returns true if the symbol is a weak definition.
    #[inline]
    pub fn is_weak_def(&self) -> bool {
        self.n_desc & N_WEAK_DEF != 0
    }
}

impl<'data> MachOFile<'data> {
    /// Returns the number of symbols in the symbol table.
    pub fn symbol_count(&self) -> u32 {
        self.symtab().map(|s| s.nsyms).unwrap_or(0)
    }

    /// Reads the symbol at `index`.
    ///
    /// Fails with [`Error::SymbolLookup`] when the index is out of range and
    /// [`Error::StringTableOverflow`] when the name is unreadable.
    pub fn symbol(&self, index: u32) -> Result<Symbol> {
        let count = self.symbol_count();
        let symtab = match self.symtab() {
            Some(symtab) if index < count => *symtab,
            _ => return Err(Error::SymbolLookup { index, count }),
        };

        let (n_strx, n_type, n_sect, n_desc, value) = if self.is_64() {
            let offset = symtab.symoff as usize + index as usize * Nlist64::SIZE;
            let nlist: Nlist64 = self.read_struct(offset)?;
            (nlist.n_strx, nlist.n_type, nlist.n_sect, nlist.n_desc, nlist.n_value)
        } else {
            let offset = symtab.symoff as usize + index as usize * Nlist32::SIZE;
            let nlist: Nlist32 = self.read_struct(offset)?;
            (
                nlist.n_strx,
                nlist.n_type,
                nlist.n_sect,
                nlist.n_desc,
                nlist.n_value as u64,
            )
        };

        let overflow = || Error::StringTableOverflow {
            offset: n_strx,
            size: symtab.strsize,
        };
        if n_strx >= symtab.strsize {
            return Err(overflow());
        }
        let strtab = self
            .read_at(symtab.stroff as usize, symtab.strsize as usize)
            .map_err(|_| overflow())?;
        let name = read_cstr(strtab, n_strx as usize).ok_or_else(overflow)?;

        Ok(Symbol {
            name: name.to_string(),
            n_type,
            n_sect,
            n_desc,
            value,
        })
    }

    /// Reads the whole symbol table.
    pub fn symbols(&self) -> Result<Vec<Symbol>> {
        (0..self.symbol_count()).map(|i| self.symbol(i)).collect()
    }
}

// =============================================================================
// Relocations
// =============================================================================

/// A decoded relocation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    /// Virtual address of the fixed-up slot
    pub address: u64,
    /// Symbol index (extern) or section ordinal
    pub symbol_num: u32,
    /// PC-relative
    pub pcrel: bool,
    /// log2 of the fixup width
    pub length: u8,
    /// Symbol index refers to the symbol table
    pub is_extern: bool,
    /// Architecture-specific relocation type
    pub r_type: u8,
    /// Scattered relocation (no symbol)
    pub scattered: bool,
}

impl<'data> MachOFile<'data> {
    /// Returns true if this architecture has scattered relocations.
    fn has_scattered_relocs(&self) -> bool {
        !matches!(
            self.header().cputype,
            CPU_TYPE_X86_64 | CPU_TYPE_ARM64 | CPU_TYPE_ARM64_32
        )
    }

    /// Decodes one raw relocation against a base address.
    fn decode_relocation(&self, raw: RelocationInfo, base: u64) -> Relocation {
        let w0 = raw.r_word0;
        let w1 = raw.r_word1;

        if self.has_scattered_relocs() && w0 & R_SCATTERED != 0 {
            return Relocation {
                address: base.wrapping_add((w0 & 0x00FF_FFFF) as u64),
                symbol_num: 0,
                pcrel: (w0 >> 30) & 1 != 0,
                length: ((w0 >> 28) & 3) as u8,
                is_extern: false,
                r_type: ((w0 >> 24) & 0xF) as u8,
                scattered: true,
            };
        }

        let address = base.wrapping_add(w0 as i32 as i64 as u64);
        match self.endian() {
            crate::util::Endian::Little => Relocation {
                address,
                symbol_num: w1 & 0x00FF_FFFF,
                pcrel: (w1 >> 24) & 1 != 0,
                length: ((w1 >> 25) & 3) as u8,
                is_extern: (w1 >> 27) & 1 != 0,
                r_type: (w1 >> 28) as u8,
                scattered: false,
            },
            crate::util::Endian::Big => Relocation {
                address,
                symbol_num: w1 >> 8,
                pcrel: (w1 >> 7) & 1 != 0,
                length: ((w1 >> 5) & 3) as u8,
                is_extern: (w1 >> 4) & 1 != 0,
                r_type: (w1 & 0xF) as u8,
                scattered: false,
            },
        }
    }

    fn read_relocations(&self, offset: u32, count: u32, base: u64) -> Result<Vec<Relocation>> {
        (0..count as usize)
            .map(|i| {
                let raw: RelocationInfo =
                    self.read_struct(offset as usize + i * RelocationInfo::SIZE)?;
                Ok(self.decode_relocation(raw, base))
            })
            .collect()
    }

    /// Enumerates the relocation entries of a section.
    pub fn section_relocations(&self, section: &SectionInfo) -> Result<Vec<Relocation>> {
        if section.nreloc == 0 {
            return Ok(Vec::new());
        }
        self.read_relocations(section.reloff, section.nreloc, section.addr)
    }

    /// Enumerates the external relocations of the dynamic symbol table.
    ///
    /// Addresses are relative to the first writable segment on x86_64 and to
    /// the first segment elsewhere.
    pub fn external_relocations(&self) -> Result<Vec<Relocation>> {
        let Some(dysymtab) = self.dysymtab() else {
            return Ok(Vec::new());
        };
        if dysymtab.nextrel == 0 {
            return Ok(Vec::new());
        }

        let base = if self.header().cputype == CPU_TYPE_X86_64 {
            self.segments().iter().find(|s| s.is_writable())
        } else {
            self.segments().first()
        }
        .map(|s| s.vmaddr)
        .unwrap_or(0);

        self.read_relocations(dysymtab.extreloff, dysymtab.nextrel, base)
    }
}
