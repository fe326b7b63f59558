//! Address resolution cache.
//!
//! Maps virtual addresses to the symbol a slot is bound to and to the value
//! a slot holds after fixups. Built once per image from the export trie,
//! bind opcodes, chained fixups and relocation entries.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::error::Result;
use crate::macho::bind_opcodes::BIND_SPECIAL_DYLIB_SELF;
use crate::macho::{
    ChainedFixup, MachOFile, Relocation, ARM64_RELOC_AUTHENTICATED_POINTER, CPU_TYPE_ARM64,
};
use crate::util::{read_ptr, strip_auth_addend};

/// Symbol and pointer-value tables of one image.
#[derive(Debug, Default)]
pub struct AddressCache {
    symbols: HashMap<u64, String>,
    pointers: HashMap<u64, u64>,
    exports: HashMap<String, u64>,
}

impl AddressCache {
    /// Builds the cache for an image.
    ///
    /// Malformed bind, chain and relocation entries are skipped. A
    /// relocation naming a symbol the symbol table cannot produce fails the
    /// whole build.
    pub fn build(file: &MachOFile<'_>) -> Result<Self> {
        let mut cache = Self::default();

        for segment in file.segments() {
            trace!(
                "segment {} #{} at {:#x}+{:#x}",
                segment.name,
                segment.index,
                segment.vmaddr,
                segment.vmsize
            );
        }

        cache.load_exports(file);
        cache.load_binds(file);
        cache.load_chained_fixups(file);
        cache.load_relocations(file)?;

        debug!(
            "address cache: {} exports, {} symbols, {} pointers",
            cache.exports.len(),
            cache.symbols.len(),
            cache.pointers.len()
        );
        Ok(cache)
    }

    /// Returns the symbol bound at `addr`.
    #[inline]
    pub fn symbol_at(&self, addr: u64) -> Option<&str> {
        self.symbols.get(&addr).map(String::as_str)
    }

    /// Returns the resolved pointer value at `addr`.
    #[inline]
    pub fn pointer_at(&self, addr: u64) -> Option<u64> {
        self.pointers.get(&addr).copied()
    }

    /// Returns the address of an exported symbol.
    #[inline]
    pub fn export_address(&self, name: &str) -> Option<u64> {
        self.exports.get(name).copied()
    }

    // =========================================================================
    // Loading
    // =========================================================================

    fn load_exports(&mut self, file: &MachOFile<'_>) {
        let base = file.base_address();
        match file.exports() {
            Ok(exports) if !exports.is_empty() => {
                for export in exports {
                    if export.is_reexport() {
                        continue;
                    }
                    let address = if export.is_absolute() {
                        export.address
                    } else {
                        base.wrapping_add(export.address)
                    };
                    self.exports.insert(export.name, address);
                }
                return;
            }
            Ok(_) => {}
            Err(e) => debug!("export trie unreadable, using symbol table: {}", e),
        }

        // No trie: fall back to the defined external symbols.
        for index in 0..file.symbol_count() {
            match file.symbol(index) {
                Ok(symbol) if symbol.is_external() && symbol.is_defined() => {
                    self.exports.insert(symbol.name, symbol.value);
                }
                Ok(_) => {}
                Err(e) => debug!("skipping symbol {}: {}", index, e),
            }
        }
    }

    fn load_binds(&mut self, file: &MachOFile<'_>) {
        let binds = match file.binds() {
            Ok(binds) => binds,
            Err(e) => {
                debug!("skipping bind info: {}", e);
                return;
            }
        };

        for bind in binds {
            self.record_bind(
                bind.address,
                bind.ordinal,
                bind.symbol_name,
                bind.addend,
            );
        }
    }

    fn load_chained_fixups(&mut self, file: &MachOFile<'_>) {
        let fixups = match file.chained_fixups() {
            Ok(fixups) => fixups,
            Err(e) => {
                debug!("skipping chained fixups: {}", e);
                return;
            }
        };

        for fixup in fixups {
            match fixup {
                ChainedFixup::Rebase { address, target } => {
                    self.pointers.insert(address, target);
                }
                ChainedFixup::Bind {
                    address,
                    lib_ordinal,
                    symbol_name,
                    addend,
                } => self.record_bind(address, lib_ordinal, symbol_name, addend),
            }
        }
    }

    /// Records a bind: self binds resolve through the exports, everything
    /// else names the slot.
    fn record_bind(&mut self, address: u64, ordinal: i64, name: String, addend: i64) {
        if ordinal == BIND_SPECIAL_DYLIB_SELF {
            match self.exports.get(&name) {
                Some(&target) => {
                    self.pointers
                        .insert(address, target.wrapping_add(addend as u64));
                }
                None => debug!("self bind of {} at {:#x} has no export", name, address),
            }
            return;
        }
        self.symbols.insert(address, name);
    }

    fn load_relocations(&mut self, file: &MachOFile<'_>) -> Result<()> {
        let sections: Vec<_> = file.sections().filter(|s| s.nreloc != 0).cloned().collect();
        for section in &sections {
            match file.section_relocations(section) {
                Ok(relocations) => {
                    for relocation in relocations {
                        self.record_relocation(file, relocation)?;
                    }
                }
                Err(e) => debug!("skipping relocations of {}: {}", section.full_name(), e),
            }
        }

        match file.external_relocations() {
            Ok(relocations) => {
                for relocation in relocations {
                    self.record_relocation(file, relocation)?;
                }
            }
            Err(e) => debug!("skipping external relocations: {}", e),
        }
        Ok(())
    }

    fn record_relocation(&mut self, file: &MachOFile<'_>, relocation: Relocation) -> Result<()> {
        if !relocation.is_extern || relocation.scattered || relocation.pcrel {
            return Ok(());
        }

        let symbol = file.symbol(relocation.symbol_num)?;

        let Some(raw) = Self::read_addend(file, relocation.address) else {
            debug!(
                "relocation at {:#x} for {} is outside the image",
                relocation.address, symbol.name
            );
            return Ok(());
        };
        let addend = if relocation.r_type == ARM64_RELOC_AUTHENTICATED_POINTER
            && file.header().cputype == CPU_TYPE_ARM64
        {
            strip_auth_addend(raw)
        } else {
            raw
        };

        let value = symbol.value.wrapping_add(addend);
        trace!(
            "relocation {:#x} -> {} + {:#x} = {:#x}",
            relocation.address,
            symbol.name,
            addend,
            value
        );
        self.pointers.insert(relocation.address, value);
        self.symbols.insert(relocation.address, symbol.name);
        Ok(())
    }

    /// Reads the pointer-sized addend stored in the fixed-up slot.
    fn read_addend(file: &MachOFile<'_>, addr: u64) -> Option<u64> {
        let section = file.section_containing(addr)?;
        let offset = section.offset as u64 + (addr - section.addr);
        read_ptr(file.data(), offset as usize, file.is_64(), file.endian())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::macho::bind_opcodes::BIND_SPECIAL_DYLIB_FLAT_LOOKUP;
    use crate::macho::RELOC_UNSIGNED;
    use crate::testutil::ImageBuilder;

    #[test]
    fn test_binds_split_by_ordinal() {
        let mut builder = ImageBuilder::new_64();
        builder.text_segment();
        let target = builder.reserve("__DATA", "__objc_data", 40);
        let slots = builder.pointers("__DATA", "__objc_classrefs", &[0, 0, 0]);
        builder.export("_OBJC_CLASS_$_Foo", target, 0);
        builder.bind(slots, 1, "_OBJC_CLASS_$_NSObject", 0);
        builder.bind(slots + 8, BIND_SPECIAL_DYLIB_SELF, "_OBJC_CLASS_$_Foo", 16);
        builder.bind(slots + 16, BIND_SPECIAL_DYLIB_FLAT_LOOKUP, "_missing", 0);
        let data = builder.build();
        let file = MachOFile::parse(&data).unwrap();

        let cache = AddressCache::build(&file).unwrap();
        assert_eq!(cache.export_address("_OBJC_CLASS_$_Foo"), Some(target));
        assert_eq!(cache.symbol_at(slots), Some("_OBJC_CLASS_$_NSObject"));
        assert_eq!(cache.pointer_at(slots + 8), Some(target + 16));
        assert_eq!(cache.symbol_at(slots + 8), None);
        assert_eq!(cache.symbol_at(slots + 16), Some("_missing"));
    }

    #[test]
    fn test_exports_fall_back_to_symbols() {
        let mut builder = ImageBuilder::new_64();
        builder.text_segment();
        let addr = builder.reserve("__DATA", "__data", 8);
        builder.defined_symbol("_global", addr, 0);
        builder.undefined_symbol("_imported");
        let data = builder.build();
        let file = MachOFile::parse(&data).unwrap();

        let cache = AddressCache::build(&file).unwrap();
        assert_eq!(cache.export_address("_global"), Some(addr));
        assert_eq!(cache.export_address("_imported"), None);
    }

    #[test]
    fn test_authenticated_relocation_addend() {
        let mut builder = ImageBuilder::new_arm64e();
        builder.text_segment();
        let slot = builder.reserve("__DATA", "__objc_const", 16);
        builder.write_u64(slot, 0xAAAA_AAAA_1234_5678);
        builder.write_u64(slot + 8, 0x0000_0001_8000_0010);
        let sym = builder.undefined_symbol("_OBJC_CLASS_$_NSObject");
        builder.section_relocation(slot, sym, ARM64_RELOC_AUTHENTICATED_POINTER);
        builder.section_relocation(slot + 8, sym, ARM64_RELOC_AUTHENTICATED_POINTER);
        let data = builder.build();
        let file = MachOFile::parse(&data).unwrap();

        let cache = AddressCache::build(&file).unwrap();
        assert_eq!(cache.pointer_at(slot), Some(0x1234_5678));
        assert_eq!(cache.pointer_at(slot + 8), Some(0xFFFF_FFFF_8000_0010));
        assert_eq!(cache.symbol_at(slot), Some("_OBJC_CLASS_$_NSObject"));
    }

    #[test]
    fn test_plain_relocation_keeps_addend() {
        let mut builder = ImageBuilder::new_i386();
        builder.text_segment();
        let slot = builder.reserve("__DATA", "__data", 4);
        builder.write_u32(slot, 0x20);
        let sym = builder.defined_symbol("_table", 0x3000, 0);
        builder.external_relocation(slot, sym, RELOC_UNSIGNED);
        let data = builder.build();
        let file = MachOFile::parse(&data).unwrap();

        let cache = AddressCache::build(&file).unwrap();
        assert_eq!(cache.pointer_at(slot), Some(0x3020));
        assert_eq!(cache.symbol_at(slot), Some("_table"));
    }

    #[test]
    fn test_relocation_symbol_lookup_is_fatal() {
        let mut builder = ImageBuilder::new_64();
        builder.text_segment();
        let slot = builder.reserve("__DATA", "__data", 8);
        builder.undefined_symbol("_only");
        builder.section_relocation(slot, 9, RELOC_UNSIGNED);
        let data = builder.build();
        let file = MachOFile::parse(&data).unwrap();

        let err = AddressCache::build(&file).unwrap_err();
        assert!(matches!(err, Error::SymbolLookup { index: 9, .. }));
    }
}
