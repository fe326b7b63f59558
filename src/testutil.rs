//! Synthetic Mach-O images for tests.
//!
//! Every segment owns a fixed 64 KiB region and every section a 4 KiB slot
//! inside it, so addresses are known as soon as a section is reserved and
//! structures can point at sections created later. File offsets equal
//! virtual offsets from the image base.

use std::collections::BTreeMap;

use crate::macho::bind_opcodes::*;
use crate::macho::*;
use crate::util::{write_sleb128, write_uleb128, Endian};

const REGION: u64 = 0x1_0000;
const SLOT: u64 = 0x1000;

struct SectionDraft {
    name: String,
    addr: u64,
    data: Vec<u8>,
    zerofill_size: Option<u64>,
    flags: u32,
    relocs: Vec<(u64, u32, u8)>,
}

struct SegmentDraft {
    name: String,
    sections: Vec<SectionDraft>,
}

/// Builds a Mach-O image in memory.
pub struct ImageBuilder {
    is_64: bool,
    endian: Endian,
    cputype: u32,
    cpusubtype: u32,
    filetype: u32,
    flags: u32,
    segments: Vec<SegmentDraft>,
    symbols: Vec<(String, u8, u16, u64)>,
    binds: Vec<(u64, i64, String, i64)>,
    exports: Vec<(String, u64, u64)>,
    external_relocs: Vec<(u64, u32, u8)>,
    install_name: Option<(String, u32, u32)>,
    umbrella: Option<String>,
    build_version: Option<(u32, u32)>,
    encryption: Option<(u32, u32)>,
}

impl ImageBuilder {
    /// Load address of 64-bit images.
    pub const BASE: u64 = 0x1_0000_0000;
    /// Load address of 32-bit images.
    pub const BASE_32: u64 = 0x1000;

    fn new(is_64: bool, endian: Endian, cputype: u32, cpusubtype: u32) -> Self {
        Self {
            is_64,
            endian,
            cputype,
            cpusubtype,
            filetype: MH_DYLIB,
            flags: MachOFlags::TWOLEVEL.bits(),
            segments: vec![SegmentDraft {
                name: "__TEXT".to_string(),
                sections: Vec::new(),
            }],
            symbols: Vec::new(),
            binds: Vec::new(),
            exports: Vec::new(),
            external_relocs: Vec::new(),
            install_name: None,
            umbrella: None,
            build_version: None,
            encryption: None,
        }
    }

    /// Little-endian arm64 dylib.
    pub fn new_64() -> Self {
        Self::new(true, Endian::Little, CPU_TYPE_ARM64, 0)
    }

    /// Little-endian arm64e dylib.
    pub fn new_arm64e() -> Self {
        Self::new(true, Endian::Little, CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64E)
    }

    /// Little-endian i386 dylib.
    pub fn new_i386() -> Self {
        Self::new(false, Endian::Little, CPU_TYPE_X86, 3)
    }

    /// Big-endian 32-bit PowerPC dylib.
    pub fn new_ppc() -> Self {
        Self::new(false, Endian::Big, CPU_TYPE_POWERPC, 0)
    }

    /// Returns the image load address.
    pub fn base(&self) -> u64 {
        if self.is_64 {
            Self::BASE
        } else {
            Self::BASE_32
        }
    }

    /// Returns the pointer width in bytes.
    pub fn pointer_size(&self) -> u64 {
        if self.is_64 {
            8
        } else {
            4
        }
    }

    /// Returns the byte order of the image.
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Sets the file type.
    pub fn filetype(&mut self, filetype: u32) -> &mut Self {
        self.filetype = filetype;
        self
    }

    /// Adds header flags.
    pub fn flags(&mut self, flags: MachOFlags) -> &mut Self {
        self.flags |= flags.bits();
        self
    }

    /// Adds a small `__TEXT,__text` section.
    pub fn text_segment(&mut self) -> &mut Self {
        self.reserve("__TEXT", "__text", 16);
        self.section_mut("__TEXT", "__text").flags = S_ATTR_PURE_INSTRUCTIONS;
        self
    }

    /// Sets `LC_ID_DYLIB`.
    pub fn install_name(&mut self, name: &str, current: u32, compat: u32) -> &mut Self {
        self.install_name = Some((name.to_string(), current, compat));
        self
    }

    /// Sets `LC_SUB_FRAMEWORK`.
    pub fn umbrella(&mut self, umbrella: &str) -> &mut Self {
        self.umbrella = Some(umbrella.to_string());
        self
    }

    /// Sets `LC_BUILD_VERSION`.
    pub fn build_version(&mut self, platform: u32, minos: u32) -> &mut Self {
        self.build_version = Some((platform, minos));
        self
    }

    /// Adds an encryption info command with crypt id 1.
    pub fn encryption(&mut self, cryptoff: u32, cryptsize: u32) -> &mut Self {
        self.encryption = Some((cryptoff, cryptsize));
        self
    }

    // =========================================================================
    // Sections
    // =========================================================================

    fn segment_index(&mut self, segment: &str) -> usize {
        match self.segments.iter().position(|s| s.name == segment) {
            Some(index) => index,
            None => {
                self.segments.push(SegmentDraft {
                    name: segment.to_string(),
                    sections: Vec::new(),
                });
                self.segments.len() - 1
            }
        }
    }

    fn section_mut(&mut self, segment: &str, section: &str) -> &mut SectionDraft {
        let index = self.segment_index(segment);
        let base = self.base();
        let seg = &mut self.segments[index];
        if let Some(pos) = seg.sections.iter().position(|s| s.name == section) {
            return &mut seg.sections[pos];
        }
        // slot 0 of __TEXT holds the header and load commands
        let slot = seg.sections.len() as u64 + u64::from(index == 0);
        assert!(slot < REGION / SLOT, "too many sections in {}", segment);
        seg.sections.push(SectionDraft {
            name: section.to_string(),
            addr: base + index as u64 * REGION + slot * SLOT,
            data: Vec::new(),
            zerofill_size: None,
            flags: 0,
            relocs: Vec::new(),
        });
        let last = seg.sections.len() - 1;
        &mut seg.sections[last]
    }

    fn section_at(&mut self, addr: u64) -> (&mut SectionDraft, usize) {
        for seg in &mut self.segments {
            for sect in &mut seg.sections {
                if addr >= sect.addr && addr < sect.addr + SLOT {
                    let offset = (addr - sect.addr) as usize;
                    return (sect, offset);
                }
            }
        }
        panic!("address {:#x} is not in any section", addr);
    }

    /// Reserves `size` zeroed bytes at the end of a section.
    pub fn reserve(&mut self, segment: &str, section: &str, size: usize) -> u64 {
        self.append(segment, section, &vec![0u8; size])
    }

    /// Appends bytes to a section, 8-byte aligned, returning their address.
    pub fn append(&mut self, segment: &str, section: &str, bytes: &[u8]) -> u64 {
        let sect = self.section_mut(segment, section);
        let aligned = (sect.data.len() + 7) & !7;
        sect.data.resize(aligned, 0);
        let addr = sect.addr + aligned as u64;
        sect.data.extend_from_slice(bytes);
        assert!(sect.data.len() as u64 <= SLOT, "section {} overflows", section);
        addr
    }

    /// Appends a NUL-terminated string without alignment.
    pub fn cstring(&mut self, segment: &str, section: &str, value: &str) -> u64 {
        let sect = self.section_mut(segment, section);
        let addr = sect.addr + sect.data.len() as u64;
        sect.data.extend_from_slice(value.as_bytes());
        sect.data.push(0);
        addr
    }

    /// Adds a zero-fill section.
    pub fn zerofill(&mut self, segment: &str, section: &str, size: u64) -> u64 {
        let sect = self.section_mut(segment, section);
        sect.zerofill_size = Some(size);
        sect.flags = S_ZEROFILL;
        sect.addr
    }

    /// Writes raw bytes at an address inside a section.
    pub fn write(&mut self, addr: u64, bytes: &[u8]) {
        let (sect, offset) = self.section_at(addr);
        if sect.data.len() < offset + bytes.len() {
            sect.data.resize(offset + bytes.len(), 0);
        }
        sect.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Writes a u32 in image byte order.
    pub fn write_u32(&mut self, addr: u64, value: u32) {
        let bytes = match self.endian {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        };
        self.write(addr, &bytes);
    }

    /// Writes a u16 in image byte order.
    pub fn write_u16(&mut self, addr: u64, value: u16) {
        let bytes = match self.endian {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        };
        self.write(addr, &bytes);
    }

    /// Writes a u64 in image byte order.
    pub fn write_u64(&mut self, addr: u64, value: u64) {
        let bytes = match self.endian {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        };
        self.write(addr, &bytes);
    }

    /// Writes a pointer-sized value.
    pub fn write_ptr(&mut self, addr: u64, value: u64) {
        if self.is_64 {
            self.write_u64(addr, value);
        } else {
            self.write_u32(addr, value as u32);
        }
    }

    /// Writes a relative offset from `addr` to `target`.
    pub fn write_rel32(&mut self, addr: u64, target: u64) {
        self.write_u32(addr, target.wrapping_sub(addr) as u32);
    }

    /// Appends pointer-sized words to a section.
    pub fn pointers(&mut self, segment: &str, section: &str, values: &[u64]) -> u64 {
        let size = values.len() * self.pointer_size() as usize;
        let addr = self.reserve(segment, section, size);
        for (i, &value) in values.iter().enumerate() {
            self.write_ptr(addr + i as u64 * self.pointer_size(), value);
        }
        addr
    }

    // =========================================================================
    // Link Edit
    // =========================================================================

    /// Adds an external defined symbol, returning its index.
    pub fn defined_symbol(&mut self, name: &str, value: u64, n_desc: u16) -> u32 {
        self.symbols
            .push((name.to_string(), N_SECT | N_EXT, n_desc, value));
        self.symbols.len() as u32 - 1
    }

    /// Adds an undefined symbol, returning its index.
    pub fn undefined_symbol(&mut self, name: &str) -> u32 {
        self.symbols.push((name.to_string(), N_UNDF | N_EXT, 0, 0));
        self.symbols.len() as u32 - 1
    }

    /// Adds a regular bind entry.
    pub fn bind(&mut self, addr: u64, ordinal: i64, name: &str, addend: i64) {
        self.binds.push((addr, ordinal, name.to_string(), addend));
    }

    /// Adds an export trie entry.
    pub fn export(&mut self, name: &str, addr: u64, flags: u64) {
        self.exports.push((name.to_string(), addr, flags));
    }

    /// Adds an extern relocation to the section containing `addr`.
    pub fn section_relocation(&mut self, addr: u64, symbol: u32, r_type: u8) {
        let (sect, _) = self.section_at(addr);
        sect.relocs.push((addr, symbol, r_type));
    }

    /// Adds an extern relocation to the dynamic symbol table.
    pub fn external_relocation(&mut self, addr: u64, symbol: u32, r_type: u8) {
        self.external_relocs.push((addr, symbol, r_type));
    }

    // =========================================================================
    // Build
    // =========================================================================

    fn ordinal_of(&self, addr: u64) -> Option<u8> {
        let mut ordinal = 0u8;
        for seg in &self.segments {
            for sect in &seg.sections {
                ordinal += 1;
                if addr >= sect.addr && addr < sect.addr + SLOT {
                    return Some(ordinal);
                }
            }
        }
        None
    }

    fn reloc_words(&self, r_address: u32, symbol: u32, r_type: u8) -> (u32, u32) {
        let length: u32 = if self.is_64 { 3 } else { 2 };
        let w1 = match self.endian {
            Endian::Little => symbol | (length << 25) | (1 << 27) | ((r_type as u32) << 28),
            Endian::Big => (symbol << 8) | (length << 5) | (1 << 4) | r_type as u32,
        };
        (r_address, w1)
    }

    fn export_trie(&self) -> Vec<u8> {
        if self.exports.is_empty() {
            return Vec::new();
        }

        let base = self.base();
        let nodes: Vec<Vec<u8>> = self
            .exports
            .iter()
            .map(|(_, addr, flags)| {
                let mut terminal = Vec::new();
                write_uleb128(*flags, &mut terminal);
                write_uleb128(addr - base, &mut terminal);
                let mut node = Vec::new();
                write_uleb128(terminal.len() as u64, &mut node);
                node.extend_from_slice(&terminal);
                node.push(0);
                node
            })
            .collect();

        let mut root_size = 0usize;
        loop {
            let mut root = vec![0u8, self.exports.len() as u8];
            let mut offset = root_size;
            for ((name, _, _), node) in self.exports.iter().zip(&nodes) {
                root.extend_from_slice(name.as_bytes());
                root.push(0);
                write_uleb128(offset as u64, &mut root);
                offset += node.len();
            }
            if root.len() == root_size {
                for node in &nodes {
                    root.extend_from_slice(node);
                }
                return root;
            }
            root_size = root.len();
        }
    }

    fn bind_opcodes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (addr, ordinal, name, addend) in &self.binds {
            let seg_index = ((addr - self.base()) / REGION) as u8;
            let seg_offset = (addr - self.base()) % REGION;
            if *ordinal <= 0 {
                out.push(BIND_OPCODE_SET_DYLIB_SPECIAL_IMM | (*ordinal as u8 & BIND_IMMEDIATE_MASK));
            } else if *ordinal < 16 {
                out.push(BIND_OPCODE_SET_DYLIB_ORDINAL_IMM | *ordinal as u8);
            } else {
                out.push(BIND_OPCODE_SET_DYLIB_ORDINAL_ULEB);
                write_uleb128(*ordinal as u64, &mut out);
            }
            out.push(BIND_OPCODE_SET_SYMBOL_TRAILING_FLAGS_IMM);
            out.extend_from_slice(name.as_bytes());
            out.push(0);
            out.push(BIND_OPCODE_SET_TYPE_IMM | 1);
            out.push(BIND_OPCODE_SET_ADDEND_SLEB);
            write_sleb128(*addend, &mut out);
            out.push(BIND_OPCODE_SET_SEGMENT_AND_OFFSET_ULEB | seg_index);
            write_uleb128(seg_offset, &mut out);
            out.push(BIND_OPCODE_DO_BIND);
        }
        out.push(BIND_OPCODE_DONE);
        out
    }

    /// Serializes the image.
    pub fn build(&self) -> Vec<u8> {
        let mut w = Out::new(self.endian);
        let base = self.base();
        let linkedit_off = self.segments.len() as u64 * REGION;

        // ---- link edit payloads ----
        let mut linkedit = Out::new(self.endian);
        let mut strtab = vec![0u8];
        let symoff = linkedit_off;
        for (name, n_type, n_desc, value) in &self.symbols {
            let strx = strtab.len() as u32;
            strtab.extend_from_slice(name.as_bytes());
            strtab.push(0);
            let n_sect = if *n_type & N_TYPE == N_SECT {
                self.ordinal_of(*value).unwrap_or(1)
            } else {
                0
            };
            linkedit.u32(strx);
            linkedit.bytes(&[*n_type, n_sect]);
            linkedit.u16(*n_desc);
            linkedit.ptr(self.is_64, *value);
        }
        let stroff = linkedit_off + linkedit.len() as u64;
        linkedit.bytes(&strtab);
        linkedit.align(8);

        let bind_off = linkedit_off + linkedit.len() as u64;
        let binds = if self.binds.is_empty() {
            Vec::new()
        } else {
            self.bind_opcodes()
        };
        linkedit.bytes(&binds);
        linkedit.align(8);

        let export_off = linkedit_off + linkedit.len() as u64;
        let trie = self.export_trie();
        linkedit.bytes(&trie);
        linkedit.align(8);

        let mut reloffs: BTreeMap<u64, u32> = BTreeMap::new();
        for seg in &self.segments {
            for sect in &seg.sections {
                if sect.relocs.is_empty() {
                    continue;
                }
                reloffs.insert(sect.addr, (linkedit_off + linkedit.len() as u64) as u32);
                for (addr, symbol, r_type) in &sect.relocs {
                    let (w0, w1) = self.reloc_words((addr - sect.addr) as u32, *symbol, *r_type);
                    linkedit.u32(w0);
                    linkedit.u32(w1);
                }
            }
        }

        let extreloff = linkedit_off + linkedit.len() as u64;
        for (addr, symbol, r_type) in &self.external_relocs {
            let (w0, w1) = self.reloc_words((addr - base) as u32, *symbol, *r_type);
            linkedit.u32(w0);
            linkedit.u32(w1);
        }
        let linkedit = linkedit.finish();

        // ---- load commands ----
        let mut cmds = Out::new(self.endian);
        let mut ncmds = 0u32;
        let (seg_cmd, seg_size, sect_size) = if self.is_64 {
            (LC_SEGMENT_64, 72u32, 80u32)
        } else {
            (LC_SEGMENT, 56u32, 68u32)
        };

        let mut all_segments: Vec<(&str, u64, u64, u64, &[SectionDraft])> = self
            .segments
            .iter()
            .enumerate()
            .map(|(i, seg)| {
                (
                    seg.name.as_str(),
                    base + i as u64 * REGION,
                    i as u64 * REGION,
                    REGION,
                    seg.sections.as_slice(),
                )
            })
            .collect();
        all_segments.push((
            "__LINKEDIT",
            base + linkedit_off,
            linkedit_off,
            linkedit.len() as u64,
            &[],
        ));

        for (name, vmaddr, fileoff, size, sections) in all_segments {
            ncmds += 1;
            let prot = if name == "__TEXT" { 5 } else { 3 };
            cmds.u32(seg_cmd);
            cmds.u32(seg_size + sect_size * sections.len() as u32);
            cmds.name16(name);
            cmds.ptr(self.is_64, vmaddr);
            cmds.ptr(self.is_64, size);
            cmds.ptr(self.is_64, fileoff);
            cmds.ptr(self.is_64, size);
            cmds.u32(7);
            cmds.u32(prot);
            cmds.u32(sections.len() as u32);
            cmds.u32(0);
            for sect in sections {
                let size = sect.zerofill_size.unwrap_or(sect.data.len() as u64);
                let offset = if sect.zerofill_size.is_some() {
                    0
                } else {
                    (sect.addr - base) as u32
                };
                cmds.name16(&sect.name);
                cmds.name16(name);
                cmds.ptr(self.is_64, sect.addr);
                cmds.ptr(self.is_64, size);
                cmds.u32(offset);
                cmds.u32(3);
                cmds.u32(reloffs.get(&sect.addr).copied().unwrap_or(0));
                cmds.u32(sect.relocs.len() as u32);
                cmds.u32(sect.flags);
                cmds.u32(0);
                cmds.u32(0);
                if self.is_64 {
                    cmds.u32(0);
                }
            }
        }

        if let Some((name, current, compat)) = &self.install_name {
            ncmds += 1;
            let size = (24 + name.len() + 1 + 7) & !7;
            cmds.u32(LC_ID_DYLIB);
            cmds.u32(size as u32);
            cmds.u32(24);
            cmds.u32(2);
            cmds.u32(*current);
            cmds.u32(*compat);
            cmds.padded_str(name, size - 24);
        }

        if let Some(umbrella) = &self.umbrella {
            ncmds += 1;
            let size = (12 + umbrella.len() + 1 + 7) & !7;
            cmds.u32(LC_SUB_FRAMEWORK);
            cmds.u32(size as u32);
            cmds.u32(12);
            cmds.padded_str(umbrella, size - 12);
        }

        if let Some((platform, minos)) = self.build_version {
            ncmds += 1;
            cmds.u32(LC_BUILD_VERSION);
            cmds.u32(24);
            cmds.u32(platform);
            cmds.u32(minos);
            cmds.u32(minos);
            cmds.u32(0);
        }

        if !self.symbols.is_empty() || !self.external_relocs.is_empty() {
            ncmds += 2;
            cmds.u32(LC_SYMTAB);
            cmds.u32(24);
            cmds.u32(symoff as u32);
            cmds.u32(self.symbols.len() as u32);
            cmds.u32(stroff as u32);
            cmds.u32(strtab.len() as u32);

            cmds.u32(LC_DYSYMTAB);
            cmds.u32(80);
            for _ in 0..14 {
                cmds.u32(0);
            }
            cmds.u32(extreloff as u32);
            cmds.u32(self.external_relocs.len() as u32);
            cmds.u32(0);
            cmds.u32(0);
        }

        if !binds.is_empty() || !trie.is_empty() {
            ncmds += 1;
            cmds.u32(LC_DYLD_INFO_ONLY);
            cmds.u32(48);
            for _ in 0..2 {
                cmds.u32(0);
            }
            cmds.u32(if binds.is_empty() { 0 } else { bind_off as u32 });
            cmds.u32(binds.len() as u32);
            for _ in 0..4 {
                cmds.u32(0);
            }
            cmds.u32(if trie.is_empty() { 0 } else { export_off as u32 });
            cmds.u32(trie.len() as u32);
        }

        if let Some((cryptoff, cryptsize)) = self.encryption {
            ncmds += 1;
            cmds.u32(if self.is_64 {
                LC_ENCRYPTION_INFO_64
            } else {
                LC_ENCRYPTION_INFO
            });
            cmds.u32(if self.is_64 { 24 } else { 20 });
            cmds.u32(cryptoff);
            cmds.u32(cryptsize);
            cmds.u32(1);
            if self.is_64 {
                cmds.u32(0);
            }
        }
        let cmds = cmds.finish();

        // ---- header ----
        w.u32(if self.is_64 { MH_MAGIC_64 } else { MH_MAGIC });
        w.u32(self.cputype);
        w.u32(self.cpusubtype);
        w.u32(self.filetype);
        w.u32(ncmds);
        w.u32(cmds.len() as u32);
        w.u32(self.flags);
        if self.is_64 {
            w.u32(0);
        }
        w.bytes(&cmds);
        assert!(w.len() as u64 <= SLOT, "load commands overflow the header slot");

        let mut image = w.finish();
        image.resize(linkedit_off as usize, 0);
        for seg in &self.segments {
            for sect in &seg.sections {
                if sect.zerofill_size.is_some() {
                    continue;
                }
                let offset = (sect.addr - base) as usize;
                image[offset..offset + sect.data.len()].copy_from_slice(&sect.data);
            }
        }
        image.extend_from_slice(&linkedit);
        image
    }
}

/// Byte-order aware output buffer.
struct Out {
    buf: Vec<u8>,
    endian: Endian,
}

impl Out {
    fn new(endian: Endian) -> Self {
        Self {
            buf: Vec::new(),
            endian,
        }
    }

    fn len(&self) -> usize {
        self.buf.len()
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }

    fn bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn align(&mut self, to: usize) {
        let aligned = (self.buf.len() + to - 1) & !(to - 1);
        self.buf.resize(aligned, 0);
    }

    fn u16(&mut self, value: u16) {
        match self.endian {
            Endian::Little => self.buf.extend_from_slice(&value.to_le_bytes()),
            Endian::Big => self.buf.extend_from_slice(&value.to_be_bytes()),
        }
    }

    fn u32(&mut self, value: u32) {
        match self.endian {
            Endian::Little => self.buf.extend_from_slice(&value.to_le_bytes()),
            Endian::Big => self.buf.extend_from_slice(&value.to_be_bytes()),
        }
    }

    fn ptr(&mut self, is_64: bool, value: u64) {
        if is_64 {
            match self.endian {
                Endian::Little => self.buf.extend_from_slice(&value.to_le_bytes()),
                Endian::Big => self.buf.extend_from_slice(&value.to_be_bytes()),
            }
        } else {
            self.u32(value as u32);
        }
    }

    fn name16(&mut self, name: &str) {
        let mut field = [0u8; 16];
        set_fixed_name(&mut field, name);
        self.buf.extend_from_slice(&field);
    }

    fn padded_str(&mut self, value: &str, size: usize) {
        let start = self.buf.len();
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.resize(start + size, 0);
    }
}

// =============================================================================
// Objective-C Metadata
// =============================================================================

/// Method name and type encoding pairs.
pub type Methods<'a> = &'a [(&'a str, &'a str)];

/// An ObjC2 class to emit.
#[derive(Default)]
pub struct ClassSpec<'a> {
    pub name: &'a str,
    /// External superclass, bound by symbol. Empty for a root class.
    pub superclass: &'a str,
    pub instance_methods: Methods<'a>,
    pub class_methods: Methods<'a>,
    pub properties: Methods<'a>,
    pub class_properties: Methods<'a>,
    pub ivars: &'a [(&'a str, &'a str, u32)],
    pub protocols: &'a [u64],
    pub relative: bool,
    pub swift: bool,
}

/// An ObjC2 category to emit.
#[derive(Default)]
pub struct CategorySpec<'a> {
    pub name: &'a str,
    /// External base class, bound by symbol.
    pub class_name: &'a str,
    /// Internal base class address, used instead of `class_name`.
    pub class_addr: Option<u64>,
    pub instance_methods: Methods<'a>,
    pub class_methods: Methods<'a>,
    pub properties: Methods<'a>,
    pub class_properties: Methods<'a>,
    pub protocols: &'a [u64],
}

/// An ObjC2 protocol to emit.
#[derive(Default)]
pub struct ProtocolSpec<'a> {
    pub name: &'a str,
    pub protocols: &'a [u64],
    pub instance_methods: Methods<'a>,
    pub class_methods: Methods<'a>,
    pub optional_instance_methods: Methods<'a>,
    pub optional_class_methods: Methods<'a>,
    pub properties: Methods<'a>,
}

impl ImageBuilder {
    /// Adds `__DATA,__objc_imageinfo`, marking the image as ObjC2.
    pub fn objc_image_info(&mut self, flags: u32) -> u64 {
        let addr = self.reserve("__DATA", "__objc_imageinfo", 8);
        self.write_u32(addr + 4, flags);
        addr
    }

    /// Adds a method name string and a selector reference to it.
    pub fn selref(&mut self, name: &str) -> u64 {
        let string = self.cstring("__TEXT", "__objc_methname", name);
        self.pointers("__DATA", "__objc_selrefs", &[string])
    }

    /// Adds an ObjC2 method list, returning 0 for an empty one.
    pub fn objc_method_list(&mut self, methods: Methods<'_>, relative: bool) -> u64 {
        if methods.is_empty() {
            return 0;
        }
        let ps = self.pointer_size();
        let count = methods.len() as u64;
        if relative {
            let list = self.reserve("__DATA", "__objc_const", (8 + 12 * count) as usize);
            self.write_u32(list, 12 | 0x8000_0000);
            self.write_u32(list + 4, count as u32);
            for (i, (name, types)) in methods.iter().enumerate() {
                let entry = list + 8 + 12 * i as u64;
                let selref = self.selref(name);
                let types = self.cstring("__TEXT", "__objc_methtype", types);
                self.write_rel32(entry, selref);
                self.write_rel32(entry + 4, types);
            }
            list
        } else {
            let list = self.reserve("__DATA", "__objc_const", (8 + 3 * ps * count) as usize);
            self.write_u32(list, (3 * ps) as u32);
            self.write_u32(list + 4, count as u32);
            for (i, (name, types)) in methods.iter().enumerate() {
                let entry = list + 8 + 3 * ps * i as u64;
                let name = self.cstring("__TEXT", "__objc_methname", name);
                let types = self.cstring("__TEXT", "__objc_methtype", types);
                self.write_ptr(entry, name);
                self.write_ptr(entry + ps, types);
            }
            list
        }
    }

    /// Adds an ObjC2 property list, returning 0 for an empty one.
    pub fn objc_property_list(&mut self, properties: Methods<'_>) -> u64 {
        if properties.is_empty() {
            return 0;
        }
        let ps = self.pointer_size();
        let count = properties.len() as u64;
        let list = self.reserve("__DATA", "__objc_const", (8 + 2 * ps * count) as usize);
        self.write_u32(list, (2 * ps) as u32);
        self.write_u32(list + 4, count as u32);
        for (i, (name, attributes)) in properties.iter().enumerate() {
            let entry = list + 8 + 2 * ps * i as u64;
            let name = self.cstring("__TEXT", "__cstring", name);
            let attributes = self.cstring("__TEXT", "__cstring", attributes);
            self.write_ptr(entry, name);
            self.write_ptr(entry + ps, attributes);
        }
        list
    }

    /// Adds an ObjC2 ivar list, returning 0 for an empty one.
    pub fn objc_ivar_list(&mut self, ivars: &[(&str, &str, u32)]) -> u64 {
        if ivars.is_empty() {
            return 0;
        }
        let ps = self.pointer_size();
        let entsize = 3 * ps + 8;
        let count = ivars.len() as u64;
        let list = self.reserve("__DATA", "__objc_const", (8 + entsize * count) as usize);
        self.write_u32(list, entsize as u32);
        self.write_u32(list + 4, count as u32);
        for (i, (name, types, offset)) in ivars.iter().enumerate() {
            let entry = list + 8 + entsize * i as u64;
            let offset_var = self.reserve("__DATA", "__objc_ivar", 4);
            self.write_u32(offset_var, *offset);
            let name = self.cstring("__TEXT", "__objc_methname", name);
            let types = self.cstring("__TEXT", "__objc_methtype", types);
            self.write_ptr(entry, offset_var);
            self.write_ptr(entry + ps, name);
            self.write_ptr(entry + 2 * ps, types);
            self.write_u32(entry + 3 * ps, ps.trailing_zeros());
            self.write_u32(entry + 3 * ps + 4, ps as u32);
        }
        list
    }

    /// Adds an ObjC2 protocol list, returning 0 for an empty one.
    pub fn objc_protocol_list(&mut self, protocols: &[u64]) -> u64 {
        if protocols.is_empty() {
            return 0;
        }
        let mut words = vec![protocols.len() as u64];
        words.extend_from_slice(protocols);
        self.pointers("__DATA", "__objc_const", &words)
    }

    fn objc_class_ro(
        &mut self,
        flags: u32,
        name: u64,
        methods: u64,
        protocols: u64,
        ivars: u64,
        properties: u64,
    ) -> u64 {
        let ps = self.pointer_size();
        let header = if self.is_64 { 24 } else { 16 };
        let ro = self.reserve("__DATA", "__objc_const", (header + 6 * ps) as usize);
        self.write_u32(ro, flags);
        self.write_ptr(ro + header, name);
        self.write_ptr(ro + header + ps, methods);
        self.write_ptr(ro + header + 2 * ps, protocols);
        self.write_ptr(ro + header + 3 * ps, ivars);
        self.write_ptr(ro + header + 5 * ps, properties);
        ro
    }

    /// Adds a class and its metaclass and lists the class in
    /// `__objc_classlist`. Returns the class address.
    pub fn objc_class(&mut self, spec: &ClassSpec<'_>) -> u64 {
        let ps = self.pointer_size();
        let name = self.cstring("__TEXT", "__objc_classname", spec.name);
        let is_root = spec.superclass.is_empty();

        let methods = self.objc_method_list(spec.instance_methods, spec.relative);
        let class_methods = self.objc_method_list(spec.class_methods, spec.relative);
        let properties = self.objc_property_list(spec.properties);
        let class_properties = self.objc_property_list(spec.class_properties);
        let ivars = self.objc_ivar_list(spec.ivars);
        let protocols = self.objc_protocol_list(spec.protocols);

        let root_flag = if is_root { 2 } else { 0 };
        let meta_ro = self.objc_class_ro(1 | root_flag, name, class_methods, 0, 0, class_properties);
        let ro = self.objc_class_ro(root_flag, name, methods, protocols, ivars, properties);

        let meta = self.reserve("__DATA", "__objc_data", (5 * ps) as usize);
        let class = self.reserve("__DATA", "__objc_data", (5 * ps) as usize);
        let tag = if spec.swift { 2 } else { 0 };

        self.write_ptr(class, meta);
        self.write_ptr(class + 4 * ps, ro | tag);
        self.write_ptr(meta + 4 * ps, meta_ro);
        if is_root {
            self.write_ptr(meta, meta);
            self.write_ptr(meta + ps, class);
        } else {
            self.bind(class + ps, 1, &format!("_OBJC_CLASS_$_{}", spec.superclass), 0);
            self.bind(meta, 1, "_OBJC_METACLASS_$_NSObject", 0);
            self.bind(meta + ps, 1, &format!("_OBJC_METACLASS_$_{}", spec.superclass), 0);
        }

        self.export(&format!("_OBJC_CLASS_$_{}", spec.name), class, 0);
        self.export(&format!("_OBJC_METACLASS_$_{}", spec.name), meta, 0);
        self.pointers("__DATA", "__objc_classlist", &[class]);
        class
    }

    /// Adds a category and lists it in `__objc_catlist`.
    pub fn objc_category(&mut self, spec: &CategorySpec<'_>) -> u64 {
        let ps = self.pointer_size();
        let name = self.cstring("__TEXT", "__objc_classname", spec.name);
        let methods = self.objc_method_list(spec.instance_methods, false);
        let class_methods = self.objc_method_list(spec.class_methods, false);
        let properties = self.objc_property_list(spec.properties);
        let class_properties = self.objc_property_list(spec.class_properties);
        let protocols = self.objc_protocol_list(spec.protocols);

        let category = self.reserve("__DATA", "__objc_const", (7 * ps) as usize);
        self.write_ptr(category, name);
        match spec.class_addr {
            Some(addr) => self.write_ptr(category + ps, addr),
            None => self.bind(category + ps, 1, &format!("_OBJC_CLASS_$_{}", spec.class_name), 0),
        }
        self.write_ptr(category + 2 * ps, methods);
        self.write_ptr(category + 3 * ps, class_methods);
        self.write_ptr(category + 4 * ps, protocols);
        self.write_ptr(category + 5 * ps, properties);
        self.write_ptr(category + 6 * ps, class_properties);
        self.pointers("__DATA", "__objc_catlist", &[category]);
        category
    }

    /// Adds a protocol and lists it in `__objc_protolist`.
    pub fn objc_protocol(&mut self, spec: &ProtocolSpec<'_>) -> u64 {
        let ps = self.pointer_size();
        let name = self.cstring("__TEXT", "__objc_classname", spec.name);
        let protocols = self.objc_protocol_list(spec.protocols);
        let methods = self.objc_method_list(spec.instance_methods, false);
        let class_methods = self.objc_method_list(spec.class_methods, false);
        let optional = self.objc_method_list(spec.optional_instance_methods, false);
        let optional_class = self.objc_method_list(spec.optional_class_methods, false);
        let properties = self.objc_property_list(spec.properties);

        let size = 8 * ps + 8;
        let protocol = self.reserve("__DATA", "__data", size as usize);
        self.write_ptr(protocol + ps, name);
        self.write_ptr(protocol + 2 * ps, protocols);
        self.write_ptr(protocol + 3 * ps, methods);
        self.write_ptr(protocol + 4 * ps, class_methods);
        self.write_ptr(protocol + 5 * ps, optional);
        self.write_ptr(protocol + 6 * ps, optional_class);
        self.write_ptr(protocol + 7 * ps, properties);
        self.write_u32(protocol + 8 * ps, size as u32);
        self.pointers("__DATA", "__objc_protolist", &[protocol]);
        protocol
    }

    // =========================================================================
    // ObjC1
    // =========================================================================

    fn objc1_method_list(&mut self, section: &str, methods: Methods<'_>) -> u64 {
        if methods.is_empty() {
            return 0;
        }
        let list = self.reserve("__OBJC", section, 8 + 12 * methods.len());
        self.write_u32(list + 4, methods.len() as u32);
        for (i, (name, types)) in methods.iter().enumerate() {
            let entry = list + 8 + 12 * i as u64;
            let name = self.cstring("__TEXT", "__cstring", name);
            let types = self.cstring("__TEXT", "__cstring", types);
            self.write_u32(entry, name as u32);
            self.write_u32(entry + 4, types as u32);
        }
        list
    }

    /// Adds an ObjC1 class and metaclass. Returns the class address.
    pub fn objc1_class(
        &mut self,
        name: &str,
        superclass: &str,
        instance_methods: Methods<'_>,
        class_methods: Methods<'_>,
    ) -> u64 {
        const CLS_CLASS: u32 = 0x1;
        const CLS_META: u32 = 0x2;
        const CLS_NO_METHOD_ARRAY: u32 = 0x4000;

        let name_str = self.cstring("__TEXT", "__cstring", name) as u32;
        let super_str = if superclass.is_empty() {
            0
        } else {
            self.cstring("__TEXT", "__cstring", superclass) as u32
        };
        let methods = self.objc1_method_list("__inst_meth", instance_methods) as u32;
        let class_methods = self.objc1_method_list("__cls_meth", class_methods) as u32;

        let meta = self.reserve("__OBJC", "__meta_class", 40);
        self.write_u32(meta, super_str);
        self.write_u32(meta + 4, super_str);
        self.write_u32(meta + 8, name_str);
        self.write_u32(meta + 16, CLS_META | CLS_NO_METHOD_ARRAY);
        self.write_u32(meta + 28, class_methods);

        let class = self.reserve("__OBJC", "__class", 40);
        self.write_u32(class, meta as u32);
        self.write_u32(class + 4, super_str);
        self.write_u32(class + 8, name_str);
        self.write_u32(class + 16, CLS_CLASS | CLS_NO_METHOD_ARRAY);
        self.write_u32(class + 28, methods);
        class
    }

    /// Adds an ObjC1 category.
    pub fn objc1_category(&mut self, name: &str, class_name: &str, methods: Methods<'_>) -> u64 {
        let name = self.cstring("__TEXT", "__cstring", name) as u32;
        let class_name = self.cstring("__TEXT", "__cstring", class_name) as u32;
        let methods = self.objc1_method_list("__cat_inst_meth", methods) as u32;

        let category = self.reserve("__OBJC", "__category", 20);
        self.write_u32(category, name);
        self.write_u32(category + 4, class_name);
        self.write_u32(category + 8, methods);
        category
    }

    /// Adds packed ObjC1 protocols to `__OBJC,__protocol`.
    pub fn objc1_protocols(&mut self, protocols: &[(&str, Methods<'_>)]) -> u64 {
        let base = self.reserve("__OBJC", "__protocol", 20 * protocols.len());
        for (i, (name, methods)) in protocols.iter().enumerate() {
            let protocol = base + 20 * i as u64;
            let name = self.cstring("__TEXT", "__cstring", name) as u32;
            self.write_u32(protocol + 4, name);
            if !methods.is_empty() {
                let list = self.reserve("__OBJC", "__protocol_ext", 4 + 8 * methods.len());
                self.write_u32(list, methods.len() as u32);
                for (j, (sel, types)) in methods.iter().enumerate() {
                    let sel = self.cstring("__TEXT", "__cstring", sel) as u32;
                    let types = self.cstring("__TEXT", "__cstring", types) as u32;
                    self.write_u32(list + 4 + 8 * j as u64, sel);
                    self.write_u32(list + 8 + 8 * j as u64, types);
                }
                self.write_u32(protocol + 12, list as u32);
            }
        }
        base
    }

    /// Adds an ObjC1 module whose symtab lists the classes and categories.
    /// Returns the symtab address.
    pub fn objc1_module(&mut self, classes: &[u64], categories: &[u64]) -> u64 {
        let count = classes.len() + categories.len();
        let symtab = self.reserve("__OBJC", "__symbols", 12 + 4 * count);
        self.write_u16(symtab + 8, classes.len() as u16);
        self.write_u16(symtab + 10, categories.len() as u16);
        for (i, addr) in classes.iter().chain(categories).enumerate() {
            self.write_u32(symtab + 12 + 4 * i as u64, *addr as u32);
        }

        let name = self.cstring("__TEXT", "__cstring", "") as u32;
        let module = self.reserve("__OBJC", "__module_info", 16);
        self.write_u32(module, 7);
        self.write_u32(module + 4, 16);
        self.write_u32(module + 8, name);
        self.write_u32(module + 12, symtab as u32);
        symtab
    }
}
