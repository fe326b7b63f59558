//! Mach-O image parsing.

use std::collections::HashMap;
use std::mem::size_of;

use tracing::debug;
use zerocopy::FromBytes;

use super::constants::*;
use super::structs::*;
use crate::error::{Error, Result};
use crate::util::{fixed_name, read_cstr, Endian};

// =============================================================================
// Segment Info
// =============================================================================

/// Parsed segment information, widened to 64 bits.
#[derive(Debug, Clone)]
pub struct SegmentInfo {
    /// Segment name
    pub name: String,
    /// Index of the segment in load command order
    pub index: usize,
    /// Virtual memory address
    pub vmaddr: u64,
    /// Virtual memory size
    pub vmsize: u64,
    /// File offset
    pub fileoff: u64,
    /// Amount of file mapped
    pub filesize: u64,
    /// Initial VM protection
    pub initprot: u32,
    /// Sections in this segment
    pub sections: Vec<SectionInfo>,
}

impl SegmentInfo {
    /// Returns a section by name.
    pub fn section(&self, name: &str) -> Option<&SectionInfo> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Returns true if the virtual address falls inside this segment.
    #[inline]
    pub fn contains_addr(&self, addr: u64) -> bool {
        addr >= self.vmaddr && addr - self.vmaddr < self.vmsize
    }

    /// Returns true if this segment is mapped writable.
    #[inline]
    pub fn is_writable(&self) -> bool {
        self.initprot & VM_PROT_WRITE != 0
    }
}

/// Parsed section information, widened to 64 bits.
#[derive(Debug, Clone)]
pub struct SectionInfo {
    /// Section name
    pub name: String,
    /// Owning segment name
    pub segment_name: String,
    /// One-based section ordinal (matches `n_sect`)
    pub ordinal: u8,
    /// Virtual memory address
    pub addr: u64,
    /// Size in bytes
    pub size: u64,
    /// File offset
    pub offset: u32,
    /// File offset of relocation entries
    pub reloff: u32,
    /// Number of relocation entries
    pub nreloc: u32,
    /// Flags
    pub flags: u32,
}

impl SectionInfo {
    /// Returns the full name (segment,section).
    pub fn full_name(&self) -> String {
        format!("{},{}", self.segment_name, self.name)
    }

    /// Returns true if the section has no file contents.
    #[inline]
    pub fn is_zerofill(&self) -> bool {
        matches!(
            self.flags & SECTION_TYPE,
            S_ZEROFILL | S_GB_ZEROFILL | S_THREAD_LOCAL_ZEROFILL
        )
    }

    /// Returns true if the section holds code.
    #[inline]
    pub fn is_text(&self) -> bool {
        self.flags & (S_ATTR_PURE_INSTRUCTIONS | S_ATTR_SOME_INSTRUCTIONS) != 0
    }

    /// Returns true if the virtual address falls inside this section.
    #[inline]
    pub fn contains_addr(&self, addr: u64) -> bool {
        addr >= self.addr && addr - self.addr < self.size
    }
}

// =============================================================================
// Load Command Info
// =============================================================================

/// Parsed load command information.
///
/// Only the commands the reader and the API builder consume are decoded;
/// everything else is kept as `Unknown`.
#[derive(Debug, Clone)]
#[allow(missing_docs)]
pub enum LoadCommandInfo {
    Segment(usize),
    Symtab(SymtabCommand),
    Dysymtab(DysymtabCommand),
    DyldInfo(DyldInfoCommand),
    LinkeditData(LinkeditDataCommand),
    Dylib { command: DylibCommand, name: String },
    SubFramework { umbrella: String },
    Uuid([u8; 16]),
    BuildVersion(BuildVersionCommand),
    VersionMin(VersionMinCommand),
    Encryption { cryptoff: u32, cryptsize: u32, cryptid: u32 },
    Unknown { cmd: u32, cmdsize: u32 },
}

/// An encrypted file range with a nonzero crypt id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptedRange {
    /// File offset of the encrypted range
    pub offset: u64,
    /// Size of the encrypted range
    pub size: u64,
}

impl EncryptedRange {
    /// Returns true if the file offset lies in this range.
    #[inline]
    pub fn contains(&self, offset: u64) -> bool {
        offset >= self.offset && offset - self.offset < self.size
    }
}

// =============================================================================
// Mach-O File
// =============================================================================

/// A parsed, read-only Mach-O image.
///
/// The image borrows its bytes; a memory map or an owned buffer must outlive
/// it. All file offsets are relative to the start of `data`, which is the
/// start of the slice for universal binaries.
#[derive(Debug)]
pub struct MachOFile<'data> {
    data: &'data [u8],
    header: MachHeader,
    is_64: bool,
    endian: Endian,
    load_commands: Vec<LoadCommandInfo>,
    segments: Vec<SegmentInfo>,
    segment_indices: HashMap<String, usize>,
}

impl<'data> MachOFile<'data> {
    /// Parses a Mach-O image.
    pub fn parse(data: &'data [u8]) -> Result<Self> {
        if data.len() < MachHeader32::SIZE {
            return Err(Error::buffer_too_small(MachHeader32::SIZE, data.len()));
        }

        let magic = u32::from_ne_bytes([data[0], data[1], data[2], data[3]]);
        let swapped = match Endian::native() {
            Endian::Little => Endian::Big,
            Endian::Big => Endian::Little,
        };
        let (is_64, endian) = match magic {
            MH_MAGIC_64 => (true, Endian::native()),
            MH_CIGAM_64 => (true, swapped),
            MH_MAGIC => (false, Endian::native()),
            MH_CIGAM => (false, swapped),
            other => return Err(Error::InvalidMachoMagic(other)),
        };

        let mut file = Self {
            data,
            header: MachHeader {
                cputype: 0,
                cpusubtype: 0,
                filetype: 0,
                ncmds: 0,
                sizeofcmds: 0,
                flags: 0,
            },
            is_64,
            endian,
            load_commands: Vec::new(),
            segments: Vec::new(),
            segment_indices: HashMap::new(),
        };

        file.header = if is_64 {
            let h: MachHeader64 = file.read_struct(0)?;
            MachHeader {
                cputype: h.cputype,
                cpusubtype: h.cpusubtype,
                filetype: h.filetype,
                ncmds: h.ncmds,
                sizeofcmds: h.sizeofcmds,
                flags: h.flags,
            }
        } else {
            let h: MachHeader32 = file.read_struct(0)?;
            MachHeader {
                cputype: h.cputype,
                cpusubtype: h.cpusubtype,
                filetype: h.filetype,
                ncmds: h.ncmds,
                sizeofcmds: h.sizeofcmds,
                flags: h.flags,
            }
        };

        file.parse_load_commands()?;

        debug!(
            "parsed {} with {} segments",
            file.header,
            file.segments.len()
        );

        Ok(file)
    }

    /// Reads a structure at a file offset, correcting byte order.
    pub fn read_struct<T: FromBytes + Swap>(&self, offset: usize) -> Result<T> {
        let bytes = self
            .data
            .get(offset..)
            .ok_or_else(|| Error::buffer_too_small(offset, self.data.len()))?;
        let value = T::read_from_prefix(bytes)
            .map_err(|_| Error::buffer_too_small(offset + size_of::<T>(), self.data.len()))?
            .0;
        Ok(if self.endian.needs_swap() {
            value.swap()
        } else {
            value
        })
    }

    /// Parses all load commands.
    fn parse_load_commands(&mut self) -> Result<()> {
        let header_size = self.header_size();
        let mut offset = header_size;
        let end_offset = header_size + self.header.sizeofcmds as usize;
        let mut ordinal: u8 = 0;

        for _ in 0..self.header.ncmds {
            if offset + LoadCommand::SIZE > end_offset || offset + LoadCommand::SIZE > self.data.len()
            {
                return Err(Error::LoadCommandOverflow { offset });
            }

            let lc: LoadCommand = self.read_struct(offset)?;
            let cmdsize = lc.cmdsize as usize;

            if cmdsize < LoadCommand::SIZE || offset + cmdsize > self.data.len() {
                return Err(Error::LoadCommandOverflow { offset });
            }

            let info = self.parse_load_command(lc, offset, &mut ordinal)?;
            self.load_commands.push(info);
            offset += cmdsize;
        }

        Ok(())
    }

    /// Parses a single load command.
    fn parse_load_command(
        &mut self,
        lc: LoadCommand,
        offset: usize,
        ordinal: &mut u8,
    ) -> Result<LoadCommandInfo> {
        let data = self.data;
        let cmd_data = &data[offset..offset + lc.cmdsize as usize];

        let info = match lc.cmd {
            LC_SEGMENT_64 => {
                let seg: SegmentCommand64 = self.read_struct(offset)?;
                let mut sections = Vec::with_capacity(seg.nsects as usize);
                let mut sect_offset = offset + SegmentCommand64::SIZE;
                for _ in 0..seg.nsects {
                    let sect: Section64 = self.read_struct(sect_offset)?;
                    *ordinal = ordinal.wrapping_add(1);
                    sections.push(SectionInfo {
                        name: fixed_name(&sect.sectname).to_string(),
                        segment_name: fixed_name(&sect.segname).to_string(),
                        ordinal: *ordinal,
                        addr: sect.addr,
                        size: sect.size,
                        offset: sect.offset,
                        reloff: sect.reloff,
                        nreloc: sect.nreloc,
                        flags: sect.flags,
                    });
                    sect_offset += Section64::SIZE;
                }
                self.push_segment(SegmentInfo {
                    name: fixed_name(&seg.segname).to_string(),
                    index: self.segments.len(),
                    vmaddr: seg.vmaddr,
                    vmsize: seg.vmsize,
                    fileoff: seg.fileoff,
                    filesize: seg.filesize,
                    initprot: seg.initprot,
                    sections,
                })
            }

            LC_SEGMENT => {
                let seg: SegmentCommand32 = self.read_struct(offset)?;
                let mut sections = Vec::with_capacity(seg.nsects as usize);
                let mut sect_offset = offset + SegmentCommand32::SIZE;
                for _ in 0..seg.nsects {
                    let sect: Section32 = self.read_struct(sect_offset)?;
                    *ordinal = ordinal.wrapping_add(1);
                    sections.push(SectionInfo {
                        name: fixed_name(&sect.sectname).to_string(),
                        segment_name: fixed_name(&sect.segname).to_string(),
                        ordinal: *ordinal,
                        addr: sect.addr as u64,
                        size: sect.size as u64,
                        offset: sect.offset,
                        reloff: sect.reloff,
                        nreloc: sect.nreloc,
                        flags: sect.flags,
                    });
                    sect_offset += Section32::SIZE;
                }
                self.push_segment(SegmentInfo {
                    name: fixed_name(&seg.segname).to_string(),
                    index: self.segments.len(),
                    vmaddr: seg.vmaddr as u64,
                    vmsize: seg.vmsize as u64,
                    fileoff: seg.fileoff as u64,
                    filesize: seg.filesize as u64,
                    initprot: seg.initprot,
                    sections,
                })
            }

            LC_SYMTAB => LoadCommandInfo::Symtab(self.read_struct(offset)?),

            LC_DYSYMTAB => LoadCommandInfo::Dysymtab(self.read_struct(offset)?),

            LC_DYLD_INFO | LC_DYLD_INFO_ONLY => LoadCommandInfo::DyldInfo(self.read_struct(offset)?),

            LC_DYLD_EXPORTS_TRIE | LC_DYLD_CHAINED_FIXUPS => {
                LoadCommandInfo::LinkeditData(self.read_struct(offset)?)
            }

            LC_LOAD_DYLIB | LC_LOAD_WEAK_DYLIB | LC_REEXPORT_DYLIB | LC_LOAD_UPWARD_DYLIB
            | LC_ID_DYLIB => {
                let command: DylibCommand = self.read_struct(offset)?;
                let name = read_cstr(cmd_data, command.dylib.name_offset as usize)
                    .unwrap_or_default()
                    .to_string();
                LoadCommandInfo::Dylib { command, name }
            }

            LC_SUB_FRAMEWORK => {
                let command: StringCommand = self.read_struct(offset)?;
                let umbrella = read_cstr(cmd_data, command.str_offset as usize)
                    .unwrap_or_default()
                    .to_string();
                LoadCommandInfo::SubFramework { umbrella }
            }

            LC_UUID => {
                let command: UuidCommand = self.read_struct(offset)?;
                LoadCommandInfo::Uuid(command.uuid)
            }

            LC_BUILD_VERSION => LoadCommandInfo::BuildVersion(self.read_struct(offset)?),

            LC_VERSION_MIN_MACOSX | LC_VERSION_MIN_IPHONEOS | LC_VERSION_MIN_TVOS
            | LC_VERSION_MIN_WATCHOS => LoadCommandInfo::VersionMin(self.read_struct(offset)?),

            LC_ENCRYPTION_INFO => {
                let command: EncryptionInfoCommand = self.read_struct(offset)?;
                LoadCommandInfo::Encryption {
                    cryptoff: command.cryptoff,
                    cryptsize: command.cryptsize,
                    cryptid: command.cryptid,
                }
            }

            LC_ENCRYPTION_INFO_64 => {
                let command: EncryptionInfoCommand64 = self.read_struct(offset)?;
                LoadCommandInfo::Encryption {
                    cryptoff: command.cryptoff,
                    cryptsize: command.cryptsize,
                    cryptid: command.cryptid,
                }
            }

            cmd => LoadCommandInfo::Unknown {
                cmd,
                cmdsize: lc.cmdsize,
            },
        };

        Ok(info)
    }

    fn push_segment(&mut self, segment: SegmentInfo) -> LoadCommandInfo {
        let index = self.segments.len();
        self.segment_indices.insert(segment.name.clone(), index);
        self.segments.push(segment);
        LoadCommandInfo::Segment(index)
    }

    // =========================================================================
    // Header Queries
    // =========================================================================

    /// Returns the raw image bytes.
    #[inline]
    pub fn data(&self) -> &'data [u8] {
        self.data
    }

    /// Returns the header.
    #[inline]
    pub fn header(&self) -> &MachHeader {
        &self.header
    }

    /// Returns true for 64-bit images.
    #[inline]
    pub fn is_64(&self) -> bool {
        self.is_64
    }

    /// Returns the byte order of the image.
    #[inline]
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Returns the pointer width in bytes.
    #[inline]
    pub fn pointer_size(&self) -> u64 {
        if self.is_64 {
            8
        } else {
            4
        }
    }

    /// Returns the size of the mach header.
    #[inline]
    pub fn header_size(&self) -> usize {
        if self.is_64 {
            MachHeader64::SIZE
        } else {
            MachHeader32::SIZE
        }
    }

    /// Returns the architecture name.
    pub fn arch_name(&self) -> &'static str {
        self.header.arch_name()
    }

    /// Returns the parsed load commands.
    pub fn load_commands(&self) -> &[LoadCommandInfo] {
        &self.load_commands
    }

    // =========================================================================
    // Segments and Sections
    // =========================================================================

    /// Returns all segments in load command order.
    pub fn segments(&self) -> &[SegmentInfo] {
        &self.segments
    }

    /// Returns a segment by name.
    pub fn segment(&self, name: &str) -> Option<&SegmentInfo> {
        self.segment_indices.get(name).map(|&i| &self.segments[i])
    }

    /// Returns the segment containing a virtual address.
    pub fn segment_containing(&self, addr: u64) -> Option<&SegmentInfo> {
        self.segments.iter().find(|s| s.contains_addr(addr))
    }

    /// Returns an iterator over all sections in ordinal order.
    pub fn sections(&self) -> impl Iterator<Item = &SectionInfo> {
        self.segments.iter().flat_map(|s| s.sections.iter())
    }

    /// Returns a section by segment and section name.
    pub fn section(&self, segment: &str, section: &str) -> Option<&SectionInfo> {
        self.segment(segment)?.section(section)
    }

    /// Returns the first section with the given name in any segment.
    pub fn find_section(&self, section: &str) -> Option<&SectionInfo> {
        self.sections().find(|s| s.name == section)
    }

    /// Returns the section with a one-based ordinal.
    pub fn section_by_ordinal(&self, ordinal: u8) -> Option<&SectionInfo> {
        self.sections().find(|s| s.ordinal == ordinal)
    }

    /// Returns the section containing a virtual address.
    ///
    /// Zero-fill sections are skipped because they have no file contents.
    pub fn section_containing(&self, addr: u64) -> Option<&SectionInfo> {
        self.sections()
            .find(|s| !s.is_zerofill() && s.contains_addr(addr))
    }

    /// Returns the contents of a section.
    pub fn section_data(&self, section: &SectionInfo) -> Result<&'data [u8]> {
        if section.is_zerofill() {
            return Ok(&[]);
        }
        self.read_at(section.offset as usize, section.size as usize)
    }

    /// Returns the load address of the mach header.
    ///
    /// This is the first segment that maps file offset zero, which is
    /// `__TEXT` for linked images.
    pub fn base_address(&self) -> u64 {
        self.segments
            .iter()
            .find(|s| s.fileoff == 0 && s.filesize != 0)
            .map(|s| s.vmaddr)
            .unwrap_or(0)
    }

    /// Reads bytes at a file offset.
    pub fn read_at(&self, offset: usize, len: usize) -> Result<&'data [u8]> {
        let end = offset
            .checked_add(len)
            .ok_or_else(|| Error::buffer_too_small(usize::MAX, self.data.len()))?;
        self.data
            .get(offset..end)
            .ok_or_else(|| Error::buffer_too_small(end, self.data.len()))
    }

    // =========================================================================
    // Load Command Queries
    // =========================================================================

    /// Returns the symbol table command.
    pub fn symtab(&self) -> Option<&SymtabCommand> {
        self.load_commands.iter().find_map(|lc| match lc {
            LoadCommandInfo::Symtab(command) => Some(command),
            _ => None,
        })
    }

    /// Returns the dynamic symbol table command.
    pub fn dysymtab(&self) -> Option<&DysymtabCommand> {
        self.load_commands.iter().find_map(|lc| match lc {
            LoadCommandInfo::Dysymtab(command) => Some(command),
            _ => None,
        })
    }

    /// Returns the dyld info command.
    pub fn dyld_info(&self) -> Option<&DyldInfoCommand> {
        self.load_commands.iter().find_map(|lc| match lc {
            LoadCommandInfo::DyldInfo(command) => Some(command),
            _ => None,
        })
    }

    /// Returns a linkedit data command by type.
    pub fn linkedit_data(&self, cmd: u32) -> Option<&LinkeditDataCommand> {
        self.load_commands.iter().find_map(|lc| match lc {
            LoadCommandInfo::LinkeditData(command) if command.cmd == cmd => Some(command),
            _ => None,
        })
    }

    /// Returns the `LC_ID_DYLIB` command and install name.
    pub fn id_dylib(&self) -> Option<(&DylibCommand, &str)> {
        self.load_commands.iter().find_map(|lc| match lc {
            LoadCommandInfo::Dylib { command, name } if command.cmd == LC_ID_DYLIB => {
                Some((command, name.as_str()))
            }
            _ => None,
        })
    }

    /// Returns the install name of a dylib.
    pub fn install_name(&self) -> Option<&str> {
        self.id_dylib().map(|(_, name)| name)
    }

    /// Returns an iterator over dependent dylibs as `(name, cmd)`.
    pub fn dylibs(&self) -> impl Iterator<Item = (&str, u32)> {
        self.load_commands.iter().filter_map(|lc| match lc {
            LoadCommandInfo::Dylib { command, name } if command.cmd != LC_ID_DYLIB => {
                Some((name.as_str(), command.cmd))
            }
            _ => None,
        })
    }

    /// Returns the umbrella framework named by `LC_SUB_FRAMEWORK`.
    pub fn parent_umbrella(&self) -> Option<&str> {
        self.load_commands.iter().find_map(|lc| match lc {
            LoadCommandInfo::SubFramework { umbrella } => Some(umbrella.as_str()),
            _ => None,
        })
    }

    /// Returns the image UUID.
    pub fn uuid(&self) -> Option<[u8; 16]> {
        self.load_commands.iter().find_map(|lc| match lc {
            LoadCommandInfo::Uuid(uuid) => Some(*uuid),
            _ => None,
        })
    }

    /// Returns `(platform, minos)` from `LC_BUILD_VERSION` or the legacy
    /// `LC_VERSION_MIN_*` commands.
    pub fn platform_version(&self) -> Option<(u32, u32)> {
        self.load_commands.iter().find_map(|lc| match lc {
            LoadCommandInfo::BuildVersion(command) => Some((command.platform, command.minos)),
            LoadCommandInfo::VersionMin(command) => {
                let platform = match command.cmd {
                    LC_VERSION_MIN_MACOSX => PLATFORM_MACOS,
                    LC_VERSION_MIN_IPHONEOS => PLATFORM_IOS,
                    LC_VERSION_MIN_TVOS => PLATFORM_TVOS,
                    _ => PLATFORM_WATCHOS,
                };
                Some((platform, command.version))
            }
            _ => None,
        })
    }

    /// Returns the encrypted file ranges with a nonzero crypt id.
    pub fn encrypted_ranges(&self) -> Vec<EncryptedRange> {
        self.load_commands
            .iter()
            .filter_map(|lc| match lc {
                LoadCommandInfo::Encryption {
                    cryptoff,
                    cryptsize,
                    cryptid,
                } if *cryptid != 0 => Some(EncryptedRange {
                    offset: *cryptoff as u64,
                    size: *cryptsize as u64,
                }),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ImageBuilder;

    #[test]
    fn test_parse_minimal_macho() {
        let data = ImageBuilder::new_64().text_segment().build();
        let file = MachOFile::parse(&data).unwrap();

        assert!(file.is_64());
        assert!(file.header().is_arm64());
        assert_eq!(file.endian(), Endian::Little);
        assert!(file.segment("__TEXT").is_some());
        assert_eq!(file.base_address(), ImageBuilder::BASE);
    }

    #[test]
    fn test_parse_big_endian_32() {
        let data = ImageBuilder::new_ppc().text_segment().build();
        let file = MachOFile::parse(&data).unwrap();

        assert!(!file.is_64());
        assert_eq!(file.endian(), Endian::Big);
        assert_eq!(file.arch_name(), "ppc");
        let text = file.segment("__TEXT").unwrap();
        assert_eq!(text.vmaddr, ImageBuilder::BASE_32);
    }

    #[test]
    fn test_section_lookup() {
        let mut builder = ImageBuilder::new_64();
        builder.text_segment();
        builder.append("__DATA", "__objc_classlist", &[0u8; 16]);
        let data = builder.build();
        let file = MachOFile::parse(&data).unwrap();

        let sect = file.section("__DATA", "__objc_classlist").unwrap();
        assert_eq!(sect.size, 16);
        assert_eq!(file.find_section("__objc_classlist").unwrap().addr, sect.addr);
        assert_eq!(file.section_containing(sect.addr + 8).unwrap().name, "__objc_classlist");
        assert!(file.section_containing(sect.addr + 16).is_none());
        assert_eq!(file.section_data(sect).unwrap().len(), 16);
    }

    #[test]
    fn test_bad_magic() {
        let data = vec![0u8; 64];
        assert!(matches!(
            MachOFile::parse(&data),
            Err(Error::InvalidMachoMagic(0))
        ));
    }
}
