//! Mach-O binary structures.
//!
//! These structures match the on-disk format of Mach-O files. They are read
//! with `zerocopy` in host byte order and byte-swapped through [`Swap`] when
//! the image's byte order differs from the host's.

use std::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::constants::*;
use crate::util::fixed_name;

// =============================================================================
// Byte Swapping
// =============================================================================

/// Types whose scalar fields can be byte-swapped in place.
pub trait Swap: Sized {
    /// Returns the value with every multi-byte scalar field byte-swapped.
    fn swap(self) -> Self;
}

macro_rules! impl_swap_scalar {
    ($($ty:ty),*) => {
        $(impl Swap for $ty {
            #[inline]
            fn swap(self) -> Self {
                self.swap_bytes()
            }
        })*
    };
}

impl_swap_scalar!(u8, i8, u16, i16, u32, i32, u64, i64);

/// Implements [`Swap`] for a struct by swapping the listed scalar fields.
/// Byte-array fields are left out of the list.
macro_rules! impl_swap {
    ($ty:ty { $($field:ident),* $(,)? }) => {
        impl $crate::macho::Swap for $ty {
            #[inline]
            fn swap(mut self) -> Self {
                $( self.$field = self.$field.swap_bytes(); )*
                self
            }
        }
    };
}

pub(crate) use impl_swap;

// =============================================================================
// Header Structures
// =============================================================================

/// 32-bit Mach-O header.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct MachHeader32 {
    /// Magic number (MH_MAGIC)
    pub magic: u32,
    /// CPU type
    pub cputype: u32,
    /// CPU subtype
    pub cpusubtype: u32,
    /// File type
    pub filetype: u32,
    /// Number of load commands
    pub ncmds: u32,
    /// Size of load commands
    pub sizeofcmds: u32,
    /// Flags
    pub flags: u32,
}

impl MachHeader32 {
    /// Size of the header in bytes.
    pub const SIZE: usize = 28;
}

impl_swap!(MachHeader32 { magic, cputype, cpusubtype, filetype, ncmds, sizeofcmds, flags });

/// 64-bit Mach-O header.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct MachHeader64 {
    /// Magic number (MH_MAGIC_64)
    pub magic: u32,
    /// CPU type
    pub cputype: u32,
    /// CPU subtype
    pub cpusubtype: u32,
    /// File type
    pub filetype: u32,
    /// Number of load commands
    pub ncmds: u32,
    /// Size of load commands
    pub sizeofcmds: u32,
    /// Flags
    pub flags: u32,
    /// Reserved
    pub reserved: u32,
}

impl MachHeader64 {
    /// Size of the header in bytes.
    pub const SIZE: usize = 32;
}

impl_swap!(MachHeader64 { magic, cputype, cpusubtype, filetype, ncmds, sizeofcmds, flags, reserved });

/// Header fields common to both widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachHeader {
    /// CPU type
    pub cputype: u32,
    /// CPU subtype
    pub cpusubtype: u32,
    /// File type
    pub filetype: u32,
    /// Number of load commands
    pub ncmds: u32,
    /// Size of load commands
    pub sizeofcmds: u32,
    /// Flags
    pub flags: u32,
}

impl MachHeader {
    /// Returns true if this is an ARM64 binary.
    #[inline]
    pub fn is_arm64(&self) -> bool {
        self.cputype == CPU_TYPE_ARM64
    }

    /// Returns the header flags.
    #[inline]
    pub fn macho_flags(&self) -> MachOFlags {
        MachOFlags::from_bits_retain(self.flags)
    }

    /// Returns the architecture as a string.
    pub fn arch_name(&self) -> &'static str {
        arch_name(self.cputype, self.cpusubtype)
    }
}

/// Returns the conventional architecture name for a cpu type/subtype pair.
pub fn arch_name(cputype: u32, cpusubtype: u32) -> &'static str {
    let sub = cpusubtype & !CPU_SUBTYPE_MASK;
    match cputype {
        CPU_TYPE_ARM64 if sub == CPU_SUBTYPE_ARM64E => "arm64e",
        CPU_TYPE_ARM64 => "arm64",
        CPU_TYPE_ARM64_32 => "arm64_32",
        CPU_TYPE_X86_64 if sub == CPU_SUBTYPE_X86_64_H => "x86_64h",
        CPU_TYPE_X86_64 => "x86_64",
        CPU_TYPE_X86 => "i386",
        CPU_TYPE_ARM if sub == CPU_SUBTYPE_ARM_V7 => "armv7",
        CPU_TYPE_ARM if sub == CPU_SUBTYPE_ARM_V7S => "armv7s",
        CPU_TYPE_ARM if sub == CPU_SUBTYPE_ARM_V7K => "armv7k",
        CPU_TYPE_ARM => "arm",
        CPU_TYPE_POWERPC => "ppc",
        CPU_TYPE_POWERPC64 => "ppc64",
        _ => "unknown",
    }
}

// =============================================================================
// Load Command Header
// =============================================================================

/// Generic load command header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct LoadCommand {
    /// Type of load command
    pub cmd: u32,
    /// Size of load command
    pub cmdsize: u32,
}

impl LoadCommand {
    /// Size of the load command header.
    pub const SIZE: usize = 8;
}

impl_swap!(LoadCommand { cmd, cmdsize });

// =============================================================================
// Segment Commands
// =============================================================================

/// 32-bit segment command.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct SegmentCommand32 {
    /// LC_SEGMENT
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// Segment name (16 bytes, null-padded)
    pub segname: [u8; 16],
    /// Virtual memory address
    pub vmaddr: u32,
    /// Virtual memory size
    pub vmsize: u32,
    /// File offset
    pub fileoff: u32,
    /// Amount of file to map
    pub filesize: u32,
    /// Maximum VM protection
    pub maxprot: u32,
    /// Initial VM protection
    pub initprot: u32,
    /// Number of sections
    pub nsects: u32,
    /// Flags
    pub flags: u32,
}

impl SegmentCommand32 {
    /// Size of the segment command (without sections).
    pub const SIZE: usize = 56;
}

impl_swap!(SegmentCommand32 {
    cmd, cmdsize, vmaddr, vmsize, fileoff, filesize, maxprot, initprot, nsects, flags
});

/// 64-bit segment command.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct SegmentCommand64 {
    /// LC_SEGMENT_64
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// Segment name (16 bytes, null-padded)
    pub segname: [u8; 16],
    /// Virtual memory address
    pub vmaddr: u64,
    /// Virtual memory size
    pub vmsize: u64,
    /// File offset
    pub fileoff: u64,
    /// Amount of file to map
    pub filesize: u64,
    /// Maximum VM protection
    pub maxprot: u32,
    /// Initial VM protection
    pub initprot: u32,
    /// Number of sections
    pub nsects: u32,
    /// Flags
    pub flags: u32,
}

impl SegmentCommand64 {
    /// Size of the segment command (without sections).
    pub const SIZE: usize = 72;
}

impl_swap!(SegmentCommand64 {
    cmd, cmdsize, vmaddr, vmsize, fileoff, filesize, maxprot, initprot, nsects, flags
});

/// Writes a name into a 16-byte, NUL-padded name field.
pub fn set_fixed_name(field: &mut [u8; 16], name: &str) {
    *field = [0u8; 16];
    let bytes = name.as_bytes();
    let len = bytes.len().min(16);
    field[..len].copy_from_slice(&bytes[..len]);
}

// =============================================================================
// Sections
// =============================================================================

/// 32-bit section.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct Section32 {
    /// Section name (16 bytes, null-padded)
    pub sectname: [u8; 16],
    /// Segment name (16 bytes, null-padded)
    pub segname: [u8; 16],
    /// Virtual memory address
    pub addr: u32,
    /// Size in bytes
    pub size: u32,
    /// File offset
    pub offset: u32,
    /// Alignment (power of 2)
    pub align: u32,
    /// File offset of relocation entries
    pub reloff: u32,
    /// Number of relocation entries
    pub nreloc: u32,
    /// Flags
    pub flags: u32,
    /// Reserved (for runtime use)
    pub reserved1: u32,
    /// Reserved (for runtime use)
    pub reserved2: u32,
}

impl Section32 {
    /// Size of a section entry.
    pub const SIZE: usize = 68;
}

impl_swap!(Section32 {
    addr, size, offset, align, reloff, nreloc, flags, reserved1, reserved2
});

/// 64-bit section.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct Section64 {
    /// Section name (16 bytes, null-padded)
    pub sectname: [u8; 16],
    /// Segment name (16 bytes, null-padded)
    pub segname: [u8; 16],
    /// Virtual memory address
    pub addr: u64,
    /// Size in bytes
    pub size: u64,
    /// File offset
    pub offset: u32,
    /// Alignment (power of 2)
    pub align: u32,
    /// File offset of relocation entries
    pub reloff: u32,
    /// Number of relocation entries
    pub nreloc: u32,
    /// Flags
    pub flags: u32,
    /// Reserved (for runtime use)
    pub reserved1: u32,
    /// Reserved (for runtime use)
    pub reserved2: u32,
    /// Reserved
    pub reserved3: u32,
}

impl Section64 {
    /// Size of a section entry.
    pub const SIZE: usize = 80;
}

impl_swap!(Section64 {
    addr, size, offset, align, reloff, nreloc, flags, reserved1, reserved2, reserved3
});

// =============================================================================
// Symbol Table
// =============================================================================

/// Symbol table command.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct SymtabCommand {
    /// LC_SYMTAB
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// Symbol table offset
    pub symoff: u32,
    /// Number of symbol table entries
    pub nsyms: u32,
    /// String table offset
    pub stroff: u32,
    /// String table size in bytes
    pub strsize: u32,
}

impl SymtabCommand {
    /// Size of this command.
    pub const SIZE: usize = 24;
}

impl_swap!(SymtabCommand { cmd, cmdsize, symoff, nsyms, stroff, strsize });

/// Dynamic symbol table command.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct DysymtabCommand {
    /// LC_DYSYMTAB
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// Index of local symbols
    pub ilocalsym: u32,
    /// Number of local symbols
    pub nlocalsym: u32,
    /// Index of externally defined symbols
    pub iextdefsym: u32,
    /// Number of externally defined symbols
    pub nextdefsym: u32,
    /// Index of undefined symbols
    pub iundefsym: u32,
    /// Number of undefined symbols
    pub nundefsym: u32,
    /// File offset to table of contents
    pub tocoff: u32,
    /// Number of entries in table of contents
    pub ntoc: u32,
    /// File offset to module table
    pub modtaboff: u32,
    /// Number of module table entries
    pub nmodtab: u32,
    /// Offset to referenced symbol table
    pub extrefsymoff: u32,
    /// Number of referenced symbol table entries
    pub nextrefsyms: u32,
    /// File offset to the indirect symbol table
    pub indirectsymoff: u32,
    /// Number of indirect symbol table entries
    pub nindirectsyms: u32,
    /// Offset to external relocation entries
    pub extreloff: u32,
    /// Number of external relocation entries
    pub nextrel: u32,
    /// Offset to local relocation entries
    pub locreloff: u32,
    /// Number of local relocation entries
    pub nlocrel: u32,
}

impl DysymtabCommand {
    /// Size of this command.
    pub const SIZE: usize = 80;
}

impl_swap!(DysymtabCommand {
    cmd, cmdsize, ilocalsym, nlocalsym, iextdefsym, nextdefsym, iundefsym, nundefsym,
    tocoff, ntoc, modtaboff, nmodtab, extrefsymoff, nextrefsyms, indirectsymoff,
    nindirectsyms, extreloff, nextrel, locreloff, nlocrel
});

/// 32-bit symbol table entry.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct Nlist32 {
    /// Index into string table
    pub n_strx: u32,
    /// Type flag
    pub n_type: u8,
    /// Section number or NO_SECT
    pub n_sect: u8,
    /// Flags
    pub n_desc: u16,
    /// Value
    pub n_value: u32,
}

impl Nlist32 {
    /// Size of an nlist entry.
    pub const SIZE: usize = 12;
}

impl_swap!(Nlist32 { n_strx, n_desc, n_value });

/// 64-bit symbol table entry.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct Nlist64 {
    /// Index into string table
    pub n_strx: u32,
    /// Type flag
    pub n_type: u8,
    /// Section number or NO_SECT
    pub n_sect: u8,
    /// Flags
    pub n_desc: u16,
    /// Value
    pub n_value: u64,
}

impl Nlist64 {
    /// Size of an nlist entry.
    pub const SIZE: usize = 16;
}

impl_swap!(Nlist64 { n_strx, n_desc, n_value });

// =============================================================================
// Relocations
// =============================================================================

/// Raw relocation entry.
///
/// The bit-field layout of the second word depends on the image's byte
/// order, see [`RelocationInfo::fields`].
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct RelocationInfo {
    /// r_address (or scattered relocation word)
    pub r_word0: u32,
    /// Packed r_symbolnum/r_pcrel/r_length/r_extern/r_type
    pub r_word1: u32,
}

impl RelocationInfo {
    /// Size of a relocation entry.
    pub const SIZE: usize = 8;
}

impl_swap!(RelocationInfo { r_word0, r_word1 });

// =============================================================================
// Dyld Info / Linkedit Data
// =============================================================================

/// Dyld info command (compressed LINKEDIT information).
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct DyldInfoCommand {
    /// LC_DYLD_INFO or LC_DYLD_INFO_ONLY
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// File offset to rebase info
    pub rebase_off: u32,
    /// Size of rebase info
    pub rebase_size: u32,
    /// File offset to binding info
    pub bind_off: u32,
    /// Size of binding info
    pub bind_size: u32,
    /// File offset to weak binding info
    pub weak_bind_off: u32,
    /// Size of weak binding info
    pub weak_bind_size: u32,
    /// File offset to lazy binding info
    pub lazy_bind_off: u32,
    /// Size of lazy binding info
    pub lazy_bind_size: u32,
    /// File offset to export info
    pub export_off: u32,
    /// Size of export info
    pub export_size: u32,
}

impl DyldInfoCommand {
    /// Size of this command.
    pub const SIZE: usize = 48;
}

impl_swap!(DyldInfoCommand {
    cmd, cmdsize, rebase_off, rebase_size, bind_off, bind_size, weak_bind_off,
    weak_bind_size, lazy_bind_off, lazy_bind_size, export_off, export_size
});

/// Generic linkedit data command.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct LinkeditDataCommand {
    /// Command type (LC_DYLD_EXPORTS_TRIE, LC_DYLD_CHAINED_FIXUPS, etc.)
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// File offset
    pub dataoff: u32,
    /// Size
    pub datasize: u32,
}

impl LinkeditDataCommand {
    /// Size of this command.
    pub const SIZE: usize = 16;
}

impl_swap!(LinkeditDataCommand { cmd, cmdsize, dataoff, datasize });

// =============================================================================
// Dylib Commands
// =============================================================================

/// Dylib reference (shared by several load commands).
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct Dylib {
    /// Library's path name offset
    pub name_offset: u32,
    /// Library's build timestamp
    pub timestamp: u32,
    /// Library's current version number
    pub current_version: u32,
    /// Library's compatibility version number
    pub compatibility_version: u32,
}

/// Dylib load command.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct DylibCommand {
    /// LC_LOAD_DYLIB, LC_ID_DYLIB, etc.
    pub cmd: u32,
    /// Total size (includes path string)
    pub cmdsize: u32,
    /// Library identification
    pub dylib: Dylib,
}

impl DylibCommand {
    /// Minimum size of this command (without path string).
    pub const SIZE: usize = 24;
}

impl Swap for DylibCommand {
    fn swap(mut self) -> Self {
        self.cmd = self.cmd.swap_bytes();
        self.cmdsize = self.cmdsize.swap_bytes();
        self.dylib.name_offset = self.dylib.name_offset.swap_bytes();
        self.dylib.timestamp = self.dylib.timestamp.swap_bytes();
        self.dylib.current_version = self.dylib.current_version.swap_bytes();
        self.dylib.compatibility_version = self.dylib.compatibility_version.swap_bytes();
        self
    }
}

/// Command carrying a single string (LC_SUB_FRAMEWORK and friends).
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct StringCommand {
    /// Command type
    pub cmd: u32,
    /// Total size (includes string)
    pub cmdsize: u32,
    /// Offset of the string from the start of the command
    pub str_offset: u32,
}

impl StringCommand {
    /// Minimum size of this command.
    pub const SIZE: usize = 12;
}

impl_swap!(StringCommand { cmd, cmdsize, str_offset });

// =============================================================================
// Version Commands
// =============================================================================

/// UUID command.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct UuidCommand {
    /// LC_UUID
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// UUID
    pub uuid: [u8; 16],
}

impl_swap!(UuidCommand { cmd, cmdsize });

/// Build version command.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct BuildVersionCommand {
    /// LC_BUILD_VERSION
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// Platform
    pub platform: u32,
    /// Minimum OS version (X.Y.Z packed into 32 bits)
    pub minos: u32,
    /// SDK version (X.Y.Z packed into 32 bits)
    pub sdk: u32,
    /// Number of tool entries following
    pub ntools: u32,
}

impl BuildVersionCommand {
    /// Size of this command (without tool entries).
    pub const SIZE: usize = 24;
}

impl_swap!(BuildVersionCommand { cmd, cmdsize, platform, minos, sdk, ntools });

/// Legacy minimum version command (LC_VERSION_MIN_*).
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct VersionMinCommand {
    /// LC_VERSION_MIN_MACOSX etc.
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// X.Y.Z packed into 32 bits
    pub version: u32,
    /// X.Y.Z packed into 32 bits
    pub sdk: u32,
}

impl_swap!(VersionMinCommand { cmd, cmdsize, version, sdk });

// =============================================================================
// Encryption Info Commands
// =============================================================================

/// 32-bit encryption info command.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct EncryptionInfoCommand {
    /// LC_ENCRYPTION_INFO
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// File offset of encrypted range
    pub cryptoff: u32,
    /// Size of encrypted range
    pub cryptsize: u32,
    /// Encryption system ID (0 = not encrypted yet)
    pub cryptid: u32,
}

impl EncryptionInfoCommand {
    /// Size of this command.
    pub const SIZE: usize = 20;
}

impl_swap!(EncryptionInfoCommand { cmd, cmdsize, cryptoff, cryptsize, cryptid });

/// 64-bit encryption info command.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct EncryptionInfoCommand64 {
    /// LC_ENCRYPTION_INFO_64
    pub cmd: u32,
    /// Size of this load command
    pub cmdsize: u32,
    /// File offset of encrypted range
    pub cryptoff: u32,
    /// Size of encrypted range
    pub cryptsize: u32,
    /// Encryption system ID (0 = not encrypted yet)
    pub cryptid: u32,
    /// Padding
    pub pad: u32,
}

impl EncryptionInfoCommand64 {
    /// Size of this command.
    pub const SIZE: usize = 24;
}

impl_swap!(EncryptionInfoCommand64 { cmd, cmdsize, cryptoff, cryptsize, cryptid, pad });

// =============================================================================
// Universal Binaries
// =============================================================================

/// Universal binary header.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct FatHeader {
    /// FAT_MAGIC or FAT_MAGIC_64
    pub magic: u32,
    /// Number of architecture entries
    pub nfat_arch: u32,
}

impl_swap!(FatHeader { magic, nfat_arch });

/// Universal binary architecture entry.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct FatArch {
    /// CPU type
    pub cputype: u32,
    /// CPU subtype
    pub cpusubtype: u32,
    /// File offset of the slice
    pub offset: u32,
    /// Size of the slice
    pub size: u32,
    /// Alignment (power of 2)
    pub align: u32,
}

impl_swap!(FatArch { cputype, cpusubtype, offset, size, align });

/// Universal binary architecture entry with 64-bit offsets.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct FatArch64 {
    /// CPU type
    pub cputype: u32,
    /// CPU subtype
    pub cpusubtype: u32,
    /// File offset of the slice
    pub offset: u64,
    /// Size of the slice
    pub size: u64,
    /// Alignment (power of 2)
    pub align: u32,
    /// Reserved
    pub reserved: u32,
}

impl_swap!(FatArch64 { cputype, cpusubtype, offset, size, align, reserved });

// =============================================================================
// Display Implementations
// =============================================================================

impl fmt::Display for MachHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MachO {{ arch: {}, type: {:#x}, cmds: {}, flags: {:#x} }}",
            self.arch_name(),
            self.filetype,
            self.ncmds,
            self.flags
        )
    }
}

impl fmt::Display for Section64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Section {{ name: \"{},{}\", addr: {:#x}+{:#x}, offset: {:#x} }}",
            fixed_name(&self.segname),
            fixed_name(&self.sectname),
            self.addr,
            self.size,
            self.offset
        )
    }
}
