//! Mach-O constants and flags.

use bitflags::bitflags;

// =============================================================================
// Magic Numbers
// =============================================================================

/// 64-bit Mach-O magic (host byte order)
pub const MH_MAGIC_64: u32 = 0xFEEDFACF;
/// 64-bit Mach-O magic (swapped)
pub const MH_CIGAM_64: u32 = 0xCFFAEDFE;
/// 32-bit Mach-O magic (host byte order)
pub const MH_MAGIC: u32 = 0xFEEDFACE;
/// 32-bit Mach-O magic (swapped)
pub const MH_CIGAM: u32 = 0xCEFAEDFE;

/// Universal binary magic (always big-endian on disk)
pub const FAT_MAGIC: u32 = 0xCAFEBABE;
/// Universal binary magic with 64-bit offsets
pub const FAT_MAGIC_64: u32 = 0xCAFEBABF;

// =============================================================================
// File Types
// =============================================================================

/// Relocatable object file
pub const MH_OBJECT: u32 = 0x1;
/// Executable
pub const MH_EXECUTE: u32 = 0x2;
/// Dynamically bound shared library
pub const MH_DYLIB: u32 = 0x6;
/// Bundle
pub const MH_BUNDLE: u32 = 0x8;
/// Shared library stub
pub const MH_DYLIB_STUB: u32 = 0x9;

// =============================================================================
// CPU Types
// =============================================================================

/// 64-bit architecture flag
pub const CPU_ARCH_ABI64: u32 = 0x0100_0000;
/// 64-bit architecture with 32-bit pointers
pub const CPU_ARCH_ABI64_32: u32 = 0x0200_0000;

/// x86 CPU type
pub const CPU_TYPE_X86: u32 = 7;
/// x86_64 CPU type
pub const CPU_TYPE_X86_64: u32 = CPU_TYPE_X86 | CPU_ARCH_ABI64;
/// ARM CPU type
pub const CPU_TYPE_ARM: u32 = 12;
/// ARM64 CPU type
pub const CPU_TYPE_ARM64: u32 = CPU_TYPE_ARM | CPU_ARCH_ABI64;
/// ARM64_32 CPU type (watchOS)
pub const CPU_TYPE_ARM64_32: u32 = CPU_TYPE_ARM | CPU_ARCH_ABI64_32;
/// PowerPC CPU type
pub const CPU_TYPE_POWERPC: u32 = 18;
/// PowerPC64 CPU type
pub const CPU_TYPE_POWERPC64: u32 = CPU_TYPE_POWERPC | CPU_ARCH_ABI64;

/// Mask for the capability bits of a cpu subtype
pub const CPU_SUBTYPE_MASK: u32 = 0xFF00_0000;
/// ARM64E (pointer authentication)
pub const CPU_SUBTYPE_ARM64E: u32 = 2;
/// x86_64h (Haswell)
pub const CPU_SUBTYPE_X86_64_H: u32 = 8;
/// ARMv7
pub const CPU_SUBTYPE_ARM_V7: u32 = 9;
/// ARMv7s
pub const CPU_SUBTYPE_ARM_V7S: u32 = 11;
/// ARMv7k
pub const CPU_SUBTYPE_ARM_V7K: u32 = 12;

// =============================================================================
// Load Commands
// =============================================================================

/// Load command requiring dynamic linker
pub const LC_REQ_DYLD: u32 = 0x8000_0000;

/// 32-bit segment
pub const LC_SEGMENT: u32 = 0x1;
/// Link-edit symbol table info
pub const LC_SYMTAB: u32 = 0x2;
/// Dynamic link-edit symbol table info
pub const LC_DYSYMTAB: u32 = 0xB;
/// Load a dynamically linked shared library
pub const LC_LOAD_DYLIB: u32 = 0xC;
/// Dynamically linked shared lib identification
pub const LC_ID_DYLIB: u32 = 0xD;
/// Sub framework
pub const LC_SUB_FRAMEWORK: u32 = 0x12;
/// Load a weak dynamically linked shared library
pub const LC_LOAD_WEAK_DYLIB: u32 = 0x18 | LC_REQ_DYLD;
/// 64-bit segment
pub const LC_SEGMENT_64: u32 = 0x19;
/// UUID
pub const LC_UUID: u32 = 0x1B;
/// Load and re-export dylib
pub const LC_REEXPORT_DYLIB: u32 = 0x1F | LC_REQ_DYLD;
/// Encrypted segment information
pub const LC_ENCRYPTION_INFO: u32 = 0x21;
/// Compressed dyld info
pub const LC_DYLD_INFO: u32 = 0x22;
/// Compressed dyld info only
pub const LC_DYLD_INFO_ONLY: u32 = 0x22 | LC_REQ_DYLD;
/// Load upward dylib
pub const LC_LOAD_UPWARD_DYLIB: u32 = 0x23 | LC_REQ_DYLD;
/// Build for macOS min version
pub const LC_VERSION_MIN_MACOSX: u32 = 0x24;
/// Build for iOS min version
pub const LC_VERSION_MIN_IPHONEOS: u32 = 0x25;
/// 64-bit encrypted segment information
pub const LC_ENCRYPTION_INFO_64: u32 = 0x2C;
/// Build for tvOS min version
pub const LC_VERSION_MIN_TVOS: u32 = 0x2F;
/// Build for watchOS min version
pub const LC_VERSION_MIN_WATCHOS: u32 = 0x30;
/// Build for platform min version
pub const LC_BUILD_VERSION: u32 = 0x32;
/// Used with linkedit_data_command, payload is trie
pub const LC_DYLD_EXPORTS_TRIE: u32 = 0x33 | LC_REQ_DYLD;
/// Used with linkedit_data_command
pub const LC_DYLD_CHAINED_FIXUPS: u32 = 0x34 | LC_REQ_DYLD;

// =============================================================================
// Platforms (LC_BUILD_VERSION)
// =============================================================================

/// macOS
pub const PLATFORM_MACOS: u32 = 1;
/// iOS
pub const PLATFORM_IOS: u32 = 2;
/// tvOS
pub const PLATFORM_TVOS: u32 = 3;
/// watchOS
pub const PLATFORM_WATCHOS: u32 = 4;
/// bridgeOS
pub const PLATFORM_BRIDGEOS: u32 = 5;
/// Mac Catalyst
pub const PLATFORM_MACCATALYST: u32 = 6;
/// iOS simulator
pub const PLATFORM_IOSSIMULATOR: u32 = 7;
/// tvOS simulator
pub const PLATFORM_TVOSSIMULATOR: u32 = 8;
/// watchOS simulator
pub const PLATFORM_WATCHOSSIMULATOR: u32 = 9;
/// DriverKit
pub const PLATFORM_DRIVERKIT: u32 = 10;

// =============================================================================
// Section Types
// =============================================================================

/// Section types mask
pub const SECTION_TYPE: u32 = 0x0000_00FF;
/// Zero fill on demand
pub const S_ZEROFILL: u32 = 0x1;
/// Zero fill on demand (>4GB)
pub const S_GB_ZEROFILL: u32 = 0xC;
/// Thread local zerofill section
pub const S_THREAD_LOCAL_ZEROFILL: u32 = 0x12;
/// Thread local variable section
pub const S_THREAD_LOCAL_VARIABLES: u32 = 0x13;

/// Section contains only true machine instructions
pub const S_ATTR_PURE_INSTRUCTIONS: u32 = 0x8000_0000;
/// Section contains some machine instructions
pub const S_ATTR_SOME_INSTRUCTIONS: u32 = 0x0000_0400;

/// Segment is writable (VM_PROT_WRITE)
pub const VM_PROT_WRITE: u32 = 0x2;

// =============================================================================
// Symbol Types
// =============================================================================

/// If any of these bits set, a symbolic debugging entry
pub const N_STAB: u8 = 0xE0;
/// Private external symbol bit
pub const N_PEXT: u8 = 0x10;
/// Mask for the type bits
pub const N_TYPE: u8 = 0x0E;
/// External symbol bit
pub const N_EXT: u8 = 0x01;

/// Undefined symbol
pub const N_UNDF: u8 = 0x0;
/// Absolute symbol
pub const N_ABS: u8 = 0x2;
/// Defined in section number n_sect
pub const N_SECT: u8 = 0xE;
/// Indirect
pub const N_INDR: u8 = 0xA;

/// Symbol is a weak definition (n_desc)
pub const N_WEAK_DEF: u16 = 0x0080;
/// Symbol is a weak reference (n_desc)
pub const N_WEAK_REF: u16 = 0x0040;

// =============================================================================
// Relocations
// =============================================================================

/// Scattered relocation flag in r_address
pub const R_SCATTERED: u32 = 0x8000_0000;

/// Generic pointer-sized relocation (GENERIC_RELOC_VANILLA, X86_64_RELOC_UNSIGNED,
/// ARM64_RELOC_UNSIGNED)
pub const RELOC_UNSIGNED: u8 = 0;
/// arm64e signed pointer
pub const ARM64_RELOC_AUTHENTICATED_POINTER: u8 = 11;

// =============================================================================
// Dyld Bind Info
// =============================================================================

/// Bind opcodes used in the dyld bind info.
#[allow(missing_docs)]
pub mod bind_opcodes {
    pub const BIND_OPCODE_DONE: u8 = 0x00;
    pub const BIND_OPCODE_SET_DYLIB_ORDINAL_IMM: u8 = 0x10;
    pub const BIND_OPCODE_SET_DYLIB_ORDINAL_ULEB: u8 = 0x20;
    pub const BIND_OPCODE_SET_DYLIB_SPECIAL_IMM: u8 = 0x30;
    pub const BIND_OPCODE_SET_SYMBOL_TRAILING_FLAGS_IMM: u8 = 0x40;
    pub const BIND_OPCODE_SET_TYPE_IMM: u8 = 0x50;
    pub const BIND_OPCODE_SET_ADDEND_SLEB: u8 = 0x60;
    pub const BIND_OPCODE_SET_SEGMENT_AND_OFFSET_ULEB: u8 = 0x70;
    pub const BIND_OPCODE_ADD_ADDR_ULEB: u8 = 0x80;
    pub const BIND_OPCODE_DO_BIND: u8 = 0x90;
    pub const BIND_OPCODE_DO_BIND_ADD_ADDR_ULEB: u8 = 0xA0;
    pub const BIND_OPCODE_DO_BIND_ADD_ADDR_IMM_SCALED: u8 = 0xB0;
    pub const BIND_OPCODE_DO_BIND_ULEB_TIMES_SKIPPING_ULEB: u8 = 0xC0;
    pub const BIND_OPCODE_THREADED: u8 = 0xD0;

    pub const BIND_IMMEDIATE_MASK: u8 = 0x0F;
    pub const BIND_OPCODE_MASK: u8 = 0xF0;

    pub const BIND_SPECIAL_DYLIB_SELF: i64 = 0;
    pub const BIND_SPECIAL_DYLIB_MAIN_EXECUTABLE: i64 = -1;
    pub const BIND_SPECIAL_DYLIB_FLAT_LOOKUP: i64 = -2;
    pub const BIND_SPECIAL_DYLIB_WEAK_LOOKUP: i64 = -3;
}

// =============================================================================
// Export Trie
// =============================================================================

/// Export symbol kind mask.
pub const EXPORT_SYMBOL_FLAGS_KIND_MASK: u64 = 0x03;
/// Regular export.
pub const EXPORT_SYMBOL_FLAGS_KIND_REGULAR: u64 = 0x00;
/// Thread-local variable.
pub const EXPORT_SYMBOL_FLAGS_KIND_THREAD_LOCAL: u64 = 0x01;
/// Absolute symbol (not relative to any section).
pub const EXPORT_SYMBOL_FLAGS_KIND_ABSOLUTE: u64 = 0x02;
/// Weak definition.
pub const EXPORT_SYMBOL_FLAGS_WEAK_DEFINITION: u64 = 0x04;
/// Re-export from another dylib.
pub const EXPORT_SYMBOL_FLAGS_REEXPORT: u64 = 0x08;
/// Stub and resolver.
pub const EXPORT_SYMBOL_FLAGS_STUB_AND_RESOLVER: u64 = 0x10;

// =============================================================================
// Chained Fixups
// =============================================================================

/// Pointer formats of `dyld_chained_starts_in_segment`.
#[allow(missing_docs)]
pub mod chained {
    pub const DYLD_CHAINED_PTR_ARM64E: u16 = 1;
    pub const DYLD_CHAINED_PTR_64: u16 = 2;
    pub const DYLD_CHAINED_PTR_32: u16 = 3;
    pub const DYLD_CHAINED_PTR_64_OFFSET: u16 = 6;
    pub const DYLD_CHAINED_PTR_ARM64E_USERLAND: u16 = 9;
    pub const DYLD_CHAINED_PTR_ARM64E_USERLAND24: u16 = 12;

    pub const DYLD_CHAINED_IMPORT: u32 = 1;
    pub const DYLD_CHAINED_IMPORT_ADDEND: u32 = 2;
    pub const DYLD_CHAINED_IMPORT_ADDEND64: u32 = 3;

    pub const DYLD_CHAINED_PTR_START_NONE: u16 = 0xFFFF;
    pub const DYLD_CHAINED_PTR_START_MULTI: u16 = 0x8000;
}

// =============================================================================
// Header Flags
// =============================================================================

bitflags! {
    /// Mach-O header flags used by the API builder.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MachOFlags: u32 {
        /// The object file has no undefined references
        const NOUNDEFS = 0x1;
        /// The object file is input for the dynamic linker
        const DYLDLINK = 0x4;
        /// The image is using two-level name space bindings
        const TWOLEVEL = 0x80;
        /// The final linked image contains external weak symbols
        const WEAK_DEFINES = 0x8000;
        /// The final linked image uses weak symbols
        const BINDS_TO_WEAK = 0x10000;
        /// The static linker does not need to examine dependent dylibs for re-exports
        const NO_REEXPORTED_DYLIBS = 0x100000;
        /// Position independent executable
        const PIE = 0x200000;
        /// The code was linked for use in an application extension
        const APP_EXTENSION_SAFE = 0x2000000;
        /// The dylib is part of the dyld shared cache
        const DYLIB_IN_CACHE = 0x80000000;
    }
}
