//! Universal (fat) binaries and file loading.

use std::fs::File;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::debug;

use zerocopy::FromBytes;

use super::constants::*;
use super::context::MachOFile;
use super::structs::{arch_name, FatArch, FatArch64, FatHeader, Swap};
use crate::error::{Error, Result};
use crate::util::{read_u32, Endian};

/// Reads a big-endian structure.
fn read_be<T: FromBytes + Swap>(data: &[u8], offset: usize) -> Option<T> {
    let value = T::read_from_prefix(data.get(offset..)?).ok()?.0;
    Some(if Endian::Big.needs_swap() {
        value.swap()
    } else {
        value
    })
}

// =============================================================================
// Fat File
// =============================================================================

/// One architecture slice of a universal binary.
#[derive(Debug, Clone, Copy)]
pub struct FatSlice<'data> {
    /// CPU type
    pub cputype: u32,
    /// CPU subtype
    pub cpusubtype: u32,
    /// File offset of the slice
    pub offset: u64,
    /// Bytes of the slice
    pub data: &'data [u8],
}

impl<'data> FatSlice<'data> {
    /// Returns the architecture name of the slice.
    pub fn arch_name(&self) -> &'static str {
        arch_name(self.cputype, self.cpusubtype)
    }
}

/// A universal binary split into slices.
///
/// A thin Mach-O file parses as a universal binary with a single slice.
#[derive(Debug)]
pub struct FatFile<'data> {
    slices: Vec<FatSlice<'data>>,
}

impl<'data> FatFile<'data> {
    /// Returns true if the data starts with a universal binary magic.
    pub fn is_fat(data: &[u8]) -> bool {
        matches!(
            read_u32(data, 0, Endian::Big),
            Some(FAT_MAGIC) | Some(FAT_MAGIC_64)
        )
    }

    /// Splits a file into its architecture slices.
    pub fn parse(data: &'data [u8]) -> Result<Self> {
        if !Self::is_fat(data) {
            let file = MachOFile::parse(data)?;
            let header = file.header();
            return Ok(Self {
                slices: vec![FatSlice {
                    cputype: header.cputype,
                    cpusubtype: header.cpusubtype,
                    offset: 0,
                    data,
                }],
            });
        }

        // The fat header is big-endian regardless of the slices' byte order.
        let invalid = |reason: &str| Error::InvalidFat {
            reason: reason.to_string(),
        };
        let header: FatHeader = read_be(data, 0).ok_or_else(|| invalid("truncated header"))?;
        let nfat_arch = header.nfat_arch as usize;
        let is_64 = header.magic == FAT_MAGIC_64;
        let entry_size = if is_64 {
            size_of::<FatArch64>()
        } else {
            size_of::<FatArch>()
        };

        let mut slices = Vec::with_capacity(nfat_arch);
        for i in 0..nfat_arch {
            let entry = size_of::<FatHeader>() + i * entry_size;
            let (cputype, cpusubtype, offset, size) = if is_64 {
                let arch: FatArch64 =
                    read_be(data, entry).ok_or_else(|| invalid("truncated arch table"))?;
                (arch.cputype, arch.cpusubtype, arch.offset, arch.size)
            } else {
                let arch: FatArch =
                    read_be(data, entry).ok_or_else(|| invalid("truncated arch table"))?;
                (arch.cputype, arch.cpusubtype, arch.offset as u64, arch.size as u64)
            };

            let slice = offset
                .checked_add(size)
                .and_then(|end| data.get(offset as usize..end as usize))
                .ok_or_else(|| Error::InvalidFat {
                    reason: format!(
                        "slice {} ({}) at {:#x}+{:#x} exceeds file size {:#x}",
                        i,
                        arch_name(cputype, cpusubtype),
                        offset,
                        size,
                        data.len()
                    ),
                })?;

            slices.push(FatSlice {
                cputype,
                cpusubtype,
                offset,
                data: slice,
            });
        }

        debug!("universal binary with {} slices", slices.len());
        Ok(Self { slices })
    }

    /// Returns all slices.
    pub fn slices(&self) -> &[FatSlice<'data>] {
        &self.slices
    }

    /// Returns the slice for an architecture name.
    pub fn slice(&self, arch: &str) -> Option<&FatSlice<'data>> {
        self.slices.iter().find(|s| s.arch_name() == arch)
    }

    /// Returns the comma-separated architecture names.
    pub fn arch_names(&self) -> String {
        self.slices
            .iter()
            .map(|s| s.arch_name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// =============================================================================
// Binary
// =============================================================================

/// Backing storage of a binary.
#[derive(Debug)]
enum Storage {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Deref for Storage {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Storage::Mapped(mmap) => mmap,
            Storage::Owned(bytes) => bytes,
        }
    }
}

/// A binary file on disk, memory-mapped read-only.
#[derive(Debug)]
pub struct Binary {
    path: PathBuf,
    storage: Storage,
}

impl Binary {
    /// Memory-maps a file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = File::open(&path).map_err(|e| Error::FileOpen {
            path: path.clone(),
            source: e,
        })?;

        // SAFETY: the mapping is read-only and the file is not modified
        // while the binary is alive.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::MemoryMap {
            path: path.clone(),
            source: e,
        })?;

        Ok(Self {
            path,
            storage: Storage::Mapped(mmap),
        })
    }

    /// Wraps an in-memory buffer.
    pub fn from_bytes<P: AsRef<Path>>(path: P, bytes: Vec<u8>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            storage: Storage::Owned(bytes),
        }
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the raw file bytes.
    pub fn data(&self) -> &[u8] {
        &self.storage
    }

    /// Parses every slice, or only the requested architectures.
    ///
    /// An empty `arches` selects all slices. Requested architectures that
    /// the file does not contain are skipped; if none match, the call fails
    /// with [`Error::ArchNotFound`].
    pub fn images(&self, arches: &[String]) -> Result<Vec<MachOFile<'_>>> {
        let fat = FatFile::parse(self.data())?;

        let selected: Vec<&FatSlice<'_>> = if arches.is_empty() {
            fat.slices().iter().collect()
        } else {
            fat.slices()
                .iter()
                .filter(|s| arches.iter().any(|a| a == s.arch_name()))
                .collect()
        };

        if selected.is_empty() {
            return Err(Error::ArchNotFound {
                arch: arches.join(", "),
                available: fat.arch_names(),
            });
        }

        selected
            .into_iter()
            .map(|slice| MachOFile::parse(slice.data))
            .collect()
    }
}
