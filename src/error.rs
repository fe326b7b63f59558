//! Error types for the ObjC metadata reader and the SDK database.
//!
//! Low-level readers return these errors directly. The SDKDB layer does not
//! use them for conflicts or regressions; those are accumulated as
//! [`crate::diag::Diagnostic`]s instead.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type.
#[derive(Error, Debug)]
pub enum Error {
    // ==================== I/O Errors ====================
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to open file '{path}': {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to memory map file '{path}': {source}")]
    MemoryMap {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ==================== Mach-O Errors ====================
    #[error("invalid Mach-O magic: {0:#x}")]
    InvalidMachoMagic(u32),

    #[error("invalid universal binary: {reason}")]
    InvalidFat { reason: String },

    #[error("no slice for architecture '{arch}' (available: {available})")]
    ArchNotFound { arch: String, available: String },

    #[error("load command at offset {offset:#x} extends beyond header")]
    LoadCommandOverflow { offset: usize },

    #[error("invalid export trie at offset {offset:#x}")]
    InvalidExportTrie { offset: usize },

    #[error("invalid ULEB128 at offset {offset:#x}")]
    InvalidUleb128 { offset: usize },

    #[error("symbol index {index} out of range (symbol count: {count})")]
    SymbolLookup { index: u32, count: u32 },

    #[error("string table offset {offset} out of bounds (size: {size})")]
    StringTableOverflow { offset: u32, size: u32 },

    // ==================== ObjC Reader Errors ====================
    #[error("unsupported Objective-C runtime")]
    UnsupportedRuntime,

    #[error("section '{segment},{section}' has size {size:#x}, not a multiple of {element}")]
    MalformedSection {
        segment: String,
        section: String,
        size: u64,
        element: u64,
    },

    #[error("malformed Objective-C layout at {addr:#x}: {reason}")]
    MalformedLayout { addr: u64, reason: String },

    #[error("address {addr:#x} (+{len:#x}) is not covered by any section")]
    OutOfBounds { addr: u64, len: u64 },

    #[error("address {addr:#x} is inside an encrypted range")]
    Encrypted { addr: u64 },

    #[error("unexpected empty string at {addr:#x}")]
    EmptyString { addr: u64 },

    // ==================== SDKDB Errors ====================
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported SDKDB version '{0}'")]
    UnsupportedSdkdbVersion(String),

    #[error("malformed SDKDB: {0}")]
    MalformedSdkdb(String),

    // ==================== Parse Errors ====================
    #[error("parse error at offset {offset:#x}: {reason}")]
    Parse { offset: usize, reason: String },

    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a parse error with a formatted message.
    #[inline]
    pub fn parse(offset: usize, reason: impl Into<String>) -> Self {
        Error::Parse {
            offset,
            reason: reason.into(),
        }
    }

    /// Creates a malformed layout error.
    #[inline]
    pub fn malformed(addr: u64, reason: impl Into<String>) -> Self {
        Error::MalformedLayout {
            addr,
            reason: reason.into(),
        }
    }

    /// Creates an out-of-bounds error.
    #[inline]
    pub fn out_of_bounds(addr: u64, len: u64) -> Self {
        Error::OutOfBounds { addr, len }
    }

    /// Creates a buffer too small error.
    #[inline]
    pub fn buffer_too_small(needed: usize, available: usize) -> Self {
        Error::BufferTooSmall { needed, available }
    }
}
