//! API records and the binary API builder.

mod builder;
pub mod record;

pub use builder::{read_binary_api, target_triple};
pub use record::*;

/// Options for reading APIs from binaries.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Architectures to read; empty reads every slice
    pub arches: Vec<String>,
    /// Deployment target for images without a platform load command
    pub min_os: Option<PackedVersion>,
    /// Populate [`BinaryInfo`] from the Mach-O header and load commands
    pub parse_header: bool,
    /// Turn exported symbols into records
    pub parse_symbol_table: bool,
    /// Read ObjC runtime metadata
    pub parse_objc: bool,
    /// Project name recorded on every API
    pub project_name: Option<String>,
    /// Verbosity level (0 = errors only, 3 = debug)
    pub verbosity: u8,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            arches: Vec::new(),
            min_os: None,
            parse_header: true,
            parse_symbol_table: true,
            parse_objc: true,
            project_name: None,
            verbosity: 1,
        }
    }
}
