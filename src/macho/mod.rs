//! Mach-O file format handling.
//!
//! This module provides read-only parsing of Mach-O images: 32 and 64-bit
//! headers in either byte order, load commands, sections, symbols, the export
//! trie, bind opcodes, chained fixups, relocations and universal binaries.

mod chained;
mod constants;
mod context;
mod fat;
mod structs;
mod symbols;
mod trie;

pub use chained::*;
pub use constants::*;
pub use context::*;
pub use fat::*;
pub use structs::*;
pub use symbols::*;
pub use trie::*;

pub(crate) use structs::impl_swap;
