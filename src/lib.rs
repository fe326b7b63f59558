//! objcsdk - Objective-C metadata reader and SDK database toolkit.
//!
//! This library reads Objective-C runtime metadata and exported symbols out
//! of Mach-O binaries and turns them into API records. Records from many
//! binaries and header scans are merged into an SDK database (SDKDB), and
//! two databases can be diffed for API regressions.
//!
//! # Features
//!
//! - Memory-mapped thin and fat Mach-O parsing
//! - ObjC1 and ObjC2 metadata, including chained fixups and relative method lists
//! - Export trie and symbol table reading
//! - Deterministic merging with conflict detection
//! - Access propagation across superclasses, categories and protocols
//!
//! # Example
//!
//! ```no_run
//! use objcsdk::{read_binary_api, Binary, ContentRoot, Diagnostics, ScanOptions, SdkdbBuilder};
//!
//! fn main() -> objcsdk::Result<()> {
//!     let binary = Binary::open("/usr/lib/libobjc.A.dylib")?;
//!     let options = ScanOptions::default();
//!
//!     let mut apis = Vec::new();
//!     for image in binary.images(&options.arches)? {
//!         apis.push(read_binary_api(&image, &options)?);
//!     }
//!
//!     let mut diags = Diagnostics::new();
//!     let mut builder = SdkdbBuilder::new();
//!     for api in &apis {
//!         builder.add_api(api, ContentRoot::Runtime, &mut diags);
//!     }
//!     let sdk = builder.build(&mut diags);
//!     println!("{}", sdk.to_sdkdb(diags.has_errors()).to_json()?);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod diag;
pub mod error;
pub mod macho;
pub mod objc;
pub mod sdkdb;
pub mod util;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export main types
pub use api::{read_binary_api, target_triple, ScanOptions, API};
pub use diag::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use error::{Error, Result};
pub use macho::{Binary, MachOFile};
pub use objc::{ObjCMetaDataReader, ObjCRuntime};
pub use sdkdb::{diff, CanonicalSdk, ContentRoot, DiffResult, Sdkdb, SdkdbBuilder};
