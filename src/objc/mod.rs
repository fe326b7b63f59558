//! Objective-C runtime metadata.
//!
//! The reader resolves fixups through an [`AddressCache`], decodes the ObjC1
//! and ObjC2 structure layouts and hands out lazy entity wrappers.

pub mod cache;
pub mod layout;
pub mod model;
pub mod reader;

pub use cache::AddressCache;
pub use layout::ImageInfo;
pub use model::*;
pub use reader::{ObjCMetaDataReader, ObjCRuntime, ENCRYPTED_PLACEHOLDER};
