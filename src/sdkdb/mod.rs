//! SDK databases: JSON model, ranking, header updates and diffing.
//!
//! Inputs are collected by [`SdkdbBuilder`], which ranks every key into a
//! [`CanonicalSdk`]. The canonical form is what gets written back out or
//! compared by [`diff`].

pub mod builder;
pub mod canonical;
pub mod diff;
pub mod entry;
pub mod json;

pub use builder::SdkdbBuilder;
pub use canonical::{CanonicalEntry, CanonicalSdk, CanonicalTarget, ContainerKey, Source, Table};
pub use diff::{diff, DiffResult};
pub use entry::{EntryState, InsertOutcome, MapEntry, Ranked, SourceId};
pub use json::{ContentRoot, Sdkdb, TargetApis, SDKDB_VERSION};
