//! Ranked map entries and the poison state machine.

use std::cmp::{Ordering, Reverse};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::api::{
    APIRecord, Access, BinaryInfo, BinaryType, EnumRecord, GlobalRecord, ObjCCategoryRecord,
    ObjCInterfaceRecord, ObjCProtocolRecord, TypedefRecord,
};

/// Index of an input source (one binary or header set) within a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId(pub usize);

/// Records that take part in ranking.
pub trait Ranked {
    /// Returns the shared record fields.
    fn base(&self) -> &APIRecord;

    /// Returns true if two equally ranked definitions may coexist.
    fn tolerates_duplicate(&self, _other: &Self) -> bool {
        false
    }
}

impl Ranked for GlobalRecord {
    fn base(&self) -> &APIRecord {
        &self.base
    }

    fn tolerates_duplicate(&self, other: &Self) -> bool {
        self.weak_defined && other.weak_defined
    }
}

impl Ranked for ObjCInterfaceRecord {
    fn base(&self) -> &APIRecord {
        &self.container.base
    }
}

impl Ranked for ObjCCategoryRecord {
    fn base(&self) -> &APIRecord {
        &self.container.base
    }
}

impl Ranked for ObjCProtocolRecord {
    fn base(&self) -> &APIRecord {
        &self.container.base
    }
}

impl Ranked for EnumRecord {
    fn base(&self) -> &APIRecord {
        &self.base
    }
}

impl Ranked for TypedefRecord {
    fn base(&self) -> &APIRecord {
        &self.base
    }
}

/// Rank of an entry. Smaller wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RankKey {
    access: Reverse<Access>,
    unavailable: bool,
    binary_kind: u8,
    missing_install_name: bool,
}

fn binary_kind_rank(binary: Option<&BinaryInfo>) -> u8 {
    let Some(binary) = binary else {
        return 3;
    };
    match binary.file_type {
        BinaryType::Dylib if binary.is_installed() => 0,
        BinaryType::Dylib | BinaryType::DylibStub | BinaryType::Bundle => 1,
        BinaryType::Executable => 2,
        BinaryType::Unknown => 3,
    }
}

/// A record borrowed from an input [`crate::api::API`].
#[derive(Debug)]
pub struct MapEntry<'a, R> {
    /// The record
    pub record: &'a R,
    /// Binary the record was read from
    pub binary: Option<&'a BinaryInfo>,
    /// Owning project
    pub project: &'a str,
    /// Input source
    pub source: SourceId,
}

impl<R> Clone for MapEntry<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for MapEntry<'_, R> {}

impl<'a, R: Ranked> MapEntry<'a, R> {
    /// Returns the rank key.
    pub fn rank(&self) -> RankKey {
        let base = self.record.base();
        RankKey {
            access: Reverse(base.access),
            unavailable: !base.availability.is_available(),
            binary_kind: binary_kind_rank(self.binary),
            missing_install_name: self.binary.map_or(true, |b| b.install_name.is_empty()),
        }
    }

    /// Returns true if both entries come from the same binary and project.
    pub fn same_source(&self, other: &Self) -> bool {
        let name = |e: &Self| e.binary.map(BinaryInfo::display_name);
        self.project == other.project && name(self) == name(other)
    }

    /// Names the source for diagnostics.
    pub fn source_name(&self) -> &'a str {
        match self.binary {
            Some(binary) => binary.display_name(),
            None if !self.project.is_empty() => self.project,
            None => "<headers>",
        }
    }
}

/// State of one canonical key.
#[derive(Debug)]
pub enum EntryState<'a, R> {
    /// One best-ranked definition
    Unique(MapEntry<'a, R>),
    /// Two conflicting definitions of equal rank. Terminal.
    Poisoned,
}

/// Result of offering a candidate to a key.
#[derive(Debug)]
pub enum InsertOutcome<'a, R> {
    /// The candidate is now the unique entry
    Inserted,
    /// The existing state was kept
    Kept,
    /// The candidate conflicted with `existing` and poisoned the key
    Poisoned {
        /// Entry that held the key before
        existing: MapEntry<'a, R>,
    },
}

/// Offers `candidate` for `key`.
pub fn insert_entry<'a, K: Ord, R: Ranked>(
    table: &mut BTreeMap<K, EntryState<'a, R>>,
    key: K,
    candidate: MapEntry<'a, R>,
) -> InsertOutcome<'a, R> {
    let mut slot = match table.entry(key) {
        Entry::Vacant(vacant) => {
            vacant.insert(EntryState::Unique(candidate));
            return InsertOutcome::Inserted;
        }
        Entry::Occupied(slot) => slot,
    };

    let existing = match slot.get() {
        EntryState::Poisoned => return InsertOutcome::Kept,
        EntryState::Unique(existing) => *existing,
    };

    match candidate.rank().cmp(&existing.rank()) {
        Ordering::Less => {
            *slot.get_mut() = EntryState::Unique(candidate);
            InsertOutcome::Inserted
        }
        Ordering::Greater => InsertOutcome::Kept,
        Ordering::Equal
            if existing.same_source(&candidate)
                || existing.record.tolerates_duplicate(candidate.record) =>
        {
            InsertOutcome::Kept
        }
        Ordering::Equal => {
            *slot.get_mut() = EntryState::Poisoned;
            InsertOutcome::Poisoned { existing }
        }
    }
}
