//! Ranks input APIs into canonical tables.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, info};

use super::canonical::{CanonicalSdk, CanonicalTarget, Source, Table};
use super::entry::{insert_entry, EntryState, InsertOutcome, MapEntry, Ranked, SourceId};
use super::json::{ContentRoot, Sdkdb};
use crate::api::{
    BinaryInfo, EnumRecord, GlobalRecord, ObjCCategoryRecord, ObjCInterfaceRecord,
    ObjCProtocolRecord, TypedefRecord, API,
};
use crate::diag::{DiagParam, Diagnostic, DiagnosticKind, Diagnostics};

struct SourceInput<'a> {
    binary: Option<&'a BinaryInfo>,
    project: &'a str,
    selectors: BTreeSet<&'a str>,
}

#[derive(Default)]
struct TargetEntries<'a> {
    sources: Vec<SourceInput<'a>>,
    source_ids: HashMap<(Option<&'a str>, &'a str), SourceId>,
    globals: BTreeMap<String, EntryState<'a, GlobalRecord>>,
    interfaces: BTreeMap<String, EntryState<'a, ObjCInterfaceRecord>>,
    categories: BTreeMap<(String, String), EntryState<'a, ObjCCategoryRecord>>,
    protocols: BTreeMap<String, EntryState<'a, ObjCProtocolRecord>>,
    enums: BTreeMap<String, EntryState<'a, EnumRecord>>,
    typedefs: BTreeMap<String, EntryState<'a, TypedefRecord>>,
    headers: Vec<(&'a API, ContentRoot)>,
}

impl<'a> TargetEntries<'a> {
    /// Returns the source id for an API; identical inputs share one id.
    fn source_for(&mut self, api: &'a API) -> SourceId {
        let binary = api.binary.as_ref();
        let identity = (binary.map(BinaryInfo::display_name), api.project_name.as_str());
        if let Some(&id) = self.source_ids.get(&identity) {
            return id;
        }
        let id = SourceId(self.sources.len());
        self.sources.push(SourceInput {
            binary,
            project: &api.project_name,
            selectors: BTreeSet::new(),
        });
        self.source_ids.insert(identity, id);
        id
    }
}

/// Offers one record and diagnoses a resulting poison.
fn offer<'a, K: Ord, R: Ranked>(
    target: &str,
    table: &mut BTreeMap<K, EntryState<'a, R>>,
    key: K,
    name: &str,
    candidate: MapEntry<'a, R>,
    diags: &mut Diagnostics,
) {
    if let InsertOutcome::Poisoned { existing } = insert_entry(table, key, candidate) {
        diags.report(Diagnostic::new(
            DiagnosticKind::DuplicateDefinition,
            target,
            candidate.source_name(),
            vec![
                DiagParam::name(name),
                DiagParam::str(existing.source_name()),
                DiagParam::str(candidate.source_name()),
            ],
        ));
    }
}

/// Collects APIs and ranks every key.
///
/// Inputs must be added in a deterministic order; ties between equally
/// ranked candidates poison the key regardless of order, but diagnostics
/// are reported in insertion order.
#[derive(Default)]
pub struct SdkdbBuilder<'a> {
    project_name: Option<String>,
    targets: BTreeMap<String, TargetEntries<'a>>,
}

impl<'a> SdkdbBuilder<'a> {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the project name written to the output.
    pub fn set_project_name(&mut self, name: impl Into<String>) {
        self.project_name = Some(name.into());
    }

    /// Adds every API of a database.
    pub fn add_sdkdb(&mut self, db: &'a Sdkdb, diags: &mut Diagnostics) {
        if self.project_name.is_none() {
            self.project_name = db.project_name.clone();
        }
        for (target, apis) in &db.targets {
            for root in [ContentRoot::Runtime, ContentRoot::Sdk, ContentRoot::PublicSdk] {
                for api in apis.root(root) {
                    self.add_target_api(target, api, root, diags);
                }
            }
        }
    }

    /// Adds one API under its own target triple.
    pub fn add_api(&mut self, api: &'a API, root: ContentRoot, diags: &mut Diagnostics) {
        self.add_target_api(&api.target, api, root, diags);
    }

    fn add_target_api(
        &mut self,
        target: &str,
        api: &'a API,
        root: ContentRoot,
        diags: &mut Diagnostics,
    ) {
        let entries = self.targets.entry(target.to_string()).or_default();
        let source = entries.source_for(api);
        let (binary, project) = {
            let input = &entries.sources[source.0];
            (input.binary, input.project)
        };

        macro_rules! map_entry {
            ($record:expr) => {
                MapEntry {
                    record: $record,
                    binary,
                    project,
                    source,
                }
            };
        }

        for (name, record) in &api.enums {
            offer(target, &mut entries.enums, name.clone(), name, map_entry!(record), diags);
        }
        for (name, record) in &api.typedefs {
            offer(target, &mut entries.typedefs, name.clone(), name, map_entry!(record), diags);
        }

        if root != ContentRoot::Runtime {
            entries.headers.push((api, root));
            return;
        }

        debug!(
            "{}: ranking {} from {}",
            target,
            api.globals.len() + api.interfaces.len() + api.categories.len() + api.protocols.len(),
            api.binary.as_ref().map_or("<unknown>", BinaryInfo::display_name)
        );

        for (name, record) in &api.globals {
            offer(target, &mut entries.globals, name.clone(), name, map_entry!(record), diags);
        }
        for (name, record) in &api.interfaces {
            let entry = map_entry!(record);
            offer(target, &mut entries.interfaces, name.clone(), name, entry, diags);
        }
        for ((class, category), record) in &api.categories {
            let display = format!("{}({})", class, category);
            let key = (class.clone(), category.clone());
            offer(target, &mut entries.categories, key, &display, map_entry!(record), diags);
        }
        for (name, record) in &api.protocols {
            let entry = map_entry!(record);
            offer(target, &mut entries.protocols, name.clone(), name, entry, diags);
        }

        entries.sources[source.0]
            .selectors
            .extend(api.potentially_defined_selectors.iter().map(String::as_str));
    }

    /// Materializes the canonical tables, then applies header declarations
    /// in insertion order and propagates method access.
    pub fn build(self, diags: &mut Diagnostics) -> CanonicalSdk {
        let mut sdk = CanonicalSdk {
            project_name: self.project_name,
            targets: BTreeMap::new(),
        };

        for (name, entries) in self.targets {
            let mut target = CanonicalTarget::new(name.as_str());
            target.sources = entries
                .sources
                .iter()
                .map(|s| Source {
                    binary: s.binary.cloned(),
                    project: s.project.to_string(),
                    selectors: s.selectors.iter().map(|s| s.to_string()).collect(),
                })
                .collect();
            target.globals = Table::from_states(entries.globals);
            target.interfaces = Table::from_states(entries.interfaces);
            target.categories = Table::from_states(entries.categories);
            target.protocols = Table::from_states(entries.protocols);
            target.enums = Table::from_states(entries.enums);
            target.typedefs = Table::from_states(entries.typedefs);

            for (api, root) in entries.headers {
                target.apply_header_api(api, root, diags);
            }
            target.propagate_access();

            info!(
                "{}: {} globals, {} interfaces, {} categories, {} protocols",
                name,
                target.globals.len(),
                target.interfaces.len(),
                target.categories.len(),
                target.protocols.len()
            );
            sdk.targets.insert(name, target);
        }
        sdk
    }
}
