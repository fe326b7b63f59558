//! Canonical per-target tables.
//!
//! A [`CanonicalTarget`] owns clones of the winning records of every key,
//! remembers which keys were poisoned and carries the header updates and
//! access propagation that run after all inputs were ranked.

use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use tracing::debug;

use super::entry::{EntryState, SourceId};
use super::json::{ContentRoot, Sdkdb, TargetApis};
use crate::api::{
    API, Access, Availability, BinaryInfo, EnumRecord, GlobalRecord, ObjCCategoryRecord,
    ObjCContainerRecord, ObjCInterfaceRecord, ObjCMethodRecord, ObjCProtocolRecord,
    TypedefRecord,
};
use crate::diag::{DiagParam, Diagnostic, DiagnosticKind, Diagnostics};

/// One input of a target: a binary slice or a header set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Source {
    /// Binary identity; `None` for header-derived input
    pub binary: Option<BinaryInfo>,
    /// Owning project
    pub project: String,
    /// Potentially defined selectors recorded for this input
    pub selectors: BTreeSet<String>,
}

impl Source {
    /// Returns the install name or path, or an empty string for headers.
    pub fn display_name(&self) -> &str {
        self.binary.as_ref().map_or("", BinaryInfo::display_name)
    }
}

/// A winning record and the input it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalEntry<R> {
    /// Owned clone of the record
    pub record: R,
    /// Input source
    pub source: SourceId,
}

/// Winners of one record kind plus the set of poisoned keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table<K, R> {
    entries: BTreeMap<K, CanonicalEntry<R>>,
    poisoned: BTreeSet<K>,
}

impl<K: Ord, R> Default for Table<K, R> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            poisoned: BTreeSet::new(),
        }
    }
}

impl<K: Ord, R: Clone> Table<K, R> {
    /// Materializes the ranked states of one kind.
    pub(crate) fn from_states(states: BTreeMap<K, EntryState<'_, R>>) -> Self {
        let mut table = Self::default();
        for (key, state) in states {
            match state {
                EntryState::Unique(entry) => {
                    table.entries.insert(
                        key,
                        CanonicalEntry {
                            record: entry.record.clone(),
                            source: entry.source,
                        },
                    );
                }
                EntryState::Poisoned => {
                    table.poisoned.insert(key);
                }
            }
        }
        table
    }
}

impl<K: Ord, R> Table<K, R> {
    /// Returns the entry for `key`; `None` when absent or poisoned.
    pub fn get<Q>(&self, key: &Q) -> Option<&CanonicalEntry<R>>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.entries.get(key)
    }

    /// Returns the entry for `key` for update.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut CanonicalEntry<R>>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.entries.get_mut(key)
    }

    /// Returns true if conflicting definitions poisoned `key`.
    pub fn is_poisoned<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.poisoned.contains(key)
    }

    /// Iterates the winners in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &CanonicalEntry<R>)> {
        self.entries.iter()
    }

    /// Iterates the poisoned keys in order.
    pub fn poisoned_keys(&self) -> impl Iterator<Item = &K> {
        self.poisoned.iter()
    }

    /// Returns the number of winners.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no winners.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts a winner directly.
    pub fn insert(&mut self, key: K, entry: CanonicalEntry<R>) {
        self.entries.insert(key, entry);
    }

    /// Marks `key` as conflicting, dropping any winner.
    pub fn poison(&mut self, key: K) {
        self.entries.remove(&key);
        self.poisoned.insert(key);
    }
}

/// Names an ObjC container within a target.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContainerKey {
    /// `@interface Name`
    Interface(String),
    /// `@interface Class (Name)`
    Category(String, String),
    /// `@protocol Name`
    Protocol(String),
}

impl fmt::Display for ContainerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interface(name) => f.write_str(name),
            Self::Category(class, name) => write!(f, "{}({})", class, name),
            Self::Protocol(name) => write!(f, "<{}>", name),
        }
    }
}

/// `-[Class sel]` style name of a method in a container.
pub(crate) fn method_display_name(key: &ContainerKey, selector: &str, is_instance: bool) -> String {
    format!("{}[{} {}]", if is_instance { '-' } else { '+' }, key, selector)
}

fn resolve_access(declared: Access, inherited: Access) -> Access {
    if declared == Access::Unknown {
        inherited
    } else {
        declared
    }
}

/// A selector a header declares on a container.
struct Accessor {
    selector: String,
    types: String,
    is_instance: bool,
    is_optional: bool,
    access: Access,
    availability: Availability,
}

/// Canonical tables of one target triple.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalTarget {
    /// Target triple
    pub target: String,
    /// Inputs, indexed by [`SourceId`]
    pub sources: Vec<Source>,
    /// Globals
    pub globals: Table<String, GlobalRecord>,
    /// Interfaces
    pub interfaces: Table<String, ObjCInterfaceRecord>,
    /// Categories keyed by `(interface, category)`
    pub categories: Table<(String, String), ObjCCategoryRecord>,
    /// Protocols
    pub protocols: Table<String, ObjCProtocolRecord>,
    /// Enums
    pub enums: Table<String, EnumRecord>,
    /// Typedefs
    pub typedefs: Table<String, TypedefRecord>,
}

impl CanonicalTarget {
    /// Creates empty tables for a target.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    /// Returns an input source.
    pub fn source(&self, id: SourceId) -> Option<&Source> {
        self.sources.get(id.0)
    }

    /// Returns the binary an input came from.
    pub fn binary(&self, id: SourceId) -> Option<&BinaryInfo> {
        self.source(id).and_then(|s| s.binary.as_ref())
    }

    /// Returns the install name of an input, or an empty string.
    pub fn install_name(&self, id: SourceId) -> &str {
        self.source(id).map_or("", Source::display_name)
    }

    /// Returns the union of the potentially defined selectors.
    pub fn potentially_defined_selectors(&self) -> BTreeSet<&str> {
        self.sources
            .iter()
            .flat_map(|s| s.selectors.iter().map(String::as_str))
            .collect()
    }

    fn report(
        &self,
        diags: &mut Diagnostics,
        kind: DiagnosticKind,
        install_name: &str,
        params: Vec<DiagParam>,
    ) {
        diags.report(Diagnostic::new(kind, self.target.as_str(), install_name, params));
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    fn lookup<'t, K, R>(
        &'t self,
        table: &'t Table<K, R>,
        key: &K,
        name: &str,
        diags: &mut Diagnostics,
    ) -> Option<&'t R>
    where
        K: Ord,
    {
        if table.is_poisoned(key) {
            self.report(
                diags,
                DiagnosticKind::ConflictingDefinition,
                "",
                vec![DiagParam::name(name)],
            );
            return None;
        }
        table.get(key).map(|e| &e.record)
    }

    /// Looks up a global. A poisoned key is diagnosed and yields `None`.
    pub fn lookup_global(&self, name: &str, diags: &mut Diagnostics) -> Option<&GlobalRecord> {
        self.lookup(&self.globals, &name.to_string(), name, diags)
    }

    /// Looks up an interface. A poisoned key is diagnosed and yields `None`.
    pub fn lookup_interface(
        &self,
        name: &str,
        diags: &mut Diagnostics,
    ) -> Option<&ObjCInterfaceRecord> {
        self.lookup(&self.interfaces, &name.to_string(), name, diags)
    }

    /// Looks up a category. A poisoned key is diagnosed and yields `None`.
    pub fn lookup_category(
        &self,
        interface: &str,
        name: &str,
        diags: &mut Diagnostics,
    ) -> Option<&ObjCCategoryRecord> {
        let key = (interface.to_string(), name.to_string());
        let display = ContainerKey::Category(key.0.clone(), key.1.clone()).to_string();
        self.lookup(&self.categories, &key, &display, diags)
    }

    /// Looks up a protocol. A poisoned key is diagnosed and yields `None`.
    pub fn lookup_protocol(
        &self,
        name: &str,
        diags: &mut Diagnostics,
    ) -> Option<&ObjCProtocolRecord> {
        self.lookup(&self.protocols, &name.to_string(), name, diags)
    }

    /// Returns the members of a container, ignoring poisoned keys silently.
    pub fn container(&self, key: &ContainerKey) -> Option<&ObjCContainerRecord> {
        match key {
            ContainerKey::Interface(name) => {
                self.interfaces.get(name.as_str()).map(|e| &e.record.container)
            }
            ContainerKey::Category(class, name) => self
                .categories
                .get(&(class.clone(), name.clone()))
                .map(|e| &e.record.container),
            ContainerKey::Protocol(name) => {
                self.protocols.get(name.as_str()).map(|e| &e.record.container)
            }
        }
    }

    fn container_mut(&mut self, key: &ContainerKey) -> Option<&mut ObjCContainerRecord> {
        match key {
            ContainerKey::Interface(name) => self
                .interfaces
                .get_mut(name.as_str())
                .map(|e| &mut e.record.container),
            ContainerKey::Category(class, name) => self
                .categories
                .get_mut(&(class.clone(), name.clone()))
                .map(|e| &mut e.record.container),
            ContainerKey::Protocol(name) => self
                .protocols
                .get_mut(name.as_str())
                .map(|e| &mut e.record.container),
        }
    }

    fn container_source(&self, key: &ContainerKey) -> Option<SourceId> {
        match key {
            ContainerKey::Interface(name) => self.interfaces.get(name.as_str()).map(|e| e.source),
            ContainerKey::Category(class, name) => self
                .categories
                .get(&(class.clone(), name.clone()))
                .map(|e| e.source),
            ContainerKey::Protocol(name) => self.protocols.get(name.as_str()).map(|e| e.source),
        }
    }

    fn is_container_poisoned(&self, key: &ContainerKey) -> bool {
        match key {
            ContainerKey::Interface(name) => self.interfaces.is_poisoned(name.as_str()),
            ContainerKey::Category(class, name) => {
                self.categories.is_poisoned(&(class.clone(), name.clone()))
            }
            ContainerKey::Protocol(name) => self.protocols.is_poisoned(name.as_str()),
        }
    }

    /// Iterates the categories extending `class`.
    pub fn categories_of<'s>(&'s self, class: &'s str) -> impl Iterator<Item = ContainerKey> + 's {
        self.categories
            .iter()
            .filter(move |((interface, _), _)| interface == class)
            .map(|((interface, name), _)| ContainerKey::Category(interface.clone(), name.clone()))
    }

    /// Finds the container that implements a selector for `key`.
    ///
    /// Category lookups fall back to the base class; class lookups fall back
    /// to every category of the class.
    fn find_method_owner(
        &self,
        key: &ContainerKey,
        selector: &str,
        is_instance: bool,
    ) -> Option<ContainerKey> {
        let implements = |k: &ContainerKey| {
            self.container(k)
                .is_some_and(|c| c.find_method(selector, is_instance).is_some())
        };

        if implements(key) {
            return Some(key.clone());
        }
        match key {
            ContainerKey::Category(class, _) => {
                let base = ContainerKey::Interface(class.clone());
                implements(&base).then_some(base)
            }
            ContainerKey::Interface(class) => self.categories_of(class).find(|k| implements(k)),
            ContainerKey::Protocol(_) => None,
        }
    }

    // =========================================================================
    // Header updates
    // =========================================================================

    /// Applies the declarations of a header-derived API.
    ///
    /// Access and availability are copied onto the matching binary records.
    /// Declarations with no binary counterpart are diagnosed unless they are
    /// unavailable.
    pub fn apply_header_api(&mut self, api: &API, root: ContentRoot, diags: &mut Diagnostics) {
        let default_access = root.default_access();

        for global in api.globals.values() {
            let name = global.base.name.as_str();
            let poisoned = self.globals.is_poisoned(name);
            match self.globals.get_mut(name) {
                Some(entry) => {
                    entry.record.base.access = resolve_access(global.base.access, default_access);
                    entry.record.base.availability = global.base.availability;
                    if global.base.loc.is_some() {
                        entry.record.base.loc = global.base.loc.clone();
                    }
                }
                None if poisoned => self.report(
                    diags,
                    DiagnosticKind::ConflictingDefinition,
                    "",
                    vec![DiagParam::name(name)],
                ),
                None if global.base.availability.is_available() => self.report(
                    diags,
                    DiagnosticKind::MissingFromBinary,
                    "",
                    vec![DiagParam::name(name)],
                ),
                None => {}
            }
        }

        for (name, interface) in &api.interfaces {
            let key = ContainerKey::Interface(name.clone());
            self.update_objc_container(&key, &interface.container, default_access, diags);
        }
        for ((class, name), category) in &api.categories {
            let key = ContainerKey::Category(class.clone(), name.clone());
            self.update_objc_container(&key, &category.container, default_access, diags);
        }
        for (name, protocol) in &api.protocols {
            let key = ContainerKey::Protocol(name.clone());
            self.update_objc_container(&key, &protocol.container, default_access, diags);
        }
    }

    /// Reconciles a header container with its binary counterpart.
    ///
    /// Every declared method and every accessor implied by a declared
    /// property is located in the binary. Matches receive the header access
    /// and availability; misses are synthesized with `missing_from_binary`
    /// set and diagnosed unless optional or unavailable.
    pub fn update_objc_container(
        &mut self,
        key: &ContainerKey,
        header: &ObjCContainerRecord,
        default_access: Access,
        diags: &mut Diagnostics,
    ) {
        let access = resolve_access(header.base.access, default_access);
        let install_name = self
            .container_source(key)
            .map(|id| self.install_name(id).to_string())
            .unwrap_or_default();

        match self.container_mut(key) {
            Some(container) => {
                container.base.access = access;
                container.base.availability = header.base.availability;
                if header.base.loc.is_some() {
                    container.base.loc = header.base.loc.clone();
                }
            }
            None => {
                if self.is_container_poisoned(key) {
                    self.report(
                        diags,
                        DiagnosticKind::ConflictingDefinition,
                        "",
                        vec![DiagParam::name(key.to_string())],
                    );
                } else if header.base.availability.is_available() {
                    self.report(
                        diags,
                        DiagnosticKind::MissingFromBinary,
                        "",
                        vec![DiagParam::name(key.to_string())],
                    );
                }
                return;
            }
        }

        let mut accessors: Vec<Accessor> = header
            .methods
            .iter()
            .map(|method| Accessor {
                selector: method.base.name.clone(),
                types: method.types.clone(),
                is_instance: method.is_instance,
                is_optional: method.is_optional,
                access: resolve_access(method.base.access, access),
                availability: method.base.availability,
            })
            .collect();

        for property in &header.properties {
            let property_access = resolve_access(property.base.access, access);
            let is_class = property.attributes.class;
            if let Some(binary) = self
                .container_mut(key)
                .and_then(|c| c.find_property_mut(&property.base.name, is_class))
            {
                binary.base.access = property_access;
                binary.base.availability = property.base.availability;
            }

            let accessor = |selector: String| Accessor {
                selector,
                types: String::new(),
                is_instance: !is_class,
                is_optional: false,
                access: property_access,
                availability: property.base.availability,
            };
            accessors.push(accessor(property.getter_name()));
            if let Some(setter) = property.setter_name() {
                accessors.push(accessor(setter));
            }
        }

        for accessor in accessors {
            let owner = self.find_method_owner(key, &accessor.selector, accessor.is_instance);
            if let Some(owner) = owner {
                if let Some(method) = self
                    .container_mut(&owner)
                    .and_then(|c| c.find_method_mut(&accessor.selector, accessor.is_instance))
                {
                    method.base.access = accessor.access;
                    method.base.availability = accessor.availability;
                }
                continue;
            }

            if !accessor.is_optional && accessor.availability.is_available() {
                let name = method_display_name(key, &accessor.selector, accessor.is_instance);
                self.report(
                    diags,
                    DiagnosticKind::MissingFromBinary,
                    &install_name,
                    vec![DiagParam::Name(name)],
                );
            }

            let mut method =
                ObjCMethodRecord::new(accessor.selector, accessor.types, accessor.is_instance);
            method.is_optional = accessor.is_optional;
            method.missing_from_binary = true;
            method.base.access = accessor.access;
            method.base.availability = accessor.availability;
            if let Some(container) = self.container_mut(key) {
                container.add_method(method);
            }
        }
    }

    // =========================================================================
    // Access propagation
    // =========================================================================

    /// Returns the highest access any declaration of a selector reachable
    /// from `key` carries.
    ///
    /// Walks conformed protocols, the superclass chain and the categories of
    /// each class. Each container is visited at most once, so cyclic
    /// conformance terminates.
    pub fn get_access_for_objc_method(
        &self,
        key: &ContainerKey,
        selector: &str,
        is_instance: bool,
    ) -> Access {
        let mut visited = HashSet::new();
        self.method_access(key, selector, is_instance, &mut visited)
    }

    fn method_access(
        &self,
        key: &ContainerKey,
        selector: &str,
        is_instance: bool,
        visited: &mut HashSet<ContainerKey>,
    ) -> Access {
        if !visited.insert(key.clone()) {
            return Access::Unknown;
        }
        let Some(container) = self.container(key) else {
            return Access::Unknown;
        };

        let mut access = container
            .find_method(selector, is_instance)
            .map_or(Access::Unknown, |m| m.base.access);

        for protocol in &container.protocols {
            let protocol = ContainerKey::Protocol(protocol.clone());
            access = access.max(self.method_access(&protocol, selector, is_instance, visited));
        }

        if let ContainerKey::Interface(class) = key {
            if let Some(interface) = self.interfaces.get(class.as_str()) {
                let super_class = &interface.record.super_class;
                if !super_class.is_empty() {
                    let parent = ContainerKey::Interface(super_class.clone());
                    access = access.max(self.method_access(&parent, selector, is_instance, visited));
                }
            }
            let categories: Vec<_> = self.categories_of(class).collect();
            for category in categories {
                access = access.max(self.method_access(&category, selector, is_instance, visited));
            }
        }
        access
    }

    /// Raises every interface and category method to the access of its most
    /// accessible declaration.
    pub fn propagate_access(&mut self) {
        let keys: Vec<ContainerKey> = self
            .interfaces
            .iter()
            .map(|(name, _)| ContainerKey::Interface(name.clone()))
            .chain(
                self.categories
                    .iter()
                    .map(|((class, name), _)| ContainerKey::Category(class.clone(), name.clone())),
            )
            .collect();

        let mut updates = Vec::new();
        for key in keys {
            let Some(container) = self.container(&key) else {
                continue;
            };
            for method in &container.methods {
                let access =
                    self.get_access_for_objc_method(&key, &method.base.name, method.is_instance);
                if access > method.base.access {
                    updates.push((key.clone(), method.base.name.clone(), method.is_instance, access));
                }
            }
        }

        debug!("{}: raising access of {} methods", self.target, updates.len());
        for (key, selector, is_instance, access) in updates {
            if let Some(method) = self
                .container_mut(&key)
                .and_then(|c| c.find_method_mut(&selector, is_instance))
            {
                method.base.access = access;
            }
        }
    }

    // =========================================================================
    // Output
    // =========================================================================

    /// Regroups the winners by input source.
    pub fn to_target_apis(&self) -> TargetApis {
        let mut apis: Vec<API> = self
            .sources
            .iter()
            .map(|source| {
                let mut api = API::new(self.target.as_str());
                api.project_name = source.project.clone();
                api.binary = source.binary.clone();
                api.potentially_defined_selectors = source.selectors.clone();
                api
            })
            .collect();

        for (name, entry) in self.globals.iter() {
            apis[entry.source.0].globals.insert(name.clone(), entry.record.clone());
        }
        for (name, entry) in self.interfaces.iter() {
            apis[entry.source.0].interfaces.insert(name.clone(), entry.record.clone());
        }
        for (key, entry) in self.categories.iter() {
            apis[entry.source.0].categories.insert(key.clone(), entry.record.clone());
        }
        for (name, entry) in self.protocols.iter() {
            apis[entry.source.0].protocols.insert(name.clone(), entry.record.clone());
        }
        for (name, entry) in self.enums.iter() {
            apis[entry.source.0].enums.insert(name.clone(), entry.record.clone());
        }
        for (name, entry) in self.typedefs.iter() {
            apis[entry.source.0].typedefs.insert(name.clone(), entry.record.clone());
        }

        let mut target = TargetApis::default();
        for api in apis {
            if api.binary.is_some() {
                target.runtime_root.push(api);
            } else if !api.is_empty() {
                target.sdk_content_root.push(api);
            }
        }
        target
    }
}

/// Canonical tables of every target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalSdk {
    /// Project name carried into the output
    pub project_name: Option<String>,
    /// Tables per target triple
    pub targets: BTreeMap<String, CanonicalTarget>,
}

impl CanonicalSdk {
    /// Converts back to the JSON model.
    pub fn to_sdkdb(&self, has_error: bool) -> Sdkdb {
        let mut db = Sdkdb::new(self.project_name.clone());
        db.error = has_error.then_some(true);
        for (name, target) in &self.targets {
            db.targets.insert(name.clone(), target.to_target_apis());
        }
        db
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{APIRecord, BinaryType, ObjCPropertyRecord};
    use pretty_assertions::assert_eq;

    fn interface(name: &str, super_class: &str, protocols: &[&str]) -> ObjCInterfaceRecord {
        let mut record = ObjCInterfaceRecord::new(name);
        record.super_class = super_class.to_string();
        record.container.protocols = protocols.iter().map(|p| p.to_string()).collect();
        record
    }

    fn protocol(name: &str, protocols: &[&str]) -> ObjCProtocolRecord {
        let mut record = ObjCProtocolRecord::new(name);
        record.container.protocols = protocols.iter().map(|p| p.to_string()).collect();
        record
    }

    fn method(selector: &str, access: Access) -> ObjCMethodRecord {
        let mut record = ObjCMethodRecord::new(selector, "v16@0:8", true);
        record.base.access = access;
        record
    }

    fn target() -> CanonicalTarget {
        let mut target = CanonicalTarget::new("arm64-apple-macos14.0");
        target.sources.push(Source {
            binary: Some(BinaryInfo {
                file_type: BinaryType::Dylib,
                install_name: "/usr/lib/libFoo.dylib".into(),
                ..Default::default()
            }),
            ..Default::default()
        });
        target
    }

    fn add_interface(target: &mut CanonicalTarget, record: ObjCInterfaceRecord) {
        target.interfaces.insert(
            record.name().to_string(),
            CanonicalEntry {
                record,
                source: SourceId(0),
            },
        );
    }

    fn add_protocol(target: &mut CanonicalTarget, record: ObjCProtocolRecord) {
        target.protocols.insert(
            record.name().to_string(),
            CanonicalEntry {
                record,
                source: SourceId(0),
            },
        );
    }

    #[test]
    fn test_self_conforming_protocol_terminates() {
        let mut target = target();
        let mut looped = protocol("Loop", &["Loop"]);
        looped.container.methods.push(method("spin", Access::Public));
        add_protocol(&mut target, looped);
        add_interface(&mut target, interface("Spinner", "", &["Loop"]));

        let key = ContainerKey::Protocol("Loop".into());
        assert_eq!(target.get_access_for_objc_method(&key, "spin", true), Access::Public);
        let key = ContainerKey::Interface("Spinner".into());
        assert_eq!(target.get_access_for_objc_method(&key, "spin", true), Access::Public);
        assert_eq!(target.get_access_for_objc_method(&key, "stop", true), Access::Unknown);
    }

    #[test]
    fn test_access_from_superclass_and_categories() {
        let mut target = target();
        let mut base = interface("Base", "", &[]);
        base.container.methods.push(method("draw", Access::Public));
        add_interface(&mut target, base);

        let mut derived = interface("Derived", "Base", &[]);
        derived.container.methods.push(method("draw", Access::Unknown));
        derived.container.methods.push(method("layout", Access::Unknown));
        add_interface(&mut target, derived);

        let mut category = ObjCCategoryRecord::new("Derived", "Layout");
        category.container.protocols.push("Layouting".into());
        target.categories.insert(
            ("Derived".into(), "Layout".into()),
            CanonicalEntry {
                record: category,
                source: SourceId(0),
            },
        );
        let mut layouting = protocol("Layouting", &[]);
        layouting.container.methods.push(method("layout", Access::Private));
        add_protocol(&mut target, layouting);

        target.propagate_access();
        let derived = target.container(&ContainerKey::Interface("Derived".into())).unwrap();
        assert_eq!(derived.find_method("draw", true).unwrap().base.access, Access::Public);
        assert_eq!(derived.find_method("layout", true).unwrap().base.access, Access::Private);
    }

    #[test]
    fn test_update_copies_access_and_synthesizes_missing() {
        let mut target = target();
        let mut binary = interface("Foo", "NSObject", &[]);
        binary.container.methods.push(method("bar", Access::Unknown));
        binary.container.methods.push(method("title", Access::Unknown));
        binary.container.properties.push(ObjCPropertyRecord::from_attributes("title", "T@", false));
        add_interface(&mut target, binary);

        let mut category = ObjCCategoryRecord::new("Foo", "Extras");
        category.container.methods.push(method("extra", Access::Unknown));
        target.categories.insert(
            ("Foo".into(), "Extras".into()),
            CanonicalEntry {
                record: category,
                source: SourceId(0),
            },
        );

        let mut header = ObjCContainerRecord::new("Foo");
        header.base.access = Access::Public;
        header.methods.push(method("bar", Access::Unknown));
        header.methods.push(method("extra", Access::Unknown));
        header.methods.push(method("gone", Access::Unknown));
        let mut optional = method("maybe", Access::Unknown);
        optional.is_optional = true;
        header.methods.push(optional);
        let mut retired = method("retired", Access::Unknown);
        retired.base.availability.unavailable = true;
        header.methods.push(retired);
        header.properties.push(ObjCPropertyRecord::from_attributes("title", "T@", false));

        let mut diags = Diagnostics::new();
        let key = ContainerKey::Interface("Foo".into());
        target.update_objc_container(&key, &header, Access::Private, &mut diags);

        let foo = target.container(&key).unwrap();
        assert_eq!(foo.base.access, Access::Public);
        assert_eq!(foo.find_method("bar", true).unwrap().base.access, Access::Public);
        assert!(!foo.find_method("bar", true).unwrap().missing_from_binary);
        assert!(foo.find_method("gone", true).unwrap().missing_from_binary);
        assert!(foo.find_method("setTitle:", true).unwrap().missing_from_binary);
        assert_eq!(foo.properties[0].base.access, Access::Public);

        // Found through the category fallback.
        assert!(foo.find_method("extra", true).is_none());
        let extras = target
            .container(&ContainerKey::Category("Foo".into(), "Extras".into()))
            .unwrap();
        assert_eq!(extras.find_method("extra", true).unwrap().base.access, Access::Public);

        let missing: Vec<_> = diags
            .of_kind(DiagnosticKind::MissingFromBinary)
            .map(|d| d.message())
            .collect();
        assert_eq!(
            missing,
            vec![
                "\"-[Foo gone]\" is declared in headers but missing from binary".to_string(),
                "\"-[Foo setTitle:]\" is declared in headers but missing from binary".to_string(),
            ]
        );
        assert_eq!(diags.entries()[0].install_name, "/usr/lib/libFoo.dylib");
    }

    #[test]
    fn test_poisoned_lookup_is_diagnosed() {
        let mut target = target();
        let mut states = BTreeMap::new();
        states.insert("Foo".to_string(), EntryState::<ObjCInterfaceRecord>::Poisoned);
        target.interfaces = Table::from_states(states);

        let mut diags = Diagnostics::new();
        assert!(target.lookup_interface("Foo", &mut diags).is_none());
        assert!(target.lookup_interface("Bar", &mut diags).is_none());
        assert_eq!(diags.of_kind(DiagnosticKind::ConflictingDefinition).count(), 1);

        let header = ObjCContainerRecord {
            base: APIRecord::new("Foo"),
            ..Default::default()
        };
        target.update_objc_container(
            &ContainerKey::Interface("Foo".into()),
            &header,
            Access::Public,
            &mut diags,
        );
        assert_eq!(diags.of_kind(DiagnosticKind::ConflictingDefinition).count(), 2);
        assert_eq!(diags.of_kind(DiagnosticKind::MissingFromBinary).count(), 0);
    }

    #[test]
    fn test_container_lookups() {
        let mut target = target();
        add_protocol(&mut target, protocol("FooCoding", &[]));
        let mut states = BTreeMap::new();
        states.insert(
            ("Foo".to_string(), "Extras".to_string()),
            EntryState::<ObjCCategoryRecord>::Poisoned,
        );
        target.categories = Table::from_states(states);

        let mut diags = Diagnostics::new();
        assert!(target.lookup_protocol("FooCoding", &mut diags).is_some());
        assert!(target.lookup_category("Foo", "Extras", &mut diags).is_none());
        assert_eq!(
            target.categories.poisoned_keys().collect::<Vec<_>>(),
            vec![&("Foo".to_string(), "Extras".to_string())]
        );
        assert_eq!(
            diags.entries()[0].message(),
            "\"Foo(Extras)\" has conflicting definitions and is ignored"
        );
    }
}
