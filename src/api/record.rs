//! API record graph.
//!
//! Records are owned by their [`API`] in ordered maps. Cross references
//! (superclass, conformed protocols, category interface) are stored by name.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::macho::{MH_BUNDLE, MH_DYLIB, MH_DYLIB_STUB, MH_EXECUTE};

// =============================================================================
// Scalars
// =============================================================================

/// Declared access level. Ordered from least to most accessible.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    /// Not declared in any header
    #[default]
    Unknown,
    /// Declared in a private header
    Private,
    /// Declared in a project header
    Project,
    /// Declared in a public header
    Public,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "unknown",
            Self::Private => "private",
            Self::Project => "project",
            Self::Public => "public",
        })
    }
}

/// Symbol linkage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    /// Unknown
    #[default]
    Unknown,
    /// Defined but not exported
    Internal,
    /// Referenced from another image
    External,
    /// Exported from this image
    Exported,
    /// Re-exported from a dependent image
    Reexported,
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "unknown",
            Self::Internal => "internal",
            Self::External => "external",
            Self::Exported => "exported",
            Self::Reexported => "reexported",
        })
    }
}

/// A `xxxx.yy.zz` version packed as `major << 16 | minor << 8 | patch`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "String", try_from = "String")]
pub struct PackedVersion(pub u32);

impl PackedVersion {
    /// Packs a version from its components.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self((major << 16) | ((minor & 0xFF) << 8) | (patch & 0xFF))
    }

    /// Returns the major component.
    pub const fn major(self) -> u32 {
        self.0 >> 16
    }

    /// Returns the minor component.
    pub const fn minor(self) -> u32 {
        (self.0 >> 8) & 0xFF
    }

    /// Returns the patch component.
    pub const fn patch(self) -> u32 {
        self.0 & 0xFF
    }

    /// Returns true for `0.0`.
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Parses `major[.minor[.patch]]`.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().split('.');
        let major: u32 = parts.next()?.parse().ok()?;
        let minor: u32 = parts.next().map_or(Some(0), |p| p.parse().ok())?;
        let patch: u32 = parts.next().map_or(Some(0), |p| p.parse().ok())?;
        if parts.next().is_some() || major > 0xFFFF || minor > 0xFF || patch > 0xFF {
            return None;
        }
        Some(Self::new(major, minor, patch))
    }
}

impl fmt::Display for PackedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major(), self.minor())?;
        if self.patch() != 0 {
            write!(f, ".{}", self.patch())?;
        }
        Ok(())
    }
}

impl From<PackedVersion> for String {
    fn from(version: PackedVersion) -> Self {
        version.to_string()
    }
}

impl TryFrom<String> for PackedVersion {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s).ok_or_else(|| Error::MalformedSdkdb(format!("invalid version '{}'", s)))
    }
}

/// Availability attributes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    /// Version the declaration was introduced in
    #[serde(default, skip_serializing_if = "PackedVersion::is_zero")]
    pub introduced: PackedVersion,
    /// Version the declaration was obsoleted in
    #[serde(default, skip_serializing_if = "PackedVersion::is_zero")]
    pub obsoleted: PackedVersion,
    /// Marked unavailable
    #[serde(default, skip_serializing_if = "is_false")]
    pub unavailable: bool,
}

impl Availability {
    /// Returns true unless marked unavailable.
    pub fn is_available(&self) -> bool {
        !self.unavailable
    }

    /// Returns true if no attribute is set.
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unavailable {
            return f.write_str("unavailable");
        }
        write!(f, "introduced={}", self.introduced)?;
        if !self.obsoleted.is_zero() {
            write!(f, " obsoleted={}", self.obsoleted)?;
        }
        Ok(())
    }
}

/// Header source location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Header path
    pub file: String,
    /// 1-based line
    pub line: u32,
}

fn is_false(value: &bool) -> bool {
    !*value
}

// =============================================================================
// Records
// =============================================================================

/// Fields shared by every record.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct APIRecord {
    /// Declaration name
    pub name: String,
    /// Declaring header location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<Location>,
    /// Availability
    #[serde(default, skip_serializing_if = "Availability::is_default")]
    pub availability: Availability,
    /// Access level
    #[serde(default)]
    pub access: Access,
    /// Linkage
    #[serde(default)]
    pub linkage: Linkage,
}

impl APIRecord {
    /// Creates a record with default attributes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Creates a record with the given linkage.
    pub fn with_linkage(name: impl Into<String>, linkage: Linkage) -> Self {
        Self {
            linkage,
            ..Self::new(name)
        }
    }
}

/// Kind of a global symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlobalKind {
    /// Code
    #[default]
    Function,
    /// Data
    Variable,
}

/// A global function or variable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalRecord {
    /// Common fields
    #[serde(flatten)]
    pub base: APIRecord,
    /// Function or variable
    #[serde(default)]
    pub kind: GlobalKind,
    /// Weak definition
    #[serde(default, skip_serializing_if = "is_false")]
    pub weak_defined: bool,
    /// Thread-local variable
    #[serde(default, skip_serializing_if = "is_false")]
    pub thread_local: bool,
}

/// An Objective-C method. The record name is the selector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjCMethodRecord {
    /// Common fields
    #[serde(flatten)]
    pub base: APIRecord,
    /// Type encoding
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub types: String,
    /// Instance (`-`) or class (`+`) method
    pub is_instance: bool,
    /// `@optional` protocol requirement
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_optional: bool,
    /// Implemented dynamically
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_dynamic: bool,
    /// Declared in headers but not found in the binary
    #[serde(default, skip_serializing_if = "is_false")]
    pub missing_from_binary: bool,
}

impl ObjCMethodRecord {
    /// Creates a method record.
    pub fn new(selector: impl Into<String>, types: impl Into<String>, is_instance: bool) -> Self {
        Self {
            base: APIRecord::new(selector),
            types: types.into(),
            is_instance,
            ..Self::default()
        }
    }

    /// Returns the selector.
    pub fn selector(&self) -> &str {
        &self.base.name
    }

    /// Returns `-sel` or `+sel`.
    pub fn display_name(&self) -> String {
        format!("{}{}", if self.is_instance { '-' } else { '+' }, self.base.name)
    }
}

/// Property attributes relevant to accessor synthesis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyAttributes {
    /// `readonly`
    #[serde(default, skip_serializing_if = "is_false")]
    pub readonly: bool,
    /// `@dynamic`
    #[serde(default, skip_serializing_if = "is_false")]
    pub dynamic: bool,
    /// `class` property
    #[serde(default, skip_serializing_if = "is_false")]
    pub class: bool,
}

/// An Objective-C property.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjCPropertyRecord {
    /// Common fields
    #[serde(flatten)]
    pub base: APIRecord,
    /// Attributes
    #[serde(flatten)]
    pub attributes: PropertyAttributes,
    /// Custom getter selector
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub getter: String,
    /// Custom setter selector
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub setter: String,
    /// Type encoding
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub types: String,
}

impl ObjCPropertyRecord {
    /// Decodes a runtime attribute string such as `T@"NSString",R,N,V_name`.
    pub fn from_attributes(name: impl Into<String>, attributes: &str, is_class: bool) -> Self {
        let mut record = Self {
            base: APIRecord::new(name),
            ..Self::default()
        };
        record.attributes.class = is_class;

        for attribute in attributes.split(',') {
            let mut chars = attribute.chars();
            match chars.next() {
                Some('T') => record.types = chars.as_str().to_string(),
                Some('R') => record.attributes.readonly = true,
                Some('D') => record.attributes.dynamic = true,
                Some('G') => record.getter = chars.as_str().to_string(),
                Some('S') => record.setter = chars.as_str().to_string(),
                _ => {}
            }
        }
        record
    }

    /// Returns the getter selector.
    pub fn getter_name(&self) -> String {
        if self.getter.is_empty() {
            self.base.name.clone()
        } else {
            self.getter.clone()
        }
    }

    /// Returns the setter selector, or `None` for readonly and dynamic
    /// properties.
    pub fn setter_name(&self) -> Option<String> {
        if self.attributes.readonly || self.attributes.dynamic {
            return None;
        }
        if !self.setter.is_empty() {
            return Some(self.setter.clone());
        }
        let mut chars = self.base.name.chars();
        let first = chars.next()?;
        Some(format!("set{}{}:", first.to_uppercase(), chars.as_str()))
    }
}

/// An Objective-C instance variable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjCInstanceVariableRecord {
    /// Common fields
    #[serde(flatten)]
    pub base: APIRecord,
    /// Type encoding
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub types: String,
    /// Byte offset in the instance
    #[serde(default)]
    pub offset: u32,
}

/// Members shared by interfaces, categories and protocols.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjCContainerRecord {
    /// Common fields
    #[serde(flatten)]
    pub base: APIRecord,
    /// Methods
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<ObjCMethodRecord>,
    /// Properties
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<ObjCPropertyRecord>,
    /// Instance variables
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ivars: Vec<ObjCInstanceVariableRecord>,
    /// Conformed protocol names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<String>,
}

impl ObjCContainerRecord {
    /// Creates an empty container.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: APIRecord::new(name),
            ..Self::default()
        }
    }

    /// Finds a method by selector and kind.
    pub fn find_method(&self, selector: &str, is_instance: bool) -> Option<&ObjCMethodRecord> {
        self.methods
            .iter()
            .find(|m| m.is_instance == is_instance && m.base.name == selector)
    }

    /// Finds a method by selector and kind for update.
    pub fn find_method_mut(
        &mut self,
        selector: &str,
        is_instance: bool,
    ) -> Option<&mut ObjCMethodRecord> {
        self.methods
            .iter_mut()
            .find(|m| m.is_instance == is_instance && m.base.name == selector)
    }

    /// Adds a method unless one with the same selector and kind exists.
    pub fn add_method(&mut self, method: ObjCMethodRecord) {
        if self.find_method(&method.base.name, method.is_instance).is_none() {
            self.methods.push(method);
        }
    }

    /// Finds a property by name and kind.
    pub fn find_property_mut(
        &mut self,
        name: &str,
        is_class: bool,
    ) -> Option<&mut ObjCPropertyRecord> {
        self.properties
            .iter_mut()
            .find(|p| p.attributes.class == is_class && p.base.name == name)
    }

    /// Returns the ivar named `name`, creating it if needed.
    pub fn ivar_mut(&mut self, name: &str) -> &mut ObjCInstanceVariableRecord {
        let index = match self.ivars.iter().position(|i| i.base.name == name) {
            Some(index) => index,
            None => {
                self.ivars.push(ObjCInstanceVariableRecord {
                    base: APIRecord::new(name),
                    ..Default::default()
                });
                self.ivars.len() - 1
            }
        };
        &mut self.ivars[index]
    }
}

/// An `@interface`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjCInterfaceRecord {
    /// Members
    #[serde(flatten)]
    pub container: ObjCContainerRecord,
    /// Superclass name; empty for root classes
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub super_class: String,
    /// Implemented in Swift
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_swift: bool,
    /// Exports an exception type symbol
    #[serde(default, skip_serializing_if = "is_false")]
    pub has_exception_type: bool,
    /// Names of categories extending this class in the same image
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

impl ObjCInterfaceRecord {
    /// Creates an empty interface.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            container: ObjCContainerRecord::new(name),
            ..Self::default()
        }
    }

    /// Returns the class name.
    pub fn name(&self) -> &str {
        &self.container.base.name
    }
}

/// An `@interface Class (Category)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjCCategoryRecord {
    /// Members
    #[serde(flatten)]
    pub container: ObjCContainerRecord,
    /// Extended class name
    pub interface: String,
}

impl ObjCCategoryRecord {
    /// Creates an empty category.
    pub fn new(interface: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            container: ObjCContainerRecord::new(name),
            interface: interface.into(),
        }
    }

    /// Returns the category name.
    pub fn name(&self) -> &str {
        &self.container.base.name
    }
}

/// A `@protocol`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjCProtocolRecord {
    /// Members
    #[serde(flatten)]
    pub container: ObjCContainerRecord,
}

impl ObjCProtocolRecord {
    /// Creates an empty protocol.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            container: ObjCContainerRecord::new(name),
        }
    }

    /// Returns the protocol name.
    pub fn name(&self) -> &str {
        &self.container.base.name
    }
}

/// An enum declared in a header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumRecord {
    /// Common fields
    #[serde(flatten)]
    pub base: APIRecord,
    /// Enumerators
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constants: Vec<APIRecord>,
}

/// A typedef declared in a header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedefRecord {
    /// Common fields
    #[serde(flatten)]
    pub base: APIRecord,
    /// Aliased type
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub underlying_type: String,
}

// =============================================================================
// Binary
// =============================================================================

/// Mach-O file type as far as ranking is concerned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryType {
    /// Anything else
    #[default]
    Unknown,
    /// `MH_EXECUTE`
    Executable,
    /// `MH_DYLIB`
    Dylib,
    /// `MH_DYLIB_STUB`
    DylibStub,
    /// `MH_BUNDLE`
    Bundle,
}

impl BinaryType {
    /// Maps a header `filetype`.
    pub fn from_filetype(filetype: u32) -> Self {
        match filetype {
            MH_EXECUTE => Self::Executable,
            MH_DYLIB => Self::Dylib,
            MH_DYLIB_STUB => Self::DylibStub,
            MH_BUNDLE => Self::Bundle,
            _ => Self::Unknown,
        }
    }
}

/// Identity of the binary an [`API`] was read from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryInfo {
    /// File type
    #[serde(default)]
    pub file_type: BinaryType,
    /// `LC_ID_DYLIB` install name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub install_name: String,
    /// Dylib current version
    #[serde(default, skip_serializing_if = "PackedVersion::is_zero")]
    pub current_version: PackedVersion,
    /// Dylib compatibility version
    #[serde(default, skip_serializing_if = "PackedVersion::is_zero")]
    pub compatibility_version: PackedVersion,
    /// Swift ABI version from the ObjC image info
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub swift_abi_version: String,
    /// `LC_SUB_FRAMEWORK` umbrella
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parent_umbrella: String,
    /// `MH_TWOLEVEL`
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_two_level_namespace: bool,
    /// `MH_APP_EXTENSION_SAFE`
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_app_extension_safe: bool,
    /// Path the binary was read from
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
}

impl BinaryInfo {
    /// Returns true for a dylib with an install name.
    pub fn is_installed(&self) -> bool {
        self.file_type == BinaryType::Dylib && !self.install_name.is_empty()
    }

    /// Returns the install name, or the path for unnamed binaries.
    pub fn display_name(&self) -> &str {
        if self.install_name.is_empty() {
            &self.path
        } else {
            &self.install_name
        }
    }
}

// =============================================================================
// API
// =============================================================================

/// Records stored in a keyed map and serialized as a plain list.
pub trait Keyed {
    /// Map key
    type Key: Ord;

    /// Returns the map key derived from the record itself.
    fn key(&self) -> Self::Key;
}

impl Keyed for GlobalRecord {
    type Key = String;
    fn key(&self) -> String {
        self.base.name.clone()
    }
}

impl Keyed for ObjCInterfaceRecord {
    type Key = String;
    fn key(&self) -> String {
        self.name().to_string()
    }
}

impl Keyed for ObjCCategoryRecord {
    type Key = (String, String);
    fn key(&self) -> (String, String) {
        (self.interface.clone(), self.name().to_string())
    }
}

impl Keyed for ObjCProtocolRecord {
    type Key = String;
    fn key(&self) -> String {
        self.name().to_string()
    }
}

impl Keyed for EnumRecord {
    type Key = String;
    fn key(&self) -> String {
        self.base.name.clone()
    }
}

impl Keyed for TypedefRecord {
    type Key = String;
    fn key(&self) -> String {
        self.base.name.clone()
    }
}

mod keyed_map {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::Keyed;

    pub fn serialize<S, R>(map: &BTreeMap<R::Key, R>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        R: Keyed + Serialize,
    {
        serializer.collect_seq(map.values())
    }

    pub fn deserialize<'de, D, R>(deserializer: D) -> Result<BTreeMap<R::Key, R>, D::Error>
    where
        D: Deserializer<'de>,
        R: Keyed + Deserialize<'de>,
    {
        let records = Vec::<R>::deserialize(deserializer)?;
        Ok(records.into_iter().map(|r| (r.key(), r)).collect())
    }
}

/// Every API one binary slice or header set provides for one target.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct API {
    /// Target triple
    #[serde(default)]
    pub target: String,
    /// Owning project
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub project_name: String,
    /// Source binary; absent for header-derived APIs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<BinaryInfo>,
    /// Global functions and variables
    #[serde(default, with = "keyed_map", skip_serializing_if = "BTreeMap::is_empty")]
    pub globals: BTreeMap<String, GlobalRecord>,
    /// Classes
    #[serde(default, with = "keyed_map", skip_serializing_if = "BTreeMap::is_empty")]
    pub interfaces: BTreeMap<String, ObjCInterfaceRecord>,
    /// Categories keyed by `(interface, category)`
    #[serde(default, with = "keyed_map", skip_serializing_if = "BTreeMap::is_empty")]
    pub categories: BTreeMap<(String, String), ObjCCategoryRecord>,
    /// Protocols
    #[serde(default, with = "keyed_map", skip_serializing_if = "BTreeMap::is_empty")]
    pub protocols: BTreeMap<String, ObjCProtocolRecord>,
    /// Enums
    #[serde(default, with = "keyed_map", skip_serializing_if = "BTreeMap::is_empty")]
    pub enums: BTreeMap<String, EnumRecord>,
    /// Typedefs
    #[serde(default, with = "keyed_map", skip_serializing_if = "BTreeMap::is_empty")]
    pub typedefs: BTreeMap<String, TypedefRecord>,
    /// Selectors a Swift class may implement without listing them
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub potentially_defined_selectors: BTreeSet<String>,
}

impl API {
    /// Creates an empty API for a target.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    /// Returns the install name of the source binary, if any.
    pub fn install_name(&self) -> &str {
        self.binary.as_ref().map_or("", |b| b.install_name.as_str())
    }

    /// Returns true if no record is present.
    pub fn is_empty(&self) -> bool {
        self.globals.is_empty()
            && self.interfaces.is_empty()
            && self.categories.is_empty()
            && self.protocols.is_empty()
            && self.enums.is_empty()
            && self.typedefs.is_empty()
    }

    /// Inserts a global, replacing any record with the same name.
    pub fn add_global(&mut self, record: GlobalRecord) {
        self.globals.insert(record.key(), record);
    }

    /// Returns the interface named `name`, creating it if needed.
    pub fn interface_mut(&mut self, name: &str) -> &mut ObjCInterfaceRecord {
        self.interfaces
            .entry(name.to_string())
            .or_insert_with(|| ObjCInterfaceRecord::new(name))
    }

    /// Inserts a category and links it from its interface when present.
    pub fn add_category(&mut self, record: ObjCCategoryRecord) {
        if let Some(interface) = self.interfaces.get_mut(&record.interface) {
            let name = record.name();
            if !interface.categories.iter().any(|c| c == name) {
                interface.categories.push(name.to_string());
            }
        }
        self.categories.insert(record.key(), record);
    }

    /// Inserts a protocol.
    pub fn add_protocol(&mut self, record: ObjCProtocolRecord) {
        self.protocols.insert(record.key(), record);
    }

    /// Inserts an enum.
    pub fn add_enum(&mut self, record: EnumRecord) {
        self.enums.insert(record.key(), record);
    }

    /// Inserts a typedef.
    pub fn add_typedef(&mut self, record: TypedefRecord) {
        self.typedefs.insert(record.key(), record);
    }
}
