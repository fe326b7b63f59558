//! SDKDB JSON model.
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "projectName": "Foo",
//!   "arm64-apple-macos14.0": {
//!     "RuntimeRoot": [ ... ],
//!     "SDKContentRoot": [ ... ],
//!     "PublicSDKContentRoot": [ ... ]
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::{Access, API};
use crate::error::{Error, Result};

/// The only format version read and written.
pub const SDKDB_VERSION: &str = "1.0";

/// Which part of an SDK an API was collected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentRoot {
    /// Binaries
    Runtime,
    /// All headers
    Sdk,
    /// Public headers only
    PublicSdk,
}

impl ContentRoot {
    /// Access assumed for header records that do not carry one.
    pub fn default_access(self) -> Access {
        match self {
            Self::Runtime => Access::Unknown,
            Self::Sdk => Access::Private,
            Self::PublicSdk => Access::Public,
        }
    }
}

/// APIs of one target triple.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetApis {
    /// Binary-derived APIs
    #[serde(rename = "RuntimeRoot", default, skip_serializing_if = "Vec::is_empty")]
    pub runtime_root: Vec<API>,
    /// Header-derived APIs
    #[serde(rename = "SDKContentRoot", default, skip_serializing_if = "Vec::is_empty")]
    pub sdk_content_root: Vec<API>,
    /// Public header-derived APIs
    #[serde(
        rename = "PublicSDKContentRoot",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub public_sdk_content_root: Vec<API>,
}

impl TargetApis {
    /// Returns the APIs of one root.
    pub fn root(&self, root: ContentRoot) -> &[API] {
        match root {
            ContentRoot::Runtime => &self.runtime_root,
            ContentRoot::Sdk => &self.sdk_content_root,
            ContentRoot::PublicSdk => &self.public_sdk_content_root,
        }
    }

    /// Returns the APIs of one root for update.
    pub fn root_mut(&mut self, root: ContentRoot) -> &mut Vec<API> {
        match root {
            ContentRoot::Runtime => &mut self.runtime_root,
            ContentRoot::Sdk => &mut self.sdk_content_root,
            ContentRoot::PublicSdk => &mut self.public_sdk_content_root,
        }
    }
}

/// An SDK database file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sdkdb {
    /// Format version
    pub version: String,
    /// Project the database was built for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    /// Set when the producing run reported errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<bool>,
    /// APIs per target triple
    #[serde(flatten)]
    pub targets: BTreeMap<String, TargetApis>,
}

impl Default for Sdkdb {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Sdkdb {
    /// Creates an empty database.
    pub fn new(project_name: Option<String>) -> Self {
        Self {
            version: SDKDB_VERSION.to_string(),
            project_name,
            error: None,
            targets: BTreeMap::new(),
        }
    }

    /// Appends an API under its target.
    pub fn add_api(&mut self, api: API, root: ContentRoot) {
        self.targets
            .entry(api.target.clone())
            .or_default()
            .root_mut(root)
            .push(api);
    }

    /// Parses a database, rejecting unknown versions before anything else.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        match value.get("version").and_then(Value::as_str) {
            Some(SDKDB_VERSION) => {}
            Some(other) => return Err(Error::UnsupportedSdkdbVersion(other.to_string())),
            None => return Err(Error::MalformedSdkdb("missing version".into())),
        }

        let mut db: Self = serde_json::from_value(value)?;
        // Records may omit their target; the enclosing key is authoritative.
        for (target, apis) in &mut db.targets {
            for api in apis
                .runtime_root
                .iter_mut()
                .chain(apis.sdk_content_root.iter_mut())
                .chain(apis.public_sdk_content_root.iter_mut())
            {
                if api.target.is_empty() {
                    api.target = target.clone();
                }
            }
        }
        Ok(db)
    }

    /// Serializes with sorted keys and indentation.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reads a database file.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Writes a database file.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut json = self.to_json()?;
        json.push('\n');
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{BinaryInfo, BinaryType, ObjCInterfaceRecord};
    use pretty_assertions::assert_eq;

    fn sample() -> Sdkdb {
        let mut api = API::new("arm64-apple-macos14.0");
        api.binary = Some(BinaryInfo {
            file_type: BinaryType::Dylib,
            install_name: "/usr/lib/libFoo.dylib".into(),
            ..Default::default()
        });
        api.interfaces.insert("Foo".into(), ObjCInterfaceRecord::new("Foo"));

        let mut db = Sdkdb::new(Some("Foo".into()));
        db.add_api(api, ContentRoot::Runtime);
        db.add_api(API::new("x86_64-apple-macos14.0"), ContentRoot::PublicSdk);
        db
    }

    #[test]
    fn test_layout() {
        let json = sample().to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["version"], "1.0");
        assert_eq!(value["projectName"], "Foo");
        assert!(value.get("error").is_none());
        let runtime = &value["arm64-apple-macos14.0"]["RuntimeRoot"];
        assert_eq!(runtime[0]["binary"]["installName"], "/usr/lib/libFoo.dylib");
        assert_eq!(runtime[0]["interfaces"][0]["name"], "Foo");
        assert!(value["x86_64-apple-macos14.0"]["PublicSDKContentRoot"].is_array());

        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert!(keys.contains(&"arm64-apple-macos14.0".to_string()));
    }

    #[test]
    fn test_read_back() {
        let db = sample();
        let back = Sdkdb::from_json(&db.to_json().unwrap()).unwrap();
        assert_eq!(back, db);
    }

    #[test]
    fn test_target_filled_from_key() {
        let json = r#"{
            "version": "1.0",
            "arm64-apple-ios17.0": { "SDKContentRoot": [ { "enums": [ { "name": "Color" } ] } ] }
        }"#;
        let db = Sdkdb::from_json(json).unwrap();
        let api = &db.targets["arm64-apple-ios17.0"].sdk_content_root[0];
        assert_eq!(api.target, "arm64-apple-ios17.0");
        assert!(api.enums.contains_key("Color"));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let err = Sdkdb::from_json(r#"{ "version": "2.0", "x": 1 }"#).unwrap_err();
        assert!(matches!(err, Error::UnsupportedSdkdbVersion(v) if v == "2.0"));

        let err = Sdkdb::from_json(r#"{ "projectName": "Foo" }"#).unwrap_err();
        assert!(matches!(err, Error::MalformedSdkdb(_)));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sdk.json");
        let db = sample();
        db.write(&path).unwrap();
        assert_eq!(Sdkdb::read(&path).unwrap(), db);
    }
}
