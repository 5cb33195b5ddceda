use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;

use super::PackageError;

pub const PACKAGE_JSON: &str = "package.json";

/// `package.json` as written on disk. Fields npm accepts in several shapes are
/// kept as raw JSON and normalized by [`Manifest::parse`].
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct RawManifest {
    name: Option<Value>,
    files: Option<Value>,
    main: Option<Value>,
    bin: Option<Value>,
    dependencies: Option<Value>,
    dev_dependencies: Option<Value>,
    peer_dependencies: Option<Value>,
    optional_dependencies: Option<Value>,
    bundle_dependencies: Option<Value>,
    bundled_dependencies: Option<Value>,
}

/// The parts of `package.json` this crate consumes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    pub name: String,
    /// `files` patterns, only when the field is an array
    pub files: Option<Vec<String>>,
    pub main: Option<String>,
    /// Every target referenced by `bin` (string, array or name -> path map)
    pub bin: Vec<String>,
    pub dependencies: BTreeSet<String>,
    pub dev_dependencies: BTreeSet<String>,
    pub peer_dependencies: BTreeSet<String>,
    pub optional_dependencies: BTreeSet<String>,
    /// Members of `bundleDependencies` and `bundledDependencies` arrays
    pub bundled_dependencies: BTreeSet<String>,
}

fn strings(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        Some(Value::Object(map)) => map
            .values()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

fn keys(value: Option<&Value>) -> BTreeSet<String> {
    value
        .and_then(Value::as_object)
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default()
}

fn array_members(value: Option<&Value>) -> impl Iterator<Item = String> + '_ {
    value
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| item.as_str().map(str::to_string))
}

impl Manifest {
    /// Parse `package.json` contents. `path` is only used for error messages.
    pub fn parse(content: &str, path: &Path) -> Result<Self, PackageError> {
        let raw: RawManifest = serde_json::from_str(content).map_err(|e| PackageError::Manifest {
            path: path.to_path_buf(),
            reason: format!("cannot parse json file: {}", e),
        })?;

        let name = match raw.name.as_ref().and_then(Value::as_str) {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => {
                return Err(PackageError::Manifest {
                    path: path.to_path_buf(),
                    reason: "missing package name".to_string(),
                });
            }
        };

        let files = raw
            .files
            .as_ref()
            .filter(|value| value.is_array())
            .map(|value| strings(Some(value)));

        let mut bundled_dependencies = BTreeSet::new();
        bundled_dependencies.extend(array_members(raw.bundle_dependencies.as_ref()));
        bundled_dependencies.extend(array_members(raw.bundled_dependencies.as_ref()));

        Ok(Manifest {
            name,
            files,
            main: raw.main.as_ref().and_then(Value::as_str).map(str::to_string),
            bin: strings(raw.bin.as_ref()),
            dependencies: keys(raw.dependencies.as_ref()),
            dev_dependencies: keys(raw.dev_dependencies.as_ref()),
            peer_dependencies: keys(raw.peer_dependencies.as_ref()),
            optional_dependencies: keys(raw.optional_dependencies.as_ref()),
            bundled_dependencies,
        })
    }

    /// True if `name` is declared in any dependency map or bundle array.
    pub fn has_dependency(&self, name: &str) -> bool {
        self.dependencies.contains(name)
            || self.dev_dependencies.contains(name)
            || self.peer_dependencies.contains(name)
            || self.optional_dependencies.contains(name)
            || self.bundled_dependencies.contains(name)
    }
}
