//! Package spec parsing
//!
//! Two input shapes are accepted. A flat list of `manager-name` tokens:
//!
//! ```text
//! ["pip-flask", "npmg-gulp", "bower-jquery"]
//! ```
//!
//! and a nested mapping of manager key to packages:
//!
//! ```text
//! {"sys": {"curl": null}, "pip": {"requests": "2.0.0"}, "npm": {"lodash": ["3.0.0", "4.0.0"]}}
//! ```
//!
//! Each mapping group is classified once into a [`GroupSpec`]. Manager keys
//! are resolved later by the installer so that an unknown key only affects
//! its own group.

use std::path::PathBuf;

use serde_json::{Map, Number, Value};

use crate::error::PackageError;
use crate::types::{InstallOption, ManagerKind, VersionConstraint};

/// Spec key holding system packages
pub const SYSTEM_KEY: &str = "sys";

/// Descriptor key naming the directory the manifest is installed in
const TARGET_DIR_KEY: &str = "target_dir";

/// Split a `manager-name` token at the first hyphen
///
/// Only the base prefixes `pip`, `bower`, `npm` and `npmg` are accepted;
/// `npmg` maps to npm with the global option.
///
/// # Errors
/// Returns `PackageError::UnknownManager` for any other prefix and
/// `PackageError::InvalidSpec` when the package name is empty
pub fn extract_manager(
    token: &str,
) -> Result<(ManagerKind, String, Vec<InstallOption>), PackageError> {
    let unknown = || {
        PackageError::UnknownManager(format!(
            "could not identify base package manager for '{token}'"
        ))
    };

    let (prefix, name) = token.split_once('-').ok_or_else(unknown)?;
    let (manager, options) = match prefix {
        "pip" => (ManagerKind::Pip, vec![]),
        "bower" => (ManagerKind::Bower, vec![]),
        "npm" => (ManagerKind::Npm, vec![]),
        "npmg" => (ManagerKind::Npm, vec![InstallOption::Global]),
        _ => return Err(unknown()),
    };

    if name.is_empty() {
        return Err(PackageError::InvalidSpec(format!(
            "token '{token}' has no package name"
        )));
    }

    Ok((manager, name.to_string(), options))
}

/// Source URL of a private GitHub repository
///
/// Uses SSH unless an OAuth `token` is given, in which case the token is
/// embedded in an HTTPS URL.
#[must_use]
pub fn private_repo_url(organization: &str, repo: &str, token: Option<&str>) -> String {
    match token {
        Some(token) => format!("git+https://{token}@github.com/{organization}/{repo}.git@master"),
        None => format!("git+ssh://git@github.com/{organization}/{repo}.git@master"),
    }
}

/// Native manifest payload (`package.json`, `bower.json`)
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestDescriptor {
    /// Directory to install in, if not the current one
    pub target_dir: Option<PathBuf>,
    /// Manifest body, without `target_dir`
    pub body: Map<String, Value>,
}

impl ManifestDescriptor {
    fn from_map(mut body: Map<String, Value>) -> Result<Self, PackageError> {
        let target_dir = match body.remove(TARGET_DIR_KEY) {
            None | Some(Value::Null) => None,
            Some(Value::String(dir)) => Some(PathBuf::from(dir)),
            Some(other) => {
                return Err(PackageError::InvalidSpec(format!(
                    "{TARGET_DIR_KEY} must be a string, got {other}"
                )));
            }
        };
        Ok(Self { target_dir, body })
    }

    /// Serialize the manifest body
    ///
    /// # Errors
    /// Returns `PackageError::InvalidSpec` if the body cannot be serialized
    pub fn to_json(&self) -> Result<String, PackageError> {
        serde_json::to_string(&self.body).map_err(|e| PackageError::InvalidSpec(e.to_string()))
    }
}

/// Shape of one mapping group
#[derive(Debug, Clone, PartialEq)]
pub enum GroupSpec {
    /// System package names
    System(Vec<String>),
    /// Package name to version constraint, in spec order
    Packages(Vec<(String, VersionConstraint)>),
    /// Manifest installed through the manager's own flow
    Manifest(ManifestDescriptor),
    /// Private repositories per private-manager key
    Private(Vec<(String, Vec<String>)>),
}

/// One group of a mapping spec
#[derive(Debug, Clone)]
pub struct GroupEntry {
    /// Manager key as written in the spec
    pub key: String,
    /// Parsed group, or why it could not be parsed
    pub spec: Result<GroupSpec, PackageError>,
}

/// A parsed package spec
#[derive(Debug, Clone)]
pub enum PackageSpec {
    /// Flat `manager-name` tokens
    List(Vec<String>),
    /// Nested manager → package → version mapping
    Mapping(Vec<GroupEntry>),
}

impl PackageSpec {
    /// Build a spec from a JSON value
    ///
    /// `organization` is the key under which private repositories are listed.
    ///
    /// # Errors
    /// Returns `PackageError::InvalidSpec` if the value is neither a list of
    /// strings nor a mapping. Malformed groups inside a mapping are kept as
    /// per-group errors.
    pub fn from_value(value: Value, organization: &str) -> Result<Self, PackageError> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(token) => Ok(token),
                    other => Err(PackageError::InvalidSpec(format!(
                        "expected package token, got {other}"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(PackageSpec::List),
            Value::Object(groups) => Ok(PackageSpec::Mapping(
                groups
                    .into_iter()
                    .map(|(key, value)| {
                        let spec = parse_group(&key, value, organization);
                        GroupEntry { key, spec }
                    })
                    .collect(),
            )),
            other => Err(PackageError::InvalidSpec(format!(
                "expected a package list or mapping, got {other}"
            ))),
        }
    }

    /// Parse a JSON document
    ///
    /// # Errors
    /// Returns `PackageError::InvalidSpec` on malformed JSON or shape
    pub fn from_json_str(content: &str, organization: &str) -> Result<Self, PackageError> {
        let value: Value =
            serde_json::from_str(content).map_err(|e| PackageError::InvalidSpec(e.to_string()))?;
        Self::from_value(value, organization)
    }

    /// Parse a YAML document
    ///
    /// # Errors
    /// Returns `PackageError::InvalidSpec` on malformed YAML or shape
    pub fn from_yaml_str(content: &str, organization: &str) -> Result<Self, PackageError> {
        let value: Value =
            serde_yaml::from_str(content).map_err(|e| PackageError::InvalidSpec(e.to_string()))?;
        Self::from_value(value, organization)
    }
}

fn parse_group(key: &str, value: Value, organization: &str) -> Result<GroupSpec, PackageError> {
    if key == SYSTEM_KEY {
        return parse_system(value);
    }
    if key == organization {
        return parse_private(value);
    }

    match value {
        Value::Object(map) if map.contains_key("name") && map.contains_key("version") => {
            ManifestDescriptor::from_map(map).map(GroupSpec::Manifest)
        }
        Value::Object(map) => map
            .into_iter()
            .map(|(name, version)| {
                let version = parse_version(&name, version)?;
                Ok((name, version))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(GroupSpec::Packages),
        Value::Null => Ok(GroupSpec::Packages(Vec::new())),
        other => Err(PackageError::InvalidSpec(format!(
            "{key}: expected a package mapping, got {other}"
        ))),
    }
}

fn parse_system(value: Value) -> Result<GroupSpec, PackageError> {
    match value {
        Value::Object(map) => Ok(GroupSpec::System(map.into_iter().map(|(k, _)| k).collect())),
        Value::Array(items) => string_list(SYSTEM_KEY, items).map(GroupSpec::System),
        Value::Null => Ok(GroupSpec::System(Vec::new())),
        other => Err(PackageError::InvalidSpec(format!(
            "{SYSTEM_KEY}: expected package names, got {other}"
        ))),
    }
}

fn parse_private(value: Value) -> Result<GroupSpec, PackageError> {
    let Value::Object(map) = value else {
        return Err(PackageError::InvalidSpec(
            "private repositories must be grouped by manager".to_string(),
        ));
    };

    map.into_iter()
        .map(|(manager, repos)| {
            let repos = match repos {
                Value::Array(items) => string_list(&manager, items)?,
                // Mapping form: repository names are the keys
                Value::Object(map) => map.into_iter().map(|(k, _)| k).collect(),
                other => {
                    return Err(PackageError::InvalidSpec(format!(
                        "{manager}: expected repository names, got {other}"
                    )));
                }
            };
            Ok((manager, repos))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(GroupSpec::Private)
}

fn string_list(key: &str, items: Vec<Value>) -> Result<Vec<String>, PackageError> {
    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Ok(s),
            other => Err(PackageError::InvalidSpec(format!(
                "{key}: expected a name, got {other}"
            ))),
        })
        .collect()
}

/// Normalize a version value
///
/// `null` is unconstrained, a two-element list is a `[lower, upper)` range,
/// a string or integer is an exact version.
fn parse_version(package: &str, value: Value) -> Result<VersionConstraint, PackageError> {
    match value {
        Value::Null => Ok(VersionConstraint::Any),
        Value::String(v) => Ok(VersionConstraint::Exact(v)),
        Value::Number(n) => integer_version(package, &n).map(VersionConstraint::Exact),
        Value::Array(bounds) => match <[Value; 2]>::try_from(bounds) {
            Ok([lower, upper]) => Ok(VersionConstraint::Range {
                lower: version_bound(package, lower)?,
                upper: version_bound(package, upper)?,
            }),
            Err(bounds) => Err(PackageError::InvalidSpec(format!(
                "{package}: version range needs 2 bounds, got {}",
                bounds.len()
            ))),
        },
        other => Err(PackageError::InvalidSpec(format!(
            "{package}: unsupported version {other}"
        ))),
    }
}

fn version_bound(package: &str, value: Value) -> Result<String, PackageError> {
    match value {
        Value::String(v) => Ok(v),
        Value::Number(n) => integer_version(package, &n),
        other => Err(PackageError::InvalidSpec(format!(
            "{package}: unsupported version bound {other}"
        ))),
    }
}

/// Render a numeric version, rejecting floats
///
/// A float has already lost its trailing zeros (`1.10` parses as `1.1`), so
/// it must be quoted in the requirements file.
fn integer_version(package: &str, n: &Number) -> Result<String, PackageError> {
    if n.is_u64() || n.is_i64() {
        Ok(n.to_string())
    } else {
        Err(PackageError::InvalidSpec(format!(
            "{package}: quote version {n}"
        )))
    }
}
