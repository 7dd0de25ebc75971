// crates/workflow-harness/src/address.rs
// ============================================================================
// Module: Resource Addresses
// Description: Typed resource instance addresses and module paths.
// Purpose: Provide the canonical, totally ordered keys of every resource collection.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! A [`ResourceAddress`] names one resource instance inside a module: a mode
//! (managed resource or data source), a type, a local name and an optional
//! instance key. The canonical text form is `data.template_file.test`,
//! `null_resource.test`, `null_resource.test[0]` or `null_resource.test["a"]`.
//! The legacy count suffix `null_resource.test.0` is accepted on input and
//! normalized to `null_resource.test[0]`. Quotes and backslashes inside a
//! string key are backslash-escaped, so any key survives a text round trip.
//!
//! A [`ModulePath`] scopes addresses; the root module is the empty path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Address prefix marking a data source.
const DATA_PREFIX: &str = "data";
/// First segment of every legacy module path.
const ROOT_SEGMENT: &str = "root";
/// Keyword preceding each module name in qualified module paths.
const MODULE_KEYWORD: &str = "module";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Address and module path parse errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The address text was empty.
    #[error("resource address must not be empty")]
    Empty,
    /// The address text did not follow the address grammar.
    #[error("invalid resource address `{input}`: {reason}")]
    InvalidAddress {
        /// Offending input.
        input: String,
        /// Human-readable reason.
        reason: &'static str,
    },
    /// The module path did not follow the module path grammar.
    #[error("invalid module path `{input}`: {reason}")]
    InvalidModulePath {
        /// Offending input.
        input: String,
        /// Human-readable reason.
        reason: &'static str,
    },
}

// ============================================================================
// SECTION: Resource Address
// ============================================================================

/// Kind qualifier of a resource address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceMode {
    /// Resource whose lifecycle is managed by the tool.
    Managed,
    /// Read-only data source.
    Data,
}

impl ResourceMode {
    /// Returns the stable label used in state documents.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Managed => "managed",
            Self::Data => "data",
        }
    }
}

/// Instance key of a counted or keyed resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InstanceKey {
    /// Numeric index of a counted resource.
    Int(u64),
    /// String key of a keyed resource.
    Str(String),
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(index) => write!(f, "[{index}]"),
            Self::Str(key) => {
                f.write_str("[\"")?;
                for ch in key.chars() {
                    if matches!(ch, '"' | '\\') {
                        f.write_str("\\")?;
                    }
                    write!(f, "{ch}")?;
                }
                f.write_str("\"]")
            }
        }
    }
}

/// Address of one resource instance within a module.
///
/// # Invariants
/// - Type and name are non-empty identifiers (`[A-Za-z0-9_-]+`).
/// - Ordering is total and stable: mode, type, name, then instance key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceAddress {
    /// Managed resource or data source.
    mode: ResourceMode,
    /// Resource type name, e.g. `null_resource`.
    type_name: String,
    /// Local name within the module.
    name: String,
    /// Optional instance key.
    key: Option<InstanceKey>,
}

impl ResourceAddress {
    /// Creates a managed resource address.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::InvalidAddress`] when the type or name is not a
    /// valid identifier.
    pub fn managed(type_name: &str, name: &str) -> Result<Self, AddressError> {
        Self::from_parts(ResourceMode::Managed, type_name, name, None)
    }

    /// Creates a data source address.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::InvalidAddress`] when the type or name is not a
    /// valid identifier.
    pub fn data(type_name: &str, name: &str) -> Result<Self, AddressError> {
        Self::from_parts(ResourceMode::Data, type_name, name, None)
    }

    /// Creates an address from its parts, validating identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::InvalidAddress`] when the type or name is not a
    /// valid identifier.
    pub fn from_parts(
        mode: ResourceMode,
        type_name: &str,
        name: &str,
        key: Option<InstanceKey>,
    ) -> Result<Self, AddressError> {
        let display = format!("{type_name}.{name}");
        validate_identifier(&display, type_name)?;
        validate_identifier(&display, name)?;
        Ok(Self {
            mode,
            type_name: type_name.to_string(),
            name: name.to_string(),
            key,
        })
    }

    /// Returns this address with the given instance key.
    #[must_use]
    pub fn with_key(mut self, key: InstanceKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Returns the resource mode.
    #[must_use]
    pub const fn mode(&self) -> ResourceMode {
        self.mode
    }

    /// Returns the resource type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the local name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the instance key, if any.
    #[must_use]
    pub const fn key(&self) -> Option<&InstanceKey> {
        self.key.as_ref()
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mode == ResourceMode::Data {
            write!(f, "{DATA_PREFIX}.")?;
        }
        write!(f, "{}.{}", self.type_name, self.name)?;
        if let Some(key) = &self.key {
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

impl FromStr for ResourceAddress {
    type Err = AddressError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.is_empty() {
            return Err(AddressError::Empty);
        }
        let (body, mut key) = split_instance_key(input)?;
        let mut parts: Vec<&str> = body.split('.').collect();
        let mode = if parts.first() == Some(&DATA_PREFIX) {
            parts.remove(0);
            ResourceMode::Data
        } else {
            ResourceMode::Managed
        };
        if key.is_none()
            && parts.len() == 3
            && let Some(index) = parts.get(2).and_then(|segment| parse_index(segment))
        {
            key = Some(InstanceKey::Int(index));
            parts.truncate(2);
        }
        let [type_name, name] = parts.as_slice() else {
            return Err(invalid_address(input, "expected `<type>.<name>` with an optional `data.` prefix"));
        };
        validate_identifier(input, type_name)?;
        validate_identifier(input, name)?;
        Ok(Self {
            mode,
            type_name: (*type_name).to_string(),
            name: (*name).to_string(),
            key,
        })
    }
}

impl TryFrom<String> for ResourceAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResourceAddress> for String {
    fn from(value: ResourceAddress) -> Self {
        value.to_string()
    }
}

/// Splits a trailing `[..]` instance key from the address body.
///
/// The body never contains `[`, so the first bracket opens the key.
fn split_instance_key(input: &str) -> Result<(&str, Option<InstanceKey>), AddressError> {
    let Some(open) = input.find('[') else {
        return Ok((input, None));
    };
    let Some(inner) = input[open + 1 ..].strip_suffix(']') else {
        return Err(invalid_address(input, "unbalanced instance key brackets"));
    };
    let body = &input[.. open];
    if inner.len() >= 2
        && let Some(quoted) = inner.strip_prefix('"').and_then(|rest| rest.strip_suffix('"'))
    {
        let key =
            unescape_key(quoted).ok_or_else(|| invalid_address(input, "invalid escape in string instance key"))?;
        return Ok((body, Some(InstanceKey::Str(key))));
    }
    parse_index(inner)
        .map(|index| (body, Some(InstanceKey::Int(index))))
        .ok_or_else(|| invalid_address(input, "instance key must be an integer or a quoted string"))
}

/// Reverses the key escaping applied by [`InstanceKey`]'s `Display`.
///
/// Returns `None` for an unescaped quote or a dangling or unknown escape.
fn unescape_key(quoted: &str) -> Option<String> {
    let mut key = String::with_capacity(quoted.len());
    let mut chars = quoted.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some(escaped @ ('"' | '\\')) => key.push(escaped),
                _ => return None,
            },
            '"' => return None,
            other => key.push(other),
        }
    }
    Some(key)
}

/// Parses an all-digit segment as an instance index.
fn parse_index(segment: &str) -> Option<u64> {
    if segment.is_empty() || !segment.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

/// Validates a type or name identifier.
fn validate_identifier(input: &str, identifier: &str) -> Result<(), AddressError> {
    if identifier.is_empty() {
        return Err(invalid_address(input, "type and name must not be empty"));
    }
    let valid = identifier
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
    if !valid {
        return Err(invalid_address(input, "identifiers may only contain [A-Za-z0-9_-]"));
    }
    Ok(())
}

/// Builds an [`AddressError::InvalidAddress`].
fn invalid_address(input: &str, reason: &'static str) -> AddressError {
    AddressError::InvalidAddress {
        input: input.to_string(),
        reason,
    }
}

// ============================================================================
// SECTION: Module Path
// ============================================================================

/// Path of a module; the root module is the empty path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModulePath(Vec<String>);

impl ModulePath {
    /// Returns the root module path.
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Returns the path of a child module of this module.
    #[must_use]
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.into());
        Self(segments)
    }

    /// Returns true for the root module.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the child module names from the root down.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Parses a legacy module path list such as `["root", "network"]`.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::InvalidModulePath`] when the list does not start
    /// with `root` or contains an empty segment.
    pub fn from_legacy_path(path: &[String]) -> Result<Self, AddressError> {
        let joined = path.join(".");
        let Some((first, rest)) = path.split_first() else {
            return Err(invalid_module(&joined, "module path must not be empty"));
        };
        if first != ROOT_SEGMENT {
            return Err(invalid_module(&joined, "module path must start with `root`"));
        }
        if rest.iter().any(String::is_empty) {
            return Err(invalid_module(&joined, "module names must not be empty"));
        }
        Ok(Self(rest.to_vec()))
    }

    /// Returns the legacy module path list, starting with `root`.
    #[must_use]
    pub fn to_legacy_path(&self) -> Vec<String> {
        std::iter::once(ROOT_SEGMENT.to_string()).chain(self.0.iter().cloned()).collect()
    }

    /// Parses a qualified module path such as `module.network.module.subnets`.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::InvalidModulePath`] when segments are not
    /// `module.<name>` pairs.
    pub fn parse_qualified(input: &str) -> Result<Self, AddressError> {
        if input.is_empty() {
            return Ok(Self::root());
        }
        let parts: Vec<&str> = input.split('.').collect();
        let mut segments = Vec::with_capacity(parts.len() / 2);
        for pair in parts.chunks(2) {
            match pair {
                [keyword, name] if *keyword == MODULE_KEYWORD && !name.is_empty() => {
                    segments.push((*name).to_string());
                }
                _ => {
                    return Err(invalid_module(input, "expected `module.<name>` segments"));
                }
            }
        }
        Ok(Self(segments))
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str(ROOT_SEGMENT);
        }
        let mut first = true;
        for segment in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{MODULE_KEYWORD}.{segment}")?;
            first = false;
        }
        Ok(())
    }
}

/// Builds an [`AddressError::InvalidModulePath`].
fn invalid_module(input: &str, reason: &'static str) -> AddressError {
    AddressError::InvalidModulePath {
        input: input.to_string(),
        reason,
    }
}
