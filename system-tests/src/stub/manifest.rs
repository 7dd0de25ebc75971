// system-tests/src/stub/manifest.rs
// ============================================================================
// Module: Stub Manifest
// Description: Configuration file read by the stub provisioning tool.
// Purpose: Declare providers, data sources and managed resources for a fixture.
// Dependencies: serde, toml, workflow-harness
// ============================================================================

//! ## Overview
//! A fixture template declares its infrastructure in `main.toml`:
//!
//! ```toml
//! providers = [{ name = "null" }]
//!
//! [[resource]]
//! type = "null_resource"
//! name = "no_store"
//! sensitive = ["password"]
//! attributes = { password = "SECRET-do-not-store" }
//! ```
//!
//! Attributes named in `sensitive` are never persisted unless a leak fault is
//! injected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;
use workflow_harness::ResourceAddress;
use workflow_harness::ResourceMode;

use crate::stub::StubError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Manifest file name inside a fixture.
pub const MANIFEST_FILE: &str = "main.toml";

/// Attribute holding the instance identifier in persisted records.
pub const ID_ATTRIBUTE: &str = "id";

/// Plugin version announced when a provider declares none.
fn default_provider_version() -> String {
    "1.0.0".to_string()
}

// ============================================================================
// SECTION: Manifest Types
// ============================================================================

/// Provider plugin announced during init.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSpec {
    /// Provider name.
    pub name: String,
    /// Announced plugin version.
    #[serde(default = "default_provider_version")]
    pub version: String,
}

/// Declared data source or managed resource.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceSpec {
    /// Resource type name.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Local name.
    pub name: String,
    /// String attributes.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Attribute names that must never be persisted.
    #[serde(default)]
    pub sensitive: Vec<String>,
}

impl ResourceSpec {
    /// Returns the address of this declaration.
    ///
    /// # Errors
    ///
    /// Returns [`StubError::Manifest`] when the type or name is not an identifier.
    pub fn address(&self, mode: ResourceMode) -> Result<ResourceAddress, StubError> {
        ResourceAddress::from_parts(mode, &self.type_name, &self.name, None)
            .map_err(|err| StubError::Manifest(err.to_string()))
    }

    /// Builds the attribute map for a persisted record.
    ///
    /// Sensitive attributes are included only when `include_sensitive` holds.
    #[must_use]
    pub fn attributes(&self, address: &ResourceAddress, include_sensitive: bool) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(ID_ATTRIBUTE.to_string(), Value::String(address.to_string()));
        for (key, value) in &self.attributes {
            if include_sensitive || !self.sensitive.contains(key) {
                map.insert(key.clone(), Value::String(value.clone()));
            }
        }
        map
    }
}

/// Parsed `main.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StubManifest {
    /// Providers announced during init, in order.
    #[serde(default)]
    pub providers: Vec<ProviderSpec>,
    /// Data sources read during refresh.
    #[serde(default, rename = "data")]
    pub data_sources: Vec<ResourceSpec>,
    /// Managed resources.
    #[serde(default, rename = "resource")]
    pub resources: Vec<ResourceSpec>,
}

impl StubManifest {
    /// Parses a manifest from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`StubError::Manifest`] when the text is not a valid manifest or
    /// declares the same address twice.
    pub fn from_toml_str(input: &str) -> Result<Self, StubError> {
        let manifest: Self = toml::from_str(input).map_err(|err| StubError::Manifest(err.to_string()))?;
        let mut seen = Vec::new();
        for (mode, spec) in manifest.declarations() {
            let address = spec.address(mode)?;
            if seen.contains(&address) {
                return Err(StubError::Manifest(format!("{address} is declared twice")));
            }
            seen.push(address);
        }
        Ok(manifest)
    }

    /// Loads the manifest from a fixture directory.
    ///
    /// # Errors
    ///
    /// Returns [`StubError::Io`] when the file cannot be read and
    /// [`StubError::Manifest`] when it is invalid.
    pub fn load(dir: &Path) -> Result<Self, StubError> {
        let path = dir.join(MANIFEST_FILE);
        let text = fs::read_to_string(&path).map_err(|source| StubError::Io {
            path,
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Iterates data sources then managed resources with their modes.
    pub fn declarations(&self) -> impl Iterator<Item = (ResourceMode, &ResourceSpec)> {
        self.data_sources
            .iter()
            .map(|spec| (ResourceMode::Data, spec))
            .chain(self.resources.iter().map(|spec| (ResourceMode::Managed, spec)))
    }

    /// Returns the declaration for an address, if any.
    #[must_use]
    pub fn find(&self, address: &ResourceAddress) -> Option<&ResourceSpec> {
        self.declarations()
            .find(|(mode, spec)| {
                *mode == address.mode() && spec.type_name == address.type_name() && spec.name == address.name()
            })
            .map(|(_, spec)| spec)
    }
}
