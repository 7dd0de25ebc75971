// crates/workflow-harness/src/artifact/state.rs
// ============================================================================
// Module: State Artifacts
// Description: Version 3 and version 4 state document decoding.
// Purpose: Extract module-scoped resource sets from persisted state.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Two state layouts are accepted. Version 3 groups records by module path
//! lists (`["root", ...]`) keyed by address text. Version 4 lists resource
//! blocks with explicit mode, type and name, each carrying instances with an
//! optional `index_key`. Both decode to the same [`ModuleResources`] model.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use super::ArtifactError;
use super::ArtifactKind;
use super::document::LegacyModule;
use super::document::modules_from_legacy;
use super::document::modules_to_legacy;
use crate::address::InstanceKey;
use crate::address::ModulePath;
use crate::address::ResourceAddress;
use crate::address::ResourceMode;
use crate::resources::ModuleResources;
use crate::resources::ResourceInstance;
use crate::resources::ResourceSet;

// ============================================================================
// SECTION: Types
// ============================================================================

/// State document layout a [`State`] was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateFormat {
    /// Module-list layout keyed by address text.
    V3,
    /// Resource-block layout with explicit instances.
    V4,
}

impl StateFormat {
    /// Returns the numeric document version.
    #[must_use]
    pub const fn version(self) -> u64 {
        match self {
            Self::V3 => 3,
            Self::V4 => 4,
        }
    }
}

/// Decoded state artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    /// Layout the state was decoded from.
    format: StateFormat,
    /// Monotonic write counter.
    serial: u64,
    /// Lineage identifier, when recorded.
    lineage: Option<String>,
    /// Resources grouped by module.
    resources: ModuleResources,
}

impl State {
    /// Creates a version 3 state holding the given resources.
    #[must_use]
    pub const fn new(resources: ModuleResources) -> Self {
        Self {
            format: StateFormat::V3,
            serial: 0,
            lineage: None,
            resources,
        }
    }

    /// Returns a state holding no modules.
    #[must_use]
    pub const fn empty() -> Self {
        Self::new(ModuleResources::empty())
    }

    /// Returns this state with the given serial.
    #[must_use]
    pub const fn with_serial(mut self, serial: u64) -> Self {
        self.serial = serial;
        self
    }

    /// Returns this state with the given lineage.
    #[must_use]
    pub fn with_lineage(mut self, lineage: impl Into<String>) -> Self {
        self.lineage = Some(lineage.into());
        self
    }

    /// Returns the layout the state was decoded from.
    #[must_use]
    pub const fn format(&self) -> StateFormat {
        self.format
    }

    /// Returns the write counter.
    #[must_use]
    pub const fn serial(&self) -> u64 {
        self.serial
    }

    /// Returns the lineage identifier.
    #[must_use]
    pub fn lineage(&self) -> Option<&str> {
        self.lineage.as_deref()
    }

    /// Returns all module-scoped resources.
    #[must_use]
    pub const fn resources(&self) -> &ModuleResources {
        &self.resources
    }

    /// Returns the root module set.
    #[must_use]
    pub fn root_module(&self) -> &ResourceSet {
        self.resources.root_module()
    }
}

impl Default for State {
    fn default() -> Self {
        Self::empty()
    }
}

// ============================================================================
// SECTION: Documents
// ============================================================================

/// Minimal shape used to dispatch on the document version.
#[derive(Deserialize)]
struct VersionProbe {
    /// Declared layout version.
    version: u64,
}

/// Version 3 state document.
#[derive(Serialize, Deserialize)]
pub(super) struct StateV3Document {
    /// Always 3.
    version: u64,
    /// Write counter.
    #[serde(default)]
    serial: u64,
    /// Lineage identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lineage: Option<String>,
    /// Module entries.
    #[serde(default)]
    modules: Vec<LegacyModule>,
}

/// Version 4 state document.
#[derive(Deserialize)]
struct StateV4Document {
    /// Write counter.
    #[serde(default)]
    serial: u64,
    /// Lineage identifier.
    #[serde(default)]
    lineage: Option<String>,
    /// Resource blocks.
    #[serde(default)]
    resources: Vec<StateV4Resource>,
}

/// Resource block of a version 4 state document.
#[derive(Deserialize)]
struct StateV4Resource {
    /// Qualified module path; absent for the root module.
    #[serde(default)]
    module: Option<String>,
    /// Resource mode.
    #[serde(default = "default_mode")]
    mode: ResourceMode,
    /// Resource type name.
    #[serde(rename = "type")]
    type_name: String,
    /// Local name.
    name: String,
    /// Instance records.
    #[serde(default)]
    instances: Vec<Value>,
}

/// Mode assumed when a version 4 block omits it.
const fn default_mode() -> ResourceMode {
    ResourceMode::Managed
}

// ============================================================================
// SECTION: Decoding
// ============================================================================

/// Parses a state document of any supported version.
pub(super) fn parse_state_document(bytes: &[u8]) -> Result<State, ArtifactError> {
    let probe: VersionProbe = serde_json::from_slice(bytes)
        .map_err(|err| ArtifactError::malformed(ArtifactKind::State, err))?;
    match probe.version {
        3 => {
            let document: StateV3Document = serde_json::from_slice(bytes)
                .map_err(|err| ArtifactError::malformed(ArtifactKind::State, err))?;
            state_from_v3(document)
        }
        4 => {
            let document: StateV4Document = serde_json::from_slice(bytes)
                .map_err(|err| ArtifactError::malformed(ArtifactKind::State, err))?;
            state_from_v4(document)
        }
        version => Err(ArtifactError::UnsupportedVersion {
            kind: ArtifactKind::State,
            version,
        }),
    }
}

/// Builds a state from a version 3 document.
fn state_from_v3(document: StateV3Document) -> Result<State, ArtifactError> {
    if document.version != StateFormat::V3.version() {
        return Err(ArtifactError::UnsupportedVersion {
            kind: ArtifactKind::State,
            version: document.version,
        });
    }
    let resources = modules_from_legacy(ArtifactKind::State, document.modules)?;
    Ok(State {
        format: StateFormat::V3,
        serial: document.serial,
        lineage: document.lineage,
        resources,
    })
}

/// Builds a state from a version 4 document.
fn state_from_v4(document: StateV4Document) -> Result<State, ArtifactError> {
    let mut grouped: BTreeMap<ModulePath, Vec<(ResourceAddress, ResourceInstance)>> =
        BTreeMap::new();
    for block in document.resources {
        let module = ModulePath::parse_qualified(block.module.as_deref().unwrap_or(""))
            .map_err(|err| ArtifactError::malformed(ArtifactKind::State, err))?;
        let base = ResourceAddress::from_parts(block.mode, &block.type_name, &block.name, None)
            .map_err(|err| ArtifactError::malformed(ArtifactKind::State, err))?;
        let entries = grouped.entry(module).or_default();
        for instance in block.instances {
            let key = instance_key(&base, &instance)?;
            let address = match key {
                Some(key) => base.clone().with_key(key),
                None => base.clone(),
            };
            entries.push((address, ResourceInstance::new(instance)));
        }
    }
    let mut modules = Vec::with_capacity(grouped.len());
    for (path, entries) in grouped {
        let set = ResourceSet::try_from_entries(entries).map_err(|err| {
            ArtifactError::malformed(ArtifactKind::State, format!("module {path}: {err}"))
        })?;
        modules.push((path, set));
    }
    let resources = ModuleResources::try_from_modules(modules)
        .map_err(|err| ArtifactError::malformed(ArtifactKind::State, err))?;
    Ok(State {
        format: StateFormat::V4,
        serial: document.serial,
        lineage: document.lineage,
        resources,
    })
}

/// Extracts the optional `index_key` of a version 4 instance record.
fn instance_key(
    base: &ResourceAddress,
    instance: &Value,
) -> Result<Option<InstanceKey>, ArtifactError> {
    let Some(record) = instance.as_object() else {
        return Err(ArtifactError::malformed(
            ArtifactKind::State,
            format!("instance of {base} must be an object"),
        ));
    };
    match record.get("index_key") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(key)) => Ok(Some(InstanceKey::Str(key.clone()))),
        Some(Value::Number(number)) => match number.as_u64() {
            Some(index) => Ok(Some(InstanceKey::Int(index))),
            None => Err(ArtifactError::malformed(
                ArtifactKind::State,
                format!("index_key of {base} must be a non-negative integer"),
            )),
        },
        Some(_) => Err(ArtifactError::malformed(
            ArtifactKind::State,
            format!("index_key of {base} must be a string or integer"),
        )),
    }
}

// ============================================================================
// SECTION: Encoding
// ============================================================================

/// Converts a state into its version 3 document shape.
pub(super) fn state_to_v3(state: &State) -> StateV3Document {
    StateV3Document {
        version: StateFormat::V3.version(),
        serial: state.serial,
        lineage: state.lineage.clone(),
        modules: modules_to_legacy(&state.resources),
    }
}

/// Encodes a state as a pretty-printed version 3 document.
pub(super) fn encode_state_document(state: &State) -> Result<Vec<u8>, ArtifactError> {
    serde_json::to_vec_pretty(&state_to_v3(state)).map_err(|err| ArtifactError::Encode {
        kind: ArtifactKind::State,
        reason: err.to_string(),
    })
}
