// crates/workflow-harness/src/artifact/document.rs
// ============================================================================
// Module: Artifact Documents
// Description: Serde shapes shared by the plan and state documents.
// Purpose: Preserve duplicate keys so they can be rejected instead of dropped.
// Dependencies: serde, serde_json
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::de::MapAccess;
use serde::de::Visitor;
use serde::ser::SerializeMap;
use serde_json::Value;

use crate::address::ModulePath;
use crate::address::ResourceAddress;
use crate::artifact::ArtifactError;
use crate::artifact::ArtifactKind;
use crate::resources::ModuleResources;
use crate::resources::ResourceInstance;
use crate::resources::ResourceSet;

// ============================================================================
// SECTION: Ordered Entries
// ============================================================================

/// JSON object entries in document order, duplicates included.
///
/// Deserializing straight into a map would keep only the last duplicate.
#[derive(Debug, Default)]
pub(super) struct OrderedEntries(pub(super) Vec<(String, Value)>);

impl<'de> Deserialize<'de> for OrderedEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(OrderedEntriesVisitor)
    }
}

/// Visitor collecting object entries without deduplication.
struct OrderedEntriesVisitor;

impl<'de> Visitor<'de> for OrderedEntriesVisitor {
    type Value = OrderedEntries;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an object mapping resource addresses to records")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry::<String, Value>()? {
            entries.push((key, value));
        }
        Ok(OrderedEntries(entries))
    }
}

impl Serialize for OrderedEntries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

// ============================================================================
// SECTION: Legacy Modules
// ============================================================================

/// Module entry of a version 3 state document or a plan diff.
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct LegacyModule {
    /// Module path starting with `root`.
    pub(super) path: Vec<String>,
    /// Records keyed by address text.
    #[serde(default)]
    pub(super) resources: OrderedEntries,
}

/// Converts legacy module entries into module-scoped resource sets.
pub(super) fn modules_from_legacy(
    kind: ArtifactKind,
    modules: Vec<LegacyModule>,
) -> Result<ModuleResources, ArtifactError> {
    let mut sets = Vec::with_capacity(modules.len());
    for module in modules {
        let path = ModulePath::from_legacy_path(&module.path)
            .map_err(|err| ArtifactError::malformed(kind, err))?;
        let entries = module
            .resources
            .0
            .into_iter()
            .map(|(key, value)| {
                key.parse::<ResourceAddress>().map(|address| (address, ResourceInstance::new(value)))
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| ArtifactError::malformed(kind, err))?;
        let set = ResourceSet::try_from_entries(entries)
            .map_err(|err| ArtifactError::malformed(kind, format!("module {path}: {err}")))?;
        sets.push((path, set));
    }
    ModuleResources::try_from_modules(sets).map_err(|err| ArtifactError::malformed(kind, err))
}

/// Converts module-scoped resource sets into legacy module entries.
pub(super) fn modules_to_legacy(resources: &ModuleResources) -> Vec<LegacyModule> {
    resources
        .modules()
        .map(|(path, set)| LegacyModule {
            path: path.to_legacy_path(),
            resources: OrderedEntries(
                set.iter()
                    .map(|(address, instance)| (address.to_string(), instance.as_value().clone()))
                    .collect(),
            ),
        })
        .collect()
}
