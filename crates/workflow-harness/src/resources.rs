// crates/workflow-harness/src/resources.rs
// ============================================================================
// Module: Resource Set Model
// Description: Immutable, module-scoped collections of resource instances.
// Purpose: Provide exact-match set comparisons over decoded artifacts.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A [`ResourceSet`] maps [`ResourceAddress`] keys to opaque
//! [`ResourceInstance`] records. Only presence, absence and count matter to the
//! harness; records are never interpreted. [`ModuleResources`] groups sets by
//! [`ModulePath`].
//! Invariants:
//! - Addresses are unique; construction rejects duplicates.
//! - Iteration order is the address order, independent of input order.
//! - No mutation API is exposed after construction.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::address::ModulePath;
use crate::address::ResourceAddress;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while building resource collections.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceSetError {
    /// The same address appeared twice within one module.
    #[error("duplicate resource address {0}")]
    DuplicateAddress(ResourceAddress),
    /// The same module path appeared twice.
    #[error("duplicate module path {0}")]
    DuplicateModule(ModulePath),
}

// ============================================================================
// SECTION: Resource Instance
// ============================================================================

/// Opaque record of one resource instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceInstance(Value);

impl ResourceInstance {
    /// Wraps a raw record.
    #[must_use]
    pub const fn new(value: Value) -> Self {
        Self(value)
    }

    /// Returns the raw record.
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consumes the instance and returns the raw record.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }
}

// ============================================================================
// SECTION: Resource Set
// ============================================================================

/// Shared empty set returned for modules missing from an artifact.
static EMPTY_SET: ResourceSet = ResourceSet::empty();

/// Set of resource instances keyed by address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceSet {
    /// Records keyed by address.
    entries: BTreeMap<ResourceAddress, ResourceInstance>,
}

impl ResourceSet {
    /// Returns an empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Builds a set from address/record pairs.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceSetError::DuplicateAddress`] when an address repeats.
    pub fn try_from_entries(
        entries: impl IntoIterator<Item = (ResourceAddress, ResourceInstance)>,
    ) -> Result<Self, ResourceSetError> {
        let mut map = BTreeMap::new();
        for (address, instance) in entries {
            if map.contains_key(&address) {
                return Err(ResourceSetError::DuplicateAddress(address));
            }
            map.insert(address, instance);
        }
        Ok(Self {
            entries: map,
        })
    }

    /// Returns the number of instances.
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the set holds no instances.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true when the address is present.
    #[must_use]
    pub fn contains(&self, address: &ResourceAddress) -> bool {
        self.entries.contains_key(address)
    }

    /// Returns the record for an address.
    #[must_use]
    pub fn get(&self, address: &ResourceAddress) -> Option<&ResourceInstance> {
        self.entries.get(address)
    }

    /// Returns the addresses as an ordered set.
    #[must_use]
    pub fn addresses(&self) -> BTreeSet<ResourceAddress> {
        self.entries.keys().cloned().collect()
    }

    /// Iterates over address/record pairs in address order.
    pub fn iter(&self) -> impl Iterator<Item = (&ResourceAddress, &ResourceInstance)> {
        self.entries.iter()
    }

    /// Returns true iff the address sets are identical.
    #[must_use]
    pub fn equals(&self, expected: &BTreeSet<ResourceAddress>) -> bool {
        self.entries.len() == expected.len()
            && expected.iter().all(|address| self.entries.contains_key(address))
    }

    /// Compares this set against the expected addresses.
    #[must_use]
    pub fn difference(&self, expected: &BTreeSet<ResourceAddress>) -> SetDifference {
        SetDifference {
            missing: expected
                .iter()
                .filter(|address| !self.entries.contains_key(*address))
                .cloned()
                .collect(),
            unexpected: self
                .entries
                .keys()
                .filter(|address| !expected.contains(*address))
                .cloned()
                .collect(),
        }
    }
}

/// Differences between an actual set and the expected addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SetDifference {
    /// Expected addresses absent from the actual set.
    pub missing: BTreeSet<ResourceAddress>,
    /// Actual addresses that were not expected.
    pub unexpected: BTreeSet<ResourceAddress>,
}

impl SetDifference {
    /// Returns true when both sides agree.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

impl fmt::Display for SetDifference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "missing {}; unexpected {}",
            render_addresses(&self.missing),
            render_addresses(&self.unexpected)
        )
    }
}

/// Renders addresses as `{a, b, c}` in iteration order.
#[must_use]
pub fn render_addresses<'a>(addresses: impl IntoIterator<Item = &'a ResourceAddress>) -> String {
    let rendered: Vec<String> = addresses.into_iter().map(ToString::to_string).collect();
    format!("{{{}}}", rendered.join(", "))
}

// ============================================================================
// SECTION: Module Resources
// ============================================================================

/// Resource sets grouped by module path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleResources {
    /// Sets keyed by module path.
    modules: BTreeMap<ModulePath, ResourceSet>,
}

impl ModuleResources {
    /// Returns a collection with no modules.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            modules: BTreeMap::new(),
        }
    }

    /// Returns a collection holding only the root module.
    #[must_use]
    pub fn root_only(set: ResourceSet) -> Self {
        let mut modules = BTreeMap::new();
        modules.insert(ModulePath::root(), set);
        Self {
            modules,
        }
    }

    /// Builds a collection from module/set pairs.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceSetError::DuplicateModule`] when a module path repeats.
    pub fn try_from_modules(
        modules: impl IntoIterator<Item = (ModulePath, ResourceSet)>,
    ) -> Result<Self, ResourceSetError> {
        let mut map = BTreeMap::new();
        for (path, set) in modules {
            if map.contains_key(&path) {
                return Err(ResourceSetError::DuplicateModule(path));
            }
            map.insert(path, set);
        }
        Ok(Self {
            modules: map,
        })
    }

    /// Returns the root module set; empty when the root module is absent.
    #[must_use]
    pub fn root_module(&self) -> &ResourceSet {
        self.modules.get(&ModulePath::root()).unwrap_or(&EMPTY_SET)
    }

    /// Returns the set for a module path.
    #[must_use]
    pub fn module(&self, path: &ModulePath) -> Option<&ResourceSet> {
        self.modules.get(path)
    }

    /// Iterates over modules in path order.
    pub fn modules(&self) -> impl Iterator<Item = (&ModulePath, &ResourceSet)> {
        self.modules.iter()
    }

    /// Returns the instance count across all modules.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.modules.values().map(ResourceSet::count).sum()
    }
}
