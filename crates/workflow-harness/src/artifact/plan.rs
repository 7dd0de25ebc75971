// crates/workflow-harness/src/artifact/plan.rs
// ============================================================================
// Module: Plan Artifacts
// Description: Plan document decoding with embedded prior state and diff.
// Purpose: Expose the prior state and proposed changes of a saved plan.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A plan document carries the prior [`State`] the plan was computed against
//! (or `null` for a fresh workspace) and a [`Diff`] listing the proposed
//! change per resource address. Every diff record is an object whose
//! `action` field names the proposed [`DiffAction`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::value::RawValue;

use super::ArtifactError;
use super::ArtifactKind;
use super::document::LegacyModule;
use super::document::modules_from_legacy;
use super::document::modules_to_legacy;
use super::state::State;
use super::state::StateV3Document;
use super::state::parse_state_document;
use super::state::state_to_v3;
use crate::address::ResourceAddress;
use crate::resources::ModuleResources;
use crate::resources::ResourceInstance;
use crate::resources::ResourceSet;
use crate::tally::PlanTally;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Plan document format version understood by the decoder.
pub const PLAN_FORMAT_VERSION: u64 = 1;

/// Field of a diff record naming the proposed action.
const ACTION_FIELD: &str = "action";

/// Field of a diff record carrying the proposed attributes.
const ATTRIBUTES_FIELD: &str = "attributes";

// ============================================================================
// SECTION: Diff Action
// ============================================================================

/// Proposed change for one resource address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiffAction {
    /// The resource will be created.
    Create,
    /// The resource will be updated in place.
    Update,
    /// The resource will be destroyed.
    Delete,
    /// The resource will be destroyed and created again.
    Replace,
}

impl DiffAction {
    /// Returns the stable label written to diff records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Replace => "replace",
        }
    }

    /// Reads the action of a diff record.
    ///
    /// # Errors
    ///
    /// Returns a reason when the record is not an object or names no known action.
    pub fn of(record: &ResourceInstance) -> Result<Self, String> {
        let Some(object) = record.as_value().as_object() else {
            return Err("diff record must be an object".to_string());
        };
        match object.get(ACTION_FIELD) {
            Some(Value::String(label)) => label.parse(),
            Some(_) => Err("diff action must be a string".to_string()),
            None => Err("diff record is missing an action".to_string()),
        }
    }

    /// Builds a diff record for this action.
    #[must_use]
    pub fn record(self, attributes: Map<String, Value>) -> ResourceInstance {
        let mut object = Map::new();
        object.insert(ACTION_FIELD.to_string(), Value::String(self.as_str().to_string()));
        object.insert(ATTRIBUTES_FIELD.to_string(), Value::Object(attributes));
        ResourceInstance::new(Value::Object(object))
    }
}

impl fmt::Display for DiffAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiffAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "replace" => Ok(Self::Replace),
            other => Err(format!("unknown diff action `{other}`")),
        }
    }
}

// ============================================================================
// SECTION: Diff
// ============================================================================

/// Proposed changes keyed by module and address.
///
/// # Invariants
/// - Every record names a valid [`DiffAction`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    /// Diff records grouped by module.
    resources: ModuleResources,
}

impl Diff {
    /// Builds a diff, validating every record's action.
    ///
    /// # Errors
    ///
    /// Returns a reason naming the first record without a valid action.
    pub fn new(resources: ModuleResources) -> Result<Self, String> {
        for (path, set) in resources.modules() {
            for (address, record) in set.iter() {
                DiffAction::of(record).map_err(|reason| format!("{path} {address}: {reason}"))?;
            }
        }
        Ok(Self {
            resources,
        })
    }

    /// Returns a diff proposing no changes.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            resources: ModuleResources::empty(),
        }
    }

    /// Returns all module-scoped diff records.
    #[must_use]
    pub const fn resources(&self) -> &ModuleResources {
        &self.resources
    }

    /// Returns the root module diff records.
    #[must_use]
    pub fn root_module(&self) -> &ResourceSet {
        self.resources.root_module()
    }

    /// Returns the proposed action for a root module address.
    #[must_use]
    pub fn action(&self, address: &ResourceAddress) -> Option<DiffAction> {
        self.root_module().get(address).and_then(|record| DiffAction::of(record).ok())
    }

    /// Derives the change tally across all modules.
    ///
    /// Replacements count once as an addition and once as a destruction.
    #[must_use]
    pub fn tally(&self) -> PlanTally {
        let mut tally = PlanTally::default();
        for (_, set) in self.resources.modules() {
            for (_, record) in set.iter() {
                match DiffAction::of(record) {
                    Ok(DiffAction::Create) => tally.add += 1,
                    Ok(DiffAction::Update) => tally.change += 1,
                    Ok(DiffAction::Delete) => tally.destroy += 1,
                    Ok(DiffAction::Replace) => {
                        tally.add += 1;
                        tally.destroy += 1;
                    }
                    Err(_) => {}
                }
            }
        }
        tally
    }
}

// ============================================================================
// SECTION: Plan
// ============================================================================

/// Decoded plan artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    /// Prior state the plan was computed against.
    state: State,
    /// Proposed changes.
    diff: Diff,
}

impl Plan {
    /// Creates a plan from its prior state and diff.
    #[must_use]
    pub const fn new(state: State, diff: Diff) -> Self {
        Self {
            state,
            diff,
        }
    }

    /// Returns the prior state; empty for a fresh workspace.
    #[must_use]
    pub const fn state(&self) -> &State {
        &self.state
    }

    /// Returns the proposed changes.
    #[must_use]
    pub const fn diff(&self) -> &Diff {
        &self.diff
    }
}

// ============================================================================
// SECTION: Documents
// ============================================================================

/// Plan document as read from disk.
#[derive(Deserialize)]
struct PlanDocumentIn<'a> {
    /// Embedded prior state document, re-parsed by the state decoder.
    #[serde(default, borrow)]
    state: Option<&'a RawValue>,
    /// Proposed changes.
    diff: DiffDocument,
}

/// Plan document as written to disk.
#[derive(Serialize)]
struct PlanDocumentOut {
    /// Format version.
    format_version: u64,
    /// Embedded prior state.
    state: StateV3Document,
    /// Proposed changes.
    diff: DiffDocument,
}

/// Diff section of a plan document.
#[derive(Serialize, Deserialize)]
struct DiffDocument {
    /// Module entries.
    #[serde(default)]
    modules: Vec<LegacyModule>,
}

/// Minimal shape used to dispatch on the plan format version.
#[derive(Deserialize)]
struct FormatProbe {
    /// Declared format version.
    format_version: u64,
}

// ============================================================================
// SECTION: Decoding
// ============================================================================

/// Parses a plan document.
pub(super) fn parse_plan_document(bytes: &[u8]) -> Result<Plan, ArtifactError> {
    let probe: FormatProbe = serde_json::from_slice(bytes)
        .map_err(|err| ArtifactError::malformed(ArtifactKind::Plan, err))?;
    if probe.format_version != PLAN_FORMAT_VERSION {
        return Err(ArtifactError::UnsupportedVersion {
            kind: ArtifactKind::Plan,
            version: probe.format_version,
        });
    }
    let document: PlanDocumentIn<'_> = serde_json::from_slice(bytes)
        .map_err(|err| ArtifactError::malformed(ArtifactKind::Plan, err))?;
    let state = match document.state {
        Some(raw) => parse_state_document(raw.get().as_bytes()).map_err(|err| {
            ArtifactError::malformed(ArtifactKind::Plan, format!("embedded state: {err}"))
        })?,
        None => State::empty(),
    };
    let resources = modules_from_legacy(ArtifactKind::Plan, document.diff.modules)?;
    let diff = Diff::new(resources)
        .map_err(|reason| ArtifactError::malformed(ArtifactKind::Plan, reason))?;
    Ok(Plan::new(state, diff))
}

// ============================================================================
// SECTION: Encoding
// ============================================================================

/// Encodes a plan as a pretty-printed plan document.
pub(super) fn encode_plan_document(plan: &Plan) -> Result<Vec<u8>, ArtifactError> {
    let document = PlanDocumentOut {
        format_version: PLAN_FORMAT_VERSION,
        state: state_to_v3(&plan.state),
        diff: DiffDocument {
            modules: modules_to_legacy(&plan.diff.resources),
        },
    };
    serde_json::to_vec_pretty(&document).map_err(|err| ArtifactError::Encode {
        kind: ArtifactKind::Plan,
        reason: err.to_string(),
    })
}
