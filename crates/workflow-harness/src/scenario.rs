// crates/workflow-harness/src/scenario.rs
// ============================================================================
// Module: Workflow Scenarios
// Description: TOML scenario files describing one lifecycle verification.
// Purpose: Declare the template, stage arguments and expected resource sets.
// Dependencies: serde, toml, thiserror
// ============================================================================

//! ## Overview
//! A [`WorkflowScenario`] names the fixture template, the secret marker, the
//! artifact file names and, per stage, the arguments to pass and the resource
//! addresses expected afterwards. Unknown keys are rejected so typos surface
//! as errors instead of silently weakening a check.
//!
//! ```toml
//! name = "primary-separate-plan"
//! template = "full-workflow-null"
//! requires_network = true
//!
//! [init]
//! provider_downloads = ["template", "null"]
//!
//! [plan]
//! state = ["data.template_file.test"]
//! diff = ["null_resource.test", "null_resource.no_store"]
//!
//! [apply]
//! state = ["data.template_file.test", "null_resource.test", "null_resource.no_store"]
//! ```

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::address::ResourceAddress;
use crate::fixture::is_plain_segment;

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default secret marker searched for in persisted artifacts.
pub const DEFAULT_SECRET_MARKER: &str = "SECRET";

/// Default plan artifact file name.
pub const DEFAULT_PLAN_FILE: &str = "tfplan";

/// Default state artifact file name.
pub const DEFAULT_STATE_FILE: &str = "terraform.tfstate";

/// Default state backup file name.
pub const DEFAULT_STATE_BACKUP_FILE: &str = "terraform.tfstate.backup";

/// Serde default for the secret marker.
fn default_secret_marker() -> String {
    DEFAULT_SECRET_MARKER.to_string()
}

/// Serde default for destroy arguments.
fn default_destroy_args() -> Vec<String> {
    vec!["-force".to_string()]
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Scenario loading and validation errors.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// The scenario file could not be read.
    #[error("failed to read scenario {}: {}", .path.display(), .source)]
    Io {
        /// Scenario path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The scenario is not valid TOML or does not match the schema.
    #[error("invalid scenario document: {0}")]
    Parse(String),
    /// A field failed validation.
    #[error("invalid scenario field `{field}`: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },
}

// ============================================================================
// SECTION: Scenario Types
// ============================================================================

/// Artifact file names inside the fixture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ArtifactFiles {
    /// Plan file passed to `-out=`.
    pub plan_file: String,
    /// State file.
    pub state_file: String,
    /// State backup file.
    pub state_backup_file: String,
}

impl Default for ArtifactFiles {
    fn default() -> Self {
        Self {
            plan_file: DEFAULT_PLAN_FILE.to_string(),
            state_file: DEFAULT_STATE_FILE.to_string(),
            state_backup_file: DEFAULT_STATE_BACKUP_FILE.to_string(),
        }
    }
}

impl ArtifactFiles {
    /// Returns every persisted artifact file, scanned after each stage.
    #[must_use]
    pub fn persisted(&self) -> [&str; 3] {
        [&self.state_file, &self.state_backup_file, &self.plan_file]
    }
}

/// Expectations for the init stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct InitExpectations {
    /// Extra arguments.
    pub args: Vec<String>,
    /// Providers whose download notice must appear in stdout.
    pub provider_downloads: Vec<String>,
}

/// Expectations for the plan stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PlanExpectations {
    /// Extra arguments, passed after `-out=<plan file>`.
    pub args: Vec<String>,
    /// Expected root addresses of the plan's prior state.
    pub state: BTreeSet<ResourceAddress>,
    /// Expected root addresses of the plan's diff.
    pub diff: BTreeSet<ResourceAddress>,
}

/// Expectations for the apply stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ApplyExpectations {
    /// Extra arguments, passed before the plan file.
    pub args: Vec<String>,
    /// Expected root addresses of the state after apply.
    pub state: BTreeSet<ResourceAddress>,
}

/// Expectations for the destroy stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DestroyExpectations {
    /// Arguments; `-force` when omitted.
    #[serde(default = "default_destroy_args")]
    pub args: Vec<String>,
    /// Expected root addresses of the state after destroy; empty when omitted.
    #[serde(default)]
    pub state: BTreeSet<ResourceAddress>,
}

impl Default for DestroyExpectations {
    fn default() -> Self {
        Self {
            args: default_destroy_args(),
            state: BTreeSet::new(),
        }
    }
}

/// One lifecycle verification scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowScenario {
    /// Scenario name used in reports.
    pub name: String,
    /// Fixture template name under the template root.
    pub template: String,
    /// Skip the scenario unless network access is allowed.
    #[serde(default)]
    pub requires_network: bool,
    /// Marker that must never appear in a persisted artifact.
    #[serde(default = "default_secret_marker")]
    pub secret_marker: String,
    /// Artifact file names.
    #[serde(default)]
    pub artifacts: ArtifactFiles,
    /// Init expectations.
    #[serde(default)]
    pub init: InitExpectations,
    /// Plan expectations.
    #[serde(default)]
    pub plan: PlanExpectations,
    /// Apply expectations.
    #[serde(default)]
    pub apply: ApplyExpectations,
    /// Destroy expectations.
    #[serde(default)]
    pub destroy: DestroyExpectations,
}

impl WorkflowScenario {
    /// Creates a scenario with default expectations.
    #[must_use]
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            requires_network: false,
            secret_marker: default_secret_marker(),
            artifacts: ArtifactFiles::default(),
            init: InitExpectations::default(),
            plan: PlanExpectations::default(),
            apply: ApplyExpectations::default(),
            destroy: DestroyExpectations::default(),
        }
    }

    /// Parses and validates a scenario from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::Parse`] for invalid TOML or unknown keys and
    /// [`ScenarioError::Invalid`] when validation fails.
    pub fn from_toml_str(input: &str) -> Result<Self, ScenarioError> {
        let scenario: Self =
            toml::from_str(input).map_err(|err| ScenarioError::Parse(err.to_string()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Loads and validates a scenario file.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::Io`] when the file cannot be read, otherwise
    /// see [`WorkflowScenario::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let input = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    /// Validates names, the marker and artifact file names.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.name.trim().is_empty() {
            return Err(invalid("name", "must not be empty"));
        }
        if self.secret_marker.is_empty() {
            return Err(invalid("secret_marker", "must not be empty"));
        }
        if !is_plain_segment(&self.template) {
            return Err(invalid("template", "must be a single plain path segment"));
        }
        let files = [
            ("artifacts.plan_file", self.artifacts.plan_file.as_str()),
            ("artifacts.state_file", self.artifacts.state_file.as_str()),
            ("artifacts.state_backup_file", self.artifacts.state_backup_file.as_str()),
        ];
        for (field, file) in files {
            if !is_plain_segment(file) {
                return Err(invalid(field, "must be a single plain path segment"));
            }
        }
        let distinct: BTreeSet<&str> = files.iter().map(|(_, file)| *file).collect();
        if distinct.len() != files.len() {
            return Err(invalid("artifacts", "file names must be distinct"));
        }
        Ok(())
    }
}

/// Builds a validation error.
fn invalid(field: &'static str, reason: &str) -> ScenarioError {
    ScenarioError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
