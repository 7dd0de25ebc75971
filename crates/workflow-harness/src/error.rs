// crates/workflow-harness/src/error.rs
// ============================================================================
// Module: Harness Errors
// Description: Error taxonomy for fixture setup, stage execution and file access.
// Purpose: Separate fatal failures from recorded assertion mismatches.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Fatal failures are errors; assertion mismatches are data recorded in the
//! [`crate::WorkflowReport`]. Setup and stage-execution errors abort the
//! remaining stages, while mismatches accumulate so one run surfaces all of
//! them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::artifact::ArtifactError;
use crate::scenario::ScenarioError;
use crate::stage::Stage;
use crate::stage::WorkflowState;

// ============================================================================
// SECTION: Fixture Setup
// ============================================================================

/// Errors raised while creating a workflow fixture.
#[derive(Debug, Error)]
pub enum FixtureSetupError {
    /// The template name is not a single plain path segment.
    #[error("invalid template name `{0}`")]
    InvalidTemplateName(String),
    /// No template root directory was configured.
    #[error("no template root configured")]
    NoTemplateRoot,
    /// The named template directory does not exist.
    #[error("template `{}` not found at {}", .name, .path.display())]
    TemplateMissing {
        /// Template name.
        name: String,
        /// Expected template directory.
        path: PathBuf,
    },
    /// The temporary directory could not be created.
    #[error("failed to create fixture directory: {0}")]
    Create(#[source] io::Error),
    /// A template entry could not be copied.
    #[error("failed to copy template entry {}: {}", .path.display(), .source)]
    Copy {
        /// Source entry.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

// ============================================================================
// SECTION: Stage Execution
// ============================================================================

/// The tool reported failure for a stage.
#[derive(Debug, Clone, Error)]
#[error("{stage} failed: {error}")]
pub struct StageExecutionError {
    /// Failed stage.
    pub stage: Stage,
    /// Error reported by the command collaborator.
    pub error: String,
    /// Captured standard error.
    pub stderr: String,
}

// ============================================================================
// SECTION: File Access
// ============================================================================

/// Errors raised by fixture-scoped file access.
#[derive(Debug, Error)]
pub enum FileAccessError {
    /// The relative path would leave the fixture directory.
    #[error("path escapes fixture directory: {0}")]
    PathEscape(String),
    /// The file could not be read or inspected.
    #[error("failed to access {}: {}", .path.display(), .source)]
    Io {
        /// Resolved path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The file exceeds the read limit.
    #[error("{} exceeds size limit ({} > {} bytes)", .path.display(), .size, .limit)]
    TooLarge {
        /// Resolved path.
        path: PathBuf,
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

impl FileAccessError {
    /// Returns true when the file was absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

// ============================================================================
// SECTION: Harness
// ============================================================================

/// Fatal workflow errors.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The fixture could not be created.
    #[error(transparent)]
    FixtureSetup(#[from] FixtureSetupError),
    /// A stage reported failure.
    #[error(transparent)]
    StageExecution(#[from] StageExecutionError),
    /// A persisted artifact could not be decoded.
    #[error("{stage}: cannot decode {file}: {source}")]
    ArtifactFormat {
        /// Stage that produced the artifact.
        stage: Stage,
        /// Artifact file relative to the fixture.
        file: String,
        /// Decoder error.
        #[source]
        source: ArtifactError,
    },
    /// Fixture-scoped file access failed.
    #[error(transparent)]
    FileAccess(#[from] FileAccessError),
    /// A stage was requested out of lifecycle order.
    #[error("{stage} cannot run from state {}", .current.map_or("fresh", WorkflowState::as_str))]
    OutOfOrder {
        /// Requested stage.
        stage: Stage,
        /// Current state; `None` before init.
        current: Option<WorkflowState>,
    },
    /// A stage was requested after a fatal error.
    #[error("{stage} not attempted: workflow aborted")]
    Aborted {
        /// Requested stage.
        stage: Stage,
    },
    /// The scenario failed validation.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
}
