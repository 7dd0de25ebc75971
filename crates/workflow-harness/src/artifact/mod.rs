// crates/workflow-harness/src/artifact/mod.rs
// ============================================================================
// Module: Artifact Decoder
// Description: Decoding and encoding of persisted plan and state artifacts.
// Purpose: Turn artifact files into the structured resource model.
// Dependencies: serde, serde_json, thiserror, tracing
// ============================================================================

//! ## Overview
//! The decoder reads the two artifact kinds the provisioning tool persists:
//! a [`Plan`] (proposed changes) and a [`State`] (current reality). Only
//! addresses, instance keys, module scoping and diff actions are extracted;
//! resource records stay opaque.
//! Invariants:
//! - A missing file is reported as [`ArtifactError::NotFound`], never as
//!   [`ArtifactError::Malformed`].
//! - Identical bytes always decode to identical models.
//! - Reads are capped at a byte limit ([`DEFAULT_MAX_ARTIFACT_BYTES`] by default).

// ============================================================================
// SECTION: Modules
// ============================================================================

mod document;
mod plan;
mod state;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use crate::limits::ReadLimitError;
use crate::limits::read_bytes_with_limit;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use plan::Diff;
pub use plan::DiffAction;
pub use plan::PLAN_FORMAT_VERSION;
pub use plan::Plan;
pub use state::State;
pub use state::StateFormat;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default maximum artifact size accepted by the decoder.
pub const DEFAULT_MAX_ARTIFACT_BYTES: usize = 64 * 1024 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Artifact kinds persisted by the provisioning tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Proposed-change artifact written by the plan stage.
    Plan,
    /// Current-reality artifact written by apply and destroy.
    State,
}

impl ArtifactKind {
    /// Returns a stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::State => "state",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Artifact decode and encode errors.
///
/// # Invariants
/// - Absence ([`ArtifactError::NotFound`]) is distinct from every content error.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The artifact file does not exist.
    #[error("{} artifact not found at {}", .kind, .path.display())]
    NotFound {
        /// Artifact kind.
        kind: ArtifactKind,
        /// Path that was read.
        path: PathBuf,
    },
    /// The artifact file exists but could not be read.
    #[error("failed to read {} artifact at {}: {}", .kind, .path.display(), .source)]
    Io {
        /// Artifact kind.
        kind: ArtifactKind,
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The artifact file exceeds the size limit.
    #[error("{} artifact at {} exceeds size limit ({} > {} bytes)", .kind, .path.display(), .size, .limit)]
    TooLarge {
        /// Artifact kind.
        kind: ArtifactKind,
        /// Path that was read.
        path: PathBuf,
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
    /// The artifact contents are truncated or violate the schema.
    #[error("{kind} artifact is malformed: {reason}")]
    Malformed {
        /// Artifact kind.
        kind: ArtifactKind,
        /// Human-readable reason.
        reason: String,
    },
    /// The artifact declares a version this decoder does not understand.
    #[error("{kind} artifact version {version} is not supported")]
    UnsupportedVersion {
        /// Artifact kind.
        kind: ArtifactKind,
        /// Declared version.
        version: u64,
    },
    /// The model could not be serialized.
    #[error("failed to encode {kind} artifact: {reason}")]
    Encode {
        /// Artifact kind.
        kind: ArtifactKind,
        /// Human-readable reason.
        reason: String,
    },
}

impl ArtifactError {
    /// Returns true when the artifact file was absent.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns the artifact kind the error refers to.
    #[must_use]
    pub const fn kind(&self) -> ArtifactKind {
        match self {
            Self::NotFound {
                kind,
                ..
            }
            | Self::Io {
                kind,
                ..
            }
            | Self::TooLarge {
                kind,
                ..
            }
            | Self::Malformed {
                kind,
                ..
            }
            | Self::UnsupportedVersion {
                kind,
                ..
            }
            | Self::Encode {
                kind,
                ..
            } => *kind,
        }
    }

    /// Builds a [`ArtifactError::Malformed`] from any displayable reason.
    pub(crate) fn malformed(kind: ArtifactKind, reason: impl fmt::Display) -> Self {
        Self::Malformed {
            kind,
            reason: reason.to_string(),
        }
    }
}

// ============================================================================
// SECTION: Decoding
// ============================================================================

/// Decodes a plan artifact file.
///
/// # Errors
///
/// Returns [`ArtifactError::NotFound`] when the file is absent and a content
/// error when it cannot be read or parsed.
pub fn decode_plan(path: &Path) -> Result<Plan, ArtifactError> {
    decode_plan_with_limit(path, DEFAULT_MAX_ARTIFACT_BYTES)
}

/// Decodes a plan artifact file with an explicit size limit.
///
/// # Errors
///
/// See [`decode_plan`]; additionally returns [`ArtifactError::TooLarge`].
pub fn decode_plan_with_limit(path: &Path, max_bytes: usize) -> Result<Plan, ArtifactError> {
    let bytes = read_artifact(path, ArtifactKind::Plan, max_bytes)?;
    let plan = parse_plan(&bytes)?;
    debug!(
        path = %path.display(),
        state_resources = plan.state().root_module().count(),
        diff_resources = plan.diff().root_module().count(),
        "decoded plan artifact"
    );
    Ok(plan)
}

/// Decodes a state artifact file.
///
/// # Errors
///
/// Returns [`ArtifactError::NotFound`] when the file is absent and a content
/// error when it cannot be read or parsed.
pub fn decode_state(path: &Path) -> Result<State, ArtifactError> {
    decode_state_with_limit(path, DEFAULT_MAX_ARTIFACT_BYTES)
}

/// Decodes a state artifact file with an explicit size limit.
///
/// # Errors
///
/// See [`decode_state`]; additionally returns [`ArtifactError::TooLarge`].
pub fn decode_state_with_limit(path: &Path, max_bytes: usize) -> Result<State, ArtifactError> {
    let bytes = read_artifact(path, ArtifactKind::State, max_bytes)?;
    let state = parse_state(&bytes)?;
    debug!(
        path = %path.display(),
        version = state.format().version(),
        resources = state.root_module().count(),
        "decoded state artifact"
    );
    Ok(state)
}

/// Parses plan artifact bytes.
///
/// # Errors
///
/// Returns [`ArtifactError::Malformed`] or [`ArtifactError::UnsupportedVersion`].
pub fn parse_plan(bytes: &[u8]) -> Result<Plan, ArtifactError> {
    plan::parse_plan_document(bytes)
}

/// Parses state artifact bytes.
///
/// # Errors
///
/// Returns [`ArtifactError::Malformed`] or [`ArtifactError::UnsupportedVersion`].
pub fn parse_state(bytes: &[u8]) -> Result<State, ArtifactError> {
    state::parse_state_document(bytes)
}

// ============================================================================
// SECTION: Encoding
// ============================================================================

/// Encodes a plan as a synthetic plan artifact.
///
/// # Errors
///
/// Returns [`ArtifactError::Encode`] when serialization fails.
pub fn encode_plan(plan: &Plan) -> Result<Vec<u8>, ArtifactError> {
    plan::encode_plan_document(plan)
}

/// Encodes a state as a version 3 state artifact.
///
/// # Errors
///
/// Returns [`ArtifactError::Encode`] when serialization fails.
pub fn encode_state(state: &State) -> Result<Vec<u8>, ArtifactError> {
    state::encode_state_document(state)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads artifact bytes, separating absence from other failures.
fn read_artifact(path: &Path, kind: ArtifactKind, max_bytes: usize) -> Result<Vec<u8>, ArtifactError> {
    read_bytes_with_limit(path, max_bytes).map_err(|err| match err {
        ReadLimitError::Io(source) if source.kind() == io::ErrorKind::NotFound => {
            ArtifactError::NotFound {
                kind,
                path: path.to_path_buf(),
            }
        }
        ReadLimitError::Io(source) => ArtifactError::Io {
            kind,
            path: path.to_path_buf(),
            source,
        },
        ReadLimitError::TooLarge {
            size,
            limit,
        } => ArtifactError::TooLarge {
            kind,
            path: path.to_path_buf(),
            size,
            limit,
        },
    })
}
