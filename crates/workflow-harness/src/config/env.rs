// crates/workflow-harness/src/config/env.rs
// ============================================================================
// Module: Harness Environment
// Description: Environment-backed configuration for workflow runs.
// Purpose: Centralize env parsing with strict UTF-8 validation.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Environment values are parsed with strict UTF-8 enforcement to avoid silent
//! misconfiguration. Invalid UTF-8, empty values and unrecognized literals fail
//! closed. Loading goes through a lookup function so callers can supply a
//! fixed environment instead of the process environment.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::ffi::OsString;
use std::path::PathBuf;

use thiserror::Error;

use crate::artifact::DEFAULT_MAX_ARTIFACT_BYTES;
use crate::orchestrator::NetworkAccess;

// ============================================================================
// SECTION: Environment Constants
// ============================================================================

/// Environment keys for harness configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessEnv {
    /// Provisioning tool binary.
    ToolBinary,
    /// Directory holding fixture templates.
    TemplateRoot,
    /// Optional parent directory for fixture directories.
    RunRoot,
    /// Network capability (`true`/`false` or `1`/`0`).
    AllowNetwork,
    /// Retain fixture directories after the run (`true`/`false` or `1`/`0`).
    KeepFixtures,
    /// Artifact read limit in bytes (positive integer).
    MaxArtifactBytes,
}

impl HarnessEnv {
    /// All keys, in documentation order.
    pub const ALL: [Self; 6] = [
        Self::ToolBinary,
        Self::TemplateRoot,
        Self::RunRoot,
        Self::AllowNetwork,
        Self::KeepFixtures,
        Self::MaxArtifactBytes,
    ];

    /// Returns the canonical environment variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ToolBinary => "WORKFLOW_HARNESS_TOOL_BIN",
            Self::TemplateRoot => "WORKFLOW_HARNESS_TEMPLATE_ROOT",
            Self::RunRoot => "WORKFLOW_HARNESS_RUN_ROOT",
            Self::AllowNetwork => "WORKFLOW_HARNESS_ALLOW_NETWORK",
            Self::KeepFixtures => "WORKFLOW_HARNESS_KEEP_FIXTURES",
            Self::MaxArtifactBytes => "WORKFLOW_HARNESS_MAX_ARTIFACT_BYTES",
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The value is not valid UTF-8.
    #[error("{0} must be valid UTF-8")]
    InvalidUtf8(&'static str),
    /// The value is set but empty or whitespace.
    #[error("{0} must not be empty")]
    Empty(&'static str),
    /// The value is not a recognized boolean literal.
    #[error("{0} must be 1, 0, true, or false")]
    InvalidBool(&'static str),
    /// The value is not a positive integer.
    #[error("{0} must be a positive integer")]
    InvalidInteger(&'static str),
}

// ============================================================================
// SECTION: Config Types
// ============================================================================

/// Typed harness configuration derived from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Provisioning tool binary.
    pub tool_binary: Option<PathBuf>,
    /// Directory holding fixture templates.
    pub template_root: Option<PathBuf>,
    /// Parent directory for fixture directories; system temp dir when unset.
    pub run_root: Option<PathBuf>,
    /// Network capability handed to the orchestrator.
    pub network: NetworkAccess,
    /// Retain fixture directories after the run.
    pub keep_fixtures: bool,
    /// Artifact read limit in bytes.
    pub max_artifact_bytes: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            tool_binary: None,
            template_root: None,
            run_root: None,
            network: NetworkAccess::Denied,
            keep_fixtures: false,
            max_artifact_bytes: DEFAULT_MAX_ARTIFACT_BYTES,
        }
    }
}

impl HarnessConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a value is not valid UTF-8, is empty, or
    /// fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(process_env)
    }

    /// Loads configuration through a variable lookup function.
    ///
    /// # Errors
    ///
    /// See [`HarnessConfig::load`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let read = |key: HarnessEnv| read_env_nonempty(key, lookup(key.as_str()));
        let tool_binary = read(HarnessEnv::ToolBinary)?.map(PathBuf::from);
        let template_root = read(HarnessEnv::TemplateRoot)?.map(PathBuf::from);
        let run_root = read(HarnessEnv::RunRoot)?.map(PathBuf::from);
        let allow_network =
            parse_bool_env(HarnessEnv::AllowNetwork, read(HarnessEnv::AllowNetwork)?)?;
        let network =
            if allow_network { NetworkAccess::Allowed } else { NetworkAccess::Denied };
        let keep_fixtures =
            parse_bool_env(HarnessEnv::KeepFixtures, read(HarnessEnv::KeepFixtures)?)?;
        let max_artifact_bytes = read(HarnessEnv::MaxArtifactBytes)?
            .map(|value| parse_positive(HarnessEnv::MaxArtifactBytes, &value))
            .transpose()?
            .unwrap_or(DEFAULT_MAX_ARTIFACT_BYTES);
        Ok(Self {
            tool_binary,
            template_root,
            run_root,
            network,
            keep_fixtures,
            max_artifact_bytes,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads a variable from the process environment.
fn process_env(name: &str) -> Option<OsString> {
    std::env::var_os(name)
}

/// Converts a raw value to UTF-8 and rejects empty values.
fn read_env_nonempty(key: HarnessEnv, raw: Option<OsString>) -> Result<Option<String>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value = raw.into_string().map_err(|_| ConfigError::InvalidUtf8(key.as_str()))?;
    if value.trim().is_empty() {
        return Err(ConfigError::Empty(key.as_str()));
    }
    Ok(Some(value))
}

/// Parses a positive integer value.
fn parse_positive(key: HarnessEnv, raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::InvalidInteger(key.as_str())),
    }
}

/// Parses a boolean value; unset means false.
fn parse_bool_env(key: HarnessEnv, raw: Option<String>) -> Result<bool, ConfigError> {
    let Some(value) = raw else {
        return Ok(false);
    };
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("true") || trimmed == "1" {
        return Ok(true);
    }
    if trimmed.eq_ignore_ascii_case("false") || trimmed == "0" {
        return Ok(false);
    }
    Err(ConfigError::InvalidBool(key.as_str()))
}
