// system-tests/src/stub/fault.rs
// ============================================================================
// Module: Stub Fault Injection
// Description: Parses fault directives for the stub provisioning tool.
// Purpose: Let suites provoke failures, leaks and misreports at a chosen stage.
// Dependencies: workflow-harness
// ============================================================================

//! ## Overview
//! A fault directive has the form `<kind>:<stage>`, for example `leak:apply`,
//! and is read from [`FAULT_ENV`]. The stub applies it only when the running
//! stage matches.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use workflow_harness::Stage;

use crate::stub::StubError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable holding the fault directive.
pub const FAULT_ENV: &str = "STUB_PROVISIONER_FAULT";

// ============================================================================
// SECTION: Fault Types
// ============================================================================

/// Kind of injected fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Exit with failure before doing any work.
    Fail,
    /// Persist sensitive attributes.
    Leak,
    /// Inflate the printed tally by one; at init, omit provider notices.
    Misreport,
    /// Truncate the artifact written by the stage.
    Corrupt,
}

impl FaultKind {
    /// Returns the directive label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::Leak => "leak",
            Self::Misreport => "misreport",
            Self::Corrupt => "corrupt",
        }
    }
}

/// Fault applied at one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    /// Fault kind.
    pub kind: FaultKind,
    /// Stage at which the fault fires.
    pub stage: Stage,
}

impl Fault {
    /// Creates a fault.
    #[must_use]
    pub const fn new(kind: FaultKind, stage: Stage) -> Self {
        Self {
            kind,
            stage,
        }
    }

    /// Returns the directive text for [`FAULT_ENV`].
    #[must_use]
    pub fn directive(self) -> String {
        self.to_string()
    }

    /// Reads the directive from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`StubError::InvalidFault`] when the variable is set but is not
    /// valid UTF-8 or not a valid directive.
    pub fn from_env() -> Result<Option<Self>, StubError> {
        match std::env::var_os(FAULT_ENV) {
            None => Ok(None),
            Some(raw) => {
                let text = raw
                    .into_string()
                    .map_err(|_| StubError::InvalidFault(format!("{FAULT_ENV} must be valid UTF-8")))?;
                if text.trim().is_empty() { Ok(None) } else { text.parse().map(Some) }
            }
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.stage)
    }
}

impl FromStr for Fault {
    type Err = StubError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || StubError::InvalidFault(format!("expected <kind>:<stage>, got '{input}'"));
        let (kind, stage) = input.trim().split_once(':').ok_or_else(invalid)?;
        let kind = match kind {
            "fail" => FaultKind::Fail,
            "leak" => FaultKind::Leak,
            "misreport" => FaultKind::Misreport,
            "corrupt" => FaultKind::Corrupt,
            _ => return Err(invalid()),
        };
        let stage = Stage::from_command(stage).ok_or_else(invalid)?;
        Ok(Self::new(kind, stage))
    }
}

/// Returns true when `fault` is of `kind` and fires at `stage`.
#[must_use]
pub fn fires(fault: Option<Fault>, kind: FaultKind, stage: Stage) -> bool {
    fault.is_some_and(|fault| fault.kind == kind && fault.stage == stage)
}
