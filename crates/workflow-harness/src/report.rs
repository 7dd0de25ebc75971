// crates/workflow-harness/src/report.rs
// ============================================================================
// Module: Workflow Reports
// Description: Serializable record of one workflow run.
// Purpose: Carry every mismatch with enough context to diagnose without rerunning.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`WorkflowReport`] collects per-stage records, every [`Mismatch`] and the
//! final [`WorkflowOutcome`]. Reports serialize to JSON for machine
//! consumption and render to plain text for humans.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::fmt::Write as _;

use serde::Serialize;

use crate::runner::CommandResult;
use crate::stage::Stage;

// ============================================================================
// SECTION: Mismatches
// ============================================================================

/// Kind of verification that disagreed with expectations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    /// A provider download notice was missing from init output.
    ProviderNotice,
    /// An artifact existed where none was expected.
    StrayArtifact,
    /// A stdout tally disagreed with the decoded artifact.
    Tally,
    /// A decoded address set differed from the expected set.
    ResourceSet,
    /// A persisted artifact contained the secret marker.
    SecretLeak,
    /// An expected artifact was absent.
    MissingArtifact,
}

impl Check {
    /// Returns a stable label for the check.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProviderNotice => "provider_notice",
            Self::StrayArtifact => "stray_artifact",
            Self::Tally => "tally",
            Self::ResourceSet => "resource_set",
            Self::SecretLeak => "secret_leak",
            Self::MissingArtifact => "missing_artifact",
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed disagreement with expectations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    /// Stage during which the mismatch was observed.
    pub stage: Stage,
    /// Verification kind.
    pub check: Check,
    /// What was checked, e.g. an artifact file or `stdout`.
    pub subject: String,
    /// Expected value, rendered.
    pub expected: String,
    /// Actual value, rendered.
    pub actual: String,
    /// Raw stage stdout.
    pub stdout: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} mismatch on {}: expected {}, got {}",
            self.stage, self.check, self.subject, self.expected, self.actual
        )
    }
}

// ============================================================================
// SECTION: Stage Records
// ============================================================================

/// Record of one executed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageRecord {
    /// Executed stage.
    pub stage: Stage,
    /// Arguments passed after the stage command.
    pub args: Vec<String>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Reported failure, if any.
    pub error: Option<String>,
    /// Artifact files scanned for the secret marker after the stage.
    pub scanned_artifacts: Vec<String>,
}

impl StageRecord {
    /// Builds a record from a command result.
    #[must_use]
    pub fn from_result(stage: Stage, args: &[String], result: &CommandResult) -> Self {
        Self {
            stage,
            args: args.to_vec(),
            stdout: result.stdout.clone(),
            stderr: result.stderr.clone(),
            error: result.error.clone(),
            scanned_artifacts: Vec::new(),
        }
    }
}

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Final classification of a workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkflowOutcome {
    /// Every stage ran and no mismatch was recorded.
    Passed,
    /// Every stage ran but mismatches were recorded.
    Failed,
    /// A fatal error stopped the run.
    Aborted {
        /// Rendered error.
        error: String,
    },
    /// The run was not attempted.
    Skipped {
        /// Reason for skipping.
        reason: String,
    },
}

impl WorkflowOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Aborted {
                ..
            } => "aborted",
            Self::Skipped {
                ..
            } => "skipped",
        }
    }
}

// ============================================================================
// SECTION: Report
// ============================================================================

/// Complete record of one workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowReport {
    /// Scenario name.
    pub scenario: String,
    /// Fixture template name.
    pub template: String,
    /// Final outcome.
    pub outcome: WorkflowOutcome,
    /// Executed stages in order.
    pub stages: Vec<StageRecord>,
    /// Every recorded mismatch in observation order.
    pub mismatches: Vec<Mismatch>,
    /// Fixture cleanup failure, if any.
    pub cleanup_error: Option<String>,
}

impl WorkflowReport {
    /// Creates an empty report for a scenario.
    #[must_use]
    pub fn new(scenario: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            template: template.into(),
            outcome: WorkflowOutcome::Passed,
            stages: Vec::new(),
            mismatches: Vec::new(),
            cleanup_error: None,
        }
    }

    /// Returns true when the run passed.
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self.outcome, WorkflowOutcome::Passed)
    }

    /// Returns true for passed or skipped runs.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, WorkflowOutcome::Passed | WorkflowOutcome::Skipped { .. })
    }

    /// Returns the mismatches recorded for one stage.
    pub fn mismatches_for(&self, stage: Stage) -> impl Iterator<Item = &Mismatch> {
        self.mismatches.iter().filter(move |mismatch| mismatch.stage == stage)
    }

    /// Renders the report as plain text.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "scenario {} ({}): {}", self.scenario, self.template, self.outcome.as_str());
        match &self.outcome {
            WorkflowOutcome::Aborted {
                error,
            } => {
                let _ = writeln!(out, "  error: {error}");
            }
            WorkflowOutcome::Skipped {
                reason,
            } => {
                let _ = writeln!(out, "  reason: {reason}");
            }
            WorkflowOutcome::Passed | WorkflowOutcome::Failed => {}
        }
        for record in &self.stages {
            let status = if record.error.is_some() { "error" } else { "ok" };
            let _ = writeln!(out, "  {} [{}] {}", record.stage, status, record.args.join(" "));
            if !record.scanned_artifacts.is_empty() {
                let _ = writeln!(out, "    scanned: {}", record.scanned_artifacts.join(", "));
            }
        }
        for mismatch in &self.mismatches {
            let _ = writeln!(out, "  mismatch: {mismatch}");
        }
        if let Some(error) = &self.cleanup_error {
            let _ = writeln!(out, "  cleanup error: {error}");
        }
        out
    }
}
