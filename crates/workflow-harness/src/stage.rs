// crates/workflow-harness/src/stage.rs
// ============================================================================
// Module: Workflow Stages
// Description: Lifecycle stages and the states they transition between.
// Purpose: Encode the strict init -> plan -> apply -> destroy ordering.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`Stage`] names the four tool invocations and their command words.
//! [`WorkflowState`] is the state reached after each stage completes; a stage
//! may only run from the state its predecessor leaves behind.

use std::fmt;

use serde::Serialize;

/// One lifecycle stage of the provisioning tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Prepares the working directory and downloads providers.
    Init,
    /// Computes and saves proposed changes.
    Plan,
    /// Applies a saved plan.
    Apply,
    /// Destroys every managed resource.
    Destroy,
}

impl Stage {
    /// All stages in lifecycle order.
    pub const ALL: [Self; 4] = [Self::Init, Self::Plan, Self::Apply, Self::Destroy];

    /// Returns the subcommand name passed to the tool.
    #[must_use]
    pub const fn command(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Plan => "plan",
            Self::Apply => "apply",
            Self::Destroy => "destroy",
        }
    }

    /// Returns the state the orchestrator must be in before this stage runs.
    /// `None` means the stage runs from a fresh fixture.
    #[must_use]
    pub const fn required_state(self) -> Option<WorkflowState> {
        match self {
            Self::Init => None,
            Self::Plan => Some(WorkflowState::Initialized),
            Self::Apply => Some(WorkflowState::Planned),
            Self::Destroy => Some(WorkflowState::Applied),
        }
    }

    /// Returns the state reached when this stage succeeds.
    #[must_use]
    pub const fn target_state(self) -> WorkflowState {
        match self {
            Self::Init => WorkflowState::Initialized,
            Self::Plan => WorkflowState::Planned,
            Self::Apply => WorkflowState::Applied,
            Self::Destroy => WorkflowState::Destroyed,
        }
    }

    /// Parses a subcommand name.
    #[must_use]
    pub fn from_command(command: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.command() == command)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

/// Orchestrator state after a completed stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// Init completed.
    Initialized,
    /// Plan completed.
    Planned,
    /// Apply completed.
    Applied,
    /// Destroy completed.
    Destroyed,
}

impl WorkflowState {
    /// Returns a stable label for the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Planned => "planned",
            Self::Applied => "applied",
            Self::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
