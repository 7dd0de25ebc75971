// crates/workflow-harness/src/lib.rs
// ============================================================================
// Module: Workflow Harness Library
// Description: Lifecycle verification harness for provisioning CLI tools.
// Purpose: Drive init/plan/apply/destroy and verify every persisted artifact.
// Dependencies: regex, serde, serde_json, tempfile, thiserror, toml, tracing
// ============================================================================

//! ## Overview
//! The workflow harness drives an external provisioning tool through its
//! init, plan, apply and destroy stages inside an isolated [`WorkflowFixture`],
//! decodes the plan and state artifacts the tool persists, and verifies them
//! against the expected resource sets of a [`WorkflowScenario`].
//! Invariants:
//! - Text tallies are only ever cross-checked against decoded artifacts.
//! - Every persisted artifact is scanned for secret markers after every stage.
//! - Fixture directories are released on every exit path.
//!
//! Security posture: tool output and artifacts are untrusted input; file access
//! is confined to the fixture directory.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod address;
pub mod artifact;
pub mod config;
pub mod error;
pub mod fixture;
mod limits;
pub mod orchestrator;
pub mod report;
pub mod resources;
pub mod runner;
pub mod scenario;
pub mod secrets;
pub mod stage;
pub mod tally;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use address::InstanceKey;
pub use address::ModulePath;
pub use address::ResourceAddress;
pub use address::ResourceMode;
pub use artifact::ArtifactError;
pub use artifact::ArtifactKind;
pub use artifact::DEFAULT_MAX_ARTIFACT_BYTES;
pub use artifact::Diff;
pub use artifact::DiffAction;
pub use artifact::Plan;
pub use artifact::State;
pub use artifact::StateFormat;
pub use artifact::decode_plan;
pub use artifact::decode_plan_with_limit;
pub use artifact::decode_state;
pub use artifact::decode_state_with_limit;
pub use artifact::encode_plan;
pub use artifact::encode_state;
pub use artifact::parse_plan;
pub use artifact::parse_state;
pub use config::ConfigError;
pub use config::HarnessConfig;
pub use config::HarnessEnv;
pub use error::FileAccessError;
pub use error::FixtureSetupError;
pub use error::HarnessError;
pub use error::StageExecutionError;
pub use fixture::FixtureSource;
pub use fixture::WorkflowFixture;
pub use orchestrator::NetworkAccess;
pub use orchestrator::StageOrchestrator;
pub use orchestrator::run_workflow;
pub use report::Check;
pub use report::Mismatch;
pub use report::StageRecord;
pub use report::WorkflowOutcome;
pub use report::WorkflowReport;
pub use resources::ModuleResources;
pub use resources::ResourceInstance;
pub use resources::ResourceSet;
pub use resources::ResourceSetError;
pub use resources::SetDifference;
pub use runner::CommandResult;
pub use runner::ProcessRunner;
pub use runner::ToolRunner;
pub use scenario::ArtifactFiles;
pub use scenario::ScenarioError;
pub use scenario::WorkflowScenario;
pub use secrets::SecretFinding;
pub use secrets::SecretScanReport;
pub use secrets::find_secret;
pub use secrets::scan_files;
pub use secrets::scan_fixture;
pub use secrets::scan_for_secret;
pub use stage::Stage;
pub use stage::WorkflowState;
pub use tally::ApplyTally;
pub use tally::DestroyTally;
pub use tally::PlanTally;
pub use tally::parse_apply_tally;
pub use tally::parse_destroy_tally;
pub use tally::parse_plan_tally;

// ============================================================================
// SECTION: Tests
// ============================================================================
