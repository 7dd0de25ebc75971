// crates/workflow-harness/src/orchestrator.rs
// ============================================================================
// Module: Stage Orchestrator
// Description: Lifecycle state machine driving and verifying each stage.
// Purpose: Cross-check tool output against decoded artifacts at every stage.
// Dependencies: tracing
// ============================================================================

//! ## Overview
//! [`StageOrchestrator`] walks init, plan, apply and destroy in order over one
//! [`WorkflowFixture`]. After each stage it scans every persisted artifact for
//! the secret marker, then decodes the stage's artifact and checks:
//! - the stdout tally against counts derived from the decoded artifact, and
//! - the decoded root address set against the expected set, exactly.
//!
//! Tallies cover every module, so count checks use totals across all modules
//! while set checks consult the root module only.
//!
//! Mismatches are recorded and checking continues, so one run surfaces all of
//! them. A tool failure, an undecodable artifact or a file access failure is
//! fatal: the orchestrator marks itself aborted and later stages return
//! [`HarnessError::Aborted`]. Stages are never retried.
//!
//! [`run_workflow`] wraps a full run: validation, the network capability
//! check, fixture creation, the four stages and unconditional cleanup.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::info;
use tracing::warn;

use crate::address::ResourceAddress;
use crate::artifact::Plan;
use crate::artifact::State;
use crate::artifact::decode_plan_with_limit;
use crate::artifact::decode_state_with_limit;
use crate::error::HarnessError;
use crate::error::StageExecutionError;
use crate::fixture::FixtureSource;
use crate::fixture::WorkflowFixture;
use crate::report::Check;
use crate::report::Mismatch;
use crate::report::StageRecord;
use crate::report::WorkflowOutcome;
use crate::report::WorkflowReport;
use crate::resources::ResourceSet;
use crate::resources::render_addresses;
use crate::runner::CommandResult;
use crate::runner::ToolRunner;
use crate::scenario::WorkflowScenario;
use crate::secrets::scan_fixture;
use crate::stage::Stage;
use crate::stage::WorkflowState;
use crate::tally::ApplyTally;
use crate::tally::has_provider_download;
use crate::tally::parse_apply_tally;
use crate::tally::parse_destroy_tally;
use crate::tally::parse_plan_tally;
use crate::tally::provider_download_notice;

// ============================================================================
// SECTION: Network Capability
// ============================================================================

/// Whether the run may reach the network (for provider downloads).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkAccess {
    /// Network access is available.
    Allowed,
    /// Network access is unavailable; scenarios requiring it are skipped.
    Denied,
}

impl NetworkAccess {
    /// Returns true when network access is available.
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Rendered placeholder for a tally line absent from stdout.
const NO_TALLY: &str = "no tally line";

/// Lifecycle state machine over one fixture.
///
/// # Invariants
/// - Stages run only in lifecycle order, each at most once.
/// - Once aborted, no further stage is attempted.
pub struct StageOrchestrator<'a, R: ToolRunner + ?Sized> {
    /// Working directory for every stage.
    fixture: &'a WorkflowFixture,
    /// Tool collaborator.
    runner: &'a R,
    /// Stage arguments and expectations.
    scenario: &'a WorkflowScenario,
    /// Last completed state; `None` before init.
    state: Option<WorkflowState>,
    /// Set after a fatal error.
    aborted: bool,
    /// Plan decoded by the plan stage.
    plan: Option<Plan>,
    /// Resource count across all modules of the state decoded by the apply stage.
    applied_count: Option<usize>,
    /// Executed stages.
    stages: Vec<StageRecord>,
    /// Recorded mismatches.
    mismatches: Vec<Mismatch>,
}

impl<'a, R: ToolRunner + ?Sized> StageOrchestrator<'a, R> {
    /// Creates an orchestrator over a fresh fixture.
    #[must_use]
    pub const fn new(
        fixture: &'a WorkflowFixture,
        runner: &'a R,
        scenario: &'a WorkflowScenario,
    ) -> Self {
        Self {
            fixture,
            runner,
            scenario,
            state: None,
            aborted: false,
            plan: None,
            applied_count: None,
            stages: Vec::new(),
            mismatches: Vec::new(),
        }
    }

    /// Returns the last completed state.
    #[must_use]
    pub const fn state(&self) -> Option<WorkflowState> {
        self.state
    }

    /// Returns true after a fatal error.
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Returns the mismatches recorded so far.
    #[must_use]
    pub fn mismatches(&self) -> &[Mismatch] {
        &self.mismatches
    }

    /// Returns the stages executed so far.
    #[must_use]
    pub fn stages(&self) -> &[StageRecord] {
        &self.stages
    }

    /// Consumes the orchestrator, returning stage records and mismatches.
    #[must_use]
    pub fn into_parts(self) -> (Vec<StageRecord>, Vec<Mismatch>) {
        (self.stages, self.mismatches)
    }

    /// Runs init and checks provider notices and the absence of artifacts.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] for out-of-order calls and fatal failures.
    pub fn init(&mut self) -> Result<(), HarnessError> {
        self.transition(Stage::Init)
    }

    /// Runs plan and verifies the saved plan artifact.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] for out-of-order calls and fatal failures.
    pub fn plan(&mut self) -> Result<(), HarnessError> {
        self.transition(Stage::Plan)
    }

    /// Runs apply with the saved plan and verifies the state artifact.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] for out-of-order calls and fatal failures.
    pub fn apply(&mut self) -> Result<(), HarnessError> {
        self.transition(Stage::Apply)
    }

    /// Runs destroy and verifies the emptied state artifact.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] for out-of-order calls and fatal failures.
    pub fn destroy(&mut self) -> Result<(), HarnessError> {
        self.transition(Stage::Destroy)
    }

    /// Runs every remaining stage in order, stopping at the first fatal error.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`HarnessError`].
    pub fn run_to_completion(&mut self) -> Result<(), HarnessError> {
        for stage in Stage::ALL {
            if stage.required_state() != self.state {
                continue;
            }
            self.transition(stage)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Transition plumbing
    // ------------------------------------------------------------------------

    /// Runs one stage, verifying it and advancing or aborting.
    fn transition(&mut self, stage: Stage) -> Result<(), HarnessError> {
        if self.aborted {
            return Err(HarnessError::Aborted {
                stage,
            });
        }
        if stage.required_state() != self.state {
            return Err(HarnessError::OutOfOrder {
                stage,
                current: self.state,
            });
        }
        let args = self.stage_args(stage);
        let result = self.fixture.run(self.runner, stage, &args);
        self.stages.push(StageRecord::from_result(stage, &args, &result));
        match self.complete(stage, &result) {
            Ok(()) => {
                self.state = Some(stage.target_state());
                info!(
                    stage = %stage,
                    template = %self.scenario.template,
                    mismatches = self.mismatches.len(),
                    "stage completed"
                );
                Ok(())
            }
            Err(err) => {
                self.aborted = true;
                warn!(
                    stage = %stage,
                    template = %self.scenario.template,
                    error = %err,
                    "workflow aborted"
                );
                Err(err)
            }
        }
    }

    /// Scans artifacts, then fails on tool errors or runs the verification.
    fn complete(&mut self, stage: Stage, result: &CommandResult) -> Result<(), HarnessError> {
        let scanned = self.scan_artifacts(stage, &result.stdout);
        if let Some(error) = &result.error {
            return Err(StageExecutionError {
                stage,
                error: error.clone(),
                stderr: result.stderr.clone(),
            }
            .into());
        }
        scanned?;
        match stage {
            Stage::Init => self.verify_init(result),
            Stage::Plan => self.verify_plan(result),
            Stage::Apply => self.verify_apply(result),
            Stage::Destroy => self.verify_destroy(result),
        }
    }

    /// Returns the argument list for a stage.
    fn stage_args(&self, stage: Stage) -> Vec<String> {
        let scenario = self.scenario;
        match stage {
            Stage::Init => scenario.init.args.clone(),
            Stage::Plan => std::iter::once(format!("-out={}", scenario.artifacts.plan_file))
                .chain(scenario.plan.args.iter().cloned())
                .collect(),
            Stage::Apply => scenario
                .apply
                .args
                .iter()
                .cloned()
                .chain(std::iter::once(scenario.artifacts.plan_file.clone()))
                .collect(),
            Stage::Destroy => scenario.destroy.args.clone(),
        }
    }

    /// Scans every persisted artifact for the secret marker.
    fn scan_artifacts(&mut self, stage: Stage, stdout: &str) -> Result<(), HarnessError> {
        let scenario = self.scenario;
        let files = scenario.artifacts.persisted();
        let report = scan_fixture(self.fixture, &files, &scenario.secret_marker)?;
        if let Some(record) = self.stages.last_mut() {
            record.scanned_artifacts.clone_from(&report.scanned);
        }
        for finding in report.findings {
            self.record(
                stage,
                Check::SecretLeak,
                finding.file,
                format!("no occurrence of `{}`", scenario.secret_marker),
                format!("marker at byte {}", finding.offset),
                stdout,
            );
        }
        Ok(())
    }

    /// Records one mismatch.
    fn record(
        &mut self,
        stage: Stage,
        check: Check,
        subject: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
        stdout: &str,
    ) {
        let mismatch = Mismatch {
            stage,
            check,
            subject: subject.into(),
            expected: expected.into(),
            actual: actual.into(),
            stdout: stdout.to_string(),
        };
        warn!(stage = %stage, check = %check, subject = %mismatch.subject, "verification mismatch");
        self.mismatches.push(mismatch);
    }

    /// Records a mismatch when `actual` differs from `expected`.
    fn check_set(
        &mut self,
        stage: Stage,
        subject: &str,
        actual: &ResourceSet,
        expected: &BTreeSet<ResourceAddress>,
        stdout: &str,
    ) {
        if actual.equals(expected) {
            return;
        }
        let difference = actual.difference(expected);
        self.record(
            stage,
            Check::ResourceSet,
            subject,
            render_addresses(expected),
            format!("{} ({difference})", render_addresses(actual.addresses().iter())),
            stdout,
        );
    }

    /// Records a mismatch when a claimed count differs from the decoded count.
    ///
    /// `derived` is `None` when the tally claims more destructions than
    /// resources existed.
    fn check_count(
        &mut self,
        stage: Stage,
        subject: &str,
        derived: Option<usize>,
        decoded: usize,
        stdout: &str,
    ) {
        let expected = match derived {
            Some(derived) if derived == decoded => return,
            Some(derived) => format!("{derived} resources implied by tally"),
            None => "tally within the prior resource count".to_string(),
        };
        self.record(stage, Check::Tally, subject, expected, format!("{decoded} resources decoded"), stdout);
    }

    /// Decodes the state artifact, returning `None` when it is absent.
    fn decode_state(&self, stage: Stage) -> Result<Option<State>, HarnessError> {
        let file = &self.scenario.artifacts.state_file;
        let path = self.fixture.resolve(file)?;
        match decode_state_with_limit(&path, self.fixture.max_read_bytes()) {
            Ok(state) => Ok(Some(state)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(source) => Err(HarnessError::ArtifactFormat {
                stage,
                file: file.clone(),
                source,
            }),
        }
    }

    // ------------------------------------------------------------------------
    // Stage verification
    // ------------------------------------------------------------------------

    /// Checks provider notices and that no artifact exists yet.
    fn verify_init(&mut self, result: &CommandResult) -> Result<(), HarnessError> {
        let stage = Stage::Init;
        let scenario = self.scenario;
        for provider in &scenario.init.provider_downloads {
            if !has_provider_download(&result.stdout, provider) {
                self.record(
                    stage,
                    Check::ProviderNotice,
                    "stdout",
                    provider_download_notice(provider),
                    "notice absent",
                    &result.stdout,
                );
            }
        }
        for file in scenario.artifacts.persisted() {
            if self.fixture.file_exists(file)? {
                self.record(stage, Check::StrayArtifact, file, "absent", "present", &result.stdout);
            }
        }
        Ok(())
    }

    /// Decodes the plan and checks its tally and address sets.
    fn verify_plan(&mut self, result: &CommandResult) -> Result<(), HarnessError> {
        let stage = Stage::Plan;
        let scenario = self.scenario;
        let file = &scenario.artifacts.plan_file;
        let path = self.fixture.resolve(file)?;
        let plan = decode_plan_with_limit(&path, self.fixture.max_read_bytes()).map_err(|source| {
            HarnessError::ArtifactFormat {
                stage,
                file: file.clone(),
                source,
            }
        })?;
        let derived = plan.diff().tally();
        match parse_plan_tally(&result.stdout) {
            Some(claimed) if claimed == derived => {}
            Some(claimed) => self.record(
                stage,
                Check::Tally,
                "stdout",
                derived.to_string(),
                claimed.to_string(),
                &result.stdout,
            ),
            None => self.record(
                stage,
                Check::Tally,
                "stdout",
                derived.to_string(),
                NO_TALLY,
                &result.stdout,
            ),
        }
        let expected = &scenario.plan;
        self.check_set(
            stage,
            &format!("{file} state"),
            plan.state().root_module(),
            &expected.state,
            &result.stdout,
        );
        self.check_set(
            stage,
            &format!("{file} diff"),
            plan.diff().root_module(),
            &expected.diff,
            &result.stdout,
        );
        self.plan = Some(plan);
        Ok(())
    }

    /// Decodes the state and checks it against the applied plan.
    fn verify_apply(&mut self, result: &CommandResult) -> Result<(), HarnessError> {
        let stage = Stage::Apply;
        let scenario = self.scenario;
        let file = &scenario.artifacts.state_file;
        let path = self.fixture.resolve(file)?;
        let state = decode_state_with_limit(&path, self.fixture.max_read_bytes()).map_err(|source| {
            HarnessError::ArtifactFormat {
                stage,
                file: file.clone(),
                source,
            }
        })?;
        let (expected_tally, prior) = self.plan.as_ref().map_or((ApplyTally::default(), 0), |plan| {
            (ApplyTally::from(plan.diff().tally()), plan.state().resources().total_count())
        });
        let decoded = state.resources().total_count();
        match parse_apply_tally(&result.stdout) {
            Some(claimed) => {
                if claimed != expected_tally {
                    self.record(
                        stage,
                        Check::Tally,
                        "stdout",
                        expected_tally.to_string(),
                        claimed.to_string(),
                        &result.stdout,
                    );
                }
                let derived =
                    prior.checked_add(claimed.added).and_then(|total| total.checked_sub(claimed.destroyed));
                self.check_count(stage, &format!("{file} resource count"), derived, decoded, &result.stdout);
            }
            None => self.record(
                stage,
                Check::Tally,
                "stdout",
                expected_tally.to_string(),
                NO_TALLY,
                &result.stdout,
            ),
        }
        let expected = &scenario.apply.state;
        self.check_set(stage, &format!("{file} root"), state.root_module(), expected, &result.stdout);
        self.applied_count = Some(decoded);
        Ok(())
    }

    /// Decodes the state and checks that destroy emptied it.
    fn verify_destroy(&mut self, result: &CommandResult) -> Result<(), HarnessError> {
        let stage = Stage::Destroy;
        let scenario = self.scenario;
        let file = &scenario.artifacts.state_file;
        let state = self.decode_state(stage)?;
        let claimed = parse_destroy_tally(&result.stdout);
        let prior = self.applied_count.unwrap_or_default();
        if claimed.is_none() {
            self.record(
                stage,
                Check::Tally,
                "stdout",
                format!("Resources: {prior} destroyed"),
                NO_TALLY,
                &result.stdout,
            );
        }
        let Some(state) = state else {
            self.record(
                stage,
                Check::MissingArtifact,
                file.as_str(),
                "state artifact",
                "absent",
                &result.stdout,
            );
            return Ok(());
        };
        let decoded = state.resources().total_count();
        if let Some(claimed) = claimed {
            let derived = prior.checked_sub(claimed.destroyed);
            self.check_count(stage, &format!("{file} resource count"), derived, decoded, &result.stdout);
        }
        let expected = &scenario.destroy.state;
        self.check_set(stage, &format!("{file} root"), state.root_module(), expected, &result.stdout);
        Ok(())
    }
}

// ============================================================================
// SECTION: Workflow Runner
// ============================================================================

/// Runs a full scenario and returns its report.
///
/// Cleanup runs on every path; a cleanup failure is recorded in the report
/// without changing the outcome.
pub fn run_workflow<R: ToolRunner + ?Sized>(
    source: &FixtureSource,
    scenario: &WorkflowScenario,
    runner: &R,
    network: NetworkAccess,
) -> WorkflowReport {
    let mut report = WorkflowReport::new(&scenario.name, &scenario.template);
    if let Err(err) = scenario.validate() {
        report.outcome = WorkflowOutcome::Aborted {
            error: HarnessError::from(err).to_string(),
        };
        return report;
    }
    if scenario.requires_network && !network.is_allowed() {
        info!(scenario = %scenario.name, "skipping scenario that requires network access");
        report.outcome = WorkflowOutcome::Skipped {
            reason: "scenario requires network access".to_string(),
        };
        return report;
    }
    let mut fixture = match WorkflowFixture::new(source, &scenario.template) {
        Ok(fixture) => fixture,
        Err(err) => {
            warn!(scenario = %scenario.name, error = %err, "fixture setup failed");
            report.outcome = WorkflowOutcome::Aborted {
                error: HarnessError::from(err).to_string(),
            };
            return report;
        }
    };
    let mut orchestrator = StageOrchestrator::new(&fixture, runner, scenario);
    let result = orchestrator.run_to_completion();
    let (stages, mismatches) = orchestrator.into_parts();
    report.stages = stages;
    report.mismatches = mismatches;
    if let Err(err) = fixture.close() {
        report.cleanup_error = Some(err.to_string());
    }
    report.outcome = match result {
        Err(err) => WorkflowOutcome::Aborted {
            error: err.to_string(),
        },
        Ok(()) if report.mismatches.is_empty() => WorkflowOutcome::Passed,
        Ok(()) => WorkflowOutcome::Failed,
    };
    info!(
        scenario = %report.scenario,
        outcome = report.outcome.as_str(),
        mismatches = report.mismatches.len(),
        "workflow finished"
    );
    report
}
