// system-tests/tests/suites/stage_failures.rs
// ============================================================================
// Module: Stage Failure Suite
// Description: Failing, corrupting and misreporting stub tool runs.
// Purpose: Ensure faults abort or fail the workflow at the right stage.
// Dependencies: system-tests helpers
// ============================================================================

//! Stage failure system tests for the workflow harness.

use helpers::artifacts::TestReporter;
use helpers::workflow::PRIMARY;
use helpers::workflow::entry_count;
use helpers::workflow::mismatches;
use helpers::workflow::run_scenario;
use system_tests::stub::Fault;
use system_tests::stub::FaultKind;
use workflow_harness::Check;
use workflow_harness::Stage;
use workflow_harness::WorkflowOutcome;

use crate::helpers;

#[test]
fn failing_stage_aborts_the_workflow() -> Result<(), Box<dyn std::error::Error>> {
    let mut reporter = TestReporter::new("failing_stage_aborts_the_workflow")?;
    let mut files = Vec::new();
    for (index, stage) in Stage::ALL.into_iter().enumerate() {
        let report = run_scenario(reporter.artifacts(), PRIMARY, Some(Fault::new(FaultKind::Fail, stage)))?;
        files.extend(reporter.artifacts().write_report(&format!("fail-{stage}"), &report)?);
        let WorkflowOutcome::Aborted {
            error,
        } = &report.outcome
        else {
            return Err(format!("{stage}: expected abort, got {}", report.outcome.as_str()).into());
        };
        if !error.starts_with(&format!("{stage} failed:")) {
            return Err(format!("{stage}: unexpected error {error}").into());
        }
        if report.stages.len() != index + 1 {
            return Err(format!("{stage}: {} stages recorded", report.stages.len()).into());
        }
        let last = &report.stages[index];
        if !last.stderr.contains("injected failure") || last.error.is_none() {
            return Err(format!("{stage}: failure output not captured").into());
        }
    }
    if !reporter.artifacts().keep_fixtures() && entry_count(&reporter.artifacts().fixtures_dir())? != 0 {
        return Err("aborted runs left fixture directories behind".into());
    }

    reporter.finish("pass", vec!["each stage failure aborts at that stage".to_string()], files)?;
    Ok(())
}

#[test]
fn corrupt_plan_aborts_with_decode_error() -> Result<(), Box<dyn std::error::Error>> {
    let mut reporter = TestReporter::new("corrupt_plan_aborts_with_decode_error")?;
    let report = run_scenario(reporter.artifacts(), PRIMARY, Some(Fault::new(FaultKind::Corrupt, Stage::Plan)))?;
    let files = reporter.artifacts().write_report("corrupt-plan", &report)?;

    let WorkflowOutcome::Aborted {
        error,
    } = &report.outcome
    else {
        return Err(format!("expected abort, got {}", report.outcome.as_str()).into());
    };
    if !error.starts_with("plan: cannot decode tfplan") {
        return Err(format!("unexpected error {error}").into());
    }
    if report.stages.len() != 2 {
        return Err(format!("{} stages recorded", report.stages.len()).into());
    }

    reporter.finish("pass", vec!["truncated plan rejected by the decoder".to_string()], files)?;
    Ok(())
}

#[test]
fn misreported_tallies_are_recorded_as_mismatches() -> Result<(), Box<dyn std::error::Error>> {
    let mut reporter = TestReporter::new("misreported_tallies_are_recorded_as_mismatches")?;
    let mut files = Vec::new();

    let report = run_scenario(reporter.artifacts(), PRIMARY, Some(Fault::new(FaultKind::Misreport, Stage::Plan)))?;
    files.extend(reporter.artifacts().write_report("misreport-plan", &report)?);
    let plan = mismatches(&report, Stage::Plan, Check::Tally);
    if report.outcome != WorkflowOutcome::Failed || plan.len() != 1 {
        return Err(format!("plan misreport:\n{}", report.render_text()).into());
    }
    if plan[0].expected != "2 to add, 0 to change, 0 to destroy" || plan[0].actual != "3 to add, 0 to change, 0 to destroy"
    {
        return Err(format!("plan misreport recorded as {}", plan[0]).into());
    }

    let report = run_scenario(reporter.artifacts(), PRIMARY, Some(Fault::new(FaultKind::Misreport, Stage::Destroy)))?;
    files.extend(reporter.artifacts().write_report("misreport-destroy", &report)?);
    if mismatches(&report, Stage::Destroy, Check::Tally).is_empty() || report.mismatches_for(Stage::Apply).count() != 0 {
        return Err(format!("destroy misreport:\n{}", report.render_text()).into());
    }

    let report = run_scenario(reporter.artifacts(), PRIMARY, Some(Fault::new(FaultKind::Misreport, Stage::Init)))?;
    files.extend(reporter.artifacts().write_report("misreport-init", &report)?);
    let notices: Vec<String> = mismatches(&report, Stage::Init, Check::ProviderNotice)
        .into_iter()
        .map(|mismatch| mismatch.expected.clone())
        .collect();
    if notices.len() != 2 || !notices.iter().all(|notice| notice.contains("Downloading plugin for provider")) {
        return Err(format!("init misreport:\n{}", report.render_text()).into());
    }

    reporter.finish("pass", vec!["tally and notice misreports recorded".to_string()], files)?;
    Ok(())
}
