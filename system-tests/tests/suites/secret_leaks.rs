// system-tests/tests/suites/secret_leaks.rs
// ============================================================================
// Module: Secret Leak Suite
// Description: Leak faults injected into the stub tool at each stage.
// Purpose: Ensure every persisted artifact is scanned after every stage.
// Dependencies: system-tests helpers
// ============================================================================

//! Secret leak detection system tests for the workflow harness.

use helpers::artifacts::TestReporter;
use helpers::workflow::PRIMARY;
use helpers::workflow::mismatches;
use helpers::workflow::run_scenario;
use system_tests::stub::Fault;
use system_tests::stub::FaultKind;
use workflow_harness::Check;
use workflow_harness::Stage;
use workflow_harness::WorkflowOutcome;
use workflow_harness::WorkflowReport;

use crate::helpers;

/// Returns the files flagged for leaks at a stage.
fn leaked_files(report: &WorkflowReport, stage: Stage) -> Vec<String> {
    mismatches(report, stage, Check::SecretLeak).into_iter().map(|mismatch| mismatch.subject.clone()).collect()
}

#[test]
fn plan_leak_is_reported_while_the_plan_persists() -> Result<(), Box<dyn std::error::Error>> {
    let mut reporter = TestReporter::new("plan_leak_is_reported_while_the_plan_persists")?;
    let report = run_scenario(reporter.artifacts(), PRIMARY, Some(Fault::new(FaultKind::Leak, Stage::Plan)))?;
    let files = reporter.artifacts().write_report("plan-leak", &report)?;

    if report.outcome != WorkflowOutcome::Failed {
        return Err(format!("expected failure, got:\n{}", report.render_text()).into());
    }
    for stage in [Stage::Plan, Stage::Apply, Stage::Destroy] {
        if leaked_files(&report, stage) != ["tfplan"] {
            return Err(format!("{stage}: expected tfplan leak, got {:?}", leaked_files(&report, stage)).into());
        }
    }
    if !leaked_files(&report, Stage::Init).is_empty() {
        return Err("init reported a leak before any artifact existed".into());
    }

    reporter.finish("pass", vec!["plan leak flagged at plan, apply and destroy".to_string()], files)?;
    Ok(())
}

#[test]
fn apply_leak_follows_the_state_into_its_backup() -> Result<(), Box<dyn std::error::Error>> {
    let mut reporter = TestReporter::new("apply_leak_follows_the_state_into_its_backup")?;
    let report = run_scenario(reporter.artifacts(), PRIMARY, Some(Fault::new(FaultKind::Leak, Stage::Apply)))?;
    let files = reporter.artifacts().write_report("apply-leak", &report)?;

    if leaked_files(&report, Stage::Plan) != Vec::<String>::new() {
        return Err("plan reported a leak before apply ran".into());
    }
    if leaked_files(&report, Stage::Apply) != ["terraform.tfstate"] {
        return Err(format!("apply leaks: {:?}", leaked_files(&report, Stage::Apply)).into());
    }
    if leaked_files(&report, Stage::Destroy) != ["terraform.tfstate.backup"] {
        return Err(format!("destroy leaks: {:?}", leaked_files(&report, Stage::Destroy)).into());
    }

    reporter.finish("pass", vec!["leaked state detected and tracked into backup".to_string()], files)?;
    Ok(())
}

#[test]
fn destroy_leak_is_found_in_the_backup_only() -> Result<(), Box<dyn std::error::Error>> {
    let mut reporter = TestReporter::new("destroy_leak_is_found_in_the_backup_only")?;
    let report = run_scenario(reporter.artifacts(), PRIMARY, Some(Fault::new(FaultKind::Leak, Stage::Destroy)))?;
    let files = reporter.artifacts().write_report("destroy-leak", &report)?;

    let flagged: Vec<(Stage, String)> =
        report.mismatches.iter().map(|mismatch| (mismatch.stage, mismatch.subject.clone())).collect();
    if flagged != [(Stage::Destroy, "terraform.tfstate.backup".to_string())] {
        return Err(format!("unexpected mismatches:\n{}", report.render_text()).into());
    }

    reporter.finish("pass", vec!["backup leak detected after destroy".to_string()], files)?;
    Ok(())
}
