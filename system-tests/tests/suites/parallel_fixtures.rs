// system-tests/tests/suites/parallel_fixtures.rs
// ============================================================================
// Module: Parallel Fixture Suite
// Description: Concurrent workflows sharing one template and run root.
// Purpose: Ensure fixtures isolate concurrent runs and are all released.
// Dependencies: system-tests helpers, tokio
// ============================================================================

//! Parallel workflow system tests for the workflow harness.

use std::sync::Arc;

use helpers::artifacts::TestReporter;
use helpers::workflow::PRIMARY;
use helpers::workflow::entry_count;
use helpers::workflow::fixture_source;
use helpers::workflow::load_scenario;
use helpers::workflow::stub_runner;
use system_tests::stub::Fault;
use system_tests::stub::FaultKind;
use workflow_harness::NetworkAccess;
use workflow_harness::Stage;
use workflow_harness::WorkflowOutcome;
use workflow_harness::run_workflow;

use crate::helpers;

/// Number of concurrent clean workflows.
const CLEAN_RUNS: usize = 4;

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_workflows_are_isolated() -> Result<(), Box<dyn std::error::Error>> {
    let mut reporter = TestReporter::new("concurrent_workflows_are_isolated")?;
    let scenario = Arc::new(load_scenario(PRIMARY)?);
    let source = Arc::new(fixture_source(reporter.artifacts()));

    let faults = std::iter::repeat_n(None, CLEAN_RUNS).chain([Some(Fault::new(FaultKind::Leak, Stage::Apply))]);
    let mut handles = Vec::new();
    for fault in faults {
        let scenario = Arc::clone(&scenario);
        let source = Arc::clone(&source);
        handles.push(tokio::task::spawn_blocking(move || {
            (fault, run_workflow(&source, &scenario, &stub_runner(fault), NetworkAccess::Allowed))
        }));
    }

    let mut files = Vec::new();
    for (index, handle) in handles.into_iter().enumerate() {
        let (fault, report) = handle.await?;
        files.extend(reporter.artifacts().write_report(&format!("run-{index}"), &report)?);
        let expected = if fault.is_some() { WorkflowOutcome::Failed } else { WorkflowOutcome::Passed };
        if report.outcome != expected {
            return Err(format!("run {index} expected {}:\n{}", expected.as_str(), report.render_text()).into());
        }
    }
    if !reporter.artifacts().keep_fixtures() && entry_count(&reporter.artifacts().fixtures_dir())? != 0 {
        return Err("concurrent runs left fixture directories behind".into());
    }

    reporter.finish(
        "pass",
        vec![format!("{CLEAN_RUNS} clean runs passed beside a leaking run")],
        files,
    )?;
    Ok(())
}
