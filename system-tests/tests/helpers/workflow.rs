// system-tests/tests/helpers/workflow.rs
// ============================================================================
// Module: Workflow Helpers
// Description: Runs scenarios against the stub provisioning tool binary.
// Purpose: Centralize tool resolution, fixture roots and fault wiring.
// Dependencies: system-tests, workflow-harness
// ============================================================================

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use system_tests::stub::FAULT_ENV;
use system_tests::stub::Fault;
use workflow_harness::Check;
use workflow_harness::FixtureSource;
use workflow_harness::Mismatch;
use workflow_harness::NetworkAccess;
use workflow_harness::ProcessRunner;
use workflow_harness::Stage;
use workflow_harness::WorkflowReport;
use workflow_harness::WorkflowScenario;
use workflow_harness::run_workflow;

use super::artifacts::TestArtifacts;

/// Scenario exercising the full lifecycle with a saved plan.
pub const PRIMARY: &str = "primary-separate-plan";
/// Scenario over a fixture that declares nothing.
pub const EMPTY_CONFIG: &str = "empty-config";

/// Returns the system-tests crate directory.
pub fn crate_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// Returns the stub provisioning tool binary built for this test run.
pub fn stub_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_stub_provisioner"))
}

/// Loads a scenario from `system-tests/scenarios`.
pub fn load_scenario(name: &str) -> Result<WorkflowScenario, String> {
    let path = crate_root().join("scenarios").join(format!("{name}.toml"));
    WorkflowScenario::load(&path).map_err(|err| err.to_string())
}

/// Builds a runner that always passes an explicit fault directive.
pub fn stub_runner(fault: Option<Fault>) -> ProcessRunner {
    ProcessRunner::new(stub_binary()).env(FAULT_ENV, fault.map(Fault::directive).unwrap_or_default())
}

/// Builds a fixture source whose fixtures land under the test's artifact root.
pub fn fixture_source(artifacts: &TestArtifacts) -> FixtureSource {
    FixtureSource::new(crate_root().join("fixtures"))
        .with_run_root(artifacts.fixtures_dir())
        .keep_fixtures(artifacts.keep_fixtures())
}

/// Runs a named scenario with network access and an optional fault.
pub fn run_scenario(
    artifacts: &TestArtifacts,
    scenario: &str,
    fault: Option<Fault>,
) -> Result<WorkflowReport, String> {
    let scenario = load_scenario(scenario)?;
    let runner = stub_runner(fault);
    Ok(run_workflow(&fixture_source(artifacts), &scenario, &runner, NetworkAccess::Allowed))
}

/// Returns the mismatches recorded for a check at a stage.
pub fn mismatches<'a>(report: &'a WorkflowReport, stage: Stage, check: Check) -> Vec<&'a Mismatch> {
    report.mismatches_for(stage).filter(|mismatch| mismatch.check == check).collect()
}

/// Returns the number of entries left in a directory; absent reads as zero.
pub fn entry_count(dir: &Path) -> io::Result<usize> {
    match fs::read_dir(dir) {
        Ok(entries) => Ok(entries.count()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(err) => Err(err),
    }
}
