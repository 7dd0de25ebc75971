// system-tests/src/bin/stub_provisioner.rs
// ============================================================================
// Module: Stub Provisioner Binary
// Description: Command-line front end for the stub provisioning tool.
// Purpose: Provide a real subprocess for end-to-end workflow tests.
// Dependencies: system-tests, workflow-harness
// ============================================================================

//! Stub provisioning tool binary for system-tests.
//!
//! Usage: `stub_provisioner <init|plan|apply|destroy> [args...]`, run inside a
//! fixture directory. Faults are read from `STUB_PROVISIONER_FAULT`.

use std::io::Write;
use std::process::ExitCode;

use system_tests::stub::Fault;
use system_tests::stub::StubError;
use system_tests::stub::run_stage;
use workflow_harness::Stage;

fn main() -> ExitCode {
    match run() {
        Ok(stdout) => {
            let mut handle = std::io::stdout();
            if handle.write_all(stdout.as_bytes()).is_err() {
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            let mut handle = std::io::stderr();
            let _ = writeln!(handle, "Error: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Parses arguments and runs the requested stage in the working directory.
fn run() -> Result<String, StubError> {
    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_default();
    let stage = Stage::from_command(&command)
        .ok_or_else(|| StubError::Usage(format!("unknown command '{command}'; expected init, plan, apply or destroy")))?;
    let rest: Vec<String> = args.collect();
    let dir = std::env::current_dir().map_err(|source| StubError::Io {
        path: ".".into(),
        source,
    })?;
    let fault = Fault::from_env()?;
    run_stage(&dir, stage, &rest, fault)
}
