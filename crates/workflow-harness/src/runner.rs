// crates/workflow-harness/src/runner.rs
// ============================================================================
// Module: Tool Runner
// Description: Command boundary between the harness and the provisioning tool.
// Purpose: Invoke one stage and capture stdout, stderr and the failure, if any.
// Dependencies: serde, tracing
// ============================================================================

//! ## Overview
//! [`ToolRunner`] is the only way the harness reaches the provisioning tool.
//! [`ProcessRunner`] spawns a real binary; closures implement the trait so
//! tests can script tool behavior without subprocesses.
//!
//! Invocation is blocking and never touches process-global state: the
//! working directory and environment overrides apply to the child only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Stdio;

use serde::Serialize;
use tracing::debug;

use crate::stage::Stage;

// ============================================================================
// SECTION: Command Result
// ============================================================================

/// Captured outcome of one tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Failure description; `None` when the command succeeded.
    pub error: Option<String>,
}

impl CommandResult {
    /// Builds a successful result.
    #[must_use]
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            error: None,
        }
    }

    /// Builds a failed result.
    #[must_use]
    pub fn failure(error: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            error: Some(error.into()),
        }
    }

    /// Returns true when no error was reported.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

// ============================================================================
// SECTION: Runner Trait
// ============================================================================

/// Runs one stage of the provisioning tool inside a working directory.
pub trait ToolRunner: Send + Sync {
    /// Invokes `stage` with `args`, using `working_dir` as the current directory.
    fn run(&self, working_dir: &Path, stage: Stage, args: &[String]) -> CommandResult;
}

impl<F> ToolRunner for F
where
    F: Fn(&Path, Stage, &[String]) -> CommandResult + Send + Sync,
{
    fn run(&self, working_dir: &Path, stage: Stage, args: &[String]) -> CommandResult {
        self(working_dir, stage, args)
    }
}

// ============================================================================
// SECTION: Process Runner
// ============================================================================

/// Runner spawning the provisioning tool binary as a child process.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    /// Tool binary path.
    binary: PathBuf,
    /// Environment overrides applied to every child.
    envs: BTreeMap<OsString, OsString>,
}

impl ProcessRunner {
    /// Creates a runner for the given binary.
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            envs: BTreeMap::new(),
        }
    }

    /// Adds an environment override for child processes.
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.insert(key.into(), value.into());
        self
    }

    /// Returns the tool binary path.
    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl ToolRunner for ProcessRunner {
    fn run(&self, working_dir: &Path, stage: Stage, args: &[String]) -> CommandResult {
        debug!(
            binary = %self.binary.display(),
            stage = %stage,
            args = %args.join(" "),
            working_dir = %working_dir.display(),
            "invoking provisioning tool"
        );
        let output = Command::new(&self.binary)
            .arg(stage.command())
            .args(args)
            .current_dir(working_dir)
            .envs(&self.envs)
            .stdin(Stdio::null())
            .output();
        match output {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                let error = if output.status.success() {
                    None
                } else {
                    Some(format!("{} {stage} exited with {}", self.binary.display(), output.status))
                };
                CommandResult {
                    stdout,
                    stderr,
                    error,
                }
            }
            Err(err) => CommandResult::failure(
                format!("failed to spawn {}: {err}", self.binary.display()),
                String::new(),
            ),
        }
    }
}
