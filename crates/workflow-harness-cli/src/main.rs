// crates/workflow-harness-cli/src/main.rs
// ============================================================================
// Module: Workflow Harness CLI Entry Point
// Description: Command dispatcher for workflow runs and artifact inspection.
// Purpose: Run scenarios against a provisioning tool and inspect its artifacts.
// Dependencies: clap, serde, serde_jcs, thiserror, tracing, tracing-subscriber, workflow-harness
// ============================================================================

//! ## Overview
//! The workflow harness CLI runs a scenario end to end against a provisioning
//! tool binary, decodes plan and state artifacts into canonical JSON summaries,
//! and scans arbitrary files for secret markers. Configuration comes from
//! `WORKFLOW_HARNESS_*` environment variables with command-line overrides.
//! Diagnostics go to stderr; stdout carries only command output.
//!
//! Exit codes: `0` when a run passes or is skipped, a scan is clean, or a
//! decode succeeds; `1` otherwise.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::env::VarError;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use workflow_harness::DiffAction;
use workflow_harness::FixtureSource;
use workflow_harness::HarnessConfig;
use workflow_harness::HarnessEnv;
use workflow_harness::ModuleResources;
use workflow_harness::NetworkAccess;
use workflow_harness::Plan;
use workflow_harness::PlanTally;
use workflow_harness::ProcessRunner;
use workflow_harness::SecretScanReport;
use workflow_harness::State;
use workflow_harness::WorkflowReport;
use workflow_harness::WorkflowScenario;
use workflow_harness::decode_plan_with_limit;
use workflow_harness::decode_state_with_limit;
use workflow_harness::run_workflow;
use workflow_harness::scan_files;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable holding log filter directives.
const LOG_ENV: &str = "WORKFLOW_HARNESS_LOG";
/// Log filter applied when [`LOG_ENV`] is unset.
const DEFAULT_LOG_FILTER: &str = "warn";

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Workflow harness command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "workflow-harness",
    about = "Lifecycle verification harness for provisioning tools.",
    disable_help_subcommand = true,
    disable_version_flag = true
)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Format of diagnostic logs written to stderr.
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a workflow scenario end to end.
    Run(RunCommand),
    /// Decode a plan or state artifact into a canonical JSON summary.
    Decode {
        /// Selected artifact kind.
        #[command(subcommand)]
        command: DecodeCommand,
    },
    /// Scan files for a secret marker.
    Scan(ScanCommand),
}

/// Arguments for `run`.
#[derive(Args, Debug)]
struct RunCommand {
    /// Scenario TOML file.
    #[arg(long, value_name = "PATH")]
    scenario: PathBuf,
    /// Directory holding fixture templates (overrides the environment).
    #[arg(long = "template-root", value_name = "DIR")]
    template_root: Option<PathBuf>,
    /// Parent directory for fixture directories (overrides the environment).
    #[arg(long = "run-root", value_name = "DIR")]
    run_root: Option<PathBuf>,
    /// Provisioning tool binary (overrides the environment).
    #[arg(long, value_name = "BIN")]
    tool: Option<PathBuf>,
    /// Run scenarios that require network access.
    #[arg(long = "allow-network", action = ArgAction::SetTrue)]
    allow_network: bool,
    /// Retain the fixture directory after the run.
    #[arg(long = "keep-fixture", action = ArgAction::SetTrue)]
    keep_fixture: bool,
    /// Report output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

/// Artifact decode subcommands.
#[derive(Subcommand, Debug)]
enum DecodeCommand {
    /// Decode a saved plan.
    Plan(DecodeArgs),
    /// Decode a state document.
    State(DecodeArgs),
}

/// Arguments shared by decode subcommands.
#[derive(Args, Debug)]
struct DecodeArgs {
    /// Artifact file to decode.
    #[arg(value_name = "PATH")]
    path: PathBuf,
}

/// Arguments for `scan`.
#[derive(Args, Debug)]
struct ScanCommand {
    /// Marker text to search for.
    #[arg(long, value_name = "TEXT")]
    marker: String,
    /// Files to scan; every file must exist.
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,
    /// Report output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

/// Output formats for command reports.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Canonical JSON.
    Json,
    /// Human-readable text.
    Text,
}

/// Diagnostic log formats.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing failures.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Message shown on stderr.
    message: String,
}

impl CliError {
    /// Creates a new CLI error.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// Result alias for CLI operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Parses arguments, initializes logging and dispatches the subcommand.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    if cli.show_version {
        write_stdout_line(&format!("workflow-harness {}", env!("CARGO_PKG_VERSION")))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }
    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };
    let directives = log_directives_from_env()?;
    init_logging(cli.log_format, directives.as_deref())?;
    match command {
        Commands::Run(command) => command_run(&command),
        Commands::Decode {
            command,
        } => command_decode(&command),
        Commands::Scan(command) => command_scan(&command),
    }
}

/// Prints top-level help.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))
}

// ============================================================================
// SECTION: Logging
// ============================================================================

/// Reads log filter directives from [`LOG_ENV`].
fn log_directives_from_env() -> CliResult<Option<String>> {
    match env::var(LOG_ENV) {
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(CliError::new(format!("{LOG_ENV} must be valid UTF-8"))),
    }
}

/// Builds the log filter, falling back to [`DEFAULT_LOG_FILTER`].
fn log_filter(directives: Option<&str>) -> CliResult<EnvFilter> {
    let directives = directives.map(str::trim).filter(|value| !value.is_empty());
    EnvFilter::try_new(directives.unwrap_or(DEFAULT_LOG_FILTER))
        .map_err(|err| CliError::new(format!("invalid {LOG_ENV} directives: {err}")))
}

/// Installs the global tracing subscriber writing to stderr.
fn init_logging(format: LogFormat, directives: Option<&str>) -> CliResult<()> {
    let registry = tracing_subscriber::registry().with(log_filter(directives)?);
    let result = match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init(),
        LogFormat::Json => registry.with(fmt::layer().json().with_writer(std::io::stderr)).try_init(),
    };
    result.map_err(|err| CliError::new(format!("failed to initialize logging: {err}")))
}

// ============================================================================
// SECTION: Run Command
// ============================================================================

/// Executes `run` and maps the outcome to an exit code.
fn command_run(command: &RunCommand) -> CliResult<ExitCode> {
    let config = HarnessConfig::load()
        .map_err(|err| CliError::new(format!("invalid configuration: {err}")))?;
    let config = apply_run_overrides(config, command);
    let tool = config.tool_binary.clone().ok_or_else(|| {
        CliError::new(format!(
            "no provisioning tool configured; pass --tool or set {}",
            HarnessEnv::ToolBinary.as_str()
        ))
    })?;
    let scenario = WorkflowScenario::load(&command.scenario)
        .map_err(|err| CliError::new(format!("failed to load scenario: {err}")))?;
    let source = FixtureSource::from_config(&config).map_err(|err| CliError::new(err.to_string()))?;
    debug!(scenario = %scenario.name, tool = %tool.display(), "running workflow");
    let runner = ProcessRunner::new(tool);
    let report = run_workflow(&source, &scenario, &runner, config.network);
    emit_report(&report, command.format)?;
    Ok(exit_code_for(&report))
}

/// Layers command-line overrides over the environment configuration.
fn apply_run_overrides(mut config: HarnessConfig, command: &RunCommand) -> HarnessConfig {
    if let Some(tool) = &command.tool {
        config.tool_binary = Some(tool.clone());
    }
    if let Some(root) = &command.template_root {
        config.template_root = Some(root.clone());
    }
    if let Some(root) = &command.run_root {
        config.run_root = Some(root.clone());
    }
    if command.allow_network {
        config.network = NetworkAccess::Allowed;
    }
    config.keep_fixtures |= command.keep_fixture;
    config
}

/// Writes a workflow report in the selected format.
fn emit_report(report: &WorkflowReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => write_canonical_json(report),
        OutputFormat::Text => write_stdout_bytes(report.render_text().as_bytes())
            .map_err(|err| CliError::new(output_error("stdout", &err))),
    }
}

/// Maps a report to the process exit code.
fn exit_code_for(report: &WorkflowReport) -> ExitCode {
    if report.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

// ============================================================================
// SECTION: Decode Command
// ============================================================================

/// Addresses held by one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct ModuleSummary {
    /// Module path text; `root` for the root module.
    module: String,
    /// Address texts in canonical order.
    addresses: Vec<String>,
}

/// Canonical summary of a decoded state document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct StateSummary {
    /// Artifact kind, always `state`.
    kind: &'static str,
    /// Document version the state was decoded from.
    version: u64,
    /// State serial.
    serial: u64,
    /// State lineage, when recorded.
    lineage: Option<String>,
    /// Resource count across all modules.
    resource_count: usize,
    /// Per-module addresses.
    modules: Vec<ModuleSummary>,
}

/// One proposed change in a plan summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct DiffSummary {
    /// Module path text.
    module: String,
    /// Address text.
    address: String,
    /// Proposed action label.
    action: &'static str,
}

/// Canonical summary of a decoded plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct PlanSummary {
    /// Artifact kind, always `plan`.
    kind: &'static str,
    /// Per-module addresses of the embedded prior state.
    state: Vec<ModuleSummary>,
    /// Proposed changes in canonical order.
    diff: Vec<DiffSummary>,
    /// Change tally derived from the diff.
    tally: PlanTally,
}

/// Executes `decode` and prints the canonical summary.
fn command_decode(command: &DecodeCommand) -> CliResult<ExitCode> {
    let config = HarnessConfig::load()
        .map_err(|err| CliError::new(format!("invalid configuration: {err}")))?;
    match command {
        DecodeCommand::Plan(args) => {
            let plan = decode_plan_with_limit(&args.path, config.max_artifact_bytes)
                .map_err(|err| CliError::new(err.to_string()))?;
            write_canonical_json(&summarize_plan(&plan)?)?;
        }
        DecodeCommand::State(args) => {
            let state = decode_state_with_limit(&args.path, config.max_artifact_bytes)
                .map_err(|err| CliError::new(err.to_string()))?;
            write_canonical_json(&summarize_state(&state))?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Lists the addresses of every module.
fn summarize_modules(resources: &ModuleResources) -> Vec<ModuleSummary> {
    resources
        .modules()
        .map(|(path, set)| ModuleSummary {
            module: path.to_string(),
            addresses: set.iter().map(|(address, _)| address.to_string()).collect(),
        })
        .collect()
}

/// Builds the canonical summary of a state.
fn summarize_state(state: &State) -> StateSummary {
    StateSummary {
        kind: "state",
        version: state.format().version(),
        serial: state.serial(),
        lineage: state.lineage().map(str::to_string),
        resource_count: state.resources().total_count(),
        modules: summarize_modules(state.resources()),
    }
}

/// Builds the canonical summary of a plan.
fn summarize_plan(plan: &Plan) -> CliResult<PlanSummary> {
    let mut diff = Vec::new();
    for (path, set) in plan.diff().resources().modules() {
        for (address, record) in set.iter() {
            let action = DiffAction::of(record).map_err(CliError::new)?;
            diff.push(DiffSummary {
                module: path.to_string(),
                address: address.to_string(),
                action: action.as_str(),
            });
        }
    }
    Ok(PlanSummary {
        kind: "plan",
        state: summarize_modules(plan.state().resources()),
        diff,
        tally: plan.diff().tally(),
    })
}

// ============================================================================
// SECTION: Scan Command
// ============================================================================

/// Executes `scan`; exits with failure when any file holds the marker.
fn command_scan(command: &ScanCommand) -> CliResult<ExitCode> {
    if command.marker.is_empty() {
        return Err(CliError::new("secret marker must not be empty".to_string()));
    }
    let config = HarnessConfig::load()
        .map_err(|err| CliError::new(format!("invalid configuration: {err}")))?;
    let report = scan_files(command.files.as_slice(), &command.marker, config.max_artifact_bytes)
        .map_err(|err| CliError::new(err.to_string()))?;
    match command.format {
        OutputFormat::Json => write_canonical_json(&report)?,
        OutputFormat::Text => write_stdout_bytes(render_scan_text(&report).as_bytes())
            .map_err(|err| CliError::new(output_error("stdout", &err)))?,
    }
    Ok(if report.is_clean() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Renders a scan report as text.
fn render_scan_text(report: &SecretScanReport) -> String {
    let mut out = String::new();
    for finding in &report.findings {
        out.push_str(&format!("{}: marker found at byte {}\n", finding.file, finding.offset));
    }
    out.push_str(&format!(
        "scanned {} file(s), {} finding(s)\n",
        report.scanned.len(),
        report.findings.len()
    ));
    out
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Serializes a value as canonical JSON followed by a newline.
fn canonical_json_line<T: Serialize>(value: &T) -> CliResult<Vec<u8>> {
    let mut bytes = serde_jcs::to_vec(value)
        .map_err(|err| CliError::new(format!("failed to serialize output: {err}")))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Writes canonical JSON to stdout.
fn write_canonical_json<T: Serialize>(value: &T) -> CliResult<()> {
    let bytes = canonical_json_line(value)?;
    write_stdout_bytes(&bytes).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes raw bytes to stdout without adding a newline.
fn write_stdout_bytes(bytes: &[u8]) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(bytes)
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output stream failure.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
