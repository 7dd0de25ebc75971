// crates/workflow-harness/tests/common/mod.rs
// ============================================================================
// Module: Common Test Helpers
// Description: Shared helpers for workflow-harness integration tests.
// Purpose: Provide result aliases, address builders and a scripted tool.
// Dependencies: workflow-harness, serde_json
// ============================================================================

//! ## Overview
//! Provides [`ScriptedTool`], an in-process stand-in for the provisioning tool
//! that writes real artifacts through the public encoders, plus small builders
//! for addresses, sets and fixture templates.

#![allow(dead_code, reason = "Each test binary uses a subset of the helpers.")]
#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeSet;
use std::error::Error;
use std::fs;
use std::path::Path;

use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use workflow_harness::CommandResult;
use workflow_harness::Diff;
use workflow_harness::DiffAction;
use workflow_harness::ModuleResources;
use workflow_harness::Plan;
use workflow_harness::ResourceAddress;
use workflow_harness::ResourceInstance;
use workflow_harness::ResourceSet;
use workflow_harness::Stage;
use workflow_harness::State;
use workflow_harness::ToolRunner;
use workflow_harness::WorkflowScenario;
use workflow_harness::decode_plan;
use workflow_harness::encode_plan;
use workflow_harness::encode_state;
use workflow_harness::parse_state;

// ============================================================================
// SECTION: Results
// ============================================================================

/// Result alias for fallible tests.
pub type TestResult<T = ()> = Result<T, Box<dyn Error>>;

/// Returns an error with `message` unless `condition` holds.
pub fn ensure(condition: bool, message: impl Into<String>) -> TestResult {
    if condition { Ok(()) } else { Err(message.into().into()) }
}

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Parses an address, panicking on invalid input.
pub fn addr(text: &str) -> ResourceAddress {
    text.parse().unwrap()
}

/// Builds an ordered address set.
pub fn addresses(texts: &[&str]) -> BTreeSet<ResourceAddress> {
    texts.iter().map(|text| addr(text)).collect()
}

/// Builds a set whose records are `{"id": <address>}`.
pub fn set_of(texts: &[&str]) -> ResourceSet {
    ResourceSet::try_from_entries(
        texts.iter().map(|text| (addr(text), ResourceInstance::new(json!({ "id": text })))),
    )
    .unwrap()
}

/// Data source present in the standard fixture.
pub const DATA_SOURCE: &str = "data.template_file.test";

/// Managed resources created by the standard fixture.
pub const MANAGED: [&str; 2] = ["null_resource.test", "null_resource.no_store"];

/// Secret value configured on `null_resource.no_store`.
pub const SECRET_VALUE: &str = "SECRET-do-not-store";

/// Writes a template directory with a single configuration file.
pub fn write_template(root: &Path, name: &str) {
    let dir = root.join(name);
    fs::create_dir_all(dir.join("modules")).unwrap();
    fs::write(dir.join("main.toml"), "# scripted fixture\n").unwrap();
    fs::write(dir.join("modules").join("README"), "nested\n").unwrap();
}

/// Scenario matching the standard fixture and [`ScriptedTool`].
pub fn standard_scenario(template: &str) -> WorkflowScenario {
    let mut scenario = WorkflowScenario::new("standard", template);
    scenario.init.provider_downloads = vec!["template".to_string(), "null".to_string()];
    scenario.plan.state = addresses(&[DATA_SOURCE]);
    scenario.plan.diff = addresses(&MANAGED);
    scenario.apply.state = addresses(&[DATA_SOURCE, MANAGED[0], MANAGED[1]]);
    scenario
}

// ============================================================================
// SECTION: Scripted Tool
// ============================================================================

/// In-process provisioning tool writing real artifacts.
///
/// Fault knobs name the stage at which the fault is injected.
#[derive(Debug, Default, Clone)]
pub struct ScriptedTool {
    /// Stage that reports failure.
    pub fail: Option<Stage>,
    /// Stage that persists the secret value.
    pub leak: Option<Stage>,
    /// Stage whose stdout tally is inflated by one.
    pub misreport: Option<Stage>,
    /// Stage that writes a truncated artifact.
    pub corrupt: Option<Stage>,
    /// Destroy removes the state file instead of emptying it.
    pub remove_state_on_destroy: bool,
    /// Init writes a stray state file.
    pub stray_state_on_init: bool,
    /// Omit tally lines from stdout.
    pub silent: bool,
}

impl ScriptedTool {
    /// Returns one extra count when misreporting at `stage`.
    fn bump(&self, stage: Stage) -> usize {
        usize::from(self.misreport == Some(stage))
    }

    /// Builds a record, optionally carrying the secret.
    fn record(&self, stage: Stage, id: &str) -> Map<String, Value> {
        let mut attributes = Map::new();
        attributes.insert("id".to_string(), Value::String(id.to_string()));
        if self.leak == Some(stage) && id == MANAGED[1] {
            attributes.insert("password".to_string(), Value::String(SECRET_VALUE.to_string()));
        }
        attributes
    }

    /// Writes bytes, truncating them when corrupting at `stage`.
    fn write(&self, stage: Stage, path: &Path, bytes: &[u8]) {
        let bytes = if self.corrupt == Some(stage) { &bytes[..bytes.len() / 2] } else { bytes };
        fs::write(path, bytes).unwrap();
    }

    /// Announces provider downloads.
    fn init(&self, dir: &Path) -> CommandResult {
        if self.stray_state_on_init {
            fs::write(dir.join("terraform.tfstate"), encode_state(&State::empty()).unwrap()).unwrap();
        }
        CommandResult::success(
            "Initializing provider plugins...\n\
             - Downloading plugin for provider \"template\" (1.0.0)...\n\
             - Downloading plugin for provider \"null\" (1.0.0)...\n",
        )
    }

    /// Writes a plan creating both managed resources.
    fn plan(&self, dir: &Path, args: &[String]) -> CommandResult {
        let Some(out) = args.iter().find_map(|arg| arg.strip_prefix("-out=")) else {
            return CommandResult::failure("missing -out", "plan requires -out");
        };
        let data = ResourceSet::try_from_entries([(
            addr(DATA_SOURCE),
            ResourceInstance::new(Value::Object(self.record(Stage::Plan, DATA_SOURCE))),
        )])
        .unwrap();
        let diff = ResourceSet::try_from_entries(
            MANAGED.iter().map(|id| (addr(id), DiffAction::Create.record(self.record(Stage::Plan, id)))),
        )
        .unwrap();
        let plan = Plan::new(
            State::new(ModuleResources::root_only(data)),
            Diff::new(ModuleResources::root_only(diff)).unwrap(),
        );
        self.write(Stage::Plan, &dir.join(out), &encode_plan(&plan).unwrap());
        if self.silent {
            return CommandResult::success("Plan saved.\n");
        }
        CommandResult::success(format!(
            "Plan: {} to add, 0 to change, 0 to destroy.\n",
            2 + self.bump(Stage::Plan)
        ))
    }

    /// Applies the saved plan on top of its prior state.
    fn apply(&self, dir: &Path, args: &[String]) -> CommandResult {
        let Some(plan_file) = args.last() else {
            return CommandResult::failure("missing plan file", "");
        };
        let plan = decode_plan(&dir.join(plan_file)).unwrap();
        let mut entries: Vec<(ResourceAddress, ResourceInstance)> = plan
            .state()
            .root_module()
            .iter()
            .map(|(address, record)| (address.clone(), record.clone()))
            .collect();
        for (address, _) in plan.diff().root_module().iter() {
            let record = self.record(Stage::Apply, &address.to_string());
            entries.push((address.clone(), ResourceInstance::new(json!({ "primary": record }))));
        }
        let state = State::new(ModuleResources::root_only(ResourceSet::try_from_entries(entries).unwrap()))
            .with_serial(1);
        self.write(Stage::Apply, &dir.join("terraform.tfstate"), &encode_state(&state).unwrap());
        if self.silent {
            return CommandResult::success("Apply complete!\n");
        }
        CommandResult::success(format!(
            "Apply complete! Resources: {} added, 0 changed, 0 destroyed.\n",
            2 + self.bump(Stage::Apply)
        ))
    }

    /// Backs up the state and empties it.
    fn destroy(&self, dir: &Path) -> CommandResult {
        let state_path = dir.join("terraform.tfstate");
        let prior = fs::read(&state_path).unwrap();
        let destroyed = parse_state(&prior).unwrap().root_module().count();
        let backup = if self.leak == Some(Stage::Destroy) {
            let mut leaked = prior.clone();
            leaked.extend_from_slice(SECRET_VALUE.as_bytes());
            leaked
        } else {
            prior
        };
        fs::write(dir.join("terraform.tfstate.backup"), backup).unwrap();
        if self.remove_state_on_destroy {
            fs::remove_file(&state_path).unwrap();
        } else {
            let state = State::new(ModuleResources::root_only(ResourceSet::empty())).with_serial(2);
            self.write(Stage::Destroy, &state_path, &encode_state(&state).unwrap());
        }
        if self.silent {
            return CommandResult::success("Destroy complete!\n");
        }
        CommandResult::success(format!(
            "Destroy complete! Resources: {} destroyed.\n",
            destroyed + self.bump(Stage::Destroy)
        ))
    }
}

impl ToolRunner for ScriptedTool {
    fn run(&self, working_dir: &Path, stage: Stage, args: &[String]) -> CommandResult {
        if self.fail == Some(stage) {
            return CommandResult::failure(format!("{stage} exited with status 1"), "boom");
        }
        match stage {
            Stage::Init => self.init(working_dir),
            Stage::Plan => self.plan(working_dir, args),
            Stage::Apply => self.apply(working_dir, args),
            Stage::Destroy => self.destroy(working_dir),
        }
    }
}
