// system-tests/src/stub/mod.rs
// ============================================================================
// Module: Stub Provisioning Tool
// Description: Deterministic stand-in for the provisioning tool under test.
// Purpose: Drive real subprocess workflows through the harness without providers.
// Dependencies: serde_json, thiserror, toml, workflow-harness
// ============================================================================

//! ## Overview
//! The stub implements `init`, `plan`, `apply` and `destroy` over a fixture's
//! [`StubManifest`], persisting plan and state artifacts in the formats the
//! harness decodes and printing tool-style tallies.
//! Invariants:
//! - Sensitive attributes are stripped from every artifact unless a leak fault
//!   fires at the current stage.
//! - State is copied to the backup file before it is overwritten.
//! - Printed tallies agree with the artifacts unless a misreport fault fires.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod fault;
pub mod manifest;


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use workflow_harness::ApplyTally;
use workflow_harness::ArtifactError;
use workflow_harness::DestroyTally;
use workflow_harness::Diff;
use workflow_harness::DiffAction;
use workflow_harness::ModuleResources;
use workflow_harness::Plan;
use workflow_harness::PlanTally;
use workflow_harness::ResourceAddress;
use workflow_harness::ResourceInstance;
use workflow_harness::ResourceMode;
use workflow_harness::ResourceSet;
use workflow_harness::ResourceSetError;
use workflow_harness::Stage;
use workflow_harness::State;
use workflow_harness::decode_plan;
use workflow_harness::encode_plan;
use workflow_harness::encode_state;
use workflow_harness::parse_state;

pub use self::fault::FAULT_ENV;
pub use self::fault::Fault;
pub use self::fault::FaultKind;
pub use self::manifest::MANIFEST_FILE;
pub use self::manifest::StubManifest;

use self::fault::fires;
use self::manifest::ResourceSpec;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// State file written by apply and destroy.
pub const STATE_FILE: &str = "terraform.tfstate";
/// Backup of the state prior to the last overwrite.
pub const STATE_BACKUP_FILE: &str = "terraform.tfstate.backup";
/// Directory holding the plugin lock written by init.
pub const PLUGIN_DIR: &str = ".stub";
/// Plugin lock file inside [`PLUGIN_DIR`].
const PLUGIN_LOCK_FILE: &str = "plugins.lock";
/// Lineage assigned to the first state.
const DEFAULT_LINEAGE: &str = "stub-lineage";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors reported by the stub tool.
#[derive(Debug, Error)]
pub enum StubError {
    /// `main.toml` is missing fields or declares invalid resources.
    #[error("invalid manifest: {0}")]
    Manifest(String),
    /// A file could not be read or written.
    #[error("failed to access {}: {}", .path.display(), .source)]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// An artifact could not be decoded or encoded.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    /// A resource set could not be built.
    #[error(transparent)]
    ResourceSet(#[from] ResourceSetError),
    /// A diff record carries no valid action.
    #[error("invalid diff: {0}")]
    Diff(String),
    /// Arguments do not match the stage's usage.
    #[error("usage: {0}")]
    Usage(String),
    /// A stage ran before init.
    #[error("provider plugins are not initialized; run init first")]
    NotInitialized,
    /// The fault directive is malformed.
    #[error("invalid fault directive: {0}")]
    InvalidFault(String),
    /// A `fail` fault fired.
    #[error("injected failure during {0}")]
    InjectedFailure(Stage),
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Runs one stage inside `dir` and returns the text printed to stdout.
///
/// # Errors
///
/// Returns [`StubError`] when the stage fails; the binary reports it on
/// stderr and exits with failure.
pub fn run_stage(dir: &Path, stage: Stage, args: &[String], fault: Option<Fault>) -> Result<String, StubError> {
    if fires(fault, FaultKind::Fail, stage) {
        return Err(StubError::InjectedFailure(stage));
    }
    let stub = Stub {
        dir,
        manifest: StubManifest::load(dir)?,
        fault,
    };
    match stage {
        Stage::Init => stub.init(),
        Stage::Plan => stub.plan(args),
        Stage::Apply => stub.apply(args),
        Stage::Destroy => stub.destroy(),
    }
}

// ============================================================================
// SECTION: Records
// ============================================================================

/// Wraps attributes in the persisted state record shape.
fn state_record(attributes: Map<String, Value>) -> ResourceInstance {
    ResourceInstance::new(json!({ "primary": { "attributes": attributes } }))
}

/// Returns the attributes of a state record.
fn state_attributes(record: &ResourceInstance) -> Option<&Map<String, Value>> {
    record.as_value().get("primary")?.get("attributes")?.as_object()
}

/// Returns the attributes of a diff record.
fn diff_attributes(record: &ResourceInstance) -> Map<String, Value> {
    record.as_value().get("attributes").and_then(Value::as_object).cloned().unwrap_or_default()
}

/// Builds a root-only state from entries.
fn root_state(entries: BTreeMap<ResourceAddress, ResourceInstance>) -> Result<State, StubError> {
    Ok(State::new(ModuleResources::root_only(ResourceSet::try_from_entries(entries)?)))
}

// ============================================================================
// SECTION: Stages
// ============================================================================

/// One stage invocation.
struct Stub<'a> {
    /// Fixture directory.
    dir: &'a Path,
    /// Parsed manifest.
    manifest: StubManifest,
    /// Active fault directive.
    fault: Option<Fault>,
}

impl Stub<'_> {
    /// Returns true when a fault of `kind` fires at `stage`.
    fn fires(&self, kind: FaultKind, stage: Stage) -> bool {
        fires(self.fault, kind, stage)
    }

    /// Returns one extra count when misreporting at `stage`.
    fn bump(&self, stage: Stage) -> usize {
        usize::from(self.fires(FaultKind::Misreport, stage))
    }

    /// Writes an artifact, truncating it when corrupting at `stage`.
    fn write_artifact(&self, stage: Stage, name: &str, bytes: &[u8]) -> Result<(), StubError> {
        let bytes = if self.fires(FaultKind::Corrupt, stage) { &bytes[..bytes.len() / 2] } else { bytes };
        let path = self.dir.join(name);
        fs::write(&path, bytes).map_err(|source| StubError::Io {
            path,
            source,
        })
    }

    /// Reads a file, returning `None` when it does not exist.
    fn read_optional(&self, name: &str) -> Result<Option<Vec<u8>>, StubError> {
        let path = self.dir.join(name);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StubError::Io {
                path,
                source,
            }),
        }
    }

    /// Fails unless init has written the plugin lock.
    fn require_init(&self) -> Result<(), StubError> {
        if self.dir.join(PLUGIN_DIR).join(PLUGIN_LOCK_FILE).is_file() {
            Ok(())
        } else {
            Err(StubError::NotInitialized)
        }
    }

    /// Records provider plugins and announces each download.
    fn init(&self) -> Result<String, StubError> {
        let plugins = self.dir.join(PLUGIN_DIR);
        fs::create_dir_all(&plugins).map_err(|source| StubError::Io {
            path: plugins.clone(),
            source,
        })?;
        let mut lock = String::new();
        let mut out = String::from("Initializing provider plugins...\n");
        for provider in &self.manifest.providers {
            let _ = writeln!(lock, "{} {}", provider.name, provider.version);
            if !self.fires(FaultKind::Misreport, Stage::Init) {
                let _ = writeln!(
                    out,
                    "- Downloading plugin for provider \"{}\" ({})...",
                    provider.name, provider.version
                );
            }
        }
        let path = plugins.join(PLUGIN_LOCK_FILE);
        fs::write(&path, lock).map_err(|source| StubError::Io {
            path,
            source,
        })?;
        out.push_str("\nStub provisioner has been successfully initialized!\n");
        Ok(out)
    }

    /// Refreshes data sources and computes the diff against prior state.
    fn plan(&self, args: &[String]) -> Result<String, StubError> {
        self.require_init()?;
        let stage = Stage::Plan;
        let leak = self.fires(FaultKind::Leak, stage);
        let prior = match self.read_optional(STATE_FILE)? {
            Some(bytes) => parse_state(&bytes)?,
            None => State::empty(),
        };
        let mut out = String::new();

        let mut refreshed: BTreeMap<ResourceAddress, ResourceInstance> = prior
            .root_module()
            .iter()
            .filter(|(address, _)| address.mode() == ResourceMode::Managed)
            .map(|(address, record)| (address.clone(), record.clone()))
            .collect();
        for spec in &self.manifest.data_sources {
            let address = spec.address(ResourceMode::Data)?;
            let _ = writeln!(out, "{address}: Refreshing state...");
            refreshed.insert(address.clone(), state_record(spec.attributes(&address, leak)));
        }

        let mut changes = BTreeMap::new();
        for spec in &self.manifest.resources {
            let address = spec.address(ResourceMode::Managed)?;
            let desired = spec.attributes(&address, false);
            let action = match prior.root_module().get(&address) {
                None => Some(DiffAction::Create),
                Some(record) if state_attributes(record) != Some(&desired) => Some(DiffAction::Update),
                Some(_) => None,
            };
            if let Some(action) = action {
                changes.insert(address.clone(), action.record(spec.attributes(&address, leak)));
            }
        }
        for (address, _) in prior.root_module().iter() {
            if address.mode() == ResourceMode::Managed && self.manifest.find(address).is_none() {
                changes.insert(address.clone(), DiffAction::Delete.record(Map::new()));
            }
        }
        for (address, record) in &changes {
            let action = DiffAction::of(record).map_err(StubError::Diff)?;
            let _ = writeln!(out, "  {} {address}", action_marker(action));
        }

        let mut state = root_state(refreshed)?.with_serial(prior.serial());
        if let Some(lineage) = prior.lineage() {
            state = state.with_lineage(lineage);
        }
        let diff = Diff::new(ModuleResources::root_only(ResourceSet::try_from_entries(changes)?))
            .map_err(StubError::Diff)?;
        let plan = Plan::new(state, diff);
        if let Some(file) = args.iter().find_map(|arg| arg.strip_prefix("-out=")) {
            self.write_artifact(stage, file, &encode_plan(&plan)?)?;
        }

        let tally = plan.diff().tally();
        if tally == PlanTally::default() && self.bump(stage) == 0 {
            out.push_str("\nNo changes. Infrastructure is up-to-date.\n");
        } else {
            let claimed = PlanTally::new(tally.add + self.bump(stage), tally.change, tally.destroy);
            let _ = writeln!(out, "\nPlan: {claimed}.");
        }
        Ok(out)
    }

    /// Applies a saved plan on top of its embedded state.
    fn apply(&self, args: &[String]) -> Result<String, StubError> {
        self.require_init()?;
        let stage = Stage::Apply;
        let Some(plan_file) = args.last().filter(|arg| !arg.starts_with('-')) else {
            return Err(StubError::Usage("apply requires a saved plan file".to_string()));
        };
        let plan = decode_plan(&self.dir.join(plan_file))?;
        let leak = self.fires(FaultKind::Leak, stage);
        let prior_serial = match self.read_optional(STATE_FILE)? {
            Some(bytes) => {
                let serial = parse_state(&bytes)?.serial();
                self.write_artifact(stage, STATE_BACKUP_FILE, &bytes)?;
                serial
            }
            None => plan.state().serial(),
        };

        let mut out = String::new();
        let mut entries: BTreeMap<ResourceAddress, ResourceInstance> = plan
            .state()
            .root_module()
            .iter()
            .map(|(address, record)| (address.clone(), record.clone()))
            .collect();
        for (address, record) in plan.diff().root_module().iter() {
            let action = DiffAction::of(record).map_err(StubError::Diff)?;
            if action == DiffAction::Delete {
                entries.remove(address);
                let _ = writeln!(out, "{address}: Destruction complete");
                continue;
            }
            let attributes = self
                .manifest
                .find(address)
                .map_or_else(|| diff_attributes(record), |spec| spec.attributes(address, leak));
            entries.insert(address.clone(), state_record(attributes));
            let verb = if action == DiffAction::Update { "Modifications" } else { "Creation" };
            let _ = writeln!(out, "{address}: {verb} complete");
        }

        let lineage = plan.state().lineage().unwrap_or(DEFAULT_LINEAGE).to_string();
        let state = root_state(entries)?.with_serial(prior_serial + 1).with_lineage(lineage);
        self.write_artifact(stage, STATE_FILE, &encode_state(&state)?)?;

        let tally = ApplyTally::from(plan.diff().tally());
        let claimed = ApplyTally::new(tally.added + self.bump(stage), tally.changed, tally.destroyed);
        let _ = writeln!(out, "\nApply complete! {claimed}.");
        Ok(out)
    }

    /// Backs up the state and destroys every resource in it.
    fn destroy(&self) -> Result<String, StubError> {
        self.require_init()?;
        let stage = Stage::Destroy;
        let mut out = String::new();
        let Some(bytes) = self.read_optional(STATE_FILE)? else {
            let _ = writeln!(out, "Destroy complete! {}.", DestroyTally::new(self.bump(stage)));
            return Ok(out);
        };
        let prior = parse_state(&bytes)?;
        if self.fires(FaultKind::Leak, stage) {
            self.write_artifact(stage, STATE_BACKUP_FILE, &encode_state(&self.with_sensitive(&prior)?)?)?;
        } else {
            self.write_artifact(stage, STATE_BACKUP_FILE, &bytes)?;
        }
        for (address, _) in prior.root_module().iter() {
            let _ = writeln!(out, "{address}: Destruction complete");
        }

        let mut state = State::empty().with_serial(prior.serial() + 1);
        if let Some(lineage) = prior.lineage() {
            state = state.with_lineage(lineage);
        }
        self.write_artifact(stage, STATE_FILE, &encode_state(&state)?)?;

        let claimed = DestroyTally::new(prior.root_module().count() + self.bump(stage));
        let _ = writeln!(out, "\nDestroy complete! {claimed}.");
        Ok(out)
    }

    /// Returns `state` with every declared resource's sensitive attributes restored.
    fn with_sensitive(&self, state: &State) -> Result<State, StubError> {
        let entries: BTreeMap<ResourceAddress, ResourceInstance> = state
            .root_module()
            .iter()
            .map(|(address, record)| {
                let record = self.manifest.find(address).map_or_else(
                    || record.clone(),
                    |spec: &ResourceSpec| state_record(spec.attributes(address, true)),
                );
                (address.clone(), record)
            })
            .collect();
        let mut restored = root_state(entries)?.with_serial(state.serial());
        if let Some(lineage) = state.lineage() {
            restored = restored.with_lineage(lineage);
        }
        Ok(restored)
    }
}

/// Returns the plan listing marker for an action.
const fn action_marker(action: DiffAction) -> &'static str {
    match action {
        DiffAction::Create => "+",
        DiffAction::Update => "~",
        DiffAction::Delete => "-",
        DiffAction::Replace => "-/+",
    }
}
