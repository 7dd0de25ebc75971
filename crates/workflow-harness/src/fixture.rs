// crates/workflow-harness/src/fixture.rs
// ============================================================================
// Module: Workflow Fixture
// Description: Isolated temporary working directory seeded from a template.
// Purpose: Own every file a workflow run produces and release it on all paths.
// Dependencies: tempfile, tracing
// ============================================================================

//! ## Overview
//! A [`WorkflowFixture`] copies a named template directory into a fresh
//! temporary directory and serves as the working directory for every stage.
//! File access is confined to the fixture: absolute paths, `..`, root and
//! prefix components are rejected before touching the filesystem, and the
//! existing part of a path is canonicalized so symlinks cannot lead out.
//! Invariants:
//! - The directory is removed on every exit path, including panics.
//! - [`WorkflowFixture::close`] is idempotent.
//! - Process-global state (current directory, environment) is never changed.
//!
//! Security posture: relative paths come from scenario files and are treated
//! as untrusted input.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use tempfile::TempDir;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::artifact::DEFAULT_MAX_ARTIFACT_BYTES;
use crate::config::HarnessConfig;
use crate::error::FileAccessError;
use crate::error::FixtureSetupError;
use crate::limits::read_bytes_with_limit;
use crate::runner::CommandResult;
use crate::runner::ToolRunner;
use crate::stage::Stage;

// ============================================================================
// SECTION: Fixture Source
// ============================================================================

/// Where fixtures come from and how they are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureSource {
    /// Directory holding one subdirectory per template.
    template_root: PathBuf,
    /// Parent directory for fixture directories; system temp dir when unset.
    run_root: Option<PathBuf>,
    /// Retain fixture directories instead of deleting them.
    keep_fixtures: bool,
    /// Read limit for fixture files.
    max_read_bytes: usize,
}

impl FixtureSource {
    /// Creates a source reading templates from `template_root`.
    #[must_use]
    pub fn new(template_root: impl Into<PathBuf>) -> Self {
        Self {
            template_root: template_root.into(),
            run_root: None,
            keep_fixtures: false,
            max_read_bytes: DEFAULT_MAX_ARTIFACT_BYTES,
        }
    }

    /// Builds a source from harness configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureSetupError::NoTemplateRoot`] when no template root is set.
    pub fn from_config(config: &HarnessConfig) -> Result<Self, FixtureSetupError> {
        let template_root =
            config.template_root.clone().ok_or(FixtureSetupError::NoTemplateRoot)?;
        Ok(Self {
            template_root,
            run_root: config.run_root.clone(),
            keep_fixtures: config.keep_fixtures,
            max_read_bytes: config.max_artifact_bytes,
        })
    }

    /// Places fixture directories under `run_root`.
    #[must_use]
    pub fn with_run_root(mut self, run_root: impl Into<PathBuf>) -> Self {
        self.run_root = Some(run_root.into());
        self
    }

    /// Retains fixture directories after close.
    #[must_use]
    pub const fn keep_fixtures(mut self, keep: bool) -> Self {
        self.keep_fixtures = keep;
        self
    }

    /// Sets the read limit for fixture files.
    #[must_use]
    pub const fn with_max_read_bytes(mut self, max_read_bytes: usize) -> Self {
        self.max_read_bytes = max_read_bytes;
        self
    }

    /// Returns the template root directory.
    #[must_use]
    pub fn template_root(&self) -> &Path {
        &self.template_root
    }

    /// Returns the read limit for fixture files.
    #[must_use]
    pub const fn max_read_bytes(&self) -> usize {
        self.max_read_bytes
    }
}

// ============================================================================
// SECTION: Workflow Fixture
// ============================================================================

/// Isolated working directory for one workflow run.
#[derive(Debug)]
pub struct WorkflowFixture {
    /// Fixture directory path; stays valid for reporting after close.
    root: PathBuf,
    /// Owned temporary directory; `None` once closed.
    dir: Option<TempDir>,
    /// Retain the directory on close.
    keep: bool,
    /// Read limit for fixture files.
    max_read_bytes: usize,
}

impl WorkflowFixture {
    /// Creates a fixture by copying the named template.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureSetupError`] when the name is invalid, the template is
    /// missing, or the copy fails. Partially created directories are removed.
    pub fn new(source: &FixtureSource, template: &str) -> Result<Self, FixtureSetupError> {
        if !is_plain_segment(template) {
            return Err(FixtureSetupError::InvalidTemplateName(template.to_string()));
        }
        let template_dir = source.template_root.join(template);
        if !template_dir.is_dir() {
            return Err(FixtureSetupError::TemplateMissing {
                name: template.to_string(),
                path: template_dir,
            });
        }
        let prefix = format!("{template}-");
        let dir = match &source.run_root {
            Some(run_root) => {
                fs::create_dir_all(run_root).map_err(FixtureSetupError::Create)?;
                tempfile::Builder::new().prefix(&prefix).tempdir_in(run_root)
            }
            None => tempfile::Builder::new().prefix(&prefix).tempdir(),
        }
        .map_err(FixtureSetupError::Create)?;
        copy_tree(&template_dir, dir.path())?;
        let root = dir.path().to_path_buf();
        debug!(template, fixture = %root.display(), "created workflow fixture");
        Ok(Self {
            root,
            dir: Some(dir),
            keep: source.keep_fixtures,
            max_read_bytes: source.max_read_bytes,
        })
    }

    /// Returns the fixture directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Returns the read limit applied to fixture files and artifacts.
    #[must_use]
    pub const fn max_read_bytes(&self) -> usize {
        self.max_read_bytes
    }

    /// Returns true once the fixture has been closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.dir.is_none()
    }

    /// Resolves a relative path strictly within the fixture.
    ///
    /// # Errors
    ///
    /// Returns [`FileAccessError::PathEscape`] for absolute paths, `..`, root
    /// or prefix components, empty paths, and paths that reach outside the
    /// fixture through a symlink. Returns [`FileAccessError::Io`] when the
    /// fixture directory cannot be inspected.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, FileAccessError> {
        let candidate = Path::new(relative);
        let mut resolved = self.root.clone();
        let mut depth = 0_usize;
        for component in candidate.components() {
            match component {
                Component::Normal(segment) => {
                    resolved.push(segment);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(FileAccessError::PathEscape(relative.to_string()));
                }
            }
        }
        if depth == 0 {
            return Err(FileAccessError::PathEscape(relative.to_string()));
        }
        self.ensure_confined(relative, &resolved)?;
        Ok(resolved)
    }

    /// Rejects a lexically confined path whose longest existing prefix resolves
    /// outside the fixture. Dangling symlinks are rejected as well.
    fn ensure_confined(&self, relative: &str, resolved: &Path) -> Result<(), FileAccessError> {
        let root = fs::canonicalize(&self.root).map_err(|source| FileAccessError::Io {
            path: self.root.clone(),
            source,
        })?;
        let mut probe = resolved;
        loop {
            match fs::canonicalize(probe) {
                Ok(target) if target.starts_with(&root) => return Ok(()),
                Ok(_) => return Err(FileAccessError::PathEscape(relative.to_string())),
                Err(err) if matches!(err.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
                    if fs::symlink_metadata(probe).is_ok() {
                        return Err(FileAccessError::PathEscape(relative.to_string()));
                    }
                    match probe.parent() {
                        Some(parent) => probe = parent,
                        None => return Ok(()),
                    }
                }
                Err(source) => {
                    return Err(FileAccessError::Io {
                        path: probe.to_path_buf(),
                        source,
                    });
                }
            }
        }
    }

    /// Returns whether a fixture file exists; absence is `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns [`FileAccessError`] for path escapes or I/O failures.
    pub fn file_exists(&self, relative: &str) -> Result<bool, FileAccessError> {
        let path = self.resolve(relative)?;
        path.try_exists().map_err(|source| FileAccessError::Io {
            path,
            source,
        })
    }

    /// Reads a fixture file, bounded by the configured read limit.
    ///
    /// # Errors
    ///
    /// Returns [`FileAccessError`] for path escapes, missing files, I/O failures
    /// or oversized files.
    pub fn read_file(&self, relative: &str) -> Result<Vec<u8>, FileAccessError> {
        let path = self.resolve(relative)?;
        read_bytes_with_limit(&path, self.max_read_bytes).map_err(|err| err.into_file_access(path))
    }

    /// Runs one tool stage with the fixture as working directory.
    pub fn run<R: ToolRunner + ?Sized>(
        &self,
        runner: &R,
        stage: Stage,
        args: &[String],
    ) -> CommandResult {
        debug!(stage = %stage, fixture = %self.root.display(), "running stage");
        runner.run(&self.root, stage, args)
    }

    /// Deletes (or retains, when configured) the fixture directory.
    ///
    /// Calling `close` more than once is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`FileAccessError::Io`] when the directory cannot be removed.
    pub fn close(&mut self) -> Result<(), FileAccessError> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };
        if self.keep {
            let kept = dir.keep();
            info!(fixture = %kept.display(), "retaining workflow fixture");
            return Ok(());
        }
        dir.close().map_err(|source| FileAccessError::Io {
            path: self.root.clone(),
            source,
        })?;
        debug!(fixture = %self.root.display(), "removed workflow fixture");
        Ok(())
    }
}

impl Drop for WorkflowFixture {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(fixture = %self.root.display(), error = %err, "failed to remove workflow fixture");
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns true when `name` is exactly one normal path component.
pub(crate) fn is_plain_segment(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(segment)), None) if segment.to_str() == Some(name)
    )
}

/// Recursively copies a template directory into the fixture.
fn copy_tree(from: &Path, to: &Path) -> Result<(), FixtureSetupError> {
    for entry in fs::read_dir(from).map_err(copy_error(from))? {
        let entry = entry.map_err(copy_error(from))?;
        let source_path = entry.path();
        let target_path = to.join(entry.file_name());
        let file_type = entry.file_type().map_err(copy_error(&source_path))?;
        if file_type.is_dir() {
            fs::create_dir(&target_path).map_err(copy_error(&source_path))?;
            copy_tree(&source_path, &target_path)?;
        } else {
            fs::copy(&source_path, &target_path).map_err(copy_error(&source_path))?;
        }
    }
    Ok(())
}

/// Builds a copy error mapper for one template entry.
fn copy_error(path: &Path) -> impl FnOnce(io::Error) -> FixtureSetupError + use<> {
    let path = path.to_path_buf();
    move |source| FixtureSetupError::Copy {
        path,
        source,
    }
}
