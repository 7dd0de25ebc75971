// crates/workflow-harness/src/secrets.rs
// ============================================================================
// Module: Secret Scanner
// Description: Byte-level search for sensitive markers in persisted files.
// Purpose: Detect secret material written to disk by any stage.
// Dependencies: serde, tracing
// ============================================================================

//! ## Overview
//! Sensitive attribute values must never reach a persisted artifact. The
//! scanner searches raw file bytes for a marker string; it does not parse the
//! artifact, so a leak is found even in a truncated or corrupt file.
//! Invariants:
//! - An empty marker never matches.
//! - Absent files are skipped, not reported.

use std::path::Path;

use serde::Serialize;
use tracing::warn;

use crate::error::FileAccessError;
use crate::limits::read_bytes_with_limit;
use crate::fixture::WorkflowFixture;

/// Returns true when `contents` contains `marker` as a byte substring.
#[must_use]
pub fn scan_for_secret(contents: &[u8], marker: &str) -> bool {
    find_secret(contents, marker).is_some()
}

/// Returns the offset of the first occurrence of `marker` in `contents`.
#[must_use]
pub fn find_secret(contents: &[u8], marker: &str) -> Option<usize> {
    let needle = marker.as_bytes();
    if needle.is_empty() || needle.len() > contents.len() {
        return None;
    }
    contents.windows(needle.len()).position(|window| window == needle)
}

/// One marker occurrence in a scanned file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretFinding {
    /// File path relative to the fixture.
    pub file: String,
    /// Byte offset of the first occurrence.
    pub offset: usize,
}

/// Result of scanning a fixture's artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SecretScanReport {
    /// Files that existed and were scanned.
    pub scanned: Vec<String>,
    /// Files containing the marker.
    pub findings: Vec<SecretFinding>,
}

impl SecretScanReport {
    /// Returns true when no file contained the marker.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Scans every listed fixture file that exists for `marker`.
///
/// # Errors
///
/// Returns [`FileAccessError`] when a path escapes the fixture or an existing
/// file cannot be read.
pub fn scan_fixture(
    fixture: &WorkflowFixture,
    files: &[&str],
    marker: &str,
) -> Result<SecretScanReport, FileAccessError> {
    let mut report = SecretScanReport::default();
    for file in files {
        if !fixture.file_exists(file)? {
            continue;
        }
        let contents = fixture.read_file(file)?;
        report.scanned.push((*file).to_string());
        if let Some(offset) = find_secret(&contents, marker) {
            warn!(file = %file, offset, "secret marker found in persisted artifact");
            report.findings.push(SecretFinding {
                file: (*file).to_string(),
                offset,
            });
        }
    }
    Ok(report)
}

/// Scans arbitrary files for `marker`; every file must exist.
///
/// Findings name files by their display path.
///
/// # Errors
///
/// Returns [`FileAccessError`] when a file cannot be read or exceeds
/// `max_bytes`.
pub fn scan_files<P: AsRef<Path>>(
    files: &[P],
    marker: &str,
    max_bytes: usize,
) -> Result<SecretScanReport, FileAccessError> {
    let mut report = SecretScanReport::default();
    for file in files {
        let path = file.as_ref();
        let contents = read_bytes_with_limit(path, max_bytes)
            .map_err(|err| err.into_file_access(path.to_path_buf()))?;
        let name = path.display().to_string();
        if let Some(offset) = find_secret(&contents, marker) {
            warn!(file = %name, offset, "secret marker found");
            report.findings.push(SecretFinding {
                file: name.clone(),
                offset,
            });
        }
        report.scanned.push(name);
    }
    Ok(report)
}
