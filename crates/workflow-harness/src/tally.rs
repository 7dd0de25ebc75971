// crates/workflow-harness/src/tally.rs
// ============================================================================
// Module: Stage Output Tallies
// Description: Change tallies reported in human-readable stage output.
// Purpose: Extract the numbers the tool claims so they can be cross-checked.
// Dependencies: regex, serde
// ============================================================================

//! ## Overview
//! The provisioning tool summarises each stage with a one-line tally. These
//! lines are parsed here and never trusted on their own: the orchestrator
//! compares every parsed tally against the decoded artifacts.
//!
//! Output may contain ANSI colour escapes; they are stripped before matching.
//! When a tally line appears more than once, the last occurrence wins.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

// ============================================================================
// SECTION: Patterns
// ============================================================================

/// ANSI SGR colour escape pattern.
pub(crate) const ANSI_PATTERN: &str = r"\x1b\[[0-9;]*m";
/// Plan summary line pattern.
pub(crate) const PLAN_PATTERN: &str = r"(\d+) to add, (\d+) to change, (\d+) to destroy";
/// Apply summary line pattern.
pub(crate) const APPLY_PATTERN: &str = r"Resources: (\d+) added, (\d+) changed, (\d+) destroyed";
/// Destroy summary line pattern.
pub(crate) const DESTROY_PATTERN: &str = r"Resources: (\d+) destroyed";

/// Compiles one of the constant patterns above.
#[allow(clippy::expect_used, reason = "Constant patterns are compiled by a unit test.")]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static tally pattern should always compile")
}

/// Matches ANSI SGR colour escapes.
static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| compile(ANSI_PATTERN));

/// Matches the plan summary line.
static PLAN_TALLY: LazyLock<Regex> = LazyLock::new(|| compile(PLAN_PATTERN));

/// Matches the apply summary line.
static APPLY_TALLY: LazyLock<Regex> = LazyLock::new(|| compile(APPLY_PATTERN));

/// Matches the destroy summary line.
static DESTROY_TALLY: LazyLock<Regex> = LazyLock::new(|| compile(DESTROY_PATTERN));

/// Plan output emitted when nothing would change.
const NO_CHANGES: &str = "No changes.";

// ============================================================================
// SECTION: Tallies
// ============================================================================

/// Counts claimed by the plan stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanTally {
    /// Resources to add.
    pub add: usize,
    /// Resources to change in place.
    pub change: usize,
    /// Resources to destroy.
    pub destroy: usize,
}

impl PlanTally {
    /// Creates a plan tally.
    #[must_use]
    pub const fn new(add: usize, change: usize, destroy: usize) -> Self {
        Self {
            add,
            change,
            destroy,
        }
    }
}

impl fmt::Display for PlanTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to add, {} to change, {} to destroy", self.add, self.change, self.destroy)
    }
}

/// Counts claimed by the apply stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApplyTally {
    /// Resources added.
    pub added: usize,
    /// Resources changed in place.
    pub changed: usize,
    /// Resources destroyed.
    pub destroyed: usize,
}

impl ApplyTally {
    /// Creates an apply tally.
    #[must_use]
    pub const fn new(added: usize, changed: usize, destroyed: usize) -> Self {
        Self {
            added,
            changed,
            destroyed,
        }
    }
}

impl From<PlanTally> for ApplyTally {
    fn from(plan: PlanTally) -> Self {
        Self::new(plan.add, plan.change, plan.destroy)
    }
}

impl fmt::Display for ApplyTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Resources: {} added, {} changed, {} destroyed",
            self.added, self.changed, self.destroyed
        )
    }
}

/// Count claimed by the destroy stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DestroyTally {
    /// Resources destroyed.
    pub destroyed: usize,
}

impl DestroyTally {
    /// Creates a destroy tally.
    #[must_use]
    pub const fn new(destroyed: usize) -> Self {
        Self {
            destroyed,
        }
    }
}

impl fmt::Display for DestroyTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resources: {} destroyed", self.destroyed)
    }
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Parses the plan tally; `No changes.` yields an all-zero tally.
#[must_use]
pub fn parse_plan_tally(output: &str) -> Option<PlanTally> {
    let clean = strip_ansi(output);
    if let Some([add, change, destroy]) = last_counts::<3>(&PLAN_TALLY, &clean) {
        return Some(PlanTally::new(add, change, destroy));
    }
    clean.contains(NO_CHANGES).then(PlanTally::default)
}

/// Parses the apply tally.
#[must_use]
pub fn parse_apply_tally(output: &str) -> Option<ApplyTally> {
    let clean = strip_ansi(output);
    last_counts::<3>(&APPLY_TALLY, &clean)
        .map(|[added, changed, destroyed]| ApplyTally::new(added, changed, destroyed))
}

/// Parses the destroy tally.
#[must_use]
pub fn parse_destroy_tally(output: &str) -> Option<DestroyTally> {
    let clean = strip_ansi(output);
    last_counts::<1>(&DESTROY_TALLY, &clean).map(|[destroyed]| DestroyTally::new(destroyed))
}

/// Returns the notice init prints when downloading a provider plugin.
#[must_use]
pub fn provider_download_notice(provider: &str) -> String {
    format!("- Downloading plugin for provider \"{provider}\"")
}

/// Returns true when init output announces the provider download.
#[must_use]
pub fn has_provider_download(output: &str, provider: &str) -> bool {
    strip_ansi(output).contains(&provider_download_notice(provider))
}

/// Removes ANSI colour escapes from tool output.
#[must_use]
pub fn strip_ansi(output: &str) -> Cow<'_, str> {
    ANSI_ESCAPE.replace_all(output, "")
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the numeric captures of the last match of a pattern.
fn last_counts<const N: usize>(pattern: &Regex, text: &str) -> Option<[usize; N]> {
    let captures = pattern.captures_iter(text).last()?;
    let mut counts = [0; N];
    for (index, slot) in counts.iter_mut().enumerate() {
        *slot = captures.get(index + 1)?.as_str().parse().ok()?;
    }
    Some(counts)
}
