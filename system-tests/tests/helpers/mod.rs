// system-tests/tests/helpers/mod.rs
// ============================================================================
// Module: System Test Helpers
// Description: Shared helpers for workflow harness system-tests.
// Purpose: Provide report artifacts and stub-tool workflow runners.
// Dependencies: system-tests, workflow-harness
// ============================================================================

//! ## Overview
//! Shared helpers for workflow harness system-tests.
//! Invariants:
//! - Fixture directories live under the per-test artifact root.
//! - The stub tool receives an explicit fault directive on every invocation.

#![allow(dead_code, reason = "Shared helpers are reused across multiple test suites.")]

pub mod artifacts;
pub mod workflow;
