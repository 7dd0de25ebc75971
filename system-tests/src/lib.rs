// system-tests/src/lib.rs
// ============================================================================
// Module: Workflow Harness System Tests Library
// Description: Shared configuration and the stub provisioning tool.
// Purpose: Provide common utilities for workflow harness system-test binaries.
// Dependencies: serde, thiserror, toml, workflow-harness
// ============================================================================

//! ## Overview
//! This crate hosts the system-test configuration and the stub provisioning
//! tool driven by the suites in `system-tests/tests`. The stub is a real
//! subprocess, so suites exercise the harness exactly as a provisioning tool
//! binary would.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod stub;
