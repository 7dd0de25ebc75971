// crates/workflow-harness/src/config/mod.rs
// ============================================================================
// Module: Harness Configuration
// Description: Configuration surface for workflow runs.
// Purpose: Expose environment-backed configuration types.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Configuration is read from `WORKFLOW_HARNESS_*` environment variables; see
//! [`HarnessEnv`] for the full list.

pub mod env;


pub use env::ConfigError;
pub use env::HarnessConfig;
pub use env::HarnessEnv;
