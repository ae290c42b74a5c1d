//! Integration tests for sorastream
//!
//! Tests are organized by component:
//! - engine_test: Engine state machine, seek clamping, cues, persistence cadence
//! - session_test: Tick/auto-hide timers and teardown (paused tokio clock)
//! - persist_test: File store, restart/resume, continue-watching registry
//! - cli_test: Command handlers against a temporary data directory

// Note: Each test file is a separate integration test crate
// Tests are run individually by cargo, not via mod.rs
