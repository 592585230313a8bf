//! Integration test binary -- all integration tests consolidated into a single
//! binary.

// Allow unwrap/expect in test code
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod helpers;

mod dialogue_flow;
mod done_command;
mod reminder_schedule;
mod restart_resilience;
mod stdio_runtime;
