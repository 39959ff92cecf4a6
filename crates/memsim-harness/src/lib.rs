//! Protocol tooling around `memsim-core`.
//!
//! This crate provides:
//! - The `memsim` binary: the stdin/stdout line-protocol loop an
//!   external presentation client spawns and drives
//! - Script fixtures: JSON-scripted sessions replayed against a fresh
//!   simulator, with pass/fail results per step
//! - Report generation: a markdown summary of a script run
//! - Tracing: an optional JSONL record per processed command

#![forbid(unsafe_code)]

pub mod report;
pub mod script;
pub mod trace;

pub use report::render_report;
pub use script::{Script, ScriptError, ScriptStep, StepResult, run_script};
pub use trace::TraceWriter;
