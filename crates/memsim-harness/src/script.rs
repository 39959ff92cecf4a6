//! Scripted-session fixtures.
//!
//! A script is a JSON document describing a sequence of protocol lines
//! to send and what each response unit should look like. Scripts are
//! replayed against a fresh [`Session`], so runs are deterministic and
//! independent.

use std::path::Path;

use memsim_core::Session;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to load a script file.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid script json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("script has no steps")]
    Empty,
}

/// A replayable protocol script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    pub version: String,
    pub name: String,
    pub steps: Vec<ScriptStep>,
}

/// One scripted command and its expectation.
///
/// `expect` matches the whole response unit exactly (multi-line units
/// joined with `\n`); `expect_contains` matches a substring. A step
/// with neither merely drives the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptStep {
    pub send: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_contains: Option<String>,
}

/// Outcome of one replayed step.
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub command: String,
    pub actual: String,
    pub expected: Option<String>,
    pub passed: bool,
}

impl Script {
    /// Parses a script from JSON text.
    pub fn from_json(raw: &str) -> Result<Self, ScriptError> {
        let script: Script = serde_json::from_str(raw)?;
        if script.steps.is_empty() {
            return Err(ScriptError::Empty);
        }
        Ok(script)
    }

    /// Loads a script from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self, ScriptError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

/// Replays `script` against a fresh session and collects per-step results.
#[must_use]
pub fn run_script(script: &Script) -> Vec<StepResult> {
    let mut session = Session::new();
    script
        .steps
        .iter()
        .map(|step| {
            let actual = session.handle_line(&step.send).unwrap_or_default();
            let (passed, expected) = match (&step.expect, &step.expect_contains) {
                (Some(exact), _) => (actual == *exact, Some(exact.clone())),
                (None, Some(needle)) => (actual.contains(needle), Some(needle.clone())),
                (None, None) => (true, None),
            };
            StepResult {
                command: step.send.clone(),
                actual,
                expected,
                passed,
            }
        })
        .collect()
}
