//! Run report
//!
//! Records which steps completed and when, plus how the run ended. Written
//! as JSON so a failed run can be inspected after the browser is gone.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::step::Step;

/// How the run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Still running, or interrupted before an outcome was recorded
    Incomplete,
    Completed,
    Failed { kind: String, message: String },
    Cancelled,
}

/// A completed step and its offset from run start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: Step,
    pub at_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub url: String,
    pub outcome: Outcome,
    pub steps: Vec<StepRecord>,
    pub elapsed_ms: u64,
    /// Failure screenshot, if one was captured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<PathBuf>,
}

impl RunReport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            outcome: Outcome::Incomplete,
            steps: Vec::new(),
            elapsed_ms: 0,
            screenshot: None,
        }
    }

    pub fn record(&mut self, step: Step, at: Duration) {
        self.steps.push(StepRecord {
            step,
            at_ms: at.as_millis() as u64,
        });
    }

    pub fn finish(&mut self, outcome: Outcome, elapsed: Duration) {
        self.outcome = outcome;
        self.elapsed_ms = elapsed.as_millis() as u64;
    }

    pub fn fail(&mut self, error: &Error, elapsed: Duration) {
        self.finish(
            Outcome::Failed {
                kind: error.kind().to_string(),
                message: error.to_string(),
            },
            elapsed,
        );
    }

    /// Steps in completion order
    pub fn completed(&self) -> Vec<Step> {
        self.steps.iter().map(|r| r.step).collect()
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Completed
    }

    /// Save report to JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load report from JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
