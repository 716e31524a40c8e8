//! Scenarios: one external test program run against a provisioned
//! environment, optionally synchronized with fault injection.

mod runner;
mod session;

pub use runner::*;
pub use session::*;


use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::fault::Fault;
use crate::Error;
use crate::Result;
use crate::ScenarioError;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioMode {
    /// Run to completion, judge by exit status only
    #[default]
    Direct,
    /// Drive through checkpoints, then wait for the pass sentinel
    Interactive,
}

/// Prompt the test program prints when it wants faults injected, and the
/// faults to inject before resuming it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub prompt: String,
    pub faults: Vec<Fault>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ScenarioConfig {
    pub name: String,

    #[serde(default)]
    pub mode: ScenarioMode,

    /// Program arguments. Empty means `test -run <name>`.
    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub checkpoints: Vec<Checkpoint>,
}

impl ScenarioConfig {
    pub fn direct(name: &str) -> Self {
        Self {
            name: name.to_string(),
            mode: ScenarioMode::Direct,
            args: Vec::new(),
            checkpoints: Vec::new(),
        }
    }

    pub fn interactive(
        name: &str,
        checkpoints: Vec<Checkpoint>,
    ) -> Self {
        Self {
            name: name.to_string(),
            mode: ScenarioMode::Interactive,
            args: Vec::new(),
            checkpoints,
        }
    }

    pub fn with_args(
        mut self,
        args: Vec<String>,
    ) -> Self {
        self.args = args;
        self
    }

    pub fn command_args(&self) -> Vec<String> {
        if self.args.is_empty() {
            vec!["test".to_string(), "-run".to_string(), self.name.clone()]
        } else {
            self.args.clone()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidConfig("scenario name cannot be empty".into()));
        }
        match self.mode {
            ScenarioMode::Direct if !self.checkpoints.is_empty() => Err(Error::InvalidConfig(format!(
                "direct scenario {} cannot have checkpoints",
                self.name
            ))),
            ScenarioMode::Interactive if self.checkpoints.is_empty() => Err(Error::InvalidConfig(
                format!("interactive scenario {} needs at least one checkpoint", self.name),
            )),
            _ => {
                if let Some(checkpoint) = self.checkpoints.iter().find(|c| c.prompt.is_empty()) {
                    return Err(Error::InvalidConfig(format!(
                        "scenario {} has a checkpoint with an empty prompt (faults: {:?})",
                        self.name, checkpoint.faults
                    )));
                }
                Ok(())
            }
        }
    }
}

/// Why a scenario failed. Never escalated past the scenario it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScenarioFailure {
    #[error("test process could not be started: {0}")]
    SpawnFailed(String),

    #[error("timed out after {after:?} waiting for {waiting_for:?}")]
    Timeout { waiting_for: String, after: Duration },

    #[error("test process output ended while waiting for {waiting_for:?}")]
    UnexpectedEof { waiting_for: String },

    #[error("test process exited without printing {sentinel:?}")]
    SentinelMissing { sentinel: String },

    #[error("injecting {fault} failed: {reason}")]
    InjectionFailed { fault: Fault, reason: String },

    #[error("test process exited with {code:?}")]
    NonZeroExit { code: Option<i32> },

    #[error("test process i/o failed: {0}")]
    Io(String),

    /// The fresh environment for this scenario never became ready
    #[error("environment unavailable: {0}")]
    EnvironmentUnavailable(String),
}

impl From<ScenarioError> for ScenarioFailure {
    fn from(e: ScenarioError) -> Self {
        match e {
            ScenarioError::Spawn { command, source } => {
                ScenarioFailure::SpawnFailed(format!("{}: {}", command, source))
            }
            ScenarioError::UnexpectedEof { waiting_for } => ScenarioFailure::UnexpectedEof { waiting_for },
            other => ScenarioFailure::Io(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioOutcome {
    Passed,
    Failed(ScenarioFailure),
}

#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub name: String,
    pub outcome: ScenarioOutcome,
    pub elapsed: Duration,
    /// Nodes found dead after a failed run
    pub exited_nodes: Vec<String>,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.outcome == ScenarioOutcome::Passed
    }

    pub fn failure(&self) -> Option<&ScenarioFailure> {
        match &self.outcome {
            ScenarioOutcome::Passed => None,
            ScenarioOutcome::Failed(failure) => Some(failure),
        }
    }
}
