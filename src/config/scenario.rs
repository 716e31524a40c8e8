use std::collections::HashSet;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::fault::Fault;
use crate::scenario::Checkpoint;
use crate::scenario::ScenarioConfig;
use crate::Error;
use crate::Result;

/// External test program and the scenarios run against each environment
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ScenarioSettings {
    /// Working directory the test program runs in
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,

    #[serde(default = "default_program")]
    pub program: String,

    /// Hard limit for each wait on the test process (unit: milliseconds)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Pause between matching a checkpoint prompt and injecting its faults
    #[serde(default = "default_injection_delay_ms")]
    pub injection_delay_ms: u64,

    /// Literal the test process prints once it passed
    #[serde(default = "default_pass_sentinel")]
    pub pass_sentinel: String,

    #[serde(default = "default_scenarios")]
    pub scenarios: Vec<ScenarioConfig>,
}

impl Default for ScenarioSettings {
    fn default() -> Self {
        Self {
            workdir: default_workdir(),
            program: default_program(),
            timeout_ms: default_timeout_ms(),
            injection_delay_ms: default_injection_delay_ms(),
            pass_sentinel: default_pass_sentinel(),
            scenarios: default_scenarios(),
        }
    }
}

impl ScenarioSettings {
    pub fn validate(&self) -> Result<()> {
        if self.program.trim().is_empty() {
            return Err(Error::InvalidConfig("scenario program cannot be empty".into()));
        }
        if self.timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "scenario timeout_ms must be greater than 0".into(),
            ));
        }
        if self.pass_sentinel.is_empty() {
            return Err(Error::InvalidConfig("pass_sentinel cannot be empty".into()));
        }

        let mut names = HashSet::new();
        for scenario in &self.scenarios {
            scenario.validate()?;
            if !names.insert(scenario.name.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "Duplicate scenario {}",
                    scenario.name
                )));
            }
        }
        Ok(())
    }
}

fn default_workdir() -> PathBuf {
    PathBuf::from(".")
}
fn default_program() -> String {
    "go".to_string()
}
fn default_timeout_ms() -> u64 {
    30000
}
fn default_injection_delay_ms() -> u64 {
    5000
}
fn default_pass_sentinel() -> String {
    "PASS".to_string()
}
fn default_scenarios() -> Vec<ScenarioConfig> {
    let mut scenarios: Vec<ScenarioConfig> = [
        "TestCreate",
        "TestOpen",
        "TestReadAndWrite",
        "TestComplicatedReadAndWrite",
        "TestConcurrentWrite",
    ]
    .into_iter()
    .map(ScenarioConfig::direct)
    .collect();

    scenarios.push(ScenarioConfig::interactive(
        "TestHandleCrash",
        vec![
            Checkpoint {
                prompt: "Please crash datanodes!".to_string(),
                faults: vec![Fault::CrashDatanodeGroupPrimaries],
            },
            Checkpoint {
                prompt: "Please crash datanodes and master!".to_string(),
                faults: vec![Fault::CrashDatanodeGroupPrimaries, Fault::CrashPrimaryMaster],
            },
        ],
    ));
    scenarios
}
