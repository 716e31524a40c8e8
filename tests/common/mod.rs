//! In-memory coordination service and fake node binaries.
//!
//! The fake coordination service serves scripted ack values: every read of a
//! path pops the next scripted value until one is left, which then sticks.
//! A path can also be told to vanish once between `exists` and `read`.

use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::VecDeque;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use failover_harness::config::BuildStep;
use failover_harness::config::HarnessConfig;
use failover_harness::coordination::CoordinationClient;
use failover_harness::coordination::CoordinationConnector;
use failover_harness::CoordinationError;

pub const MASTER_ACK: &str = "/master-election-ack";

pub fn group_ack(group: &str) -> String {
    format!("/datanode_election_ack_{}", group)
}

#[derive(Debug, Default)]
struct State {
    acks: HashMap<String, VecDeque<String>>,
    races: HashSet<String>,
    exists_calls: HashMap<String, usize>,
    connects: usize,
    closes: usize,
}

/// Shared handle on the fake service; clone it before handing the connector
/// to an environment to inspect it afterwards.
#[derive(Debug, Clone, Default)]
pub struct FakeCoordination {
    state: Arc<Mutex<State>>,
}

impl FakeCoordination {
    pub fn script(
        &self,
        path: &str,
        values: &[&str],
    ) {
        let mut state = self.state.lock().unwrap();
        state
            .acks
            .insert(path.to_string(), values.iter().map(|v| v.to_string()).collect());
    }

    /// Next read of `path` after a successful `exists` reports NotFound.
    pub fn race_once(
        &self,
        path: &str,
    ) {
        self.state.lock().unwrap().races.insert(path.to_string());
    }

    pub fn exists_calls(
        &self,
        path: &str,
    ) -> usize {
        self.state
            .lock()
            .unwrap()
            .exists_calls
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }

    pub fn connector(&self) -> Box<dyn CoordinationConnector> {
        Box::new(FakeConnector {
            service: self.clone(),
        })
    }
}

struct FakeConnector {
    service: FakeCoordination,
}

#[async_trait]
impl CoordinationConnector for FakeConnector {
    async fn connect(
        &self,
        _servers: &str,
        _timeout: Duration,
    ) -> Result<Box<dyn CoordinationClient>, CoordinationError> {
        self.service.state.lock().unwrap().connects += 1;
        Ok(Box::new(FakeSession {
            service: self.service.clone(),
            closed: false,
        }))
    }
}

struct FakeSession {
    service: FakeCoordination,
    closed: bool,
}

#[async_trait]
impl CoordinationClient for FakeSession {
    async fn exists(
        &self,
        path: &str,
    ) -> Result<bool, CoordinationError> {
        if self.closed {
            return Err(CoordinationError::SessionClosed);
        }
        let mut state = self.service.state.lock().unwrap();
        *state.exists_calls.entry(path.to_string()).or_default() += 1;
        Ok(state.acks.get(path).is_some_and(|values| !values.is_empty()))
    }

    async fn read(
        &self,
        path: &str,
    ) -> Result<Vec<u8>, CoordinationError> {
        if self.closed {
            return Err(CoordinationError::SessionClosed);
        }
        let mut state = self.service.state.lock().unwrap();
        if state.races.remove(path) {
            return Err(CoordinationError::NotFound(path.to_string()));
        }
        let values = state
            .acks
            .get_mut(path)
            .ok_or_else(|| CoordinationError::NotFound(path.to_string()))?;
        let value = if values.len() > 1 {
            values.pop_front()
        } else {
            values.front().cloned()
        };
        value
            .map(String::into_bytes)
            .ok_or_else(|| CoordinationError::NotFound(path.to_string()))
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.service.state.lock().unwrap().closes += 1;
        }
    }
}

/// Writes an executable `sh` script into `dir` and returns its path.
pub fn write_script(
    dir: &Path,
    name: &str,
    body: &str,
) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A config whose infrastructure and build steps are no-ops and whose node
/// binaries are idle scripts under `dir`.
pub fn fast_config(dir: &Path) -> HarnessConfig {
    let node = write_script(dir, "fake-node", "echo \"started with: $*\"\nexec sleep 60");

    let mut config = HarnessConfig::default();
    config.cluster.master_binary = node.clone();
    config.cluster.datanode_binary = node;
    config.cluster.log_dir = dir.join("logs");
    config.infra.down_command = "true".to_string();
    config.infra.up_command = "true".to_string();
    config.infra.settle_delay_ms = 0;
    config.infra.build_steps = vec![BuildStep {
        dir: dir.to_path_buf(),
        command: "true".to_string(),
    }];
    config.scratch.root = dir.join("scratch");
    config.scratch.data_dir = dir.join("data");
    config.discovery.max_attempts = 5;
    config.discovery.poll_interval_ms = 20;
    config.scenario.workdir = dir.to_path_buf();
    config.scenario.program = "sh".to_string();
    config.scenario.injection_delay_ms = 0;
    config.scenario.timeout_ms = 5000;
    config
}

/// Whether `pid` is gone or a zombie waiting to be reaped.
pub fn is_dead(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Err(_) => true,
        Ok(stat) => stat
            .rsplit_once(')')
            .map(|(_, rest)| rest.trim_start().starts_with('Z'))
            .unwrap_or(false),
    }
}

pub async fn wait_until_dead(pid: u32) -> bool {
    for _ in 0..100 {
        if is_dead(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
