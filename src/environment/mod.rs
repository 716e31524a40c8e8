//! Environment lifecycle.
//!
//! `Uninitialized -> Provisioning -> Ready -> (Running -> Ready)* -> TornDown`
//!
//! Teardown is reachable from every state and runs at most once: either
//! explicitly through [`Environment::teardown`] / [`Environment::shutdown`],
//! or implicitly when the value is dropped, which covers early returns,
//! propagated errors and panics alike.

mod topology;

pub use topology::*;


use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::HarnessConfig;
use crate::coordination::CoordinationClient;
use crate::coordination::CoordinationConnector;
use crate::coordination::ZkConnector;
use crate::discovery::resolve;
use crate::discovery::DiscoveryPolicy;
use crate::fault::crash_and_rediscover;
use crate::fault::Fault;
use crate::fault::FaultTarget;
use crate::node::NodeConfig;
use crate::node::NodeHandle;
use crate::node::NodeLauncher;
use crate::node::ProcessLauncher;
use crate::registry::DatanodeGroupRegistry;
use crate::registry::ElectedSet;
use crate::registry::MasterRegistry;
use crate::scenario::ScenarioConfig;
use crate::scenario::ScenarioReport;
use crate::scenario::ScenarioRunner;
use crate::utils::file_io;
use crate::utils::shell::run_shell;
use crate::CoordinationError;
use crate::Error;
use crate::LaunchError;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentState {
    Uninitialized,
    Provisioning,
    Ready,
    Running,
    TornDown,
}

/// What a teardown did. Kill failures are logged, never reported as errors.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TeardownReport {
    /// Client addresses of every process a kill was attempted on
    pub killed: Vec<String>,
    pub session_closed: bool,
}

pub struct Environment {
    config: HarnessConfig,
    launcher: Box<dyn NodeLauncher>,
    connector: Box<dyn CoordinationConnector>,
    policy: DiscoveryPolicy,
    state: EnvironmentState,
    masters: MasterRegistry,
    datanodes: DatanodeGroupRegistry,
    coordination: Option<Box<dyn CoordinationClient>>,
}

impl Environment {
    /// Provisions a complete environment against real node binaries and the
    /// ZooKeeper ensemble named in `config`.
    ///
    /// On failure everything started so far is torn down before returning.
    pub async fn setup(config: HarnessConfig) -> Result<Self> {
        let launcher = Box::new(ProcessLauncher::from_config(&config.cluster));
        let mut env = Self::with_backends(config, launcher, Box::new(ZkConnector));
        env.provision().await?;
        Ok(env)
    }

    /// An unprovisioned environment using the given launcher and connector.
    pub fn with_backends(
        config: HarnessConfig,
        launcher: Box<dyn NodeLauncher>,
        connector: Box<dyn CoordinationConnector>,
    ) -> Self {
        let masters = MasterRegistry::new(config.coordination.master_election_ack.clone());
        let datanodes = DatanodeGroupRegistry::new(
            config.coordination.datanode_ack_prefix.clone(),
            &config.cluster.datanode_groups,
        );
        Self {
            policy: DiscoveryPolicy::from(&config.discovery),
            config,
            launcher,
            connector,
            state: EnvironmentState::Uninitialized,
            masters,
            datanodes,
            coordination: None,
        }
    }

    /// Brings the environment from `Uninitialized` to `Ready`.
    ///
    /// The coordination session is opened right after the infrastructure
    /// settles and before any node is launched, so every failure past that
    /// point leaves exactly one session for teardown to close.
    pub async fn provision(&mut self) -> Result<()> {
        if self.state != EnvironmentState::Uninitialized {
            return Err(Error::Fatal(format!(
                "cannot provision an environment in state {:?}",
                self.state
            )));
        }
        self.state = EnvironmentState::Provisioning;
        info!("provisioning environment");

        self.clean_scratch().await;
        self.restart_infrastructure().await?;

        let settle = Duration::from_millis(self.config.infra.settle_delay_ms);
        debug!("waiting {:?} for zookeepers and kafka preparation.", settle);
        tokio::time::sleep(settle).await;

        self.connect().await?;
        self.build().await?;
        self.launch_masters()?;
        self.launch_datanodes()?;
        self.discover_all().await?;

        self.state = EnvironmentState::Ready;
        info!(
            masters = self.masters.len(),
            datanodes = self.datanodes.len(),
            "environment ready"
        );
        Ok(())
    }

    async fn clean_scratch(&self) {
        let scratch = &self.config.scratch;
        let dbs = file_io::remove_files_with_extension(&scratch.root, &scratch.db_extension).await;
        let data = file_io::clear_dir(&scratch.data_dir).await;
        debug!(dbs, data, "cleaned test data");
    }

    async fn restart_infrastructure(&self) -> Result<()> {
        for command in [&self.config.infra.down_command, &self.config.infra.up_command] {
            if command.trim().is_empty() {
                continue;
            }
            let status = run_shell(command, None).await?;
            if !status.success() {
                return Err(LaunchError::InfrastructureFailed {
                    command: command.clone(),
                    status,
                }
                .into());
            }
        }
        Ok(())
    }

    async fn connect(&mut self) -> Result<()> {
        let servers = &self.config.coordination.servers;
        let timeout = Duration::from_millis(self.config.coordination.connect_timeout_ms);
        let client = self.connector.connect(servers, timeout).await?;
        info!(%servers, "coordination session opened");
        self.coordination = Some(client);
        Ok(())
    }

    async fn build(&self) -> Result<()> {
        for step in &self.config.infra.build_steps {
            let status = run_shell(&step.command, Some(&step.dir)).await?;
            if !status.success() {
                return Err(LaunchError::BuildFailed {
                    dir: step.dir.clone(),
                    command: step.command.clone(),
                    status,
                }
                .into());
            }
        }
        Ok(())
    }

    fn launch_masters(&mut self) -> Result<()> {
        for config in master_configs(&self.config)? {
            let handle = self.launcher.launch_master(config)?;
            self.masters.insert(handle)?;
        }
        Ok(())
    }

    fn launch_datanodes(&mut self) -> Result<()> {
        for config in datanode_configs(&self.config)? {
            let handle = self.launcher.launch_datanode(config)?;
            self.datanodes.insert(handle)?;
        }
        Ok(())
    }

    async fn discover_all(&mut self) -> Result<()> {
        let client = self
            .coordination
            .as_deref()
            .ok_or(CoordinationError::SessionClosed)?;

        let ack_path = self.masters.ack_path().to_string();
        discover_into(self.masters.set_mut(), client, &ack_path, self.policy).await?;

        for group in self.datanodes.group_names() {
            let ack_path = self.datanodes.ack_path(&group);
            discover_into(self.datanodes.group_mut(&group)?, client, &ack_path, self.policy).await?;
        }
        Ok(())
    }

    /// Kills the known primary master and waits for its successor.
    /// Returns the new primary's address.
    pub async fn crash_primary_master(&mut self) -> Result<String> {
        self.ensure_live()?;
        let client = self
            .coordination
            .as_deref()
            .ok_or(CoordinationError::SessionClosed)?;

        let ack_path = self.masters.ack_path().to_string();
        crash_known_primary(self.masters.set_mut(), client, &ack_path, self.policy).await
    }

    /// Kills the known primary of every datanode group, one group at a time,
    /// rediscovering each group before moving to the next.
    /// Returns group name -> new primary address.
    pub async fn crash_all_datanode_group_primaries(&mut self) -> Result<BTreeMap<String, String>> {
        self.ensure_live()?;
        let client = self
            .coordination
            .as_deref()
            .ok_or(CoordinationError::SessionClosed)?;

        let mut primaries = BTreeMap::new();
        for group in self.datanodes.group_names() {
            let ack_path = self.datanodes.ack_path(&group);
            let set = self.datanodes.group_mut(&group)?;
            let primary = crash_known_primary(set, client, &ack_path, self.policy).await?;
            primaries.insert(group, primary);
        }
        Ok(primaries)
    }

    /// Runs one scenario with this environment as its fault target.
    pub async fn run_scenario(
        &mut self,
        runner: &ScenarioRunner,
        scenario: &ScenarioConfig,
    ) -> Result<ScenarioReport> {
        if self.state != EnvironmentState::Ready {
            return Err(Error::Fatal(format!(
                "cannot run {} in state {:?}",
                scenario.name, self.state
            )));
        }

        self.state = EnvironmentState::Running;
        let mut report = runner.run(scenario, self).await;
        self.state = EnvironmentState::Ready;

        if !report.passed() {
            self.output();
            report.exited_nodes = self.check_health();
        }
        Ok(report)
    }

    /// Logs captured output of every tracked node.
    pub fn output(&self) {
        dump_output(self.masters.set());
        for (_, set) in self.datanodes.groups() {
            dump_output(set);
        }
    }

    /// Addresses of tracked nodes whose process already exited.
    pub fn check_health(&mut self) -> Vec<String> {
        let mut exited = collect_exited(self.masters.set_mut());
        for (_, set) in self.datanodes.groups_mut() {
            exited.extend(collect_exited(set));
        }
        exited
    }

    /// Kills every tracked process and closes the coordination session.
    ///
    /// Never fails. A second call is a no-op that returns an empty report.
    pub fn teardown(&mut self) -> TeardownReport {
        if self.state == EnvironmentState::TornDown {
            return TeardownReport::default();
        }
        info!("tearing down environment in state {:?}", self.state);

        let mut killed = self.masters.kill_all();
        killed.extend(self.datanodes.kill_all());

        let session_closed = match self.coordination.take() {
            Some(mut client) => {
                client.close();
                true
            }
            None => false,
        };

        self.state = EnvironmentState::TornDown;
        info!(killed = killed.len(), session_closed, "environment torn down");
        TeardownReport {
            killed,
            session_closed,
        }
    }

    /// Consumes the environment, tearing it down.
    pub fn shutdown(mut self) -> TeardownReport {
        self.teardown()
    }

    pub fn state(&self) -> EnvironmentState {
        self.state
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn masters(&self) -> &MasterRegistry {
        &self.masters
    }

    pub fn datanodes(&self) -> &DatanodeGroupRegistry {
        &self.datanodes
    }

    fn ensure_live(&self) -> Result<()> {
        match self.state {
            EnvironmentState::Ready | EnvironmentState::Running => Ok(()),
            state => Err(Error::Fatal(format!("no live cluster in state {:?}", state))),
        }
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[async_trait]
impl FaultTarget for Environment {
    async fn inject(
        &mut self,
        fault: Fault,
    ) -> Result<()> {
        match fault {
            Fault::CrashPrimaryMaster => {
                self.crash_primary_master().await?;
            }
            Fault::CrashDatanodeGroupPrimaries => {
                self.crash_all_datanode_group_primaries().await?;
            }
        }
        Ok(())
    }
}

async fn discover_into<C: NodeConfig>(
    set: &mut ElectedSet<C>,
    client: &dyn CoordinationClient,
    ack_path: &str,
    policy: DiscoveryPolicy,
) -> Result<String> {
    let address = resolve(client, ack_path, set.nodes(), policy)
        .await?
        .address
        .to_string();
    set.set_primary(&address);
    Ok(address)
}

/// Crashes the set's known primary. If the reference went stale (a previous
/// rediscovery failed), the current primary is resolved first.
async fn crash_known_primary<C: NodeConfig>(
    set: &mut ElectedSet<C>,
    client: &dyn CoordinationClient,
    ack_path: &str,
    policy: DiscoveryPolicy,
) -> Result<String> {
    let address = match set.primary_address() {
        Some(address) => address.to_string(),
        None => discover_into(set, client, ack_path, policy).await?,
    };
    crash_and_rediscover(set, client, ack_path, &address, policy).await
}

fn dump_output<C: NodeConfig>(set: &ElectedSet<C>) {
    for (address, handle) in set.nodes() {
        match handle.captured_output() {
            Ok(output) => debug!("{}: {}", address, output),
            Err(e) => warn!("no captured output for {} at {:?}: {}", address, handle.output_path(), e),
        }
    }
}

fn collect_exited<C: NodeConfig>(set: &mut ElectedSet<C>) -> Vec<String> {
    set.iter_mut()
        .filter_map(|handle: &mut NodeHandle<C>| match handle.try_exit_status() {
            Ok(Some(status)) => {
                warn!("{} ({}) exited with {}", handle.node_id(), handle.client_address(), status);
                Some(handle.client_address().to_string())
            }
            Ok(None) => None,
            Err(e) => {
                warn!("failed to poll {}: {}", handle.node_id(), e);
                None
            }
        })
        .collect()
}
