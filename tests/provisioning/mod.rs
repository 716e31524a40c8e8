//! Provisioning failures: whatever was started before the failure must be
//! torn down, and the coordination session closed exactly once.

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use failover_harness::environment::Environment;
use failover_harness::environment::EnvironmentState;
use failover_harness::node::DataNodeConfig;
use failover_harness::node::DataNodeHandle;
use failover_harness::node::MasterConfig;
use failover_harness::node::MasterHandle;
use failover_harness::node::NodeLauncher;
use failover_harness::node::NodeRole;
use failover_harness::node::ProcessLauncher;
use failover_harness::DiscoveryError;
use failover_harness::Error;
use failover_harness::LaunchError;
use failover_harness::Result;

use crate::common::fast_config;
use crate::common::group_ack;
use crate::common::wait_until_dead;
use crate::common::FakeCoordination;
use crate::common::MASTER_ACK;
use crate::enable_logger;

fn elected_coordination() -> FakeCoordination {
    let fake = FakeCoordination::default();
    fake.script(MASTER_ACK, &["127.0.0.1:10000"]);
    fake.script(&group_ack("group1"), &["127.0.0.1:15000"]);
    fake.script(&group_ack("group2"), &["127.0.0.1:15003"]);
    fake.script(&group_ack("group3"), &["127.0.0.1:15006"]);
    fake
}

/// Launches real processes until the `fail_at`-th datanode, which fails the
/// way a missing binary would.
struct FailingLauncher {
    inner: ProcessLauncher,
    fail_at: usize,
    datanodes: AtomicUsize,
}

impl NodeLauncher for FailingLauncher {
    fn launch_master(
        &self,
        config: MasterConfig,
    ) -> Result<MasterHandle> {
        self.inner.launch_master(config)
    }

    fn launch_datanode(
        &self,
        config: DataNodeConfig,
    ) -> Result<DataNodeHandle> {
        if self.datanodes.fetch_add(1, Ordering::SeqCst) == self.fail_at {
            return Err(LaunchError::SpawnFailed {
                role: NodeRole::DataNode,
                node_id: config.node_id,
                binary: "datanode".into(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            }
            .into());
        }
        self.inner.launch_datanode(config)
    }
}

#[tokio::test]
async fn test_failure_in_last_group_tears_down_everything_launched() {
    enable_logger();
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config(dir.path());
    let fake = elected_coordination();
    let launcher = Box::new(FailingLauncher {
        inner: ProcessLauncher::from_config(&config.cluster),
        fail_at: 7,
        datanodes: AtomicUsize::new(0),
    });
    let mut env = Environment::with_backends(config, launcher, fake.connector());

    let result = env.provision().await;

    assert!(matches!(result, Err(Error::Launch(LaunchError::SpawnFailed { .. }))));
    let mut pids: Vec<u32> = env.masters().set().nodes().values().filter_map(|h| h.pid()).collect();
    for (_, set) in env.datanodes().groups() {
        pids.extend(set.nodes().values().filter_map(|h| h.pid()));
    }
    assert_eq!(pids.len(), 10);
    assert_eq!(env.datanodes().group("group3").unwrap().len(), 1);

    let report = env.teardown();

    assert_eq!(report.killed.len(), 10);
    assert!(report.session_closed);
    assert_eq!(fake.closes(), 1);
    for pid in pids {
        assert!(wait_until_dead(pid).await, "node {pid} survived teardown");
    }

    drop(env);
    assert_eq!(fake.closes(), 1);
}

#[tokio::test]
async fn test_missing_master_binary_aborts_provisioning() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = fast_config(dir.path());
    config.cluster.master_binary = dir.path().join("no-such-master");
    let fake = elected_coordination();
    let launcher = Box::new(ProcessLauncher::from_config(&config.cluster));
    let mut env = Environment::with_backends(config, launcher, fake.connector());

    let result = env.provision().await;

    match result {
        Err(Error::Launch(LaunchError::SpawnFailed { role, node_id, .. })) => {
            assert_eq!(role, NodeRole::Master);
            assert_eq!(node_id, "master0");
        }
        Err(e) => panic!("expected SpawnFailed, got {e:?}"),
        Ok(()) => panic!("expected SpawnFailed, got Ok"),
    }
    assert!(env.masters().is_empty());
    drop(env);
    assert_eq!(fake.closes(), 1);
}

#[tokio::test]
async fn test_failed_build_step_aborts_before_launching() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = fast_config(dir.path());
    config.infra.build_steps[0].command = "echo compile error >&2; exit 2".to_string();
    let fake = elected_coordination();
    let launcher = Box::new(ProcessLauncher::from_config(&config.cluster));
    let mut env = Environment::with_backends(config, launcher, fake.connector());

    let result = env.provision().await;

    match result {
        Err(Error::Launch(LaunchError::BuildFailed { status, .. })) => assert_eq!(status.code(), Some(2)),
        Err(e) => panic!("expected BuildFailed, got {e:?}"),
        Ok(()) => panic!("expected BuildFailed, got Ok"),
    }
    assert!(env.masters().is_empty());
    assert_eq!(env.teardown().killed.len(), 0);
    assert_eq!(fake.closes(), 1);
}

#[tokio::test]
async fn test_unelected_master_exhausts_retry_budget() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config(dir.path());
    let fake = FakeCoordination::default();
    let launcher = Box::new(ProcessLauncher::from_config(&config.cluster));
    let mut env = Environment::with_backends(config, launcher, fake.connector());

    let result = env.provision().await;

    assert!(matches!(
        result,
        Err(Error::Discovery(DiscoveryError::PrimaryNotFound { attempts: 5, .. }))
    ));
    assert_eq!(fake.exists_calls(MASTER_ACK), 5);
    assert_eq!(env.state(), EnvironmentState::Provisioning);
    assert_eq!(env.teardown().killed.len(), 12);
    assert_eq!(fake.closes(), 1);
}

#[tokio::test]
async fn test_setup_fails_fast_when_infrastructure_does_not_start() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = fast_config(dir.path());
    config.infra.up_command = "exit 1".to_string();

    let result = Environment::setup(config).await;

    assert!(matches!(
        result,
        Err(Error::Launch(LaunchError::InfrastructureFailed { .. }))
    ));
}
