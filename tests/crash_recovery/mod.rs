//! Crash recovery against a provisioned environment of 3 masters and
//! 3 datanode groups of 3, backed by real (idle) node processes and the fake
//! coordination service.
//!
//! Expected Result:
//!
//! - Initial discovery finds one primary and two others per set.
//! - Every crash removes the primary, kills its process and resolves a
//!   different survivor as the new primary.

use failover_harness::coordination::CoordinationConnector;
use failover_harness::discovery::resolve;
use failover_harness::discovery::DiscoveryPolicy;
use failover_harness::environment::Environment;
use failover_harness::environment::EnvironmentState;
use failover_harness::fault::Fault;
use failover_harness::node::ProcessLauncher;
use failover_harness::scenario::Checkpoint;
use failover_harness::scenario::ScenarioConfig;
use failover_harness::scenario::ScenarioRunner;
use tempfile::TempDir;

use crate::common::fast_config;
use crate::common::group_ack;
use crate::common::wait_until_dead;
use crate::common::FakeCoordination;
use crate::common::MASTER_ACK;
use crate::enable_logger;

const GROUPS: [&str; 3] = ["group1", "group2", "group3"];

/// Scripts enough successive primaries for two rounds of crashes per set.
fn churning_coordination() -> FakeCoordination {
    let fake = FakeCoordination::default();
    fake.script(MASTER_ACK, &["127.0.0.1:10001", "127.0.0.1:10002"]);
    for (i, group) in GROUPS.iter().enumerate() {
        let base = 15000 + i as u16 * 3;
        let addrs: Vec<String> = (0..3).map(|j| format!("127.0.0.1:{}", base + j)).collect();
        let addrs: Vec<&str> = addrs.iter().map(String::as_str).collect();
        fake.script(&group_ack(group), &addrs);
    }
    fake
}

async fn provisioned(fake: &FakeCoordination) -> (Environment, TempDir) {
    enable_logger();
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config(dir.path());
    let launcher = Box::new(ProcessLauncher::from_config(&config.cluster));
    let mut env = Environment::with_backends(config, launcher, fake.connector());
    env.provision().await.unwrap();
    (env, dir)
}

#[tokio::test]
async fn test_initial_discovery_finds_one_primary_and_two_others_per_set() {
    let fake = churning_coordination();
    let (env, _dir) = provisioned(&fake).await;

    assert_eq!(env.state(), EnvironmentState::Ready);
    let ports: Vec<u16> = env.masters().set().nodes().values().map(|h| h.config().port).collect();
    assert_eq!(ports, vec![10000, 10001, 10002]);
    assert_eq!(env.datanodes().len(), 9);

    let client = fake.connector().connect("fake", Default::default()).await.unwrap();
    let policy = DiscoveryPolicy::from(&env.config().discovery);

    let master = resolve(client.as_ref(), MASTER_ACK, env.masters().set().nodes(), policy)
        .await
        .unwrap();
    assert_eq!(master.address, "127.0.0.1:10002");
    assert_eq!(master.others.len(), 2);

    for group in GROUPS {
        let set = env.datanodes().group(group).unwrap();
        let primary = resolve(client.as_ref(), &group_ack(group), set.nodes(), policy)
            .await
            .unwrap();
        assert_eq!(primary.others.len(), 2);
        assert!(primary.others.iter().all(|h| h.client_address() != primary.address));
    }
}

#[tokio::test]
async fn test_nodes_are_launched_with_their_flags() {
    let fake = churning_coordination();
    let (env, _dir) = provisioned(&fake).await;

    let handle = env.datanodes().group("group2").unwrap().get("127.0.0.1:15004").unwrap();
    let mut output = String::new();
    for _ in 0..100 {
        output = handle.captured_output().unwrap_or_default();
        if !output.is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    assert!(output.contains("-i datanode-group2-1"));
    assert!(output.contains("-gn group2"));
}

#[tokio::test]
async fn test_every_node_captures_its_own_output() {
    let fake = churning_coordination();
    let (env, _dir) = provisioned(&fake).await;

    let mut outputs: Vec<(String, String)> = Vec::new();
    for _ in 0..100 {
        outputs = env
            .masters()
            .set()
            .nodes()
            .values()
            .map(|h| (h.node_id().to_string(), h.captured_output().unwrap_or_default()))
            .collect();
        for (_, set) in env.datanodes().groups() {
            outputs.extend(
                set.nodes()
                    .values()
                    .map(|h| (h.node_id().to_string(), h.captured_output().unwrap_or_default())),
            );
        }
        if outputs.iter().all(|(_, out)| out.contains("started with:")) {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    assert_eq!(outputs.len(), 12);
    for (node_id, output) in &outputs {
        assert!(output.starts_with("started with:"), "{node_id}: {output:?}");
        assert!(output.contains(&format!("-i {node_id} ")), "{node_id}: {output:?}");
    }
}

#[tokio::test]
async fn test_crash_primary_master_kills_process_and_elects_survivor() {
    let fake = churning_coordination();
    let (mut env, _dir) = provisioned(&fake).await;
    let old = env.masters().primary().unwrap();
    let old_address = old.client_address().to_string();
    let old_pid = old.pid().unwrap();

    let new_address = env.crash_primary_master().await.unwrap();

    assert_ne!(new_address, old_address);
    assert!(env.masters().set().get(&new_address).is_some());
    assert!(env.masters().set().get(&old_address).is_none());
    assert!(wait_until_dead(old_pid).await, "crashed master {old_pid} still alive");
    assert!(env.check_health().is_empty());
}

#[tokio::test]
async fn test_rediscovery_tolerates_ack_deleted_during_read() {
    let fake = churning_coordination();
    let (mut env, _dir) = provisioned(&fake).await;
    let checks_before = fake.exists_calls(MASTER_ACK);

    fake.race_once(MASTER_ACK);
    let new_address = env.crash_primary_master().await.unwrap();

    assert_eq!(new_address, "127.0.0.1:10002");
    assert_eq!(fake.exists_calls(MASTER_ACK) - checks_before, 2);
}

#[tokio::test]
async fn test_interactive_handle_crash_scenario_passes() {
    let fake = churning_coordination();
    let (mut env, _dir) = provisioned(&fake).await;
    let old_master = env.masters().primary().unwrap().pid().unwrap();

    let scenario = ScenarioConfig::interactive(
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
    )
    .with_args(vec![
        "-c".to_string(),
        "echo '=== RUN   TestHandleCrash'; \
         echo 'Please crash datanodes!'; read _; \
         echo 'Please crash datanodes and master!'; read _; \
         echo '--- PASS: TestHandleCrash (0.01s)'; echo PASS"
            .to_string(),
    ]);
    let runner = ScenarioRunner::from_config(&env.config().scenario);

    let report = env.run_scenario(&runner, &scenario).await.unwrap();

    assert!(report.passed(), "unexpected outcome {:?}", report.outcome);
    assert_eq!(env.masters().len(), 2);
    assert_eq!(env.masters().set().primary_address(), Some("127.0.0.1:10002"));
    for (i, group) in GROUPS.iter().enumerate() {
        let set = env.datanodes().group(group).unwrap();
        assert_eq!(set.len(), 1);
        let last = format!("127.0.0.1:{}", 15000 + i * 3 + 2);
        assert_eq!(set.primary_address(), Some(last.as_str()));
    }
    assert!(wait_until_dead(old_master).await);
}

#[tokio::test]
async fn test_dropping_environment_kills_every_node() {
    let fake = churning_coordination();
    let (env, _dir) = provisioned(&fake).await;
    let mut pids: Vec<u32> = env
        .masters()
        .set()
        .nodes()
        .values()
        .filter_map(|h| h.pid())
        .collect();
    for (_, set) in env.datanodes().groups() {
        pids.extend(set.nodes().values().filter_map(|h| h.pid()));
    }
    assert_eq!(pids.len(), 12);

    drop(env);

    assert_eq!(fake.closes(), 1);
    for pid in pids {
        assert!(wait_until_dead(pid).await, "node {pid} survived teardown");
    }
}
