//! Mock coordination and launcher backends for environment-level tests.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use super::idle_handle;
use crate::coordination::CoordinationClient;
use crate::coordination::MockCoordinationClient;
use crate::coordination::MockCoordinationConnector;
use crate::node::MockNodeLauncher;
use crate::CoordinationError;

pub const MASTER_ACK: &str = "/master-election-ack";

pub type Acks = Arc<Mutex<HashMap<String, VecDeque<String>>>>;

/// Ack path -> successive values. Each read pops the front value until one
/// is left, which then sticks. An empty list means nothing is announced.
pub fn acks(
    master: &[&str],
    groups: [&[&str]; 3],
) -> Acks {
    let mut acks = HashMap::new();
    acks.insert(MASTER_ACK.to_string(), to_queue(master));
    for (group, values) in ["group1", "group2", "group3"].into_iter().zip(groups) {
        acks.insert(format!("/datanode_election_ack_{group}"), to_queue(values));
    }
    Arc::new(Mutex::new(acks))
}

fn to_queue(values: &[&str]) -> VecDeque<String> {
    values.iter().map(|v| v.to_string()).collect()
}

pub fn default_acks() -> Acks {
    acks(
        &["127.0.0.1:10001"],
        [&["127.0.0.1:15001"], &["127.0.0.1:15004"], &["127.0.0.1:15007"]],
    )
}

pub fn scripted_client(
    acks: Acks,
    closes: Arc<AtomicUsize>,
) -> MockCoordinationClient {
    let mut client = MockCoordinationClient::new();
    let exists_acks = acks.clone();
    client.expect_exists().returning(move |path| {
        Ok(exists_acks
            .lock()
            .unwrap()
            .get(path)
            .is_some_and(|values| !values.is_empty()))
    });
    client.expect_read().returning(move |path| {
        let mut acks = acks.lock().unwrap();
        let values = acks
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
    });
    client.expect_close().returning(move || {
        closes.fetch_add(1, Ordering::SeqCst);
    });
    client
}

pub fn connector(client: MockCoordinationClient) -> MockCoordinationConnector {
    let mut connector = MockCoordinationConnector::new();
    connector
        .expect_connect()
        .times(1)
        .return_once(move |_, _| Ok(Box::new(client) as Box<dyn CoordinationClient>));
    connector
}

pub fn idle_launcher() -> MockNodeLauncher {
    let mut launcher = MockNodeLauncher::new();
    launcher
        .expect_launch_master()
        .returning(|config| Ok(idle_handle(config)));
    launcher
        .expect_launch_datanode()
        .returning(|config| Ok(idle_handle(config)));
    launcher
}
