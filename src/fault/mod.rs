//! Process-level failure injection.
//!
//! A crash is a SIGKILL: no graceful shutdown, no chance for the node to hand
//! over leadership. Re-election is entirely up to the cluster under test; the
//! harness only observes the new ack value.

use std::fmt;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;
use tracing::warn;

use crate::coordination::CoordinationClient;
use crate::discovery::resolve;
use crate::discovery::DiscoveryPolicy;
use crate::node::NodeConfig;
use crate::node::NodeHandle;
use crate::registry::ElectedSet;
use crate::Error;
use crate::Result;

/// Fault a scenario checkpoint can request.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Fault {
    /// Kill the known primary of every datanode group, then rediscover each
    CrashDatanodeGroupPrimaries,
    /// Kill the known primary master, then rediscover
    CrashPrimaryMaster,
}

impl fmt::Display for Fault {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Fault::CrashDatanodeGroupPrimaries => write!(f, "crash_datanode_group_primaries"),
            Fault::CrashPrimaryMaster => write!(f, "crash_primary_master"),
        }
    }
}

/// Something faults can be injected into. Implemented by the environment;
/// mocked when testing the scenario runner.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FaultTarget: Send {
    async fn inject(
        &mut self,
        fault: Fault,
    ) -> Result<()>;
}

/// Issues the kill signal and returns without waiting for the process to exit.
pub fn crash<C: NodeConfig>(handle: &mut NodeHandle<C>) -> Result<()> {
    info!(
        role = %C::ROLE,
        node_id = %handle.node_id(),
        addr = %handle.client_address(),
        "crashing node"
    );
    handle.kill()?;
    Ok(())
}

/// Crashes the member at `address`, removes it from `set` and resolves the
/// set's new primary from `ack_path`. Returns the new primary's address, which
/// is recorded on `set` as well.
///
/// Only meaningful when `address` is the set's known primary: killing a
/// follower does not move the ack value.
pub async fn crash_and_rediscover<C: NodeConfig>(
    set: &mut ElectedSet<C>,
    coordination: &dyn CoordinationClient,
    ack_path: &str,
    address: &str,
    policy: DiscoveryPolicy,
) -> Result<String> {
    if set.primary_address() != Some(address) {
        warn!(%address, ack_path, "crashing a node that is not the known primary");
    }

    let mut handle = set
        .remove(address)
        .ok_or_else(|| Error::Fatal(format!("{} is not a member of the set behind {}", address, ack_path)))?;
    crash(&mut handle)?;

    let primary = resolve(coordination, ack_path, set.nodes(), policy).await?;
    let new_address = primary.address.to_string();
    set.set_primary(&new_address);

    info!(old = %address, new = %new_address, ack_path, "primary re-elected");
    Ok(new_address)
}
