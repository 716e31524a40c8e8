//! In-memory bookkeeping of launched nodes.
//!
//! Masters form one set; datanodes form one set per group, and the group list
//! is fixed when the registry is created. Every set remembers the address of
//! the primary most recently discovered for it.

use std::collections::BTreeMap;

use tracing::debug;
use tracing::warn;

use crate::node::DataNodeConfig;
use crate::node::DataNodeHandle;
use crate::node::MasterConfig;
use crate::node::MasterHandle;
use crate::node::NodeConfig;
use crate::node::NodeHandle;
use crate::DiscoveryError;
use crate::Error;
use crate::Result;

/// Client address -> handle. Every key equals its handle's client address.
pub type NodeSet<C> = BTreeMap<String, NodeHandle<C>>;

/// One role-group: its members and the primary last discovered among them.
#[derive(Debug)]
pub struct ElectedSet<C: NodeConfig> {
    nodes: NodeSet<C>,
    primary: Option<String>,
}

impl<C: NodeConfig> Default for ElectedSet<C> {
    fn default() -> Self {
        Self {
            nodes: BTreeMap::new(),
            primary: None,
        }
    }
}

impl<C: NodeConfig> ElectedSet<C> {
    pub fn insert(
        &mut self,
        handle: NodeHandle<C>,
    ) -> Result<()> {
        let address = handle.client_address().to_string();
        if self.nodes.contains_key(&address) {
            return Err(Error::InvalidConfig(format!(
                "Duplicate client address {} for {}",
                address,
                handle.node_id()
            )));
        }
        self.nodes.insert(address, handle);
        Ok(())
    }

    /// Removes a member. If it was the known primary, the primary reference
    /// is cleared: it is stale until rediscovered.
    pub fn remove(
        &mut self,
        address: &str,
    ) -> Option<NodeHandle<C>> {
        let removed = self.nodes.remove(address);
        if removed.is_some() && self.primary.as_deref() == Some(address) {
            debug!(%address, "primary removed; reference is stale until rediscovery");
            self.primary = None;
        }
        removed
    }

    pub fn get(
        &self,
        address: &str,
    ) -> Option<&NodeHandle<C>> {
        self.nodes.get(address)
    }

    pub fn nodes(&self) -> &NodeSet<C> {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn primary_address(&self) -> Option<&str> {
        self.primary.as_deref()
    }

    pub fn primary(&self) -> Option<&NodeHandle<C>> {
        self.primary.as_deref().and_then(|addr| self.get(addr))
    }

    /// Records a freshly discovered primary. Only members can be primary.
    pub fn set_primary(
        &mut self,
        address: &str,
    ) -> bool {
        if self.nodes.contains_key(address) {
            self.primary = Some(address.to_string());
            true
        } else {
            warn!(%address, "refusing to record a non-member as primary");
            false
        }
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut NodeHandle<C>> {
        self.nodes.values_mut()
    }

    /// Kills and forgets every member, returning the addresses it attempted.
    /// Kill failures are logged, never raised.
    pub fn kill_all(&mut self) -> Vec<String> {
        let nodes = std::mem::take(&mut self.nodes);
        self.primary = None;

        let mut attempted = Vec::with_capacity(nodes.len());
        for (address, mut handle) in nodes {
            if let Err(e) = handle.kill() {
                warn!("failed to kill {} ({}): {}", handle.node_id(), address, e);
            }
            attempted.push(address);
        }
        attempted
    }
}

/// Registry of the master set.
#[derive(Debug)]
pub struct MasterRegistry {
    ack_path: String,
    set: ElectedSet<MasterConfig>,
}

impl MasterRegistry {
    pub fn new(ack_path: impl Into<String>) -> Self {
        Self {
            ack_path: ack_path.into(),
            set: ElectedSet::default(),
        }
    }

    pub fn ack_path(&self) -> &str {
        &self.ack_path
    }

    pub fn insert(
        &mut self,
        handle: MasterHandle,
    ) -> Result<()> {
        self.set.insert(handle)
    }

    pub fn set(&self) -> &ElectedSet<MasterConfig> {
        &self.set
    }

    pub fn set_mut(&mut self) -> &mut ElectedSet<MasterConfig> {
        &mut self.set
    }

    pub fn primary(&self) -> Option<&MasterHandle> {
        self.set.primary()
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn kill_all(&mut self) -> Vec<String> {
        self.set.kill_all()
    }
}

/// Registry of datanodes, one [`ElectedSet`] per group.
#[derive(Debug)]
pub struct DatanodeGroupRegistry {
    ack_prefix: String,
    groups: BTreeMap<String, ElectedSet<DataNodeConfig>>,
}

impl DatanodeGroupRegistry {
    pub fn new(
        ack_prefix: impl Into<String>,
        group_names: &[String],
    ) -> Self {
        Self {
            ack_prefix: ack_prefix.into(),
            groups: group_names
                .iter()
                .map(|name| (name.clone(), ElectedSet::default()))
                .collect(),
        }
    }

    pub fn ack_path(
        &self,
        group: &str,
    ) -> String {
        format!("{}{}", self.ack_prefix, group)
    }

    pub fn group_names(&self) -> Vec<String> {
        self.groups.keys().cloned().collect()
    }

    pub fn insert(
        &mut self,
        handle: DataNodeHandle,
    ) -> Result<()> {
        let group = handle.config().group_name.clone();
        self.group_mut(&group)?.insert(handle)
    }

    pub fn group(
        &self,
        name: &str,
    ) -> std::result::Result<&ElectedSet<DataNodeConfig>, DiscoveryError> {
        self.groups
            .get(name)
            .ok_or_else(|| DiscoveryError::UnknownGroup(name.to_string()))
    }

    pub fn group_mut(
        &mut self,
        name: &str,
    ) -> std::result::Result<&mut ElectedSet<DataNodeConfig>, DiscoveryError> {
        self.groups
            .get_mut(name)
            .ok_or_else(|| DiscoveryError::UnknownGroup(name.to_string()))
    }

    pub fn groups(&self) -> impl Iterator<Item = (&String, &ElectedSet<DataNodeConfig>)> {
        self.groups.iter()
    }

    pub fn groups_mut(&mut self) -> impl Iterator<Item = (&String, &mut ElectedSet<DataNodeConfig>)> {
        self.groups.iter_mut()
    }

    pub fn primary(
        &self,
        group: &str,
    ) -> Option<&DataNodeHandle> {
        self.groups.get(group).and_then(|set| set.primary())
    }

    /// Total members across all groups
    pub fn len(&self) -> usize {
        self.groups.values().map(|set| set.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kill_all(&mut self) -> Vec<String> {
        self.groups
            .values_mut()
            .flat_map(|set| set.kill_all())
            .collect()
    }
}
