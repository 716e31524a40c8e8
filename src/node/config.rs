use std::fmt;

/// Role a node plays in the cluster under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    Master,
    DataNode,
}

impl fmt::Display for NodeRole {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            NodeRole::Master => write!(f, "master"),
            NodeRole::DataNode => write!(f, "datanode"),
        }
    }
}

/// Launch parameters shared by every node role.
///
/// Implementors are plain values: once a handle is created from a config the
/// config is never mutated again.
pub trait NodeConfig: fmt::Debug + Send + Sync + 'static {
    const ROLE: NodeRole;

    /// Process identity passed to the node (`-i`).
    fn node_id(&self) -> &str;

    /// Address clients use to reach this node. Also the value a primary
    /// publishes under its election ack path.
    fn client_address(&self) -> &str;

    /// Command line flags, in the order the node binary documents them.
    fn to_args(&self) -> Vec<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterConfig {
    pub addr_for_client: String,
    pub port: u16,
    pub node_id: String,
    pub zookeeper_servers: String,
    pub kafka_server: String,
    pub kafka_topic: String,
    pub datanode_groups: Vec<String>,
    pub election_ack: String,
    pub election_znode: String,
}

impl NodeConfig for MasterConfig {
    const ROLE: NodeRole = NodeRole::Master;

    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn client_address(&self) -> &str {
        &self.addr_for_client
    }

    fn to_args(&self) -> Vec<String> {
        vec![
            "-a".to_string(),
            self.addr_for_client.clone(),
            "-dngroups".to_string(),
            self.datanode_groups.join(","),
            "-elack".to_string(),
            self.election_ack.clone(),
            "-elznode".to_string(),
            self.election_znode.clone(),
            "-i".to_string(),
            self.node_id.clone(),
            "-kfserver".to_string(),
            self.kafka_server.clone(),
            "-kftopic".to_string(),
            self.kafka_topic.clone(),
            "-p".to_string(),
            self.port.to_string(),
            "-zkservers".to_string(),
            self.zookeeper_servers.clone(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataNodeConfig {
    pub addr_for_client: String,
    pub port: u16,
    pub node_id: String,
    pub group_name: String,
    pub zookeeper_servers: String,
    pub kafka_server: String,
}

impl NodeConfig for DataNodeConfig {
    const ROLE: NodeRole = NodeRole::DataNode;

    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn client_address(&self) -> &str {
        &self.addr_for_client
    }

    fn to_args(&self) -> Vec<String> {
        vec![
            "-a".to_string(),
            self.addr_for_client.clone(),
            "-p".to_string(),
            self.port.to_string(),
            "-i".to_string(),
            self.node_id.clone(),
            "-gn".to_string(),
            self.group_name.clone(),
            "-sl".to_string(),
            self.zookeeper_servers.clone(),
            "-ks".to_string(),
            self.kafka_server.clone(),
        ]
    }
}
