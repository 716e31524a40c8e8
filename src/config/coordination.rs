use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Coordination service (ZooKeeper) endpoints and the election layout nodes
/// publish into.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CoordinationConfig {
    /// Comma separated `host:port` list, passed verbatim to every node
    #[serde(default = "default_servers")]
    pub servers: String,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Znode masters contend on
    #[serde(default = "default_master_election_znode")]
    pub master_election_znode: String,

    /// Holds the client address of the master primary
    #[serde(default = "default_master_election_ack")]
    pub master_election_ack: String,

    /// Group `g` publishes its primary under `<prefix><g>`
    #[serde(default = "default_datanode_ack_prefix")]
    pub datanode_ack_prefix: String,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            servers: default_servers(),
            connect_timeout_ms: default_connect_timeout_ms(),
            master_election_znode: default_master_election_znode(),
            master_election_ack: default_master_election_ack(),
            datanode_ack_prefix: default_datanode_ack_prefix(),
        }
    }
}

impl CoordinationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.servers.split(',').all(|s| s.trim().is_empty()) {
            return Err(Error::InvalidConfig(
                "coordination servers cannot be empty".into(),
            ));
        }

        if self.connect_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "connect_timeout_ms must be greater than 0".into(),
            ));
        }

        for (name, path) in [
            ("master_election_znode", &self.master_election_znode),
            ("master_election_ack", &self.master_election_ack),
            ("datanode_ack_prefix", &self.datanode_ack_prefix),
        ] {
            if !path.starts_with('/') {
                return Err(Error::InvalidConfig(format!(
                    "{} must be an absolute znode path, got {:?}",
                    name, path
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BrokerConfig {
    #[serde(default = "default_broker_server")]
    pub server: String,

    /// Topic masters journal metadata mutations to
    #[serde(default = "default_master_topic")]
    pub master_topic: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            server: default_broker_server(),
            master_topic: default_master_topic(),
        }
    }
}

impl BrokerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.server.is_empty() {
            return Err(Error::InvalidConfig("broker server cannot be empty".into()));
        }
        if self.master_topic.is_empty() {
            return Err(Error::InvalidConfig("master_topic cannot be empty".into()));
        }
        Ok(())
    }
}

fn default_servers() -> String {
    "127.0.0.1:2181,127.0.0.1:2182,127.0.0.1:2183".to_string()
}
fn default_connect_timeout_ms() -> u64 {
    10000
}
fn default_master_election_znode() -> String {
    "/master-election".to_string()
}
fn default_master_election_ack() -> String {
    "/master-election-ack".to_string()
}
fn default_datanode_ack_prefix() -> String {
    "/datanode_election_ack_".to_string()
}
fn default_broker_server() -> String {
    "127.0.0.1:9093".to_string()
}
fn default_master_topic() -> String {
    "master-journal".to_string()
}
