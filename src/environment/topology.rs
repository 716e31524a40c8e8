//! Node configs derived from the harness config.
//!
//! Ports are assigned contiguously: master `i` listens on
//! `master_start_port + i`, datanode `j` of the `i`-th group on
//! `datanode_start_port + i * datanodes_per_group + j`.

use crate::config::HarnessConfig;
use crate::node::DataNodeConfig;
use crate::node::MasterConfig;
use crate::Error;
use crate::Result;

pub fn master_configs(config: &HarnessConfig) -> Result<Vec<MasterConfig>> {
    let cluster = &config.cluster;
    (0..cluster.master_count)
        .map(|i| {
            let port = port_at(cluster.master_start_port, i as u32)?;
            Ok(MasterConfig {
                addr_for_client: format!("{}:{}", cluster.host, port),
                port,
                node_id: format!("master{}", i),
                zookeeper_servers: config.coordination.servers.clone(),
                kafka_server: config.broker.server.clone(),
                kafka_topic: config.broker.master_topic.clone(),
                datanode_groups: cluster.datanode_groups.clone(),
                election_ack: config.coordination.master_election_ack.clone(),
                election_znode: config.coordination.master_election_znode.clone(),
            })
        })
        .collect()
}

/// Datanode configs, group by group in configured order.
pub fn datanode_configs(config: &HarnessConfig) -> Result<Vec<DataNodeConfig>> {
    let cluster = &config.cluster;
    let per_group = cluster.datanodes_per_group as u32;

    let mut configs = Vec::with_capacity(cluster.datanode_count());
    for (i, group) in cluster.datanode_groups.iter().enumerate() {
        for j in 0..per_group {
            let port = port_at(cluster.datanode_start_port, i as u32 * per_group + j)?;
            configs.push(DataNodeConfig {
                addr_for_client: format!("{}:{}", cluster.host, port),
                port,
                node_id: format!("datanode-{}-{}", group, j),
                group_name: group.clone(),
                zookeeper_servers: config.coordination.servers.clone(),
                kafka_server: config.broker.server.clone(),
            });
        }
    }
    Ok(configs)
}

fn port_at(
    start: u16,
    offset: u32,
) -> Result<u16> {
    u16::try_from(start as u32 + offset)
        .map_err(|_| Error::InvalidConfig(format!("port {} + {} out of range", start, offset)))
}
