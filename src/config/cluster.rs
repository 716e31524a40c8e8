use std::collections::HashSet;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClusterConfig {
    /// Interface every node binds its client port on
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_master_count")]
    pub master_count: u16,

    /// Master `i` listens on `master_start_port + i`
    #[serde(default = "default_master_start_port")]
    pub master_start_port: u16,

    /// Static list of datanode groups; never changes at runtime
    #[serde(default = "default_datanode_groups")]
    pub datanode_groups: Vec<String>,

    #[serde(default = "default_datanodes_per_group")]
    pub datanodes_per_group: u16,

    /// Datanode `j` of group `i` listens on
    /// `datanode_start_port + i * datanodes_per_group + j`
    #[serde(default = "default_datanode_start_port")]
    pub datanode_start_port: u16,

    #[serde(default = "default_master_binary")]
    pub master_binary: PathBuf,

    #[serde(default = "default_datanode_binary")]
    pub datanode_binary: PathBuf,

    /// Captured stdout/stderr of every node, one file per node id
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            master_count: default_master_count(),
            master_start_port: default_master_start_port(),
            datanode_groups: default_datanode_groups(),
            datanodes_per_group: default_datanodes_per_group(),
            datanode_start_port: default_datanode_start_port(),
            master_binary: default_master_binary(),
            datanode_binary: default_datanode_binary(),
            log_dir: default_log_dir(),
        }
    }
}

impl ClusterConfig {
    /// Validates topology consistency
    /// # Errors
    /// Returns `Error::InvalidConfig` if any configuration rules are violated
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(Error::InvalidConfig("host cannot be empty".into()));
        }

        if self.master_count == 0 {
            return Err(Error::InvalidConfig("master_count must be at least 1".into()));
        }

        if self.datanodes_per_group == 0 {
            return Err(Error::InvalidConfig(
                "datanodes_per_group must be at least 1".into(),
            ));
        }

        if self.datanode_groups.is_empty() {
            return Err(Error::InvalidConfig(
                "datanode_groups must contain at least one group".into(),
            ));
        }

        let mut names = HashSet::new();
        for group in &self.datanode_groups {
            if group.is_empty() {
                return Err(Error::InvalidConfig("datanode group name cannot be empty".into()));
            }
            if !names.insert(group) {
                return Err(Error::InvalidConfig(format!(
                    "Duplicate datanode group {}",
                    group
                )));
            }
        }

        self.validate_port_range(self.master_start_port, self.master_count as u32, "master")?;
        let datanode_count = self.datanode_groups.len() as u32 * self.datanodes_per_group as u32;
        self.validate_port_range(self.datanode_start_port, datanode_count, "datanode")?;

        let masters = self.master_start_port as u32..self.master_start_port as u32 + self.master_count as u32;
        let datanodes =
            self.datanode_start_port as u32..self.datanode_start_port as u32 + datanode_count;
        if masters.start < datanodes.end && datanodes.start < masters.end {
            return Err(Error::InvalidConfig(format!(
                "master ports {:?} overlap datanode ports {:?}",
                masters, datanodes
            )));
        }

        if self.master_binary.as_os_str().is_empty() || self.datanode_binary.as_os_str().is_empty()
        {
            return Err(Error::InvalidConfig("node binary paths cannot be empty".into()));
        }

        Ok(())
    }

    /// Total number of datanode processes across all groups
    pub fn datanode_count(&self) -> usize {
        self.datanode_groups.len() * self.datanodes_per_group as usize
    }

    fn validate_port_range(
        &self,
        start: u16,
        count: u32,
        name: &str,
    ) -> Result<()> {
        if start == 0 {
            return Err(Error::InvalidConfig(format!(
                "{} start port must be non-zero",
                name
            )));
        }
        if start as u32 + count - 1 > u16::MAX as u32 {
            return Err(Error::InvalidConfig(format!(
                "{} {} ports starting at {} overflow the port range",
                count, name, start
            )));
        }
        Ok(())
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_master_count() -> u16 {
    3
}
fn default_master_start_port() -> u16 {
    10000
}
fn default_datanode_groups() -> Vec<String> {
    vec!["group1".to_string(), "group2".to_string(), "group3".to_string()]
}
fn default_datanodes_per_group() -> u16 {
    3
}
fn default_datanode_start_port() -> u16 {
    15000
}
fn default_master_binary() -> PathBuf {
    PathBuf::from("../../master/master")
}
fn default_datanode_binary() -> PathBuf {
    PathBuf::from("../../datanode/datanode")
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("./harness-logs")
}
