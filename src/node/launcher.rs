use std::fs::File;
use std::path::Path;
use std::path::PathBuf;
use std::process::Stdio;

#[cfg(test)]
use mockall::automock;
use tokio::process::Command;
use tracing::debug;
use tracing::info;

use super::DataNodeConfig;
use super::DataNodeHandle;
use super::MasterConfig;
use super::MasterHandle;
use super::NodeConfig;
use super::NodeHandle;
use crate::config::ClusterConfig;
use crate::LaunchError;
use crate::Result;

/// Starts node processes. Launching is non-blocking: a node reports readiness
/// through the coordination service, never through the launcher.
#[cfg_attr(test, automock)]
pub trait NodeLauncher: Send + Sync {
    fn launch_master(
        &self,
        config: MasterConfig,
    ) -> Result<MasterHandle>;

    fn launch_datanode(
        &self,
        config: DataNodeConfig,
    ) -> Result<DataNodeHandle>;
}

/// Spawns real node binaries, capturing each node's stdout and stderr into
/// `<log_dir>/<node_id>.log`.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    master_binary: PathBuf,
    datanode_binary: PathBuf,
    log_dir: PathBuf,
}

impl ProcessLauncher {
    pub fn new(
        master_binary: impl Into<PathBuf>,
        datanode_binary: impl Into<PathBuf>,
        log_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            master_binary: master_binary.into(),
            datanode_binary: datanode_binary.into(),
            log_dir: log_dir.into(),
        }
    }

    pub fn from_config(cluster: &ClusterConfig) -> Self {
        Self::new(
            &cluster.master_binary,
            &cluster.datanode_binary,
            &cluster.log_dir,
        )
    }

    /// Spawns `binary` with every field of `config` encoded as a flag.
    pub fn launch<C: NodeConfig>(
        &self,
        binary: &Path,
        config: C,
    ) -> Result<NodeHandle<C>> {
        let output_path = self.log_dir.join(format!("{}.log", config.node_id()));
        let (stdout, stderr) = self.capture_files(&output_path)?;

        let args = config.to_args();
        debug!("booting {} using: {:?} {:?}", C::ROLE, binary, args);

        let child = Command::new(binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| LaunchError::SpawnFailed {
                role: C::ROLE,
                node_id: config.node_id().to_string(),
                binary: binary.to_path_buf(),
                source,
            })?;

        info!(
            role = %C::ROLE,
            node_id = %config.node_id(),
            addr = %config.client_address(),
            pid = ?child.id(),
            "node launched"
        );
        Ok(NodeHandle::new(child, config, output_path))
    }

    fn capture_files(
        &self,
        path: &Path,
    ) -> Result<(Stdio, Stdio)> {
        let to_launch_error = |source| LaunchError::OutputCapture {
            path: path.to_path_buf(),
            source,
        };
        std::fs::create_dir_all(&self.log_dir).map_err(to_launch_error)?;
        let file = File::create(path).map_err(to_launch_error)?;
        let err_file = file.try_clone().map_err(to_launch_error)?;
        Ok((Stdio::from(file), Stdio::from(err_file)))
    }
}

impl NodeLauncher for ProcessLauncher {
    fn launch_master(
        &self,
        config: MasterConfig,
    ) -> Result<MasterHandle> {
        self.launch(&self.master_binary, config)
    }

    fn launch_datanode(
        &self,
        config: DataNodeConfig,
    ) -> Result<DataNodeHandle> {
        self.launch(&self.datanode_binary, config)
    }
}
