use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitStatus;

use tokio::process::Child;
use tracing::debug;

use super::DataNodeConfig;
use super::MasterConfig;
use super::NodeConfig;

pub type MasterHandle = NodeHandle<MasterConfig>;
pub type DataNodeHandle = NodeHandle<DataNodeConfig>;

/// Owns exactly one live node process together with the config it was
/// launched from.
///
/// Dropping a handle kills its process, so a handle removed from its registry
/// can never leave an untracked process behind.
#[derive(Debug)]
pub struct NodeHandle<C: NodeConfig> {
    process: Child,
    config: C,
    output_path: PathBuf,
}

impl<C: NodeConfig> NodeHandle<C> {
    pub fn new(
        process: Child,
        config: C,
        output_path: PathBuf,
    ) -> Self {
        Self {
            process,
            config,
            output_path,
        }
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    pub fn client_address(&self) -> &str {
        self.config.client_address()
    }

    pub fn node_id(&self) -> &str {
        self.config.node_id()
    }

    /// OS pid, `None` once the process has been reaped.
    pub fn pid(&self) -> Option<u32> {
        self.process.id()
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Sends SIGKILL and returns without waiting for the exit.
    ///
    /// Killing a process that already exited is not an error.
    pub fn kill(&mut self) -> io::Result<()> {
        match self.process.start_kill() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => {
                debug!(node_id = %self.node_id(), "process already exited");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Non-blocking exit check.
    pub fn try_exit_status(&mut self) -> io::Result<Option<ExitStatus>> {
        self.process.try_wait()
    }

    /// Waits until the process has exited.
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.process.wait().await
    }

    /// Everything the process wrote to stdout/stderr so far.
    pub fn captured_output(&self) -> io::Result<String> {
        let bytes = std::fs::read(&self.output_path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
