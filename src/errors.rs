//! Harness Error Hierarchy
//!
//! Errors are grouped by the stage that raises them. Only launch, configuration
//! and provisioning-time failures abort a harness run; everything that happens
//! while a scenario executes is folded into that scenario's verdict instead.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use config::ConfigError;

use crate::node::NodeRole;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Building binaries, starting infrastructure or spawning node processes failed
    #[error(transparent)]
    Launch(#[from] LaunchError),

    /// Coordination service session failures
    #[error(transparent)]
    Coordination(#[from] CoordinationError),

    /// Primary resolution failures
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// Test process driving failures
    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    /// Configuration source or deserialization failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration loaded but semantically invalid
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Unrecoverable failures requiring the harness to stop
    #[error("Fatal error: {0}")]
    Fatal(String),
}

/// Build or launch failures. A missing artifact is never transient, so none of
/// these are retried.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("Build command `{command}` in {dir:?} exited with {status}")]
    BuildFailed {
        dir: PathBuf,
        command: String,
        status: ExitStatus,
    },

    #[error("Infrastructure command `{command}` exited with {status}")]
    InfrastructureFailed { command: String, status: ExitStatus },

    #[error("Failed to spawn {role} {node_id} from {binary:?}")]
    SpawnFailed {
        role: NodeRole,
        node_id: String,
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to run `{command}`")]
    CommandIo {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open output capture file {path:?}")]
    OutputCapture {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinationError {
    /// Node vanished between an existence check and a read
    #[error("Node {0} not found")]
    NotFound(String),

    #[error("Connecting to {servers} timed out after {timeout:?}")]
    ConnectTimeout { servers: String, timeout: Duration },

    #[error("Coordination session already closed")]
    SessionClosed,

    #[error(transparent)]
    Session(#[from] zookeeper_client::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("No primary found at {ack_path} after {attempts} attempts")]
    PrimaryNotFound { ack_path: String, attempts: usize },

    #[error("Unknown datanode group: {0}")]
    UnknownGroup(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("Failed to spawn test process `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Test process output ended while waiting for {waiting_for:?}")]
    UnexpectedEof { waiting_for: String },

    #[error("Test process pipe {0} was not captured")]
    PipeUnavailable(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
