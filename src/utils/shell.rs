use std::path::Path;
use std::process::ExitStatus;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::LaunchError;
use crate::Result;

/// Runs `command` through `sh -c`, optionally inside `dir`, and waits for it.
///
/// Failing to start the shell is an error; a nonzero status is not. Callers
/// decide what a nonzero status means for them.
pub async fn run_shell(
    command: &str,
    dir: Option<&Path>,
) -> Result<ExitStatus> {
    debug!("running cmd with return status: {} (in {:?})", command, dir);

    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .kill_on_drop(true);
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }

    let status = cmd.status().await.map_err(|source| LaunchError::CommandIo {
        command: command.to_string(),
        source,
    })?;
    debug!("`{}` exited with {}", command, status);
    Ok(status)
}
