use std::io;
use std::path::Path;
use std::process::ExitStatus;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::process::Child;
use tokio::process::ChildStdin;
use tokio::process::ChildStdout;
use tokio::process::Command;
use tokio::time::Instant;
use tracing::debug;
use tracing::warn;

use crate::ScenarioError;

const READ_CHUNK: usize = 4096;

/// Result of waiting for a literal in the test process output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    Matched,
    TimedOut,
}

/// A test process driven over its stdin/stdout.
///
/// Output is matched as a byte stream, not line by line: a prompt printed
/// without a trailing newline still matches. Everything up to and including a
/// match is consumed, so each literal is matched at most once.
#[derive(Debug)]
pub struct InteractiveSession {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: ChildStdout,
    pending: Vec<u8>,
    transcript: Vec<u8>,
}

impl InteractiveSession {
    pub fn spawn(
        program: &str,
        args: &[String],
        workdir: &Path,
    ) -> Result<Self, ScenarioError> {
        debug!("spawning test process: {} {:?} in {:?}", program, args, workdir);

        let mut child = Command::new(program)
            .args(args)
            .current_dir(workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ScenarioError::Spawn {
                command: format!("{} {}", program, args.join(" ")),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(ScenarioError::PipeUnavailable("stdin"))?;
        let stdout = child.stdout.take().ok_or(ScenarioError::PipeUnavailable("stdout"))?;

        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout,
            pending: Vec::new(),
            transcript: Vec::new(),
        })
    }

    /// Reads output until `needle` appears or `timeout` elapses.
    ///
    /// End of output before a match is an error: the process can no longer
    /// print what we are waiting for.
    pub async fn expect(
        &mut self,
        needle: &str,
        timeout: Duration,
    ) -> Result<Expect, ScenarioError> {
        let deadline = Instant::now() + timeout;
        let needle = needle.as_bytes();
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            if let Some(pos) = find(&self.pending, needle) {
                self.pending.drain(..pos + needle.len());
                return Ok(Expect::Matched);
            }
            // Only a needle straddling the next read can still match here.
            let keep = needle.len() - 1;
            if self.pending.len() > keep {
                self.pending.drain(..self.pending.len() - keep);
            }

            let n = match tokio::time::timeout_at(deadline, self.stdout.read(&mut chunk)).await {
                Ok(read) => read?,
                Err(_) => return Ok(Expect::TimedOut),
            };
            if n == 0 {
                return Err(ScenarioError::UnexpectedEof {
                    waiting_for: String::from_utf8_lossy(needle).into_owned(),
                });
            }
            self.record(&chunk[..n]);
        }
    }

    /// Sends an empty line.
    pub async fn resume(&mut self) -> Result<(), ScenarioError> {
        let stdin = self.stdin.as_mut().ok_or_else(|| {
            ScenarioError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "stdin already closed"))
        })?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Closes stdin, drains remaining output and waits for the exit status.
    /// `None` if the process did not exit within `timeout`.
    pub async fn finish(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<ExitStatus>, ScenarioError> {
        drop(self.stdin.take());
        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            match tokio::time::timeout_at(deadline, self.stdout.read(&mut chunk)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => self.record(&chunk[..n]),
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => return Ok(None),
            }
        }

        match tokio::time::timeout_at(deadline, self.child.wait()).await {
            Ok(status) => Ok(Some(status?)),
            Err(_) => Ok(None),
        }
    }

    /// Force-kills the process and reaps it. Best effort.
    pub async fn terminate(&mut self) {
        if let Err(e) = self.child.start_kill() {
            if e.kind() != io::ErrorKind::InvalidInput {
                warn!("failed to kill test process: {}", e);
            }
            return;
        }
        if let Err(e) = self.child.wait().await {
            warn!("failed to reap test process: {}", e);
        }
    }

    /// Everything the process printed so far.
    pub fn transcript(&self) -> String {
        String::from_utf8_lossy(&self.transcript).into_owned()
    }

    fn record(
        &mut self,
        bytes: &[u8],
    ) {
        debug!("test process: {}", String::from_utf8_lossy(bytes).trim_end());
        self.pending.extend_from_slice(bytes);
        self.transcript.extend_from_slice(bytes);
    }
}

fn find(
    haystack: &[u8],
    needle: &[u8],
) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}
