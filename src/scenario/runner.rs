use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::Instant;
use tracing::debug;
use tracing::error;
use tracing::info;

use super::Expect;
use super::InteractiveSession;
use super::ScenarioConfig;
use super::ScenarioFailure;
use super::ScenarioMode;
use super::ScenarioOutcome;
use super::ScenarioReport;
use crate::config::ScenarioSettings;
use crate::fault::FaultTarget;
use crate::ScenarioError;

const EXIT: &str = "exit";

/// Runs scenarios one at a time and turns every way a run can go wrong into a
/// [`ScenarioOutcome`]. Nothing a test process does can make `run` fail.
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    workdir: PathBuf,
    program: String,
    timeout: Duration,
    injection_delay: Duration,
    pass_sentinel: String,
}

impl ScenarioRunner {
    pub fn from_config(settings: &ScenarioSettings) -> Self {
        Self {
            workdir: settings.workdir.clone(),
            program: settings.program.clone(),
            timeout: Duration::from_millis(settings.timeout_ms),
            injection_delay: Duration::from_millis(settings.injection_delay_ms),
            pass_sentinel: settings.pass_sentinel.clone(),
        }
    }

    pub async fn run(
        &self,
        scenario: &ScenarioConfig,
        target: &mut dyn FaultTarget,
    ) -> ScenarioReport {
        info!(name = %scenario.name, mode = ?scenario.mode, "running scenario");
        let started = Instant::now();

        let outcome = match scenario.mode {
            ScenarioMode::Direct => self.run_direct(scenario).await,
            ScenarioMode::Interactive => self.run_interactive(scenario, target).await,
        };

        match &outcome {
            ScenarioOutcome::Passed => info!("test {} passed.", scenario.name),
            ScenarioOutcome::Failed(failure) => error!("test {} failed: {}", scenario.name, failure),
        }

        ScenarioReport {
            name: scenario.name.clone(),
            outcome,
            elapsed: started.elapsed(),
            exited_nodes: Vec::new(),
        }
    }

    async fn run_direct(
        &self,
        scenario: &ScenarioConfig,
    ) -> ScenarioOutcome {
        let args = scenario.command_args();
        debug!("running test process: {} {:?}", self.program, args);

        let output = Command::new(&self.program)
            .args(&args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, output).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return ScenarioOutcome::Failed(
                    ScenarioError::Spawn {
                        command: format!("{} {}", self.program, args.join(" ")),
                        source,
                    }
                    .into(),
                );
            }
            Err(_) => {
                return ScenarioOutcome::Failed(ScenarioFailure::Timeout {
                    waiting_for: EXIT.to_string(),
                    after: self.timeout,
                });
            }
        };

        debug!("{} stdout:\n{}", scenario.name, String::from_utf8_lossy(&output.stdout));
        if !output.stderr.is_empty() {
            debug!("{} stderr:\n{}", scenario.name, String::from_utf8_lossy(&output.stderr));
        }

        if output.status.success() {
            ScenarioOutcome::Passed
        } else {
            ScenarioOutcome::Failed(ScenarioFailure::NonZeroExit {
                code: output.status.code(),
            })
        }
    }

    async fn run_interactive(
        &self,
        scenario: &ScenarioConfig,
        target: &mut dyn FaultTarget,
    ) -> ScenarioOutcome {
        let mut session = match InteractiveSession::spawn(&self.program, &scenario.command_args(), &self.workdir) {
            Ok(session) => session,
            Err(e) => return ScenarioOutcome::Failed(e.into()),
        };

        let outcome = match self.drive(&mut session, scenario, target).await {
            Ok(()) => ScenarioOutcome::Passed,
            Err(failure) => {
                session.terminate().await;
                ScenarioOutcome::Failed(failure)
            }
        };

        debug!("{} transcript:\n{}", scenario.name, session.transcript());
        outcome
    }

    async fn drive(
        &self,
        session: &mut InteractiveSession,
        scenario: &ScenarioConfig,
        target: &mut dyn FaultTarget,
    ) -> Result<(), ScenarioFailure> {
        for checkpoint in &scenario.checkpoints {
            self.wait_for(session, &checkpoint.prompt).await?;

            debug!("instruction {:?} received, injecting {:?}", checkpoint.prompt, checkpoint.faults);
            tokio::time::sleep(self.injection_delay).await;

            for fault in &checkpoint.faults {
                target
                    .inject(*fault)
                    .await
                    .map_err(|e| ScenarioFailure::InjectionFailed {
                        fault: *fault,
                        reason: e.to_string(),
                    })?;
            }
            debug!("injected {:?}, resuming test process", checkpoint.faults);

            session.resume().await?;
        }

        match self.wait_for(session, &self.pass_sentinel).await {
            Err(ScenarioFailure::UnexpectedEof { .. }) => {
                return Err(ScenarioFailure::SentinelMissing {
                    sentinel: self.pass_sentinel.clone(),
                });
            }
            other => other?,
        }

        match session.finish(self.timeout).await? {
            Some(status) if status.success() => Ok(()),
            Some(status) => Err(ScenarioFailure::NonZeroExit { code: status.code() }),
            None => Err(ScenarioFailure::Timeout {
                waiting_for: EXIT.to_string(),
                after: self.timeout,
            }),
        }
    }

    async fn wait_for(
        &self,
        session: &mut InteractiveSession,
        literal: &str,
    ) -> Result<(), ScenarioFailure> {
        match session.expect(literal, self.timeout).await? {
            Expect::Matched => Ok(()),
            Expect::TimedOut => Err(ScenarioFailure::Timeout {
                waiting_for: literal.to_string(),
                after: self.timeout,
            }),
        }
    }
}
