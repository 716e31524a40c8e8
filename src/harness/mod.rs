//! Suite driver: every scenario gets a freshly provisioned environment which
//! is torn down before the next one starts.


use std::future::Future;
use std::time::Duration;

use tracing::error;
use tracing::info;
use tracing::warn;

use crate::config::HarnessConfig;
use crate::environment::Environment;
use crate::scenario::ScenarioFailure;
use crate::scenario::ScenarioOutcome;
use crate::scenario::ScenarioReport;
use crate::scenario::ScenarioRunner;
use crate::DiscoveryError;
use crate::Error;
use crate::Result;

#[derive(Debug, Default, Clone)]
pub struct SuiteReport {
    pub reports: Vec<ScenarioReport>,
}

impl SuiteReport {
    pub fn all_passed(&self) -> bool {
        self.reports.iter().all(|r| r.passed())
    }

    pub fn passed(&self) -> impl Iterator<Item = &ScenarioReport> {
        self.reports.iter().filter(|r| r.passed())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ScenarioReport> {
        self.reports.iter().filter(|r| !r.passed())
    }

    pub fn log_summary(&self) {
        for report in &self.reports {
            match report.failure() {
                None => info!("{:<32} PASS ({:?})", report.name, report.elapsed),
                Some(failure) if report.exited_nodes.is_empty() => {
                    error!("{:<32} FAIL ({:?}): {}", report.name, report.elapsed, failure)
                }
                Some(failure) => error!(
                    "{:<32} FAIL ({:?}): {}; dead nodes: {}",
                    report.name,
                    report.elapsed,
                    failure,
                    report.exited_nodes.join(", ")
                ),
            }
        }
        info!(
            "{} passed, {} failed",
            self.passed().count(),
            self.failed().count()
        );
    }
}

/// Runs the configured catalogue against real environments.
pub async fn run_suite(config: &HarnessConfig) -> Result<SuiteReport> {
    run_suite_with(config, Environment::setup).await
}

/// Runs the configured catalogue, obtaining each scenario's environment from
/// `provision`.
///
/// A primary that never gets elected only fails the scenario at hand. Any
/// other provisioning error (missing binary, broken infrastructure, bad
/// config, unreachable coordination service) aborts the suite.
pub async fn run_suite_with<F, Fut>(
    config: &HarnessConfig,
    mut provision: F,
) -> Result<SuiteReport>
where
    F: FnMut(HarnessConfig) -> Fut,
    Fut: Future<Output = Result<Environment>>,
{
    let runner = ScenarioRunner::from_config(&config.scenario);
    let mut suite = SuiteReport::default();

    for scenario in &config.scenario.scenarios {
        info!("provisioning fresh environment for {}", scenario.name);

        let mut env = match provision(config.clone()).await {
            Ok(env) => env,
            Err(e @ Error::Discovery(DiscoveryError::PrimaryNotFound { .. })) => {
                error!("environment for {} never became ready: {}", scenario.name, e);
                suite.reports.push(ScenarioReport {
                    name: scenario.name.clone(),
                    outcome: ScenarioOutcome::Failed(ScenarioFailure::EnvironmentUnavailable(e.to_string())),
                    elapsed: Duration::ZERO,
                    exited_nodes: Vec::new(),
                });
                continue;
            }
            Err(e) => return Err(e),
        };

        let report = env.run_scenario(&runner, scenario).await;
        let teardown = env.shutdown();
        if !teardown.session_closed {
            warn!("no coordination session to close after {}", scenario.name);
        }
        suite.reports.push(report?);
    }

    Ok(suite)
}
