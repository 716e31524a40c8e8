//! Harness configuration.
//!
//! Loaded with priority (later sources override earlier):
//! 1. Default values (hardcoded, mirroring the reference deployment)
//! 2. File named by `CONFIG_PATH`
//! 3. Environment variables, `HARNESS__<SECTION>__<KEY>`
//!
//! Loading never validates; call [`HarnessConfig::validate`] once all
//! overrides are applied.

mod cluster;
mod coordination;
mod discovery;
mod infra;
mod scenario;
pub use cluster::*;
pub use coordination::*;
pub use discovery::*;
pub use infra::*;
pub use scenario::*;


//---
use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::CONFIG_PATH_ENV;
use crate::constants::ENV_PREFIX;
use crate::constants::ENV_SEPARATOR;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct HarnessConfig {
    /// Node topology and binaries
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// Coordination service endpoints and election paths
    #[serde(default)]
    pub coordination: CoordinationConfig,
    /// Message broker the masters journal to
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Primary resolution retry budget
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    /// Dependent infrastructure and build steps
    #[serde(default)]
    pub infra: InfraConfig,
    /// Scratch area wiped before every environment
    #[serde(default)]
    pub scratch: ScratchConfig,
    /// Test program and scenario catalogue
    #[serde(default)]
    pub scenario: ScenarioSettings,
}

impl HarnessConfig {
    /// Defaults, then `CONFIG_PATH`, then `HARNESS__*` environment variables.
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Merges `path` over the current values; environment variables still win.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every section and returns the validated instance.
    pub fn validate(self) -> Result<Self> {
        self.cluster.validate()?;
        self.coordination.validate()?;
        self.broker.validate()?;
        self.discovery.validate()?;
        self.infra.validate()?;
        self.scratch.validate(&self.cluster.log_dir)?;
        self.scenario.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator(ENV_SEPARATOR)
        .ignore_empty(true)
        .try_parsing(true)
}
