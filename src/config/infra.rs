use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Dependent infrastructure (coordination service + broker) and the build
/// steps that produce the node binaries.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InfraConfig {
    /// Stops whatever a previous run left behind
    #[serde(default = "default_down_command")]
    pub down_command: String,

    #[serde(default = "default_up_command")]
    pub up_command: String,

    /// Fixed wait after `up_command` before relying on the services
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    #[serde(default = "default_build_steps")]
    pub build_steps: Vec<BuildStep>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BuildStep {
    pub dir: PathBuf,
    pub command: String,
}

impl Default for InfraConfig {
    fn default() -> Self {
        Self {
            down_command: default_down_command(),
            up_command: default_up_command(),
            settle_delay_ms: default_settle_delay_ms(),
            build_steps: default_build_steps(),
        }
    }
}

impl InfraConfig {
    pub fn validate(&self) -> Result<()> {
        if self.up_command.trim().is_empty() {
            return Err(Error::InvalidConfig("infra up_command cannot be empty".into()));
        }
        for step in &self.build_steps {
            if step.command.trim().is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "build step in {} has an empty command",
                    step.dir.display()
                )));
            }
        }
        Ok(())
    }
}

/// Local scratch area the nodes persist into. Wiped before every environment.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ScratchConfig {
    /// Directory whose `*.<db_extension>` files are removed
    #[serde(default = "default_scratch_root")]
    pub root: PathBuf,

    #[serde(default = "default_db_extension")]
    pub db_extension: String,

    /// Directory whose entire content is removed; the directory itself stays
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl ScratchConfig {
    /// Keeps the wipe inside the harness's own scratch area: `data_dir` must
    /// not be a filesystem root, nor equal or contain the scratch root, the
    /// working directory or `log_dir`.
    pub fn validate(
        &self,
        log_dir: &Path,
    ) -> Result<()> {
        let ext = self.db_extension.trim();
        if ext.is_empty() || ext.contains('/') || ext.contains('.') {
            return Err(Error::InvalidConfig(format!(
                "scratch db_extension {:?} must be a bare extension",
                self.db_extension
            )));
        }
        if self.root.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("scratch root cannot be empty".into()));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("scratch data_dir cannot be empty".into()));
        }

        let cwd = std::env::current_dir()?;
        let root = normalize(&cwd, &self.root);
        let data_dir = normalize(&cwd, &self.data_dir);
        let log_dir = normalize(&cwd, log_dir);

        if root.parent().is_none() {
            return Err(Error::InvalidConfig(format!(
                "scratch root {} is a filesystem root",
                self.root.display()
            )));
        }
        if data_dir.parent().is_none() {
            return Err(Error::InvalidConfig(format!(
                "scratch data_dir {} is a filesystem root",
                self.data_dir.display()
            )));
        }
        for (what, path) in [
            ("scratch root", &root),
            ("working directory", &cwd),
            ("log_dir", &log_dir),
        ] {
            if path.starts_with(&data_dir) {
                return Err(Error::InvalidConfig(format!(
                    "scratch data_dir {} would wipe the {} {}",
                    data_dir.display(),
                    what,
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// Absolute form of `path` against `base`, with `.` and `..` resolved
/// lexically. Scratch paths may not exist yet, so nothing is canonicalized.
fn normalize(
    base: &Path,
    path: &Path,
) -> PathBuf {
    let mut out = PathBuf::new();
    for component in base.join(path).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            root: default_scratch_root(),
            db_extension: default_db_extension(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_down_command() -> String {
    "docker-compose down".to_string()
}
fn default_up_command() -> String {
    "docker-compose up -d".to_string()
}
fn default_settle_delay_ms() -> u64 {
    5000
}
fn default_build_steps() -> Vec<BuildStep> {
    vec![
        BuildStep {
            dir: PathBuf::from("../../master"),
            command: "go build".to_string(),
        },
        BuildStep {
            dir: PathBuf::from("../../datanode"),
            command: "go build".to_string(),
        },
    ]
}
fn default_scratch_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_db_extension() -> String {
    "db".to_string()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("../data")
}
