use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::common::error::error;
use crate::model::Criterion;

fn deserialize_human_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let buf = String::deserialize(deserializer)?;
    humantime::parse_duration(&buf).map_err(serde::de::Error::custom)
}

fn default_working_dir() -> PathBuf {
    PathBuf::from("/tmp/genie/jobs")
}

fn default_archive_root() -> String {
    "file:///tmp/genie/archives".to_string()
}

fn default_hostname() -> String {
    gethostname::gethostname().to_string_lossy().into_owned()
}

fn default_kill_grace_period() -> Duration {
    Duration::from_secs(10)
}

fn default_script_shell() -> PathBuf {
    PathBuf::from("/bin/bash")
}

/// Node-level configuration of the coordination service.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenieConfig {
    /// Directory where a subdirectory is created for each job
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    /// Base URI under which job archives are stored
    #[serde(default = "default_archive_root")]
    pub archive_root: String,

    /// Name of this node, recorded into job executions
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// How long a killed job may run before its process group is killed forcefully
    #[serde(
        default = "default_kill_grace_period",
        deserialize_with = "deserialize_human_duration"
    )]
    pub kill_grace_period: Duration,

    /// Maximum number of jobs running at once on this node
    #[serde(default)]
    pub max_running_jobs: Option<usize>,

    /// Used when a job request does not carry any cluster criteria
    #[serde(default)]
    pub default_cluster_criteria: Vec<Criterion>,

    /// Used when a job request does not carry any command criteria
    #[serde(default)]
    pub default_command_criteria: Vec<Criterion>,

    /// Interpreter of the generated launch script
    #[serde(default = "default_script_shell")]
    pub script_shell: PathBuf,
}

impl Default for GenieConfig {
    fn default() -> Self {
        Self {
            working_dir: default_working_dir(),
            archive_root: default_archive_root(),
            hostname: default_hostname(),
            kill_grace_period: default_kill_grace_period(),
            max_running_jobs: None,
            default_cluster_criteria: Vec::new(),
            default_command_criteria: Vec::new(),
            script_shell: default_script_shell(),
        }
    }
}

impl GenieConfig {
    pub fn parse(str: &str) -> crate::Result<GenieConfig> {
        let config: GenieConfig = toml::from_str(str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> crate::Result<GenieConfig> {
        log::debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    fn validate(&self) -> crate::Result<()> {
        if self.archive_root.trim().is_empty() {
            return error("`archive_root` cannot be empty".to_string());
        }
        if self.hostname.trim().is_empty() {
            return error("`hostname` cannot be empty".to_string());
        }
        if self.max_running_jobs == Some(0) {
            return error("`max_running_jobs` has to be at least 1".to_string());
        }
        Ok(())
    }
}
