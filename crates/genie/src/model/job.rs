use std::fmt::{Display, Formatter};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::error::GenieError;
use crate::model::Criterion;
use crate::{ClusterId, CommandId, JobId, Set};

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Init,
    Running,
    Succeeded,
    Failed,
    Killed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Killed
        )
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Transitions allowed by the job state machine.
    /// Terminal states are absorbing, so nothing leaves them.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Init, JobStatus::Running)
            | (JobStatus::Init, JobStatus::Failed)
            | (JobStatus::Init, JobStatus::Killed) => true,
            (JobStatus::Running, next) => next.is_terminal(),
            _ => false,
        }
    }

    /// Final status of a process that exited with `exit_code`.
    /// An external kill takes precedence over the exit code.
    pub fn from_exit_code(exit_code: i32, killed: bool) -> JobStatus {
        if killed {
            JobStatus::Killed
        } else if exit_code == 0 {
            JobStatus::Succeeded
        } else {
            JobStatus::Failed
        }
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobStatus::Init => "INIT",
            JobStatus::Running => "RUNNING",
            JobStatus::Succeeded => "SUCCEEDED",
            JobStatus::Failed => "FAILED",
            JobStatus::Killed => "KILLED",
        };
        f.write_str(name)
    }
}

/// File that should be placed into the job directory before the job starts.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Attachment {
    pub name: String,
    pub uri: String,
}

/// Submission of a job, immutable once created.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct JobRequest {
    #[serde(default = "JobId::generate")]
    pub id: JobId,
    pub name: String,
    pub user: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Tried in order, the first criterion with a match wins
    #[serde(default)]
    pub cluster_criteria: Vec<Criterion>,
    #[serde(default)]
    pub command_criteria: Vec<Criterion>,
    /// Appended to the executable of the chosen command
    #[serde(default)]
    pub command_args: Vec<String>,
    #[serde(default)]
    pub cpu: Option<u32>,
    /// Memory in MB
    #[serde(default)]
    pub memory: Option<u32>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub setup_file: Option<String>,
    #[serde(default)]
    pub tags: Set<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub disable_log_archival: bool,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
}

impl JobRequest {
    pub fn new<N: Into<String>, U: Into<String>, V: Into<String>>(
        id: JobId,
        name: N,
        user: U,
        version: V,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            user: user.into(),
            version: version.into(),
            description: None,
            cluster_criteria: Vec::new(),
            command_criteria: Vec::new(),
            command_args: Vec::new(),
            cpu: None,
            memory: None,
            email: None,
            group: None,
            setup_file: None,
            tags: Set::new(),
            attachments: Vec::new(),
            disable_log_archival: false,
            created: Utc::now(),
        }
    }

    pub fn parse(str: &str) -> crate::Result<JobRequest> {
        let request: JobRequest = toml::from_str(str)?;
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> crate::Result<()> {
        for (field, value) in [
            ("name", &self.name),
            ("user", &self.user),
            ("version", &self.version),
        ] {
            if value.trim().is_empty() {
                return Err(GenieError::InvalidRequest(format!(
                    "`{field}` of job request {} cannot be empty",
                    self.id
                )));
            }
        }
        let id = self.id.as_str();
        if id.is_empty() {
            return Err(GenieError::InvalidRequest(
                "job request id cannot be empty".to_string(),
            ));
        }
        // The id names the job directory inside the working directory
        if id == "." || id == ".." || id.contains('/') || id.contains('\\') {
            return Err(GenieError::InvalidRequest(format!(
                "Invalid job request id `{id}`"
            )));
        }
        Ok(())
    }
}

/// Audit record of the criteria that chose the cluster and the command.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChosenCriteria {
    pub cluster_criterion_index: usize,
    pub cluster_criterion: Criterion,
    pub command_criterion_index: usize,
    pub command_criterion: Criterion,
}

/// Lifecycle record of a job.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub user: String,
    pub version: String,
    pub description: Option<String>,
    pub tags: Set<String>,
    pub status: JobStatus,
    pub status_msg: Option<String>,
    /// Where the job directory is archived after completion, `None` when archival is disabled
    pub archive_location: Option<String>,
    pub created: DateTime<Utc>,
    pub started: Option<DateTime<Utc>>,
    pub finished: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    pub cluster_id: ClusterId,
    pub command_id: CommandId,
    pub chosen_criteria: ChosenCriteria,
}

impl Job {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Placement of a launched job process.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct JobExecution {
    pub job_id: JobId,
    pub host_name: String,
    pub process_id: u32,
    pub started: DateTime<Utc>,
    /// Set when the job was killed from the outside
    pub killed: Option<DateTime<Utc>>,
}

impl JobExecution {
    pub fn new(job_id: JobId, host_name: String, process_id: u32) -> Self {
        Self {
            job_id,
            host_name,
            process_id,
            started: Utc::now(),
            killed: None,
        }
    }

    pub fn was_killed(&self) -> bool {
        self.killed.is_some()
    }
}

/// Contents of `genie/genie.done`, written by the launch script when the job process exits.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub struct JobDoneFile {
    #[serde(rename = "exitCode")]
    pub exit_code: i32,
}

impl JobDoneFile {
    pub fn read(path: &Path) -> crate::Result<JobDoneFile> {
        let content = std::fs::read(path)?;
        Ok(serde_json::from_slice(&content)?)
    }
}
