use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::JobId;
use crate::common::fsutils::{GENIE_DIR, job_dir};
use crate::model::{Application, Cluster, Command, Job, JobRequest};

/// Environment exported by the launch script, kept sorted so the script is stable.
pub type EnvMap = BTreeMap<String, String>;

/// State shared by the workflow tasks of one job.
pub struct JobExecutionContext {
    pub request: JobRequest,
    pub job: Job,
    pub cluster: Cluster,
    pub command: Command,
    /// Applications of the command, in the order of the command definition
    pub applications: Vec<Application>,
    pub job_dir: PathBuf,
    pub env: EnvMap,
    /// Staged setup files, sourced by the launch script in this order
    pub setup_files: Vec<PathBuf>,
    pub script: Option<PathBuf>,
    pub process_id: Option<u32>,
}

impl JobExecutionContext {
    pub fn new(
        working_dir: &Path,
        request: JobRequest,
        job: Job,
        cluster: Cluster,
        command: Command,
        applications: Vec<Application>,
    ) -> Self {
        Self {
            job_dir: job_dir(working_dir, &job.id),
            request,
            job,
            cluster,
            command,
            applications,
            env: Default::default(),
            setup_files: Vec::new(),
            script: None,
            process_id: None,
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job.id
    }

    pub fn genie_dir(&self) -> PathBuf {
        self.job_dir.join(GENIE_DIR)
    }

    pub fn set_env<V: Into<String>>(&mut self, name: &str, value: V) {
        self.env.insert(name.to_string(), value.into());
    }
}
