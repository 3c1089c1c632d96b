use crate::model::{Application, Cluster, Command, Job, JobExecution, JobRequest, JobStatus};
use crate::{ApplicationId, ClusterId, CommandId, JobId, Set};

/// Result of an atomic status update.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Applied,
    /// Nothing was changed, carries the current status of the job
    Ignored(JobStatus),
}

impl StatusUpdate {
    pub fn is_applied(&self) -> bool {
        matches!(self, StatusUpdate::Applied)
    }
}

/// Durable storage of job requests, jobs and job executions.
///
/// Every method that changes the status of a job is atomic with respect to
/// other status changes of the same job.
pub trait JobPersistence: Send + Sync {
    fn create_job_request(&self, request: JobRequest) -> crate::Result<()>;

    fn get_job_request(&self, job_id: &JobId) -> crate::Result<JobRequest>;

    /// Records the host that submitted the request. Recording the same host twice is a no-op.
    fn add_client_host_to_job_request(&self, job_id: &JobId, host: &str) -> crate::Result<()>;

    fn get_client_hosts(&self, job_id: &JobId) -> crate::Result<Set<String>>;

    /// Fails with `JobAlreadyExists` if a job with the same id exists.
    fn create_job(&self, job: Job) -> crate::Result<()>;

    fn get_job(&self, job_id: &JobId) -> crate::Result<Job>;

    /// Moves the job to `status`.
    /// Updates of terminal jobs are ignored, other invalid transitions are errors.
    fn update_job_status(
        &self,
        job_id: &JobId,
        status: JobStatus,
        message: &str,
    ) -> crate::Result<StatusUpdate>;

    /// Moves the job from `INIT` to `KILLED` unless a process was already launched for it.
    /// Returns `Ignored` with the current status otherwise.
    fn kill_unlaunched_job(&self, job_id: &JobId, message: &str) -> crate::Result<StatusUpdate>;

    /// Stores the execution and moves the job from `INIT` to `RUNNING` in one step.
    /// The execution is stored even when the transition is ignored.
    fn mark_job_running(&self, execution: JobExecution) -> crate::Result<StatusUpdate>;

    /// Stores the exit code and moves the job into the matching terminal state.
    /// A kill note on the execution takes precedence over the exit code.
    fn set_exit_code(&self, job_id: &JobId, exit_code: i32) -> crate::Result<StatusUpdate>;

    fn get_job_execution(&self, job_id: &JobId) -> crate::Result<Option<JobExecution>>;

    /// Returns `false` when the job has no execution yet.
    fn mark_job_execution_killed(&self, job_id: &JobId) -> crate::Result<bool>;

    /// Withdraws a kill note whose signal never reached the job.
    fn clear_job_execution_killed(&self, job_id: &JobId) -> crate::Result<()>;

    fn get_running_job_executions_on_host(&self, host_name: &str) -> Vec<JobExecution>;

    fn get_running_job_count(&self, host_name: &str) -> usize {
        self.get_running_job_executions_on_host(host_name).len()
    }
}

/// Read access to clusters, commands and applications.
pub trait ResourceCatalog: Send + Sync {
    fn get_clusters(&self) -> Vec<Cluster>;

    fn get_cluster(&self, cluster_id: &ClusterId) -> crate::Result<Cluster>;

    fn get_command(&self, command_id: &CommandId) -> crate::Result<Command>;

    /// Commands linked to the cluster, in registration order.
    fn get_commands_for_cluster(&self, cluster_id: &ClusterId) -> Vec<Command>;

    fn get_application(&self, application_id: &ApplicationId) -> crate::Result<Application>;

    fn get_applications_for_command(
        &self,
        command_id: &CommandId,
    ) -> crate::Result<Vec<Application>> {
        let command = self.get_command(command_id)?;
        command
            .application_ids
            .iter()
            .map(|id| self.get_application(id))
            .collect()
    }
}
