use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::JobId;
use crate::common::error::GenieError;
use crate::common::fsutils::{GENIE_DIR, LOGS_DIR};
use crate::coordinator::events::FinishedNotifier;
use crate::model::{JobExecution, JobStatus};
use crate::services::{
    JobPersistence, ProcessExecutor, ProcessExit, ProcessSignal, ProcessSpec, StatusUpdate,
    StdioDef,
};
use crate::workflow::{JobExecutionContext, WorkflowTask};

/// Starts the launch script, records the execution and moves the job to `RUNNING`.
///
/// Not retry-safe: every run starts a new process.
pub struct LaunchTask {
    hostname: String,
    shell: PathBuf,
    persistence: Arc<dyn JobPersistence>,
    executor: Arc<dyn ProcessExecutor>,
    notifier: FinishedNotifier,
}

impl LaunchTask {
    pub fn new(
        hostname: String,
        shell: PathBuf,
        persistence: Arc<dyn JobPersistence>,
        executor: Arc<dyn ProcessExecutor>,
        notifier: FinishedNotifier,
    ) -> Self {
        Self {
            hostname,
            shell,
            persistence,
            executor,
            notifier,
        }
    }

    fn process_spec(&self, ctx: &JobExecutionContext, script: &Path) -> ProcessSpec {
        let logs = PathBuf::from(GENIE_DIR).join(LOGS_DIR);
        ProcessSpec {
            args: vec![
                self.shell.display().to_string(),
                script.display().to_string(),
            ],
            env: ctx
                .env
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            cwd: ctx.job_dir.clone(),
            stdout: StdioDef::File(logs.join("run.out")),
            stderr: StdioDef::File(logs.join("run.err")),
        }
    }
}

impl WorkflowTask for LaunchTask {
    fn name(&self) -> &'static str {
        "launch"
    }

    fn execute(&self, ctx: &mut JobExecutionContext) -> crate::Result<()> {
        let job_id = ctx.job_id().clone();
        let script = ctx.script.clone().ok_or_else(|| {
            GenieError::GenericError(format!("Job {job_id} has no launch script"))
        })?;

        let status = self.persistence.get_job(&job_id)?.status;
        if status != JobStatus::Init {
            return Err(GenieError::JobNotRunning(job_id, status));
        }

        let process = self.executor.start(&self.process_spec(ctx, &script))?;
        let pid = process.pid;
        ctx.process_id = Some(pid);

        let execution = JobExecution::new(job_id.clone(), self.hostname.clone(), pid);
        match self.persistence.mark_job_running(execution) {
            Ok(StatusUpdate::Applied) => {
                log::info!("Job {job_id} is running as process {pid}");
            }
            Ok(StatusUpdate::Ignored(status)) => {
                log::info!(
                    "Job {job_id} became {status} during launch, terminating process {pid}"
                );
                self.persistence.mark_job_execution_killed(&job_id)?;
                if let Err(error) = self.executor.signal_group(pid, ProcessSignal::Terminate) {
                    log::debug!("Terminating process {pid} of job {job_id} failed: {error}");
                }
            }
            Err(error) => {
                if let Err(error) = self.executor.signal_group(pid, ProcessSignal::Kill) {
                    log::debug!("Killing process {pid} of job {job_id} failed: {error}");
                }
                return Err(error);
            }
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|error| GenieError::GenericError(format!("Cannot monitor job: {error}")))?;
        runtime.spawn(monitor_process(
            job_id,
            pid,
            process.exit,
            self.notifier.clone(),
        ));
        Ok(())
    }
}

/// Waits for the job process and publishes that the job has finished.
async fn monitor_process(
    job_id: JobId,
    pid: u32,
    exit: tokio::sync::oneshot::Receiver<ProcessExit>,
    notifier: FinishedNotifier,
) {
    let exit = exit.await.unwrap_or(ProcessExit::Unknown);
    log::debug!("Process {pid} of job {job_id} ended with {exit}");
    notifier.notify(job_id, Some(pid));
}
