use std::sync::Arc;
use std::time::Duration;

use crate::JobId;
use crate::common::config::GenieConfig;
use crate::common::error::GenieError;
use crate::coordinator::events::FinishedNotifier;
use crate::model::{JobExecution, JobStatus};
use crate::services::{JobPersistence, KillForwarder, ProcessExecutor, ProcessSignal, StatusUpdate};

/// What a kill request did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KillOutcome {
    /// The process group of the job was asked to terminate
    Signaled,
    /// The job was stopped before any process was launched for it
    KilledBeforeLaunch,
    /// The kill was handed over to the node that runs the job
    Forwarded { host_name: String },
    /// The job had already finished, nothing was done
    AlreadyFinished(JobStatus),
}

/// Kills jobs that run on this node and forwards kills of jobs running elsewhere.
pub struct JobKillService {
    hostname: String,
    grace_period: Duration,
    persistence: Arc<dyn JobPersistence>,
    executor: Arc<dyn ProcessExecutor>,
    forwarder: Box<dyn KillForwarder>,
    notifier: FinishedNotifier,
}

impl JobKillService {
    pub fn new(
        config: &GenieConfig,
        persistence: Arc<dyn JobPersistence>,
        executor: Arc<dyn ProcessExecutor>,
        forwarder: Box<dyn KillForwarder>,
        notifier: FinishedNotifier,
    ) -> Self {
        Self {
            hostname: config.hostname.clone(),
            grace_period: config.kill_grace_period,
            persistence,
            executor,
            forwarder,
            notifier,
        }
    }

    /// Kills the job. Killing a job that has already finished is not an error.
    pub fn kill_job(&self, job_id: &JobId) -> crate::Result<KillOutcome> {
        match self.try_kill_job(job_id) {
            Err(GenieError::JobNotRunning(_, status)) => {
                log::info!("Job {job_id} is already {status}, nothing to kill");
                Ok(KillOutcome::AlreadyFinished(status))
            }
            result => result,
        }
    }

    fn try_kill_job(&self, job_id: &JobId) -> crate::Result<KillOutcome> {
        // The second round only happens when the job got launched in the meantime
        for _ in 0..2 {
            let job = self.persistence.get_job(job_id)?;
            if job.is_terminal() {
                return Err(GenieError::JobNotRunning(job_id.clone(), job.status));
            }
            if let Some(execution) = self.persistence.get_job_execution(job_id)? {
                return self.kill_execution(&execution);
            }
            match self
                .persistence
                .kill_unlaunched_job(job_id, "Job was killed before it was launched")?
            {
                StatusUpdate::Applied => {
                    log::info!("Job {job_id} was killed before it was launched");
                    self.notifier.notify(job_id.clone(), None);
                    return Ok(KillOutcome::KilledBeforeLaunch);
                }
                StatusUpdate::Ignored(status) if status.is_terminal() => {
                    return Err(GenieError::JobNotRunning(job_id.clone(), status));
                }
                StatusUpdate::Ignored(_) => {}
            }
        }
        Err(GenieError::GenericError(format!(
            "Job {job_id} is launching but its execution was not found"
        )))
    }

    fn kill_execution(&self, execution: &JobExecution) -> crate::Result<KillOutcome> {
        let job_id = &execution.job_id;
        if execution.host_name != self.hostname {
            log::info!(
                "Job {job_id} runs on host {}, forwarding the kill",
                execution.host_name
            );
            self.forwarder
                .forward_kill(&execution.host_name, job_id)?;
            return Ok(KillOutcome::Forwarded {
                host_name: execution.host_name.clone(),
            });
        }

        self.persistence.mark_job_execution_killed(job_id)?;
        let pid = execution.process_id;
        if let Err(error) = self.executor.signal_group(pid, ProcessSignal::Terminate) {
            if !execution.was_killed() {
                self.persistence.clear_job_execution_killed(job_id)?;
            }
            let job = self.persistence.get_job(job_id)?;
            if job.is_terminal() {
                return Err(GenieError::JobNotRunning(job_id.clone(), job.status));
            }
            return Err(error);
        }
        log::info!("Sent SIGTERM to process group of job {job_id} (pid {pid})");
        self.schedule_forced_kill(job_id.clone(), pid);
        Ok(KillOutcome::Signaled)
    }

    fn schedule_forced_kill(&self, job_id: JobId, pid: u32) {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                log::warn!("No runtime available, job {job_id} will not be killed forcefully");
                return;
            }
        };
        let grace_period = self.grace_period;
        let persistence = self.persistence.clone();
        let executor = self.executor.clone();
        runtime.spawn(async move {
            tokio::time::sleep(grace_period).await;
            match persistence.get_job(&job_id) {
                Ok(job) if job.status.is_active() => {
                    log::info!(
                        "Job {job_id} did not stop within {}, sending SIGKILL",
                        humantime::format_duration(grace_period)
                    );
                    if let Err(error) = executor.signal_group(pid, ProcessSignal::Kill) {
                        log::debug!("Forced kill of job {job_id} failed: {error}");
                    }
                }
                Ok(_) => {}
                Err(error) => log::warn!("Cannot check status of killed job {job_id}: {error}"),
            }
        });
    }
}
