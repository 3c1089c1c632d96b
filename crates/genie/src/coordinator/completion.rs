use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::common::error::GenieError;
use crate::common::fsutils::{GENIE_DIR, RUN_SCRIPT, done_file_path, job_dir, local_archive_path};
use crate::coordinator::events::{FinishedReceiver, JobFinished};
use crate::model::{JobDoneFile, JobStatus};
use crate::services::{FileTransfer, JobPersistence, MailService, ProcessExecutor, ProcessSignal};
use crate::{JobId, Map};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CompletionStep {
    ExitCode,
    ProcessCleanup,
    Archival,
    Notification,
}

impl CompletionStep {
    pub fn name(&self) -> &'static str {
        match self {
            CompletionStep::ExitCode => "exit code",
            CompletionStep::ProcessCleanup => "process cleanup",
            CompletionStep::Archival => "archival",
            CompletionStep::Notification => "notification",
        }
    }
}

impl Display for CompletionStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    Skipped(String),
    Failed(String),
}

/// Outcome of every finalization step of one job.
#[derive(Debug, Clone)]
pub struct CompletionReport {
    pub job_id: JobId,
    /// Status of the job after finalization, `None` if it could not be read
    pub status: Option<JobStatus>,
    pub steps: Vec<(CompletionStep, StepOutcome)>,
}

impl CompletionReport {
    pub fn outcome(&self, step: CompletionStep) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|(s, _)| *s == step)
            .map(|(_, outcome)| outcome)
    }

    pub fn has_failures(&self) -> bool {
        self.steps
            .iter()
            .any(|(_, outcome)| matches!(outcome, StepOutcome::Failed(_)))
    }
}

/// Finalizes jobs once they stop making progress.
///
/// Every step runs regardless of the failures of the previous ones.
/// Handling the same job more than once is harmless.
pub struct JobCompletionHandler {
    working_dir: PathBuf,
    persistence: Arc<dyn JobPersistence>,
    executor: Arc<dyn ProcessExecutor>,
    transfer: Arc<dyn FileTransfer>,
    mail: Arc<dyn MailService>,
    subscribers: Mutex<Map<JobId, Vec<oneshot::Sender<CompletionReport>>>>,
}

impl JobCompletionHandler {
    pub fn new(
        working_dir: PathBuf,
        persistence: Arc<dyn JobPersistence>,
        executor: Arc<dyn ProcessExecutor>,
        transfer: Arc<dyn FileTransfer>,
        mail: Arc<dyn MailService>,
    ) -> Self {
        Self {
            working_dir,
            persistence,
            executor,
            transfer,
            mail,
            subscribers: Default::default(),
        }
    }

    /// Returns a receiver that gets the report of the next finalization of the job.
    /// Subscribe before the job can finish, reports are not kept.
    pub fn subscribe(&self, job_id: &JobId) -> oneshot::Receiver<CompletionReport> {
        let (sender, receiver) = oneshot::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(job_id.clone())
            .or_default()
            .push(sender);
        receiver
    }

    /// Handles finished signals until every sender is dropped.
    pub async fn run(self: Arc<Self>, mut receiver: FinishedReceiver) {
        while let Some(event) = receiver.recv().await {
            self.handle_job_completion(event).await;
        }
        log::debug!("Finished job channel closed, completion handler stops");
    }

    pub async fn handle_job_completion(&self, event: JobFinished) -> CompletionReport {
        let job_id = event.job_id;
        log::debug!("Finalizing job {job_id}");

        let exit_code = finish_step(
            CompletionStep::ExitCode,
            &job_id,
            self.update_exit_code(&job_id),
        );
        let cleanup = finish_step(
            CompletionStep::ProcessCleanup,
            &job_id,
            self.cleanup_processes(event.process_id),
        );
        let archival = finish_step(
            CompletionStep::Archival,
            &job_id,
            self.archive_job_dir(&job_id).await,
        );
        let notification = finish_step(
            CompletionStep::Notification,
            &job_id,
            self.send_email(&job_id),
        );

        let report = CompletionReport {
            status: self.persistence.get_job(&job_id).ok().map(|job| job.status),
            steps: vec![
                (CompletionStep::ExitCode, exit_code),
                (CompletionStep::ProcessCleanup, cleanup),
                (CompletionStep::Archival, archival),
                (CompletionStep::Notification, notification),
            ],
            job_id,
        };
        log::info!(
            "Job {} finalized with status {}",
            report.job_id,
            report
                .status
                .map(|status| status.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );
        self.publish(&report);
        report
    }

    fn publish(&self, report: &CompletionReport) {
        let subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&report.job_id)
            .unwrap_or_default();
        for subscriber in subscribers {
            // The subscriber may have stopped waiting
            let _ = subscriber.send(report.clone());
        }
    }

    fn update_exit_code(&self, job_id: &JobId) -> crate::Result<StepOutcome> {
        let job = self.persistence.get_job(job_id)?;
        if job.is_terminal() {
            return Ok(StepOutcome::Skipped(format!("job is already {}", job.status)));
        }
        if job.status == JobStatus::Init {
            self.persistence.update_job_status(
                job_id,
                JobStatus::Failed,
                "Job finished before it was marked as running",
            )?;
            return Ok(StepOutcome::Done);
        }

        let path = done_file_path(&self.working_dir, job_id);
        match JobDoneFile::read(&path) {
            Ok(done) => {
                self.persistence.set_exit_code(job_id, done.exit_code)?;
                Ok(StepOutcome::Done)
            }
            Err(error) => {
                let killed = self
                    .persistence
                    .get_job_execution(job_id)?
                    .is_some_and(|execution| execution.was_killed());
                if killed {
                    self.persistence
                        .update_job_status(job_id, JobStatus::Killed, "Job was killed")?;
                } else {
                    log::error!(
                        "Could not load the done file of job {job_id}, marking it as failed"
                    );
                    self.persistence.update_job_status(
                        job_id,
                        JobStatus::Failed,
                        "Genie could not determine completion status, the done file is missing",
                    )?;
                }
                Err(GenieError::GenericError(format!(
                    "Cannot read done file {}: {error}",
                    path.display()
                )))
            }
        }
    }

    fn cleanup_processes(&self, process_id: Option<u32>) -> crate::Result<StepOutcome> {
        let Some(pid) = process_id else {
            return Ok(StepOutcome::Skipped("job has no process".to_string()));
        };
        match self.executor.signal_group(pid, ProcessSignal::Kill) {
            Ok(()) => Ok(StepOutcome::Done),
            Err(error) => {
                log::debug!("Nothing to clean up for process group {pid}: {error}");
                Ok(StepOutcome::Skipped("no leftover processes".to_string()))
            }
        }
    }

    async fn archive_job_dir(&self, job_id: &JobId) -> crate::Result<StepOutcome> {
        let job = self.persistence.get_job(job_id)?;
        let Some(location) = job.archive_location else {
            return Ok(StepOutcome::Skipped("log archival is disabled".to_string()));
        };
        let job_dir = job_dir(&self.working_dir, job_id);
        if !job_dir.is_dir() {
            return Ok(StepOutcome::Skipped(
                "job directory does not exist".to_string(),
            ));
        }

        let archive = local_archive_path(&self.working_dir, job_id);
        if let Some(parent) = archive.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let output = tokio::process::Command::new("tar")
            .arg("-c")
            .arg("-z")
            .arg("-f")
            .arg(&archive)
            .arg(format!("--exclude=./{RUN_SCRIPT}"))
            .arg(format!("--exclude=./{GENIE_DIR}"))
            .arg("./")
            .current_dir(&job_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;
        if !output.status.success() {
            return Err(GenieError::GenericError(format!(
                "tar failed with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let transfer = self.transfer.clone();
        let destination = location.clone();
        tokio::task::spawn_blocking(move || transfer.put_file(&archive, &destination))
            .await
            .map_err(|error| {
                GenieError::GenericError(format!("Archive upload did not finish: {error}"))
            })??;
        log::debug!("Job {job_id} archived to {location}");
        Ok(StepOutcome::Done)
    }

    fn send_email(&self, job_id: &JobId) -> crate::Result<StepOutcome> {
        let request = self.persistence.get_job_request(job_id)?;
        let Some(email) = request.email.filter(|email| !email.trim().is_empty()) else {
            return Ok(StepOutcome::Skipped("no notification address".to_string()));
        };
        let job = self.persistence.get_job(job_id)?;
        let message = format!("Job with id [{job_id}] finished with status {}", job.status);
        self.mail.send_email(&email, &message, &message)?;
        Ok(StepOutcome::Done)
    }
}

fn finish_step(
    step: CompletionStep,
    job_id: &JobId,
    result: crate::Result<StepOutcome>,
) -> StepOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(error) => {
            let error = GenieError::CompletionStepFailed {
                step: step.name(),
                message: error.to_string(),
            };
            log::warn!("Job {job_id}: {error}");
            StepOutcome::Failed(error.to_string())
        }
    }
}
