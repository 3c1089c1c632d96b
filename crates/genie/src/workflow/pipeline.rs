use std::sync::Arc;

use crate::common::config::GenieConfig;
use crate::common::error::GenieError;
use crate::coordinator::events::FinishedNotifier;
use crate::services::{FileTransfer, JobPersistence, ProcessExecutor};
use crate::workflow::context::JobExecutionContext;
use crate::workflow::tasks::{AttachmentTask, JobDirectoryTask, LaunchTask, ScriptTask, SetupTask};

/// One step of job preparation.
///
/// Tasks are never retried. A task that fails fails the whole job.
pub trait WorkflowTask: Send + Sync {
    fn name(&self) -> &'static str;

    fn execute(&self, ctx: &mut JobExecutionContext) -> crate::Result<()>;
}

/// Ordered list of tasks that prepares and launches a job.
pub struct WorkflowPipeline {
    tasks: Vec<Box<dyn WorkflowTask>>,
}

impl WorkflowPipeline {
    pub fn new(tasks: Vec<Box<dyn WorkflowTask>>) -> Self {
        Self { tasks }
    }

    /// Directory, attachments, setup, launch script and process launch, in this order.
    pub fn standard(
        config: &GenieConfig,
        persistence: Arc<dyn JobPersistence>,
        executor: Arc<dyn ProcessExecutor>,
        transfer: Arc<dyn FileTransfer>,
        notifier: FinishedNotifier,
    ) -> Self {
        Self::new(vec![
            Box::new(JobDirectoryTask),
            Box::new(AttachmentTask::new(transfer.clone())),
            Box::new(SetupTask::new(transfer)),
            Box::new(ScriptTask::new(config.script_shell.clone())),
            Box::new(LaunchTask::new(
                config.hostname.clone(),
                config.script_shell.clone(),
                persistence,
                executor,
                notifier,
            )),
        ])
    }

    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|task| task.name()).collect()
    }

    /// Runs the tasks one by one and stops at the first failure.
    pub fn run(&self, ctx: &mut JobExecutionContext) -> crate::Result<()> {
        for task in &self.tasks {
            log::debug!("Job {}: running task `{}`", ctx.job_id(), task.name());
            task.execute(ctx).map_err(|error| GenieError::PipelineTaskFailed {
                task: task.name(),
                message: error.to_string(),
            })?;
        }
        Ok(())
    }
}
