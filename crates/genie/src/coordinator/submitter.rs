use std::sync::Arc;

use crate::JobId;
use crate::common::config::GenieConfig;
use crate::common::error::GenieError;
use crate::coordinator::events::FinishedNotifier;
use crate::model::{JobRequest, JobStatus};
use crate::services::{JobPersistence, ResourceCatalog, StatusUpdate};
use crate::workflow::{JobExecutionContext, WorkflowPipeline};

/// Hands a coordinated job over to execution.
pub trait JobSubmitter: Send + Sync {
    /// Returns once the job was handed over, without waiting for the job.
    /// Errors are returned only for failures that happen before the hand-over.
    fn submit_job(&self, request: JobRequest) -> crate::Result<()>;
}

/// Runs the workflow pipeline of each job on the blocking thread pool of the Tokio runtime.
pub struct LocalJobSubmitter {
    config: Arc<GenieConfig>,
    persistence: Arc<dyn JobPersistence>,
    catalog: Arc<dyn ResourceCatalog>,
    pipeline: Arc<WorkflowPipeline>,
    notifier: FinishedNotifier,
}

impl LocalJobSubmitter {
    pub fn new(
        config: Arc<GenieConfig>,
        persistence: Arc<dyn JobPersistence>,
        catalog: Arc<dyn ResourceCatalog>,
        pipeline: Arc<WorkflowPipeline>,
        notifier: FinishedNotifier,
    ) -> Self {
        Self {
            config,
            persistence,
            catalog,
            pipeline,
            notifier,
        }
    }

    fn check_capacity(&self) -> crate::Result<()> {
        if let Some(max_running_jobs) = self.config.max_running_jobs {
            let running = self.persistence.get_running_job_count(&self.config.hostname);
            if running >= max_running_jobs {
                return Err(GenieError::SubmissionRejected(format!(
                    "{running} jobs are already running on {}, the limit is {max_running_jobs}",
                    self.config.hostname
                )));
            }
        }
        Ok(())
    }

    fn create_context(&self, request: JobRequest) -> crate::Result<JobExecutionContext> {
        let job = self.persistence.get_job(&request.id)?;
        let cluster = self.catalog.get_cluster(&job.cluster_id)?;
        let command = self.catalog.get_command(&job.command_id)?;
        let applications = self.catalog.get_applications_for_command(&command.id)?;
        Ok(JobExecutionContext::new(
            &self.config.working_dir,
            request,
            job,
            cluster,
            command,
            applications,
        ))
    }
}

fn fail_job(
    persistence: &dyn JobPersistence,
    notifier: &FinishedNotifier,
    job_id: &JobId,
    process_id: Option<u32>,
    error: &GenieError,
) {
    log::error!("Job {job_id} failed: {error}");
    match persistence.update_job_status(job_id, JobStatus::Failed, &error.to_string()) {
        Ok(StatusUpdate::Applied) => notifier.notify(job_id.clone(), process_id),
        Ok(StatusUpdate::Ignored(status)) => {
            log::debug!("Job {job_id} is already {status}, keeping its status");
        }
        Err(error) => log::error!("Cannot mark job {job_id} as failed: {error}"),
    }
}

impl JobSubmitter for LocalJobSubmitter {
    fn submit_job(&self, request: JobRequest) -> crate::Result<()> {
        self.check_capacity()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|error| {
            GenieError::SubmissionRejected(format!("No runtime to execute the job: {error}"))
        })?;
        let mut ctx = self.create_context(request)?;

        let pipeline = self.pipeline.clone();
        let persistence = self.persistence.clone();
        let notifier = self.notifier.clone();
        log::debug!("Job {} handed over to the workflow pipeline", ctx.job_id());
        runtime.spawn_blocking(move || {
            if let Err(error) = pipeline.run(&mut ctx) {
                fail_job(
                    persistence.as_ref(),
                    &notifier,
                    ctx.job_id(),
                    ctx.process_id,
                    &error,
                );
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::{JobSubmitter, LocalJobSubmitter};
    use crate::JobId;
    use crate::common::config::GenieConfig;
    use crate::common::error::GenieError;
    use crate::coordinator::events::finished_channel;
    use crate::model::{JobExecution, JobStatus};
    use crate::services::{JobPersistence, MemoryStore};
    use crate::tests::utils::{create_job, create_request, test_cluster, test_command};
    use crate::workflow::{JobExecutionContext, WorkflowPipeline, WorkflowTask};

    struct Broken;

    impl WorkflowTask for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn execute(&self, _ctx: &mut JobExecutionContext) -> crate::Result<()> {
            Err(GenieError::GenericError("disk full".to_string()))
        }
    }

    fn store_with_job(id: &str) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.add_cluster(test_cluster("cluster1", &[], true));
        store.add_command(test_command("command1", &[], &["cluster1"]));
        let request = create_request(id);
        store.create_job(create_job(&request)).unwrap();
        store.create_job_request(request).unwrap();
        store
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pipeline_failure_fails_job() {
        let store = store_with_job("job1");
        let (notifier, mut receiver) = finished_channel();
        let submitter = LocalJobSubmitter::new(
            Arc::new(GenieConfig::default()),
            store.clone(),
            store.clone(),
            Arc::new(WorkflowPipeline::new(vec![Box::new(Broken)])),
            notifier,
        );
        submitter.submit_job(create_request("job1")).unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.job_id, JobId::new("job1"));
        let job = store.get_job(&JobId::new("job1")).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(
            job.status_msg.as_deref(),
            Some("Workflow task `broken` failed: Error: disk full")
        );
    }

    #[tokio::test]
    async fn test_running_job_limit() {
        let store = store_with_job("job1");
        let request = create_request("job2");
        store.create_job(create_job(&request)).unwrap();
        store.create_job_request(request).unwrap();
        store
            .mark_job_running(JobExecution::new(JobId::new("job1"), "host1".into(), 1))
            .unwrap();

        let config = GenieConfig {
            hostname: "host1".to_string(),
            max_running_jobs: Some(1),
            ..Default::default()
        };
        let (notifier, _receiver) = finished_channel();
        let submitter = LocalJobSubmitter::new(
            Arc::new(config),
            store.clone(),
            store.clone(),
            Arc::new(WorkflowPipeline::new(vec![])),
            notifier,
        );
        let r = submitter.submit_job(create_request("job2"));
        assert!(matches!(r, Err(GenieError::SubmissionRejected(_))));
    }
}
