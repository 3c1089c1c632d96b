use std::sync::Arc;

use crate::common::config::GenieConfig;
use crate::coordinator::balancer::RandomClusterLoadBalancer;
use crate::coordinator::completion::JobCompletionHandler;
use crate::coordinator::coordinate::JobCoordinator;
use crate::coordinator::events::finished_channel;
use crate::coordinator::kill::JobKillService;
use crate::coordinator::submitter::LocalJobSubmitter;
use crate::services::{
    FileTransfer, FileTransferRouter, JobPersistence, KillForwarder, LocalProcessExecutor,
    LoggingMailService, MailService, NoKillForwarder, ProcessExecutor, ResourceCatalog,
};
use crate::workflow::WorkflowPipeline;

/// Collaborators that reach outside of the process.
pub struct Collaborators {
    pub executor: Arc<dyn ProcessExecutor>,
    pub transfer: Arc<dyn FileTransfer>,
    pub mail: Arc<dyn MailService>,
    pub forwarder: Box<dyn KillForwarder>,
}

impl Collaborators {
    /// Collaborators of a single node deployment.
    pub fn local() -> Self {
        Self {
            executor: Arc::new(LocalProcessExecutor::new()),
            transfer: Arc::new(FileTransferRouter::local()),
            mail: Arc::new(LoggingMailService),
            forwarder: Box::new(NoKillForwarder),
        }
    }
}

/// Fully wired coordination service of one node.
pub struct GenieNode {
    pub config: Arc<GenieConfig>,
    pub coordinator: JobCoordinator,
    pub completion: Arc<JobCompletionHandler>,
}

impl GenieNode {
    /// Wires the components together and spawns the completion handler.
    /// Has to be called from within a Tokio runtime.
    pub fn start(
        config: GenieConfig,
        persistence: Arc<dyn JobPersistence>,
        catalog: Arc<dyn ResourceCatalog>,
        collaborators: Collaborators,
    ) -> Self {
        let config = Arc::new(config);
        let (notifier, receiver) = finished_channel();

        let completion = Arc::new(JobCompletionHandler::new(
            config.working_dir.clone(),
            persistence.clone(),
            collaborators.executor.clone(),
            collaborators.transfer.clone(),
            collaborators.mail,
        ));
        tokio::spawn(completion.clone().run(receiver));

        let pipeline = WorkflowPipeline::standard(
            &config,
            persistence.clone(),
            collaborators.executor.clone(),
            collaborators.transfer,
            notifier.clone(),
        );
        let submitter = LocalJobSubmitter::new(
            config.clone(),
            persistence.clone(),
            catalog.clone(),
            Arc::new(pipeline),
            notifier.clone(),
        );
        let kill_service = JobKillService::new(
            &config,
            persistence.clone(),
            collaborators.executor,
            collaborators.forwarder,
            notifier,
        );
        let coordinator = JobCoordinator::new(
            config.clone(),
            persistence,
            catalog,
            Box::new(RandomClusterLoadBalancer),
            Arc::new(submitter),
            kill_service,
        );
        log::debug!(
            "Genie node {} started, jobs are placed into {}",
            config.hostname,
            config.working_dir.display()
        );

        Self {
            config,
            coordinator,
            completion,
        }
    }
}
