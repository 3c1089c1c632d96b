use std::sync::Arc;

use chrono::Utc;

use crate::JobId;
use crate::common::config::GenieConfig;
use crate::common::error::GenieError;
use crate::common::fsutils::archive_location;
use crate::coordinator::balancer::ClusterLoadBalancer;
use crate::coordinator::kill::{JobKillService, KillOutcome};
use crate::coordinator::matcher::resolve;
use crate::coordinator::submitter::JobSubmitter;
use crate::model::{ChosenCriteria, Cluster, Command, Criterion, Job, JobRequest, JobStatus};
use crate::services::{JobPersistence, ResourceCatalog};

/// Cluster and command chosen for a job request.
#[derive(Debug, Clone)]
pub struct ResourceSelection {
    pub cluster: Cluster,
    pub command: Command,
    pub chosen_criteria: ChosenCriteria,
}

/// Entry point of job submission and job killing.
pub struct JobCoordinator {
    config: Arc<GenieConfig>,
    persistence: Arc<dyn JobPersistence>,
    catalog: Arc<dyn ResourceCatalog>,
    load_balancer: Box<dyn ClusterLoadBalancer>,
    submitter: Arc<dyn JobSubmitter>,
    kill_service: JobKillService,
}

impl JobCoordinator {
    pub fn new(
        config: Arc<GenieConfig>,
        persistence: Arc<dyn JobPersistence>,
        catalog: Arc<dyn ResourceCatalog>,
        load_balancer: Box<dyn ClusterLoadBalancer>,
        submitter: Arc<dyn JobSubmitter>,
        kill_service: JobKillService,
    ) -> Self {
        Self {
            config,
            persistence,
            catalog,
            load_balancer,
            submitter,
            kill_service,
        }
    }

    /// Chooses the cluster and the command of a stored job request, creates the job
    /// in `INIT` and hands it over for execution.
    ///
    /// Coordinating the same request again only records the client host.
    pub fn coordinate_job(&self, request: &JobRequest, client_host: &str) -> crate::Result<JobId> {
        request.validate()?;
        self.persistence
            .add_client_host_to_job_request(&request.id, client_host)?;

        match self.persistence.get_job(&request.id) {
            Ok(job) => {
                log::info!("Job {} was already coordinated, it is {}", job.id, job.status);
                return Ok(job.id);
            }
            Err(GenieError::JobNotFound(_)) => {}
            Err(error) => return Err(error),
        }

        let selection = self.select_resources(request)?;
        log::info!(
            "Job {} will run command {} on cluster {}",
            request.id,
            selection.command.id,
            selection.cluster.id
        );

        let job = self.create_job(request, selection);
        match self.persistence.create_job(job) {
            Ok(()) => {}
            Err(GenieError::JobAlreadyExists(job_id)) => {
                log::info!("Job {job_id} was coordinated concurrently");
                return Ok(job_id);
            }
            Err(error) => return Err(error),
        }

        if let Err(error) = self.submitter.submit_job(request.clone()) {
            log::error!("Submission of job {} failed: {error}", request.id);
            self.persistence
                .update_job_status(&request.id, JobStatus::Failed, &error.to_string())?;
            return Err(error);
        }
        Ok(request.id.clone())
    }

    /// Resolves the cluster and the command for a request without creating anything.
    pub fn select_resources(&self, request: &JobRequest) -> crate::Result<ResourceSelection> {
        let cluster_criteria = criteria_or_default(
            &request.cluster_criteria,
            &self.config.default_cluster_criteria,
        );
        let command_criteria = criteria_or_default(
            &request.command_criteria,
            &self.config.default_command_criteria,
        );

        let clusters = self.catalog.get_clusters();
        let cluster_match = resolve(cluster_criteria, &clusters).map_err(|error| {
            GenieError::ResourceSelectionFailed(format!("No cluster found: {error}"))
        })?;
        let cluster = self.load_balancer.select_cluster(&cluster_match.matches)?;

        let commands = self.catalog.get_commands_for_cluster(&cluster.id);
        let command_match = resolve(command_criteria, &commands).map_err(|error| {
            GenieError::ResourceSelectionFailed(format!(
                "No command found on cluster {}: {error}",
                cluster.id
            ))
        })?;
        // Commands are in registration order, the first one has priority
        let command = command_match.matches.first().ok_or_else(|| {
            GenieError::ResourceSelectionFailed(format!(
                "No command found on cluster {}",
                cluster.id
            ))
        })?;

        Ok(ResourceSelection {
            cluster: cluster.clone(),
            command: (*command).clone(),
            chosen_criteria: ChosenCriteria {
                cluster_criterion_index: cluster_match.index,
                cluster_criterion: cluster_match.criterion,
                command_criterion_index: command_match.index,
                command_criterion: command_match.criterion,
            },
        })
    }

    /// Kills the job, see [`JobKillService::kill_job`].
    pub fn kill_job(&self, job_id: &JobId) -> crate::Result<KillOutcome> {
        self.kill_service.kill_job(job_id)
    }

    fn create_job(&self, request: &JobRequest, selection: ResourceSelection) -> Job {
        let archive_location = (!request.disable_log_archival)
            .then(|| archive_location(&self.config.archive_root, &request.id));
        Job {
            id: request.id.clone(),
            name: request.name.clone(),
            user: request.user.clone(),
            version: request.version.clone(),
            description: request.description.clone(),
            tags: request.tags.clone(),
            status: JobStatus::Init,
            status_msg: Some("Job accepted and in initialization phase".to_string()),
            archive_location,
            created: Utc::now(),
            started: None,
            finished: None,
            exit_code: None,
            cluster_id: selection.cluster.id,
            command_id: selection.command.id,
            chosen_criteria: selection.chosen_criteria,
        }
    }
}

fn criteria_or_default<'a>(
    criteria: &'a [Criterion],
    defaults: &'a [Criterion],
) -> &'a [Criterion] {
    if criteria.is_empty() {
        defaults
    } else {
        criteria
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::JobCoordinator;
    use crate::common::config::GenieConfig;
    use crate::common::error::GenieError;
    use crate::coordinator::balancer::RandomClusterLoadBalancer;
    use crate::coordinator::events::{FinishedReceiver, finished_channel};
    use crate::coordinator::kill::{JobKillService, KillOutcome};
    use crate::model::{Criterion, JobRequest, JobStatus};
    use crate::services::{JobPersistence, MemoryStore, NoKillForwarder};
    use crate::tests::utils::{
        RecordingExecutor, RecordingSubmitter, create_request, test_cluster, test_command,
    };
    use crate::{JobId, Set};

    struct Env {
        store: Arc<MemoryStore>,
        submitter: Arc<RecordingSubmitter>,
        coordinator: JobCoordinator,
        _receiver: FinishedReceiver,
    }

    fn env_with_config(config: GenieConfig) -> Env {
        let config = Arc::new(config);
        let store = Arc::new(MemoryStore::new());
        store.add_cluster(test_cluster("A", &["prod", "hive", "pig"], true));
        store.add_cluster(test_cluster("B", &["dev"], true));
        store.add_command(test_command("hive-a", &["type:hive"], &["A"]));
        store.add_command(test_command("hive-b", &["type:hive"], &["B"]));
        store.add_command(test_command("hive-b2", &["type:hive", "ver:2"], &["B"]));
        let submitter = Arc::new(RecordingSubmitter::default());
        let (notifier, receiver) = finished_channel();
        let kill_service = JobKillService::new(
            &config,
            store.clone(),
            Arc::new(RecordingExecutor::default()),
            Box::new(NoKillForwarder),
            notifier,
        );
        let coordinator = JobCoordinator::new(
            config,
            store.clone(),
            store.clone(),
            Box::new(RandomClusterLoadBalancer),
            submitter.clone(),
            kill_service,
        );
        Env {
            store,
            submitter,
            coordinator,
            _receiver: receiver,
        }
    }

    fn env() -> Env {
        env_with_config(GenieConfig {
            archive_root: "s3://bucket/archives/".to_string(),
            ..Default::default()
        })
    }

    fn hive_request(env: &Env, id: &str) -> JobRequest {
        let mut request = create_request(id);
        request.cluster_criteria = vec![Criterion::new(["prod", "hive"]), Criterion::any()];
        request.command_criteria = vec![Criterion::new(["type:hive"])];
        env.store.create_job_request(request.clone()).unwrap();
        request
    }

    #[test]
    fn test_coordinate_job() {
        let env = env();
        let request = hive_request(&env, "job1");
        let id = env.coordinator.coordinate_job(&request, "client1").unwrap();
        assert_eq!(id, JobId::new("job1"));

        let job = env.store.get_job(&id).unwrap();
        assert_eq!(job.status, JobStatus::Init);
        assert_eq!(job.cluster_id.as_str(), "A");
        assert_eq!(job.command_id.as_str(), "hive-a");
        assert_eq!(job.chosen_criteria.cluster_criterion_index, 0);
        assert_eq!(job.name, request.name);
        assert_eq!(
            job.archive_location.as_deref(),
            Some("s3://bucket/archives/job1.tar.gz")
        );
        assert_eq!(env.submitter.submitted(), vec![id.clone()]);
        assert_eq!(
            env.store.get_client_hosts(&id).unwrap(),
            Set::from(["client1".to_string()])
        );
    }

    #[test]
    fn test_inactive_cluster_falls_back() {
        let env = env();
        env.store
            .add_cluster(test_cluster("A", &["prod", "hive", "pig"], false));
        let request = hive_request(&env, "job1");
        let id = env.coordinator.coordinate_job(&request, "client1").unwrap();
        let job = env.store.get_job(&id).unwrap();
        assert_eq!(job.cluster_id.as_str(), "B");
        assert_eq!(job.chosen_criteria.cluster_criterion_index, 1);
        // Registration order decides between matching commands
        assert_eq!(job.command_id.as_str(), "hive-b");
    }

    #[test]
    fn test_disabled_archival() {
        let env = env();
        let mut request = create_request("job1");
        request.cluster_criteria = vec![Criterion::new(["dev"])];
        request.command_criteria = vec![Criterion::any()];
        request.disable_log_archival = true;
        env.store.create_job_request(request.clone()).unwrap();
        let id = env.coordinator.coordinate_job(&request, "client1").unwrap();
        assert_eq!(env.store.get_job(&id).unwrap().archive_location, None);
    }

    #[test]
    fn test_coordinate_twice() {
        let env = env();
        let request = hive_request(&env, "job1");
        env.coordinator.coordinate_job(&request, "client1").unwrap();
        env.coordinator.coordinate_job(&request, "client1").unwrap();
        env.coordinator.coordinate_job(&request, "client2").unwrap();
        assert_eq!(env.submitter.submitted().len(), 1);
        assert_eq!(env.store.get_client_hosts(&request.id).unwrap().len(), 2);
    }

    #[test]
    fn test_no_matching_cluster() {
        let env = env();
        let mut request = create_request("job1");
        request.cluster_criteria = vec![Criterion::new(["gpu"])];
        request.command_criteria = vec![Criterion::any()];
        env.store.create_job_request(request.clone()).unwrap();
        let r = env.coordinator.coordinate_job(&request, "client1");
        assert!(matches!(r, Err(GenieError::ResourceSelectionFailed(_))));
        assert!(matches!(
            env.store.get_job(&request.id),
            Err(GenieError::JobNotFound(_))
        ));
        assert!(env.submitter.submitted().is_empty());
    }

    #[test]
    fn test_no_matching_command() {
        let env = env();
        let mut request = create_request("job1");
        request.cluster_criteria = vec![Criterion::new(["prod"])];
        request.command_criteria = vec![Criterion::new(["ver:2"])];
        env.store.create_job_request(request.clone()).unwrap();
        let error = env
            .coordinator
            .coordinate_job(&request, "client1")
            .unwrap_err();
        assert!(error.to_string().contains("No command found on cluster A"));
    }

    #[test]
    fn test_default_criteria() {
        let env = env_with_config(GenieConfig {
            default_cluster_criteria: vec![Criterion::new(["dev"])],
            default_command_criteria: vec![Criterion::new(["ver:2"])],
            ..Default::default()
        });
        let request = create_request("job1");
        env.store.create_job_request(request.clone()).unwrap();
        let selection = env.coordinator.select_resources(&request).unwrap();
        assert_eq!(selection.cluster.id.as_str(), "B");
        assert_eq!(selection.command.id.as_str(), "hive-b2");
    }

    #[test]
    fn test_request_must_exist() {
        let env = env();
        let request = create_request("job1");
        let r = env.coordinator.coordinate_job(&request, "client1");
        assert!(matches!(r, Err(GenieError::JobNotFound(_))));
    }

    #[test]
    fn test_submission_failure_fails_job() {
        let env = env();
        env.submitter.fail_submissions();
        let request = hive_request(&env, "job1");
        let r = env.coordinator.coordinate_job(&request, "client1");
        assert!(matches!(r, Err(GenieError::SubmissionRejected(_))));
        let job = env.store.get_job(&request.id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[test]
    fn test_kill_is_delegated() {
        let env = env();
        let request = hive_request(&env, "job1");
        let id = env.coordinator.coordinate_job(&request, "client1").unwrap();
        assert_eq!(
            env.coordinator.kill_job(&id).unwrap(),
            KillOutcome::KilledBeforeLaunch
        );
        assert_eq!(
            env.coordinator.kill_job(&id).unwrap(),
            KillOutcome::AlreadyFinished(JobStatus::Killed)
        );
        let r = env.coordinator.kill_job(&JobId::new("missing"));
        assert!(matches!(r, Err(GenieError::JobNotFound(_))));
    }
}
