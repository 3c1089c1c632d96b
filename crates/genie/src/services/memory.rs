use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use serde::Deserialize;

use crate::common::error::{GenieError, error};
use crate::model::{Application, Cluster, Command, Job, JobExecution, JobRequest, JobStatus};
use crate::services::persistence::{JobPersistence, ResourceCatalog, StatusUpdate};
use crate::{ApplicationId, ClusterId, CommandId, JobId, Map, Set};

/// Clusters, commands and applications known to a node.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct Catalog {
    #[serde(default, rename = "cluster")]
    pub clusters: Vec<Cluster>,
    #[serde(default, rename = "command")]
    pub commands: Vec<Command>,
    #[serde(default, rename = "application")]
    pub applications: Vec<Application>,
}

impl Catalog {
    pub fn parse(str: &str) -> crate::Result<Catalog> {
        let catalog: Catalog = toml::from_str(str)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load(path: &Path) -> crate::Result<Catalog> {
        log::debug!("Loading catalog from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    fn validate(&self) -> crate::Result<()> {
        let cluster_ids: Set<&ClusterId> = self.clusters.iter().map(|c| &c.id).collect();
        if cluster_ids.len() != self.clusters.len() {
            return error("Duplicate cluster id in catalog".to_string());
        }
        let application_ids: Set<&ApplicationId> =
            self.applications.iter().map(|a| &a.id).collect();
        if application_ids.len() != self.applications.len() {
            return error("Duplicate application id in catalog".to_string());
        }
        let mut command_ids = Set::new();
        for command in &self.commands {
            if !command_ids.insert(&command.id) {
                return error(format!("Duplicate command id {} in catalog", command.id));
            }
            if let Some(id) = command.cluster_ids.iter().find(|id| !cluster_ids.contains(id)) {
                return error(format!(
                    "Command {} refers to unknown cluster {id}",
                    command.id
                ));
            }
            if let Some(id) = command
                .application_ids
                .iter()
                .find(|id| !application_ids.contains(id))
            {
                return error(format!(
                    "Command {} refers to unknown application {id}",
                    command.id
                ));
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct StoreInner {
    requests: Map<JobId, JobRequest>,
    client_hosts: Map<JobId, Set<String>>,
    jobs: Map<JobId, Job>,
    executions: Map<JobId, JobExecution>,

    clusters: Vec<Cluster>,
    commands: Vec<Command>,
    applications: Vec<Application>,
}

impl StoreInner {
    fn job_mut(&mut self, job_id: &JobId) -> crate::Result<&mut Job> {
        self.jobs
            .get_mut(job_id)
            .ok_or_else(|| GenieError::JobNotFound(job_id.clone()))
    }
}

fn apply_status(job: &mut Job, status: JobStatus, message: String) -> crate::Result<StatusUpdate> {
    if job.status.is_terminal() {
        log::debug!(
            "Ignoring status change of job {} from {} to {}",
            job.id,
            job.status,
            status
        );
        return Ok(StatusUpdate::Ignored(job.status));
    }
    if !job.status.can_transition_to(status) {
        return Err(GenieError::InvalidStatusTransition {
            job_id: job.id.clone(),
            from: job.status,
            to: status,
        });
    }
    let now = Utc::now();
    if status == JobStatus::Running {
        job.started = Some(now);
    }
    if status.is_terminal() {
        job.finished = Some(now);
    }
    log::debug!("Job {} changed status {} -> {}", job.id, job.status, status);
    job.status = status;
    job.status_msg = Some(message);
    Ok(StatusUpdate::Applied)
}

/// In-process store keeping everything in memory behind a single lock.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_catalog(catalog: Catalog) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner();
            inner.clusters = catalog.clusters;
            inner.commands = catalog.commands;
            inner.applications = catalog.applications;
        }
        store
    }

    pub fn add_cluster(&self, cluster: Cluster) {
        let mut inner = self.inner();
        inner.clusters.retain(|c| c.id != cluster.id);
        inner.clusters.push(cluster);
    }

    pub fn add_command(&self, command: Command) {
        let mut inner = self.inner();
        inner.commands.retain(|c| c.id != command.id);
        inner.commands.push(command);
    }

    pub fn add_application(&self, application: Application) {
        let mut inner = self.inner();
        inner.applications.retain(|a| a.id != application.id);
        inner.applications.push(application);
    }

    fn inner(&self) -> MutexGuard<'_, StoreInner> {
        // The state stays consistent even if a holder panicked, every update is a single step
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl JobPersistence for MemoryStore {
    fn create_job_request(&self, request: JobRequest) -> crate::Result<()> {
        let mut inner = self.inner();
        if inner.requests.contains_key(&request.id) {
            return Err(GenieError::JobAlreadyExists(request.id));
        }
        inner.requests.insert(request.id.clone(), request);
        Ok(())
    }

    fn get_job_request(&self, job_id: &JobId) -> crate::Result<JobRequest> {
        self.inner()
            .requests
            .get(job_id)
            .cloned()
            .ok_or_else(|| GenieError::JobNotFound(job_id.clone()))
    }

    fn add_client_host_to_job_request(&self, job_id: &JobId, host: &str) -> crate::Result<()> {
        let mut inner = self.inner();
        if !inner.requests.contains_key(job_id) {
            return Err(GenieError::JobNotFound(job_id.clone()));
        }
        inner
            .client_hosts
            .entry(job_id.clone())
            .or_default()
            .insert(host.to_string());
        Ok(())
    }

    fn get_client_hosts(&self, job_id: &JobId) -> crate::Result<Set<String>> {
        let inner = self.inner();
        if !inner.requests.contains_key(job_id) {
            return Err(GenieError::JobNotFound(job_id.clone()));
        }
        Ok(inner.client_hosts.get(job_id).cloned().unwrap_or_default())
    }

    fn create_job(&self, job: Job) -> crate::Result<()> {
        let mut inner = self.inner();
        if inner.jobs.contains_key(&job.id) {
            return Err(GenieError::JobAlreadyExists(job.id));
        }
        inner.jobs.insert(job.id.clone(), job);
        Ok(())
    }

    fn get_job(&self, job_id: &JobId) -> crate::Result<Job> {
        self.inner()
            .jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| GenieError::JobNotFound(job_id.clone()))
    }

    fn update_job_status(
        &self,
        job_id: &JobId,
        status: JobStatus,
        message: &str,
    ) -> crate::Result<StatusUpdate> {
        let mut inner = self.inner();
        apply_status(inner.job_mut(job_id)?, status, message.to_string())
    }

    fn kill_unlaunched_job(&self, job_id: &JobId, message: &str) -> crate::Result<StatusUpdate> {
        let mut inner = self.inner();
        let launched = inner.executions.contains_key(job_id);
        let job = inner.job_mut(job_id)?;
        if launched || job.status != JobStatus::Init {
            return Ok(StatusUpdate::Ignored(job.status));
        }
        apply_status(job, JobStatus::Killed, message.to_string())
    }

    fn mark_job_running(&self, execution: JobExecution) -> crate::Result<StatusUpdate> {
        let mut inner = self.inner();
        let job_id = execution.job_id.clone();
        let job = inner.job_mut(&job_id)?;
        let update = apply_status(job, JobStatus::Running, "Job is running".to_string())?;
        inner.executions.insert(job_id, execution);
        Ok(update)
    }

    fn set_exit_code(&self, job_id: &JobId, exit_code: i32) -> crate::Result<StatusUpdate> {
        let mut inner = self.inner();
        let killed = inner
            .executions
            .get(job_id)
            .is_some_and(|execution| execution.was_killed());
        let status = JobStatus::from_exit_code(exit_code, killed);
        let message = match status {
            JobStatus::Succeeded => "Job finished successfully".to_string(),
            JobStatus::Killed => "Job was killed".to_string(),
            _ => format!("Job failed with exit code {exit_code}"),
        };
        let job = inner.job_mut(job_id)?;
        let update = apply_status(job, status, message)?;
        if update.is_applied() {
            job.exit_code = Some(exit_code);
        }
        Ok(update)
    }

    fn get_job_execution(&self, job_id: &JobId) -> crate::Result<Option<JobExecution>> {
        let inner = self.inner();
        if !inner.jobs.contains_key(job_id) {
            return Err(GenieError::JobNotFound(job_id.clone()));
        }
        Ok(inner.executions.get(job_id).cloned())
    }

    fn mark_job_execution_killed(&self, job_id: &JobId) -> crate::Result<bool> {
        let mut inner = self.inner();
        match inner.executions.get_mut(job_id) {
            Some(execution) => {
                if execution.killed.is_none() {
                    execution.killed = Some(Utc::now());
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn clear_job_execution_killed(&self, job_id: &JobId) -> crate::Result<()> {
        if let Some(execution) = self.inner().executions.get_mut(job_id) {
            execution.killed = None;
        }
        Ok(())
    }

    fn get_running_job_executions_on_host(&self, host_name: &str) -> Vec<JobExecution> {
        let inner = self.inner();
        inner
            .executions
            .values()
            .filter(|execution| execution.host_name == host_name)
            .filter(|execution| {
                inner
                    .jobs
                    .get(&execution.job_id)
                    .is_some_and(|job| job.status == JobStatus::Running)
            })
            .cloned()
            .collect()
    }
}

impl ResourceCatalog for MemoryStore {
    fn get_clusters(&self) -> Vec<Cluster> {
        self.inner().clusters.clone()
    }

    fn get_cluster(&self, cluster_id: &ClusterId) -> crate::Result<Cluster> {
        self.inner()
            .clusters
            .iter()
            .find(|c| &c.id == cluster_id)
            .cloned()
            .ok_or_else(|| GenieError::EntityNotFound {
                kind: "Cluster",
                id: cluster_id.to_string(),
            })
    }

    fn get_command(&self, command_id: &CommandId) -> crate::Result<Command> {
        self.inner()
            .commands
            .iter()
            .find(|c| &c.id == command_id)
            .cloned()
            .ok_or_else(|| GenieError::EntityNotFound {
                kind: "Command",
                id: command_id.to_string(),
            })
    }

    fn get_commands_for_cluster(&self, cluster_id: &ClusterId) -> Vec<Command> {
        self.inner()
            .commands
            .iter()
            .filter(|c| c.is_linked_to(cluster_id))
            .cloned()
            .collect()
    }

    fn get_application(&self, application_id: &ApplicationId) -> crate::Result<Application> {
        self.inner()
            .applications
            .iter()
            .find(|a| &a.id == application_id)
            .cloned()
            .ok_or_else(|| GenieError::EntityNotFound {
                kind: "Application",
                id: application_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::{Catalog, MemoryStore};
    use crate::common::error::GenieError;
    use crate::model::{JobExecution, JobStatus};
    use crate::services::persistence::{JobPersistence, ResourceCatalog, StatusUpdate};
    use crate::tests::utils::{create_job, create_request, test_cluster, test_command};
    use crate::{ClusterId, JobId};

    fn store_with_job(job_id: &str) -> MemoryStore {
        let store = MemoryStore::new();
        let request = create_request(job_id);
        store.create_job(create_job(&request)).unwrap();
        store.create_job_request(request).unwrap();
        store
    }

    #[test]
    fn test_client_host_is_recorded_once() {
        let store = store_with_job("job1");
        let id = JobId::new("job1");
        store.add_client_host_to_job_request(&id, "localhost").unwrap();
        store.add_client_host_to_job_request(&id, "localhost").unwrap();
        assert_eq!(store.get_client_hosts(&id).unwrap().len(), 1);
    }

    #[test]
    fn test_client_host_of_unknown_request() {
        let store = MemoryStore::new();
        let r = store.add_client_host_to_job_request(&JobId::new("x"), "localhost");
        assert!(matches!(r, Err(GenieError::JobNotFound(_))));
    }

    #[test]
    fn test_duplicate_job() {
        let store = store_with_job("job1");
        let request = create_request("job1");
        let r = store.create_job(create_job(&request));
        assert!(matches!(r, Err(GenieError::JobAlreadyExists(_))));
    }

    #[test]
    fn test_terminal_status_is_absorbing() {
        let store = store_with_job("job1");
        let id = JobId::new("job1");
        assert_eq!(
            store
                .update_job_status(&id, JobStatus::Killed, "killed")
                .unwrap(),
            StatusUpdate::Applied
        );
        assert_eq!(
            store
                .update_job_status(&id, JobStatus::Failed, "failed")
                .unwrap(),
            StatusUpdate::Ignored(JobStatus::Killed)
        );
        let job = store.get_job(&id).unwrap();
        assert_eq!(job.status, JobStatus::Killed);
        assert_eq!(job.status_msg.as_deref(), Some("killed"));
        assert!(job.finished.is_some());
    }

    #[test]
    fn test_invalid_transition() {
        let store = store_with_job("job1");
        let r = store.update_job_status(&JobId::new("job1"), JobStatus::Succeeded, "");
        assert!(matches!(
            r,
            Err(GenieError::InvalidStatusTransition {
                from: JobStatus::Init,
                to: JobStatus::Succeeded,
                ..
            })
        ));
    }

    #[test]
    fn test_mark_running_and_exit_code() {
        let store = store_with_job("job1");
        let id = JobId::new("job1");
        let update = store
            .mark_job_running(JobExecution::new(id.clone(), "host1".into(), 42))
            .unwrap();
        assert_eq!(update, StatusUpdate::Applied);
        assert_eq!(store.get_running_job_count("host1"), 1);
        assert_eq!(store.get_running_job_count("host2"), 0);

        assert!(store.set_exit_code(&id, 137).unwrap().is_applied());
        let job = store.get_job(&id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.exit_code, Some(137));
        assert!(job.started.is_some());
        assert_eq!(store.get_running_job_count("host1"), 0);
    }

    #[test]
    fn test_kill_note_takes_precedence() {
        let store = store_with_job("job1");
        let id = JobId::new("job1");
        store
            .mark_job_running(JobExecution::new(id.clone(), "host1".into(), 42))
            .unwrap();
        assert!(store.mark_job_execution_killed(&id).unwrap());
        store.set_exit_code(&id, 0).unwrap();
        assert_eq!(store.get_job(&id).unwrap().status, JobStatus::Killed);
    }

    #[test]
    fn test_cleared_kill_note_keeps_exit_code() {
        let store = store_with_job("job1");
        let id = JobId::new("job1");
        store
            .mark_job_running(JobExecution::new(id.clone(), "host1".into(), 42))
            .unwrap();
        store.mark_job_execution_killed(&id).unwrap();
        store.clear_job_execution_killed(&id).unwrap();
        store.set_exit_code(&id, 0).unwrap();
        assert_eq!(store.get_job(&id).unwrap().status, JobStatus::Succeeded);
    }

    #[test]
    fn test_mark_running_of_killed_job_keeps_execution() {
        let store = store_with_job("job1");
        let id = JobId::new("job1");
        store
            .update_job_status(&id, JobStatus::Killed, "killed")
            .unwrap();
        let update = store
            .mark_job_running(JobExecution::new(id.clone(), "host1".into(), 42))
            .unwrap();
        assert_eq!(update, StatusUpdate::Ignored(JobStatus::Killed));
        assert_eq!(store.get_job_execution(&id).unwrap().unwrap().process_id, 42);
    }

    #[test]
    fn test_kill_unlaunched_job() {
        let store = store_with_job("job1");
        let id = JobId::new("job1");
        assert!(store.kill_unlaunched_job(&id, "killed").unwrap().is_applied());
        assert_eq!(store.get_job(&id).unwrap().status, JobStatus::Killed);
        assert_eq!(
            store.kill_unlaunched_job(&id, "killed").unwrap(),
            StatusUpdate::Ignored(JobStatus::Killed)
        );
    }

    #[test]
    fn test_kill_unlaunched_job_after_launch() {
        let store = store_with_job("job1");
        let id = JobId::new("job1");
        store
            .mark_job_running(JobExecution::new(id.clone(), "host1".into(), 42))
            .unwrap();
        assert_eq!(
            store.kill_unlaunched_job(&id, "killed").unwrap(),
            StatusUpdate::Ignored(JobStatus::Running)
        );
    }

    #[test]
    fn test_commands_for_cluster_keep_order() {
        let store = MemoryStore::new();
        store.add_cluster(test_cluster("c1", &["a"], true));
        store.add_command(test_command("cmd2", &["x"], &["c1"]));
        store.add_command(test_command("cmd1", &["x"], &["c1"]));
        store.add_command(test_command("cmd3", &["x"], &["c2"]));
        let ids: Vec<_> = store
            .get_commands_for_cluster(&ClusterId::new("c1"))
            .into_iter()
            .map(|c| c.id.to_string())
            .collect();
        assert_eq!(ids, vec!["cmd2", "cmd1"]);
    }

    #[test]
    fn test_parse_catalog() {
        let catalog = Catalog::parse(
            r#"
        [[cluster]]
        id = "c1"
        name = "prod"
        status = "UP"
        tags = ["prod", "hive"]

        [[application]]
        id = "hadoop"
        name = "hadoop"
        status = "ACTIVE"
        resources = { setup_file = "/apps/hadoop/setup.sh" }

        [[command]]
        id = "hive"
        name = "hive"
        status = "ACTIVE"
        executable = "hive"
        tags = ["type:hive"]
        cluster_ids = ["c1"]
        application_ids = ["hadoop"]
        "#,
        )
        .unwrap();
        let store = MemoryStore::with_catalog(catalog);
        assert_eq!(store.get_clusters().len(), 1);
        let apps = store.get_applications_for_command(&"hive".into()).unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(
            apps[0].resources.setup_file.as_deref(),
            Some("/apps/hadoop/setup.sh")
        );
    }

    #[test]
    fn test_catalog_with_unknown_cluster() {
        let r = Catalog::parse(
            r#"
        [[command]]
        id = "hive"
        name = "hive"
        status = "ACTIVE"
        executable = "hive"
        cluster_ids = ["missing"]
        "#,
        );
        assert!(matches!(r, Err(GenieError::GenericError(_))));
    }
}
