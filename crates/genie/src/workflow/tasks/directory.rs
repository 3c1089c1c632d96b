use crate::common::env::{
    GENIE_CLUSTER_ID, GENIE_CLUSTER_NAME, GENIE_COMMAND_ID, GENIE_COMMAND_NAME, GENIE_JOB_CPU,
    GENIE_JOB_DIR, GENIE_JOB_ID, GENIE_JOB_MEMORY, GENIE_JOB_NAME, GENIE_JOB_VERSION,
    GENIE_REQUESTED_CLUSTER_TAGS, GENIE_REQUESTED_COMMAND_TAGS, GENIE_USER, GENIE_USER_GROUP,
    GENIE_VERSION,
};
use crate::common::fsutils::LOGS_DIR;
use crate::model::Criterion;
use crate::workflow::{JobExecutionContext, WorkflowTask};

fn joined_tags(criterion: &Criterion) -> String {
    criterion
        .tags
        .iter()
        .map(|tag| tag.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// Creates the job directory with its internal subdirectories and
/// fills in the environment describing the job.
pub struct JobDirectoryTask;

impl WorkflowTask for JobDirectoryTask {
    fn name(&self) -> &'static str {
        "job directory"
    }

    fn execute(&self, ctx: &mut JobExecutionContext) -> crate::Result<()> {
        std::fs::create_dir_all(ctx.genie_dir().join(LOGS_DIR))?;

        let job_dir = ctx.job_dir.display().to_string();
        ctx.set_env(GENIE_JOB_ID, ctx.job.id.to_string());
        ctx.set_env(GENIE_JOB_NAME, ctx.job.name.clone());
        ctx.set_env(GENIE_JOB_DIR, job_dir);
        ctx.set_env(GENIE_USER, ctx.job.user.clone());
        ctx.set_env(GENIE_JOB_VERSION, ctx.job.version.clone());
        ctx.set_env(GENIE_VERSION, crate::GENIE_VERSION);
        if let Some(group) = ctx.request.group.clone() {
            ctx.set_env(GENIE_USER_GROUP, group);
        }
        if let Some(cpu) = ctx.request.cpu {
            ctx.set_env(GENIE_JOB_CPU, cpu.to_string());
        }
        if let Some(memory) = ctx.request.memory {
            ctx.set_env(GENIE_JOB_MEMORY, memory.to_string());
        }
        ctx.set_env(GENIE_CLUSTER_ID, ctx.cluster.id.to_string());
        ctx.set_env(GENIE_CLUSTER_NAME, ctx.cluster.name.clone());
        ctx.set_env(GENIE_COMMAND_ID, ctx.command.id.to_string());
        ctx.set_env(GENIE_COMMAND_NAME, ctx.command.name.clone());
        let cluster_tags = joined_tags(&ctx.job.chosen_criteria.cluster_criterion);
        let command_tags = joined_tags(&ctx.job.chosen_criteria.command_criterion);
        ctx.set_env(GENIE_REQUESTED_CLUSTER_TAGS, cluster_tags);
        ctx.set_env(GENIE_REQUESTED_COMMAND_TAGS, command_tags);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::JobDirectoryTask;
    use crate::common::env::{GENIE_JOB_DIR, GENIE_JOB_ID, GENIE_JOB_MEMORY, GENIE_USER_GROUP};
    use crate::tests::utils::create_context;
    use crate::workflow::WorkflowTask;

    #[test]
    fn test_creates_directories_and_env() {
        let dir = TempDir::with_prefix("genie").unwrap();
        let mut ctx = create_context(dir.path(), "job1");
        ctx.request.memory = Some(1024);
        JobDirectoryTask.execute(&mut ctx).unwrap();
        // Running twice is harmless
        JobDirectoryTask.execute(&mut ctx).unwrap();

        assert!(dir.path().join("job1/genie/logs").is_dir());
        assert_eq!(ctx.env[GENIE_JOB_ID], "job1");
        assert_eq!(
            ctx.env[GENIE_JOB_DIR],
            dir.path().join("job1").display().to_string()
        );
        assert_eq!(ctx.env[GENIE_JOB_MEMORY], "1024");
        assert!(!ctx.env.contains_key(GENIE_USER_GROUP));
    }
}
