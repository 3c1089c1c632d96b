use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::common::env::{GENIE_APPLICATION_DIR, GENIE_CLUSTER_DIR, GENIE_COMMAND_DIR};
use crate::common::error::GenieError;
use crate::common::fsutils::file_name_from_uri;
use crate::model::ExecutionResources;
use crate::services::FileTransfer;
use crate::workflow::{JobExecutionContext, WorkflowTask};

const CONFIG_DIR: &str = "config";
const DEPENDENCIES_DIR: &str = "dependencies";

/// Stages the setup files, configs and dependencies of the cluster, the command,
/// its applications and the request into `genie/`.
///
/// Layout:
/// - `genie/cluster/<cluster id>/`
/// - `genie/command/<command id>/`
/// - `genie/applications/<application id>/`
/// - `genie/job/` for the setup file of the request
pub struct SetupTask {
    transfer: Arc<dyn FileTransfer>,
}

impl SetupTask {
    pub fn new(transfer: Arc<dyn FileTransfer>) -> Self {
        Self { transfer }
    }

    fn fetch(&self, uri: &str, dir: &Path) -> crate::Result<PathBuf> {
        let name = file_name_from_uri(uri).ok_or_else(|| {
            GenieError::FileTransferError(format!("Cannot derive a file name from {uri}"))
        })?;
        let target = dir.join(name);
        self.transfer.get_file(uri, &target)?;
        Ok(target)
    }

    /// Returns the staged setup file, if there is one.
    fn stage(
        &self,
        resources: &ExecutionResources,
        dir: &Path,
    ) -> crate::Result<Option<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        for config in &resources.configs {
            self.fetch(config, &dir.join(CONFIG_DIR))?;
        }
        for dependency in &resources.dependencies {
            self.fetch(dependency, &dir.join(DEPENDENCIES_DIR))?;
        }
        resources
            .setup_file
            .as_deref()
            .map(|uri| self.fetch(uri, dir))
            .transpose()
    }
}

impl WorkflowTask for SetupTask {
    fn name(&self) -> &'static str {
        "setup"
    }

    fn execute(&self, ctx: &mut JobExecutionContext) -> crate::Result<()> {
        let genie_dir = ctx.genie_dir();
        let mut setup_files = Vec::new();

        let cluster_dir = genie_dir.join("cluster").join(ctx.cluster.id.as_str());
        setup_files.extend(self.stage(&ctx.cluster.resources, &cluster_dir)?);

        let command_dir = genie_dir.join("command").join(ctx.command.id.as_str());
        setup_files.extend(self.stage(&ctx.command.resources, &command_dir)?);

        let applications_dir = genie_dir.join("applications");
        for application in &ctx.applications {
            let dir = applications_dir.join(application.id.as_str());
            setup_files.extend(self.stage(&application.resources, &dir)?);
        }

        if let Some(uri) = &ctx.request.setup_file {
            let dir = genie_dir.join("job");
            std::fs::create_dir_all(&dir)?;
            setup_files.push(self.fetch(uri, &dir)?);
        }

        ctx.set_env(GENIE_CLUSTER_DIR, cluster_dir.display().to_string());
        ctx.set_env(GENIE_COMMAND_DIR, command_dir.display().to_string());
        ctx.set_env(GENIE_APPLICATION_DIR, applications_dir.display().to_string());
        ctx.setup_files = setup_files;
        Ok(())
    }
}
