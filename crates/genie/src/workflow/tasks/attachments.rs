use std::sync::Arc;

use crate::common::error::GenieError;
use crate::common::fsutils::{GENIE_DIR, RUN_SCRIPT};
use crate::services::FileTransfer;
use crate::workflow::{JobExecutionContext, WorkflowTask};

/// Downloads the attachments of the request into the job directory.
/// Existing files are overwritten, so the task can be repeated.
pub struct AttachmentTask {
    transfer: Arc<dyn FileTransfer>,
}

impl AttachmentTask {
    pub fn new(transfer: Arc<dyn FileTransfer>) -> Self {
        Self { transfer }
    }
}

fn check_attachment_name(name: &str) -> crate::Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name == GENIE_DIR
        || name == RUN_SCRIPT
    {
        return Err(GenieError::InvalidRequest(format!(
            "Invalid attachment name `{name}`"
        )));
    }
    Ok(())
}

impl WorkflowTask for AttachmentTask {
    fn name(&self) -> &'static str {
        "attachments"
    }

    fn execute(&self, ctx: &mut JobExecutionContext) -> crate::Result<()> {
        for attachment in &ctx.request.attachments {
            check_attachment_name(&attachment.name)?;
            let target = ctx.job_dir.join(&attachment.name);
            self.transfer.get_file(&attachment.uri, &target)?;
        }
        log::debug!(
            "Job {}: staged {} attachment(s)",
            ctx.job_id(),
            ctx.request.attachments.len()
        );
        Ok(())
    }
}
