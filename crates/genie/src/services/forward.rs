use crate::JobId;
use crate::common::error::GenieError;

/// Reaches the node that runs a job in order to kill it there.
pub trait KillForwarder: Send + Sync {
    fn forward_kill(&self, host_name: &str, job_id: &JobId) -> crate::Result<()>;
}

/// Used by single node deployments, every forwarding attempt fails.
#[derive(Default, Debug, Clone)]
pub struct NoKillForwarder;

impl KillForwarder for NoKillForwarder {
    fn forward_kill(&self, host_name: &str, job_id: &JobId) -> crate::Result<()> {
        Err(GenieError::SignalDeliveryFailed(format!(
            "Job {job_id} runs on host {host_name} and kill forwarding is not configured"
        )))
    }
}
