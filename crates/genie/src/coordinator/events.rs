use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::JobId;

/// Signal that a job will not make any further progress and should be finalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFinished {
    pub job_id: JobId,
    /// Process that was running the job, `None` if the job never started a process
    pub process_id: Option<u32>,
}

pub type FinishedReceiver = UnboundedReceiver<JobFinished>;

/// Publishing side of the finished-job channel.
#[derive(Clone)]
pub struct FinishedNotifier {
    sender: UnboundedSender<JobFinished>,
}

impl FinishedNotifier {
    pub fn notify(&self, job_id: JobId, process_id: Option<u32>) {
        log::debug!("Job {job_id} finished (pid {process_id:?})");
        if self
            .sender
            .send(JobFinished { job_id, process_id })
            .is_err()
        {
            log::error!("Finished job signal could not be delivered, completion handler is gone");
        }
    }
}

pub fn finished_channel() -> (FinishedNotifier, FinishedReceiver) {
    let (sender, receiver) = unbounded_channel();
    (FinishedNotifier { sender }, receiver)
}
