use thiserror::Error;

use crate::JobId;
use crate::common::error::GenieError::GenericError;
use crate::model::JobStatus;

#[derive(Debug, Error)]
pub enum GenieError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Deserialization error: {0}")]
    DeserializationError(String),
    #[error("Invalid job request: {0}")]
    InvalidRequest(String),
    #[error("Resource selection failed: {0}")]
    ResourceSelectionFailed(String),
    #[error("Job {0} not found")]
    JobNotFound(JobId),
    #[error("Job {0} is not running (status {1})")]
    JobNotRunning(JobId, JobStatus),
    #[error("Job {0} already exists")]
    JobAlreadyExists(JobId),
    #[error("{kind} {id} not found")]
    EntityNotFound { kind: &'static str, id: String },
    #[error("Job {job_id} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        job_id: JobId,
        from: JobStatus,
        to: JobStatus,
    },
    #[error("Job submission rejected: {0}")]
    SubmissionRejected(String),
    #[error("Signal delivery failed: {0}")]
    SignalDeliveryFailed(String),
    #[error("Workflow task `{task}` failed: {message}")]
    PipelineTaskFailed { task: &'static str, message: String },
    #[error("Completion step `{step}` failed: {message}")]
    CompletionStepFailed { step: &'static str, message: String },
    #[error("File transfer error: {0}")]
    FileTransferError(String),
    #[error("Error: {0}")]
    GenericError(String),
}

impl From<serde_json::error::Error> for GenieError {
    fn from(e: serde_json::error::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}

impl From<toml::de::Error> for GenieError {
    fn from(error: toml::de::Error) -> Self {
        Self::DeserializationError(error.to_string())
    }
}

impl From<nix::Error> for GenieError {
    fn from(error: nix::Error) -> Self {
        Self::SignalDeliveryFailed(error.to_string())
    }
}

pub fn error<T>(message: String) -> crate::Result<T> {
    Err(GenericError(message))
}

impl From<String> for GenieError {
    fn from(e: String) -> Self {
        GenericError(e)
    }
}
