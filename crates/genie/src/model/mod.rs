pub mod job;
pub mod resources;

pub use job::{
    Attachment, ChosenCriteria, Job, JobDoneFile, JobExecution, JobRequest, JobStatus,
};
pub use resources::{
    Application, ApplicationStatus, Cluster, ClusterStatus, Command, CommandStatus, Criterion,
    ExecutionResources, Tagged,
};
