pub mod context;
pub mod pipeline;
pub mod tasks;

pub use context::{EnvMap, JobExecutionContext};
pub use pipeline::{WorkflowPipeline, WorkflowTask};
