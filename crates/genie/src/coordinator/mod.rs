pub mod balancer;
pub mod completion;
pub mod coordinate;
pub mod events;
pub mod kill;
pub mod matcher;
pub mod node;
pub mod submitter;

pub use balancer::{ClusterLoadBalancer, RandomClusterLoadBalancer};
pub use completion::{CompletionReport, CompletionStep, JobCompletionHandler, StepOutcome};
pub use coordinate::{JobCoordinator, ResourceSelection};
pub use events::{FinishedNotifier, JobFinished, finished_channel};
pub use kill::{JobKillService, KillOutcome};
pub use matcher::{CriteriaMatch, NoMatchFound, resolve};
pub use node::{Collaborators, GenieNode};
pub use submitter::{JobSubmitter, LocalJobSubmitter};
