pub mod common;
pub mod coordinator;
pub mod model;
pub mod services;
pub mod workflow;

#[cfg(test)]
pub(crate) mod tests;

pub type Error = crate::common::error::GenieError;
pub type Result<T> = std::result::Result<T, Error>;

pub use common::{ApplicationId, ClusterId, CommandId, JobId};

pub type Map<K, V> = std::collections::HashMap<K, V>;
pub type Set<T> = std::collections::BTreeSet<T>;

pub const GENIE_VERSION: &str = env!("CARGO_PKG_VERSION");
