pub mod config;
pub mod env;
pub mod error;
pub mod fsutils;
pub mod ids;
pub mod setup;

pub use ids::{ApplicationId, ClusterId, CommandId, JobId};
