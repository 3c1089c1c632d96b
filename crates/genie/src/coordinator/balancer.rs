use rand::seq::IndexedRandom;

use crate::common::error::GenieError;
use crate::model::Cluster;

/// Policy choosing one cluster out of the clusters that matched a job's criteria.
pub trait ClusterLoadBalancer: Send + Sync {
    /// `clusters` is never empty when called by the coordinator.
    fn select_cluster<'a>(&self, clusters: &[&'a Cluster]) -> crate::Result<&'a Cluster>;
}

/// Picks a uniformly random cluster.
#[derive(Default, Debug, Clone)]
pub struct RandomClusterLoadBalancer;

impl ClusterLoadBalancer for RandomClusterLoadBalancer {
    fn select_cluster<'a>(&self, clusters: &[&'a Cluster]) -> crate::Result<&'a Cluster> {
        clusters.choose(&mut rand::rng()).copied().ok_or_else(|| {
            GenieError::ResourceSelectionFailed(
                "load balancer received no clusters to choose from".to_string(),
            )
        })
    }
}
