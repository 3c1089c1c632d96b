use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{ApplicationId, ClusterId, CommandId, Set};

/// A set of required tags. A candidate matches if its tags are a superset.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Criterion {
    #[serde(default)]
    pub tags: Set<String>,
}

impl Criterion {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(|t| t.into()).collect(),
        }
    }

    /// Criterion without tags, matches every active candidate.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn is_satisfied_by(&self, tags: &Set<String>) -> bool {
        self.tags.is_subset(tags)
    }
}

impl Display for Criterion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (index, tag) in self.tags.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{tag}")?;
        }
        write!(f, "}}")
    }
}

/// Entities that can be chosen by criteria matching.
pub trait Tagged {
    fn entity_id(&self) -> &str;
    fn tags(&self) -> &Set<String>;
    fn is_active(&self) -> bool;
}

/// Files staged into the job directory before launch.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ExecutionResources {
    /// Script sourced by the launch script before the command runs
    #[serde(default)]
    pub setup_file: Option<String>,
    #[serde(default)]
    pub configs: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterStatus {
    Up,
    OutOfService,
    Terminated,
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandStatus {
    Active,
    Deprecated,
    Inactive,
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Active,
    Deprecated,
    Inactive,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Cluster {
    pub id: ClusterId,
    pub name: String,
    pub status: ClusterStatus,
    #[serde(default)]
    pub tags: Set<String>,
    #[serde(default)]
    pub resources: ExecutionResources,
}

impl Tagged for Cluster {
    fn entity_id(&self) -> &str {
        self.id.as_str()
    }

    fn tags(&self) -> &Set<String> {
        &self.tags
    }

    fn is_active(&self) -> bool {
        self.status == ClusterStatus::Up
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Command {
    pub id: CommandId,
    pub name: String,
    pub status: CommandStatus,
    /// Program started by the launch script, may contain arguments
    pub executable: String,
    #[serde(default)]
    pub tags: Set<String>,
    #[serde(default)]
    pub cluster_ids: Set<ClusterId>,
    /// Applications in the order their setup files are sourced
    #[serde(default)]
    pub application_ids: Vec<ApplicationId>,
    #[serde(default)]
    pub resources: ExecutionResources,
}

impl Command {
    pub fn is_linked_to(&self, cluster_id: &ClusterId) -> bool {
        self.cluster_ids.contains(cluster_id)
    }
}

impl Tagged for Command {
    fn entity_id(&self) -> &str {
        self.id.as_str()
    }

    fn tags(&self) -> &Set<String> {
        &self.tags
    }

    fn is_active(&self) -> bool {
        self.status == CommandStatus::Active
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Application {
    pub id: ApplicationId,
    pub name: String,
    pub status: ApplicationStatus,
    #[serde(default)]
    pub tags: Set<String>,
    #[serde(default)]
    pub resources: ExecutionResources,
}

impl Tagged for Application {
    fn entity_id(&self) -> &str {
        self.id.as_str()
    }

    fn tags(&self) -> &Set<String> {
        &self.tags
    }

    fn is_active(&self) -> bool {
        self.status == ApplicationStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::Criterion;
    use crate::Set;

    #[test]
    fn test_empty_criterion_matches_everything() {
        assert!(Criterion::any().is_satisfied_by(&Set::new()));
        assert!(Criterion::any().is_satisfied_by(&["a".to_string()].into()));
    }

    #[test]
    fn test_tags_are_case_sensitive() {
        let criterion = Criterion::new(["Prod"]);
        let tags: Set<String> = ["prod".to_string()].into();
        assert!(!criterion.is_satisfied_by(&tags));
    }

    #[test]
    fn test_display_criterion() {
        assert_eq!(Criterion::new(["b", "a"]).to_string(), "{a, b}");
        assert_eq!(Criterion::any().to_string(), "{}");
    }
}
