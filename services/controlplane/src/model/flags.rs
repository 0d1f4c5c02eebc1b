use chrono::{DateTime, Utc};
use guestflag_authz::{FeatureName, ProjectName, ResourceName};
use guestflag_rollout::{Feature, Launch};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub name: ProjectName,
    pub arn: ResourceName,
}

/// A feature, the launch targeting it (if any), and when it was provisioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub project: ProjectName,
    pub arn: ResourceName,
    pub feature: Feature,
    pub launch: Option<Launch>,
    pub provisioned_at: DateTime<Utc>,
}

impl FeatureRecord {
    pub fn name(&self) -> FeatureName {
        FeatureName::new(self.feature.name.clone())
    }
}
