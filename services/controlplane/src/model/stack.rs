use super::{FeatureRecord, FederatedRole, IdentityPool, Project, UserPool, UserPoolClient};
use crate::provision::template::StackTemplate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type StackOutputs = BTreeMap<String, String>;

/// Every concrete resource a stack owns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackResources {
    pub user_pools: Vec<UserPool>,
    pub user_pool_clients: Vec<UserPoolClient>,
    pub identity_pools: Vec<IdentityPool>,
    pub roles: Vec<FederatedRole>,
    pub projects: Vec<Project>,
    pub features: Vec<FeatureRecord>,
}

impl StackResources {
    pub fn count(&self) -> usize {
        self.user_pools.len()
            + self.user_pool_clients.len()
            + self.identity_pools.len()
            + self.roles.len()
            + self.projects.len()
            + self.features.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackRecord {
    pub name: String,
    pub template: StackTemplate,
    pub resources: StackResources,
    pub outputs: StackOutputs,
    pub applied_at: DateTime<Utc>,
}
