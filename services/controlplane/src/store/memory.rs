//! In-memory implementation of the guestflag store.
//!
//! # Purpose
//! Holds provisioned stacks and their resources in `HashMap`s behind a single
//! `tokio::sync::RwLock`. It backs local development, tests and the default
//! deployment, where provisioned state is rebuilt on start.
//!
//! # Durability and consistency
//! - **Not durable**: all state is lost on process restart.
//! - **Atomic stack commits**: all resource maps live under one lock, so a
//!   commit or teardown is observed entirely or not at all. Readers never see
//!   a role without its identity pool or a feature without its project.
//!
//! # Performance characteristics
//! - Reads are concurrent; commits are serialized.
//! - Teardown scans only the resources listed in the stack record.
//!
//! # Metrics
//! Gauges track stack and resource counts after every commit and teardown.
use super::{GuestflagStore, StoreError, StoreResult};
use crate::model::{
    FeatureRecord, FederatedRole, IdentityPool, Project, StackRecord, StackResources, UserPool,
    UserPoolClient,
};
use async_trait::async_trait;
use guestflag_authz::{FeatureName, IdentityPoolId, ProjectName, ResourceName};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct MemoryState {
    stacks: HashMap<String, StackRecord>,
    user_pools: HashMap<String, UserPool>,
    user_pool_clients: HashMap<String, UserPoolClient>,
    identity_pools: HashMap<IdentityPoolId, IdentityPool>,
    /// Keyed by the role's resource name string.
    roles: HashMap<String, FederatedRole>,
    projects: HashMap<ProjectName, Project>,
    features: HashMap<(ProjectName, FeatureName), FeatureRecord>,
}

impl MemoryState {
    fn conflicts(&self, resources: &StackResources) -> Vec<String> {
        let mut conflicts = Vec::new();
        for pool in &resources.user_pools {
            if self.user_pools.contains_key(&pool.id) {
                conflicts.push(format!("user pool {}", pool.id));
            }
        }
        for client in &resources.user_pool_clients {
            if self.user_pool_clients.contains_key(&client.id) {
                conflicts.push(format!("user pool client {}", client.id));
            }
        }
        for pool in &resources.identity_pools {
            if self.identity_pools.contains_key(&pool.id) {
                conflicts.push(format!("identity pool {}", pool.id));
            }
        }
        for role in &resources.roles {
            if self.roles.contains_key(&role.arn.to_string()) {
                conflicts.push(format!("role {}", role.arn));
            }
        }
        for project in &resources.projects {
            if self.projects.contains_key(&project.name) {
                conflicts.push(format!("project {}", project.name));
            }
        }
        for feature in &resources.features {
            if self
                .features
                .contains_key(&(feature.project.clone(), feature.name()))
            {
                conflicts.push(format!("feature {}/{}", feature.project, feature.feature.name));
            }
        }
        conflicts
    }

    fn insert(&mut self, resources: &StackResources) {
        for pool in &resources.user_pools {
            self.user_pools.insert(pool.id.clone(), pool.clone());
        }
        for client in &resources.user_pool_clients {
            self.user_pool_clients.insert(client.id.clone(), client.clone());
        }
        for pool in &resources.identity_pools {
            self.identity_pools.insert(pool.id.clone(), pool.clone());
        }
        for role in &resources.roles {
            self.roles.insert(role.arn.to_string(), role.clone());
        }
        for project in &resources.projects {
            self.projects.insert(project.name.clone(), project.clone());
        }
        for feature in &resources.features {
            self.features
                .insert((feature.project.clone(), feature.name()), feature.clone());
        }
    }

    fn remove(&mut self, resources: &StackResources) {
        for pool in &resources.user_pools {
            self.user_pools.remove(&pool.id);
        }
        for client in &resources.user_pool_clients {
            self.user_pool_clients.remove(&client.id);
        }
        for pool in &resources.identity_pools {
            self.identity_pools.remove(&pool.id);
        }
        for role in &resources.roles {
            self.roles.remove(&role.arn.to_string());
        }
        for project in &resources.projects {
            self.projects.remove(&project.name);
        }
        for feature in &resources.features {
            self.features
                .remove(&(feature.project.clone(), feature.name()));
        }
    }

    fn record_gauges(&self) {
        metrics::gauge!("guestflag_stacks_total").set(self.stacks.len() as f64);
        metrics::gauge!("guestflag_roles_total").set(self.roles.len() as f64);
        metrics::gauge!("guestflag_features_total").set(self.features.len() as f64);
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GuestflagStore for InMemoryStore {
    async fn identity_pool(&self, id: &IdentityPoolId) -> StoreResult<Option<IdentityPool>> {
        Ok(self.state.read().await.identity_pools.get(id).cloned())
    }

    async fn role(&self, arn: &ResourceName) -> StoreResult<Option<FederatedRole>> {
        Ok(self.state.read().await.roles.get(&arn.to_string()).cloned())
    }

    async fn project(&self, name: &ProjectName) -> StoreResult<Option<Project>> {
        Ok(self.state.read().await.projects.get(name).cloned())
    }

    async fn feature(
        &self,
        project: &ProjectName,
        feature: &FeatureName,
    ) -> StoreResult<Option<FeatureRecord>> {
        Ok(self
            .state
            .read()
            .await
            .features
            .get(&(project.clone(), feature.clone()))
            .cloned())
    }

    async fn stack(&self, name: &str) -> StoreResult<Option<StackRecord>> {
        Ok(self.state.read().await.stacks.get(name).cloned())
    }

    async fn name_conflicts(&self, resources: &StackResources) -> StoreResult<Vec<String>> {
        Ok(self.state.read().await.conflicts(resources))
    }

    async fn commit_stack(&self, record: StackRecord) -> StoreResult<StackRecord> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.stacks.get(&record.name) {
            if existing.template == record.template {
                return Ok(existing.clone());
            }
            return Err(StoreError::Conflict(format!(
                "stack {} exists with a different template",
                record.name
            )));
        }
        let conflicts = state.conflicts(&record.resources);
        if !conflicts.is_empty() {
            return Err(StoreError::Conflict(conflicts.join(", ")));
        }
        state.insert(&record.resources);
        state.stacks.insert(record.name.clone(), record.clone());
        state.record_gauges();
        Ok(record)
    }

    async fn delete_stack(&self, name: &str) -> StoreResult<StackRecord> {
        let mut state = self.state.write().await;
        let Some(record) = state.stacks.remove(name) else {
            return Err(StoreError::NotFound(name.to_string()));
        };
        state.remove(&record.resources);
        state.record_gauges();
        Ok(record)
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
