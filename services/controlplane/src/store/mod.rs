//! Storage for provisioned resources.
//!
//! # Purpose
//! Abstracts where stacks and their resources live. The only backend is the
//! in-memory store; handlers and services depend on the trait.
//!
//! # Key invariants
//! - A stack commit is all-or-nothing: either every resource of the stack is
//!   visible or none is.
//! - Resource names are unique across stacks (roles, identity pools,
//!   projects, features).
use crate::model::{FeatureRecord, FederatedRole, IdentityPool, Project, StackRecord, StackResources};
use async_trait::async_trait;
use guestflag_authz::{FeatureName, IdentityPoolId, ProjectName, ResourceName};
use thiserror::Error;

pub mod memory;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait GuestflagStore: Send + Sync {
    async fn identity_pool(&self, id: &IdentityPoolId) -> StoreResult<Option<IdentityPool>>;
    async fn role(&self, arn: &ResourceName) -> StoreResult<Option<FederatedRole>>;
    async fn project(&self, name: &ProjectName) -> StoreResult<Option<Project>>;
    async fn feature(
        &self,
        project: &ProjectName,
        feature: &FeatureName,
    ) -> StoreResult<Option<FeatureRecord>>;

    async fn stack(&self, name: &str) -> StoreResult<Option<StackRecord>>;
    /// Names in `resources` already owned by another stack.
    async fn name_conflicts(&self, resources: &StackResources) -> StoreResult<Vec<String>>;
    /// Commit a whole stack atomically. Re-committing an identical template
    /// returns the stored record.
    async fn commit_stack(&self, record: StackRecord) -> StoreResult<StackRecord>;
    async fn delete_stack(&self, name: &str) -> StoreResult<StackRecord>;

    async fn health_check(&self) -> StoreResult<()>;
    fn backend_name(&self) -> &'static str;
}
