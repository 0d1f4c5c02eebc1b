//! Trust-graph provisioning.
//!
//! # Purpose
//! Applies declarative stack templates: identity pool, user pool and client,
//! the two federated roles with trust conditions and least-privilege
//! policies, the role attachment, and the project/feature/launch resources.
//!
//! # How it fits
//! `PUT /v1/stacks/{stack}` hands a template to [`Provisioner::apply`]. The
//! identity broker, credential federator and feature evaluator only ever read
//! what a successful apply committed.
//!
//! # Key invariants
//! - Apply is all-or-nothing: the template is ordered, materialized and
//!   validated in full before a single store commit.
//! - Re-applying the same template under the same name is a no-op that
//!   returns the original outputs.
//! - Teardown removes every resource the stack created.
pub mod graph;
pub mod handlers;
mod materialize;
pub mod standard;
pub mod template;
mod validate;

use crate::clock::Clock;
use crate::model::{StackOutputs, StackRecord};
use crate::store::{GuestflagStore, StoreError};
use guestflag_authz::{AccountId, AuthzError, Region};
use guestflag_rollout::RolloutError;
use graph::ResourceGraph;
use std::sync::Arc;
use template::StackTemplate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("invalid stack name: {0}")]
    InvalidStackName(String),
    #[error("duplicate logical id {0}")]
    DuplicateLogicalId(String),
    #[error("{from} references undeclared resource {to}")]
    DanglingReference { from: String, to: String },
    #[error("resource graph has a cycle through {}", .0.join(", "))]
    Cycle(Vec<String>),
    #[error("invalid resource {logical_id}: {reason}")]
    InvalidResource { logical_id: String, reason: String },
    #[error("{resource}: {source}")]
    Authz {
        resource: String,
        #[source]
        source: AuthzError,
    },
    #[error("{resource}: {source}")]
    Rollout {
        resource: String,
        #[source]
        source: RolloutError,
    },
    #[error("resource names already in use: {}", .0.join(", "))]
    NameCollision(Vec<String>),
    #[error("stack conflict: {0}")]
    StackConflict(String),
    #[error("stack {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ProvisionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(message) => ProvisionError::StackConflict(message),
            StoreError::NotFound(message) => ProvisionError::NotFound(message),
            other => ProvisionError::Store(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub outputs: StackOutputs,
    /// False when an identical template was already applied.
    pub created: bool,
}

#[derive(Clone)]
pub struct Provisioner {
    store: Arc<dyn GuestflagStore>,
    region: Region,
    account_id: AccountId,
    clock: Arc<dyn Clock>,
}

impl Provisioner {
    pub fn new(
        store: Arc<dyn GuestflagStore>,
        region: Region,
        account_id: AccountId,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            region,
            account_id,
            clock,
        }
    }

    pub async fn apply(
        &self,
        stack_name: &str,
        template: StackTemplate,
    ) -> Result<ApplyOutcome, ProvisionError> {
        validate_stack_name(stack_name)?;

        if let Some(existing) = self.store.stack(stack_name).await? {
            if existing.template == template {
                tracing::info!(stack = %stack_name, "stack already applied");
                return Ok(ApplyOutcome {
                    outputs: existing.outputs,
                    created: false,
                });
            }
            return Err(ProvisionError::StackConflict(format!(
                "stack {stack_name} exists with a different template"
            )));
        }

        let order = ResourceGraph::build(&template)?.apply_order()?;
        let now = self.clock.now();
        let materialized = materialize::materialize(
            &template,
            &order,
            stack_name,
            &self.region,
            &self.account_id,
            now,
        )?;
        validate::validate_resources(&materialized.resources)?;

        let conflicts = self.store.name_conflicts(&materialized.resources).await?;
        if !conflicts.is_empty() {
            return Err(ProvisionError::NameCollision(conflicts));
        }

        let resource_count = materialized.resources.count();
        let record = self
            .store
            .commit_stack(StackRecord {
                name: stack_name.to_string(),
                template,
                resources: materialized.resources,
                outputs: materialized.outputs,
                applied_at: now,
            })
            .await?;

        metrics::counter!("guestflag_stack_applies_total").increment(1);
        tracing::info!(
            stack = %stack_name,
            resources = resource_count,
            "stack applied"
        );
        Ok(ApplyOutcome {
            outputs: record.outputs,
            created: true,
        })
    }

    pub async fn outputs(&self, stack_name: &str) -> Result<StackOutputs, ProvisionError> {
        self.store
            .stack(stack_name)
            .await?
            .map(|record| record.outputs)
            .ok_or_else(|| ProvisionError::NotFound(stack_name.to_string()))
    }

    pub async fn teardown(&self, stack_name: &str) -> Result<StackRecord, ProvisionError> {
        let record = self.store.delete_stack(stack_name).await?;
        tracing::info!(
            stack = %stack_name,
            resources = record.resources.count(),
            "stack torn down"
        );
        Ok(record)
    }
}

fn validate_stack_name(name: &str) -> Result<(), ProvisionError> {
    let valid = !name.is_empty()
        && name.len() <= 128
        && name.starts_with(|c: char| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ProvisionError::InvalidStackName(name.to_string()))
    }
}
