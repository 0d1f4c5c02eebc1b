//! Provisioned resource records.
//!
//! # Purpose
//! Defines the records the provisioner commits and the identity, federation
//! and evaluation paths read back. Session state (identities, tokens,
//! credentials) is deliberately absent: it never reaches the store.
mod flags;
mod identity;
mod stack;

pub use flags::{FeatureRecord, Project};
pub use identity::{FederatedRole, IdentityPool, IdentityProviderRef, RoleMappings, UserPool, UserPoolClient};
pub use stack::{StackOutputs, StackRecord, StackResources};
