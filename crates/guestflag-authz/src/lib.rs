//! Guestflag identity, trust, and policy primitives shared by the control plane
//! and the client chain.
//!
//! # Purpose
//! Centralizes the identifiers, resource names, policy documents, trust
//! conditions, and EdDSA token helpers that make up the federation chain
//! (anonymous identity, OpenID token, role-scoped credentials).
//!
//! # How it fits
//! The control plane mints OpenID and session tokens and evaluates trust and
//! policy documents; the provisioner builds policies and trust conditions from
//! the same types so both sides agree on formats.
//!
//! # Key invariants
//! - Tokens are EdDSA/Ed25519 only; RSA/HS algorithms are rejected.
//! - A trust condition matches only when `aud` equals the identity pool id and
//!   `amr` contains the role's authentication class.
//! - Least-privilege policies name exact resources; wildcards are rejected at
//!   provisioning time.
//!
//! # Examples
//! ```rust
//! use guestflag_authz::{Action, PolicyDocument, PolicyStatement};
//!
//! let policy = PolicyDocument::new(vec![PolicyStatement::allow(
//!     vec![Action::EvaluateFeature],
//!     vec!["grn:flags:local-1:000000000000:project/TestProject".to_string()],
//! )]);
//! assert!(policy.allows(
//!     Action::EvaluateFeature,
//!     "grn:flags:local-1:000000000000:project/TestProject"
//! ));
//! ```
//!
//! # Common pitfalls
//! - Evaluating a policy against a resource built by hand instead of the
//!   helpers in [`resource`] drifts from the provisioned names.

mod action;
mod errors;
mod jwks;
mod keys;
mod matcher;
mod policy;
pub mod resource;
pub mod signing;
mod token;
mod trust;
mod types;

pub use action::Action;
pub use errors::{AuthzError, AuthzResult};
pub use jwks::{Jwk, Jwks};
pub use keys::generate_signing_keys;
pub use matcher::{ResourcePattern, wildcard_match};
pub use policy::{Effect, PolicyDocument, PolicyStatement};
pub use resource::ResourceName;
pub use token::{
    ExpiringClaims, OpenIdClaims, SessionClaims, SigningKey, SigningKeys, TokenSigner,
};
pub use trust::{
    AuthenticationClass, FederatedTrust, IDENTITY_FEDERATED_PRINCIPAL, TrustCondition,
};
pub use types::{
    AccountId, EntityId, FeatureName, IdentityId, IdentityPoolId, ProjectName, Region, RoleName,
};
