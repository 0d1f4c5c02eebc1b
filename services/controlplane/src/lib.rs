//! Guestflag control-plane library crate.
//!
//! # Purpose
//! Exposes the anonymous visitor chain (identity broker, credential
//! federator, feature evaluator), the trust-graph provisioner, configuration
//! and storage for use by the binary and tests.
//!
//! # Notes
//! Each service module owns its HTTP handlers; `app` only composes routes.
pub mod api;
pub mod app;
pub mod clock;
pub mod config;
pub mod flags;
pub mod identity;
pub mod model;
pub mod observability;
pub mod provision;
pub mod store;
pub mod sts;

#[cfg(test)]
pub(crate) mod testing;
