//! Client side of the guestflag anonymous visitor chain.
//!
//! # Purpose
//! Turns an anonymous visitor into a feature decision without a login: an
//! identity from the identity pool, an OpenID token for it, temporary
//! credentials for the pool's unauthenticated role, then a signed evaluation
//! of one feature.
//!
//! # How it fits
//! The control plane serves the four operations; [`HttpServices`] calls them
//! over HTTP and [`ClientChain`] sequences them. Tests substitute their own
//! [`VisitorServices`].
//!
//! # Examples
//! ```rust,no_run
//! use guestflag_client::{ClientChain, ClientConfig, FlagDecision, HttpServices};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = ClientConfig::from_env_or_yaml(None)?;
//! let services = HttpServices::new(config.endpoint.clone());
//! let chain = ClientChain::new(config, services);
//! if chain.decide().await == FlagDecision::Enabled {
//!     println!("show the new banner");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Common pitfalls
//! - Project and feature names must match the provisioned stack; build the
//!   config with [`ClientConfig::from_stack_outputs`] when possible.
mod chain;
mod config;
mod error;
mod services;

pub use chain::{ClientChain, ENTITY_ID, FlagDecision};
pub use config::{ClientConfig, DEFAULT_ENDPOINT, DEFAULT_REGION, DEFAULT_TIMEOUT_MS};
pub use error::{ChainError, ChainResult, Stage};
pub use services::{
    EvaluationResult, HttpServices, OpenIdToken, TemporaryCredentials, VisitorServices,
};
