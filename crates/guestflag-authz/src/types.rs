//! Strongly typed identifiers for the federation chain.
//!
//! # Purpose
//! Wraps string identifiers so an identity id cannot be passed where a pool id
//! is expected, and a project name cannot be confused with a feature name.
//!
//! # Key invariants
//! - The inner string is preserved exactly; `Display` and `as_str` return it.
//! - Identity pool and identity ids are region-qualified (`{region}:{uuid}`).
//!
//! # Examples
//! ```rust
//! use guestflag_authz::{IdentityPoolId, Region};
//!
//! let region = Region::new("local-1");
//! let pool = IdentityPoolId::generate(&region);
//! assert_eq!(pool.region(), Some("local-1"));
//! ```
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Deployment region (for example `local-1`).
    Region
);
string_id!(
    /// Twelve-digit account owning role and flag resources.
    AccountId
);
string_id!(
    /// Identity pool id, `{region}:{uuid}`.
    IdentityPoolId
);
string_id!(
    /// Anonymous identity id, `{region}:{uuid}`. Never persisted.
    IdentityId
);
string_id!(ProjectName);
string_id!(FeatureName);
string_id!(
    /// Entity evaluated against a feature; the client uses one fixed literal.
    EntityId
);
string_id!(RoleName);

fn region_prefix(value: &str) -> Option<&str> {
    value
        .split_once(':')
        .map(|(region, _)| region)
        .filter(|region| !region.is_empty())
}

impl IdentityPoolId {
    /// Mint a fresh pool id in `region`.
    pub fn generate(region: &Region) -> Self {
        Self(format!("{}:{}", region.as_str(), Uuid::new_v4()))
    }

    /// Region encoded in the id, if the id is well formed.
    pub fn region(&self) -> Option<&str> {
        region_prefix(&self.0)
    }
}

impl IdentityId {
    /// Mint a fresh identity id in `region`.
    pub fn generate(region: &Region) -> Self {
        Self(format!("{}:{}", region.as_str(), Uuid::new_v4()))
    }

    pub fn region(&self) -> Option<&str> {
        region_prefix(&self.0)
    }
}
