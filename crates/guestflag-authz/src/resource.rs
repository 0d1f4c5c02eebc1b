//! Resource name builders for guestflag policies.
//!
//! # Purpose
//! Provides helpers to build and parse canonical resource names (`grn:...`)
//! used in policy documents and role references.
//!
//! # Key invariants
//! - Names have the shape `grn:{service}:{region}:{account}:{path}`; the region
//!   is empty for global services (`iam`).
//! - Project and feature names are always qualified by region and account.
//!
//! # Examples
//! ```rust
//! use guestflag_authz::resource::feature_resource;
//! use guestflag_authz::{AccountId, FeatureName, ProjectName, Region};
//!
//! let name = feature_resource(
//!     &Region::new("local-1"),
//!     &AccountId::new("000000000000"),
//!     &ProjectName::new("TestProject"),
//!     &FeatureName::new("TestFeature"),
//! );
//! assert_eq!(
//!     name.to_string(),
//!     "grn:flags:local-1:000000000000:project/TestProject/feature/TestFeature"
//! );
//! ```
//!
//! # Common pitfalls
//! - Building names with raw `format!` drifts from what the provisioner grants.
use crate::{AccountId, AuthzError, AuthzResult, FeatureName, ProjectName, Region, RoleName};
use serde::{Deserialize, Serialize};

const PREFIX: &str = "grn";

/// Parsed resource name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceName {
    service: String,
    region: String,
    account: String,
    path: String,
}

impl ResourceName {
    pub fn new(
        service: impl Into<String>,
        region: impl Into<String>,
        account: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            region: region.into(),
            account: account.into(),
            path: path.into(),
        }
    }

    /// Parse `grn:{service}:{region}:{account}:{path}`.
    ///
    /// # Errors
    /// - [`AuthzError::InvalidResourceName`] if the prefix, service, account or
    ///   path segment is missing.
    pub fn parse(value: &str) -> AuthzResult<Self> {
        let invalid = || AuthzError::InvalidResourceName(value.to_string());
        let mut parts = value.splitn(5, ':');
        if parts.next() != Some(PREFIX) {
            return Err(invalid());
        }
        let service = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        let region = parts.next().ok_or_else(invalid)?;
        let account = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        let path = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        Ok(Self::new(service, region, account, path))
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Role name for `grn:iam::{account}:role/{name}` resources.
    pub fn role_name(&self) -> Option<RoleName> {
        if self.service != "iam" {
            return None;
        }
        self.path
            .strip_prefix("role/")
            .filter(|name| !name.is_empty() && !name.contains('/'))
            .map(RoleName::new)
    }
}

impl std::fmt::Display for ResourceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{PREFIX}:{}:{}:{}:{}",
            self.service, self.region, self.account, self.path
        )
    }
}

impl std::str::FromStr for ResourceName {
    type Err = AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for ResourceName {
    type Error = AuthzError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ResourceName> for String {
    fn from(value: ResourceName) -> Self {
        value.to_string()
    }
}

/// `grn:flags:{region}:{account}:project/{project}`.
pub fn project_resource(region: &Region, account: &AccountId, project: &ProjectName) -> ResourceName {
    ResourceName::new(
        "flags",
        region.as_str(),
        account.as_str(),
        format!("project/{}", project.as_str()),
    )
}

/// `grn:flags:{region}:{account}:project/{project}/feature/{feature}`.
pub fn feature_resource(
    region: &Region,
    account: &AccountId,
    project: &ProjectName,
    feature: &FeatureName,
) -> ResourceName {
    ResourceName::new(
        "flags",
        region.as_str(),
        account.as_str(),
        format!("project/{}/feature/{}", project.as_str(), feature.as_str()),
    )
}

/// `grn:iam::{account}:role/{role}`; roles are global.
pub fn role_resource(account: &AccountId, role: &RoleName) -> ResourceName {
    ResourceName::new("iam", "", account.as_str(), format!("role/{}", role.as_str()))
}
