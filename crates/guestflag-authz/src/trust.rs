//! Federated trust conditions for role assumption.
//!
//! # Purpose
//! Models the trust statement of a federated role: which principal may assume
//! it, with which action, and under which claim condition.
//!
//! # Key invariants
//! - `aud` must equal the identity pool id exactly (no pattern matching).
//! - `amr` must contain the role's authentication class claim.
//! - The action is always `sts:AssumeRoleWithWebIdentity`.
use crate::{Action, AuthzError, AuthzResult, IdentityPoolId, OpenIdClaims};
use serde::{Deserialize, Serialize};

/// Principal name identity-broker tokens are federated through.
pub const IDENTITY_FEDERATED_PRINCIPAL: &str = "identity.guestflag";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationClass {
    Authenticated,
    Unauthenticated,
}

impl AuthenticationClass {
    pub fn amr_claim(self) -> &'static str {
        match self {
            AuthenticationClass::Authenticated => "authenticated",
            AuthenticationClass::Unauthenticated => "unauthenticated",
        }
    }
}

impl std::fmt::Display for AuthenticationClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.amr_claim())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustCondition {
    pub audience: IdentityPoolId,
    pub amr: AuthenticationClass,
}

impl TrustCondition {
    pub fn new(audience: IdentityPoolId, amr: AuthenticationClass) -> Self {
        Self { audience, amr }
    }

    pub fn evaluate(&self, claims: &OpenIdClaims) -> AuthzResult<()> {
        if claims.aud != self.audience.as_str() {
            return Err(AuthzError::TrustConditionUnmet(
                "token audience does not match identity pool".to_string(),
            ));
        }
        if !claims.amr.iter().any(|value| value == self.amr.amr_claim()) {
            return Err(AuthzError::TrustConditionUnmet(format!(
                "token amr does not include {}",
                self.amr
            )));
        }
        Ok(())
    }
}

/// Trust statement bound to the identity federated principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederatedTrust {
    pub principal: String,
    pub action: Action,
    pub condition: TrustCondition,
}

impl FederatedTrust {
    pub fn web_identity(condition: TrustCondition) -> Self {
        Self {
            principal: IDENTITY_FEDERATED_PRINCIPAL.to_string(),
            action: Action::AssumeRoleWithWebIdentity,
            condition,
        }
    }

    /// Structural checks applied before a role is provisioned.
    pub fn validate(&self) -> AuthzResult<()> {
        if self.principal != IDENTITY_FEDERATED_PRINCIPAL {
            return Err(AuthzError::InvalidPolicy(format!(
                "unsupported federated principal {}",
                self.principal
            )));
        }
        if self.action != Action::AssumeRoleWithWebIdentity {
            return Err(AuthzError::InvalidPolicy(format!(
                "trust statement must grant {}, got {}",
                Action::AssumeRoleWithWebIdentity,
                self.action
            )));
        }
        if self.condition.audience.region().is_none() {
            return Err(AuthzError::InvalidPolicy(format!(
                "trust audience {} is not an identity pool id",
                self.condition.audience
            )));
        }
        Ok(())
    }
}
