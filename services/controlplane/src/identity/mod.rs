//! Anonymous identity broker.
//!
//! # Purpose
//! Issues anonymous identities scoped to one identity pool and OpenID-style
//! tokens for them. The tokens are what the credential federator accepts as
//! web identity.
//!
//! # Key invariants
//! - Identities are never written to the store; they live in a `DashMap` for
//!   their TTL and are pruned lazily.
//! - Every call produces a fresh identity or token; nothing is cached.
//! - Tokens carry `aud` = pool id, `sub` = identity id and an `amr` list with
//!   the identity's authentication class.
//!
//! # Security considerations
//! - Tokens are never logged.
pub mod handlers;

use crate::clock::Clock;
use crate::store::{GuestflagStore, StoreError};
use dashmap::DashMap;
use guestflag_authz::{
    AuthenticationClass, AuthzError, IdentityId, IdentityPoolId, Jwks, OpenIdClaims, Region,
    TokenSigner,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity service error: {0}")]
    ServiceError(String),
    #[error("token issuance error: {0}")]
    TokenIssuance(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to sign token: {0}")]
    Signing(#[source] AuthzError),
}

#[derive(Debug, Clone)]
struct IssuedIdentity {
    pool: IdentityPoolId,
    class: AuthenticationClass,
    expires_at: i64,
}

/// A signed OpenID token and the identity it was issued for.
#[derive(Clone)]
pub struct OpenIdToken {
    pub identity_id: IdentityId,
    pub token: String,
    pub expires_at: i64,
}

impl std::fmt::Debug for OpenIdToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenIdToken")
            .field("identity_id", &self.identity_id)
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

pub struct IdentityBroker {
    store: Arc<dyn GuestflagStore>,
    signer: TokenSigner,
    identities: DashMap<IdentityId, IssuedIdentity>,
    identity_ttl: Duration,
    token_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl IdentityBroker {
    pub fn new(
        store: Arc<dyn GuestflagStore>,
        signer: TokenSigner,
        identity_ttl: Duration,
        token_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            signer,
            identities: DashMap::new(),
            identity_ttl,
            token_ttl,
            clock,
        }
    }

    /// Signer whose keys verify the tokens this broker issues.
    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    pub fn jwks(&self) -> Jwks {
        Jwks::from_keys(self.signer.keys())
    }

    pub async fn issue_identity(
        &self,
        pool_id: &IdentityPoolId,
        region: &Region,
    ) -> Result<IdentityId, IdentityError> {
        let Some(pool) = self.store.identity_pool(pool_id).await? else {
            return Err(IdentityError::ServiceError(format!(
                "identity pool {pool_id} not found"
            )));
        };
        if &pool.region != region {
            return Err(IdentityError::ServiceError(format!(
                "identity pool {pool_id} is not in region {region}"
            )));
        }
        if !pool.allow_unauthenticated {
            return Err(IdentityError::ServiceError(format!(
                "identity pool {pool_id} does not allow unauthenticated identities"
            )));
        }

        let now = self.clock.now_secs();
        self.prune_expired(now);
        let identity_id = IdentityId::generate(&pool.region);
        self.identities.insert(
            identity_id.clone(),
            IssuedIdentity {
                pool: pool.id,
                class: AuthenticationClass::Unauthenticated,
                expires_at: now + self.identity_ttl.as_secs() as i64,
            },
        );
        metrics::counter!("guestflag_identities_issued_total").increment(1);
        tracing::info!(
            identity_pool_id = %pool_id,
            identity_id = %identity_id,
            "anonymous identity issued"
        );
        Ok(identity_id)
    }

    pub async fn issue_open_id_token(
        &self,
        identity_id: &IdentityId,
    ) -> Result<OpenIdToken, IdentityError> {
        let now = self.clock.now_secs();
        let Some(identity) = self
            .identities
            .get(identity_id)
            .map(|entry| entry.value().clone())
        else {
            return Err(IdentityError::TokenIssuance(format!(
                "identity {identity_id} not found"
            )));
        };
        if identity.expires_at <= now {
            self.identities.remove(identity_id);
            return Err(IdentityError::TokenIssuance(format!(
                "identity {identity_id} has expired"
            )));
        }
        if self.store.identity_pool(&identity.pool).await?.is_none() {
            self.identities.remove(identity_id);
            return Err(IdentityError::TokenIssuance(format!(
                "identity pool {} no longer exists",
                identity.pool
            )));
        }

        let expires_at = now + self.token_ttl.as_secs() as i64;
        let claims = OpenIdClaims {
            iss: self.signer.issuer().to_string(),
            aud: identity.pool.to_string(),
            sub: identity_id.to_string(),
            amr: vec![identity.class.amr_claim().to_string()],
            iat: now,
            exp: expires_at,
        };
        let token = self.signer.sign(&claims).map_err(IdentityError::Signing)?;
        metrics::counter!("guestflag_tokens_issued_total").increment(1);
        tracing::info!(identity_id = %identity_id, expires_at, "open id token issued");
        Ok(OpenIdToken {
            identity_id: identity_id.clone(),
            token,
            expires_at,
        })
    }

    fn prune_expired(&self, now: i64) {
        let before = self.identities.len();
        self.identities.retain(|_, identity| identity.expires_at > now);
        let pruned = before.saturating_sub(self.identities.len());
        if pruned > 0 {
            tracing::debug!(pruned, "expired identities pruned");
        }
    }

    #[cfg(test)]
    fn tracked_identities(&self) -> usize {
        self.identities.len()
    }
}
