//! Web-identity credential federation.
//!
//! # Purpose
//! Exchanges an identity-broker OpenID token for temporary credentials scoped
//! to one federated role, and authenticates requests signed with those
//! credentials.
//!
//! # Key invariants
//! - The token's signature, issuer and expiry are checked against the
//!   broker's keys before the role's trust condition is evaluated.
//! - A token is accepted only if `aud` equals the role's trusted pool id and
//!   `amr` contains the role's authentication class.
//! - Credentials are never stored: the secret is re-derived from the access
//!   key id and the master key, and the session token carries the role.
//! - Credentials never outlive the web identity token that produced them.
//!
//! # Security considerations
//! - Secrets, tokens and signatures are never logged.
//! - Signature comparison is constant time.
pub mod handlers;

use crate::clock::Clock;
use crate::store::{GuestflagStore, StoreError};
use chrono::{DateTime, Utc};
use guestflag_authz::signing::{derive_secret, verify_request};
use guestflag_authz::{AuthzError, OpenIdClaims, ResourceName, SessionClaims, TokenSigner};
use rand::RngCore;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Audience of session tokens; the feature evaluator is the only consumer.
pub const SESSION_AUDIENCE: &str = "flags";
pub const ACCESS_KEY_PREFIX: &str = "GFTA";
const SESSION_NAME_MAX_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum FederationError {
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("invalid web identity token: {0}")]
    InvalidToken(String),
    #[error("trust policy mismatch: {0}")]
    TrustPolicyMismatch(String),
    #[error("invalid request: {0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("credential minting failed: {0}")]
    Internal(#[source] AuthzError),
}

#[derive(Clone, PartialEq, Eq)]
pub struct TemporaryCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime<Utc>,
}

impl std::fmt::Debug for TemporaryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemporaryCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

/// Credentials plus the identity they were issued to.
#[derive(Debug, Clone)]
pub struct FederatedSession {
    pub credentials: TemporaryCredentials,
    pub subject: String,
}

/// The parts of an HTTP request covered by the credential signature.
#[derive(Debug, Clone, Copy)]
pub struct SignedRequest<'a> {
    pub access_key_id: &'a str,
    pub session_token: &'a str,
    pub timestamp: i64,
    pub signature: &'a str,
    pub method: &'a str,
    pub path: &'a str,
    pub body: &'a [u8],
}

pub struct CredentialFederator {
    store: Arc<dyn GuestflagStore>,
    identity_verifier: TokenSigner,
    session_signer: TokenSigner,
    master_key: Vec<u8>,
    credential_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl CredentialFederator {
    pub fn new(
        store: Arc<dyn GuestflagStore>,
        identity_verifier: TokenSigner,
        session_signer: TokenSigner,
        master_key: Vec<u8>,
        credential_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            identity_verifier,
            session_signer,
            master_key,
            credential_ttl,
            clock,
        }
    }

    pub async fn exchange_for_credentials(
        &self,
        role_arn: &str,
        web_identity_token: &str,
        session_name: Option<&str>,
    ) -> Result<FederatedSession, FederationError> {
        if let Some(name) = session_name {
            validate_session_name(name)?;
        }
        let arn = ResourceName::parse(role_arn)
            .map_err(|_| FederationError::AccessDenied(format!("role {role_arn} not found")))?;
        let Some(role) = self.store.role(&arn).await? else {
            return Err(FederationError::AccessDenied(format!("role {arn} not found")));
        };

        let now = self.clock.now_secs();
        let claims: OpenIdClaims = self
            .identity_verifier
            .verify(web_identity_token, None, now, 0)
            .map_err(|err| match err {
                AuthzError::Expired => FederationError::InvalidToken("token has expired".to_string()),
                _ => FederationError::InvalidToken("token verification failed".to_string()),
            })?;

        if let Err(err) = role.trust.condition.evaluate(&claims) {
            metrics::counter!("guestflag_trust_rejections_total").increment(1);
            tracing::warn!(
                role = %arn,
                subject = %claims.sub,
                error = %err,
                "web identity rejected by trust policy"
            );
            return Err(FederationError::TrustPolicyMismatch(err.to_string()));
        }

        let mut key_bytes = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut key_bytes);
        let access_key_id = format!("{ACCESS_KEY_PREFIX}{}", hex::encode_upper(key_bytes));
        let secret_access_key =
            derive_secret(&self.master_key, &access_key_id).map_err(FederationError::Internal)?;

        let expires_at = (now + self.credential_ttl.as_secs() as i64).min(claims.exp);
        let session = SessionClaims {
            iss: self.session_signer.issuer().to_string(),
            aud: SESSION_AUDIENCE.to_string(),
            sub: claims.sub.clone(),
            role: arn.to_string(),
            akid: access_key_id.clone(),
            iat: now,
            exp: expires_at,
        };
        let session_token = self
            .session_signer
            .sign(&session)
            .map_err(FederationError::Internal)?;
        let expiration = DateTime::<Utc>::from_timestamp(expires_at, 0)
            .ok_or_else(|| FederationError::Validation("expiry out of range".to_string()))?;

        metrics::counter!("guestflag_credentials_issued_total").increment(1);
        tracing::info!(
            role = %arn,
            subject = %claims.sub,
            access_key_id = %access_key_id,
            session_name = session_name.unwrap_or_default(),
            expires_at,
            "temporary credentials issued"
        );
        Ok(FederatedSession {
            credentials: TemporaryCredentials {
                access_key_id,
                secret_access_key,
                session_token,
                expiration,
            },
            subject: claims.sub,
        })
    }

    /// Verify the session token and the request signature made with it.
    ///
    /// Returns the session claims; the caller authorizes against the role's
    /// current policy.
    pub fn authenticate(&self, request: &SignedRequest<'_>) -> Result<SessionClaims, FederationError> {
        let now = self.clock.now_secs();
        let claims: SessionClaims = self
            .session_signer
            .verify(request.session_token, Some(SESSION_AUDIENCE), now, 0)
            .map_err(|err| match err {
                AuthzError::Expired => {
                    FederationError::AccessDenied("credentials have expired".to_string())
                }
                _ => FederationError::AccessDenied("invalid session token".to_string()),
            })?;
        if claims.akid != request.access_key_id {
            return Err(FederationError::AccessDenied(
                "session token does not belong to access key".to_string(),
            ));
        }
        let secret =
            derive_secret(&self.master_key, request.access_key_id).map_err(FederationError::Internal)?;
        verify_request(
            &secret,
            request.signature,
            request.method,
            request.path,
            request.timestamp,
            request.body,
            now,
        )
        .map_err(|err| FederationError::AccessDenied(err.to_string()))?;
        Ok(claims)
    }
}

fn validate_session_name(name: &str) -> Result<(), FederationError> {
    let valid = (2..=SESSION_NAME_MAX_LEN).contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_+=,.@-".contains(c));
    if valid {
        Ok(())
    } else {
        Err(FederationError::Validation(format!(
            "invalid role session name {name:?}"
        )))
    }
}
