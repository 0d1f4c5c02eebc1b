use crate::{AuthzError, AuthzResult};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ed25519_dalek::SigningKey as Ed25519SigningKey;
use ed25519_dalek::pkcs8::EncodePrivateKey;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const ED25519_KEY_LEN: usize = 32;

/// Claims of the OpenID token the identity broker issues for an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenIdClaims {
    pub iss: String,
    /// Identity pool id the identity belongs to.
    pub aud: String,
    /// Identity id.
    pub sub: String,
    /// Authentication method references (`unauthenticated` / `authenticated`).
    pub amr: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

/// Claims of the session token handed out with temporary credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub iss: String,
    pub aud: String,
    /// Identity id that assumed the role.
    pub sub: String,
    /// Assumed role resource name.
    pub role: String,
    /// Access key id the session token is bound to.
    pub akid: String,
    pub iat: i64,
    pub exp: i64,
}

pub trait ExpiringClaims {
    fn expires_at(&self) -> i64;
}

impl ExpiringClaims for OpenIdClaims {
    fn expires_at(&self) -> i64 {
        self.exp
    }
}

impl ExpiringClaims for SessionClaims {
    fn expires_at(&self) -> i64 {
        self.exp
    }
}

/// Ed25519 signing key: raw 32-byte seed plus the derived public key.
#[derive(Debug, Clone)]
pub struct SigningKey {
    pub kid: String,
    pub alg: Algorithm,
    pub private_key: [u8; ED25519_KEY_LEN],
    pub public_key: [u8; ED25519_KEY_LEN],
}

impl SigningKey {
    pub fn from_seed(kid: impl Into<String>, seed: [u8; ED25519_KEY_LEN]) -> Self {
        let public_key = Ed25519SigningKey::from_bytes(&seed).verifying_key().to_bytes();
        Self {
            kid: kid.into(),
            alg: Algorithm::EdDSA,
            private_key: seed,
            public_key,
        }
    }

    pub fn validate(&self) -> AuthzResult<()> {
        if self.alg != Algorithm::EdDSA {
            return Err(AuthzError::Key(format!(
                "invalid signing algorithm: {:?}",
                self.alg
            )));
        }
        let expected = Ed25519SigningKey::from_bytes(&self.private_key)
            .verifying_key()
            .to_bytes();
        if expected != self.public_key {
            return Err(AuthzError::Key(
                "Ed25519 public key does not match private seed".to_string(),
            ));
        }
        Ok(())
    }

    fn encoding_key(&self) -> AuthzResult<EncodingKey> {
        // jsonwebtoken wants PKCS8 DER for EdDSA signing.
        let der = Ed25519SigningKey::from_bytes(&self.private_key)
            .to_pkcs8_der()
            .map_err(|err| AuthzError::Key(format!("encode Ed25519 key: {err}")))?;
        Ok(EncodingKey::from_ed_der(der.as_bytes()))
    }

    fn decoding_key(&self) -> AuthzResult<DecodingKey> {
        let x = URL_SAFE_NO_PAD.encode(self.public_key);
        Ok(DecodingKey::from_ed_components(&x)?)
    }
}

/// Current key plus rotated keys still accepted for verification.
#[derive(Debug, Clone)]
pub struct SigningKeys {
    pub current: SigningKey,
    pub previous: Vec<SigningKey>,
}

impl SigningKeys {
    pub fn validate(&self) -> AuthzResult<()> {
        self.current.validate()?;
        for key in &self.previous {
            key.validate()?;
        }
        Ok(())
    }

    pub fn all_keys(&self) -> impl Iterator<Item = &SigningKey> {
        std::iter::once(&self.current).chain(self.previous.iter())
    }
}

/// EdDSA signer/verifier bound to one issuer.
#[derive(Debug, Clone)]
pub struct TokenSigner {
    issuer: String,
    keys: SigningKeys,
}

impl TokenSigner {
    pub fn new(issuer: impl Into<String>, keys: SigningKeys) -> AuthzResult<Self> {
        keys.validate()?;
        Ok(Self {
            issuer: issuer.into(),
            keys,
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn keys(&self) -> &SigningKeys {
        &self.keys
    }

    pub fn sign<C: Serialize>(&self, claims: &C) -> AuthzResult<String> {
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(self.keys.current.kid.clone());
        let encoding_key = self.keys.current.encoding_key()?;
        Ok(jsonwebtoken::encode(&header, claims, &encoding_key)?)
    }

    /// Verify signature, issuer, optional audience, and expiry against `now`.
    ///
    /// Expiry is checked against the caller's clock rather than the system
    /// clock so callers with an injected clock stay consistent.
    pub fn verify<C>(&self, token: &str, audience: Option<&str>, now: i64, leeway: u64) -> AuthzResult<C>
    where
        C: DeserializeOwned + ExpiringClaims,
    {
        let header = jsonwebtoken::decode_header(token)?;
        if header.alg != Algorithm::EdDSA {
            return Err(AuthzError::Jwt(jsonwebtoken::errors::Error::from(
                jsonwebtoken::errors::ErrorKind::InvalidAlgorithm,
            )));
        }

        // Try the key named by `kid` first, then the rest in rotation order.
        let mut ordered: Vec<&SigningKey> = Vec::new();
        if let Some(kid) = header.kid.as_deref() {
            ordered.extend(self.keys.all_keys().filter(|key| key.kid == kid));
        }
        ordered.extend(
            self.keys
                .all_keys()
                .filter(|key| Some(key.kid.as_str()) != header.kid.as_deref()),
        );

        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.validate_exp = false;
        match audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let mut last_err = None;
        for key in ordered {
            let decoding_key = key.decoding_key()?;
            match jsonwebtoken::decode::<C>(token, &decoding_key, &validation) {
                Ok(data) => {
                    if data.claims.expires_at() + leeway as i64 <= now {
                        return Err(AuthzError::Expired);
                    }
                    return Ok(data.claims);
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(AuthzError::Jwt(last_err.unwrap_or_else(|| {
            jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::InvalidToken)
        })))
    }
}
