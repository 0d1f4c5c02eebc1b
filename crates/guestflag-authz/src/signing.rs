//! HMAC request signing with temporary credentials.
//!
//! # Purpose
//! Signs and verifies HTTP requests made with role-scoped temporary
//! credentials. The client signs with its secret access key; the server
//! re-derives the same secret from the access key id and its master key, so no
//! credential table is needed.
//!
//! # Key invariants
//! - The canonical request covers method, path, timestamp and the SHA-256 of
//!   the body. Changing any of them invalidates the signature.
//! - Timestamps outside [`MAX_CLOCK_SKEW_SECS`] of the server clock are
//!   rejected.
//! - Signatures are compared in constant time via `Mac::verify_slice`.
//!
//! # Security considerations
//! - Secrets and signatures must never be logged.
use crate::{AuthzError, AuthzResult};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNING_ALGORITHM: &str = "GF-HMAC-SHA256";
pub const HEADER_ACCESS_KEY_ID: &str = "x-guestflag-access-key-id";
pub const HEADER_SECURITY_TOKEN: &str = "x-guestflag-security-token";
pub const HEADER_DATE: &str = "x-guestflag-date";
pub const HEADER_SIGNATURE: &str = "x-guestflag-signature";
pub const MAX_CLOCK_SKEW_SECS: i64 = 300;

/// Secret access key for `access_key_id`, derived from the server master key.
pub fn derive_secret(master_key: &[u8], access_key_id: &str) -> AuthzResult<String> {
    let mut mac = HmacSha256::new_from_slice(master_key)
        .map_err(|err| AuthzError::Key(format!("invalid master key: {err}")))?;
    mac.update(b"guestflag-credential/");
    mac.update(access_key_id.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn canonical_request(method: &str, path: &str, timestamp: i64, body: &[u8]) -> String {
    let body_digest = hex::encode(Sha256::digest(body));
    format!(
        "{SIGNING_ALGORITHM}\n{}\n{path}\n{timestamp}\n{body_digest}",
        method.to_ascii_uppercase()
    )
}

pub fn sign_request(
    secret: &str,
    method: &str,
    path: &str,
    timestamp: i64,
    body: &[u8],
) -> AuthzResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|err| AuthzError::Key(format!("invalid secret: {err}")))?;
    mac.update(canonical_request(method, path, timestamp, body).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a request signature and its timestamp against `now`.
pub fn verify_request(
    secret: &str,
    signature: &str,
    method: &str,
    path: &str,
    timestamp: i64,
    body: &[u8],
    now: i64,
) -> AuthzResult<()> {
    if (now - timestamp).abs() > MAX_CLOCK_SKEW_SECS {
        return Err(AuthzError::Signature(
            "request timestamp outside allowed skew".to_string(),
        ));
    }
    let expected = hex::decode(signature)
        .map_err(|_| AuthzError::Signature("signature is not hex".to_string()))?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|err| AuthzError::Key(format!("invalid secret: {err}")))?;
    mac.update(canonical_request(method, path, timestamp, body).as_bytes());
    mac.verify_slice(&expected)
        .map_err(|_| AuthzError::Signature("signature mismatch".to_string()))
}
