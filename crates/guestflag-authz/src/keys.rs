//! Signing key generation for guestflag tokens.
//!
//! # Purpose
//! Produce Ed25519 signing key sets for the identity broker (OpenID tokens)
//! and the credential federator (session tokens).
//!
//! # Key invariants
//! - Keys are always Ed25519; the private key is a raw 32-byte seed and the
//!   public key is derived from it.
//! - Key ids are random and not secret.
use crate::{AuthzResult, SigningKey, SigningKeys};
use rand::RngCore;

/// Generate a fresh key set with one current key and no rotated keys.
pub fn generate_signing_keys() -> AuthzResult<SigningKeys> {
    let mut seed = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut seed);

    let mut kid_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut kid_bytes);

    let keys = SigningKeys {
        current: SigningKey::from_seed(hex::encode(kid_bytes), seed),
        previous: Vec::new(),
    };
    keys.validate()?;
    Ok(keys)
}
