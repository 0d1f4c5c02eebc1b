use crate::SigningKeys;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

/// Public Ed25519 key in JWK (OKP) form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub kid: String,
    pub alg: String,
    #[serde(rename = "use")]
    pub use_field: String,
    pub crv: String,
    pub x: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

impl Jwks {
    /// Public halves of every key, current first. Seeds never leave here.
    pub fn from_keys(keys: &SigningKeys) -> Self {
        Self {
            keys: keys
                .all_keys()
                .map(|key| Jwk {
                    kty: "OKP".to_string(),
                    kid: key.kid.clone(),
                    alg: "EdDSA".to_string(),
                    use_field: "sig".to_string(),
                    crv: "Ed25519".to_string(),
                    x: URL_SAFE_NO_PAD.encode(key.public_key),
                })
                .collect(),
        }
    }
}
