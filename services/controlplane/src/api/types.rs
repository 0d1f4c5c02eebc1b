//! HTTP API request/response types.
//!
//! # Purpose
//! Defines the wire shapes of the identity, federation, evaluation and stack
//! endpoints and feeds OpenAPI schema generation. Identifiers travel as plain
//! strings here and are converted to typed ids in the handlers.
use chrono::{DateTime, Utc};
use guestflag_authz::{Jwk, Jwks};
use guestflag_rollout::{Assignment, Reason, VariationValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct HealthStatus {
    pub status: String,
    pub store: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub request_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct IssueIdentityRequest {
    pub identity_pool_id: String,
    pub region: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct IssueIdentityResponse {
    pub identity_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct OpenIdTokenRequest {
    pub identity_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct OpenIdTokenResponse {
    pub identity_id: String,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct JwkBody {
    pub kty: String,
    pub kid: String,
    pub alg: String,
    #[serde(rename = "use")]
    pub use_field: String,
    pub crv: String,
    pub x: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct JwksResponse {
    pub keys: Vec<JwkBody>,
}

impl From<Jwks> for JwksResponse {
    fn from(jwks: Jwks) -> Self {
        Self {
            keys: jwks
                .keys
                .into_iter()
                .map(|Jwk { kty, kid, alg, use_field, crv, x }| JwkBody {
                    kty,
                    kid,
                    alg,
                    use_field,
                    crv,
                    x,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct AssumeRoleWithWebIdentityRequest {
    pub role_arn: String,
    pub web_identity_token: String,
    #[serde(default)]
    pub role_session_name: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Clone)]
pub struct CredentialsBody {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime<Utc>,
}

impl std::fmt::Debug for CredentialsBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsBody")
            .field("access_key_id", &self.access_key_id)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct AssumeRoleWithWebIdentityResponse {
    pub credentials: CredentialsBody,
    pub subject_from_web_identity_token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct EvaluateFeatureRequest {
    pub entity_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct EvaluateFeatureResponse {
    pub variation: String,
    /// Typed value, e.g. `{"boolValue": true}`.
    #[schema(value_type = Object)]
    pub value: VariationValue,
    #[schema(value_type = String, example = "LAUNCH_RULE_MATCH")]
    pub reason: Reason,
    pub launch: Option<String>,
}

impl From<Assignment> for EvaluateFeatureResponse {
    fn from(assignment: Assignment) -> Self {
        Self {
            variation: assignment.variation,
            value: assignment.value,
            reason: assignment.reason,
            launch: assignment.launch,
        }
    }
}

/// Documented shape of a stack template body.
#[derive(Debug, ToSchema)]
pub struct StackTemplateBody {
    /// `{logical_id, properties: {type, ...}}` entries.
    #[schema(value_type = Vec<Object>)]
    pub resources: Vec<serde_json::Value>,
    /// `{name, value}` entries; values may be `{"Ref": id}` or `{"GetAtt": [id, attr]}`.
    #[schema(value_type = Vec<Object>)]
    pub outputs: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct StackApplyResponse {
    pub stack: String,
    /// False when an identical template was already applied.
    pub created: bool,
    pub outputs: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct StackOutputsResponse {
    pub stack: String,
    pub outputs: BTreeMap<String, String>,
}
