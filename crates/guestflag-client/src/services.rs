//! The four service operations the chain calls, and their HTTP transport.
//!
//! # Key invariants
//! - Each call is a single request; there are no retries.
//! - The evaluation request is signed with the temporary credentials over the
//!   exact bytes sent.
//!
//! # Security considerations
//! - Tokens and secrets are never logged; `Debug` output redacts them.
use crate::error::{ChainError, ChainResult, Stage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use guestflag_authz::signing::{
    HEADER_ACCESS_KEY_ID, HEADER_DATE, HEADER_SECURITY_TOKEN, HEADER_SIGNATURE, sign_request,
};
use guestflag_rollout::{Reason, VariationValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

#[derive(Clone, Deserialize)]
pub struct OpenIdToken {
    pub identity_id: String,
    pub token: String,
}

impl fmt::Debug for OpenIdToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenIdToken")
            .field("identity_id", &self.identity_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Deserialize)]
pub struct TemporaryCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime<Utc>,
}

impl fmt::Debug for TemporaryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemporaryCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .field("expiration", &self.expiration)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EvaluationResult {
    pub variation: String,
    pub value: VariationValue,
    pub reason: Reason,
    pub launch: Option<String>,
}

#[async_trait]
pub trait VisitorServices: Send + Sync {
    async fn get_id(&self, identity_pool_id: &str, region: &str) -> ChainResult<String>;

    async fn get_open_id_token(&self, identity_id: &str) -> ChainResult<OpenIdToken>;

    async fn assume_role_with_web_identity(
        &self,
        role_arn: &str,
        web_identity_token: &str,
    ) -> ChainResult<TemporaryCredentials>;

    async fn evaluate_feature(
        &self,
        credentials: &TemporaryCredentials,
        project: &str,
        feature: &str,
        entity_id: &str,
    ) -> ChainResult<EvaluationResult>;
}

#[derive(Deserialize)]
struct IdentityBody {
    identity_id: String,
}

#[derive(Deserialize)]
struct CredentialsEnvelope {
    credentials: TemporaryCredentials,
}

/// [`VisitorServices`] over the control-plane HTTP API.
#[derive(Debug, Clone)]
pub struct HttpServices {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpServices {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        stage: Stage,
        path: &str,
        body: serde_json::Value,
    ) -> ChainResult<T> {
        let response = self
            .client
            .post(format!("{}{path}", self.endpoint))
            .json(&body)
            .send()
            .await?;
        decode(stage, response).await
    }
}

async fn decode<T: DeserializeOwned>(stage: Stage, response: reqwest::Response) -> ChainResult<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let bytes = response.bytes().await?;
    Err(ChainError::from_response(stage, status, &bytes))
}

#[async_trait]
impl VisitorServices for HttpServices {
    async fn get_id(&self, identity_pool_id: &str, region: &str) -> ChainResult<String> {
        let body: IdentityBody = self
            .post_json(
                Stage::Identity,
                "/v1/identity/get-id",
                json!({ "identity_pool_id": identity_pool_id, "region": region }),
            )
            .await?;
        Ok(body.identity_id)
    }

    async fn get_open_id_token(&self, identity_id: &str) -> ChainResult<OpenIdToken> {
        self.post_json(
            Stage::OpenIdToken,
            "/v1/identity/open-id-token",
            json!({ "identity_id": identity_id }),
        )
        .await
    }

    async fn assume_role_with_web_identity(
        &self,
        role_arn: &str,
        web_identity_token: &str,
    ) -> ChainResult<TemporaryCredentials> {
        let envelope: CredentialsEnvelope = self
            .post_json(
                Stage::Credentials,
                "/v1/sts/assume-role-with-web-identity",
                json!({ "role_arn": role_arn, "web_identity_token": web_identity_token }),
            )
            .await?;
        Ok(envelope.credentials)
    }

    async fn evaluate_feature(
        &self,
        credentials: &TemporaryCredentials,
        project: &str,
        feature: &str,
        entity_id: &str,
    ) -> ChainResult<EvaluationResult> {
        let path = format!("/v1/flags/projects/{project}/evaluations/{feature}");
        let body = json!({ "entity_id": entity_id }).to_string();
        let timestamp = Utc::now().timestamp();
        let signature = sign_request(
            &credentials.secret_access_key,
            "POST",
            &path,
            timestamp,
            body.as_bytes(),
        )
        .map_err(|err| ChainError::AccessDenied(format!("cannot sign request: {err}")))?;

        let response = self
            .client
            .post(format!("{}{path}", self.endpoint))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(HEADER_ACCESS_KEY_ID, &credentials.access_key_id)
            .header(HEADER_SECURITY_TOKEN, &credentials.session_token)
            .header(HEADER_DATE, timestamp.to_string())
            .header(HEADER_SIGNATURE, signature)
            .body(body)
            .send()
            .await?;
        decode(Stage::Evaluation, response).await
    }
}
