#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use chrono::{DateTime, Utc};
use controlplane::app::{AppState, build_router};
use controlplane::clock::{Clock, ManualClock};
use controlplane::config::ControlPlaneConfig;
use controlplane::provision::standard::{StandardStackParams, standard_template};
use controlplane::store::GuestflagStore;
use controlplane::store::memory::InMemoryStore;
use guestflag_authz::signing::{
    HEADER_ACCESS_KEY_ID, HEADER_DATE, HEADER_SECURITY_TOKEN, HEADER_SIGNATURE, sign_request,
};
use guestflag_rollout::RolloutPlan;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

pub const REGION: &str = "local-1";

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

pub async fn read_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

/// Template for the standard stack with a single boolean split.
pub fn standard_stack(project: &str, feature: &str, enabled_weight: u32, now: DateTime<Utc>) -> Value {
    let params = StandardStackParams {
        project_name: project.to_string(),
        feature_name: feature.to_string(),
        plan: RolloutPlan::new().boolean_stage(Duration::ZERO, enabled_weight),
        ..StandardStackParams::default()
    };
    serde_json::to_value(standard_template(&params, now).expect("template")).expect("json")
}

pub struct TestApp {
    pub router: Router,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(
            DateTime::from_timestamp(1_700_000_000, 0).expect("timestamp"),
        ));
        let store: Arc<dyn GuestflagStore> = Arc::new(InMemoryStore::new());
        let state = AppState::build(ControlPlaneConfig::default(), store, clock.clone())
            .expect("state");
        Self {
            router: build_router(state),
            clock,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.expect("response")
    }

    /// Apply the standard stack and return its outputs.
    pub async fn apply_stack(&self, stack: &str, template: Value) -> Value {
        let response = self
            .send(json_request("PUT", &format!("/v1/stacks/{stack}"), template))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        read_json(response).await["outputs"].clone()
    }

    /// Walk get-id, open-id-token and assume-role; returns the credentials.
    pub async fn visitor_credentials(&self, pool_id: &str, role_arn: &str) -> Value {
        let token = self.open_id_token(pool_id).await;
        let response = self
            .send(json_request(
                "POST",
                "/v1/sts/assume-role-with-web-identity",
                serde_json::json!({
                    "role_arn": role_arn,
                    "web_identity_token": token,
                }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        read_json(response).await["credentials"].clone()
    }

    pub async fn open_id_token(&self, pool_id: &str) -> String {
        let response = self
            .send(json_request(
                "POST",
                "/v1/identity/get-id",
                serde_json::json!({ "identity_pool_id": pool_id, "region": REGION }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let identity_id = read_json(response).await["identity_id"].clone();

        let response = self
            .send(json_request(
                "POST",
                "/v1/identity/open-id-token",
                serde_json::json!({ "identity_id": identity_id }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        read_json(response).await["token"]
            .as_str()
            .expect("token")
            .to_string()
    }

    /// Signed evaluation request for `entity_id` using `credentials`.
    pub fn evaluation_request(
        &self,
        credentials: &Value,
        project: &str,
        feature: &str,
        entity_id: &str,
    ) -> Request<Body> {
        let path = format!("/v1/flags/projects/{project}/evaluations/{feature}");
        let body = serde_json::json!({ "entity_id": entity_id }).to_string();
        let timestamp = self.clock.now_secs();
        let signature = sign_request(
            credentials["secret_access_key"].as_str().expect("secret"),
            "POST",
            &path,
            timestamp,
            body.as_bytes(),
        )
        .expect("signature");
        Request::builder()
            .method("POST")
            .uri(&path)
            .header("content-type", "application/json")
            .header(
                HEADER_ACCESS_KEY_ID,
                credentials["access_key_id"].as_str().expect("akid"),
            )
            .header(
                HEADER_SECURITY_TOKEN,
                credentials["session_token"].as_str().expect("session token"),
            )
            .header(HEADER_DATE, timestamp.to_string())
            .header(HEADER_SIGNATURE, signature)
            .body(Body::from(body))
            .expect("request")
    }
}
