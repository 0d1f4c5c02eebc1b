//! Control-plane HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and defines the shared
//! application state injected into handlers.
//!
//! # Notes
//! Signing keys and the credential master key are generated per process, so
//! tokens and credentials do not survive a restart.
use crate::api;
use crate::clock::Clock;
use crate::config::ControlPlaneConfig;
use crate::flags::{self, FeatureEvaluator};
use crate::identity::{self, IdentityBroker};
use crate::observability;
use crate::provision::{self, Provisioner};
use crate::store::GuestflagStore;
use crate::sts::{self, CredentialFederator};
use anyhow::Context;
use axum::Router;
use axum::routing::{get, post, put};
use guestflag_authz::{TokenSigner, generate_signing_keys};
use rand::RngCore;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_opentelemetry::OpenTelemetrySpanExt;

const MASTER_KEY_LEN: usize = 32;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ControlPlaneConfig>,
    pub store: Arc<dyn GuestflagStore>,
    pub clock: Arc<dyn Clock>,
    pub identity: Arc<IdentityBroker>,
    pub federator: Arc<CredentialFederator>,
    pub evaluator: Arc<FeatureEvaluator>,
    pub provisioner: Arc<Provisioner>,
}

impl AppState {
    /// Wire the four services over one store and clock.
    pub fn build(
        config: ControlPlaneConfig,
        store: Arc<dyn GuestflagStore>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let identity_signer = TokenSigner::new(
            config.identity_issuer(),
            generate_signing_keys().context("generate identity signing keys")?,
        )
        .context("identity signer")?;
        let session_signer = TokenSigner::new(
            config.sts_issuer(),
            generate_signing_keys().context("generate session signing keys")?,
        )
        .context("session signer")?;
        let mut master_key = vec![0u8; MASTER_KEY_LEN];
        rand::thread_rng().fill_bytes(&mut master_key);

        let identity = Arc::new(IdentityBroker::new(
            store.clone(),
            identity_signer.clone(),
            config.identity_ttl,
            config.openid_token_ttl,
            clock.clone(),
        ));
        let federator = Arc::new(CredentialFederator::new(
            store.clone(),
            identity_signer,
            session_signer,
            master_key,
            config.credential_ttl,
            clock.clone(),
        ));
        let evaluator = Arc::new(FeatureEvaluator::new(
            store.clone(),
            federator.clone(),
            config.region.clone(),
            config.account_id.clone(),
            clock.clone(),
        ));
        let provisioner = Arc::new(Provisioner::new(
            store.clone(),
            config.region.clone(),
            config.account_id.clone(),
            clock.clone(),
        ));
        Ok(Self {
            config: Arc::new(config),
            store,
            clock,
            identity,
            federator,
            evaluator,
            provisioner,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            let parent = observability::trace_context_from_headers(request.headers());
            let span = tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            );
            span.set_parent(parent);
            span
        });

    Router::new()
        .route("/v1/system/health", get(api::system::system_health))
        .route("/v1/openapi.json", get(api::system::openapi_document))
        .route("/v1/identity/get-id", post(identity::handlers::issue_identity))
        .route(
            "/v1/identity/open-id-token",
            post(identity::handlers::issue_open_id_token),
        )
        .route(
            "/v1/identity/.well-known/jwks.json",
            get(identity::handlers::identity_jwks),
        )
        .route(
            "/v1/sts/assume-role-with-web-identity",
            post(sts::handlers::assume_role_with_web_identity),
        )
        .route(
            "/v1/flags/projects/:project/evaluations/:feature",
            post(flags::handlers::evaluate_feature),
        )
        .route(
            "/v1/stacks/:stack",
            put(provision::handlers::apply_stack).delete(provision::handlers::teardown_stack),
        )
        .route(
            "/v1/stacks/:stack/outputs",
            get(provision::handlers::stack_outputs),
        )
        .layer(trace_layer)
        .with_state(state)
}
