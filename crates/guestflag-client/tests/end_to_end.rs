use chrono::Utc;
use controlplane::app::{AppState, build_router};
use controlplane::clock::{Clock, ManualClock};
use controlplane::config::ControlPlaneConfig;
use controlplane::provision::standard::{StandardStackParams, standard_template};
use controlplane::store::GuestflagStore;
use controlplane::store::memory::InMemoryStore;
use guestflag_client::{ChainError, ClientChain, ClientConfig, FlagDecision, HttpServices};
use guestflag_rollout::{Reason, RolloutPlan};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

struct Server {
    endpoint: String,
    clock: Arc<ManualClock>,
    state: AppState,
    task: JoinHandle<()>,
}

impl Drop for Server {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// Request timestamps come from the real clock, so the server clock starts at
// real time and only moves forward by less than the allowed skew.
async fn start_server() -> Server {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store: Arc<dyn GuestflagStore> = Arc::new(InMemoryStore::new());
    let state = AppState::build(ControlPlaneConfig::default(), store, clock.clone()).expect("state");
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = build_router(state.clone());
    let task = tokio::spawn(async move {
        let _ = axum::serve(listener, app.into_make_service()).await;
    });
    Server {
        endpoint: format!("http://{addr}"),
        clock,
        state,
        task,
    }
}

async fn provision(server: &Server, stack: &str, enabled_weight: u32) -> BTreeMap<String, String> {
    let params = StandardStackParams {
        plan: RolloutPlan::new().boolean_stage(Duration::ZERO, enabled_weight),
        ..StandardStackParams::default()
    };
    let template = standard_template(&params, server.clock.now()).expect("template");
    let response = reqwest::Client::new()
        .put(format!("{}/v1/stacks/{stack}", server.endpoint))
        .json(&template)
        .send()
        .await
        .expect("apply");
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);
    let body: serde_json::Value = response.json().await.expect("body");
    serde_json::from_value(body["outputs"].clone()).expect("outputs")
}

fn chain(server: &Server, outputs: &BTreeMap<String, String>) -> ClientChain<HttpServices> {
    let config = ClientConfig::from_stack_outputs(server.endpoint.clone(), "local-1", outputs)
        .expect("config");
    ClientChain::new(config, HttpServices::new(server.endpoint.clone()))
}

#[tokio::test]
async fn visitor_sees_the_first_variation_until_the_split_starts() {
    let server = start_server().await;
    let outputs = provision(&server, "InfraStack", 0).await;
    let chain = chain(&server, &outputs);

    let result = chain.run().await.expect("default");
    assert_eq!(result.reason, Reason::Default);
    assert_eq!(chain.decide().await, FlagDecision::Enabled);

    server.clock.advance(chrono::Duration::seconds(181));
    let result = chain.run().await.expect("split");
    assert_eq!(result.reason, Reason::LaunchRuleMatch);
    assert_eq!(result.launch.as_deref(), Some("TestLaunch"));
    assert_eq!(chain.decide().await, FlagDecision::Disabled);
}

#[tokio::test]
async fn full_weight_split_is_enabled() {
    let server = start_server().await;
    let outputs = provision(&server, "InfraStack", 100_000).await;
    server.clock.advance(chrono::Duration::seconds(181));
    let chain = chain(&server, &outputs);
    let result = chain.run().await.expect("split");
    assert_eq!(result.reason, Reason::LaunchRuleMatch);
    assert_eq!(chain.decide().await, FlagDecision::Enabled);
}

#[tokio::test]
async fn wrong_role_is_a_trust_policy_mismatch() {
    let server = start_server().await;
    let mut outputs = provision(&server, "InfraStack", 50_000).await;
    let authenticated = outputs["RoleArn"].replace("UnauthenticatedRole", "AuthenticatedRole");
    outputs.insert("RoleArn".to_string(), authenticated);

    let chain = chain(&server, &outputs);
    let err = chain.run().await.expect_err("mismatch");
    assert!(matches!(err, ChainError::TrustPolicyMismatch(_)), "{err}");
    assert_eq!(chain.decide().await, FlagDecision::Unknown);
}

#[tokio::test]
async fn unprovisioned_feature_is_denied() {
    let server = start_server().await;
    let mut outputs = provision(&server, "InfraStack", 50_000).await;
    outputs.insert("EvidentlyFeatureName".to_string(), "OtherFeature".to_string());
    let err = chain(&server, &outputs).run().await.expect_err("denied");
    assert!(matches!(err, ChainError::AccessDenied(_)), "{err}");
}

#[tokio::test]
async fn torn_down_stack_fails_at_the_first_hop() {
    let server = start_server().await;
    let outputs = provision(&server, "InfraStack", 50_000).await;
    server
        .state
        .provisioner
        .teardown("InfraStack")
        .await
        .expect("teardown");
    let err = chain(&server, &outputs).run().await.expect_err("gone");
    assert!(matches!(err, ChainError::IdentityService(_)), "{err}");
}

#[tokio::test]
async fn unreachable_endpoint_is_a_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let mut outputs = BTreeMap::new();
    for (key, value) in [
        ("IdentityPoolId", "local-1:pool"),
        ("UserPoolId", "local-1_ABCDEFGHI"),
        ("UserPoolClientId", "client"),
        ("RoleArn", "grn:iam::000000000000:role/r"),
        ("EvidentlyProjectName", "TestProject"),
        ("EvidentlyFeatureName", "TestFeature"),
    ] {
        outputs.insert(key.to_string(), value.to_string());
    }
    let endpoint = format!("http://{addr}");
    let config = ClientConfig::from_stack_outputs(endpoint.clone(), "local-1", &outputs)
        .expect("config");
    let chain = ClientChain::new(config, HttpServices::new(endpoint));
    let err = chain.run().await.expect_err("unreachable");
    assert!(matches!(err, ChainError::Network(_)), "{err}");
}
