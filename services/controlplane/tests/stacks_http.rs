mod common;

use axum::http::StatusCode;
use common::{TestApp, empty_request, json_request, read_json, standard_stack};
use controlplane::clock::Clock;

#[tokio::test]
async fn apply_is_idempotent_and_conflicts_on_a_different_template() {
    let app = TestApp::new();
    let template = standard_stack("TestProject", "TestFeature", 50_000, app.clock.now());
    let outputs = app.apply_stack("InfraStack", template.clone()).await;
    for key in [
        "UserPoolId",
        "UserPoolClientId",
        "IdentityPoolId",
        "EvidentlyProjectName",
        "EvidentlyFeatureName",
        "RoleArn",
    ] {
        assert!(outputs[key].is_string(), "{key} missing");
    }

    let response = app
        .send(json_request("PUT", "/v1/stacks/InfraStack", template))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["created"], false);
    assert_eq!(body["outputs"], outputs);

    let changed = standard_stack("TestProject", "TestFeature", 10_000, app.clock.now());
    let response = app
        .send(json_request("PUT", "/v1/stacks/InfraStack", changed))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(read_json(response).await["code"], "conflict");
}

#[tokio::test]
async fn second_stack_reusing_a_project_name_collides() {
    let app = TestApp::new();
    let template = standard_stack("TestProject", "TestFeature", 50_000, app.clock.now());
    app.apply_stack("InfraStack", template.clone()).await;

    let response = app
        .send(json_request("PUT", "/v1/stacks/OtherStack", template))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = read_json(response).await;
    assert!(body["message"].as_str().expect("message").contains("TestProject"));
}

#[tokio::test]
async fn outputs_and_teardown_round_trip() {
    let app = TestApp::new();
    let template = standard_stack("TestProject", "TestFeature", 50_000, app.clock.now());
    let outputs = app.apply_stack("InfraStack", template.clone()).await;

    let response = app
        .send(empty_request("GET", "/v1/stacks/InfraStack/outputs"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["outputs"], outputs);

    let response = app.send(empty_request("DELETE", "/v1/stacks/InfraStack")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .send(empty_request("GET", "/v1/stacks/InfraStack/outputs"))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = app.send(empty_request("DELETE", "/v1/stacks/InfraStack")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Names are free again once the stack is gone.
    app.apply_stack("OtherStack", template).await;
}

#[tokio::test]
async fn identities_stop_working_after_teardown() {
    let app = TestApp::new();
    let template = standard_stack("TestProject", "TestFeature", 50_000, app.clock.now());
    let outputs = app.apply_stack("InfraStack", template).await;
    let response = app.send(empty_request("DELETE", "/v1/stacks/InfraStack")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .send(json_request(
            "POST",
            "/v1/identity/get-id",
            serde_json::json!({
                "identity_pool_id": outputs["IdentityPoolId"],
                "region": "local-1",
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_stack_name_and_wildcard_policy_are_rejected() {
    let app = TestApp::new();
    let template = standard_stack("TestProject", "TestFeature", 50_000, app.clock.now());
    let response = app
        .send(json_request("PUT", "/v1/stacks/9lives", template.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["code"], "validation_error");

    let text = template.to_string().replace(
        r#"{"GetAtt":["EvidentlyFeature","Arn"]}"#,
        r#""grn:flags:local-1:000000000000:project/*""#,
    );
    let widened: serde_json::Value = serde_json::from_str(&text).expect("json");
    assert_ne!(widened, template);
    let response = app
        .send(json_request("PUT", "/v1/stacks/InfraStack", widened))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn names_that_cannot_be_addressed_are_rejected_without_side_effects() {
    let app = TestApp::new();
    for (project, feature) in [
        ("Test Project", "TestFeature"),
        ("P/feature/F", "TestFeature"),
        ("TestProject", "a b"),
    ] {
        let template = standard_stack(project, feature, 100_000, app.clock.now());
        let response = app
            .send(json_request("PUT", "/v1/stacks/InfraStack", template))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{project}/{feature}");
        assert_eq!(read_json(response).await["code"], "validation_error");
    }

    let response = app
        .send(empty_request("GET", "/v1/stacks/InfraStack/outputs"))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let template = standard_stack("TestProject", "TestFeature", 100_000, app.clock.now());
    app.apply_stack("InfraStack", template).await;
}
