//! Feature evaluation with temporary credentials.
//!
//! # Purpose
//! Serves `EvaluateFeature`: authenticates the signed request, authorizes the
//! evaluate action on the project and the feature against the assumed role's
//! current inline policy, then picks a variation from the launch's active
//! split.
//!
//! # Key invariants
//! - Authorization happens before existence checks, so a caller without
//!   access cannot probe which projects or features exist.
//! - The policy is read from the store on every call; edits to a role take
//!   effect for credentials already issued.
//! - Results are never cached.
pub mod handlers;

use crate::clock::Clock;
use crate::store::{GuestflagStore, StoreError};
use crate::sts::{CredentialFederator, FederationError, SignedRequest};
use guestflag_authz::resource::{feature_resource, project_resource};
use guestflag_authz::{AccountId, Action, EntityId, FeatureName, ProjectName, Region, ResourceName};
use guestflag_rollout::{Assignment, RolloutError, assign};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Federation(#[from] FederationError),
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("{0}")]
    NotFound(String),
    #[error("feature cannot be evaluated: {0}")]
    Rollout(#[from] RolloutError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct FeatureEvaluator {
    store: Arc<dyn GuestflagStore>,
    federator: Arc<CredentialFederator>,
    region: Region,
    account_id: AccountId,
    clock: Arc<dyn Clock>,
}

impl FeatureEvaluator {
    pub fn new(
        store: Arc<dyn GuestflagStore>,
        federator: Arc<CredentialFederator>,
        region: Region,
        account_id: AccountId,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            federator,
            region,
            account_id,
            clock,
        }
    }

    pub async fn evaluate(
        &self,
        project: &ProjectName,
        feature: &FeatureName,
        entity_id: &EntityId,
        request: &SignedRequest<'_>,
    ) -> Result<Assignment, EvaluationError> {
        let session = self.federator.authenticate(request)?;
        let role_arn = ResourceName::parse(&session.role)
            .map_err(|_| EvaluationError::AccessDenied("session role is malformed".to_string()))?;
        let Some(role) = self.store.role(&role_arn).await? else {
            return Err(EvaluationError::AccessDenied(format!(
                "role {role_arn} no longer exists"
            )));
        };

        let project_arn = project_resource(&self.region, &self.account_id, project);
        let feature_arn = feature_resource(&self.region, &self.account_id, project, feature);
        for resource in [&project_arn, &feature_arn] {
            if !role
                .policy
                .allows(Action::EvaluateFeature, &resource.to_string())
            {
                tracing::warn!(
                    role = %role_arn,
                    resource = %resource,
                    "evaluate denied by role policy"
                );
                return Err(EvaluationError::AccessDenied(format!(
                    "{} is not allowed to evaluate {resource}",
                    role.name
                )));
            }
        }

        if self.store.project(project).await?.is_none() {
            return Err(EvaluationError::NotFound(format!("project {project} not found")));
        }
        let Some(record) = self.store.feature(project, feature).await? else {
            return Err(EvaluationError::NotFound(format!(
                "feature {feature} not found in project {project}"
            )));
        };

        let assignment = assign(
            &record.feature,
            record.launch.as_ref(),
            entity_id.as_str(),
            record.provisioned_at,
            self.clock.now(),
        )?;
        metrics::counter!(
            "guestflag_evaluations_total",
            "variation" => assignment.variation.clone()
        )
        .increment(1);
        tracing::info!(
            project = %project,
            feature = %feature,
            entity_id = %entity_id,
            variation = %assignment.variation,
            reason = ?assignment.reason,
            "feature evaluated"
        );
        Ok(assignment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::testing::{provisioned_store, test_keys, test_now};
    use crate::model::{FederatedRole, StackRecord, StackResources};
    use crate::provision::template::StackTemplate;
    use guestflag_authz::resource::role_resource;
    use guestflag_authz::signing::sign_request;
    use guestflag_authz::{
        AuthenticationClass, FederatedTrust, IdentityPoolId, OpenIdClaims, PolicyDocument,
        PolicyStatement, RoleName, TokenSigner, TrustCondition,
    };
    use guestflag_rollout::{Reason, VariationValue};
    use std::time::Duration;

    const IDENTITY_ISSUER: &str = "https://identity.local-1.guestflag";
    const ENTITY: &str = "artificial_id";

    struct Fixture {
        evaluator: FeatureEvaluator,
        federator: Arc<CredentialFederator>,
        store: Arc<dyn GuestflagStore>,
        clock: Arc<ManualClock>,
        identity_signer: TokenSigner,
        pool: String,
        role_arn: String,
    }

    async fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(test_now()));
        let (store, outputs) = provisioned_store(clock.clone()).await;
        let identity_signer = TokenSigner::new(IDENTITY_ISSUER, test_keys(1)).expect("signer");
        let federator = Arc::new(CredentialFederator::new(
            store.clone(),
            identity_signer.clone(),
            TokenSigner::new("https://sts.local-1.guestflag", test_keys(2)).expect("signer"),
            b"test-master-key".to_vec(),
            Duration::from_secs(900),
            clock.clone(),
        ));
        let evaluator = FeatureEvaluator::new(
            store.clone(),
            federator.clone(),
            Region::new("local-1"),
            AccountId::new("000000000000"),
            clock.clone(),
        );
        Fixture {
            evaluator,
            federator,
            store,
            clock,
            identity_signer,
            pool: outputs["IdentityPoolId"].clone(),
            role_arn: outputs["RoleArn"].clone(),
        }
    }

    impl Fixture {
        async fn evaluate(&self, project: &str, feature: &str) -> Result<Assignment, EvaluationError> {
            let now = self.clock.now_secs();
            let web = self
                .identity_signer
                .sign(&OpenIdClaims {
                    iss: IDENTITY_ISSUER.to_string(),
                    aud: self.pool.clone(),
                    sub: "local-1:visitor".to_string(),
                    amr: vec![AuthenticationClass::Unauthenticated.amr_claim().to_string()],
                    iat: now,
                    exp: now + 600,
                })
                .expect("sign");
            let credentials = self
                .federator
                .exchange_for_credentials(&self.role_arn, &web, None)
                .await
                .expect("credentials")
                .credentials;
            let path = format!("/v1/flags/projects/{project}/evaluations/{feature}");
            let body = br#"{"entity_id":"artificial_id"}"#;
            let signature =
                sign_request(&credentials.secret_access_key, "POST", &path, now, body).expect("sign");
            let request = SignedRequest {
                access_key_id: &credentials.access_key_id,
                session_token: &credentials.session_token,
                timestamp: now,
                signature: &signature,
                method: "POST",
                path: &path,
                body,
            };
            self.evaluator
                .evaluate(
                    &ProjectName::new(project),
                    &FeatureName::new(feature),
                    &EntityId::new(ENTITY),
                    &request,
                )
                .await
        }
    }

    #[tokio::test]
    async fn default_is_served_until_the_first_split_starts() {
        let f = fixture().await;
        let result = f.evaluate("TestProject", "TestFeature").await.expect("evaluate");
        assert_eq!(result.reason, Reason::Default);
        assert_eq!(result.variation, "FeatureEnabled");
        assert_eq!(result.value, VariationValue::Bool(true));
    }

    #[tokio::test]
    async fn active_split_is_served_and_stable() {
        let f = fixture().await;
        f.clock.advance(chrono::Duration::minutes(3));
        let first = f.evaluate("TestProject", "TestFeature").await.expect("evaluate");
        assert_eq!(first.reason, Reason::LaunchRuleMatch);
        assert_eq!(first.launch.as_deref(), Some("TestLaunch"));
        for _ in 0..3 {
            let again = f.evaluate("TestProject", "TestFeature").await.expect("evaluate");
            assert_eq!(again.variation, first.variation);
        }
    }

    #[tokio::test]
    async fn feature_outside_the_policy_is_denied_before_lookup() {
        let f = fixture().await;
        let err = f
            .evaluate("TestProject", "OtherFeature")
            .await
            .expect_err("denied");
        assert!(matches!(err, EvaluationError::AccessDenied(_)));
        let err = f.evaluate("Other", "TestFeature").await.expect_err("denied");
        assert!(matches!(err, EvaluationError::AccessDenied(_)));
    }

    #[tokio::test]
    async fn missing_feature_inside_the_policy_is_an_evaluation_error() {
        let mut f = fixture().await;
        // Committed straight to the store: the provisioner would refuse a
        // wildcard policy.
        let name = RoleName::new("Wide");
        let wide = FederatedRole {
            arn: role_resource(&AccountId::new("000000000000"), &name),
            name,
            variant: AuthenticationClass::Unauthenticated,
            trust: FederatedTrust::web_identity(TrustCondition::new(
                IdentityPoolId::new(f.pool.as_str()),
                AuthenticationClass::Unauthenticated,
            )),
            policy: PolicyDocument::new(vec![PolicyStatement::allow(
                vec![Action::EvaluateFeature],
                vec!["grn:flags:local-1:000000000000:project/*".to_string()],
            )]),
        };
        f.role_arn = wide.arn.to_string();
        f.store
            .commit_stack(StackRecord {
                name: "Wide".to_string(),
                template: StackTemplate {
                    resources: vec![],
                    outputs: vec![],
                },
                resources: StackResources {
                    roles: vec![wide],
                    ..StackResources::default()
                },
                outputs: Default::default(),
                applied_at: test_now(),
            })
            .await
            .expect("commit");

        let err = f.evaluate("TestProject", "Missing").await.expect_err("missing");
        assert!(matches!(err, EvaluationError::NotFound(_)));
        let err = f.evaluate("Missing", "TestFeature").await.expect_err("missing");
        assert!(matches!(err, EvaluationError::NotFound(_)));
    }
}
