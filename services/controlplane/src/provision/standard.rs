//! The standard visitor-flag stack.
//!
//! One project with a boolean feature and its launch, a user pool and client
//! trusted by an identity pool that allows unauthenticated identities, and an
//! authenticated/unauthenticated role pair, each trusting only that pool and
//! allowed to evaluate only that project and feature.
use super::ProvisionError;
use super::template::{
    LaunchGroupSpec, OutputSpec, ProviderSpec, ResourceProperties, ResourceSpec, StackTemplate,
    StatementSpec, ValueRef,
};
use chrono::{DateTime, Utc};
use guestflag_authz::{Action, AuthenticationClass, Effect};
use guestflag_rollout::{RolloutPlan, standard};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StandardStackParams {
    pub project_name: String,
    pub feature_name: String,
    pub launch_name: String,
    pub plan: RolloutPlan,
}

impl Default for StandardStackParams {
    fn default() -> Self {
        Self {
            project_name: "TestProject".to_string(),
            feature_name: "TestFeature".to_string(),
            launch_name: "TestLaunch".to_string(),
            plan: RolloutPlan::new().boolean_stage(Duration::ZERO, 50_000),
        }
    }
}

/// Build the template; splits are scheduled relative to `expected_completion`.
pub fn standard_template(
    params: &StandardStackParams,
    expected_completion: DateTime<Utc>,
) -> Result<StackTemplate, ProvisionError> {
    let scheduled_splits =
        params
            .plan
            .schedule(expected_completion)
            .map_err(|source| ProvisionError::Rollout {
                resource: format!("launch {}", params.launch_name),
                source,
            })?;
    let feature = standard::standard_feature(params.feature_name.as_str());

    let evaluate_statement = StatementSpec {
        effect: Effect::Allow,
        actions: vec![Action::EvaluateFeature],
        resources: vec![
            ValueRef::attr("EvidentlyProject", "Arn"),
            ValueRef::attr("EvidentlyFeature", "Arn"),
        ],
    };
    let role = |variant| ResourceProperties::Role {
        variant,
        audience: ValueRef::reference("IdentityPool"),
        policy: vec![evaluate_statement.clone()],
    };
    let group = |variation: &str| LaunchGroupSpec {
        group_name: variation.to_string(),
        feature: ValueRef::reference("EvidentlyFeature"),
        variation: variation.to_string(),
    };

    let resources = vec![
        ResourceSpec::new(
            "EvidentlyProject",
            ResourceProperties::Project {
                name: params.project_name.clone(),
            },
        ),
        ResourceSpec::new(
            "EvidentlyFeature",
            ResourceProperties::Feature {
                project: ValueRef::reference("EvidentlyProject"),
                name: feature.name,
                variations: feature.variations,
                default_variation: feature.default_variation,
            },
        ),
        ResourceSpec::new(
            "EvidentlyLaunch",
            ResourceProperties::Launch {
                project: ValueRef::reference("EvidentlyProject"),
                name: params.launch_name.clone(),
                groups: vec![
                    group(standard::ENABLED_VARIATION),
                    group(standard::DISABLED_VARIATION),
                ],
                scheduled_splits,
            },
        ),
        ResourceSpec::new("UserPool", ResourceProperties::UserPool {}),
        ResourceSpec::new(
            "UserPoolClient",
            ResourceProperties::UserPoolClient {
                user_pool: ValueRef::reference("UserPool"),
            },
        ),
        ResourceSpec::new(
            "IdentityPool",
            ResourceProperties::IdentityPool {
                allow_unauthenticated: true,
                providers: vec![ProviderSpec {
                    provider_name: ValueRef::attr("UserPool", "ProviderName"),
                    client_id: ValueRef::reference("UserPoolClient"),
                }],
            },
        ),
        ResourceSpec::new(
            "UnauthenticatedRole",
            role(AuthenticationClass::Unauthenticated),
        ),
        ResourceSpec::new("AuthenticatedRole", role(AuthenticationClass::Authenticated)),
        ResourceSpec::new(
            "IdentityPoolRoleAttachment",
            ResourceProperties::RoleAttachment {
                identity_pool: ValueRef::reference("IdentityPool"),
                authenticated: Some(ValueRef::attr("AuthenticatedRole", "Arn")),
                unauthenticated: Some(ValueRef::attr("UnauthenticatedRole", "Arn")),
            },
        ),
    ];

    let output = |name: &str, value: ValueRef| OutputSpec {
        name: name.to_string(),
        value,
    };
    let outputs = vec![
        output("UserPoolId", ValueRef::reference("UserPool")),
        output("UserPoolClientId", ValueRef::reference("UserPoolClient")),
        output("IdentityPoolId", ValueRef::reference("IdentityPool")),
        output("EvidentlyProjectName", ValueRef::reference("EvidentlyProject")),
        output("EvidentlyFeatureName", ValueRef::reference("EvidentlyFeature")),
        output("RoleArn", ValueRef::attr("UnauthenticatedRole", "Arn")),
    ];

    Ok(StackTemplate { resources, outputs })
}
