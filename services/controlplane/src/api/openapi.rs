//! OpenAPI schema aggregation for the control-plane API.
//!
//! # Purpose
//! Collects all routes and schema types into a single OpenAPI document served
//! at `/v1/openapi.json`.
use crate::api::system;
use crate::api::types::{
    AssumeRoleWithWebIdentityRequest, AssumeRoleWithWebIdentityResponse, CredentialsBody,
    ErrorResponse, EvaluateFeatureRequest, EvaluateFeatureResponse, HealthStatus,
    IssueIdentityRequest, IssueIdentityResponse, JwkBody, JwksResponse, OpenIdTokenRequest,
    OpenIdTokenResponse, StackApplyResponse, StackOutputsResponse, StackTemplateBody,
};
use crate::{flags, identity, provision, sts};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "guestflag-controlplane",
        version = "v1",
        description = "Anonymous identity, credential federation, feature evaluation and stack provisioning"
    ),
    paths(
        system::system_health,
        identity::handlers::issue_identity,
        identity::handlers::issue_open_id_token,
        identity::handlers::identity_jwks,
        sts::handlers::assume_role_with_web_identity,
        flags::handlers::evaluate_feature,
        provision::handlers::apply_stack,
        provision::handlers::stack_outputs,
        provision::handlers::teardown_stack
    ),
    components(schemas(
        HealthStatus,
        ErrorResponse,
        IssueIdentityRequest,
        IssueIdentityResponse,
        OpenIdTokenRequest,
        OpenIdTokenResponse,
        JwkBody,
        JwksResponse,
        AssumeRoleWithWebIdentityRequest,
        AssumeRoleWithWebIdentityResponse,
        CredentialsBody,
        EvaluateFeatureRequest,
        EvaluateFeatureResponse,
        StackTemplateBody,
        StackApplyResponse,
        StackOutputsResponse
    )),
    tags(
        (name = "system", description = "Health endpoints"),
        (name = "identity", description = "Anonymous identities and OpenID tokens"),
        (name = "sts", description = "Web identity federation"),
        (name = "flags", description = "Feature evaluation"),
        (name = "stacks", description = "Trust graph provisioning")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_operation() {
        let doc = ApiDoc::openapi();
        for path in [
            "/v1/system/health",
            "/v1/identity/get-id",
            "/v1/identity/open-id-token",
            "/v1/identity/.well-known/jwks.json",
            "/v1/sts/assume-role-with-web-identity",
            "/v1/flags/projects/{project}/evaluations/{feature}",
            "/v1/stacks/{stack}",
            "/v1/stacks/{stack}/outputs",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path} missing");
        }
    }
}
