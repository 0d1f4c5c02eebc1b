//! Credential federation endpoint handler.
use super::FederationError;
use crate::api::error::{
    ApiError, api_access_denied, api_internal, api_internal_message, api_token_issuance_error,
    api_trust_policy_mismatch, api_validation_error,
};
use crate::api::types::{
    AssumeRoleWithWebIdentityRequest, AssumeRoleWithWebIdentityResponse, CredentialsBody,
};
use crate::app::AppState;
use axum::Json;
use axum::extract::State;

pub(crate) fn map_federation_error(err: FederationError) -> ApiError {
    match err {
        FederationError::AccessDenied(message) => {
            metrics::counter!("guestflag_access_denied_total").increment(1);
            api_access_denied(&message)
        }
        FederationError::InvalidToken(message) => api_token_issuance_error(&message),
        FederationError::TrustPolicyMismatch(message) => api_trust_policy_mismatch(&message),
        FederationError::Validation(message) => api_validation_error(&message),
        FederationError::Store(err) => api_internal("failed to load role", &err),
        FederationError::Internal(err) => {
            tracing::error!(error = %err, "failed to mint credentials");
            api_internal_message("failed to mint credentials")
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/sts/assume-role-with-web-identity",
    tag = "sts",
    request_body = AssumeRoleWithWebIdentityRequest,
    responses(
        (status = 200, description = "Temporary role credentials", body = AssumeRoleWithWebIdentityResponse),
        (status = 400, description = "Invalid web identity token", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Trust policy mismatch or unknown role", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn assume_role_with_web_identity(
    State(state): State<AppState>,
    Json(body): Json<AssumeRoleWithWebIdentityRequest>,
) -> Result<Json<AssumeRoleWithWebIdentityResponse>, ApiError> {
    if body.role_arn.is_empty() || body.web_identity_token.is_empty() {
        return Err(api_validation_error(
            "role_arn and web_identity_token are required",
        ));
    }
    let session = state
        .federator
        .exchange_for_credentials(
            &body.role_arn,
            &body.web_identity_token,
            body.role_session_name.as_deref(),
        )
        .await
        .map_err(map_federation_error)?;
    let credentials = session.credentials;
    Ok(Json(AssumeRoleWithWebIdentityResponse {
        credentials: CredentialsBody {
            access_key_id: credentials.access_key_id,
            secret_access_key: credentials.secret_access_key,
            session_token: credentials.session_token,
            expiration: credentials.expiration,
        },
        subject_from_web_identity_token: session.subject,
    }))
}
