//! Identity broker endpoint handlers.
use super::IdentityError;
use crate::api::error::{
    ApiError, api_identity_service_error, api_internal, api_internal_message,
    api_token_issuance_error, api_validation_error,
};
use crate::api::types::{
    IssueIdentityRequest, IssueIdentityResponse, JwksResponse, OpenIdTokenRequest,
    OpenIdTokenResponse,
};
use crate::app::AppState;
use axum::Json;
use axum::extract::State;
use guestflag_authz::{IdentityId, IdentityPoolId, Region};

fn map_identity_error(err: IdentityError) -> ApiError {
    match err {
        IdentityError::ServiceError(message) => api_identity_service_error(&message),
        IdentityError::TokenIssuance(message) => api_token_issuance_error(&message),
        IdentityError::Store(err) => api_internal("failed to load identity pool", &err),
        IdentityError::Signing(err) => {
            tracing::error!(error = %err, "failed to sign open id token");
            api_internal_message("failed to sign token")
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/identity/get-id",
    tag = "identity",
    request_body = IssueIdentityRequest,
    responses(
        (status = 200, description = "Anonymous identity issued", body = IssueIdentityResponse),
        (status = 400, description = "Unknown pool, region mismatch or unauthenticated identities disabled", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn issue_identity(
    State(state): State<AppState>,
    Json(body): Json<IssueIdentityRequest>,
) -> Result<Json<IssueIdentityResponse>, ApiError> {
    if body.identity_pool_id.is_empty() || body.region.is_empty() {
        return Err(api_validation_error("identity_pool_id and region are required"));
    }
    let identity_id = state
        .identity
        .issue_identity(
            &IdentityPoolId::new(body.identity_pool_id),
            &Region::new(body.region),
        )
        .await
        .map_err(map_identity_error)?;
    Ok(Json(IssueIdentityResponse {
        identity_id: identity_id.to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/v1/identity/open-id-token",
    tag = "identity",
    request_body = OpenIdTokenRequest,
    responses(
        (status = 200, description = "OpenID token for the identity", body = OpenIdTokenResponse),
        (status = 400, description = "Identity unknown or expired", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn issue_open_id_token(
    State(state): State<AppState>,
    Json(body): Json<OpenIdTokenRequest>,
) -> Result<Json<OpenIdTokenResponse>, ApiError> {
    if body.identity_id.is_empty() {
        return Err(api_validation_error("identity_id is required"));
    }
    let token = state
        .identity
        .issue_open_id_token(&IdentityId::new(body.identity_id))
        .await
        .map_err(map_identity_error)?;
    Ok(Json(OpenIdTokenResponse {
        identity_id: token.identity_id.to_string(),
        token: token.token,
    }))
}

#[utoipa::path(
    get,
    path = "/v1/identity/.well-known/jwks.json",
    tag = "identity",
    responses(
        (status = 200, description = "Keys verifying identity broker tokens", body = JwksResponse)
    )
)]
/// Publish the broker's public signing keys. Only EdDSA/Ed25519 public
/// halves leave the process.
pub(crate) async fn identity_jwks(State(state): State<AppState>) -> Json<JwksResponse> {
    Json(state.identity.jwks().into())
}
