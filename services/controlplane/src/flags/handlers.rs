//! Feature evaluation endpoint handler.
//!
//! The request must carry the `x-guestflag-*` signing headers produced with
//! temporary credentials; the signature covers method, path, timestamp and
//! the raw body bytes, so the handler keeps the body as `Bytes` rather than
//! letting axum deserialize it.
use super::EvaluationError;
use crate::api::error::{
    ApiError, api_access_denied, api_evaluation_error, api_internal, api_validation_error,
};
use crate::api::types::{EvaluateFeatureRequest, EvaluateFeatureResponse};
use crate::app::AppState;
use crate::sts::SignedRequest;
use crate::sts::handlers::map_federation_error;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, Uri};
use guestflag_authz::signing::{
    HEADER_ACCESS_KEY_ID, HEADER_DATE, HEADER_SECURITY_TOKEN, HEADER_SIGNATURE,
};
use guestflag_authz::{EntityId, FeatureName, ProjectName};

fn map_evaluation_error(err: EvaluationError) -> ApiError {
    match err {
        EvaluationError::Federation(err) => map_federation_error(err),
        EvaluationError::AccessDenied(message) => {
            metrics::counter!("guestflag_access_denied_total").increment(1);
            api_access_denied(&message)
        }
        EvaluationError::NotFound(message) => api_evaluation_error(&message),
        EvaluationError::Rollout(err) => api_evaluation_error(&err.to_string()),
        EvaluationError::Store(err) => api_internal("failed to load feature", &err),
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ApiError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            metrics::counter!("guestflag_access_denied_total").increment(1);
            api_access_denied(&format!("missing {name} header"))
        })
}

#[utoipa::path(
    post,
    path = "/v1/flags/projects/{project}/evaluations/{feature}",
    tag = "flags",
    params(
        ("project" = String, Path, description = "Project name"),
        ("feature" = String, Path, description = "Feature name")
    ),
    request_body = EvaluateFeatureRequest,
    responses(
        (status = 200, description = "Variation served to the entity", body = EvaluateFeatureResponse),
        (status = 403, description = "Credentials invalid or policy does not cover the feature", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Project or feature does not exist", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn evaluate_feature(
    Path((project, feature)): Path<(String, String)>,
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<EvaluateFeatureResponse>, ApiError> {
    let timestamp = header(&headers, HEADER_DATE)?
        .parse::<i64>()
        .map_err(|_| api_validation_error("request timestamp must be unix seconds"))?;
    let request = SignedRequest {
        access_key_id: header(&headers, HEADER_ACCESS_KEY_ID)?,
        session_token: header(&headers, HEADER_SECURITY_TOKEN)?,
        timestamp,
        signature: header(&headers, HEADER_SIGNATURE)?,
        method: method.as_str(),
        path: uri.path(),
        body: &body,
    };
    let payload: EvaluateFeatureRequest = serde_json::from_slice(&body)
        .map_err(|err| api_validation_error(&format!("invalid request body: {err}")))?;
    if payload.entity_id.is_empty() {
        return Err(api_validation_error("entity_id is required"));
    }

    let assignment = state
        .evaluator
        .evaluate(
            &ProjectName::new(project),
            &FeatureName::new(feature),
            &EntityId::new(payload.entity_id),
            &request,
        )
        .await
        .map_err(map_evaluation_error)?;
    Ok(Json(assignment.into()))
}
