//! Stack provisioning endpoint handlers.
use super::ProvisionError;
use super::template::StackTemplate;
use crate::api::error::{
    ApiError, api_conflict, api_internal, api_not_found, api_validation_error,
};
use crate::api::types::{StackApplyResponse, StackOutputsResponse};
use crate::app::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

fn map_provision_error(err: ProvisionError) -> ApiError {
    match err {
        ProvisionError::StackConflict(message) => api_conflict(&message),
        ProvisionError::NameCollision(_) => api_conflict(&err.to_string()),
        ProvisionError::NotFound(_) => api_not_found(&err.to_string()),
        ProvisionError::Store(err) => api_internal("failed to access stack store", &err),
        other => {
            tracing::warn!(error = %other, "stack rejected");
            api_validation_error(&other.to_string())
        }
    }
}

#[utoipa::path(
    put,
    path = "/v1/stacks/{stack}",
    tag = "stacks",
    params(("stack" = String, Path, description = "Stack name")),
    request_body = crate::api::types::StackTemplateBody,
    responses(
        (status = 201, description = "Stack applied", body = StackApplyResponse),
        (status = 200, description = "Identical stack already applied", body = StackApplyResponse),
        (status = 400, description = "Template failed validation", body = crate::api::types::ErrorResponse),
        (status = 409, description = "Stack or resource names conflict", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn apply_stack(
    Path(stack): Path<String>,
    State(state): State<AppState>,
    Json(template): Json<StackTemplate>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .provisioner
        .apply(&stack, template)
        .await
        .map_err(map_provision_error)?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(StackApplyResponse {
            stack,
            created: outcome.created,
            outputs: outcome.outputs,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/v1/stacks/{stack}/outputs",
    tag = "stacks",
    params(("stack" = String, Path, description = "Stack name")),
    responses(
        (status = 200, description = "Stack outputs", body = StackOutputsResponse),
        (status = 404, description = "Stack not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn stack_outputs(
    Path(stack): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<StackOutputsResponse>, ApiError> {
    let outputs = state
        .provisioner
        .outputs(&stack)
        .await
        .map_err(map_provision_error)?;
    Ok(Json(StackOutputsResponse { stack, outputs }))
}

#[utoipa::path(
    delete,
    path = "/v1/stacks/{stack}",
    tag = "stacks",
    params(("stack" = String, Path, description = "Stack name")),
    responses(
        (status = 204, description = "Stack torn down"),
        (status = 404, description = "Stack not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn teardown_stack(
    Path(stack): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state
        .provisioner
        .teardown(&stack)
        .await
        .map_err(map_provision_error)?;
    Ok(StatusCode::NO_CONTENT)
}
