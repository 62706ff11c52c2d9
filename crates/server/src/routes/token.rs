//! Refresh token relay.

use crate::Environment;
use crate::hydra::types::TokenPair;
use crate::resolver::{RefreshOutcome, RefreshRequest, process_token_refresh};
use crate::routes::{ErrorResponse, TOKENS_TAG, client_credentials, json_error, oauth_error};
use axum::{
    Form, Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct RefreshForm {
    pub refresh_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
}

#[tracing::instrument(skip(env, headers, form))]
#[utoipa::path(
    post,
    path = "/token/refresh",
    tag = TOKENS_TAG,
    operation_id = "Refresh Token",
    summary = "Exchange a refresh token for a new token pair",
    description = "Forwards the refresh token and client credentials to Hydra's token endpoint.\n\n\
                   **Client authentication:** HTTP Basic auth or `client_id`/`client_secret` in the body.\n\n\
                   An expired, revoked or already used refresh token answers `invalid_grant`.",
    request_body(
        content = RefreshForm,
        content_type = "application/x-www-form-urlencoded",
        description = "Refresh token and client credentials"
    ),
    responses(
        (status = 200, description = "New tokens", body = TokenPair),
        (status = 400, description = "Missing parameters or invalid_grant", body = ErrorResponse),
        (status = 403, description = "Hydra refused the client", body = ErrorResponse),
        (status = 503, description = "Hydra unavailable", body = ErrorResponse),
    )
)]
pub async fn refresh(
    State(env): State<Environment>,
    headers: HeaderMap,
    Form(form): Form<RefreshForm>,
) -> Response {
    let (client_id, client_secret) = client_credentials(&headers, form.client_id, form.client_secret);
    let Some(client_id) = client_id else {
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            Some("client_id is required".to_string()),
        );
    };

    let request = RefreshRequest {
        refresh_token: form.refresh_token.unwrap_or_default(),
        client_id,
        client_secret,
        scope: form.scope.filter(|s| !s.is_empty()),
    };

    match process_token_refresh(&env, &request).await {
        Ok(RefreshOutcome::Refreshed(tokens)) => Json(tokens).into_response(),
        Ok(RefreshOutcome::InvalidGrant { description }) => {
            oauth_error(StatusCode::BAD_REQUEST, "invalid_grant", description)
        }
        Err(e) => json_error(e),
    }
}
