//! OAuth2 client registration for test setups.
//!
//! Mounted only with `enable_test_routes`. Creates the client through Hydra's
//! admin API, which the upstream identity provider cannot do for us.

use crate::Environment;
use crate::hydra::types::{CreateClientRequest, RegisteredClient};
use crate::routes::{ErrorResponse, TEST_TAG, json_error, oauth_error};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

#[tracing::instrument(skip(env, body), fields(client_name = %body.client_name))]
#[utoipa::path(
    post,
    path = "/test/clients",
    tag = TEST_TAG,
    operation_id = "Register Test Client",
    summary = "Register an OAuth2 client in Hydra",
    description = "Test-only. Returns the generated client credentials.",
    request_body(content = CreateClientRequest, content_type = "application/json"),
    responses(
        (status = 201, description = "Client registered", body = RegisteredClient),
        (status = 400, description = "Missing redirect URIs", body = ErrorResponse),
        (status = 503, description = "Hydra unavailable", body = ErrorResponse),
    )
)]
pub async fn create_client(
    State(env): State<Environment>,
    Json(body): Json<CreateClientRequest>,
) -> Response {
    if body.redirect_uris.is_empty() {
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            Some("at least one redirect_uri is required".to_string()),
        );
    }

    match env.hydra.create_client(&body).await {
        Ok(client) => {
            tracing::info!(client_id = %client.client_id, "registered test client");
            (StatusCode::CREATED, Json(client)).into_response()
        }
        Err(e) => json_error(e),
    }
}
