//! Logout endpoint.

use crate::Environment;
use crate::resolver::process_logout;
use crate::routes::FLOWS_TAG;
use crate::views;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct LogoutQuery {
    pub logout_challenge: Option<String>,
}

#[tracing::instrument(skip(env))]
#[utoipa::path(
    get,
    path = "/logout",
    tag = FLOWS_TAG,
    operation_id = "Logout",
    summary = "Handle a Hydra logout challenge",
    description = "Always accepts the logout and redirects back to Hydra.",
    params(
        ("logout_challenge" = String, Query, description = "Logout challenge issued by Hydra."),
    ),
    responses(
        (status = 303, description = "Redirect to Hydra"),
        (status = 400, description = "Missing challenge"),
        (status = 404, description = "Unknown or expired challenge"),
        (status = 502, description = "Hydra unavailable"),
    )
)]
pub async fn logout(State(env): State<Environment>, Query(params): Query<LogoutQuery>) -> Response {
    let Some(challenge) = params.logout_challenge.filter(|c| !c.is_empty()) else {
        return views::error_page(
            StatusCode::BAD_REQUEST,
            "Missing logout challenge",
            "This page must be opened through the authorization server.",
        );
    };

    match process_logout(&env, &challenge).await {
        Ok(redirect) => Redirect::to(redirect.as_str()).into_response(),
        Err(e) => e.into_response(),
    }
}
