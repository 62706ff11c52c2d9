//! Consent endpoint. Consent is decided by policy, the user is never asked.

use crate::Environment;
use crate::resolver::process_consent;
use crate::routes::FLOWS_TAG;
use crate::views;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ConsentQuery {
    pub consent_challenge: Option<String>,
}

#[tracing::instrument(skip(env))]
#[utoipa::path(
    get,
    path = "/consent",
    tag = FLOWS_TAG,
    operation_id = "Consent",
    summary = "Handle a Hydra consent challenge",
    description = "Grants the requested scopes the client is allowed to receive and redirects back to Hydra. \
                   If none of the requested scopes is allowed the challenge is rejected and the user-agent is \
                   sent to Hydra's error redirect.",
    params(
        ("consent_challenge" = String, Query, description = "Consent challenge issued by Hydra."),
    ),
    responses(
        (status = 303, description = "Redirect to Hydra"),
        (status = 400, description = "Missing challenge"),
        (status = 404, description = "Unknown or expired challenge"),
        (status = 409, description = "Challenge already resolved"),
        (status = 502, description = "Hydra unavailable"),
    )
)]
pub async fn consent(
    State(env): State<Environment>,
    Query(params): Query<ConsentQuery>,
) -> Response {
    let Some(challenge) = params.consent_challenge.filter(|c| !c.is_empty()) else {
        return views::error_page(
            StatusCode::BAD_REQUEST,
            "Missing consent challenge",
            "This page must be opened through the authorization server.",
        );
    };

    match process_consent(&env, &challenge).await {
        Ok(redirect) => Redirect::to(redirect.as_str()).into_response(),
        Err(e) => e.into_response(),
    }
}
