//! Identity provider callback for `login.mode = upstream`.

use crate::Environment;
use crate::resolver::{abort_upstream_login, complete_upstream_login};
use crate::routes::FLOWS_TAG;
use crate::views;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct CallbackQuery {
    pub state: Option<String>,
    pub code: Option<String>,
    pub error: Option<String>,
}

// The authorization code stays out of logs.
impl std::fmt::Debug for CallbackQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackQuery")
            .field("state", &self.state)
            .field("code", &self.code.as_ref().map(|_| "<redacted>"))
            .field("error", &self.error)
            .finish()
    }
}

#[tracing::instrument(skip(env))]
#[utoipa::path(
    get,
    path = "/callback",
    tag = FLOWS_TAG,
    operation_id = "Identity Provider Callback",
    summary = "Finish an upstream login",
    description = "Exchanges the authorization code (with PKCE) for the user's verified identity and accepts \
                   the pending login challenge. An `error` from the identity provider rejects the challenge.",
    params(
        ("state" = String, Query, description = "State issued when the login started."),
        ("code" = Option<String>, Query, description = "Authorization code from the identity provider."),
        ("error" = Option<String>, Query, description = "Error from the identity provider."),
    ),
    responses(
        (status = 303, description = "Redirect to Hydra"),
        (status = 400, description = "Missing state or code"),
        (status = 404, description = "Unknown or expired state"),
        (status = 502, description = "Hydra or the identity provider unavailable"),
    )
)]
pub async fn callback(
    State(env): State<Environment>,
    Query(params): Query<CallbackQuery>,
) -> Response {
    let Some(state) = params.state.filter(|s| !s.is_empty()) else {
        return views::error_page(
            StatusCode::BAD_REQUEST,
            "Missing state",
            "The identity provider did not return the login state.",
        );
    };

    let result = match (params.error, params.code) {
        (Some(error), _) => abort_upstream_login(&env, &state, &error).await,
        (None, Some(code)) if !code.is_empty() => complete_upstream_login(&env, &state, &code).await,
        _ => {
            return views::error_page(
                StatusCode::BAD_REQUEST,
                "Missing authorization code",
                "The identity provider returned neither a code nor an error.",
            );
        }
    };

    match result {
        Ok(redirect) => Redirect::to(redirect.as_str()).into_response(),
        Err(e) => e.into_response(),
    }
}
