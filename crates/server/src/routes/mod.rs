//! HTTP surface of the bridge.
//!
//! - `login`, `consent`, `logout`, `callback` - browser redirects Hydra sends here
//! - `device` - device verification pages and the device grant relays
//! - `token` - refresh token relay
//! - `clients` - client registration for test setups (`/test/clients`)
//! - `health` - `/healthz`
//!
//! Handlers translate query strings and forms into resolver calls; the
//! resolver result becomes a redirect, a page or a JSON body here and nowhere
//! else.

pub mod callback;
pub mod clients;
pub mod consent;
pub mod device;
pub mod health;
pub mod login;
pub mod logout;
pub mod openapi;
pub mod token;

use crate::Environment;
use crate::error::AppError;
use crate::views;
use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use base64::Engine;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use utoipa::{OpenApi, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

pub use health::MISC_TAG;

/// Tag for the browser-facing challenge endpoints.
pub const FLOWS_TAG: &str = "Flows";
/// Tag for the JSON token relays.
pub const TOKENS_TAG: &str = "Tokens";
/// Tag for routes only mounted with `enable_test_routes`.
pub const TEST_TAG: &str = "Test";

/// Build the application router, Redoc included.
pub fn app(env: Environment) -> Router {
    let mut router = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .routes(routes!(login::login_page))
        .routes(routes!(login::login_submit))
        .routes(routes!(consent::consent))
        .routes(routes!(logout::logout))
        .routes(routes!(callback::callback))
        .routes(routes!(device::verify_page))
        .routes(routes!(device::verify_submit))
        .routes(routes!(device::success))
        .routes(routes!(device::authorize))
        .routes(routes!(device::token))
        .routes(routes!(token::refresh))
        .routes(routes!(health::health));

    if env.config.enable_test_routes {
        tracing::warn!("test routes enabled, /test/clients can register OAuth2 clients");
        router = router.routes(routes!(clients::create_client));
    }

    let (router, api) = router
        .with_state(env)
        .layer(TraceLayer::new_for_http())
        .split_for_parts();

    router.merge(Redoc::with_url("/api-docs", api))
}

/// Bind and serve until the process is stopped.
#[tracing::instrument(skip(env))]
pub async fn start_webserver(env: Environment) -> color_eyre::Result<()> {
    let addr = env.config.listen_addr;
    let router = app(env);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, router)
        .await
        .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}

/// Browser-facing error rendering.
///
/// A rejection Hydra already knows about carries its redirect and the
/// user-agent is sent there; everything else is an error page.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::PolicyRejected {
                redirect_to: Some(redirect),
                ..
            } => Redirect::to(redirect.as_str()).into_response(),
            other => {
                let heading = match &other {
                    AppError::ChallengeNotFound(_) => "Request not found",
                    AppError::ChallengeAlreadyResolved(_) => "Request already completed",
                    AppError::UpstreamUnavailable(_) | AppError::MalformedUpstreamResponse(_) => {
                        "Sign-in service unavailable"
                    }
                    AppError::PolicyRejected { .. } => "Access denied",
                };
                views::error_page(other.status_code(), heading, &other.to_string())
            }
        }
    }
}

/// RFC 6749 §5.2 error body for the JSON endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

pub fn oauth_error(status: StatusCode, error: &str, description: Option<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            error_description: description,
        }),
    )
        .into_response()
}

/// JSON rendering of an [`AppError`] for the relay endpoints.
pub fn json_error(err: AppError) -> Response {
    let (status, code) = match &err {
        AppError::ChallengeNotFound(_) | AppError::ChallengeAlreadyResolved(_) => {
            (StatusCode::BAD_REQUEST, "invalid_request")
        }
        AppError::UpstreamUnavailable(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, "temporarily_unavailable")
        }
        AppError::MalformedUpstreamResponse(_) => (StatusCode::BAD_GATEWAY, "server_error"),
        AppError::PolicyRejected { .. } => (StatusCode::FORBIDDEN, "access_denied"),
    };
    let description = match err {
        AppError::PolicyRejected { reason, .. } => reason,
        other => other.to_string(),
    };
    oauth_error(status, code, Some(description))
}

/// Client credentials from HTTP Basic auth, falling back to the form body.
pub(crate) fn client_credentials(
    headers: &HeaderMap,
    client_id: Option<String>,
    client_secret: Option<String>,
) -> (Option<String>, Option<String>) {
    if let Some(auth) = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        && let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(auth)
        && let Ok(creds) = String::from_utf8(decoded)
        && let Some((id, secret)) = creds.split_once(':')
    {
        return (Some(id.to_string()), Some(secret.to_string()));
    }

    (
        client_id.filter(|id| !id.is_empty()),
        client_secret.filter(|secret| !secret.is_empty()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn basic_auth_wins_over_form() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_static("Basic Y2xpZW50OnNlY3JldA=="),
        );
        let (id, secret) = client_credentials(&headers, Some("form".into()), None);
        assert_eq!(id.as_deref(), Some("client"));
        assert_eq!(secret.as_deref(), Some("secret"));
    }

    #[test]
    fn form_credentials_ignore_empty_values() {
        let (id, secret) =
            client_credentials(&HeaderMap::new(), Some("client".into()), Some(String::new()));
        assert_eq!(id.as_deref(), Some("client"));
        assert!(secret.is_none());
    }

    #[test]
    fn upstream_errors_become_temporarily_unavailable() {
        let response = json_error(AppError::UpstreamUnavailable("HTTP 503".into()));
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn rejection_without_redirect_is_forbidden() {
        let err = AppError::PolicyRejected {
            reason: "nope".into(),
            redirect_to: None,
        };
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }
}
