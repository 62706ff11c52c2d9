//! Device authorization grant endpoints (RFC 8628).
//!
//! Browser side: `/device/verify` takes the user code for a device challenge,
//! `/device/success` is where Hydra sends the user afterwards.
//! Device side: `/device/authorize` and `/device/token` relay to Hydra's
//! public API.

use crate::Environment;
use crate::error::AppError;
use crate::hydra::types::TokenPair;
use crate::resolver::device::{DEFAULT_INTERVAL_SECS, DEVICE_CODE_GRANT};
use crate::resolver::{
    DevicePoll, DevicePollRequest, poll_device_token, process_device_authorization,
    start_device_authorization,
};
use crate::routes::{ErrorResponse, FLOWS_TAG, TOKENS_TAG, client_credentials, json_error, oauth_error};
use crate::views;
use axum::{
    Form, Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub device_challenge: Option<String>,
    pub user_code: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyForm {
    pub device_challenge: String,
    #[serde(default)]
    pub user_code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeviceAuthorizeForm {
    pub client_id: Option<String>,
    pub scope: Option<String>,
}

/// RFC 8628 §3.2 response.
#[derive(Debug, Serialize, ToSchema)]
pub struct DeviceAuthorizationBody {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_uri_complete: Option<String>,
    pub expires_in: i64,
    pub interval: u64,
}

#[derive(Deserialize, ToSchema)]
pub struct DeviceTokenForm {
    pub grant_type: Option<String>,
    pub device_code: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Interval the device currently polls at; defaults to 5 seconds.
    pub interval: Option<u64>,
}

/// Error body for a poll that did not yield tokens.
#[derive(Debug, Serialize, ToSchema)]
pub struct DevicePollError {
    pub error: String,
    /// Interval the device should wait before polling again.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
}

/// Hydra redirects here with a device challenge after the user opened the
/// verification URI.
#[tracing::instrument(skip(env))]
#[utoipa::path(
    get,
    path = "/device/verify",
    tag = FLOWS_TAG,
    operation_id = "Device Verify Page",
    summary = "Show the user code form",
    description = "Without a `device_challenge` the user-agent is sent to Hydra's device verification \
                   endpoint, which issues one and redirects back.",
    params(
        ("device_challenge" = Option<String>, Query, description = "Device challenge issued by Hydra."),
        ("user_code" = Option<String>, Query, description = "User code to pre-fill."),
    ),
    responses(
        (status = 200, description = "User code form"),
        (status = 303, description = "Redirect to Hydra to obtain a device challenge"),
    )
)]
pub async fn verify_page(State(env): State<Environment>, Query(params): Query<VerifyQuery>) -> Response {
    let user_code = params.user_code.unwrap_or_default();
    match params.device_challenge.filter(|c| !c.is_empty()) {
        Some(challenge) => views::device_verify_page(&challenge, &user_code, None),
        None => match env.config.hydra.public_url.join("oauth2/device/verify") {
            Ok(mut url) => {
                if !user_code.is_empty() {
                    url.query_pairs_mut().append_pair("user_code", &user_code);
                }
                Redirect::to(url.as_str()).into_response()
            }
            Err(e) => {
                tracing::error!("Invalid Hydra public URL: {}", e);
                views::error_page(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Device verification unavailable",
                    "The authorization server address is misconfigured.",
                )
            }
        },
    }
}

#[tracing::instrument(skip(env, form), fields(device_challenge = %form.device_challenge))]
#[utoipa::path(
    post,
    path = "/device/verify",
    tag = FLOWS_TAG,
    operation_id = "Device Verify Submit",
    summary = "Submit the user code for a device challenge",
    description = "Hydra validates the code and redirects into the regular login and consent sequence.",
    request_body(
        content = VerifyForm,
        content_type = "application/x-www-form-urlencoded",
        description = "Device challenge and user code"
    ),
    responses(
        (status = 303, description = "Redirect to Hydra"),
        (status = 400, description = "Empty user code, form shown again"),
        (status = 404, description = "Unknown or expired device challenge"),
        (status = 502, description = "Hydra unavailable"),
    )
)]
pub async fn verify_submit(State(env): State<Environment>, Form(form): Form<VerifyForm>) -> Response {
    if form.user_code.trim().is_empty() {
        return views::device_verify_page(
            &form.device_challenge,
            "",
            Some("Enter the code shown on your device."),
        );
    }

    match process_device_authorization(&env, &form.device_challenge, &form.user_code).await {
        Ok(redirect) => Redirect::to(redirect.as_str()).into_response(),
        Err(AppError::PolicyRejected {
            reason,
            redirect_to: None,
        }) => views::device_verify_page(&form.device_challenge, &form.user_code, Some(&reason)),
        Err(e) => e.into_response(),
    }
}

#[tracing::instrument]
#[utoipa::path(
    get,
    path = "/device/success",
    tag = FLOWS_TAG,
    operation_id = "Device Success",
    summary = "Device authorization completed",
    responses(
        (status = 200, description = "Confirmation page"),
    )
)]
pub async fn success() -> Response {
    views::device_success_page()
}

#[tracing::instrument(skip(env, headers))]
#[utoipa::path(
    post,
    path = "/device/authorize",
    tag = TOKENS_TAG,
    operation_id = "Device Authorization",
    summary = "Start a device authorization",
    description = "Relays to Hydra's device authorization endpoint and returns the device code, \
                   the user code and where the user should enter it.",
    request_body(
        content = DeviceAuthorizeForm,
        content_type = "application/x-www-form-urlencoded",
        description = "Client identifier and requested scope"
    ),
    responses(
        (status = 200, description = "Device session started", body = DeviceAuthorizationBody),
        (status = 400, description = "Missing client_id", body = ErrorResponse),
        (status = 503, description = "Hydra unavailable", body = ErrorResponse),
    )
)]
pub async fn authorize(
    State(env): State<Environment>,
    headers: HeaderMap,
    Form(form): Form<DeviceAuthorizeForm>,
) -> Response {
    let (client_id, _) = client_credentials(&headers, form.client_id, None);
    let Some(client_id) = client_id else {
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            Some("client_id is required".to_string()),
        );
    };

    match start_device_authorization(&env, &client_id, form.scope.as_deref()).await {
        Ok(session) => {
            let expires_in = (session.expires_at - OffsetDateTime::now_utc())
                .whole_seconds()
                .max(0);
            Json(DeviceAuthorizationBody {
                device_code: session.device_code,
                user_code: session.user_code,
                verification_uri: session.verification_uri,
                verification_uri_complete: session.verification_uri_complete,
                expires_in,
                interval: session.interval,
            })
            .into_response()
        }
        Err(e) => json_error(e),
    }
}

#[tracing::instrument(skip(env, headers, form))]
#[utoipa::path(
    post,
    path = "/device/token",
    tag = TOKENS_TAG,
    operation_id = "Device Token Poll",
    summary = "Poll for the tokens of a device authorization",
    description = "Relays one poll to Hydra's token endpoint. Nothing is cached: every poll asks Hydra.\n\n\
                   **Pending answers (RFC 8628 §3.5):**\n\
                   - `authorization_pending`: keep polling at `interval`\n\
                   - `slow_down`: keep polling at the increased `interval`\n\
                   - `access_denied`, `expired_token`: stop polling",
    request_body(
        content = DeviceTokenForm,
        content_type = "application/x-www-form-urlencoded",
        description = "Device code and client credentials"
    ),
    responses(
        (status = 200, description = "Tokens issued", body = TokenPair),
        (status = 400, description = "Authorization pending, slowed down, denied or expired", body = DevicePollError),
        (status = 503, description = "Hydra unavailable", body = ErrorResponse),
    )
)]
pub async fn token(
    State(env): State<Environment>,
    headers: HeaderMap,
    Form(form): Form<DeviceTokenForm>,
) -> Response {
    if let Some(grant_type) = form.grant_type.as_deref()
        && grant_type != DEVICE_CODE_GRANT
    {
        return oauth_error(StatusCode::BAD_REQUEST, "unsupported_grant_type", None);
    }

    let (client_id, client_secret) = client_credentials(&headers, form.client_id, form.client_secret);
    let (Some(client_id), Some(device_code)) = (client_id, form.device_code.filter(|c| !c.is_empty()))
    else {
        return oauth_error(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            Some("client_id and device_code are required".to_string()),
        );
    };

    let request = DevicePollRequest {
        device_code,
        client_id,
        client_secret,
        interval: form.interval.unwrap_or(DEFAULT_INTERVAL_SECS),
    };

    match poll_device_token(&env, &request).await {
        Ok(DevicePoll::Authorized(tokens)) => Json(tokens).into_response(),
        Ok(poll) => {
            let interval = match &poll {
                DevicePoll::Pending { interval } | DevicePoll::SlowDown { interval } => Some(*interval),
                _ => None,
            };
            let error = poll.error_code().unwrap_or("server_error").to_string();
            (StatusCode::BAD_REQUEST, Json(DevicePollError { error, interval })).into_response()
        }
        Err(e) => json_error(e),
    }
}
