//! Login endpoints.
//!
//! - `GET /login` - Hydra's login URL
//! - `POST /login` - subject form in trust-caller mode

use crate::Environment;
use crate::config::LoginMode;
use crate::error::AppError;
use crate::resolver::{LoginStep, Subject, begin_login, process_login};
use crate::routes::FLOWS_TAG;
use crate::views;
use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub login_challenge: Option<String>,
    pub subject: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginForm {
    pub login_challenge: String,
    #[serde(default)]
    pub subject: String,
}

fn missing_challenge() -> Response {
    views::error_page(
        StatusCode::BAD_REQUEST,
        "Missing login challenge",
        "This page must be opened through the authorization server.",
    )
}

/// Entry point Hydra redirects to with a login challenge.
#[tracing::instrument(skip(env))]
#[utoipa::path(
    get,
    path = "/login",
    tag = FLOWS_TAG,
    operation_id = "Login",
    summary = "Handle a Hydra login challenge",
    description = "In `trust_caller` mode a `subject` query parameter accepts the challenge directly; \
                   without one a subject form is shown unless Hydra can skip authentication.\n\n\
                   In `upstream` mode the user-agent is sent to the identity provider.",
    params(
        ("login_challenge" = String, Query, description = "Login challenge issued by Hydra."),
        ("subject" = Option<String>, Query, description = "Subject to log in (trust_caller mode)."),
    ),
    responses(
        (status = 200, description = "Subject form"),
        (status = 303, description = "Redirect to Hydra or the identity provider"),
        (status = 400, description = "Missing challenge"),
        (status = 404, description = "Unknown or expired challenge"),
        (status = 409, description = "Challenge already resolved"),
        (status = 502, description = "Hydra unavailable"),
    )
)]
pub async fn login_page(State(env): State<Environment>, Query(params): Query<LoginQuery>) -> Response {
    let Some(challenge) = params.login_challenge.filter(|c| !c.is_empty()) else {
        return missing_challenge();
    };

    let subject = params.subject.and_then(Subject::new);
    if let (LoginMode::TrustCaller, Some(subject)) = (env.config.login.mode, subject) {
        return match process_login(&env, &challenge, subject).await {
            Ok(redirect) => Redirect::to(redirect.as_str()).into_response(),
            Err(e) => e.into_response(),
        };
    }

    match begin_login(&env, &challenge).await {
        Ok(LoginStep::Completed(redirect)) => Redirect::to(redirect.as_str()).into_response(),
        Ok(LoginStep::Authenticate(url)) => Redirect::to(url.as_str()).into_response(),
        Ok(LoginStep::Prompt { client_name }) => {
            views::login_page(&challenge, client_name.as_deref(), None)
        }
        Err(e) => e.into_response(),
    }
}

/// Subject form submission.
#[tracing::instrument(skip(env, form), fields(login_challenge = %form.login_challenge))]
#[utoipa::path(
    post,
    path = "/login",
    tag = FLOWS_TAG,
    operation_id = "Login Submit",
    summary = "Accept a login challenge with a caller-supplied subject",
    description = "Only available in `trust_caller` mode. The subject is not verified.",
    request_body(
        content = LoginForm,
        content_type = "application/x-www-form-urlencoded",
        description = "Login challenge and subject"
    ),
    responses(
        (status = 303, description = "Redirect to Hydra"),
        (status = 400, description = "Empty subject, form shown again"),
        (status = 403, description = "Login form disabled in upstream mode"),
    )
)]
pub async fn login_submit(State(env): State<Environment>, Form(form): Form<LoginForm>) -> Response {
    if form.login_challenge.is_empty() {
        return missing_challenge();
    }
    if env.config.login.mode != LoginMode::TrustCaller {
        return AppError::policy("login with a caller-supplied subject is disabled").into_response();
    }

    let Some(subject) = Subject::new(form.subject) else {
        return views::login_page(&form.login_challenge, None, Some("Enter a user identifier."));
    };

    match process_login(&env, &form.login_challenge, subject).await {
        Ok(redirect) => Redirect::to(redirect.as_str()).into_response(),
        Err(e) => e.into_response(),
    }
}
