//! HTML views. Presentation only: they render what the resolver produced.

use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

const STYLESHEET: &str =
    "https://cdn.jsdelivr.net/npm/govuk-frontend@5.14.0/dist/govuk/govuk-frontend.min.css";

#[derive(Template)]
#[template(
    ext = "html",
    source = r#"<!DOCTYPE html>
<html lang="en" class="govuk-template">
<head>
    <meta charset="utf-8">
    <title>{{ heading }} - Sign in</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <link rel="stylesheet" href="{{ stylesheet|safe }}">
</head>
<body class="govuk-template__body">
    <div class="govuk-width-container">
        <main class="govuk-main-wrapper" id="main-content">
            <h1 class="govuk-heading-l">{{ heading }}</h1>
            <p class="govuk-body">{{ message }}</p>
        </main>
    </div>
</body>
</html>"#
)]
pub struct ErrorPage<'a> {
    pub stylesheet: &'a str,
    pub heading: &'a str,
    pub message: &'a str,
}

/// Subject form shown in trust-caller mode when no subject was supplied.
#[derive(Template)]
#[template(
    ext = "html",
    source = r#"<!DOCTYPE html>
<html lang="en" class="govuk-template">
<head>
    <meta charset="utf-8">
    <title>Sign in</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <link rel="stylesheet" href="{{ stylesheet|safe }}">
</head>
<body class="govuk-template__body">
    <div class="govuk-width-container">
        <main class="govuk-main-wrapper" id="main-content">
            <h1 class="govuk-heading-l">Sign in{% if let Some(name) = client_name %} to {{ name }}{% endif %}</h1>
            {% if let Some(error) = error %}<p class="govuk-error-message">{{ error }}</p>{% endif %}
            <form method="post" action="/login">
                <input type="hidden" name="login_challenge" value="{{ login_challenge }}">
                <label class="govuk-label" for="subject">User identifier</label>
                <input class="govuk-input" id="subject" name="subject" type="text" autocomplete="username">
                <button class="govuk-button" type="submit">Continue</button>
            </form>
        </main>
    </div>
</body>
</html>"#
)]
pub struct LoginPage<'a> {
    pub stylesheet: &'a str,
    pub login_challenge: &'a str,
    pub client_name: Option<&'a str>,
    pub error: Option<&'a str>,
}

#[derive(Template)]
#[template(
    ext = "html",
    source = r#"<!DOCTYPE html>
<html lang="en" class="govuk-template">
<head>
    <meta charset="utf-8">
    <title>Connect a device</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <link rel="stylesheet" href="{{ stylesheet|safe }}">
</head>
<body class="govuk-template__body">
    <div class="govuk-width-container">
        <main class="govuk-main-wrapper" id="main-content">
            <h1 class="govuk-heading-l">Connect a device</h1>
            <p class="govuk-body">Enter the code shown on your device.</p>
            {% if let Some(error) = error %}<p class="govuk-error-message">{{ error }}</p>{% endif %}
            <form method="post" action="/device/verify">
                <input type="hidden" name="device_challenge" value="{{ device_challenge }}">
                <label class="govuk-label" for="user_code">Code</label>
                <input class="govuk-input" id="user_code" name="user_code" type="text" value="{{ user_code }}" autocomplete="off">
                <button class="govuk-button" type="submit">Continue</button>
            </form>
        </main>
    </div>
</body>
</html>"#
)]
pub struct DeviceVerifyPage<'a> {
    pub stylesheet: &'a str,
    pub device_challenge: &'a str,
    pub user_code: &'a str,
    pub error: Option<&'a str>,
}

#[derive(Template)]
#[template(
    ext = "html",
    source = r#"<!DOCTYPE html>
<html lang="en" class="govuk-template">
<head>
    <meta charset="utf-8">
    <title>Device connected</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <link rel="stylesheet" href="{{ stylesheet|safe }}">
</head>
<body class="govuk-template__body">
    <div class="govuk-width-container">
        <main class="govuk-main-wrapper" id="main-content">
            <h1 class="govuk-heading-l">Device connected</h1>
            <p class="govuk-body">You can close this window and return to your device.</p>
        </main>
    </div>
</body>
</html>"#
)]
pub struct DeviceSuccessPage<'a> {
    pub stylesheet: &'a str,
}

/// Render a template, falling back to a plain 500 if rendering fails.
pub fn render<T: Template>(status: StatusCode, template: &T) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!("Failed to render template: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

pub fn error_page(status: StatusCode, heading: &str, message: &str) -> Response {
    render(
        status,
        &ErrorPage {
            stylesheet: STYLESHEET,
            heading,
            message,
        },
    )
}

pub fn login_page(login_challenge: &str, client_name: Option<&str>, error: Option<&str>) -> Response {
    let status = if error.is_some() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    render(
        status,
        &LoginPage {
            stylesheet: STYLESHEET,
            login_challenge,
            client_name,
            error,
        },
    )
}

pub fn device_verify_page(device_challenge: &str, user_code: &str, error: Option<&str>) -> Response {
    let status = if error.is_some() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    render(
        status,
        &DeviceVerifyPage {
            stylesheet: STYLESHEET,
            device_challenge,
            user_code,
            error,
        },
    )
}

pub fn device_success_page() -> Response {
    render(
        StatusCode::OK,
        &DeviceSuccessPage {
            stylesheet: STYLESHEET,
        },
    )
}
