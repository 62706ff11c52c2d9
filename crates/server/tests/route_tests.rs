//! HTTP surface tests: axum-test against the real router, wiremock as Hydra.

mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use common::{test_config, test_env, upstream_test_config};
use hydra_login_bridge::config::AppConfig;
use hydra_login_bridge::routes::app;
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn server_for(config: AppConfig) -> TestServer {
    let env = test_env(config).await;
    TestServer::new(app(env)).expect("test server")
}

fn location(response: &axum_test::TestResponse) -> String {
    response
        .header("location")
        .to_str()
        .expect("ascii location")
        .to_string()
}

async fn mount_redirect(hydra: &MockServer, http_method: &str, at: &str, redirect_to: &str) {
    Mock::given(method(http_method))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"redirect_to": redirect_to})))
        .mount(hydra)
        .await;
}

#[tokio::test]
async fn health_check() {
    let hydra = MockServer::start().await;
    let server = server_for(test_config(&hydra.uri())).await;

    let response = server.get("/healthz").await;
    response.assert_status_ok();
    response.assert_text("ok");
}

#[tokio::test]
async fn api_docs_are_served() {
    let hydra = MockServer::start().await;
    let server = server_for(test_config(&hydra.uri())).await;

    server.get("/api-docs").await.assert_status_ok();
}

#[tokio::test]
async fn login_without_challenge_is_bad_request() {
    let hydra = MockServer::start().await;
    let server = server_for(test_config(&hydra.uri())).await;

    let response = server.get("/login").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_with_subject_redirects_to_hydra() {
    let hydra = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/oauth2/auth/requests/login"))
        .and(query_param("login_challenge", "chal-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"client": {"client_id": "c1"}})))
        .mount(&hydra)
        .await;
    Mock::given(method("PUT"))
        .and(path("/admin/oauth2/auth/requests/login/accept"))
        .and(body_partial_json(json!({"subject": "user-42"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"redirect_to": "https://op/cb?code=xyz"})),
        )
        .expect(1)
        .mount(&hydra)
        .await;
    let server = server_for(test_config(&hydra.uri())).await;

    let response = server
        .get("/login")
        .add_query_param("login_challenge", "chal-123")
        .add_query_param("subject", "user-42")
        .await;

    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "https://op/cb?code=xyz");
}

#[tokio::test]
async fn login_without_subject_shows_form() {
    let hydra = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/oauth2/auth/requests/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "client": {"client_id": "c1", "client_name": "Demo App"}
        })))
        .mount(&hydra)
        .await;
    let server = server_for(test_config(&hydra.uri())).await;

    let response = server
        .get("/login")
        .add_query_param("login_challenge", "chal-123")
        .await;

    response.assert_status_ok();
    let html = response.text();
    assert!(html.contains(r#"value="chal-123""#));
    assert!(html.contains("Demo App"));
}

#[tokio::test]
async fn login_form_submission() {
    let hydra = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/oauth2/auth/requests/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&hydra)
        .await;
    Mock::given(method("PUT"))
        .and(path("/admin/oauth2/auth/requests/login/accept"))
        .and(body_partial_json(json!({"subject": "alice"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"redirect_to": "https://op/cb"})))
        .expect(1)
        .mount(&hydra)
        .await;
    let server = server_for(test_config(&hydra.uri())).await;

    let blank = server
        .post("/login")
        .form(&[("login_challenge", "chal-1"), ("subject", "  ")])
        .await;
    blank.assert_status(StatusCode::BAD_REQUEST);
    assert!(blank.text().contains("Enter a user identifier"));

    let response = server
        .post("/login")
        .form(&[("login_challenge", "chal-1"), ("subject", "alice")])
        .await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "https://op/cb");
}

#[tokio::test]
async fn upstream_mode_redirects_to_provider_and_disables_form() {
    let hydra = MockServer::start().await;
    let idp = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/oauth2/auth/requests/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&hydra)
        .await;
    let server = server_for(upstream_test_config(&hydra.uri(), &idp.uri())).await;

    let response = server
        .get("/login")
        .add_query_param("login_challenge", "chal-1")
        .add_query_param("subject", "ignored")
        .await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with(&format!("{}/auth?", idp.uri())));

    let response = server
        .post("/login")
        .form(&[("login_challenge", "chal-1"), ("subject", "mallory")])
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn callback_requires_known_state() {
    let hydra = MockServer::start().await;
    let idp = MockServer::start().await;
    let server = server_for(upstream_test_config(&hydra.uri(), &idp.uri())).await;

    server
        .get("/callback")
        .add_query_param("code", "abc")
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .get("/callback")
        .add_query_param("state", "forged")
        .add_query_param("code", "abc")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn consent_errors_render_pages() {
    let hydra = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/oauth2/auth/requests/consent"))
        .and(query_param("consent_challenge", "missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "Not Found"})))
        .mount(&hydra)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/oauth2/auth/requests/consent"))
        .and(query_param("consent_challenge", "broken"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&hydra)
        .await;
    let server = server_for(test_config(&hydra.uri())).await;

    server
        .get("/consent")
        .add_query_param("consent_challenge", "missing")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .get("/consent")
        .add_query_param("consent_challenge", "broken")
        .await
        .assert_status(StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn consent_rejection_follows_hydra_redirect() {
    let hydra = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/oauth2/auth/requests/consent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "client": {"client_id": "c1"},
            "requested_scope": ["admin"]
        })))
        .mount(&hydra)
        .await;
    mount_redirect(
        &hydra,
        "PUT",
        "/admin/oauth2/auth/requests/consent/reject",
        "https://op/cb?error=access_denied",
    )
    .await;
    let server = server_for(test_config(&hydra.uri())).await;

    let response = server
        .get("/consent")
        .add_query_param("consent_challenge", "consent-1")
        .await;

    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "https://op/cb?error=access_denied");
}

#[tokio::test]
async fn logout_redirects() {
    let hydra = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/oauth2/auth/requests/logout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"subject": "user-42"})))
        .mount(&hydra)
        .await;
    mount_redirect(
        &hydra,
        "PUT",
        "/admin/oauth2/auth/requests/logout/accept",
        "https://op/logged-out",
    )
    .await;
    let server = server_for(test_config(&hydra.uri())).await;

    let response = server
        .get("/logout")
        .add_query_param("logout_challenge", "logout-1")
        .await;

    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "https://op/logged-out");
}

#[tokio::test]
async fn device_verify_without_challenge_goes_to_hydra() {
    let hydra = MockServer::start().await;
    let server = server_for(test_config(&hydra.uri())).await;

    let response = server
        .get("/device/verify")
        .add_query_param("user_code", "ABCD-EFGH")
        .await;

    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        format!("{}/oauth2/device/verify?user_code=ABCD-EFGH", hydra.uri())
    );
}

#[tokio::test]
async fn device_verify_form_round_trip() {
    let hydra = MockServer::start().await;
    mount_redirect(
        &hydra,
        "PUT",
        "/admin/oauth2/auth/requests/device/accept",
        "https://op/oauth2/auth?device=1",
    )
    .await;
    let server = server_for(test_config(&hydra.uri())).await;

    let page = server
        .get("/device/verify")
        .add_query_param("device_challenge", "dev-1")
        .await;
    page.assert_status_ok();
    assert!(page.text().contains(r#"value="dev-1""#));

    server
        .post("/device/verify")
        .form(&[("device_challenge", "dev-1"), ("user_code", "")])
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post("/device/verify")
        .form(&[("device_challenge", "dev-1"), ("user_code", "ABCD-EFGH")])
        .await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "https://op/oauth2/auth?device=1");

    server.get("/device/success").await.assert_status_ok();
}

#[tokio::test]
async fn device_authorize_and_poll() {
    let hydra = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/device/auth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_code": "device-code-1",
            "user_code": "ABCD-EFGH",
            "verification_uri": "https://op/oauth2/device/verify",
            "expires_in": 600,
            "interval": 5
        })))
        .mount(&hydra)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "slow_down"})))
        .mount(&hydra)
        .await;
    let server = server_for(test_config(&hydra.uri())).await;

    let started = server
        .post("/device/authorize")
        .form(&[("client_id", "tv-app"), ("scope", "openid")])
        .await;
    started.assert_status_ok();
    let body: Value = started.json();
    assert_eq!(body["user_code"], "ABCD-EFGH");
    assert_eq!(body["interval"], 5);
    assert!(body["expires_in"].as_i64().unwrap() > 590);

    let poll = server
        .post("/device/token")
        .form(&[
            ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
            ("device_code", "device-code-1"),
            ("client_id", "tv-app"),
        ])
        .await;
    poll.assert_status(StatusCode::BAD_REQUEST);
    poll.assert_json(&json!({"error": "slow_down", "interval": 10}));

    server
        .post("/device/token")
        .form(&[("grant_type", "password"), ("client_id", "tv-app")])
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn refresh_relay_maps_invalid_grant() {
    let hydra = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "expired"
        })))
        .mount(&hydra)
        .await;
    let server = server_for(test_config(&hydra.uri())).await;

    let response = server
        .post("/token/refresh")
        .form(&[("refresh_token", "rt-old"), ("client_id", "web-app")])
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_json(&json!({"error": "invalid_grant", "error_description": "expired"}));

    server
        .post("/token/refresh")
        .form(&[("refresh_token", "rt-old")])
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn refresh_relay_reports_outage() {
    let hydra = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&hydra)
        .await;
    let server = server_for(test_config(&hydra.uri())).await;

    let response = server
        .post("/token/refresh")
        .form(&[("refresh_token", "rt-1"), ("client_id", "web-app")])
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["error"], "temporarily_unavailable");
}

#[tokio::test]
async fn test_client_route_is_opt_in() {
    let hydra = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/admin/clients"))
        .and(body_partial_json(json!({
            "client_name": "integration",
            "redirect_uris": ["http://localhost:8080/cb"]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "client_id": "generated-id",
            "client_secret": "generated-secret",
            "client_name": "integration",
            "redirect_uris": ["http://localhost:8080/cb"],
            "grant_types": ["authorization_code", "refresh_token"]
        })))
        .expect(1)
        .mount(&hydra)
        .await;
    let body = json!({
        "client_name": "integration",
        "redirect_uris": ["http://localhost:8080/cb"]
    });

    let disabled = server_for(test_config(&hydra.uri())).await;
    disabled
        .post("/test/clients")
        .json(&body)
        .await
        .assert_status_not_found();

    let mut config = test_config(&hydra.uri());
    config.enable_test_routes = true;
    let enabled = server_for(config).await;
    let response = enabled.post("/test/clients").json(&body).await;

    response.assert_status(StatusCode::CREATED);
    let client: Value = response.json();
    assert_eq!(client["client_id"], "generated-id");
    assert_eq!(client["client_secret"], "generated-secret");
}
