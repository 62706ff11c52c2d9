//! Wire types for the Hydra admin and public APIs.
//!
//! Only the fields the bridge reads or writes are modelled; everything else in
//! Hydra's responses is ignored during deserialization.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

#[derive(Clone, Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct OAuth2ClientRef {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_name: Option<String>,
}

/// `GET /admin/oauth2/auth/requests/login`
#[derive(Clone, Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub challenge: Option<String>,
    #[serde(default)]
    pub client: Option<OAuth2ClientRef>,
    /// Hydra already authenticated this user-agent; the remembered subject must be used.
    #[serde(default)]
    pub skip: bool,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub requested_scope: Vec<String>,
    #[serde(default)]
    pub requested_access_token_audience: Vec<String>,
    #[serde(default)]
    pub request_url: Option<String>,
}

/// `GET /admin/oauth2/auth/requests/consent`
#[derive(Clone, Debug, Deserialize)]
pub struct ConsentRequest {
    #[serde(default)]
    pub challenge: Option<String>,
    #[serde(default)]
    pub client: Option<OAuth2ClientRef>,
    #[serde(default)]
    pub skip: bool,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub requested_scope: Vec<String>,
    #[serde(default)]
    pub requested_access_token_audience: Vec<String>,
    /// Whatever was passed as `context` when the login was accepted.
    #[serde(default)]
    pub context: Option<Value>,
}

/// `GET /admin/oauth2/auth/requests/logout`
#[derive(Clone, Debug, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub challenge: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub sid: Option<String>,
    #[serde(default)]
    pub rp_initiated: bool,
    #[serde(default)]
    pub client: Option<OAuth2ClientRef>,
}

/// Body of `PUT .../login/accept`.
#[derive(Clone, Debug, Serialize)]
pub struct AcceptLoginRequest {
    pub subject: String,
    pub remember: bool,
    pub remember_for: i64,
    pub acr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct ConsentSession {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<Value>,
}

/// Body of `PUT .../consent/accept`.
#[derive(Clone, Debug, Serialize)]
pub struct AcceptConsentRequest {
    pub grant_scope: Vec<String>,
    pub grant_access_token_audience: Vec<String>,
    pub remember: bool,
    pub remember_for: i64,
    pub session: ConsentSession,
}

/// Body of `PUT .../device/accept`.
#[derive(Clone, Debug, Serialize)]
pub struct AcceptDeviceRequest {
    pub user_code: String,
}

/// Body of every `PUT .../reject` call.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct RejectRequest {
    pub error: String,
    pub error_description: String,
    pub status_code: u16,
}

/// Response of every accept/reject call.
#[derive(Clone, Debug, Deserialize)]
pub struct CompletedRequest {
    #[serde(default)]
    pub redirect_to: Option<String>,
}

/// Body of `POST /admin/clients`.
#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateClientRequest {
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    #[serde(default = "default_grant_types")]
    pub grant_types: Vec<String>,
    #[serde(default = "default_response_types")]
    pub response_types: Vec<String>,
    #[serde(default = "default_client_scope")]
    pub scope: String,
    #[serde(default = "default_auth_method")]
    pub token_endpoint_auth_method: String,
}

fn default_grant_types() -> Vec<String> {
    vec!["authorization_code".into(), "refresh_token".into()]
}

fn default_response_types() -> Vec<String> {
    vec!["code".into()]
}

fn default_client_scope() -> String {
    "openid offline email profile".into()
}

fn default_auth_method() -> String {
    "client_secret_basic".into()
}

/// Response of `POST /admin/clients`.
#[derive(Clone, Debug, Deserialize, Serialize, ToSchema)]
pub struct RegisteredClient {
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub grant_types: Vec<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Successful token endpoint response.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "bearer".into()
}

/// RFC 6749 §5.2 error body.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, ToSchema)]
pub struct OAuthErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

/// Outcome of one call to the token endpoint.
#[derive(Clone, Debug)]
pub enum TokenEndpointResponse {
    Issued(TokenPair),
    Error(OAuthErrorBody),
}

/// RFC 8628 §3.2 device authorization response.
#[derive(Clone, Debug, Deserialize)]
pub struct DeviceAuthorizationResponse {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default)]
    pub verification_uri_complete: Option<String>,
    pub expires_in: i64,
    #[serde(default)]
    pub interval: Option<u64>,
}
