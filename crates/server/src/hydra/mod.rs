//! Client for the Ory Hydra admin and public APIs.
//!
//! Every method returns `Result<_, AppError>`: HTTP statuses, timeouts and
//! undecodable bodies are mapped here and nowhere else.

pub mod types;

use crate::config::HydraConfig;
use crate::error::AppError;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use types::*;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// The four kinds of challenge Hydra hands to the bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChallengeKind {
    Login,
    Consent,
    Logout,
    Device,
}

impl ChallengeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChallengeKind::Login => "login",
            ChallengeKind::Consent => "consent",
            ChallengeKind::Logout => "logout",
            ChallengeKind::Device => "device",
        }
    }

    /// Name of the query parameter carrying the challenge, e.g. `login_challenge`.
    pub fn query_param(self) -> &'static str {
        match self {
            ChallengeKind::Login => "login_challenge",
            ChallengeKind::Consent => "consent_challenge",
            ChallengeKind::Logout => "logout_challenge",
            ChallengeKind::Device => "device_challenge",
        }
    }
}

impl std::fmt::Display for ChallengeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct HydraClient {
    http: Client,
    admin_url: String,
    public_url: String,
}

impl HydraClient {
    pub fn new(config: &HydraConfig) -> Result<Self, AppError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(AppError::from_transport)?;
        Ok(Self::with_client(
            http,
            config.admin_url.as_str(),
            config.public_url.as_str(),
        ))
    }

    pub fn with_client(http: Client, admin_url: &str, public_url: &str) -> Self {
        Self {
            http,
            admin_url: admin_url.trim_end_matches('/').to_string(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    fn request_url(&self, kind: ChallengeKind, action: Option<&str>) -> String {
        match action {
            Some(action) => format!(
                "{}/admin/oauth2/auth/requests/{}/{}",
                self.admin_url,
                kind.as_str(),
                action
            ),
            None => format!("{}/admin/oauth2/auth/requests/{}", self.admin_url, kind.as_str()),
        }
    }

    async fn get_request<T: DeserializeOwned>(
        &self,
        kind: ChallengeKind,
        challenge: &str,
    ) -> Result<T, AppError> {
        let request = self
            .http
            .get(self.request_url(kind, None))
            .query(&[(kind.query_param(), challenge)]);
        send_json(request).await
    }

    async fn put_request<B: serde::Serialize + ?Sized>(
        &self,
        kind: ChallengeKind,
        action: &str,
        challenge: &str,
        body: &B,
    ) -> Result<CompletedRequest, AppError> {
        let request = self
            .http
            .put(self.request_url(kind, Some(action)))
            .query(&[(kind.query_param(), challenge)])
            .json(body);
        send_json(request).await
    }

    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn get_login_request(&self, challenge: &str) -> Result<LoginRequest, AppError> {
        self.get_request(ChallengeKind::Login, challenge).await
    }

    #[tracing::instrument(skip(self, body), level = "debug")]
    pub async fn accept_login_request(
        &self,
        challenge: &str,
        body: &AcceptLoginRequest,
    ) -> Result<CompletedRequest, AppError> {
        self.put_request(ChallengeKind::Login, "accept", challenge, body)
            .await
    }

    #[tracing::instrument(skip(self, body), level = "debug")]
    pub async fn reject_login_request(
        &self,
        challenge: &str,
        body: &RejectRequest,
    ) -> Result<CompletedRequest, AppError> {
        self.put_request(ChallengeKind::Login, "reject", challenge, body)
            .await
    }

    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn get_consent_request(&self, challenge: &str) -> Result<ConsentRequest, AppError> {
        self.get_request(ChallengeKind::Consent, challenge).await
    }

    #[tracing::instrument(skip(self, body), level = "debug")]
    pub async fn accept_consent_request(
        &self,
        challenge: &str,
        body: &AcceptConsentRequest,
    ) -> Result<CompletedRequest, AppError> {
        self.put_request(ChallengeKind::Consent, "accept", challenge, body)
            .await
    }

    #[tracing::instrument(skip(self, body), level = "debug")]
    pub async fn reject_consent_request(
        &self,
        challenge: &str,
        body: &RejectRequest,
    ) -> Result<CompletedRequest, AppError> {
        self.put_request(ChallengeKind::Consent, "reject", challenge, body)
            .await
    }

    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn get_logout_request(&self, challenge: &str) -> Result<LogoutRequest, AppError> {
        self.get_request(ChallengeKind::Logout, challenge).await
    }

    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn accept_logout_request(&self, challenge: &str) -> Result<CompletedRequest, AppError> {
        let request = self
            .http
            .put(self.request_url(ChallengeKind::Logout, Some("accept")))
            .query(&[(ChallengeKind::Logout.query_param(), challenge)]);
        send_json(request).await
    }

    #[tracing::instrument(skip(self, body), level = "debug")]
    pub async fn accept_device_request(
        &self,
        challenge: &str,
        body: &AcceptDeviceRequest,
    ) -> Result<CompletedRequest, AppError> {
        self.put_request(ChallengeKind::Device, "accept", challenge, body)
            .await
    }

    #[tracing::instrument(skip(self, body), level = "debug", fields(client_name = %body.client_name))]
    pub async fn create_client(
        &self,
        body: &CreateClientRequest,
    ) -> Result<RegisteredClient, AppError> {
        let request = self
            .http
            .post(format!("{}/admin/clients", self.admin_url))
            .json(body);
        send_json(request).await
    }

    /// `POST /oauth2/device/auth` on the public API.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn device_authorization(
        &self,
        client_id: &str,
        scope: Option<&str>,
    ) -> Result<DeviceAuthorizationResponse, AppError> {
        let mut form = vec![("client_id", client_id)];
        if let Some(scope) = scope {
            form.push(("scope", scope));
        }
        let request = self
            .http
            .post(format!("{}/oauth2/device/auth", self.public_url))
            .form(&form);
        send_json(request).await
    }

    /// `POST /oauth2/token` on the public API.
    ///
    /// OAuth error bodies (400/401) are not failures here: they are returned as
    /// [`TokenEndpointResponse::Error`] for the calling flow to interpret.
    pub async fn token(
        &self,
        form: &[(&str, &str)],
        basic_auth: Option<(&str, &str)>,
    ) -> Result<TokenEndpointResponse, AppError> {
        let mut request = self
            .http
            .post(format!("{}/oauth2/token", self.public_url))
            .form(form);
        if let Some((client_id, client_secret)) = basic_auth {
            request = request.basic_auth(client_id, Some(client_secret));
        }

        let response = request.send().await.map_err(AppError::from_transport)?;
        let status = response.status();
        let body = response.bytes().await.map_err(AppError::from_transport)?;

        if status.is_success() {
            let pair: TokenPair = serde_json::from_slice(&body).map_err(AppError::from_decode)?;
            return Ok(TokenEndpointResponse::Issued(pair));
        }
        if matches!(status, StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED) {
            if let Ok(error) = serde_json::from_slice::<OAuthErrorBody>(&body) {
                return Ok(TokenEndpointResponse::Error(error));
            }
        }
        Err(AppError::from_status(status, &body))
    }
}

/// Send a request and decode a JSON success body, mapping every failure into
/// the [`AppError`] taxonomy.
pub(crate) async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, AppError> {
    let response = request.send().await.map_err(AppError::from_transport)?;
    let status = response.status();
    let body = response.bytes().await.map_err(AppError::from_transport)?;

    if !status.is_success() {
        return Err(AppError::from_status(status, &body));
    }
    serde_json::from_slice(&body).map_err(AppError::from_decode)
}
