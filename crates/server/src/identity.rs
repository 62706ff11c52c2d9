//! Upstream OpenID Connect identity provider (Google by default).
//!
//! The bridge uses the provider for one thing: turning an authorization code
//! into a verified subject. The code is exchanged with PKCE and the identity is
//! read from the userinfo endpoint with the resulting access token.

use crate::config::UpstreamConfig;
use crate::error::AppError;
use crate::hydra::send_json;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Identity asserted by the upstream provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub subject: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CodeExchangeResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Clone, Debug)]
pub struct UpstreamProvider {
    http: Client,
    config: UpstreamConfig,
}

impl UpstreamProvider {
    pub fn new(config: UpstreamConfig) -> Result<Self, AppError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(AppError::from_transport)?;
        Ok(Self { http, config })
    }

    /// Authorization URL the user-agent is sent to, bound to `state` and the
    /// PKCE S256 `code_challenge`.
    pub fn authorization_url(&self, state: &str, code_challenge: &str) -> Url {
        let mut url = self.config.authorization_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", self.config.redirect_uri.as_str())
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", state)
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "S256");
        url
    }

    #[tracing::instrument(skip_all)]
    pub async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: &str,
    ) -> Result<VerifiedIdentity, AppError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code_verifier", pkce_verifier),
        ];
        let tokens: CodeExchangeResponse = send_json(
            self.http
                .post(self.config.token_endpoint.clone())
                .form(&form),
        )
        .await
        .map_err(upstream_login_error)?;

        let info: UserInfo = send_json(
            self.http
                .get(self.config.userinfo_endpoint.clone())
                .bearer_auth(&tokens.access_token),
        )
        .await
        .map_err(upstream_login_error)?;

        if info.sub.is_empty() {
            return Err(AppError::MalformedUpstreamResponse(
                "identity provider returned an empty subject".into(),
            ));
        }

        Ok(VerifiedIdentity {
            subject: info.sub,
            email: info.email,
            email_verified: info.email_verified.unwrap_or(false),
            name: info.name,
        })
    }
}

/// The identity provider has no challenges, so "not found" and "already
/// resolved" statuses from it only mean it refused the exchange.
fn upstream_login_error(err: AppError) -> AppError {
    match err {
        AppError::ChallengeNotFound(detail) | AppError::ChallengeAlreadyResolved(detail) => {
            AppError::UpstreamUnavailable(format!("identity provider: {detail}"))
        }
        other => other,
    }
}
