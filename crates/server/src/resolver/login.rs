//! Login challenges.
//!
//! Two ways to obtain the subject, selected by `login.mode`:
//! - trust the caller-supplied subject ([`process_login`])
//! - authenticate with the upstream identity provider first
//!   ([`begin_upstream_login`] then [`complete_upstream_login`])

use super::{ChallengeFlow, Decision, RedirectResult, Rejection, Subject, resolve};
use crate::Environment;
use crate::config::LoginMode;
use crate::error::AppError;
use crate::hydra::ChallengeKind;
use crate::hydra::types::{AcceptLoginRequest, CompletedRequest, LoginRequest, RejectRequest};
use crate::identity::VerifiedIdentity;
use crate::logging::WideEvent;
use crate::session::{LoginState, generate_token, pkce_challenge};
use crate::wide_debug;
use serde_json::{Value, json};
use std::time::Duration;
use url::Url;

/// Result of authenticating the end user, fed into the login policy.
#[derive(Clone, Debug, PartialEq)]
pub enum Authentication {
    Verified {
        subject: Subject,
        /// Passed to Hydra and handed back on the consent request.
        context: Option<Value>,
    },
    Failed(Rejection),
}

impl Authentication {
    pub fn subject(subject: Subject) -> Self {
        Authentication::Verified {
            subject,
            context: None,
        }
    }
}

struct LoginFlow;

impl ChallengeFlow for LoginFlow {
    type Request = LoginRequest;
    type Input = Authentication;
    type Accept = AcceptLoginRequest;

    const KIND: ChallengeKind = ChallengeKind::Login;

    async fn fetch(&self, env: &Environment, challenge: &str) -> Result<LoginRequest, AppError> {
        env.hydra.get_login_request(challenge).await
    }

    fn inspect(&self, request: &LoginRequest, event: &WideEvent) {
        event.add_opt("client_id", request.client.as_ref().map(|c| &c.client_id));
        event.add("skip", request.skip);
        event.add("requested_scope", request.requested_scope.join(" "));
        wide_debug!(event, "fetched login request");
    }

    fn decide(
        &self,
        env: &Environment,
        request: &LoginRequest,
        input: Authentication,
    ) -> Decision<AcceptLoginRequest> {
        let policy = &env.config.login;
        let (subject, context) = match input {
            Authentication::Failed(rejection) => return Decision::Reject(rejection),
            Authentication::Verified { subject, context } => (subject, context),
        };

        // Hydra requires the remembered subject when it asks us to skip.
        let subject = match request.skip.then(|| request.subject.clone()).flatten() {
            Some(remembered) if !remembered.is_empty() => remembered,
            _ => subject.as_str().to_string(),
        };

        Decision::Accept(AcceptLoginRequest {
            subject,
            remember: policy.remember,
            remember_for: policy.remember_for,
            acr: policy.acr.clone(),
            context,
        })
    }

    async fn accept(
        &self,
        env: &Environment,
        challenge: &str,
        body: &AcceptLoginRequest,
    ) -> Result<CompletedRequest, AppError> {
        env.hydra.accept_login_request(challenge, body).await
    }

    async fn reject(
        &self,
        env: &Environment,
        challenge: &str,
        body: &RejectRequest,
    ) -> Result<CompletedRequest, AppError> {
        env.hydra.reject_login_request(challenge, body).await
    }
}

/// Resolve a login challenge for an already authenticated subject.
#[tracing::instrument(skip(env))]
pub async fn process_login(
    env: &Environment,
    challenge: &str,
    subject: Subject,
) -> Result<RedirectResult, AppError> {
    resolve(env, &LoginFlow, challenge, Authentication::subject(subject)).await
}

/// Resolve a login challenge with an arbitrary authentication outcome.
pub async fn resolve_login(
    env: &Environment,
    challenge: &str,
    authentication: Authentication,
) -> Result<RedirectResult, AppError> {
    resolve(env, &LoginFlow, challenge, authentication).await
}

/// What to do with the user-agent after a login challenge arrives.
#[derive(Clone, Debug, PartialEq)]
pub enum LoginStep {
    /// Hydra remembered the user; the challenge is already accepted.
    Completed(RedirectResult),
    /// Send the user-agent to the identity provider.
    Authenticate(Url),
    /// Ask the user-agent for a subject (trust-caller mode only).
    Prompt { client_name: Option<String> },
}

/// Subject Hydra asks us to reuse when it already authenticated the user.
fn remembered_subject(request: &LoginRequest) -> Option<Subject> {
    if !request.skip {
        return None;
    }
    request.subject.clone().and_then(Subject::new)
}

/// First step of a login challenge without a subject, in either login mode.
#[tracing::instrument(skip(env))]
pub async fn begin_login(env: &Environment, challenge: &str) -> Result<LoginStep, AppError> {
    if env.config.login.mode == LoginMode::Upstream {
        return begin_upstream_login(env, challenge).await;
    }

    let request = env.hydra.get_login_request(challenge).await?;
    if let Some(subject) = remembered_subject(&request) {
        tracing::debug!(%subject, "login skipped, accepting remembered subject");
        return process_login(env, challenge, subject)
            .await
            .map(LoginStep::Completed);
    }
    Ok(LoginStep::Prompt {
        client_name: request.client.and_then(|client| client.client_name),
    })
}

/// Start an upstream login: unless Hydra can skip authentication, store the
/// PKCE verifier under a fresh `state` and return the provider URL.
#[tracing::instrument(skip(env))]
pub async fn begin_upstream_login(env: &Environment, challenge: &str) -> Result<LoginStep, AppError> {
    let provider = env.identity.as_ref().ok_or_else(|| {
        AppError::UpstreamUnavailable("no upstream identity provider configured".into())
    })?;

    let request = env.hydra.get_login_request(challenge).await?;
    if let Some(subject) = remembered_subject(&request) {
        tracing::debug!(%subject, "login skipped, accepting remembered subject");
        return process_login(env, challenge, subject)
            .await
            .map(LoginStep::Completed);
    }

    let state = generate_token()?;
    let verifier = generate_token()?;
    let login_state = LoginState {
        login_challenge: challenge.to_string(),
        pkce_verifier: verifier,
    };
    env.sessions
        .set(
            &LoginState::key(&state),
            &login_state,
            Duration::from_secs(env.config.session.ttl_secs),
        )
        .await?;

    Ok(LoginStep::Authenticate(provider.authorization_url(
        &state,
        &pkce_challenge(&login_state.pkce_verifier),
    )))
}

/// Finish an upstream login from the provider callback.
#[tracing::instrument(skip(env, code))]
pub async fn complete_upstream_login(
    env: &Environment,
    state: &str,
    code: &str,
) -> Result<RedirectResult, AppError> {
    let provider = env.identity.as_ref().ok_or_else(|| {
        AppError::UpstreamUnavailable("no upstream identity provider configured".into())
    })?;
    let login_state = take_login_state(env, state).await?;

    let identity = provider
        .exchange_code(code, &login_state.pkce_verifier)
        .await?;
    let authentication = authenticate(env, identity);
    resolve_login(env, &login_state.login_challenge, authentication).await
}

/// The provider answered the callback with an error (e.g. the user cancelled).
#[tracing::instrument(skip(env))]
pub async fn abort_upstream_login(
    env: &Environment,
    state: &str,
    error: &str,
) -> Result<RedirectResult, AppError> {
    let login_state = take_login_state(env, state).await?;
    let rejection = Rejection::access_denied(format!("identity provider returned {error}"));
    resolve_login(
        env,
        &login_state.login_challenge,
        Authentication::Failed(rejection),
    )
    .await
}

async fn take_login_state(env: &Environment, state: &str) -> Result<LoginState, AppError> {
    env.sessions
        .take(&LoginState::key(state))
        .await?
        .ok_or_else(|| AppError::ChallengeNotFound(format!("no pending login for state {state}")))
}

fn authenticate(env: &Environment, identity: VerifiedIdentity) -> Authentication {
    if env.config.login.require_verified_email && !identity.email_verified {
        return Authentication::Failed(Rejection::access_denied(
            "upstream account has no verified email address",
        ));
    }
    match Subject::new(identity.subject) {
        Some(subject) => Authentication::Verified {
            subject,
            context: Some(json!({
                "email": identity.email,
                "email_verified": identity.email_verified,
                "name": identity.name,
            })),
        },
        None => Authentication::Failed(Rejection::access_denied(
            "identity provider returned an empty subject",
        )),
    }
}
