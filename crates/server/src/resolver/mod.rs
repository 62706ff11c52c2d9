//! Challenge resolution.
//!
//! Every challenge-based flow runs the same five steps, strictly in order:
//!
//! 1. fetch the challenge metadata from Hydra
//! 2. inspect it (logging only)
//! 3. decide accept or reject with the flow's policy
//! 4. submit the decision to Hydra
//! 5. extract the `redirect_to` Hydra answers with
//!
//! The first failing step ends the flow; nothing is retried. A rejection is
//! still submitted so the challenge never stays pending, then surfaces as
//! [`AppError::PolicyRejected`] carrying Hydra's redirect.

pub mod consent;
pub mod device;
pub mod login;
pub mod logout;
pub mod refresh;

pub use consent::process_consent;
pub use device::{
    DevicePoll, DevicePollRequest, DeviceSession, poll_device_token, process_device_authorization,
    start_device_authorization,
};
pub use login::{
    Authentication, LoginStep, abort_upstream_login, begin_login, begin_upstream_login,
    complete_upstream_login, process_login, resolve_login,
};
pub use logout::process_logout;
pub use refresh::{RefreshOutcome, RefreshRequest, process_token_refresh};

use crate::Environment;
use crate::error::AppError;
use crate::hydra::ChallengeKind;
use crate::hydra::types::{CompletedRequest, RejectRequest};
use crate::logging::WideEvent;
use serde::Serialize;
use std::fmt;

/// URL Hydra wants the user-agent sent to next. Passed through unmodified.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RedirectResult(String);

impl RedirectResult {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RedirectResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<&str> for RedirectResult {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl CompletedRequest {
    pub fn into_redirect(self) -> Result<RedirectResult, AppError> {
        match self.redirect_to {
            Some(url) if !url.is_empty() => Ok(RedirectResult(url)),
            _ => Err(AppError::MalformedUpstreamResponse(
                "response has no redirect_to".into(),
            )),
        }
    }
}

/// Authenticated end-user identifier. Never empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subject(String);

impl Subject {
    /// Returns `None` for an empty or whitespace-only subject.
    pub fn new(subject: impl Into<String>) -> Option<Self> {
        let subject = subject.into();
        let trimmed = subject.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == subject.len() {
            Some(Self(subject))
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a challenge is being rejected. Sent to Hydra verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejection {
    pub error: String,
    pub description: String,
    pub status_code: u16,
}

impl Rejection {
    pub fn access_denied(description: impl Into<String>) -> Self {
        Self {
            error: "access_denied".into(),
            description: description.into(),
            status_code: 403,
        }
    }

    fn to_request(&self) -> RejectRequest {
        RejectRequest {
            error: self.error.clone(),
            error_description: self.description.clone(),
            status_code: self.status_code,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Decision<A> {
    Accept(A),
    Reject(Rejection),
}

/// One challenge-based flow. Implementations only describe their steps;
/// [`resolve`] sequences them.
pub(crate) trait ChallengeFlow {
    type Request: Send + Sync;
    type Input: Send;
    type Accept: Send + Sync;

    const KIND: ChallengeKind;

    fn fetch(
        &self,
        env: &Environment,
        challenge: &str,
    ) -> impl Future<Output = Result<Self::Request, AppError>> + Send;

    /// Record decision-relevant fields. Must not change any state.
    fn inspect(&self, request: &Self::Request, event: &WideEvent);

    fn decide(
        &self,
        env: &Environment,
        request: &Self::Request,
        input: Self::Input,
    ) -> Decision<Self::Accept>;

    /// Record what an accept decision grants. Called before submitting.
    fn record_accept(&self, _body: &Self::Accept, _event: &WideEvent) {}

    fn accept(
        &self,
        env: &Environment,
        challenge: &str,
        body: &Self::Accept,
    ) -> impl Future<Output = Result<CompletedRequest, AppError>> + Send;

    fn reject(
        &self,
        env: &Environment,
        challenge: &str,
        body: &RejectRequest,
    ) -> impl Future<Output = Result<CompletedRequest, AppError>> + Send;
}

pub(crate) async fn resolve<F: ChallengeFlow + Sync>(
    env: &Environment,
    flow: &F,
    challenge: &str,
    input: F::Input,
) -> Result<RedirectResult, AppError> {
    let event = env.logger.flow(F::KIND.as_str());
    event.add("challenge", challenge);

    let result = run_steps(env, flow, challenge, input, &event).await;
    match &result {
        Ok(_) => {
            event.add("outcome", "resolved");
            event.info("challenge resolved");
        }
        Err(err) => {
            event.add("outcome", err.kind());
            event.add("error", err);
            event.warn("challenge resolution failed");
        }
    }
    result
}

async fn run_steps<F: ChallengeFlow + Sync>(
    env: &Environment,
    flow: &F,
    challenge: &str,
    input: F::Input,
    event: &WideEvent,
) -> Result<RedirectResult, AppError> {
    let request = flow.fetch(env, challenge).await?;
    flow.inspect(&request, event);

    match flow.decide(env, &request, input) {
        Decision::Accept(body) => {
            event.add("decision", "accept");
            flow.record_accept(&body, event);
            flow.accept(env, challenge, &body).await?.into_redirect()
        }
        Decision::Reject(rejection) => {
            event.add("decision", "reject");
            let redirect = flow
                .reject(env, challenge, &rejection.to_request())
                .await?
                .into_redirect()?;
            Err(AppError::PolicyRejected {
                reason: rejection.description,
                redirect_to: Some(redirect),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_rejects_blank_input() {
        assert!(Subject::new("").is_none());
        assert!(Subject::new("   ").is_none());
        assert_eq!(Subject::new(" user-42 ").unwrap().as_str(), "user-42");
    }

    #[test]
    fn redirect_is_extracted_verbatim() {
        let completed = CompletedRequest {
            redirect_to: Some("https://op/cb?code=xyz&state=a%20b".into()),
        };
        assert_eq!(
            completed.into_redirect().unwrap(),
            "https://op/cb?code=xyz&state=a%20b"
        );
    }

    #[test]
    fn missing_or_empty_redirect_is_malformed() {
        for redirect_to in [None, Some(String::new())] {
            let err = CompletedRequest { redirect_to }.into_redirect().unwrap_err();
            assert!(matches!(err, AppError::MalformedUpstreamResponse(_)));
        }
    }
}
