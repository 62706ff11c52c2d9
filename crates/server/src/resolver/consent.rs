//! Consent challenges: grant the requested scopes the client is allowed to have.

use super::{ChallengeFlow, Decision, RedirectResult, Rejection, resolve};
use crate::Environment;
use crate::config::ConsentConfig;
use crate::error::AppError;
use crate::hydra::ChallengeKind;
use crate::hydra::types::{
    AcceptConsentRequest, CompletedRequest, ConsentRequest, ConsentSession, RejectRequest,
};
use crate::logging::WideEvent;
use crate::wide_debug;
use serde_json::{Map, Value};

struct ConsentFlow;

/// Requested scopes that are also allowed, in request order.
pub fn grant_scopes(requested: &[String], allowed: &[String]) -> Vec<String> {
    let mut granted: Vec<String> = Vec::with_capacity(requested.len());
    for scope in requested {
        if allowed.contains(scope) && !granted.contains(scope) {
            granted.push(scope.clone());
        }
    }
    granted
}

/// Requested audiences, limited to the allow-list when one is configured.
pub fn grant_audiences(requested: &[String], allowed: Option<&[String]>) -> Vec<String> {
    match allowed {
        Some(allowed) => grant_scopes(requested, allowed),
        None => grant_scopes(requested, requested),
    }
}

/// Claims copied from the login context into the ID token when the `email`
/// scope was granted.
fn id_token_claims(granted: &[String], context: Option<&Value>) -> Option<Value> {
    if !granted.iter().any(|s| s == "email") {
        return None;
    }
    let context = context?.as_object()?;
    let mut claims = Map::new();
    for key in ["email", "email_verified"] {
        if let Some(value) = context.get(key).filter(|v| !v.is_null()) {
            claims.insert(key.to_string(), value.clone());
        }
    }
    (!claims.is_empty()).then_some(Value::Object(claims))
}

pub(crate) fn consent_decision(
    policy: &ConsentConfig,
    request: &ConsentRequest,
) -> Decision<AcceptConsentRequest> {
    let client_id = request
        .client
        .as_ref()
        .map(|c| c.client_id.as_str())
        .unwrap_or_default();
    let allowed = policy.allowed_scopes_for(client_id);
    let grant_scope = grant_scopes(&request.requested_scope, allowed);

    if grant_scope.is_empty() && !request.requested_scope.is_empty() {
        return Decision::Reject(Rejection::access_denied(format!(
            "client {client_id} may not be granted any of the requested scopes ({})",
            request.requested_scope.join(" ")
        )));
    }

    let grant_access_token_audience = grant_audiences(
        &request.requested_access_token_audience,
        policy.allowed_audiences.as_deref(),
    );
    let session = ConsentSession {
        id_token: id_token_claims(&grant_scope, request.context.as_ref()),
        access_token: None,
    };

    Decision::Accept(AcceptConsentRequest {
        grant_scope,
        grant_access_token_audience,
        remember: policy.remember,
        remember_for: policy.remember_for,
        session,
    })
}

impl ChallengeFlow for ConsentFlow {
    type Request = ConsentRequest;
    type Input = ();
    type Accept = AcceptConsentRequest;

    const KIND: ChallengeKind = ChallengeKind::Consent;

    async fn fetch(&self, env: &Environment, challenge: &str) -> Result<ConsentRequest, AppError> {
        env.hydra.get_consent_request(challenge).await
    }

    fn inspect(&self, request: &ConsentRequest, event: &WideEvent) {
        event.add_opt("client_id", request.client.as_ref().map(|c| &c.client_id));
        event.add_opt("subject", request.subject.as_ref());
        event.add("skip", request.skip);
        event.add("requested_scope", request.requested_scope.join(" "));
        wide_debug!(event, "fetched consent request");
    }

    fn decide(
        &self,
        env: &Environment,
        request: &ConsentRequest,
        _input: (),
    ) -> Decision<AcceptConsentRequest> {
        consent_decision(&env.config.consent, request)
    }

    fn record_accept(&self, body: &AcceptConsentRequest, event: &WideEvent) {
        event.add("granted_scope", body.grant_scope.join(" "));
    }

    async fn accept(
        &self,
        env: &Environment,
        challenge: &str,
        body: &AcceptConsentRequest,
    ) -> Result<CompletedRequest, AppError> {
        env.hydra.accept_consent_request(challenge, body).await
    }

    async fn reject(
        &self,
        env: &Environment,
        challenge: &str,
        body: &RejectRequest,
    ) -> Result<CompletedRequest, AppError> {
        env.hydra.reject_consent_request(challenge, body).await
    }
}

#[tracing::instrument(skip(env))]
pub async fn process_consent(env: &Environment, challenge: &str) -> Result<RedirectResult, AppError> {
    resolve(env, &ConsentFlow, challenge, ()).await
}
