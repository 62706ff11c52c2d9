//! Logout challenges. Always accepted; a session that is already gone shows up
//! as a fetch failure instead.

use super::{ChallengeFlow, Decision, RedirectResult, resolve};
use crate::Environment;
use crate::error::AppError;
use crate::hydra::ChallengeKind;
use crate::hydra::types::{CompletedRequest, LogoutRequest, RejectRequest};
use crate::logging::WideEvent;

struct LogoutFlow;

impl ChallengeFlow for LogoutFlow {
    type Request = LogoutRequest;
    type Input = ();
    type Accept = ();

    const KIND: ChallengeKind = ChallengeKind::Logout;

    async fn fetch(&self, env: &Environment, challenge: &str) -> Result<LogoutRequest, AppError> {
        env.hydra.get_logout_request(challenge).await
    }

    fn inspect(&self, request: &LogoutRequest, event: &WideEvent) {
        event.add_opt("subject", request.subject.as_ref());
        event.add_opt("client_id", request.client.as_ref().map(|c| &c.client_id));
        event.debug(if request.rp_initiated {
            "fetched relying-party initiated logout request"
        } else {
            "fetched logout request"
        });
    }

    fn decide(&self, _env: &Environment, _request: &LogoutRequest, _input: ()) -> Decision<()> {
        Decision::Accept(())
    }

    async fn accept(
        &self,
        env: &Environment,
        challenge: &str,
        _body: &(),
    ) -> Result<CompletedRequest, AppError> {
        env.hydra.accept_logout_request(challenge).await
    }

    async fn reject(
        &self,
        _env: &Environment,
        _challenge: &str,
        _body: &RejectRequest,
    ) -> Result<CompletedRequest, AppError> {
        // Hydra answers a logout rejection with 204 and no redirect.
        Err(AppError::MalformedUpstreamResponse(
            "logout rejection yields no redirect".into(),
        ))
    }
}

#[tracing::instrument(skip(env))]
pub async fn process_logout(env: &Environment, challenge: &str) -> Result<RedirectResult, AppError> {
    resolve(env, &LogoutFlow, challenge, ()).await
}
