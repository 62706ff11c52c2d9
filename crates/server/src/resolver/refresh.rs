//! Refresh token relay. No challenge and no local state.

use crate::Environment;
use crate::error::AppError;
use crate::hydra::types::{TokenEndpointResponse, TokenPair};

#[derive(Clone, Debug)]
pub struct RefreshRequest {
    pub refresh_token: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed(TokenPair),
    /// The refresh token is expired, revoked or was already used.
    InvalidGrant { description: Option<String> },
}

pub fn interpret_refresh(response: TokenEndpointResponse) -> Result<RefreshOutcome, AppError> {
    match response {
        TokenEndpointResponse::Issued(tokens) => Ok(RefreshOutcome::Refreshed(tokens)),
        TokenEndpointResponse::Error(body) if body.error == "invalid_grant" => {
            Ok(RefreshOutcome::InvalidGrant {
                description: body.error_description,
            })
        }
        TokenEndpointResponse::Error(body) => Err(AppError::policy(match body.error_description {
            Some(description) => format!("{}: {description}", body.error),
            None => body.error,
        })),
    }
}

#[tracing::instrument(skip(env, request), fields(client_id = %request.client_id))]
pub async fn process_token_refresh(
    env: &Environment,
    request: &RefreshRequest,
) -> Result<RefreshOutcome, AppError> {
    if request.refresh_token.is_empty() {
        return Ok(RefreshOutcome::InvalidGrant {
            description: Some("refresh_token is required".into()),
        });
    }

    let mut form = vec![
        ("grant_type", "refresh_token"),
        ("refresh_token", request.refresh_token.as_str()),
        ("client_id", request.client_id.as_str()),
    ];
    if let Some(scope) = request.scope.as_deref() {
        form.push(("scope", scope));
    }
    let basic_auth = request
        .client_secret
        .as_deref()
        .map(|secret| (request.client_id.as_str(), secret));

    let outcome = interpret_refresh(env.hydra.token(&form, basic_auth).await?)?;
    if let RefreshOutcome::InvalidGrant { description } = &outcome {
        tracing::info!(?description, "refresh token rejected");
    }
    Ok(outcome)
}
