//! Device authorization grant (RFC 8628).
//!
//! Hydra owns the device-code state machine. The bridge starts a session,
//! submits the user code the user typed in, and relays token polls; it keeps
//! no device state of its own, so every poll is a fresh read.

use super::RedirectResult;
use crate::Environment;
use crate::error::AppError;
use crate::hydra::types::{AcceptDeviceRequest, TokenEndpointResponse, TokenPair};
use time::{Duration, OffsetDateTime};

pub const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Poll interval when the server does not advertise one (RFC 8628 §3.2).
pub const DEFAULT_INTERVAL_SECS: u64 = 5;

/// Added to the interval on every `slow_down` (RFC 8628 §3.5).
pub const SLOW_DOWN_STEP_SECS: u64 = 5;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceSession {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub verification_uri_complete: Option<String>,
    pub interval: u64,
    pub expires_at: OffsetDateTime,
}

impl DeviceSession {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DevicePoll {
    Pending { interval: u64 },
    SlowDown { interval: u64 },
    Denied,
    Expired,
    Authorized(TokenPair),
}

impl DevicePoll {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DevicePoll::Pending { .. } | DevicePoll::SlowDown { .. })
    }

    /// RFC 8628 §3.5 error code for non-success states.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            DevicePoll::Pending { .. } => Some("authorization_pending"),
            DevicePoll::SlowDown { .. } => Some("slow_down"),
            DevicePoll::Denied => Some("access_denied"),
            DevicePoll::Expired => Some("expired_token"),
            DevicePoll::Authorized(_) => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DevicePollRequest {
    pub device_code: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    /// Interval the device is currently polling at.
    pub interval: u64,
}

/// Map one token endpoint answer onto the poll states.
pub fn interpret_poll(response: TokenEndpointResponse, interval: u64) -> Result<DevicePoll, AppError> {
    match response {
        TokenEndpointResponse::Issued(tokens) => Ok(DevicePoll::Authorized(tokens)),
        TokenEndpointResponse::Error(body) => match body.error.as_str() {
            "authorization_pending" => Ok(DevicePoll::Pending { interval }),
            "slow_down" => Ok(DevicePoll::SlowDown {
                interval: interval.saturating_add(SLOW_DOWN_STEP_SECS),
            }),
            "access_denied" => Ok(DevicePoll::Denied),
            "expired_token" => Ok(DevicePoll::Expired),
            other => Err(AppError::policy(match body.error_description {
                Some(description) => format!("{other}: {description}"),
                None => other.to_string(),
            })),
        },
    }
}

/// Ask Hydra for a new device code / user code pair.
#[tracing::instrument(skip(env))]
pub async fn start_device_authorization(
    env: &Environment,
    client_id: &str,
    scope: Option<&str>,
) -> Result<DeviceSession, AppError> {
    let response = env.hydra.device_authorization(client_id, scope).await?;
    if response.device_code.is_empty() || response.user_code.is_empty() {
        return Err(AppError::MalformedUpstreamResponse(
            "device authorization response without codes".into(),
        ));
    }
    let expires_at = (response.expires_in > 0)
        .then(|| OffsetDateTime::now_utc().checked_add(Duration::seconds(response.expires_in)))
        .flatten()
        .ok_or_else(|| {
            AppError::MalformedUpstreamResponse(format!(
                "device authorization expires_in out of range: {}",
                response.expires_in
            ))
        })?;
    Ok(DeviceSession {
        device_code: response.device_code,
        user_code: response.user_code,
        verification_uri: response.verification_uri,
        verification_uri_complete: response.verification_uri_complete,
        interval: response.interval.unwrap_or(DEFAULT_INTERVAL_SECS),
        expires_at,
    })
}

/// Submit the user code entered on the verify page for a device challenge.
///
/// Hydra validates the code; the answer redirects into the regular
/// login/consent sequence.
#[tracing::instrument(skip(env))]
pub async fn process_device_authorization(
    env: &Environment,
    device_challenge: &str,
    user_code: &str,
) -> Result<RedirectResult, AppError> {
    let event = env.logger.flow("device");
    event.add("challenge", device_challenge);

    let user_code = user_code.trim();
    if user_code.is_empty() {
        event.add("outcome", "policy_rejected");
        return Err(AppError::policy("a user code is required"));
    }

    let result = env
        .hydra
        .accept_device_request(
            device_challenge,
            &AcceptDeviceRequest {
                user_code: user_code.to_string(),
            },
        )
        .await
        .and_then(|completed| completed.into_redirect());

    match &result {
        Ok(_) => {
            event.add("outcome", "resolved");
            event.info("user code accepted");
        }
        Err(err) => {
            event.add("outcome", err.kind());
            event.add("error", err);
            event.warn("user code rejected");
        }
    }
    result
}

/// Relay one device token poll.
#[tracing::instrument(skip(env, request), fields(client_id = %request.client_id))]
pub async fn poll_device_token(
    env: &Environment,
    request: &DevicePollRequest,
) -> Result<DevicePoll, AppError> {
    let form = [
        ("grant_type", DEVICE_CODE_GRANT),
        ("device_code", request.device_code.as_str()),
        ("client_id", request.client_id.as_str()),
    ];
    let basic_auth = request
        .client_secret
        .as_deref()
        .map(|secret| (request.client_id.as_str(), secret));

    let response = env.hydra.token(&form, basic_auth).await?;
    let poll = interpret_poll(response, request.interval)?;
    tracing::debug!(terminal = poll.is_terminal(), state = ?poll.error_code(), "device poll relayed");
    Ok(poll)
}
