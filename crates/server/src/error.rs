use axum::http::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::resolver::RedirectResult;

/// Closed error taxonomy surfaced by every resolver operation.
///
/// Client modules map library-specific failures (reqwest, redis, serde_json)
/// into one of these variants before returning, so nothing else escapes.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Challenge not found or expired: {0}")]
    ChallengeNotFound(String),
    #[error("Challenge already resolved: {0}")]
    ChallengeAlreadyResolved(String),
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("Malformed upstream response: {0}")]
    MalformedUpstreamResponse(String),
    #[error("Rejected by policy: {reason}")]
    PolicyRejected {
        reason: String,
        /// Where the authorization server wants the user-agent sent after the
        /// rejection was submitted. `None` when nothing was submitted.
        redirect_to: Option<RedirectResult>,
    },
}

impl AppError {
    /// Short machine-readable name, used as a span attribute.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::ChallengeNotFound(_) => "challenge_not_found",
            AppError::ChallengeAlreadyResolved(_) => "challenge_already_resolved",
            AppError::UpstreamUnavailable(_) => "upstream_unavailable",
            AppError::MalformedUpstreamResponse(_) => "malformed_upstream_response",
            AppError::PolicyRejected { .. } => "policy_rejected",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ChallengeNotFound(_) => StatusCode::NOT_FOUND,
            AppError::ChallengeAlreadyResolved(_) => StatusCode::CONFLICT,
            AppError::UpstreamUnavailable(_) | AppError::MalformedUpstreamResponse(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::PolicyRejected { .. } => StatusCode::FORBIDDEN,
        }
    }

    pub(crate) fn policy(reason: impl Into<String>) -> Self {
        AppError::PolicyRejected {
            reason: reason.into(),
            redirect_to: None,
        }
    }

    /// Map a non-success HTTP status from an upstream component.
    ///
    /// 404 means the challenge is unknown or expired, 409 and 410 mean it was
    /// already handled. Everything else counts as the upstream being unusable.
    pub(crate) fn from_status(status: StatusCode, body: &[u8]) -> Self {
        let detail = upstream_detail(status, body);
        match status {
            StatusCode::NOT_FOUND => AppError::ChallengeNotFound(detail),
            StatusCode::CONFLICT | StatusCode::GONE => AppError::ChallengeAlreadyResolved(detail),
            _ => AppError::UpstreamUnavailable(detail),
        }
    }

    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::UpstreamUnavailable(format!("request timed out: {err}"))
        } else if err.is_decode() {
            AppError::MalformedUpstreamResponse(err.to_string())
        } else {
            AppError::UpstreamUnavailable(err.to_string())
        }
    }

    pub(crate) fn from_decode(err: serde_json::Error) -> Self {
        AppError::MalformedUpstreamResponse(err.to_string())
    }
}

/// Generic error body returned by Hydra and most OAuth2 servers.
#[derive(Debug, Deserialize)]
struct UpstreamErrorBody {
    error: Option<String>,
    error_description: Option<String>,
}

fn upstream_detail(status: StatusCode, body: &[u8]) -> String {
    match serde_json::from_slice::<UpstreamErrorBody>(body) {
        Ok(UpstreamErrorBody {
            error_description: Some(description),
            ..
        }) => format!("HTTP {status}: {description}"),
        Ok(UpstreamErrorBody {
            error: Some(error),
            ..
        }) => format!("HTTP {status}: {error}"),
        _ => format!("HTTP {status}"),
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::UpstreamUnavailable(format!("session store: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_challenge_not_found() {
        let body = br#"{"error":"Not Found","error_description":"Unable to locate the resource"}"#;
        let err = AppError::from_status(StatusCode::NOT_FOUND, body);
        assert!(matches!(err, AppError::ChallengeNotFound(_)));
        assert!(err.to_string().contains("Unable to locate the resource"));
    }

    #[test]
    fn gone_and_conflict_map_to_already_resolved() {
        for status in [StatusCode::GONE, StatusCode::CONFLICT] {
            let err = AppError::from_status(status, b"");
            assert!(matches!(err, AppError::ChallengeAlreadyResolved(_)));
        }
    }

    #[test]
    fn server_errors_map_to_upstream_unavailable() {
        let err = AppError::from_status(StatusCode::SERVICE_UNAVAILABLE, b"not json");
        assert!(matches!(err, AppError::UpstreamUnavailable(_)));
        assert_eq!(err.to_string(), "Upstream unavailable: HTTP 503 Service Unavailable");
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn policy_rejection_has_no_redirect_by_default() {
        let err = AppError::policy("scope not allowed");
        assert_eq!(err.kind(), "policy_rejected");
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        match err {
            AppError::PolicyRejected { redirect_to, .. } => assert!(redirect_to.is_none()),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
