//! Login, consent, logout and device-verification bridge for Ory Hydra.
//!
//! Hydra redirects the user-agent here with a challenge. The bridge fetches
//! the challenge, applies its policy, submits the decision back to Hydra and
//! redirects the user-agent wherever Hydra says.

use std::sync::Arc;

use crate::config::{AppConfig, LoginMode};
use crate::error::AppError;
use crate::hydra::HydraClient;
use crate::identity::UpstreamProvider;
use crate::logging::FlowLogger;
use crate::session::SessionStore;

pub mod config;
pub mod error;
pub mod hydra;
pub mod identity;
pub mod logging;
pub mod resolver;
pub mod routes;
pub mod session;
pub mod views;

/// Everything a flow needs, passed explicitly instead of living in globals.
#[derive(Clone)]
pub struct Environment {
    pub hydra: HydraClient,
    /// Only present in `login.mode = upstream`.
    pub identity: Option<UpstreamProvider>,
    pub sessions: SessionStore,
    pub logger: FlowLogger,
    pub config: Arc<AppConfig>,
}

impl Environment {
    pub fn new(
        hydra: HydraClient,
        identity: Option<UpstreamProvider>,
        sessions: SessionStore,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            hydra,
            identity,
            sessions,
            logger: FlowLogger::default(),
            config,
        }
    }

    /// Build clients and the session store from configuration.
    pub async fn from_config(config: Arc<AppConfig>) -> Result<Self, AppError> {
        let hydra = HydraClient::new(&config.hydra)?;
        let identity = match (config.login.mode, config.upstream.clone()) {
            (LoginMode::Upstream, Some(upstream)) => Some(UpstreamProvider::new(upstream)?),
            _ => None,
        };
        let sessions = SessionStore::from_config(&config.session).await?;
        Ok(Self::new(hydra, identity, sessions, config))
    }
}
