use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, Deserialize)]
pub struct HydraConfig {
    /// Base URL of the Hydra admin API, e.g. `http://hydra:4445`.
    pub admin_url: Url,
    /// Base URL of the Hydra public API, e.g. `http://hydra:4444`.
    pub public_url: Url,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoginMode {
    /// Accept the subject supplied by the caller without verifying it.
    #[default]
    TrustCaller,
    /// Authenticate the user against the upstream identity provider first.
    Upstream,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoginConfig {
    #[serde(default)]
    pub mode: LoginMode,
    #[serde(default = "default_true")]
    pub remember: bool,
    #[serde(default = "default_remember_for")]
    pub remember_for: i64,
    #[serde(default = "default_acr")]
    pub acr: String,
    /// Reject upstream identities whose email address is not verified.
    #[serde(default = "default_true")]
    pub require_verified_email: bool,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            mode: LoginMode::default(),
            remember: true,
            remember_for: default_remember_for(),
            acr: default_acr(),
            require_verified_email: true,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ConsentConfig {
    #[serde(default = "default_true")]
    pub remember: bool,
    #[serde(default = "default_remember_for")]
    pub remember_for: i64,
    /// Scopes any client may be granted.
    #[serde(default = "default_allowed_scopes")]
    pub allowed_scopes: Vec<String>,
    /// Per-client allow-lists. A client listed here is limited to exactly these scopes.
    #[serde(default)]
    pub clients: HashMap<String, Vec<String>>,
    /// When set, granted audiences are limited to this list.
    #[serde(default)]
    pub allowed_audiences: Option<Vec<String>>,
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            remember: true,
            remember_for: default_remember_for(),
            allowed_scopes: default_allowed_scopes(),
            clients: HashMap::new(),
            allowed_audiences: None,
        }
    }
}

impl ConsentConfig {
    pub fn allowed_scopes_for(&self, client_id: &str) -> &[String] {
        self.clients
            .get(client_id)
            .map(Vec::as_slice)
            .unwrap_or(&self.allowed_scopes)
    }
}

/// Upstream OpenID Connect provider. Endpoints default to Google.
#[derive(Clone, Debug, Deserialize)]
pub struct UpstreamConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Our callback URL as registered with the provider.
    pub redirect_uri: Url,
    #[serde(default = "default_authorization_endpoint")]
    pub authorization_endpoint: Url,
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: Url,
    #[serde(default = "default_userinfo_endpoint")]
    pub userinfo_endpoint: Url,
    #[serde(default = "default_upstream_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub backend: SessionBackend,
    /// Connection string for the redis backend.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: SessionBackend::default(),
            url: None,
            ttl_secs: default_session_ttl_secs(),
            purge_interval_secs: default_purge_interval_secs(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    pub hydra: HydraConfig,
    #[serde(default)]
    pub login: LoginConfig,
    #[serde(default)]
    pub consent: ConsentConfig,
    #[serde(default)]
    pub upstream: Option<UpstreamConfig>,
    #[serde(default)]
    pub session: SessionConfig,
    /// Mounts the client registration route. Never enable in production.
    #[serde(default)]
    pub enable_test_routes: bool,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.login.mode == LoginMode::Upstream && self.upstream.is_none() {
            return Err(ConfigError::Validation(
                "login.mode = upstream requires an `upstream` section".into(),
            ));
        }
        if self.session.backend == SessionBackend::Redis && self.session.url.is_none() {
            return Err(ConfigError::Validation(
                "session.backend = redis requires session.url".into(),
            ));
        }
        if self.session.ttl_secs == 0 {
            return Err(ConfigError::Validation("session.ttl_secs must be > 0".into()));
        }
        if self.login.remember_for < 0 || self.consent.remember_for < 0 {
            return Err(ConfigError::Validation(
                "remember_for must not be negative".into(),
            ));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_remember_for() -> i64 {
    3600
}

fn default_acr() -> String {
    "0".to_string()
}

fn default_allowed_scopes() -> Vec<String> {
    ["openid", "offline", "offline_access", "email", "profile"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_upstream_scopes() -> Vec<String> {
    ["openid", "email", "profile"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_session_ttl_secs() -> u64 {
    600
}

fn default_purge_interval_secs() -> u64 {
    300
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn default_authorization_endpoint() -> Url {
    Url::parse("https://accounts.google.com/o/oauth2/v2/auth").expect("static url")
}

fn default_token_endpoint() -> Url {
    Url::parse("https://oauth2.googleapis.com/token").expect("static url")
}

fn default_userinfo_endpoint() -> Url {
    Url::parse("https://openidconnect.googleapis.com/v1/userinfo").expect("static url")
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// The file path can be changed with `BRIDGE_CONFIG`. Any environment variable
/// matching a key path separated by double underscores (e.g. `HYDRA__ADMIN_URL`)
/// overrides the file value.
///
/// Returns a `ConfigError` instead of panicking so the caller can decide how to fail.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let path = std::env::var("BRIDGE_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let cfg = Config::builder()
        .add_source(File::with_name(&path).required(false))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}
