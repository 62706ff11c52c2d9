//! Shared fixtures: configuration pointing at wiremock servers.

#![allow(dead_code)]

use hydra_login_bridge::Environment;
use hydra_login_bridge::config::{
    AppConfig, ConsentConfig, HydraConfig, LoginConfig, LoginMode, SessionConfig, UpstreamConfig,
};
use std::sync::Arc;
use url::Url;

pub fn test_config(hydra_uri: &str) -> AppConfig {
    let hydra_url = Url::parse(hydra_uri).expect("hydra url");
    AppConfig {
        listen_addr: "127.0.0.1:0".parse().expect("listen addr"),
        hydra: HydraConfig {
            admin_url: hydra_url.clone(),
            public_url: hydra_url,
            request_timeout_secs: 5,
        },
        login: LoginConfig::default(),
        consent: ConsentConfig::default(),
        upstream: None,
        session: SessionConfig::default(),
        enable_test_routes: false,
    }
}

pub fn upstream_config(idp_uri: &str) -> UpstreamConfig {
    let base = Url::parse(idp_uri).expect("idp url");
    UpstreamConfig {
        client_id: "google-client".into(),
        client_secret: "google-secret".into(),
        redirect_uri: Url::parse("https://bridge.example/callback").expect("redirect uri"),
        authorization_endpoint: base.join("/auth").expect("auth url"),
        token_endpoint: base.join("/token").expect("token url"),
        userinfo_endpoint: base.join("/userinfo").expect("userinfo url"),
        scopes: vec!["openid".into(), "email".into(), "profile".into()],
        request_timeout_secs: 5,
    }
}

/// Configuration for `login.mode = upstream` with both servers mocked.
pub fn upstream_test_config(hydra_uri: &str, idp_uri: &str) -> AppConfig {
    let mut config = test_config(hydra_uri);
    config.login.mode = LoginMode::Upstream;
    config.upstream = Some(upstream_config(idp_uri));
    config
}

pub async fn test_env(config: AppConfig) -> Environment {
    Environment::from_config(Arc::new(config))
        .await
        .expect("environment")
}
