use color_eyre::eyre::WrapErr;
use hydra_login_bridge::Environment;
use hydra_login_bridge::config::load_config;
use hydra_login_bridge::routes::start_webserver;
use hydra_login_bridge::session::SessionStore;
use std::sync::Arc;
use tokio::time::{Duration, interval};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "hydra_login_bridge=info,tower_http=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_level(true))
        .init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    // A missing .env file is normal outside development.
    let _ = dotenvy::dotenv();

    initialize_tracing();

    let config = Arc::new(load_config().wrap_err("Failed to load configuration")?);
    tracing::info!(
        mode = ?config.login.mode,
        session_backend = ?config.session.backend,
        hydra_admin = %config.hydra.admin_url,
        test_routes = config.enable_test_routes,
        "configuration loaded"
    );

    let env = Environment::from_config(config.clone())
        .await
        .wrap_err("Failed to initialise clients")?;

    // Redis expires keys itself; the in-memory store needs sweeping.
    if let SessionStore::InMemory(store) = &env.sessions {
        let store = store.clone();
        let period = Duration::from_secs(config.session.purge_interval_secs.max(1));
        tokio::spawn(async move {
            let mut interval = interval(period);
            loop {
                interval.tick().await;
                let purged = store.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, remaining = store.len(), "purged expired login state");
                }
            }
        });
    }

    start_webserver(env).await?;
    Ok(())
}
