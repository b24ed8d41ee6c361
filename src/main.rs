use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use storefront_api::auth::Argon2Verifier;
use storefront_api::config::{init_tracing, load_config};
use storefront_api::events::{event_channel, process_events};
use storefront_api::gateway::StripeGateway;
use storefront_api::session::{InMemorySessionStore, RedisSessionStore, SessionStore};
use storefront_api::{app_router, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    init_tracing(config.log_level(), config.log_json);
    let config = Arc::new(config);

    let database = Arc::new(
        db::establish_connection(&config)
            .await
            .context("failed to connect to database")?,
    );
    if config.auto_migrate {
        db::run_migrations(&database)
            .await
            .context("failed to run migrations")?;
    }

    let sessions: Arc<dyn SessionStore> = match config.session_backend.as_str() {
        "redis" => {
            let url = config
                .session_redis_url
                .as_deref()
                .context("session_backend is 'redis' but session_redis_url is unset")?;
            Arc::new(RedisSessionStore::new(url, config.session_ttl_secs)?)
        }
        _ => Arc::new(InMemorySessionStore::new()),
    };

    let gateway = Arc::new(
        StripeGateway::new(
            config.gateway_api_base.clone(),
            config.gateway_secret_key.clone(),
            config.gateway_timeout_secs,
        )
        .context("failed to build payment gateway client")?,
    );

    let (events, event_rx) = event_channel(config.event_channel_capacity);
    tokio::spawn(process_events(event_rx));

    let state = AppState::build(
        database,
        config.clone(),
        sessions,
        gateway,
        Arc::new(Argon2Verifier),
        events,
    );

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, environment = %config.environment, "Storefront API listening");

    axum::serve(listener, app_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
