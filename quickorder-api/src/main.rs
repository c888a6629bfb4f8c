use std::net::SocketAddr;
use anyhow::Context;
use quickorder_api::{app, AppState, AuthConfig};
use quickorder_store::{app_config::Config, seed, DbClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quickorder_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Quick Orders API on port {}", config.server.port);

    let auth = AuthConfig {
        secret: config.auth.jwt_secret.clone(),
        expiration: config.auth.jwt_expiration_seconds,
    };

    let app_state = if config.database.is_configured() {
        let db = DbClient::new(&config.database.url, config.database.max_connections)
            .await
            .context("Failed to connect to Postgres")?;
        db.migrate().await.context("Failed to run migrations")?;
        AppState::postgres(&db, auth)
    } else {
        tracing::warn!("No database configured; using the in-memory backend");
        AppState::in_memory(auth)
    };

    seed::ensure_admin(app_state.users.as_ref(), &config.bootstrap)
        .await
        .context("Failed to bootstrap admin account")?;
    if config.bootstrap.sample_catalog {
        seed::seed_sample_catalog(app_state.products.as_ref())
            .await
            .context("Failed to seed sample catalog")?;
    }

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
