use larn_relay_ai::HttpCompletionBackend;
use larn_relay_server::{
    config::ServerConfig,
    db::PgStore,
    gateway::LineGateway,
    relay::{RelayService, RelaySettings, Stores},
    routes::{self, AppState},
    signature::SignatureVerifier,
};
use larn_relay_store::MemoryStore;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    let stores = match &config.database_url {
        Some(database_url) => {
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await
                .expect("failed to connect to database");

            tracing::info!("Running database migrations...");
            sqlx::migrate!("./migrations")
                .run(&db_pool)
                .await
                .expect("failed to run migrations");

            Stores::shared(Arc::new(PgStore::new(db_pool)))
        }
        None => {
            tracing::warn!("No database configured; conversation data will not survive restarts");
            Stores::shared(Arc::new(MemoryStore::new()))
        }
    };

    let backend = HttpCompletionBackend::new(&config.completion.to_backend_config())
        .expect("failed to build completion client");
    let gateway = LineGateway::new(&config.line).expect("failed to build messaging client");

    let relay = RelayService::new(
        stores,
        Arc::new(backend),
        Arc::new(gateway),
        RelaySettings::from(&config),
    );
    let state = AppState::new(relay, SignatureVerifier::new(&config.line.channel_secret));
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
