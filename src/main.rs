//! Grocery ordering service binary.

use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use grocery_orders::{
    api::{auth::StaticTokenVerifier, SERVICE_NAME},
    router,
    services::{EventPublisher, LogPublisher, NatsPublisher},
    store::CredentialVerifier,
    AppState, Config, MemoryStore, PgStore, Services, Stores,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let (stores, verifier): (Stores, Arc<dyn CredentialVerifier>) = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            tracing::info!("connected to postgres");
            let store = Arc::new(PgStore::new(pool));
            let verifier: Arc<dyn CredentialVerifier> = store.clone();
            (Stores::shared(store), verifier)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            let verifier: Arc<dyn CredentialVerifier> =
                Arc::new(StaticTokenVerifier::new(config.dev_tokens.clone()));
            (Stores::shared(Arc::new(MemoryStore::new())), verifier)
        }
    };

    let events: Arc<dyn EventPublisher> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Arc::new(NatsPublisher::new(client)),
            Err(e) => {
                tracing::warn!(error = %e, "nats unavailable, order events will only be logged");
                Arc::new(LogPublisher)
            }
        },
        None => Arc::new(LogPublisher),
    };

    let state = AppState { services: Services::new(stores, events, &config), verifier };
    let app = router(state);

    let address = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("{SERVICE_NAME} listening on {address}");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        tracing::info!("received ctrl-c, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
