//! API server entry point.

use api::config::{Config, LogFormat};
use metrics_exporter_prometheus::PrometheusHandle;
use rental_store::{
    InMemoryRentalStore, InMemoryResourceCatalog, PostgresRentalStore, PostgresResourceCatalog,
    RentalStore, ResourceCatalog,
};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve<S, C>(
    config: &Config,
    store: S,
    catalog: C,
    storage: &'static str,
    metrics_handle: PrometheusHandle,
) -> Result<(), BoxError>
where
    S: RentalStore + Clone + 'static,
    C: ResourceCatalog + 'static,
{
    let state = api::create_state(store, catalog, config, storage)?;
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, storage, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    if config.uses_sandbox_secret() {
        tracing::warn!("GATEWAY_SECRET is not set; notifications are verified with the sandbox secret");
    }

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Pick the storage backend and serve
    match config.database_url.as_deref() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await?;
            let store = PostgresRentalStore::new(pool.clone());
            store.run_migrations().await?;
            tracing::info!("database migrations applied");

            let catalog = PostgresResourceCatalog::new(pool);
            serve(&config, store, catalog, "postgres", metrics_handle).await
        }
        None => {
            tracing::warn!("DATABASE_URL is not set; using in-memory storage");
            let store = InMemoryRentalStore::new();
            let catalog = InMemoryResourceCatalog::new();
            serve(&config, store, catalog, "memory", metrics_handle).await
        }
    }
}
