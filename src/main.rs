use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use order_router::api;
use order_router::config::{Config, LogFormat};
use order_router::distance::{DistanceResolver, GoogleDistanceMatrix, StraightLineResolver};
use order_router::error::AppError;
use order_router::state::AppState;
use order_router::store::{MemoryOrderStore, OrderStore, PgOrderStore};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;
    init_tracing(&config);

    let store = build_store(&config).await?;
    let resolver = build_resolver(&config)?;

    let shared_state = Arc::new(AppState::new(store.clone(), resolver));
    let app = api::rest::router(shared_state);

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")));

    store.close().await;
    tracing::info!("http server stopped");

    served
}

fn init_tracing(config: &Config) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);

    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.compact().init(),
    }
}

async fn build_store(config: &Config) -> Result<Arc<dyn OrderStore>, AppError> {
    let Some(database_url) = &config.database_url else {
        tracing::warn!("DATABASE_URL not set, orders are kept in memory");
        return Ok(Arc::new(MemoryOrderStore::new(config.transition_timeout)));
    };

    let store = PgOrderStore::connect(
        database_url,
        config.db_max_connections,
        config.transition_timeout,
    )
    .await
    .map_err(|err| AppError::Internal(format!("failed to connect to postgres: {err}")))?;
    store
        .migrate()
        .await
        .map_err(|err| AppError::Internal(format!("failed to create orders table: {err}")))?;

    Ok(Arc::new(store))
}

fn build_resolver(config: &Config) -> Result<Arc<dyn DistanceResolver>, AppError> {
    let Some(api_key) = &config.maps_api_key else {
        tracing::warn!("MAPS_API_KEY not set, using straight-line distances");
        return Ok(Arc::new(StraightLineResolver));
    };

    let resolver = GoogleDistanceMatrix::new(
        api_key.clone(),
        config.maps_base_url.clone(),
        config.maps_timeout,
    )?;

    Ok(Arc::new(resolver))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
