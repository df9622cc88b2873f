//! Bingo Herald HTTP trigger binary entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use bingo_common::config::AppConfig;
use bingo_common::db;
use bingo_dispatcher::Dispatcher;
use bingo_dispatcher::clock::SystemClock;
use bingo_dispatcher::messaging::FcmClient;
use bingo_dispatcher::store::PgQueueStore;

use bingo_api::routes::create_router;
use bingo_api::state::AppState;

/// Upper bound on a trigger event body (a record plus its token list).
const MAX_EVENT_BYTES: usize = 256 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("bingo_api=debug,bingo_dispatcher=debug,tower_http=debug")
        }))
        .init();

    tracing::info!("Starting Bingo Herald API server...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Create database connection pool
    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    db::run_migrations(&pool).await?;

    // Build dispatcher with its collaborators
    let messaging = Arc::new(FcmClient::from_config(&config)?);
    let store = Arc::new(PgQueueStore::new(pool));
    let dispatcher = Arc::new(Dispatcher::new(messaging, store, Arc::new(SystemClock)));

    // Build router
    let app = create_router(AppState::new(dispatcher))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_EVENT_BYTES));

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
