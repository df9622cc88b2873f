use std::sync::Arc;

use bingo_common::config::AppConfig;
use bingo_common::db;
use bingo_common::redis_pool::create_redis_pool;
use bingo_dispatcher::Dispatcher;
use bingo_dispatcher::clock::SystemClock;
use bingo_dispatcher::messaging::FcmClient;
use bingo_dispatcher::store::PgQueueStore;
use bingo_notifier::trigger::TriggerQueue;
use bingo_notifier::worker::NotificationWorker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bingo_notifier=info,bingo_dispatcher=info".into()),
        )
        .json()
        .init();

    tracing::info!("Bingo Herald notifier starting...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Connect to database
    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    db::run_migrations(&pool).await?;

    // Connect to Redis
    let redis = create_redis_pool(&config.redis_url).await?;

    // Messaging client is built once and shared by every dispatch
    let messaging = Arc::new(FcmClient::from_config(&config)?);
    let store = Arc::new(PgQueueStore::new(pool));
    let dispatcher = Arc::new(Dispatcher::new(messaging, store, Arc::new(SystemClock)));

    let queue = TriggerQueue::new(redis, config.trigger_queue_key.clone());
    let mut worker = NotificationWorker::new(dispatcher, queue, config.trigger_max_attempts);

    // Run with graceful shutdown on Ctrl+C
    tokio::select! {
        _ = worker.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping gracefully...");
        }
    }

    tracing::info!("Bingo Herald notifier stopped.");
    Ok(())
}
