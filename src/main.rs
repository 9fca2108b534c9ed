use rusty_forum_ddd::{
    adapters::postgres::{PostgresEventStore, PostgresPostStatsStore},
    application::reconciliation::{
        ReconciliationDependencies, run_comment_worker, run_like_worker, shutdown_channel,
    },
    config::AppConfig,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rusty_forum_ddd=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    // Initialize database connection pool
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    // Initialize adapters
    let deps = ReconciliationDependencies {
        event_store: Arc::new(PostgresEventStore::new(pool.clone())),
        post_stats_store: Arc::new(PostgresPostStatsStore::new(pool.clone())),
    };

    let (trigger, signal) = shutdown_channel();

    let like_worker = tokio::spawn(run_like_worker(
        deps.clone(),
        config.like_worker,
        signal.clone(),
    ));
    let comment_worker = tokio::spawn(run_comment_worker(deps, config.comment_worker, signal));

    tracing::info!("Counter reconciliation workers running");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = ?e, "Failed to listen for shutdown signal");
    }

    tracing::info!("Shutdown requested, waiting for workers");
    trigger.trigger();

    if let Err(e) = like_worker.await {
        tracing::error!(error = ?e, "Like worker task failed");
    }
    if let Err(e) = comment_worker.await {
        tracing::error!(error = ?e, "Comment worker task failed");
    }

    pool.close().await;
    tracing::info!("Shutdown complete");
}
