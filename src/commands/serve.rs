//! Serve command - Starts the HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use apalis_sql::postgres::PostgresStorage;
use apalis_sql::sqlx::postgres::PgPoolOptions;

use crate::api::{create_router, AppState};
use crate::cli::args::ServeArgs;
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::infra::{Cache, Database};
use crate::jobs::{DisabledEmailQueue, EmailJob, EmailQueue, PostgresEmailQueue};

/// Execute the serve command
pub async fn execute(args: ServeArgs, mut config: Config) -> AppResult<()> {
    if let Some(host) = args.host {
        config.server_host = host;
    }
    if let Some(port) = args.port {
        config.server_port = port;
    }

    tracing::info!("Starting server...");

    let db = Database::connect(&config)
        .await
        .map_err(|e| AppError::internal(format!("Database connection failed: {}", e)))?;
    let db = Arc::new(db);

    let cache = Cache::connect(&config)
        .await
        .map_err(|e| AppError::internal(format!("Redis connection failed: {}", e)))?;
    let cache = Arc::new(cache);

    let mailer = email_queue(&config).await;

    let app_state = AppState::from_config(db, cache, &config, mailer)?;
    let app = create_router(app_state, &config);

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind to {}: {}", addr, e)))?;

    tracing::info!("Server running on http://{}", addr);

    // Peer addresses feed the rate limiter when no proxy header is present
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    Ok(())
}

/// Job storage for notification e-mails. Falls back to dropping mails when
/// the queue tables cannot be prepared.
async fn email_queue(config: &Config) -> Arc<dyn EmailQueue> {
    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!("Email queue unavailable, notifications will not be mailed: {}", e);
            return Arc::new(DisabledEmailQueue);
        }
    };

    if let Err(e) = PostgresStorage::setup(&pool).await {
        tracing::warn!("Email queue setup failed, notifications will not be mailed: {}", e);
        return Arc::new(DisabledEmailQueue);
    }

    let storage: PostgresStorage<EmailJob> = PostgresStorage::new(pool);
    Arc::new(PostgresEmailQueue::new(storage))
}
