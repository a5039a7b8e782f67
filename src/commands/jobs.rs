//! Jobs command - notification mail queue.
//!
//! ```bash
//! cargo run -- jobs work    # run the mail worker
//! cargo run -- jobs list    # queue counts by status
//! cargo run -- jobs clear   # drop failed mails
//! ```

use apalis::prelude::*;
use apalis_sql::postgres::PostgresStorage;
use apalis_sql::sqlx::postgres::PgPoolOptions;
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement};

use crate::cli::args::{JobsAction, JobsArgs};
use crate::config::{Config, JOB_NAME_EMAIL};
use crate::errors::{AppError, AppResult};
use crate::infra::Database;
use crate::jobs::{email_job_handler, EmailJob};

/// Queue counts by job status
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueCounts {
    pub pending: i64,
    pub running: i64,
    pub failed: i64,
    pub done: i64,
}

impl QueueCounts {
    fn record(&mut self, status: &str, count: i64) {
        match status {
            "Pending" => self.pending += count,
            "Running" => self.running += count,
            "Failed" | "Killed" => self.failed += count,
            "Done" => self.done += count,
            _ => {}
        }
    }
}

pub async fn execute(args: JobsArgs, config: Config) -> AppResult<()> {
    match args.action {
        JobsAction::Work => run_worker(&config).await,
        JobsAction::List => list_jobs(&config).await,
        JobsAction::Clear => clear_failed_jobs(&config).await,
    }
}

async fn run_worker(config: &Config) -> AppResult<()> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .map_err(|e| AppError::internal(format!("Failed to connect to database: {}", e)))?;

    PostgresStorage::setup(&pool)
        .await
        .map_err(|e| AppError::internal(format!("Failed to setup job storage: {}", e)))?;

    let storage: PostgresStorage<EmailJob> = PostgresStorage::new(pool);
    let worker = WorkerBuilder::new(JOB_NAME_EMAIL)
        .backend(storage)
        .build_fn(email_job_handler);

    tracing::info!("Mail worker started, press Ctrl+C to stop");

    tokio::select! {
        result = Monitor::new().register(worker).run() => {
            if let Err(e) = result {
                return Err(AppError::internal(format!("Worker failed: {}", e)));
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    tracing::info!("Mail worker stopped");
    Ok(())
}

async fn list_jobs(config: &Config) -> AppResult<()> {
    let db = connect(config).await?;
    let conn = db.connection();

    if !queue_initialized(conn).await? {
        println!("Job queue not initialized. Run 'iris jobs work' once to create it.");
        return Ok(());
    }

    let rows = conn
        .query_all(Statement::from_string(
            DatabaseBackend::Postgres,
            "SELECT status::text AS status, COUNT(*)::bigint AS count FROM apalis.jobs GROUP BY status",
        ))
        .await
        .map_err(|e| AppError::internal(format!("Query failed: {}", e)))?;

    let mut counts = QueueCounts::default();
    for row in rows {
        if let (Ok(status), Ok(count)) = (
            row.try_get::<String>("", "status"),
            row.try_get::<i64>("", "count"),
        ) {
            counts.record(&status, count);
        }
    }

    println!("Pending: {}", counts.pending);
    println!("Running: {}", counts.running);
    println!("Failed:  {}", counts.failed);
    println!("Done:    {}", counts.done);
    Ok(())
}

async fn clear_failed_jobs(config: &Config) -> AppResult<()> {
    let db = connect(config).await?;
    let conn = db.connection();

    if !queue_initialized(conn).await? {
        println!("Job queue not initialized. Nothing to clear.");
        return Ok(());
    }

    let result = conn
        .execute(Statement::from_string(
            DatabaseBackend::Postgres,
            "DELETE FROM apalis.jobs WHERE status IN ('Failed', 'Killed')",
        ))
        .await
        .map_err(|e| AppError::internal(format!("Failed to clear jobs: {}", e)))?;

    tracing::info!(removed = result.rows_affected(), "Cleared failed mail jobs");
    println!("Cleared {} failed job(s).", result.rows_affected());
    Ok(())
}

async fn connect(config: &Config) -> AppResult<Database> {
    Database::connect_without_migrations(config)
        .await
        .map_err(|e| AppError::internal(format!("Failed to connect to database: {}", e)))
}

async fn queue_initialized(conn: &DatabaseConnection) -> AppResult<bool> {
    let row = conn
        .query_one(Statement::from_string(
            DatabaseBackend::Postgres,
            "SELECT EXISTS(SELECT 1 FROM information_schema.schemata WHERE schema_name = 'apalis') AS exists",
        ))
        .await
        .map_err(|e| AppError::internal(format!("Query failed: {}", e)))?;

    Ok(row
        .and_then(|r| r.try_get::<bool>("", "exists").ok())
        .unwrap_or(false))
}
