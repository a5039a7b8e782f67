//! Application state - Dependency injection container.
//!
//! Provides centralized access to all application services and infrastructure.

use std::sync::Arc;

use crate::config::Config;
use crate::errors::AppResult;
use crate::infra::{Cache, Database};
use crate::jobs::EmailQueue;
use crate::services::{ServiceContainer, Services};

/// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    /// Every application service
    pub services: Arc<dyn ServiceContainer>,
    /// Redis cache (user cache and rate limits)
    pub cache: Arc<Cache>,
    /// Database connection (health checks)
    pub database: Arc<Database>,
}

impl AppState {
    /// Build the state and its service container from live connections.
    pub fn from_config(
        database: Arc<Database>,
        cache: Arc<Cache>,
        config: &Config,
        mailer: Arc<dyn EmailQueue>,
    ) -> AppResult<Self> {
        let services = Services::from_connection(
            database.get_connection(),
            config,
            Some(cache.as_ref().clone()),
            mailer,
        )?;

        Ok(Self::new(Arc::new(services), cache, database))
    }

    /// Create application state around an existing service container.
    pub fn new(
        services: Arc<dyn ServiceContainer>,
        cache: Arc<Cache>,
        database: Arc<Database>,
    ) -> Self {
        Self {
            services,
            cache,
            database,
        }
    }
}
