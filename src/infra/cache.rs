//! Redis cache.
//!
//! JSON values with TTLs, the user and report caches, and fixed-window
//! rate-limit counters.

use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisError};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::config::{
    Config, CACHE_PREFIX_RATE_LIMIT, CACHE_PREFIX_REPORT, CACHE_PREFIX_USER,
    DEFAULT_CACHE_TTL_SECONDS, REPORT_CACHE_TTL_SECONDS,
};
use crate::domain::{TeamReport, User};
use crate::errors::{AppError, AppResult};

/// Outcome of one rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub count: u64,
    pub limit: u64,
    /// Seconds until the current window resets
    pub reset_after: u64,
}

impl RateLimitStatus {
    pub fn allowed(&self) -> bool {
        self.count <= self.limit
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.count)
    }
}

/// Redis cache wrapper over a multiplexed connection manager.
#[derive(Clone)]
pub struct Cache {
    connection: ConnectionManager,
    default_ttl: u64,
}

impl Cache {
    pub async fn connect(config: &Config) -> Result<Self, RedisError> {
        let client = Client::open(config.redis_url.as_str())?;
        let connection = ConnectionManager::new(client).await?;

        tracing::info!("Redis cache connected");

        Ok(Self {
            connection,
            default_ttl: DEFAULT_CACHE_TTL_SECONDS,
        })
    }

    /// Round-trip a PING (health checks).
    pub async fn ping(&self) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;
        Ok(())
    }

    // =========================================================================
    // Generic Cache Operations
    // =========================================================================

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await.map_err(cache_error)?;

        match value {
            Some(json) => {
                let parsed = serde_json::from_str(&json).map_err(|e| {
                    AppError::internal(format!("Cache deserialization error: {}", e))
                })?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> AppResult<()> {
        self.set_with_ttl(key, value, self.default_ttl).await
    }

    pub async fn set_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
    ) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let json = serde_json::to_string(value)
            .map_err(|e| AppError::internal(format!("Cache serialization error: {}", e)))?;

        conn.set_ex::<_, _, ()>(key, json, ttl_seconds)
            .await
            .map_err(cache_error)?;

        Ok(())
    }

    pub async fn delete(&self, key: &str) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let _: () = conn.del(key).await.map_err(cache_error)?;
        Ok(())
    }

    // =========================================================================
    // User Cache Operations
    // =========================================================================

    pub async fn get_user(&self, user_id: &Uuid) -> AppResult<Option<User>> {
        self.get(&user_key(user_id)).await
    }

    pub async fn set_user(&self, user: &User) -> AppResult<()> {
        self.set(&user_key(&user.id), user).await
    }

    pub async fn invalidate_user(&self, user_id: &Uuid) -> AppResult<()> {
        self.delete(&user_key(user_id)).await
    }

    // =========================================================================
    // Report Cache Operations
    // =========================================================================

    pub async fn get_report(&self, team_id: &Uuid, window_days: i64) -> AppResult<Option<TeamReport>> {
        self.get(&report_key(team_id, window_days)).await
    }

    pub async fn set_report(&self, report: &TeamReport) -> AppResult<()> {
        self.set_with_ttl(
            &report_key(&report.team_id, report.window_days),
            report,
            REPORT_CACHE_TTL_SECONDS,
        )
        .await
    }

    // =========================================================================
    // Rate Limiting Operations
    // =========================================================================

    /// Count one request against a fixed window.
    ///
    /// The counter is created by the first INCR and given the window as TTL.
    pub async fn check_rate_limit(
        &self,
        identifier: &str,
        max_requests: u64,
        window_seconds: u64,
    ) -> AppResult<RateLimitStatus> {
        let key = format!("{}{}", CACHE_PREFIX_RATE_LIMIT, identifier);
        let mut conn = self.connection.clone();

        let count: u64 = conn.incr(&key, 1u64).await.map_err(cache_error)?;
        if count == 1 {
            let _: () = conn
                .expire(&key, window_seconds as i64)
                .await
                .map_err(cache_error)?;
        }

        let ttl: i64 = conn.ttl(&key).await.map_err(cache_error)?;
        if ttl < 0 {
            // Key lost its expiry (e.g. EXPIRE failed after INCR); restore it.
            let _: () = conn
                .expire(&key, window_seconds as i64)
                .await
                .map_err(cache_error)?;
        }

        Ok(RateLimitStatus {
            count,
            limit: max_requests,
            reset_after: if ttl > 0 { ttl as u64 } else { window_seconds },
        })
    }
}

fn user_key(user_id: &Uuid) -> String {
    format!("{}{}", CACHE_PREFIX_USER, user_id)
}

fn report_key(team_id: &Uuid, window_days: i64) -> String {
    format!("{}{}:{}", CACHE_PREFIX_REPORT, team_id, window_days)
}

fn cache_error(e: RedisError) -> AppError {
    tracing::error!("Redis error: {}", e);
    AppError::internal(format!("Cache error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_keys() {
        let id = Uuid::nil();
        assert_eq!(user_key(&id), format!("user:{}", id));
        assert_eq!(report_key(&id, 14), format!("report:{}:14", id));
    }

    #[test]
    fn test_rate_limit_status() {
        let status = RateLimitStatus {
            count: 10,
            limit: 10,
            reset_after: 42,
        };
        assert!(status.allowed());
        assert_eq!(status.remaining(), 0);

        let over = RateLimitStatus { count: 11, ..status };
        assert!(!over.allowed());
    }
}
