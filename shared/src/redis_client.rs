//! # Redis Client - Token Blacklist Gate
//!
//! High-level Redis client backing the access-token blacklist.
//!
//! ## Why a Blacklist?
//!
//! Access tokens are stateless: once signed they verify anywhere until
//! `exp`. Logout and forced revocation therefore need a side channel. The
//! blacklist stores the `jti` of every revoked token, with a TTL equal to
//! the seconds the token had left to live:
//!
//! | Property | Consequence |
//! |----------|-------------|
//! | Key = `blacklist:{jti}` | presence ⇒ revoked, regardless of signature |
//! | TTL = remaining lifetime | entries vanish exactly when the token would have expired anyway |
//! | Size | O(tokens revoked in the last access-token lifetime), no sweeping |
//!
//! ## Connection Management
//!
//! Uses a `ConnectionManager`, which reconnects automatically on failure -
//! more resilient than a bare connection for a long-running service.

use crate::config::RedisConfig;
use crate::errors::ApiError;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::info;

// =============================================================================
// Redis Client
// =============================================================================

/// Async Redis client with automatic reconnection.
///
/// `Clone + Send + Sync`; cloning is cheap (an `Arc` clone internally).
#[derive(Clone)]
pub struct RedisClient {
    /// Connection manager for automatic reconnection
    conn: ConnectionManager,
}

impl RedisClient {
    /// Creates a new Redis client and establishes the connection.
    pub async fn new(config: &RedisConfig) -> Result<Self, ApiError> {
        info!(url = %config.url, "Connecting to Redis");

        let client = redis::Client::open(config.url.as_str()).map_err(ApiError::RedisError)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(ApiError::RedisError)?;

        info!("Redis connection established");

        Ok(Self { conn })
    }

    // =========================================================================
    // Basic Operations
    // =========================================================================

    /// Stores a string value with a TTL.
    pub async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ApiError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs())
            .await
            .map_err(ApiError::RedisError)?;
        Ok(())
    }

    /// Checks if a key exists.
    pub async fn exists(&self, key: &str) -> Result<bool, ApiError> {
        let mut conn = self.conn.clone();
        conn.exists(key).await.map_err(ApiError::RedisError)
    }

    /// Health check - verifies Redis is responding.
    pub async fn ping(&self) -> Result<(), ApiError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(ApiError::RedisError)?;
        Ok(())
    }

    // =========================================================================
    // Token Blacklist
    // =========================================================================

    /// Revokes an access token by its `jti` until its natural expiry.
    ///
    /// A zero TTL means the token is already past `exp`; nothing needs to
    /// be written (and Redis would reject a zero-second SETEX).
    pub async fn blacklist_token(&self, jti: &str, ttl: Duration) -> Result<(), ApiError> {
        if ttl.is_zero() {
            return Ok(());
        }
        let key = Self::blacklist_key(jti);
        self.set_ex(&key, "1", ttl).await
    }

    /// Membership test: has this `jti` been revoked?
    ///
    /// Absence means not-revoked; the decode path calls this after
    /// signature acceptance and before trusting the claims.
    pub async fn is_token_blacklisted(&self, jti: &str) -> Result<bool, ApiError> {
        let key = Self::blacklist_key(jti);
        self.exists(&key).await
    }

    fn blacklist_key(jti: &str) -> String {
        format!("blacklist:{}", jti)
    }
}

// Hide connection internals in Debug output
impl std::fmt::Debug for RedisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisClient").finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blacklist_key_format() {
        assert_eq!(
            RedisClient::blacklist_key("550e8400-e29b-41d4-a716-446655440000"),
            "blacklist:550e8400-e29b-41d4-a716-446655440000"
        );
    }
}
