//! # User Repository
//!
//! Data access for principals, continuation tokens, and the email-bound
//! lifecycle tokens.
//!
//! ## Query Patterns
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │ Pattern            │ Example                                            │
//! ├────────────────────┼────────────────────────────────────────────────────┤
//! │ Live tokens        │ WHERE revoked_at IS NULL AND expires_at > NOW()    │
//! │ Single-use consume │ UPDATE/DELETE ... RETURNING * (atomic)             │
//! │ Conditional revoke │ WHERE revoked_at IS NULL, exactly one row          │
//! │ Returning          │ INSERT ... RETURNING * (generated fields)          │
//! │ Parameterized      │ Always $1, $2 - never string interpolation         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rotation linearizability lives here: [`UserRepository::consume_refresh_token`]
//! succeeds for exactly one caller per stored token because the revoke is
//! conditional on `revoked_at IS NULL`. The loser of a race sees zero rows
//! and reports the token as already consumed.

use chrono::{DateTime, Utc};
use shared::errors::ApiError;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{
    EmailVerificationToken, NewRefreshToken, NewUser, PasswordResetToken, RefreshToken, User,
};

/// Repository for principal and token persistence.
///
/// `Send + Sync` because `PgPool` is `Arc`-based; clone freely.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // USER OPERATIONS
    // =========================================================================

    /// Creates a new principal.
    ///
    /// The caller must pre-hash the password and lowercase the email.
    ///
    /// ## Errors
    ///
    /// - `ApiError::Conflict` if the email is already registered
    pub async fn create(&self, new_user: NewUser) -> Result<User, ApiError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, display_name)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.display_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.constraint() == Some("users_email_key") {
                    return ApiError::Conflict {
                        message: "Email already registered".to_string(),
                    };
                }
            }
            ApiError::DatabaseError(e)
        })?;

        Ok(user)
    }

    /// Finds a principal by lowercase email.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Finds a principal by id.
    pub async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Checks whether an email is already registered.
    pub async fn email_exists(&self, email: &str) -> Result<bool, ApiError> {
        let exists: (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists.0)
    }

    /// Stamps the last successful login.
    pub async fn update_last_login(&self, user_id: Uuid) -> Result<(), ApiError> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Replaces the password hash and bumps `updated_at`.
    pub async fn set_password_hash(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), ApiError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $1, updated_at = NOW()
            WHERE user_id = $2
            "#,
        )
        .bind(password_hash)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound { resource: format!("user:{}", user_id) });
        }

        Ok(())
    }

    /// Flips the email-verified flag and bumps `updated_at`.
    pub async fn mark_email_verified(&self, user_id: Uuid) -> Result<(), ApiError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email_verified = TRUE, updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound { resource: format!("user:{}", user_id) });
        }

        Ok(())
    }

    /// Lists the most recently created principals, newest first.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<User>, ApiError> {
        let users =
            sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC LIMIT $1")
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;

        Ok(users)
    }

    // =========================================================================
    // CONTINUATION (REFRESH) TOKEN OPERATIONS
    // =========================================================================

    /// Persists a freshly minted continuation token (fingerprint only).
    pub async fn create_refresh_token(
        &self,
        new_token: NewRefreshToken,
    ) -> Result<RefreshToken, ApiError> {
        let token = sqlx::query_as::<_, RefreshToken>(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(new_token.user_id)
        .bind(&new_token.token_hash)
        .bind(new_token.expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(token)
    }

    /// Looks up a live continuation token by fingerprint.
    ///
    /// Revoked or expired rows never match; the caller maps absence to
    /// the uniform "invalid or expired" failure.
    pub async fn find_active_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshToken>, ApiError> {
        let token = sqlx::query_as::<_, RefreshToken>(
            r#"
            SELECT * FROM refresh_tokens
            WHERE token_hash = $1
              AND revoked_at IS NULL
              AND expires_at > NOW()
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    /// Consumes a continuation token for rotation.
    ///
    /// The update is conditional on `revoked_at IS NULL`: when two
    /// rotations race on the same bearer, exactly one sees an affected
    /// row. Returns `false` for the loser, who must treat the token as
    /// invalid.
    pub async fn consume_refresh_token(&self, token_id: Uuid) -> Result<bool, ApiError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = NOW()
            WHERE token_id = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(token_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Revokes every live continuation token for a principal
    /// (logout-everywhere, password change/reset).
    ///
    /// Returns the number of sessions terminated.
    pub async fn revoke_all_refresh_tokens(&self, user_id: Uuid) -> Result<u64, ApiError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = NOW()
            WHERE user_id = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    // EMAIL VERIFICATION TOKENS
    // =========================================================================

    /// Stores a verification token, replacing any prior one for the user.
    ///
    /// Delete-then-insert runs in one transaction so the at-most-one
    /// invariant holds even against the UNIQUE(user_id) constraint.
    pub async fn replace_verification_token(
        &self,
        user_id: Uuid,
        email: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<EmailVerificationToken, ApiError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM email_verification_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let record = sqlx::query_as::<_, EmailVerificationToken>(
            r#"
            INSERT INTO email_verification_tokens (user_id, token, email, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(email)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(record)
    }

    /// Consumes a verification token: deletes the row iff it exists and
    /// is unexpired, returning it. One query, so double-verification of
    /// the same token cannot both succeed.
    pub async fn consume_verification_token(
        &self,
        token: &str,
    ) -> Result<Option<EmailVerificationToken>, ApiError> {
        let record = sqlx::query_as::<_, EmailVerificationToken>(
            r#"
            DELETE FROM email_verification_tokens
            WHERE token = $1 AND expires_at > NOW()
            RETURNING *
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    // =========================================================================
    // PASSWORD RESET TOKENS
    // =========================================================================

    /// Stores a reset token, replacing any prior *active* one.
    ///
    /// Used rows stay behind for replay detection; only the unused row is
    /// displaced (the partial unique index allows one active per user).
    pub async fn replace_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<PasswordResetToken, ApiError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM password_reset_tokens WHERE user_id = $1 AND used_at IS NULL")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let record = sqlx::query_as::<_, PasswordResetToken>(
            r#"
            INSERT INTO password_reset_tokens (user_id, token, expires_at)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(record)
    }

    /// Consumes a reset token: sets `used_at` iff the row is unused and
    /// unexpired. `used_at` is monotone - once set it never clears - so a
    /// second consume of the same token returns `None`.
    pub async fn consume_reset_token(
        &self,
        token: &str,
    ) -> Result<Option<PasswordResetToken>, ApiError> {
        let record = sqlx::query_as::<_, PasswordResetToken>(
            r#"
            UPDATE password_reset_tokens
            SET used_at = NOW()
            WHERE token = $1
              AND used_at IS NULL
              AND expires_at > NOW()
            RETURNING *
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // Queries require a live database; covered by construction (conditional
    // updates, unique indexes) and exercised through the service layer.
    // These tests pin the creation DTO shapes.

    #[test]
    fn test_new_user_struct() {
        let new_user = NewUser {
            email: "user@example.com".to_string(),
            password_hash: Some("base64blob".to_string()),
            display_name: Some("jane".to_string()),
        };

        assert_eq!(new_user.email, "user@example.com");
        assert!(new_user.password_hash.is_some());
    }

    #[test]
    fn test_new_refresh_token_struct() {
        let new_token = NewRefreshToken {
            user_id: Uuid::new_v4(),
            token_hash: "base64_sha256_fingerprint".to_string(),
            expires_at: Utc::now(),
        };

        assert!(!new_token.token_hash.is_empty());
    }
}
