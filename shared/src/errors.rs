//! # Application Error Types
//!
//! Unified error handling with automatic HTTP conversion.
//!
//! ## Error Categories
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          ApiError Categories                            │
//! ├─────────────────────────┬───────────────────┬───────────────────────────┤
//! │ Authentication (401)    │ Authorization(403)│ Validation (400)          │
//! ├─────────────────────────┼───────────────────┼───────────────────────────┤
//! │ InvalidCredentials      │ InsufficientPerms │ ValidationError           │
//! │ TokenExpired            │ DelegationDenied  │ BadRequest                │
//! │ InvalidToken            │ AccountSuspended  │                           │
//! │ TokenRevoked            │                   │                           │
//! │ MissingAuth             │                   │                           │
//! ├─────────────────────────┴───────────────────┴───────────────────────────┤
//! │ Resources (404, 409)    │ Server (500)                                  │
//! ├─────────────────────────┼───────────────────────────────────────────────┤
//! │ NotFound                │ DatabaseError, RedisError, InternalError      │
//! │ Conflict                │                                               │
//! └─────────────────────────┴───────────────────────────────────────────────┘
//! ```
//!
//! ## Enumeration Defense
//!
//! The three token-failure variants (`TokenExpired`, `InvalidToken`,
//! `TokenRevoked`) stay distinct in Rust for logging and tests, but wear
//! one message and one wire code so a caller cannot distinguish an
//! expired token from a tampered or revoked one. `InvalidCredentials`
//! likewise covers both unknown-email and wrong-password.
//!
//! ## HTTP Response Format
//!
//! ```json
//! {
//!   "code": "DELEGATION_DENIED",
//!   "message": "You cannot grant permissions you do not possess",
//!   "timestamp": "2024-01-15T10:30:00Z"
//! }
//! ```

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::ValidationErrors;

// =============================================================================
// Type Aliases
// =============================================================================

/// Result type alias for handlers and services.
pub type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// Main Error Enum
// =============================================================================

/// Application error type with automatic HTTP status mapping.
#[derive(Debug, Error)]
pub enum ApiError {
    // =========================================================================
    // Authentication Errors (401 Unauthorized)
    // =========================================================================

    /// Wrong email/password combination, or a password login against a
    /// social-only account. One message for every cause.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Access token past its `exp`. Shares the uniform token message.
    #[error("Invalid or expired token")]
    TokenExpired,

    /// Malformed token, wrong key, or tampered payload. Also used for
    /// unknown or consumed continuation tokens.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// Token whose `jti` sits on the blacklist.
    #[error("Invalid or expired token")]
    TokenRevoked,

    /// Request is missing the required credential entirely.
    #[error("Missing authentication")]
    MissingAuth,

    /// Password login attempted against a social-only principal (no
    /// stored password hash).
    #[error("This account uses social login")]
    SocialLoginOnly,

    // =========================================================================
    // Authorization Errors (403 Forbidden)
    // =========================================================================

    /// Principal status is not `active`.
    #[error("Account suspended")]
    AccountSuspended,

    /// The coarse capability bit for the operation is absent at the
    /// requested scope.
    #[error("Insufficient permissions")]
    InsufficientPermissions,

    /// The Superset Rule failed: the target bitmap is not a subset of the
    /// grantor's effective permissions. `action` is the verb attempted
    /// (grant / revoke / create / update / delete).
    #[error("You cannot {action} permissions you do not possess")]
    DelegationDenied {
        /// Verb for the human-readable sentence
        action: &'static str,
    },

    // =========================================================================
    // Validation Errors (400 Bad Request)
    // =========================================================================

    /// Request body failed `validator` rules; carries field-level detail.
    #[error("Validation error")]
    ValidationError(#[from] ValidationErrors),

    /// Semantic rejection with a custom message. Also covers the
    /// permission orchestrator's unknown-role/unknown-target cases, which
    /// deliberately answer 400 rather than 404.
    #[error("{message}")]
    BadRequest {
        /// Human-readable description of what's wrong
        message: String,
    },

    // =========================================================================
    // Resource Errors (404 Not Found, 409 Conflict)
    // =========================================================================

    /// Requested resource doesn't exist (auth surface only).
    #[error("Resource not found: {resource}")]
    NotFound {
        /// Resource identifier (e.g. "user:123")
        resource: String,
    },

    /// Uniqueness violation, e.g. registering an email that exists.
    #[error("{message}")]
    Conflict {
        /// Message shown to the client (e.g. "Email already registered")
        message: String,
    },

    // =========================================================================
    // Server Errors (500 Internal Server Error)
    // =========================================================================
    // Logged with detail; clients get the generic message only.

    /// PostgreSQL query failed.
    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    /// Redis operation failed.
    #[error("Redis error")]
    RedisError(#[from] redis::RedisError),

    /// Unspecified internal error (crypto failure, corrupt row, ...).
    #[error("Internal server error")]
    InternalError {
        /// Internal message for logging (not exposed to clients)
        message: String,
    },
}

// =============================================================================
// Error Methods
// =============================================================================

impl ApiError {
    /// Returns a machine-readable error code.
    ///
    /// Token-failure variants intentionally share `INVALID_TOKEN`; a
    /// distinct code per cause would reopen the oracle the message
    /// closes.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::TokenExpired | Self::InvalidToken | Self::TokenRevoked => "INVALID_TOKEN",
            Self::MissingAuth => "MISSING_AUTH",
            Self::SocialLoginOnly => "SOCIAL_LOGIN_ONLY",
            Self::AccountSuspended => "ACCOUNT_SUSPENDED",
            Self::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            Self::DelegationDenied { .. } => "DELEGATION_DENIED",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::BadRequest { .. } => "BAD_REQUEST",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::RedisError(_) => "REDIS_ERROR",
            Self::InternalError { .. } => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials
            | Self::TokenExpired
            | Self::InvalidToken
            | Self::TokenRevoked
            | Self::MissingAuth
            | Self::SocialLoginOnly => StatusCode::UNAUTHORIZED,

            Self::AccountSuspended
            | Self::InsufficientPermissions
            | Self::DelegationDenied { .. } => StatusCode::FORBIDDEN,

            Self::ValidationError(_) | Self::BadRequest { .. } => StatusCode::BAD_REQUEST,

            Self::NotFound { .. } => StatusCode::NOT_FOUND,

            Self::Conflict { .. } => StatusCode::CONFLICT,

            Self::DatabaseError(_) | Self::RedisError(_) | Self::InternalError { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns `true` if this is a server-side error (5xx).
    ///
    /// Server errors are logged at ERROR level; client errors at WARN.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::DatabaseError(_) | Self::RedisError(_) | Self::InternalError { .. }
        )
    }
}

// =============================================================================
// Response Structure
// =============================================================================

/// Standard error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code for programmatic handling
    pub code: String,

    /// Human-readable message (for debugging, not for user display)
    pub message: String,

    /// Request ID for tracing across services
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// Additional error details (field-level validation errors)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// When the error occurred (ISO 8601)
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorResponse {
    /// Creates a new error response from an `ApiError`.
    pub fn new(error: &ApiError) -> Self {
        let details = match error {
            ApiError::ValidationError(errors) => {
                Some(serde_json::to_value(errors).unwrap_or_default())
            }
            // Server errors: log the cause, never ship it to the client
            _ => None,
        };

        Self {
            code: error.error_code().to_string(),
            message: error.to_string(),
            request_id: None,
            details,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Attaches a request ID for distributed tracing.
    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = Some(request_id.to_string());
        self
    }
}

// =============================================================================
// Actix-web Integration
// =============================================================================

/// Allows returning `ApiError` directly from handlers; the error converts
/// to an HTTP response with the mapped status code and JSON body.
impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.status_code()
    }

    fn error_response(&self) -> HttpResponse {
        if self.is_server_error() {
            tracing::error!(code = self.error_code(), error = ?self, "Request failed");
        }
        let response = ErrorResponse::new(self);
        HttpResponse::build(self.status_code()).json(response)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_errors_return_401() {
        assert_eq!(ApiError::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::TokenExpired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::InvalidToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::TokenRevoked.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::MissingAuth.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::SocialLoginOnly.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_authorization_errors_return_403() {
        assert_eq!(ApiError::InsufficientPermissions.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::AccountSuspended.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::DelegationDenied { action: "grant" }.status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_token_failures_share_one_wire_shape() {
        // No oracle: expired, tampered and revoked look identical
        for error in [ApiError::TokenExpired, ApiError::InvalidToken, ApiError::TokenRevoked] {
            assert_eq!(error.error_code(), "INVALID_TOKEN");
            assert_eq!(error.to_string(), "Invalid or expired token");
            assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn test_delegation_denied_message() {
        let error = ApiError::DelegationDenied { action: "grant" };
        assert_eq!(error.to_string(), "You cannot grant permissions you do not possess");
    }

    #[test]
    fn test_conflict_message_is_verbatim() {
        let error = ApiError::Conflict { message: "Email already registered".to_string() };
        assert_eq!(error.to_string(), "Email already registered");
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_server_errors_are_flagged() {
        assert!(ApiError::InternalError { message: "x".to_string() }.is_server_error());
        assert!(!ApiError::InvalidCredentials.is_server_error());
        assert!(!ApiError::BadRequest { message: "x".to_string() }.is_server_error());
    }

    #[test]
    fn test_error_response_includes_timestamp() {
        let response = ErrorResponse::new(&ApiError::InvalidCredentials);
        let diff = chrono::Utc::now() - response.timestamp;
        assert!(diff.num_seconds() < 60);
    }

    #[test]
    fn test_error_response_with_request_id() {
        let request_id = Uuid::new_v4();
        let response = ErrorResponse::new(&ApiError::InvalidCredentials).with_request_id(request_id);
        assert_eq!(response.request_id, Some(request_id.to_string()));
    }
}
