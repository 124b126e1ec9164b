//! # Request Validation Helpers
//!
//! Utilities for validating incoming request data with the `validator`
//! crate. DTOs declare their rules via derive:
//!
//! ```rust,ignore
//! #[derive(Validate)]
//! struct RegisterRequest {
//!     #[validate(email)]
//!     email: String,
//!
//!     #[validate(length(min = 8, max = 128))]
//!     password: String,
//! }
//! ```
//!
//! Failures surface as [`ApiError::ValidationError`], which renders a 400
//! with field-level details. Password *strength* is a service-layer
//! concern (see `shared::auth::password::PasswordPolicy`); this layer only
//! checks shape.

use crate::errors::ApiError;
use validator::Validate;

// =============================================================================
// Core Validation Functions
// =============================================================================

/// Validates a request DTO that implements `Validate`.
///
/// ## Example
///
/// ```rust,ignore
/// let body = body.into_inner();
/// validation::validate_request(&body)?;
/// ```
pub fn validate_request<T: Validate>(request: &T) -> Result<(), ApiError> {
    request.validate().map_err(ApiError::ValidationError)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(email)]
        email: String,

        #[validate(length(min = 8))]
        password: String,
    }

    #[test]
    fn test_valid_request_passes() {
        let sample = Sample {
            email: "user@example.com".to_string(),
            password: "longenough".to_string(),
        };
        assert!(validate_request(&sample).is_ok());
    }

    #[test]
    fn test_invalid_email_fails() {
        let sample = Sample {
            email: "not-an-email".to_string(),
            password: "longenough".to_string(),
        };
        assert!(matches!(
            validate_request(&sample),
            Err(ApiError::ValidationError(_))
        ));
    }

    #[test]
    fn test_short_password_fails() {
        let sample = Sample {
            email: "user@example.com".to_string(),
            password: "short".to_string(),
        };
        assert!(validate_request(&sample).is_err());
    }
}
