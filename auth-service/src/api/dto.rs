//! # Data Transfer Objects
//!
//! The API contract: request validation (via `validator`) and response
//! serialization (camelCase JSON).
//!
//! ## Bitmap Serialization
//!
//! Permission bitmaps always cross the wire as **decimal strings**
//! (`low`, `high`): the halves exceed 53 bits, so JSON numbers would be
//! corrupted by any IEEE-754 consumer. [`PermissionsDto`] is the single
//! place that rule is applied.
//!
//! ## Validation Rules
//!
//! | Field | Rules |
//! |-------|-------|
//! | `email` | valid format, max 255 chars |
//! | `password` | 8-128 chars (strength policy runs in the service) |
//! | `displayName` | max 100 chars |
//! | `token` | non-empty |
//! | role `name` | 1-100 chars |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::errors::ApiError;
use shared::permissions::catalog;
use uuid::Uuid;
use validator::Validate;

use crate::domain::{PermissionAuditEntry, Role, RoleAssignment, UserProfile};
use crate::service::EffectivePermissions;

// =============================================================================
// AUTH REQUESTS
// =============================================================================

/// Request body for `POST /v1/auth/register`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    #[validate(length(max = 255, message = "Email too long"))]
    pub email: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,

    #[validate(length(max = 100, message = "Display name too long"))]
    pub display_name: Option<String>,
}

/// Request body for `POST /v1/auth/login`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Request body for `POST /v1/auth/change-password`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub new_password: String,
}

/// Request body for `POST /v1/auth/verify-email`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEmailRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

/// Request body for `POST /v1/auth/resend-verification`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResendVerificationRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// Request body for `POST /v1/auth/forgot-password`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// Request body for `POST /v1/auth/reset-password`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub new_password: String,
}

// =============================================================================
// AUTH RESPONSES
// =============================================================================

/// Generic `{ message }` response.
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Compact user view in the register response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredUserDto {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
}

/// Response body for `POST /v1/auth/register` (201).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: String,
    pub access_token: String,
    pub user: RegisteredUserDto,
}

/// Compact user view in the login response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedInUserDto {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub email_verified: bool,
}

/// Response body for `POST /v1/auth/login` (200).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub message: String,
    pub access_token: String,
    pub user: LoggedInUserDto,
}

/// Response body for `POST /v1/auth/refresh` (200). The rotated
/// continuation token travels only in the rewritten cookie.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
}

/// Response body for `GET /v1/auth/me` (200).
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    pub user: UserProfile,
}

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub database: String,
    pub redis: String,
    pub timestamp: String,
}

// =============================================================================
// PERMISSION REQUESTS
// =============================================================================

/// Request body for `POST /v1/permissions/grant`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GrantRoleRequest {
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Request body for `POST /v1/permissions/revoke`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RevokeRoleRequest {
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
}

/// Request body for `POST /v1/roles`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoleRequest {
    #[validate(length(min = 1, max = 100, message = "Role name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(max = 500, message = "Description too long"))]
    pub description: Option<String>,

    /// Unknown names are dropped silently (forward compatibility)
    pub permission_names: Vec<String>,

    pub organization_id: Option<Uuid>,
}

/// Request body for `PUT /v1/roles/{roleId}`. Omitted fields are kept.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    #[validate(length(min = 1, max = 100, message = "Role name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 500, message = "Description too long"))]
    pub description: Option<String>,

    pub permission_names: Option<Vec<String>>,
}

/// Query string for `GET /v1/roles`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRolesQuery {
    pub organization_id: Option<Uuid>,
}

/// Query string for `GET /v1/users/{userId}/permissions`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPermissionsQuery {
    pub organization_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
}

/// Query string for `GET /v1/permissions/audit`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditTrailQuery {
    pub actor_id: Option<Uuid>,
    pub target_user_id: Option<Uuid>,
    pub role_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub action: Option<String>,
    pub limit: Option<i64>,
}

// =============================================================================
// PERMISSION RESPONSES
// =============================================================================

/// A permission bitmap on the wire: decimal-string halves plus the
/// decoded names.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionsDto {
    /// Bits 0-63 as a decimal string
    pub low: String,
    /// Bits 64-127 as a decimal string
    pub high: String,
    /// Decoded catalog names, declaration order
    pub names: Vec<String>,
}

impl From<shared::permissions::PermissionSet> for PermissionsDto {
    fn from(set: shared::permissions::PermissionSet) -> Self {
        let (low, high) = set.to_decimal_parts();
        Self {
            low,
            high,
            names: catalog::to_names(set).into_iter().map(str::to_owned).collect(),
        }
    }
}

/// A role with its resolved permission names.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDto {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub permissions: PermissionsDto,
    pub is_system: bool,
    pub organization_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RoleDto {
    /// Fallible because the stored bitmap halves must parse; a corrupt
    /// row surfaces as a 500, never a bad payload.
    pub fn from_role(role: Role) -> Result<Self, ApiError> {
        let set = role.permission_set()?;
        Ok(Self {
            id: role.role_id,
            name: role.name,
            description: role.description,
            permissions: set.into(),
            is_system: role.is_system,
            organization_id: role.organization_id,
            created_at: role.created_at,
            updated_at: role.updated_at,
        })
    }
}

/// A role assignment on the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub granted_by: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<RoleAssignment> for AssignmentDto {
    fn from(a: RoleAssignment) -> Self {
        Self {
            id: a.assignment_id,
            user_id: a.user_id,
            role_id: a.role_id,
            organization_id: a.organization_id,
            team_id: a.team_id,
            granted_by: a.granted_by,
            expires_at: a.expires_at,
            created_at: a.created_at,
        }
    }
}

/// Response for `POST /v1/permissions/grant`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantResponse {
    pub message: String,
    pub assignment: AssignmentDto,
}

/// Response carrying one role.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleResponse {
    pub message: String,
    pub role: RoleDto,
}

/// Response for `GET /v1/roles`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RolesListResponse {
    pub roles: Vec<RoleDto>,
}

/// Response for `GET /v1/users/{userId}/permissions`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPermissionsResponse {
    pub user_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub is_owner: bool,
    pub permissions: PermissionsDto,
}

impl UserPermissionsResponse {
    pub fn new(
        user_id: Uuid,
        organization_id: Option<Uuid>,
        team_id: Option<Uuid>,
        effective: EffectivePermissions,
    ) -> Self {
        Self {
            user_id,
            organization_id,
            team_id,
            is_owner: effective.is_owner,
            permissions: effective.set.into(),
        }
    }
}

/// Response for `GET /v1/permissions/audit`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditTrailResponse {
    pub entries: Vec<PermissionAuditEntry>,
}

/// Response for `GET /v1/users`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersListResponse {
    pub users: Vec<UserProfile>,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use shared::permissions::FULL_SUPERSET;

    #[test]
    fn test_permissions_dto_uses_decimal_strings() {
        let dto: PermissionsDto = FULL_SUPERSET.into();
        let json = serde_json::to_value(&dto).unwrap();

        // Strings on the wire - numbers would be clipped at 53 bits
        assert!(json["low"].is_string());
        assert!(json["high"].is_string());

        let (low, high) = FULL_SUPERSET.to_decimal_parts();
        assert_eq!(json["low"], low);
        assert_eq!(json["high"], high);
        assert_eq!(
            dto.names.len(),
            shared::permissions::CATALOG.len()
        );
    }

    #[test]
    fn test_register_request_validation() {
        use validator::Validate;

        let ok = RegisterRequest {
            email: "user@example.com".to_string(),
            password: "SecureP@ss123".to_string(),
            display_name: Some("jane".to_string()),
        };
        assert!(ok.validate().is_ok());

        let bad_email = RegisterRequest {
            email: "nope".to_string(),
            password: "SecureP@ss123".to_string(),
            display_name: None,
        };
        assert!(bad_email.validate().is_err());

        let short_password = RegisterRequest {
            email: "user@example.com".to_string(),
            password: "short".to_string(),
            display_name: None,
        };
        assert!(short_password.validate().is_err());
    }

    #[test]
    fn test_camel_case_wire_names() {
        let response = RegisterResponse {
            message: "ok".to_string(),
            access_token: "token".to_string(),
            user: RegisteredUserDto {
                id: Uuid::new_v4(),
                email: "user@example.com".to_string(),
                display_name: Some("jane".to_string()),
            },
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("accessToken").is_some());
        assert!(json["user"].get("displayName").is_some());
    }
}
