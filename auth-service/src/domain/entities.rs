//! # Domain Entities
//!
//! Persistent business objects for the authentication and authorization
//! core. Entities map 1:1 to database tables via sqlx's `FromRow`.
//!
//! ## Entity Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ┌──────────┐ 1:N ┌───────────────┐      ┌───────────────────────────┐  │
//! │  │   User   │────▶│ RefreshToken  │      │ EmailVerificationToken    │  │
//! │  │          │────▶│               │      │ PasswordResetToken (1:0..1)│ │
//! │  └────┬─────┘     └───────────────┘      └───────────────────────────┘  │
//! │       │ owner                                                           │
//! │       ▼                                                                 │
//! │  ┌──────────────┐ 1:N ┌────────┐        ┌────────────────────────────┐  │
//! │  │ Organization │────▶│  Team  │        │ Role (bitmap low/high)     │  │
//! │  └──────┬───────┘     └────────┘        └────────────┬───────────────┘  │
//! │         │                                            │                  │
//! │         └──────────────┐      ┌──────────────────────┘                  │
//! │                        ▼      ▼                                         │
//! │                  ┌──────────────────┐     ┌──────────────────────────┐  │
//! │                  │ RoleAssignment   │     │ PermissionAuditEntry     │  │
//! │                  │ (user,role,scope)│     │ (append-only)            │  │
//! │                  └──────────────────┘     └──────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Considerations
//!
//! - **Never expose `password_hash`**: use [`UserProfile`] for responses.
//! - **Refresh tokens are stored hashed**; the bearer value never lands
//!   in the database.
//! - **Bitmaps are decimal strings** in storage: PostgreSQL has no
//!   unsigned 64-bit column and bit 63 is a valid permission bit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::errors::ApiError;
use shared::permissions::PermissionSet;
use sqlx::FromRow;
use uuid::Uuid;

// =============================================================================
// USER
// =============================================================================

/// Principal status values as stored in `users.status`.
pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_SUSPENDED: &str = "suspended";

/// Complete user entity as stored in the `users` table.
///
/// Contains sensitive fields; convert to [`UserProfile`] before it leaves
/// the service layer.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    /// Unique identifier (UUID v4)
    pub user_id: Uuid,
    /// Lowercase email address (unique)
    pub email: String,
    /// PBKDF2 blob; `None` for social-only principals, who cannot
    /// authenticate by password
    pub password_hash: Option<String>,
    /// Whether the email has been verified
    pub email_verified: bool,
    /// Optional display name
    pub display_name: Option<String>,
    /// Optional avatar URL
    pub avatar_url: Option<String>,
    /// `active` or `suspended`
    pub status: String,
    /// Reserved for MFA; no flow reads this yet
    pub mfa_enabled: bool,
    /// Last successful login
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A suspended principal cannot authenticate nor act as actor/target
    /// of mutating operations.
    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }
}

// =============================================================================
// USER PROFILE (SAFE FOR API RESPONSES)
// =============================================================================

/// Public user view without sensitive fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub email_verified: bool,
    pub status: String,
    pub mfa_enabled: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.user_id,
            email: user.email,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            email_verified: user.email_verified,
            status: user.status,
            mfa_enabled: user.mfa_enabled,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Data required to create a new user. The password must already be
/// hashed; the email must already be lowercased.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: Option<String>,
    pub display_name: Option<String>,
}

// =============================================================================
// CONTINUATION (REFRESH) TOKENS
// =============================================================================

/// Stored continuation token. Only the fingerprint of the bearer value is
/// kept; a row with `revoked_at IS NULL` and a future `expires_at` is the
/// single live generation for that bearer.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    pub token_id: Uuid,
    pub user_id: Uuid,
    /// base64(SHA-256(bearer)); never the bearer itself
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Set on rotation, logout, or bulk revoke
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Data required to persist a freshly minted continuation token.
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

// =============================================================================
// LIFECYCLE TOKENS
// =============================================================================

/// Email-verification token. At most one row per user; deleted on
/// successful verification.
#[derive(Debug, Clone, FromRow)]
pub struct EmailVerificationToken {
    pub token_id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    /// Address the mail was sent to, snapshotted at issuance
    pub email: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Password-reset token. Consumption sets `used_at` (instead of deleting)
/// so replay attempts are detectable.
#[derive(Debug, Clone, FromRow)]
pub struct PasswordResetToken {
    pub token_id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// ORGANIZATIONS & TEAMS
// =============================================================================

/// Tenant root. The owner implicitly holds the full permission superset -
/// no assignment rows exist for ownership.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub organization_id: Uuid,
    pub slug: String,
    pub owner_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Team inside an organization. Cannot exist without its organization;
/// deleting the organization cascades.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub team_id: Uuid,
    pub organization_id: Uuid,
    pub slug: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// ROLES
// =============================================================================

/// A named bundle of permissions.
///
/// `organization_id = None` means a global/system role. The bitmap halves
/// are decimal strings in storage; [`Role::permission_set`] parses them.
#[derive(Debug, Clone, FromRow)]
pub struct Role {
    pub role_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Decimal string of bits 0-63
    pub permissions_low: String,
    /// Decimal string of bits 64-127
    pub permissions_high: String,
    /// System roles cannot be deleted or renamed
    pub is_system: bool,
    pub organization_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    /// Parses the stored bitmap halves.
    ///
    /// A parse failure means the row was written outside the service and
    /// is corrupt; callers surface it as an internal error, never as a
    /// client error.
    pub fn permission_set(&self) -> Result<PermissionSet, ApiError> {
        PermissionSet::from_decimal_parts(&self.permissions_low, &self.permissions_high).ok_or_else(
            || ApiError::InternalError {
                message: format!("Corrupt permission bitmap on role {}", self.role_id),
            },
        )
    }
}

/// Data required to create a role.
#[derive(Debug, Clone)]
pub struct NewRole {
    pub name: String,
    pub description: Option<String>,
    pub permissions: PermissionSet,
    pub is_system: bool,
    pub organization_id: Option<Uuid>,
}

// =============================================================================
// SCOPE
// =============================================================================

/// An authorization scope: global, org-scoped, or team-scoped.
///
/// | organization | team | Meaning |
/// |---|---|---|
/// | None | None | global |
/// | Some(X) | None | org-scoped |
/// | Some(X) | Some(Y) | team-scoped |
///
/// Team-scoped without an organization is invalid and rejected at
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    pub organization_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
}

impl Scope {
    pub const GLOBAL: Scope = Scope { organization_id: None, team_id: None };

    /// Builds a scope, rejecting the team-without-org shape.
    pub fn new(organization_id: Option<Uuid>, team_id: Option<Uuid>) -> Result<Self, ApiError> {
        if team_id.is_some() && organization_id.is_none() {
            return Err(ApiError::BadRequest {
                message: "A team scope requires an organization".to_string(),
            });
        }
        Ok(Self { organization_id, team_id })
    }

    pub fn org(organization_id: Uuid) -> Self {
        Self { organization_id: Some(organization_id), team_id: None }
    }
}

// =============================================================================
// ROLE ASSIGNMENTS
// =============================================================================

/// A role granted to a principal at a scope.
///
/// The tuple (user, role, org-or-null, team-or-null) is unique; the store
/// index enforces it so concurrent duplicate grants race and one fails.
#[derive(Debug, Clone, FromRow)]
pub struct RoleAssignment {
    pub assignment_id: Uuid,
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    /// Grantor; nulled if that principal is deleted
    pub granted_by: Option<Uuid>,
    /// Optional expiry; expired assignments contribute nothing
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Data required to grant a role.
#[derive(Debug, Clone)]
pub struct NewRoleAssignment {
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub scope: Scope,
    pub granted_by: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
}

// =============================================================================
// PERMISSION AUDIT
// =============================================================================

/// Audited mutation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Grant,
    Revoke,
    RoleCreate,
    RoleUpdate,
    RoleDelete,
}

impl AuditAction {
    /// Storage form, matching the `permission_audit.action` CHECK.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grant => "grant",
            Self::Revoke => "revoke",
            Self::RoleCreate => "role_create",
            Self::RoleUpdate => "role_update",
            Self::RoleDelete => "role_delete",
        }
    }
}

/// One append-only audit record. Ordering by `created_at` descending is
/// the canonical history.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionAuditEntry {
    pub audit_id: Uuid,
    pub action: String,
    pub actor_id: Option<Uuid>,
    pub target_user_id: Option<Uuid>,
    pub role_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Data for a new audit record; id and created_at come from the store.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub action: AuditAction,
    pub actor_id: Uuid,
    pub target_user_id: Option<Uuid>,
    pub role_id: Option<Uuid>,
    pub scope: Scope,
    pub metadata: serde_json::Value,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_rejects_team_without_org() {
        let team = Uuid::new_v4();
        assert!(Scope::new(None, Some(team)).is_err());
    }

    #[test]
    fn test_scope_shapes() {
        let org = Uuid::new_v4();
        let team = Uuid::new_v4();

        assert_eq!(Scope::new(None, None).unwrap(), Scope::GLOBAL);
        assert!(Scope::new(Some(org), None).is_ok());
        assert!(Scope::new(Some(org), Some(team)).is_ok());
    }

    #[test]
    fn test_audit_action_storage_form() {
        assert_eq!(AuditAction::Grant.as_str(), "grant");
        assert_eq!(AuditAction::RoleCreate.as_str(), "role_create");
        assert_eq!(AuditAction::RoleDelete.as_str(), "role_delete");
    }

    #[test]
    fn test_role_permission_set_round_trip() {
        let set = shared::permissions::catalog::from_names(["data.read", "perm.grant"]);
        let (low, high) = set.to_decimal_parts();
        let role = Role {
            role_id: Uuid::new_v4(),
            name: "test".to_string(),
            description: None,
            permissions_low: low,
            permissions_high: high,
            is_system: false,
            organization_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(role.permission_set().unwrap(), set);
    }

    #[test]
    fn test_role_permission_set_rejects_corrupt_row() {
        let role = Role {
            role_id: Uuid::new_v4(),
            name: "corrupt".to_string(),
            description: None,
            permissions_low: "garbage".to_string(),
            permissions_high: "0".to_string(),
            is_system: false,
            organization_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(role.permission_set().is_err());
    }

    #[test]
    fn test_user_profile_strips_password_hash() {
        let user = User {
            user_id: Uuid::new_v4(),
            email: "user@example.com".to_string(),
            password_hash: Some("blob".to_string()),
            email_verified: false,
            display_name: Some("jane".to_string()),
            avatar_url: None,
            status: STATUS_ACTIVE.to_string(),
            mfa_enabled: false,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let profile: UserProfile = user.clone().into();
        assert_eq!(profile.id, user.user_id);
        let json = serde_json::to_value(&profile).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn test_suspended_user_is_not_active() {
        let mut user = User {
            user_id: Uuid::new_v4(),
            email: "user@example.com".to_string(),
            password_hash: None,
            email_verified: true,
            display_name: None,
            avatar_url: None,
            status: STATUS_ACTIVE.to_string(),
            mfa_enabled: false,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(user.is_active());
        user.status = STATUS_SUSPENDED.to_string();
        assert!(!user.is_active());
    }
}
