//! # Permission Repository
//!
//! Data access for roles, role assignments, organizations, teams, and the
//! permission audit trail.
//!
//! ## Audit Atomicity
//!
//! Every mutation that must be audited (grant, revoke, role create /
//! update / delete) runs in a transaction that also inserts the audit
//! row. An observable mutation therefore cannot exist without its audit
//! record, and a failed mutation leaves no phantom audit entry.
//!
//! ## Scope Matching
//!
//! Assignments are selected at an *exact* scope: `IS NOT DISTINCT FROM`
//! makes NULL compare equal to NULL, so global, org-scoped and
//! team-scoped queries each see only their own rows. The resolver never
//! merges scopes implicitly.

use shared::errors::ApiError;
use shared::permissions::PermissionSet;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::domain::{
    NewAuditEntry, NewRole, NewRoleAssignment, Organization, PermissionAuditEntry, Role,
    RoleAssignment, Scope, Team,
};

/// Maximum rows an audit query may return.
pub const AUDIT_LIMIT_MAX: i64 = 1000;
/// Default rows for an audit query.
pub const AUDIT_LIMIT_DEFAULT: i64 = 100;

/// Filters for the audit trail query surface.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub actor_id: Option<Uuid>,
    pub target_user_id: Option<Uuid>,
    pub role_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub action: Option<String>,
    pub limit: Option<i64>,
}

/// Repository for authorization persistence.
#[derive(Debug, Clone)]
pub struct PermissionRepository {
    pool: PgPool,
}

impl PermissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // ORGANIZATIONS & TEAMS
    // =========================================================================

    pub async fn find_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Option<Organization>, ApiError> {
        let org = sqlx::query_as::<_, Organization>(
            "SELECT * FROM organizations WHERE organization_id = $1",
        )
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(org)
    }

    pub async fn find_team(&self, team_id: Uuid) -> Result<Option<Team>, ApiError> {
        let team = sqlx::query_as::<_, Team>("SELECT * FROM teams WHERE team_id = $1")
            .bind(team_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(team)
    }

    /// Owner check for the resolver's short-circuit.
    pub async fn is_org_owner(&self, user_id: Uuid, organization_id: Uuid) -> Result<bool, ApiError> {
        let owns: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM organizations
                WHERE organization_id = $1 AND owner_id = $2
            )
            "#,
        )
        .bind(organization_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(owns.0)
    }

    /// Organizations the principal owns.
    pub async fn list_owned_organization_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, ApiError> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT organization_id FROM organizations WHERE owner_id = $1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    /// Distinct organizations where the principal holds any unexpired
    /// assignment. Feeds the access-token membership claims.
    pub async fn list_member_organization_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, ApiError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT organization_id FROM role_assignments
            WHERE user_id = $1
              AND organization_id IS NOT NULL
              AND (expires_at IS NULL OR expires_at > NOW())
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    // =========================================================================
    // ROLE ASSIGNMENTS
    // =========================================================================

    /// Unexpired assignments for a principal at an exact scope.
    pub async fn list_active_assignments(
        &self,
        user_id: Uuid,
        scope: Scope,
    ) -> Result<Vec<RoleAssignment>, ApiError> {
        let assignments = sqlx::query_as::<_, RoleAssignment>(
            r#"
            SELECT * FROM role_assignments
            WHERE user_id = $1
              AND organization_id IS NOT DISTINCT FROM $2
              AND team_id IS NOT DISTINCT FROM $3
              AND (expires_at IS NULL OR expires_at > NOW())
            "#,
        )
        .bind(user_id)
        .bind(scope.organization_id)
        .bind(scope.team_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(assignments)
    }

    /// Looks up the assignment row for (user, role, exact scope).
    pub async fn find_assignment(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        scope: Scope,
    ) -> Result<Option<RoleAssignment>, ApiError> {
        let assignment = sqlx::query_as::<_, RoleAssignment>(
            r#"
            SELECT * FROM role_assignments
            WHERE user_id = $1
              AND role_id = $2
              AND organization_id IS NOT DISTINCT FROM $3
              AND team_id IS NOT DISTINCT FROM $4
            "#,
        )
        .bind(user_id)
        .bind(role_id)
        .bind(scope.organization_id)
        .bind(scope.team_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(assignment)
    }

    /// Creates an assignment and its audit record atomically.
    ///
    /// Two concurrent grants of the same (user, role, scope) race on the
    /// unique index; the loser maps to the duplicate-assignment error.
    pub async fn create_assignment_with_audit(
        &self,
        new_assignment: NewRoleAssignment,
        audit: NewAuditEntry,
    ) -> Result<RoleAssignment, ApiError> {
        let mut tx = self.pool.begin().await?;

        let assignment = sqlx::query_as::<_, RoleAssignment>(
            r#"
            INSERT INTO role_assignments
                (user_id, role_id, organization_id, team_id, granted_by, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(new_assignment.user_id)
        .bind(new_assignment.role_id)
        .bind(new_assignment.scope.organization_id)
        .bind(new_assignment.scope.team_id)
        .bind(new_assignment.granted_by)
        .bind(new_assignment.expires_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.constraint() == Some("uq_role_assignment_scope") {
                    return ApiError::BadRequest {
                        message: "Role already assigned to this user at this scope".to_string(),
                    };
                }
            }
            ApiError::DatabaseError(e)
        })?;

        Self::insert_audit(&mut tx, &audit).await?;
        tx.commit().await?;

        Ok(assignment)
    }

    /// Deletes an assignment and writes its audit record atomically.
    ///
    /// Zero affected rows (a concurrent revoke won) rolls back and
    /// reports not-found; revocation is never silently idempotent.
    pub async fn delete_assignment_with_audit(
        &self,
        assignment_id: Uuid,
        audit: NewAuditEntry,
    ) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM role_assignments WHERE assignment_id = $1")
            .bind(assignment_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::BadRequest {
                message: "Role assignment not found".to_string(),
            });
        }

        Self::insert_audit(&mut tx, &audit).await?;
        tx.commit().await?;

        Ok(())
    }

    // =========================================================================
    // ROLES
    // =========================================================================

    pub async fn find_role(&self, role_id: Uuid) -> Result<Option<Role>, ApiError> {
        let role = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE role_id = $1")
            .bind(role_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(role)
    }

    /// Loads every role referenced by a set of ids.
    pub async fn find_roles_by_ids(&self, role_ids: &[Uuid]) -> Result<Vec<Role>, ApiError> {
        let roles = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE role_id = ANY($1)")
            .bind(role_ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(roles)
    }

    /// Lists roles by scope: org-scoped roles for a given organization,
    /// or the global system roles when no filter is given.
    pub async fn list_roles(&self, organization_id: Option<Uuid>) -> Result<Vec<Role>, ApiError> {
        let roles = sqlx::query_as::<_, Role>(
            r#"
            SELECT * FROM roles
            WHERE organization_id IS NOT DISTINCT FROM $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(roles)
    }

    /// Creates a role and its audit record atomically.
    pub async fn create_role_with_audit(
        &self,
        new_role: NewRole,
        audit: NewAuditEntry,
    ) -> Result<Role, ApiError> {
        let (low, high) = new_role.permissions.to_decimal_parts();
        let mut tx = self.pool.begin().await?;

        let role = sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles
                (name, description, permissions_low, permissions_high, is_system, organization_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&new_role.name)
        .bind(&new_role.description)
        .bind(&low)
        .bind(&high)
        .bind(new_role.is_system)
        .bind(new_role.organization_id)
        .fetch_one(&mut *tx)
        .await?;

        Self::insert_audit(&mut tx, &audit).await?;
        tx.commit().await?;

        Ok(role)
    }

    /// Rewrites a role's name, description and bitmap, with audit.
    ///
    /// The caller has already re-run the delegation checks against the
    /// new bitmap.
    pub async fn update_role_with_audit(
        &self,
        role_id: Uuid,
        name: &str,
        description: Option<&str>,
        permissions: PermissionSet,
        audit: NewAuditEntry,
    ) -> Result<Role, ApiError> {
        let (low, high) = permissions.to_decimal_parts();
        let mut tx = self.pool.begin().await?;

        let role = sqlx::query_as::<_, Role>(
            r#"
            UPDATE roles
            SET name = $2,
                description = $3,
                permissions_low = $4,
                permissions_high = $5,
                updated_at = NOW()
            WHERE role_id = $1
            RETURNING *
            "#,
        )
        .bind(role_id)
        .bind(name)
        .bind(description)
        .bind(&low)
        .bind(&high)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::BadRequest { message: "Role not found".to_string() })?;

        Self::insert_audit(&mut tx, &audit).await?;
        tx.commit().await?;

        Ok(role)
    }

    /// Deletes a role and writes its audit record atomically.
    pub async fn delete_role_with_audit(
        &self,
        role_id: Uuid,
        audit: NewAuditEntry,
    ) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM roles WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::BadRequest { message: "Role not found".to_string() });
        }

        Self::insert_audit(&mut tx, &audit).await?;
        tx.commit().await?;

        Ok(())
    }

    // =========================================================================
    // AUDIT TRAIL
    // =========================================================================

    /// Inserts one audit row inside an open transaction.
    async fn insert_audit(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        entry: &NewAuditEntry,
    ) -> Result<(), ApiError> {
        let conn: &mut PgConnection = &mut *tx;
        sqlx::query(
            r#"
            INSERT INTO permission_audit
                (action, actor_id, target_user_id, role_id, organization_id, team_id, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.action.as_str())
        .bind(entry.actor_id)
        .bind(entry.target_user_id)
        .bind(entry.role_id)
        .bind(entry.scope.organization_id)
        .bind(entry.scope.team_id)
        .bind(&entry.metadata)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Queries the audit trail, newest first.
    ///
    /// Every filter is optional; the limit is clamped to
    /// [`AUDIT_LIMIT_MAX`] and defaults to [`AUDIT_LIMIT_DEFAULT`].
    pub async fn query_audit(
        &self,
        query: AuditQuery,
    ) -> Result<Vec<PermissionAuditEntry>, ApiError> {
        let limit = query
            .limit
            .unwrap_or(AUDIT_LIMIT_DEFAULT)
            .clamp(1, AUDIT_LIMIT_MAX);

        let entries = sqlx::query_as::<_, PermissionAuditEntry>(
            r#"
            SELECT * FROM permission_audit
            WHERE ($1::uuid IS NULL OR actor_id = $1)
              AND ($2::uuid IS NULL OR target_user_id = $2)
              AND ($3::uuid IS NULL OR role_id = $3)
              AND ($4::uuid IS NULL OR organization_id = $4)
              AND ($5::text IS NULL OR action = $5)
            ORDER BY created_at DESC
            LIMIT $6
            "#,
        )
        .bind(query.actor_id)
        .bind(query.target_user_id)
        .bind(query.role_id)
        .bind(query.organization_id)
        .bind(&query.action)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_limit_defaults_and_clamps() {
        let clamp = |limit: Option<i64>| {
            limit
                .unwrap_or(AUDIT_LIMIT_DEFAULT)
                .clamp(1, AUDIT_LIMIT_MAX)
        };

        assert_eq!(clamp(None), 100);
        assert_eq!(clamp(Some(50)), 50);
        assert_eq!(clamp(Some(5000)), 1000);
        assert_eq!(clamp(Some(0)), 1);
    }

    #[test]
    fn test_audit_query_default_is_unfiltered() {
        let query = AuditQuery::default();
        assert!(query.actor_id.is_none());
        assert!(query.action.is_none());
        assert!(query.limit.is_none());
    }
}
