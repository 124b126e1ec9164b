//! # Permission Request Handlers
//!
//! HTTP handlers for the `/v1/permissions`, `/v1/roles` and `/v1/users`
//! surfaces.
//!
//! Every handler authenticates the bearer first (signature, expiry,
//! blacklist), then hands the actor id to the permission service, which
//! runs the coarse capability gate and the Superset Rule. Failure
//! semantics:
//!
//! | Condition | Status |
//! |-----------|--------|
//! | Bad/expired/revoked bearer | 401 |
//! | Capability bit absent | 403 (generic) |
//! | Superset violation | 403 ("cannot ... permissions you do not possess") |
//! | Unknown role/target, duplicate assignment | 400 |
//! | Storage fault | 500 |

use actix_web::{web, HttpRequest, HttpResponse};
use shared::{errors::ApiError, validation};
use uuid::Uuid;

use crate::domain::Scope;
use crate::repository::AuditQuery;
use crate::service::{CreateRoleInput, GrantRoleInput, RevokeRoleInput, UpdateRoleInput};
use crate::AppState;

use super::auth_handlers::extract_bearer_token;
use super::dto::{
    AuditTrailQuery, AuditTrailResponse, CreateRoleRequest, GrantResponse, GrantRoleRequest,
    ListRolesQuery, MessageResponse, RoleDto, RoleResponse, RolesListResponse, RevokeRoleRequest,
    UpdateRoleRequest, UserPermissionsQuery, UserPermissionsResponse, UsersListResponse,
};

/// Authenticates the request and returns the actor id.
async fn authenticate(req: &HttpRequest, state: &AppState) -> Result<Uuid, ApiError> {
    let access_token = extract_bearer_token(req)?;
    let claims = state.auth_service.authenticate(&access_token).await?;
    Ok(claims.sub)
}

// =============================================================================
// GRANT / REVOKE
// =============================================================================

/// `POST /v1/permissions/grant`
pub async fn grant_role(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<GrantRoleRequest>,
) -> Result<HttpResponse, ApiError> {
    let actor_id = authenticate(&req, &state).await?;

    let body = body.into_inner();
    validation::validate_request(&body)?;

    let scope = Scope::new(body.organization_id, body.team_id)?;
    let assignment = state
        .permission_service
        .grant_role(
            actor_id,
            GrantRoleInput {
                user_id: body.user_id,
                role_id: body.role_id,
                scope,
                expires_at: body.expires_at,
            },
        )
        .await?;

    Ok(HttpResponse::Ok().json(GrantResponse {
        message: "Role granted".to_string(),
        assignment: assignment.into(),
    }))
}

/// `POST /v1/permissions/revoke`
pub async fn revoke_role(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<RevokeRoleRequest>,
) -> Result<HttpResponse, ApiError> {
    let actor_id = authenticate(&req, &state).await?;

    let body = body.into_inner();
    validation::validate_request(&body)?;

    let scope = Scope::new(body.organization_id, body.team_id)?;
    state
        .permission_service
        .revoke_role(
            actor_id,
            RevokeRoleInput { user_id: body.user_id, role_id: body.role_id, scope },
        )
        .await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Role revoked")))
}

// =============================================================================
// ROLE REGISTRY
// =============================================================================

/// `POST /v1/roles`
pub async fn create_role(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<CreateRoleRequest>,
) -> Result<HttpResponse, ApiError> {
    let actor_id = authenticate(&req, &state).await?;

    let body = body.into_inner();
    validation::validate_request(&body)?;

    let role = state
        .permission_service
        .create_role(
            actor_id,
            CreateRoleInput {
                name: body.name,
                description: body.description,
                permission_names: body.permission_names,
                organization_id: body.organization_id,
            },
        )
        .await?;

    Ok(HttpResponse::Created().json(RoleResponse {
        message: "Role created".to_string(),
        role: RoleDto::from_role(role)?,
    }))
}

/// `PUT /v1/roles/{roleId}` - controlled update, re-runs delegation.
pub async fn update_role(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateRoleRequest>,
) -> Result<HttpResponse, ApiError> {
    let actor_id = authenticate(&req, &state).await?;
    let role_id = path.into_inner();

    let body = body.into_inner();
    validation::validate_request(&body)?;

    let role = state
        .permission_service
        .update_role(
            actor_id,
            role_id,
            UpdateRoleInput {
                name: body.name,
                description: body.description,
                permission_names: body.permission_names,
            },
        )
        .await?;

    Ok(HttpResponse::Ok().json(RoleResponse {
        message: "Role updated".to_string(),
        role: RoleDto::from_role(role)?,
    }))
}

/// `DELETE /v1/roles/{roleId}` - custom roles only.
pub async fn delete_role(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let actor_id = authenticate(&req, &state).await?;

    state
        .permission_service
        .delete_role(actor_id, path.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Role deleted")))
}

/// `GET /v1/roles?organizationId=...`
///
/// Org filter present: that organization's custom roles. Absent: the
/// global system roles.
pub async fn list_roles(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<ListRolesQuery>,
) -> Result<HttpResponse, ApiError> {
    authenticate(&req, &state).await?;

    let roles = state
        .permission_service
        .list_roles(query.organization_id)
        .await?;

    let roles = roles
        .into_iter()
        .map(RoleDto::from_role)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(HttpResponse::Ok().json(RolesListResponse { roles }))
}

/// `GET /v1/roles/{roleId}`
pub async fn get_role(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    authenticate(&req, &state).await?;

    let role = state.permission_service.get_role(path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(RoleResponse {
        message: "Role found".to_string(),
        role: RoleDto::from_role(role)?,
    }))
}

// =============================================================================
// READ SURFACES
// =============================================================================

/// `GET /v1/users/{userId}/permissions?organizationId=...&teamId=...`
///
/// Self-lookup is always allowed; reading another principal requires
/// `perm.grant` at the queried scope. Bitmap halves are decimal strings.
pub async fn get_user_permissions(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<UserPermissionsQuery>,
) -> Result<HttpResponse, ApiError> {
    let actor_id = authenticate(&req, &state).await?;
    let target_user_id = path.into_inner();

    let scope = Scope::new(query.organization_id, query.team_id)?;
    let effective = state
        .permission_service
        .get_user_permissions(actor_id, target_user_id, scope)
        .await?;

    Ok(HttpResponse::Ok().json(UserPermissionsResponse::new(
        target_user_id,
        query.organization_id,
        query.team_id,
        effective,
    )))
}

/// `GET /v1/permissions/audit?...filters...&limit=`
pub async fn get_audit_trail(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<AuditTrailQuery>,
) -> Result<HttpResponse, ApiError> {
    let actor_id = authenticate(&req, &state).await?;
    let query = query.into_inner();

    let entries = state
        .permission_service
        .get_audit_trail(
            actor_id,
            AuditQuery {
                actor_id: query.actor_id,
                target_user_id: query.target_user_id,
                role_id: query.role_id,
                organization_id: query.organization_id,
                action: query.action,
                limit: query.limit,
            },
        )
        .await?;

    Ok(HttpResponse::Ok().json(AuditTrailResponse { entries }))
}

/// `GET /v1/users` - the 100 most recent principals.
pub async fn list_users(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let actor_id = authenticate(&req, &state).await?;

    let users = state.permission_service.list_users(actor_id).await?;

    Ok(HttpResponse::Ok().json(UsersListResponse { users }))
}
