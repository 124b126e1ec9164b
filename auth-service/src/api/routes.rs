//! # Route Configuration
//!
//! ```text
//! /
//! ├── health                              GET    → health_check
//! │
//! ├── v1/auth/
//! │   ├── register                        POST   → register
//! │   ├── login                           POST   → login
//! │   ├── refresh                         POST   → refresh          (cookie)
//! │   ├── logout                          POST   → logout
//! │   ├── me                              GET    → me               (bearer)
//! │   ├── change-password                 POST   → change_password  (bearer)
//! │   ├── verify-email                    POST   → verify_email
//! │   ├── resend-verification             POST   → resend_verification
//! │   ├── forgot-password                 POST   → forgot_password
//! │   └── reset-password                  POST   → reset_password
//! │
//! ├── v1/permissions/
//! │   ├── grant                           POST   → grant_role       (bearer)
//! │   ├── revoke                          POST   → revoke_role      (bearer)
//! │   └── audit                           GET    → get_audit_trail  (bearer)
//! │
//! ├── v1/roles                            POST   → create_role      (bearer)
//! │   │                                   GET    → list_roles       (bearer)
//! │   └── {roleId}                        GET    → get_role         (bearer)
//! │                                       PUT    → update_role      (bearer)
//! │                                       DELETE → delete_role      (bearer)
//! │
//! └── v1/users                            GET    → list_users       (bearer)
//!     └── {userId}/permissions            GET    → get_user_permissions
//! ```
//!
//! Authentication happens inside the handlers (the permission surface
//! needs the actor id anyway); there is no route-level auth middleware.

use actix_web::web;

use super::{auth_handlers, permission_handlers};

/// Configures all routes for the service.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        // ─────────────────────────────────────────────────────────────────
        // Health Check
        // ─────────────────────────────────────────────────────────────────
        .route("/health", web::get().to(auth_handlers::health_check))
        // ─────────────────────────────────────────────────────────────────
        // Auth surface
        // ─────────────────────────────────────────────────────────────────
        .service(
            web::scope("/v1/auth")
                .route("/register", web::post().to(auth_handlers::register))
                .route("/login", web::post().to(auth_handlers::login))
                .route("/refresh", web::post().to(auth_handlers::refresh))
                .route("/logout", web::post().to(auth_handlers::logout))
                .route("/me", web::get().to(auth_handlers::me))
                .route("/change-password", web::post().to(auth_handlers::change_password))
                .route("/verify-email", web::post().to(auth_handlers::verify_email))
                .route(
                    "/resend-verification",
                    web::post().to(auth_handlers::resend_verification),
                )
                .route("/forgot-password", web::post().to(auth_handlers::forgot_password))
                .route("/reset-password", web::post().to(auth_handlers::reset_password)),
        )
        // ─────────────────────────────────────────────────────────────────
        // Permission surface
        // ─────────────────────────────────────────────────────────────────
        .service(
            web::scope("/v1/permissions")
                .route("/grant", web::post().to(permission_handlers::grant_role))
                .route("/revoke", web::post().to(permission_handlers::revoke_role))
                .route("/audit", web::get().to(permission_handlers::get_audit_trail)),
        )
        .service(
            web::resource("/v1/roles")
                .route(web::post().to(permission_handlers::create_role))
                .route(web::get().to(permission_handlers::list_roles)),
        )
        .service(
            web::resource("/v1/roles/{role_id}")
                .route(web::get().to(permission_handlers::get_role))
                .route(web::put().to(permission_handlers::update_role))
                .route(web::delete().to(permission_handlers::delete_role)),
        )
        .service(
            web::scope("/v1/users")
                .route("", web::get().to(permission_handlers::list_users))
                .route(
                    "/{user_id}/permissions",
                    web::get().to(permission_handlers::get_user_permissions),
                ),
        );
}
