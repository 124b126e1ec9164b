//! # Keystone Auth Service
//!
//! The deployable service for authentication and authorization: account
//! lifecycle, token issuance/rotation/revocation, and bitmap-based
//! permission management with constrained delegation.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        HTTP Layer (api/)                        │
//! │        routes  │  auth_handlers / permission_handlers  │  DTOs  │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Service Layer (service/)                     │
//! │   AuthService (register/login/refresh/logout/verify/reset)      │
//! │   PermissionService (resolver, Superset Rule, roles, audit)     │
//! │   MailSender seam (log-backed in development)                   │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Repository Layer (repository/)                 │
//! │        UserRepository  │  PermissionRepository (sqlx)           │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               ▼
//!            PostgreSQL (durable)        Redis (jti blacklist)
//! ```
//!
//! ## Endpoints
//!
//! | Method | Endpoint | Auth |
//! |--------|----------|------|
//! | POST | `/v1/auth/register` | No |
//! | POST | `/v1/auth/login` | No |
//! | POST | `/v1/auth/refresh` | Cookie |
//! | POST | `/v1/auth/logout` | Best-effort |
//! | GET  | `/v1/auth/me` | Bearer |
//! | POST | `/v1/auth/change-password` | Bearer |
//! | POST | `/v1/auth/verify-email` | No |
//! | POST | `/v1/auth/resend-verification` | No |
//! | POST | `/v1/auth/forgot-password` | No |
//! | POST | `/v1/auth/reset-password` | No |
//! | POST | `/v1/permissions/grant` | Bearer |
//! | POST | `/v1/permissions/revoke` | Bearer |
//! | GET  | `/v1/permissions/audit` | Bearer |
//! | POST/GET | `/v1/roles`, `/v1/roles/{id}` | Bearer |
//! | GET  | `/v1/users`, `/v1/users/{id}/permissions` | Bearer |
//! | GET  | `/health` | No |
//!
//! ## Configuration
//!
//! Loaded via [`shared::config::AppConfig`]. Key variables: `JWT_SECRET`,
//! `DATABASE_URL`, `REDIS_URL`, `APP_MAIL__BASE_URL`,
//! `APP_ENVIRONMENT=development|staging|production` (development diverts
//! mail to the logs).

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use shared::{
    auth::{jwt::JwtService, password::PasswordHasher},
    config::AppConfig,
    database,
    redis_client::RedisClient,
    tracing_config,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

mod api;
mod domain;
mod repository;
mod service;

use api::routes;
use repository::{PermissionRepository, UserRepository};
use service::{AuthService, LogMailSender, PermissionService};

/// Shared application state injected into all request handlers.
pub struct AppState {
    /// Auth flow orchestrator (also the access-token authentication gate)
    pub auth_service: AuthService,
    /// Permission flow orchestrator
    pub permission_service: PermissionService,
    /// Pool handle for the health endpoint
    pub db_pool: PgPool,
    /// Redis handle for the health endpoint
    pub redis_client: RedisClient,
    /// Service name reported by the health endpoint
    pub service_name: String,
}

/// Application entry point.
///
/// ## Initialization Sequence
///
/// 1. Load configuration from environment variables
/// 2. Initialize structured logging/tracing
/// 3. Create the PostgreSQL connection pool
/// 4. Connect the Redis blacklist store
/// 5. Wire services (fail-fast on any missing dependency)
/// 6. Start the HTTP server
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = AppConfig::from_env().expect("Failed to load configuration");

    tracing_config::init_tracing(&config.service_name, config.is_production());

    info!(
        service = %config.service_name,
        host = %config.server.host,
        port = %config.server.port,
        "Starting auth service"
    );

    let db_pool = database::create_pool(&config.database)
        .await
        .expect("Failed to create database pool");

    let redis_client = RedisClient::new(&config.redis)
        .await
        .expect("Failed to connect to Redis");

    // Services, dependency-injection style. The mail transport is a
    // collaborator; the log-backed sender covers development and doubles
    // as the fallback until a transport is wired.
    let jwt_service = Arc::new(JwtService::new(config.jwt.clone()));
    let password_hasher = Arc::new(PasswordHasher::new());
    let mail_sender = Arc::new(LogMailSender::new(config.mail.clone()));

    let user_repository = UserRepository::new(db_pool.clone());
    let permission_repository = PermissionRepository::new(db_pool.clone());

    let permission_service =
        PermissionService::new(permission_repository.clone(), user_repository.clone());

    let auth_service = AuthService::new(
        user_repository,
        permission_repository,
        permission_service.clone(),
        jwt_service,
        password_hasher,
        redis_client.clone(),
        mail_sender,
        config.jwt.clone(),
    );

    let app_state = web::Data::new(AppState {
        auth_service,
        permission_service,
        db_pool,
        redis_client,
        service_name: config.service_name.clone(),
    });

    let server_host = config.server.host.clone();
    let server_port = config.server.port;
    let workers = config.server.workers;

    info!("Server listening on {}:{}", server_host, server_port);

    let mut server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin() // TODO: restrict to configured origins before production exposure
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            // Middleware stack (first added = last executed)
            .wrap(cors)
            .wrap(middleware::Compress::default())
            .wrap(tracing_actix_web::TracingLogger::default())
            .app_data(app_state.clone())
            .configure(routes::configure)
    })
    .bind((server_host, server_port))?;

    if workers > 0 {
        server = server.workers(workers);
    }

    server.run().await
}
