//! # Service Layer
//!
//! Business logic between the HTTP handlers and the repositories.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            API Layer                                    │
//! └───────────────────────────────┬─────────────────────────────────────────┘
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  AuthService              │  PermissionService         │  MailSender    │
//! │  register / login /       │  effective permissions /   │  (seam; log-   │
//! │  refresh / logout /       │  superset rule / roles /   │   backed in    │
//! │  verify / reset flows     │  audit flows               │   development) │
//! └───────────────────────────────┬─────────────────────────────────────────┘
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │        Repositories  │  JwtService  │  PasswordHasher  │  Redis         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! | Operation | Gate | Side effects |
//! |-----------|------|--------------|
//! | `register` | email unique, password policy | user row, token pair, verification mail |
//! | `login` | credential verify, status | last_login, token pair |
//! | `refresh` | live continuation token | rotation (revoke + mint) |
//! | `logout` | best-effort | jti blacklist, token revoke |
//! | `change_password` / `reset_password` | current-password / reset token | new hash, bulk session revoke, notice mail |
//! | `grant/revoke/role writes` | capability bit + Superset Rule | mutation + audit row, one transaction |

pub mod auth_service;
pub mod mailer;
pub mod permission_service;

pub use auth_service::{AuthResponse, AuthService, AuthTokens};
pub use mailer::{LogMailSender, MailSender};
pub use permission_service::{
    CreateRoleInput, EffectivePermissions, GrantRoleInput, PermissionService, RevokeRoleInput,
    UpdateRoleInput,
};
