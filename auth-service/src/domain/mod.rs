//! # Domain Layer
//!
//! Core business entities for the authentication and authorization
//! service. Framework-agnostic: no HTTP types, no SQL strings.
//!
//! | Group | Types |
//! |-------|-------|
//! | Principals | [`User`], [`UserProfile`], [`NewUser`] |
//! | Session continuation | [`RefreshToken`], [`NewRefreshToken`] |
//! | Lifecycle tokens | [`EmailVerificationToken`], [`PasswordResetToken`] |
//! | Tenancy | [`Organization`], [`Team`], [`Scope`] |
//! | Authorization | [`Role`], [`RoleAssignment`], [`NewRole`], [`NewRoleAssignment`] |
//! | Audit | [`PermissionAuditEntry`], [`NewAuditEntry`], [`AuditAction`] |

pub mod entities;

pub use entities::*;
