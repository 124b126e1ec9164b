//! # Authentication Primitives
//!
//! The credential toolbox shared across the platform:
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | `jwt` | Signed access-token codec (HS256) |
//! | `password` | PBKDF2 password hashing + strength policy |
//! | `token` | Secure random tokens, UUID identities, fingerprints |
//!
//! The continuation-token lifecycle (issue / rotate / revoke) lives in the
//! auth service's repository and orchestrator; this crate only supplies
//! the cryptographic building blocks.

pub mod jwt;
pub mod password;
pub mod token;

pub use jwt::{Claims, JwtService, OrgMembershipClaim, OrgRole, PermissionsClaim, TokenIdentity};
pub use password::{PasswordHasher, PasswordPolicy};
