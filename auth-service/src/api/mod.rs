//! # API Layer
//!
//! HTTP request/response processing: routes, handlers, and DTOs.
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | `routes` | URL patterns → handlers |
//! | `auth_handlers` | `/v1/auth` surface + health check + cookie handling |
//! | `permission_handlers` | `/v1/permissions`, `/v1/roles`, `/v1/users` surfaces |
//! | `dto` | Request validation and response serialization |

pub mod auth_handlers;
pub mod dto;
pub mod permission_handlers;
pub mod routes;
