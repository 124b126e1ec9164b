//! # Permission Model
//!
//! The 128-bit permission algebra shared by the token codec and the
//! permission service.
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | `bitmap` | `PermissionSet`: has/grant/revoke/subset, split/merge, decimal wire form |
//! | `catalog` | Static name ↔ bit table, `FULL_SUPERSET`, capability gate constants |
//!
//! Organization owners hold [`catalog::FULL_SUPERSET`] implicitly - no
//! assignment rows are written for them.

pub mod bitmap;
pub mod catalog;

pub use bitmap::PermissionSet;
pub use catalog::{PermissionDef, PermissionDomain, CATALOG, FULL_SUPERSET};
