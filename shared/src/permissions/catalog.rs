//! # Permission Catalog
//!
//! The static table of every named permission and its bit position. Bit
//! assignments are part of the wire and storage format: once a bitmap has
//! been persisted, positions must never be renumbered.
//!
//! ## Domain Layout
//!
//! | Domain | Bits | Examples |
//! |---|---|---|
//! | Organization | 0-12 | `org.read`, `org.members.invite` |
//! | Team | 20-26 | `team.read`, `team.members.add` |
//! | Repository | 30-36 | `repo.read`, `repo.push` |
//! | Data | 40-44 | `data.read`, `data.write` |
//! | Collaboration | 50-59 | `issue.create`, `pr.merge` |
//! | Admin | 60-68 | `admin.users.suspend` |
//! | Permission management | 70-75 | `perm.grant`, `perm.role.create` |
//!
//! The gaps between domains are deliberate headroom for future
//! permissions without renumbering.
//!
//! ## Name Resolution
//!
//! - [`from_names`] ignores unknown names silently (forward
//!   compatibility: a newer peer may send names this build doesn't know).
//! - [`to_names`] is deterministic in catalog declaration order.

use super::bitmap::PermissionSet;
use serde::Serialize;

// =============================================================================
// Definitions
// =============================================================================

/// Functional grouping of permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionDomain {
    Organization,
    Team,
    Repository,
    Data,
    Collaboration,
    Admin,
    PermissionManagement,
}

/// One catalog entry: a named permission pinned to a bit position.
#[derive(Debug, Clone, Copy)]
pub struct PermissionDef {
    /// Stable dotted name, e.g. `data.read`
    pub name: &'static str,
    /// Bit position in 0..=127 (part of the storage format)
    pub bit: u32,
    /// Human description for role builders and audit metadata
    pub description: &'static str,
    /// Functional domain
    pub domain: PermissionDomain,
}

const fn def(
    name: &'static str,
    bit: u32,
    description: &'static str,
    domain: PermissionDomain,
) -> PermissionDef {
    PermissionDef { name, bit, description, domain }
}

/// The full catalog, in declaration (= bit) order.
pub const CATALOG: &[PermissionDef] = &[
    // ── Organization (0-12) ────────────────────────────────────────────
    def("org.read", 0, "View organization profile", PermissionDomain::Organization),
    def("org.update", 1, "Edit organization profile", PermissionDomain::Organization),
    def("org.delete", 2, "Delete the organization", PermissionDomain::Organization),
    def("org.settings.read", 3, "View organization settings", PermissionDomain::Organization),
    def("org.settings.update", 4, "Change organization settings", PermissionDomain::Organization),
    def("org.members.read", 5, "List organization members", PermissionDomain::Organization),
    def("org.members.invite", 6, "Invite members to the organization", PermissionDomain::Organization),
    def("org.members.remove", 7, "Remove organization members", PermissionDomain::Organization),
    def("org.billing.read", 8, "View billing information", PermissionDomain::Organization),
    def("org.billing.update", 9, "Change billing information", PermissionDomain::Organization),
    def("org.teams.create", 10, "Create teams in the organization", PermissionDomain::Organization),
    def("org.audit.read", 11, "View the organization audit trail", PermissionDomain::Organization),
    def("org.transfer", 12, "Transfer organization ownership", PermissionDomain::Organization),
    // ── Team (20-26) ───────────────────────────────────────────────────
    def("team.read", 20, "View team profile", PermissionDomain::Team),
    def("team.update", 21, "Edit team profile", PermissionDomain::Team),
    def("team.delete", 22, "Delete the team", PermissionDomain::Team),
    def("team.members.read", 23, "List team members", PermissionDomain::Team),
    def("team.members.add", 24, "Add team members", PermissionDomain::Team),
    def("team.members.remove", 25, "Remove team members", PermissionDomain::Team),
    def("team.settings.update", 26, "Change team settings", PermissionDomain::Team),
    // ── Repository (30-36) ─────────────────────────────────────────────
    def("repo.read", 30, "Read repository contents", PermissionDomain::Repository),
    def("repo.create", 31, "Create repositories", PermissionDomain::Repository),
    def("repo.update", 32, "Edit repository settings", PermissionDomain::Repository),
    def("repo.delete", 33, "Delete repositories", PermissionDomain::Repository),
    def("repo.push", 34, "Push to repositories", PermissionDomain::Repository),
    def("repo.pull", 35, "Pull from repositories", PermissionDomain::Repository),
    def("repo.admin", 36, "Administer repositories", PermissionDomain::Repository),
    // ── Data (40-44) ───────────────────────────────────────────────────
    def("data.read", 40, "Read stored data", PermissionDomain::Data),
    def("data.write", 41, "Write stored data", PermissionDomain::Data),
    def("data.delete", 42, "Delete stored data", PermissionDomain::Data),
    def("data.export", 43, "Export data", PermissionDomain::Data),
    def("data.import", 44, "Import data", PermissionDomain::Data),
    // ── Collaboration (50-59) ──────────────────────────────────────────
    def("issue.read", 50, "View issues", PermissionDomain::Collaboration),
    def("issue.create", 51, "Open issues", PermissionDomain::Collaboration),
    def("issue.update", 52, "Edit issues", PermissionDomain::Collaboration),
    def("issue.close", 53, "Close issues", PermissionDomain::Collaboration),
    def("pr.read", 54, "View pull requests", PermissionDomain::Collaboration),
    def("pr.create", 55, "Open pull requests", PermissionDomain::Collaboration),
    def("pr.review", 56, "Review pull requests", PermissionDomain::Collaboration),
    def("pr.merge", 57, "Merge pull requests", PermissionDomain::Collaboration),
    def("comment.create", 58, "Write comments", PermissionDomain::Collaboration),
    def("comment.moderate", 59, "Moderate comments", PermissionDomain::Collaboration),
    // ── Admin (60-68) ──────────────────────────────────────────────────
    def("admin.users.read", 60, "List and inspect user accounts", PermissionDomain::Admin),
    def("admin.users.update", 61, "Edit user accounts", PermissionDomain::Admin),
    def("admin.users.suspend", 62, "Suspend user accounts", PermissionDomain::Admin),
    def("admin.settings.update", 63, "Change system settings", PermissionDomain::Admin),
    def("admin.logs.read", 64, "Read system logs", PermissionDomain::Admin),
    def("admin.metrics.read", 65, "Read system metrics", PermissionDomain::Admin),
    def("admin.keys.manage", 66, "Manage API keys", PermissionDomain::Admin),
    def("admin.webhooks.manage", 67, "Manage webhooks", PermissionDomain::Admin),
    def("admin.impersonate", 68, "Impersonate user accounts", PermissionDomain::Admin),
    // ── Permission management (70-75) ──────────────────────────────────
    def("perm.grant", 70, "Grant roles to principals", PermissionDomain::PermissionManagement),
    def("perm.revoke", 71, "Revoke roles from principals", PermissionDomain::PermissionManagement),
    def("perm.role.create", 72, "Create custom roles", PermissionDomain::PermissionManagement),
    def("perm.role.update", 73, "Update custom roles", PermissionDomain::PermissionManagement),
    def("perm.role.delete", 74, "Delete custom roles", PermissionDomain::PermissionManagement),
    def("perm.audit.read", 75, "Read the permission audit trail", PermissionDomain::PermissionManagement),
];

/// Every catalog bit set - the value implicitly held by organization
/// owners.
pub const FULL_SUPERSET: PermissionSet = full_superset();

const fn full_superset() -> PermissionSet {
    let mut bits = 0u128;
    let mut i = 0;
    while i < CATALOG.len() {
        bits |= 1u128 << CATALOG[i].bit;
        i += 1;
    }
    PermissionSet::from_bits(bits)
}

// =============================================================================
// Capability gates
// =============================================================================
// Permissions the orchestrators check by name before touching assignments.

/// Coarse gate for granting roles.
pub const PERM_GRANT: PermissionSet = PermissionSet::single(70);
/// Coarse gate for revoking roles.
pub const PERM_REVOKE: PermissionSet = PermissionSet::single(71);
/// Coarse gate for creating custom roles.
pub const PERM_ROLE_CREATE: PermissionSet = PermissionSet::single(72);
/// Coarse gate for updating custom roles.
pub const PERM_ROLE_UPDATE: PermissionSet = PermissionSet::single(73);
/// Coarse gate for deleting custom roles.
pub const PERM_ROLE_DELETE: PermissionSet = PermissionSet::single(74);
/// Coarse gate for reading the audit trail.
pub const PERM_AUDIT_READ: PermissionSet = PermissionSet::single(75);
/// Coarse gate for listing principals.
pub const ADMIN_USERS_READ: PermissionSet = PermissionSet::single(60);

// =============================================================================
// Name Resolution
// =============================================================================

/// Looks up a single permission by name.
pub fn find(name: &str) -> Option<&'static PermissionDef> {
    CATALOG.iter().find(|p| p.name == name)
}

/// Converts a list of permission names to a bitmap.
///
/// Unknown names are ignored silently so that role definitions written by
/// a newer catalog still resolve on older builds.
pub fn from_names<'a, I>(names: I) -> PermissionSet
where
    I: IntoIterator<Item = &'a str>,
{
    let mut set = PermissionSet::EMPTY;
    for name in names {
        if let Some(def) = find(name) {
            set |= PermissionSet::single(def.bit);
        }
    }
    set
}

/// Decodes a bitmap to permission names, in catalog declaration order.
///
/// Bits without a catalog entry decode to nothing; decoding is stable and
/// deterministic.
pub fn to_names(set: PermissionSet) -> Vec<&'static str> {
    CATALOG
        .iter()
        .filter(|def| set.has(PermissionSet::single(def.bit)))
        .map(|def| def.name)
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_bits_are_unique_and_in_range() {
        let mut seen = [false; 128];
        for def in CATALOG {
            assert!(def.bit < 128, "{} out of range", def.name);
            assert!(!seen[def.bit as usize], "duplicate bit {}", def.bit);
            seen[def.bit as usize] = true;
        }
    }

    #[test]
    fn test_catalog_names_are_unique() {
        for (i, a) in CATALOG.iter().enumerate() {
            for b in &CATALOG[i + 1..] {
                assert_ne!(a.name, b.name);
            }
        }
    }

    #[test]
    fn test_catalog_is_declared_in_bit_order() {
        for pair in CATALOG.windows(2) {
            assert!(pair[0].bit < pair[1].bit);
        }
    }

    #[test]
    fn test_from_names_resolves_known() {
        let set = from_names(["data.read", "data.write"]);
        assert!(set.has(from_names(["data.read"])));
        assert!(set.has(from_names(["data.write"])));
        assert!(!set.has(PERM_GRANT));
    }

    #[test]
    fn test_from_names_ignores_unknown() {
        let with_junk = from_names(["data.read", "not.a.permission"]);
        assert_eq!(with_junk, from_names(["data.read"]));
        assert_eq!(from_names(["nope"]), PermissionSet::EMPTY);
    }

    #[test]
    fn test_to_names_stable_order() {
        let set = from_names(["perm.grant", "org.read", "data.write"]);
        // Declaration order, not input order
        assert_eq!(to_names(set), vec!["org.read", "data.write", "perm.grant"]);
    }

    #[test]
    fn test_round_trip_all_names() {
        let names: Vec<&str> = CATALOG.iter().map(|d| d.name).collect();
        let set = from_names(names.iter().copied());
        assert_eq!(set, FULL_SUPERSET);
        assert_eq!(to_names(set), names);
    }

    #[test]
    fn test_full_superset_covers_every_entry() {
        for def in CATALOG {
            assert!(FULL_SUPERSET.has(super::PermissionSet::single(def.bit)));
        }
        assert_eq!(to_names(FULL_SUPERSET).len(), CATALOG.len());
    }

    #[test]
    fn test_gate_constants_match_catalog() {
        assert_eq!(from_names(["perm.grant"]), PERM_GRANT);
        assert_eq!(from_names(["perm.revoke"]), PERM_REVOKE);
        assert_eq!(from_names(["perm.role.create"]), PERM_ROLE_CREATE);
        assert_eq!(from_names(["perm.role.update"]), PERM_ROLE_UPDATE);
        assert_eq!(from_names(["perm.role.delete"]), PERM_ROLE_DELETE);
        assert_eq!(from_names(["perm.audit.read"]), PERM_AUDIT_READ);
        assert_eq!(from_names(["admin.users.read"]), ADMIN_USERS_READ);
    }

    #[test]
    fn test_admin_domain_straddles_the_word_boundary() {
        // Bits 63 and 64 sit on opposite sides of the low/high split
        let settings = from_names(["admin.settings.update"]);
        let logs = from_names(["admin.logs.read"]);
        let (low, high) = settings.split();
        assert_eq!((low, high), (1u64 << 63, 0));
        let (low, high) = logs.split();
        assert_eq!((low, high), (0, 1));
    }
}
