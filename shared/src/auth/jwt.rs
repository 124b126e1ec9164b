//! # Signed Access-Token Codec
//!
//! Encodes and decodes the short-lived bearer tokens (JWS compact, HS256)
//! that carry principal identity and permission claims.
//!
//! ## Token Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ┌─────────────────┐                      ┌─────────────────────────┐   │
//! │  │  Access Token   │                      │   Continuation Token    │   │
//! │  │  (JWT, 15 min)  │                      │   (opaque, 7 days)      │   │
//! │  └────────┬────────┘                      └───────────┬─────────────┘   │
//! │           │ Authorization: Bearer                     │ refreshToken    │
//! │           │ header                                    │ HttpOnly cookie │
//! │           ▼                                           ▼                 │
//! │  ┌─────────────────┐                      ┌─────────────────────────┐   │
//! │  │ Stateless, plus │                      │ Stateful, revocable     │   │
//! │  │ jti blacklist   │                      │ via fingerprint lookup  │   │
//! │  └─────────────────┘                      └─────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Claims
//!
//! | Claim | Description |
//! |-------|-------------|
//! | `sub` | Principal id (UUID) |
//! | `email` | Principal email |
//! | `email_verified` | Verification flag at mint time |
//! | `iat` / `exp` | Issue / expiry, Unix seconds (default lifetime 15 min) |
//! | `jti` | Fresh UUID per mint - the sole revocation key |
//! | `display_name` | Optional display name |
//! | `avatar_url` | Optional avatar URL |
//! | `permissions` | Organization memberships with per-org bitmap strings |
//!
//! The per-org bitmap halves travel as decimal strings - they exceed 53
//! bits and would not survive a JSON consumer that parses numbers as
//! IEEE-754 doubles.
//!
//! ## Decode Outcomes
//!
//! Four outcomes exist: valid, expired, tampered/invalid, revoked. This
//! codec distinguishes the first three; the revoked state is a blacklist
//! lookup on `jti` that the auth service performs after signature
//! acceptance, before claims reach any handler. Validation uses zero
//! leeway so a token is rejected the second its `exp` passes.

use crate::config::JwtConfig;
use crate::errors::ApiError;
use crate::permissions::PermissionSet;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Claims
// =============================================================================

/// Access-token payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Principal id
    pub sub: Uuid,
    /// Principal email at mint time
    pub email: String,
    /// Email verification flag at mint time
    pub email_verified: bool,
    /// Issued-at, Unix seconds
    pub iat: i64,
    /// Expiry, Unix seconds
    pub exp: i64,
    /// Unique per-token id; the blacklist is keyed on this
    pub jti: Uuid,
    /// Display name, if the principal set one
    pub display_name: Option<String>,
    /// Avatar URL, omitted when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Organization memberships and their permission bitmaps
    pub permissions: PermissionsClaim,
}

/// The `permissions` claim block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionsClaim {
    /// One entry per organization the principal belongs to
    pub organizations: Vec<OrgMembershipClaim>,
    /// Reserved for resource-level grants; always empty today
    pub resources: Vec<serde_json::Value>,
}

/// A single organization membership inside the token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgMembershipClaim {
    /// Organization id
    pub id: Uuid,
    /// `owner` or `member`
    pub role: OrgRole,
    /// `[low, high]` bitmap halves as decimal strings
    pub permissions: [String; 2],
}

impl OrgMembershipClaim {
    /// Builds a membership entry from a resolved permission set.
    pub fn new(id: Uuid, role: OrgRole, set: PermissionSet) -> Self {
        let (low, high) = set.to_decimal_parts();
        Self { id, role, permissions: [low, high] }
    }
}

/// Relationship between a principal and an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrgRole {
    /// Organization owner - implicitly holds the full permission superset
    Owner,
    /// Regular member with assigned roles
    Member,
}

// =============================================================================
// Identity input
// =============================================================================

/// The principal fields embedded in a freshly minted token.
///
/// A value type rather than the full user entity so the codec never sees
/// password hashes or lifecycle state.
#[derive(Debug, Clone)]
pub struct TokenIdentity {
    pub user_id: Uuid,
    pub email: String,
    pub email_verified: bool,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

// =============================================================================
// JWT Service
// =============================================================================

/// Service for access-token minting and validation.
///
/// Created once at startup and shared via `Arc`; keys are immutable after
/// construction.
#[derive(Clone)]
pub struct JwtService {
    /// Key for signing tokens (kept secret)
    encoding_key: EncodingKey,
    /// Key for verifying signatures
    decoding_key: DecodingKey,
    /// Token lifetimes
    config: JwtConfig,
}

impl JwtService {
    /// Creates a new JWT service from the deployment-wide secret.
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self { encoding_key, decoding_key, config }
    }

    /// Mints a signed access token for a principal.
    ///
    /// Every mint draws a fresh `jti`; the blacklist gate revokes by that
    /// id alone. Returns the compact token together with its claims so
    /// callers can read `exp`/`jti` without re-decoding.
    pub fn mint(
        &self,
        identity: &TokenIdentity,
        permissions: PermissionsClaim,
    ) -> Result<(String, Claims), ApiError> {
        let now = Utc::now();
        let ttl = Duration::seconds(self.config.access_token_ttl_seconds as i64);

        let claims = Claims {
            sub: identity.user_id,
            email: identity.email.clone(),
            email_verified: identity.email_verified,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4(),
            display_name: identity.display_name.clone(),
            avatar_url: identity.avatar_url.clone(),
            permissions,
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            ApiError::InternalError { message: format!("Failed to sign access token: {}", e) }
        })?;

        Ok((token, claims))
    }

    /// Verifies signature and expiry, returning the claims.
    ///
    /// ## Errors
    ///
    /// - [`ApiError::TokenExpired`] - `exp` has passed (zero leeway)
    /// - [`ApiError::InvalidToken`] - malformed, wrong key, or tampered
    ///
    /// Callers holding a blacklist gate must consult it with `claims.jti`
    /// before trusting the result; see the auth service's `authenticate`.
    pub fn decode(&self, token: &str) -> Result<Claims, ApiError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => ApiError::TokenExpired,
                _ => ApiError::InvalidToken,
            }
        })?;

        Ok(data.claims)
    }

    /// Extracts the bearer token from an `Authorization` header value.
    pub fn extract_from_header(auth_header: &str) -> Result<&str, ApiError> {
        auth_header.strip_prefix("Bearer ").ok_or(ApiError::InvalidToken)
    }
}

// Implement Debug manually to avoid exposing keys
impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::FULL_SUPERSET;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test_secret_key_minimum_32_chars_required".to_string(),
            access_token_ttl_seconds: 900,
            refresh_token_ttl_seconds: 604800,
        }
    }

    fn test_identity() -> TokenIdentity {
        TokenIdentity {
            user_id: Uuid::new_v4(),
            email: "user@example.com".to_string(),
            email_verified: true,
            display_name: Some("jane".to_string()),
            avatar_url: None,
        }
    }

    #[test]
    fn test_mint_and_decode_round_trip() {
        let service = JwtService::new(test_config());
        let identity = test_identity();

        let (token, minted) = service.mint(&identity, PermissionsClaim::default()).unwrap();
        let claims = service.decode(&token).unwrap();

        assert_eq!(claims.sub, identity.user_id);
        assert_eq!(claims.email, "user@example.com");
        assert!(claims.email_verified);
        assert_eq!(claims.display_name.as_deref(), Some("jane"));
        assert_eq!(claims.jti, minted.jti);
        assert_eq!(claims.exp, claims.iat + 900);
    }

    #[test]
    fn test_each_mint_has_fresh_jti() {
        let service = JwtService::new(test_config());
        let identity = test_identity();

        let (_, a) = service.mint(&identity, PermissionsClaim::default()).unwrap();
        let (_, b) = service.mint(&identity, PermissionsClaim::default()).unwrap();

        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn test_expired_token_is_typed() {
        let service = JwtService::new(test_config());
        let identity = test_identity();

        // Hand-roll a token whose exp already passed
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: identity.user_id,
            email: identity.email.clone(),
            email_verified: false,
            iat: now - 120,
            exp: now - 1,
            jti: Uuid::new_v4(),
            display_name: None,
            avatar_url: None,
            permissions: PermissionsClaim::default(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(test_config().secret.as_bytes()),
        )
        .unwrap();

        assert!(matches!(service.decode(&token), Err(ApiError::TokenExpired)));
    }

    #[test]
    fn test_tampered_token_is_invalid() {
        let service = JwtService::new(test_config());
        let (token, _) = service
            .mint(&test_identity(), PermissionsClaim::default())
            .unwrap();

        // Flip a character inside the payload segment
        let mut tampered = token.into_bytes();
        let mid = tampered.len() / 2;
        tampered[mid] = if tampered[mid] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(tampered).unwrap();

        assert!(matches!(service.decode(&tampered), Err(ApiError::InvalidToken)));
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let service = JwtService::new(test_config());
        let (token, _) = service
            .mint(&test_identity(), PermissionsClaim::default())
            .unwrap();

        let other = JwtService::new(JwtConfig {
            secret: "a_completely_different_32_char_secret!!".to_string(),
            ..test_config()
        });

        assert!(matches!(other.decode(&token), Err(ApiError::InvalidToken)));
    }

    #[test]
    fn test_membership_claim_wire_shape() {
        let org_id = Uuid::new_v4();
        let entry = OrgMembershipClaim::new(org_id, OrgRole::Owner, FULL_SUPERSET);
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["role"], "owner");
        // Bitmap halves are strings, never JSON numbers
        assert!(json["permissions"][0].is_string());
        assert!(json["permissions"][1].is_string());

        let (low, high) = FULL_SUPERSET.to_decimal_parts();
        assert_eq!(json["permissions"][0], low);
        assert_eq!(json["permissions"][1], high);
    }

    #[test]
    fn test_extract_from_header() {
        assert_eq!(
            JwtService::extract_from_header("Bearer abc.def.ghi").unwrap(),
            "abc.def.ghi"
        );
        assert!(JwtService::extract_from_header("Basic dXNlcg==").is_err());
    }
}
