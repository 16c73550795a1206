//! JWT claim decoding and permission aggregation for environment diagnostics.
//!
//! # Design
//! - Tokens are never verified, only decoded: this is a read-out of what the
//!   auth service obtained, not an authorization decision.
//! - A malformed token contributes nothing instead of failing the aggregation.
//! - Aggregation is a pure function of the cache; iteration order is the
//!   cache's sorted order, so results are reproducible.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::TokenCache;
use crate::error::{AuthError, AuthResult};

const SHAREPOINT_HOST_VARIANTS: [&str; 2] = ["-admin.sharepoint.com", "-my.sharepoint.com"];
const SHAREPOINT_ROOT_SUFFIX: &str = ".sharepoint.com";

/// Claims read from an access token payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DecodedClaims {
    /// Audience the token was issued for.
    #[serde(default)]
    pub aud: Option<String>,
    /// Space-delimited delegated scopes.
    #[serde(default)]
    pub scp: Option<String>,
    /// Application roles.
    #[serde(default)]
    pub roles: Option<Vec<String>>,
}

/// Scopes per normalized audience plus tenant-wide roles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TokenPermissions {
    /// Ordered, de-duplicated scopes keyed by normalized audience.
    pub scopes: BTreeMap<String, Vec<String>>,
    /// Ordered, de-duplicated roles across every token.
    pub roles: Vec<String>,
}

/// Decode the payload segment of a three-part JWT.
///
/// # Errors
///
/// Returns [`AuthError::MalformedToken`] when the token does not have three
/// segments or its payload is not base64-encoded JSON.
pub fn decode_claims(token: &str) -> AuthResult<DecodedClaims> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(AuthError::MalformedToken {
            reason: "expected three period-delimited segments",
        });
    }

    let payload = segments[1].trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .map_err(|_| AuthError::MalformedToken {
            reason: "payload is not valid base64",
        })?;

    serde_json::from_slice(&bytes).map_err(|_| AuthError::MalformedToken {
        reason: "payload is not a JSON claims object",
    })
}

/// Fold SharePoint admin and my-site audiences into the tenant root host.
///
/// `https://contoso-admin.sharepoint.com` and `https://contoso-my.sharepoint.com`
/// both become `https://contoso.sharepoint.com`; every other audience is
/// returned unchanged.
#[must_use]
pub fn normalize_audience(aud: &str) -> String {
    SHAREPOINT_HOST_VARIANTS
        .iter()
        .find_map(|variant| aud.strip_suffix(variant))
        .map_or_else(
            || aud.to_string(),
            |tenant| format!("{tenant}{SHAREPOINT_ROOT_SUFFIX}"),
        )
}

/// Aggregate delegated scopes and application roles across every cached token.
#[must_use]
pub fn aggregate_permissions(cache: &TokenCache) -> TokenPermissions {
    let mut permissions = TokenPermissions::default();

    for (resource, entry) in cache.iter() {
        let claims = match decode_claims(&entry.access_token) {
            Ok(claims) => claims,
            Err(err) => {
                debug!(resource, error = %err, "skipping token without readable claims");
                continue;
            }
        };

        if let (Some(aud), Some(scp)) = (claims.aud.as_deref(), claims.scp.as_deref()) {
            let mut scopes = scp.split_whitespace().peekable();
            if scopes.peek().is_some() {
                let bucket = permissions
                    .scopes
                    .entry(normalize_audience(aud))
                    .or_default();
                for scope in scopes {
                    push_unique(bucket, scope);
                }
            }
        }

        for role in claims.roles.iter().flatten() {
            let role = role.trim();
            if !role.is_empty() {
                push_unique(&mut permissions.roles, role);
            }
        }
    }

    permissions
}

fn push_unique(values: &mut Vec<String>, candidate: &str) {
    if !values.iter().any(|existing| existing == candidate) {
        values.push(candidate.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::AccessTokenEntry;
    use tenantctl_test_support::fixtures::{fresh_expiry, jwt_for, unsigned_jwt};

    fn entry(token: String) -> AccessTokenEntry {
        AccessTokenEntry {
            access_token: token,
            expires_on: fresh_expiry(),
        }
    }

    #[test]
    fn decode_reads_scopes_and_roles() -> AuthResult<()> {
        let token = jwt_for("https://graph.microsoft.com", Some("User.Read"), &["Sites.Read.All"]);
        let claims = decode_claims(&token)?;
        assert_eq!(claims.aud.as_deref(), Some("https://graph.microsoft.com"));
        assert_eq!(claims.scp.as_deref(), Some("User.Read"));
        assert_eq!(claims.roles, Some(vec!["Sites.Read.All".to_string()]));
        Ok(())
    }

    #[test]
    fn decode_rejects_malformed_tokens() {
        for token in ["abc", "a.b", "a.%%%.c", "a.bm90IGpzb24.c", "a.b.c.d"] {
            assert!(
                matches!(decode_claims(token), Err(AuthError::MalformedToken { .. })),
                "{token} should be rejected"
            );
        }
    }

    #[test]
    fn decode_accepts_padded_payloads() -> AuthResult<()> {
        let token = unsigned_jwt(&serde_json::json!({"aud": "x"}));
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        parts[1].push_str("==");
        let claims = decode_claims(&parts.join("."))?;
        assert_eq!(claims.aud.as_deref(), Some("x"));
        Ok(())
    }

    #[test]
    fn audience_variants_collapse_to_tenant_root() {
        assert_eq!(
            normalize_audience("https://mydev-admin.sharepoint.com"),
            "https://mydev.sharepoint.com"
        );
        assert_eq!(
            normalize_audience("https://mydev-my.sharepoint.com"),
            "https://mydev.sharepoint.com"
        );
        assert_eq!(
            normalize_audience("https://mydev.sharepoint.com"),
            "https://mydev.sharepoint.com"
        );
        assert_eq!(
            normalize_audience("https://graph.microsoft.com"),
            "https://graph.microsoft.com"
        );
    }

    #[test]
    fn admin_and_root_tokens_accumulate_into_one_bucket() {
        let cache = TokenCache::new()
            .with_entry(
                "https://mydev-admin.sharepoint.com",
                entry(jwt_for("https://mydev-admin.sharepoint.com", Some("A B"), &[])),
            )
            .with_entry(
                "https://mydev.sharepoint.com",
                entry(jwt_for("https://mydev.sharepoint.com", Some("C"), &[])),
            );

        let permissions = aggregate_permissions(&cache);
        let expected: BTreeMap<String, Vec<String>> = BTreeMap::from([(
            "https://mydev.sharepoint.com".to_string(),
            vec!["A".to_string(), "B".to_string(), "C".to_string()],
        )]);
        assert_eq!(permissions.scopes, expected);
    }

    #[test]
    fn admin_and_root_scopes_merge_without_duplicates() {
        let cache = TokenCache::new()
            .with_entry(
                "https://mydev-admin.sharepoint.com",
                entry(jwt_for("https://mydev-admin.sharepoint.com", Some("A B"), &[])),
            )
            .with_entry(
                "https://mydev.sharepoint.com",
                entry(jwt_for("https://mydev.sharepoint.com", Some("C A"), &[])),
            );

        let permissions = aggregate_permissions(&cache);
        assert_eq!(permissions.scopes.len(), 1);
        assert_eq!(
            permissions.scopes.get("https://mydev.sharepoint.com"),
            Some(&vec!["A".to_string(), "B".to_string(), "C".to_string()])
        );
        assert!(permissions.roles.is_empty());
    }

    #[test]
    fn roles_are_tenant_wide_and_empty_claims_contribute_nothing() {
        let cache = TokenCache::new()
            .with_entry(
                "https://graph.microsoft.com",
                entry(jwt_for("https://graph.microsoft.com", Some(""), &["Sites.Read.All"])),
            )
            .with_entry(
                "https://mydev.sharepoint.com",
                entry(jwt_for(
                    "https://mydev.sharepoint.com",
                    None,
                    &["Sites.Read.All", "Sites.Manage.All"],
                )),
            )
            .with_entry("https://broken.example", entry("not-a-jwt".into()));

        let permissions = aggregate_permissions(&cache);
        assert!(permissions.scopes.is_empty());
        assert_eq!(permissions.roles, vec!["Sites.Read.All", "Sites.Manage.All"]);
    }

    #[test]
    fn aggregation_is_deterministic() {
        let cache = TokenCache::new()
            .with_entry(
                "https://b.example",
                entry(jwt_for("https://b.example", Some("X Y"), &["R2"])),
            )
            .with_entry(
                "https://a.example",
                entry(jwt_for("https://a.example", Some("Y"), &["R1"])),
            );
        let first = aggregate_permissions(&cache);
        assert_eq!(first, aggregate_permissions(&cache.clone()));
        assert_eq!(first.roles, vec!["R1", "R2"]);
    }
}
