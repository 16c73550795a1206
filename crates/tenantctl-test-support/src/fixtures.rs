//! Token fixtures for tests that exercise the authenticated request path.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value, json};

/// Build an unsigned three-part JWT carrying `claims` as its payload.
#[must_use]
pub fn unsigned_jwt(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

/// JWT with the given audience plus optional delegated scopes and app roles.
#[must_use]
pub fn jwt_for(aud: &str, scp: Option<&str>, roles: &[&str]) -> String {
    let mut claims = Map::new();
    claims.insert("aud".into(), Value::String(aud.to_string()));
    if let Some(scp) = scp {
        claims.insert("scp".into(), Value::String(scp.to_string()));
    }
    if !roles.is_empty() {
        claims.insert("roles".into(), json!(roles));
    }
    unsigned_jwt(&Value::Object(claims))
}

/// Expiry one hour from now.
#[must_use]
pub fn fresh_expiry() -> DateTime<Utc> {
    Utc::now() + Duration::hours(1)
}

/// Expiry one hour in the past.
#[must_use]
pub fn stale_expiry() -> DateTime<Utc> {
    Utc::now() - Duration::hours(1)
}

/// Token cache document in the layout written by the auth service.
#[must_use]
pub fn token_cache_document(connected: bool, entries: &[(&str, &str, DateTime<Utc>)]) -> Value {
    let tokens: Map<String, Value> = entries
        .iter()
        .map(|(resource, token, expires_on)| {
            (
                (*resource).to_string(),
                json!({"accessToken": token, "expiresOn": expires_on.to_rfc3339()}),
            )
        })
        .collect();
    json!({"connected": connected, "accessTokens": tokens})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_jwt_has_three_segments() {
        let token = jwt_for("https://contoso.sharepoint.com", Some("AllSites.Read"), &[]);
        assert_eq!(token.split('.').count(), 3);
        let payload = token.split('.').nth(1).unwrap_or_default();
        let decoded = URL_SAFE_NO_PAD.decode(payload).expect("payload decodes");
        let claims: Value = serde_json::from_slice(&decoded).expect("payload is json");
        assert_eq!(claims["scp"], "AllSites.Read");
        assert!(claims.get("roles").is_none());
    }

    #[test]
    fn token_cache_document_lists_entries() {
        let expiry = fresh_expiry();
        let doc = token_cache_document(true, &[("https://graph.microsoft.com", "t", expiry)]);
        assert_eq!(doc["connected"], true);
        assert_eq!(doc["accessTokens"]["https://graph.microsoft.com"]["accessToken"], "t");
        assert!(stale_expiry() < expiry);
    }
}
