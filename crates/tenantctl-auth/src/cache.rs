//! Token cache and session context.
//!
//! # Design
//! - The cache is keyed by resource origin (`scheme://host[:port]`) and matched exactly.
//! - `SessionContext` is constructed once and handed to the execution engine;
//!   nothing reads session state through globals.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{AuthError, AuthResult};

/// Cached credential for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenEntry {
    /// Opaque bearer token (a JWT in practice).
    pub access_token: String,
    /// Instant after which the token must not be used.
    pub expires_on: DateTime<Utc>,
}

impl AccessTokenEntry {
    /// Whether the token has expired as of `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_on <= now
    }
}

/// Tokens keyed by resource origin, iterated in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenCache {
    entries: BTreeMap<String, AccessTokenEntry>,
}

impl TokenCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the entry for `resource`, returning the cache for chaining.
    #[must_use]
    pub fn with_entry(mut self, resource: impl Into<String>, entry: AccessTokenEntry) -> Self {
        self.entries.insert(resource.into(), entry);
        self
    }

    /// Entry registered for exactly `resource`.
    #[must_use]
    pub fn entry_for(&self, resource: &str) -> Option<&AccessTokenEntry> {
        self.entries.get(resource)
    }

    /// Entries in resource order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AccessTokenEntry)> {
        self.entries
            .iter()
            .map(|(resource, entry)| (resource.as_str(), entry))
    }

    /// Resources with a cached token.
    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of cached tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Authentication state visible to commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    /// Whether the auth service reports an active login.
    #[serde(default)]
    pub connected: bool,
    /// Root URL of the tenant's SharePoint site, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_url: Option<Url>,
    /// Cached access tokens.
    #[serde(default)]
    pub access_tokens: TokenCache,
}

impl SessionContext {
    /// Session with no login and no tokens.
    #[must_use]
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Connected session over `tokens`.
    #[must_use]
    pub fn connected(tokens: TokenCache) -> Self {
        Self {
            connected: true,
            tenant_url: None,
            access_tokens: tokens,
        }
    }

    /// Load the session written by the auth service. A missing file means
    /// the user never logged in.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn from_cache_file(path: &Path) -> AuthResult<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|source| AuthError::CacheParse {
                    path: path.to_path_buf(),
                    source,
                })
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "token cache not found; session is disconnected");
                Ok(Self::disconnected())
            }
            Err(source) => Err(AuthError::CacheRead {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// Resource key under which the token for `url` is cached.
#[must_use]
pub fn resource_for(url: &Url) -> String {
    url.origin().ascii_serialization()
}
