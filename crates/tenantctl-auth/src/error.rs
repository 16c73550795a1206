//! Error types for token cache access.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading cached credentials.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token cache file could not be read.
    #[error("failed to read token cache {}", path.display())]
    CacheRead {
        /// Cache file location.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// The token cache file is not in the expected layout.
    #[error("token cache {} is malformed", path.display())]
    CacheParse {
        /// Cache file location.
        path: PathBuf,
        /// Source serde error.
        source: serde_json::Error,
    },
    /// An access token could not be decoded.
    #[error("malformed access token: {reason}")]
    MalformedToken {
        /// Which decoding step failed.
        reason: &'static str,
    },
}

/// Convenience alias for auth results.
pub type AuthResult<T> = Result<T, AuthError>;
