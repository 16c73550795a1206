#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]

//! Read-only view of the credentials produced by the external auth service.
//!
//! Layout: `cache.rs` (token cache and session context), `introspect.rs`
//! (JWT claim decoding and cross-host aggregation), `error.rs`.
//!
//! Nothing in this crate acquires, refreshes or writes tokens.

pub mod cache;
pub mod error;
pub mod introspect;

pub use cache::{AccessTokenEntry, SessionContext, TokenCache, resource_for};
pub use error::{AuthError, AuthResult};
pub use introspect::{DecodedClaims, TokenPermissions, aggregate_permissions, decode_claims, normalize_audience};
