#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]

//! Settings store for the tenantctl command-line client.
//!
//! Layout: `model.rs` (setting keys and output modes), `validate.rs`
//! (per-key value coercion), `service.rs` (`SettingsStore` trait with the
//! file-backed and in-memory implementations), `defaults.rs` (default values).

pub mod defaults;
pub mod error;
pub mod model;
pub mod service;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use model::{OutputMode, SettingKey};
pub use service::{FileSettings, MemorySettings, SettingsExt, SettingsStore};
pub use validate::coerce_setting;
