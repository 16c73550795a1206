//! Settings stores consumed by the execution pipeline.
//!
//! Layout: the object-safe [`SettingsStore`] trait, the [`SettingsExt`]
//! convenience layer, and two backends: a JSON document on disk
//! ([`FileSettings`]) and a process-local map ([`MemorySettings`]).

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{OutputMode, SettingKey};
use crate::validate::coerce_setting;

/// Abstraction over settings backends.
pub trait SettingsStore: Send + Sync {
    /// Return the stored value for `key`, if one was ever written.
    fn get(&self, key: SettingKey) -> Option<Value>;

    /// Validate and store `value` for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error when the value is invalid for the key or cannot be persisted.
    fn set(&self, key: SettingKey, value: &Value) -> ConfigResult<()>;
}

/// Typed accessors layered over any [`SettingsStore`].
pub trait SettingsExt {
    /// Read `key`, falling back to `default` when unset or of the wrong type.
    fn get_setting_with_default_value<T: DeserializeOwned>(&self, key: SettingKey, default: T)
    -> T;

    /// Whether interactive prompts are allowed.
    fn prompt_enabled(&self) -> bool {
        self.get_setting_with_default_value(SettingKey::Prompt, defaults::PROMPT)
    }

    /// Output mode used when the invocation does not pass `--output`.
    fn output_mode(&self) -> OutputMode {
        self.get_setting_with_default_value(SettingKey::Output, defaults::OUTPUT)
    }

    /// Whether command names may be abbreviated to an unambiguous prefix.
    fn prefix_matching(&self) -> bool {
        self.get_setting_with_default_value(SettingKey::PrefixMatching, defaults::PREFIX_MATCHING)
    }
}

impl<S: SettingsStore + ?Sized> SettingsExt for S {
    fn get_setting_with_default_value<T: DeserializeOwned>(
        &self,
        key: SettingKey,
        default: T,
    ) -> T {
        let Some(value) = self.get(key) else {
            return default;
        };
        serde_json::from_value(value).unwrap_or_else(|err| {
            warn!(setting = %key, error = %err, "ignoring malformed setting value");
            default
        })
    }
}

/// Settings persisted as a flat JSON object on disk.
#[derive(Debug)]
pub struct FileSettings {
    path: PathBuf,
    values: RwLock<BTreeMap<String, Value>>,
}

impl FileSettings {
    /// Load settings from `path`. A missing file yields an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn load(path: impl Into<PathBuf>) -> ConfigResult<Self> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                    path: path.clone(),
                    source,
                })?
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "settings file not found; using defaults");
                BTreeMap::new()
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    operation: "read",
                    path,
                    source,
                });
            }
        };
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    /// Location of the backing document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, Value>) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                operation: "create_dir",
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let document = serde_json::to_string_pretty(values).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, document).map_err(|source| ConfigError::Io {
            operation: "write",
            path: self.path.clone(),
            source,
        })
    }
}

impl SettingsStore for FileSettings {
    fn get(&self, key: SettingKey) -> Option<Value> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key.as_str())
            .cloned()
    }

    fn set(&self, key: SettingKey, value: &Value) -> ConfigResult<()> {
        let value = coerce_setting(key, value)?;
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.as_str().to_string(), value);
        self.persist(&values)?;
        debug!(setting = %key, path = %self.path.display(), "setting persisted");
        Ok(())
    }
}

/// Process-local settings, used for tests and for nested invocations that
/// must not touch the user's settings document.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<BTreeMap<String, Value>>,
}

impl MemorySettings {
    /// Empty store; every key reports its default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with prompting switched on or off.
    #[must_use]
    pub fn with_prompt(enabled: bool) -> Self {
        let store = Self::new();
        store
            .values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(SettingKey::Prompt.as_str().to_string(), Value::Bool(enabled));
        store
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: SettingKey) -> Option<Value> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key.as_str())
            .cloned()
    }

    fn set(&self, key: SettingKey, value: &Value) -> ConfigResult<()> {
        let value = coerce_setting(key, value)?;
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.as_str().to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_apply_when_unset() {
        let store = MemorySettings::new();
        assert!(!store.prompt_enabled());
        assert!(store.prefix_matching());
        assert_eq!(store.output_mode(), OutputMode::Json);
    }

    #[test]
    fn memory_settings_store_coerced_values() -> ConfigResult<()> {
        let store = MemorySettings::new();
        store.set(SettingKey::Prompt, &json!("true"))?;
        store.set(SettingKey::Output, &json!("csv"))?;
        assert!(store.prompt_enabled());
        assert_eq!(store.output_mode(), OutputMode::Csv);
        assert!(store.set(SettingKey::PrefixMatching, &json!("maybe")).is_err());
        assert!(store.prefix_matching());
        Ok(())
    }

    #[test]
    fn with_prompt_seeds_flag() {
        assert!(MemorySettings::with_prompt(true).prompt_enabled());
        assert!(!MemorySettings::with_prompt(false).prompt_enabled());
    }
}
