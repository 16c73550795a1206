//! Typed setting keys and the values they carry.
//!
//! # Design
//! - Setting names form a closed set so typos surface as errors, not silent misses.
//! - The on-disk document stays a flat JSON object keyed by `SettingKey::as_str`.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::defaults;
use crate::error::ConfigError;

/// Settings understood by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SettingKey {
    /// Allow interactive prompts for missing options and ambiguous lookups.
    Prompt,
    /// Default output mode for command results.
    Output,
    /// Accept unambiguous prefixes of command names.
    PrefixMatching,
}

impl SettingKey {
    /// Every known setting, in display order.
    pub const ALL: [Self; 3] = [Self::Prompt, Self::Output, Self::PrefixMatching];

    /// Name used on the command line and in the settings document.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Prompt => "prompt",
            Self::Output => "output",
            Self::PrefixMatching => "prefixMatching",
        }
    }

    /// Value reported when the setting has never been written.
    #[must_use]
    pub fn default_value(self) -> Value {
        match self {
            Self::Prompt => Value::Bool(defaults::PROMPT),
            Self::Output => Value::String(defaults::OUTPUT.as_str().to_string()),
            Self::PrefixMatching => Value::Bool(defaults::PREFIX_MATCHING),
        }
    }

    /// Names of every known setting, used for enum-style option validation.
    #[must_use]
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|key| key.as_str()).collect()
    }
}

impl Display for SettingKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for SettingKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownSetting {
                name: s.to_string(),
            })
    }
}

/// Rendering applied to values passed to the primary output channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Pretty-printed JSON.
    #[default]
    Json,
    /// Human-readable `key: value` text.
    Text,
    /// Comma separated values with a header row.
    Csv,
}

impl OutputMode {
    /// Accepted spellings, used in validation messages.
    pub const CHOICES: [&'static str; 3] = ["json", "text", "csv"];

    /// Render the mode as its lowercase string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
            Self::Csv => "csv",
        }
    }
}

impl FromStr for OutputMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            "csv" => Ok(Self::Csv),
            other => Err(ConfigError::InvalidValue {
                key: SettingKey::Output.as_str().to_string(),
                message: format!(
                    "'{other}' is not one of {}",
                    Self::CHOICES.join(", ")
                ),
            }),
        }
    }
}
