//! Default values for settings that have not been written yet.

use crate::model::OutputMode;

/// Prompting is off unless explicitly enabled; commands fail fast instead.
pub const PROMPT: bool = false;
/// Output mode used when neither `--output` nor the `output` setting is set.
pub const OUTPUT: OutputMode = OutputMode::Json;
/// Unambiguous command-name prefixes are accepted by default.
pub const PREFIX_MATCHING: bool = true;
/// File name of the settings document inside the user's home directory.
pub const SETTINGS_FILE_NAME: &str = ".tenantctl-config.json";
