//! Coercion of raw setting values into their canonical JSON shape.

use serde_json::Value;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{OutputMode, SettingKey};

/// Validate `raw` for `key` and return the value that should be stored.
///
/// Boolean settings accept JSON booleans as well as the strings `true` and
/// `false`, because values typed on the command line always arrive as text.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] when the value does not fit the key.
pub fn coerce_setting(key: SettingKey, raw: &Value) -> ConfigResult<Value> {
    match key {
        SettingKey::Prompt | SettingKey::PrefixMatching => parse_bool(key, raw).map(Value::Bool),
        SettingKey::Output => {
            let text = raw.as_str().ok_or_else(|| invalid(key, "must be a string"))?;
            let mode = text.parse::<OutputMode>()?;
            Ok(Value::String(mode.as_str().to_string()))
        }
    }
}

fn parse_bool(key: SettingKey, raw: &Value) -> ConfigResult<bool> {
    match raw {
        Value::Bool(flag) => Ok(*flag),
        Value::String(text) => match text.trim() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(invalid(key, "must be true or false")),
        },
        _ => Err(invalid(key, "must be true or false")),
    }
}

fn invalid(key: SettingKey, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.as_str().to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn boolean_settings_accept_text_and_json() -> ConfigResult<()> {
        assert_eq!(coerce_setting(SettingKey::Prompt, &json!("true"))?, json!(true));
        assert_eq!(
            coerce_setting(SettingKey::PrefixMatching, &json!(false))?,
            json!(false)
        );
        assert!(coerce_setting(SettingKey::Prompt, &json!("yes")).is_err());
        assert!(coerce_setting(SettingKey::Prompt, &json!(1)).is_err());
        Ok(())
    }

    #[test]
    fn output_setting_requires_known_mode() -> ConfigResult<()> {
        assert_eq!(coerce_setting(SettingKey::Output, &json!("text"))?, json!("text"));
        let err = coerce_setting(SettingKey::Output, &json!("xml")).expect_err("xml rejected");
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "output"));
        Ok(())
    }
}
