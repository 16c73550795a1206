use serde_json::json;
use tenantctl_config::{ConfigError, FileSettings, OutputMode, SettingKey, SettingsExt, SettingsStore};

#[test]
fn file_settings_persist_across_reloads() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nested").join("settings.json");

    let settings = FileSettings::load(&path)?;
    assert!(!settings.prompt_enabled());
    settings.set(SettingKey::Prompt, &json!("true"))?;
    settings.set(SettingKey::Output, &json!("text"))?;

    let reloaded = FileSettings::load(&path)?;
    assert!(reloaded.prompt_enabled());
    assert_eq!(reloaded.output_mode(), OutputMode::Text);

    let document: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(document, json!({"output": "text", "prompt": true}));
    Ok(())
}

#[test]
fn invalid_values_are_not_persisted() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("settings.json");

    let settings = FileSettings::load(&path)?;
    let err = settings
        .set(SettingKey::Output, &json!("yaml"))
        .expect_err("yaml is not an output mode");
    assert!(matches!(err, ConfigError::InvalidValue { .. }));
    assert!(!path.exists());
    Ok(())
}

#[test]
fn malformed_document_is_reported() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("settings.json");
    std::fs::write(&path, "{not json")?;

    let err = FileSettings::load(&path).expect_err("malformed file must fail");
    assert!(matches!(err, ConfigError::Parse { .. }));
    Ok(())
}
