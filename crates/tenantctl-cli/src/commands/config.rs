use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tenantctl_config::{SettingKey, coerce_setting};

use crate::commands::required;
use crate::engine::CommandContext;
use crate::error::{CliError, CliResult};
use crate::options::{CommandArgs, OptionSpec};
use crate::registry::{CommandAction, CommandDescriptor};

pub(crate) const GET: &str = "cli config get";
pub(crate) const SET: &str = "cli config set";

/// Setting names accepted by `--key`, in declaration order.
pub(crate) const SETTING_NAMES: &[&str] = &["prompt", "output", "prefixMatching"];

pub(crate) fn get_descriptor() -> CommandDescriptor {
    CommandDescriptor::new(GET, "Gets the value of a CLI setting", Arc::new(GetSetting)).option(
        OptionSpec::choice("key", SETTING_NAMES)
            .short('k')
            .required()
            .describe("Setting to read"),
    )
}

pub(crate) fn set_descriptor() -> CommandDescriptor {
    CommandDescriptor::new(SET, "Stores the value of a CLI setting", Arc::new(SetSetting))
        .option(
            OptionSpec::choice("key", SETTING_NAMES)
                .short('k')
                .required()
                .describe("Setting to change"),
        )
        .option(OptionSpec::string("value").short('v').required().describe("New value"))
        .validator(|args| {
            let key = setting_key(args).map_err(|err| err.to_string())?;
            let value = args.string("value").unwrap_or_default();
            coerce_setting(key, &Value::from(value))
                .map(drop)
                .map_err(|err| err.to_string())
        })
}

fn setting_key(args: &CommandArgs) -> CliResult<SettingKey> {
    required(args, "key")?
        .parse::<SettingKey>()
        .map_err(|err| CliError::validation(err.to_string()))
}

struct GetSetting;

#[async_trait]
impl CommandAction for GetSetting {
    async fn run(&self, ctx: &CommandContext<'_>, args: &CommandArgs) -> CliResult<()> {
        let key = setting_key(args)?;
        let value = ctx.settings().get(key).unwrap_or_else(|| key.default_value());
        ctx.log(value)
    }
}

struct SetSetting;

#[async_trait]
impl CommandAction for SetSetting {
    async fn run(&self, ctx: &CommandContext<'_>, args: &CommandArgs) -> CliResult<()> {
        let key = setting_key(args)?;
        let value = required(args, "value")?;
        ctx.settings()
            .set(key, &Value::from(value))
            .map_err(CliError::failure)?;
        ctx.verbose(&format!("Setting {key} updated"));
        Ok(())
    }
}
