use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tenantctl_auth::{TokenPermissions, aggregate_permissions};
use tenantctl_config::SettingKey;

use crate::engine::CommandContext;
use crate::error::CliResult;
use crate::options::CommandArgs;
use crate::registry::{CommandAction, CommandDescriptor};

pub(crate) const DOCTOR: &str = "cli doctor";

pub(crate) fn descriptor() -> CommandDescriptor {
    CommandDescriptor::new(
        DOCTOR,
        "Retrieves diagnostic information about the current environment",
        Arc::new(Doctor),
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Diagnostics {
    os: OsInfo,
    cli_version: &'static str,
    connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant_url: Option<String>,
    token_resources: Vec<String>,
    settings: Map<String, Value>,
    #[serde(flatten)]
    permissions: TokenPermissions,
}

#[derive(Debug, Serialize)]
struct OsInfo {
    platform: &'static str,
    arch: &'static str,
}

struct Doctor;

#[async_trait]
impl CommandAction for Doctor {
    async fn run(&self, ctx: &CommandContext<'_>, _args: &CommandArgs) -> CliResult<()> {
        let session = ctx.session();
        let settings = SettingKey::ALL
            .iter()
            .filter_map(|key| {
                ctx.settings()
                    .get(*key)
                    .map(|value| (key.as_str().to_string(), value))
            })
            .collect();

        ctx.log(Diagnostics {
            os: OsInfo {
                platform: std::env::consts::OS,
                arch: std::env::consts::ARCH,
            },
            cli_version: env!("CARGO_PKG_VERSION"),
            connected: session.connected,
            tenant_url: session.tenant_url.as_ref().map(ToString::to_string),
            token_resources: session.access_tokens.resources().map(str::to_string).collect(),
            settings,
            permissions: aggregate_permissions(&session.access_tokens),
        })
    }
}
