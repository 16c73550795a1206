use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::commands::{Collection, odata_literal, required, site_api, with_query};
use crate::disambiguation::LookupResult;
use crate::engine::CommandContext;
use crate::error::CliResult;
use crate::options::{CommandArgs, OptionGroup, OptionSpec};
use crate::registry::{CommandAction, CommandDescriptor};
use crate::request::RequestDescriptor;
use crate::validate::checks;

pub(crate) const REMOVE: &str = "spo app remove";

pub(crate) fn remove_descriptor() -> CommandDescriptor {
    CommandDescriptor::new(REMOVE, "Removes an app from the tenant app catalog", Arc::new(RemoveApp))
        .option(OptionSpec::string("id").short('i').describe("ID of the app to remove"))
        .option(OptionSpec::string("name").short('n').describe("Name of the app to remove"))
        .option(
            OptionSpec::string("appCatalogUrl")
                .required()
                .describe("URL of the tenant app catalog site"),
        )
        .group(OptionGroup::RequireOne(&["id", "name"]))
        .validator(|args| checks(args).guid("id").absolute_url("appCatalogUrl").finish())
}

fn app_id(app: &Value) -> String {
    app.get("ID")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

struct RemoveApp;

#[async_trait]
impl CommandAction for RemoveApp {
    async fn run(&self, ctx: &CommandContext<'_>, args: &CommandArgs) -> CliResult<()> {
        let catalog = required(args, "appCatalogUrl")?;
        let target = args.string("id").or_else(|| args.string("name")).unwrap_or_default();

        if !ctx
            .confirm(&format!("Are you sure you want to remove the app {target} from the app catalog?"))
            .await?
        {
            ctx.verbose("Removal cancelled");
            return Ok(());
        }

        let id = match args.string("id") {
            Some(id) => id.to_string(),
            None => {
                let name = required(args, "name")?;
                ctx.verbose(&format!("Looking up app '{name}'..."));
                let filter = format!("Title eq '{}'", odata_literal(name));
                let url = with_query(
                    site_api(catalog, "web/tenantappcatalog/AvailableApps")?,
                    &[("$filter", filter.as_str()), ("$select", "ID,Title")],
                );
                let apps: Collection<Value> = ctx.client().send_as(RequestDescriptor::get(url)).await?;
                let app = ctx
                    .disambiguator()
                    .resolve(LookupResult::new("app", "name", name, apps.value), app_id)
                    .await?;
                app_id(&app)
            }
        };

        ctx.verbose(&format!("Removing app {id}..."));
        let url = site_api(
            catalog,
            &format!("web/tenantappcatalog/AvailableApps/GetById('{id}')/remove"),
        )?;
        ctx.client().send(RequestDescriptor::post(url)).await?;
        Ok(())
    }
}
