use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::commands::{Collection, graph_api, odata_literal, with_query};
use crate::disambiguation::LookupResult;
use crate::engine::CommandContext;
use crate::error::CliResult;
use crate::options::{CommandArgs, OptionGroup, OptionSpec};
use crate::registry::{CommandAction, CommandDescriptor};
use crate::request::RequestDescriptor;
use crate::validate::checks;

pub(crate) const GET: &str = "entra user get";

pub(crate) fn get_descriptor() -> CommandDescriptor {
    CommandDescriptor::new(GET, "Gets information about a user", Arc::new(GetUser))
        .option(OptionSpec::string("id").short('i').describe("ID of the user"))
        .option(OptionSpec::string("userName").short('n').describe("User principal name of the user"))
        .option(OptionSpec::string("properties").short('p').describe("Comma-separated properties to retrieve"))
        .group(OptionGroup::Exclusive(&["id", "userName"]))
        .group(OptionGroup::RequireOne(&["id", "userName"]))
        .validator(|args| checks(args).guid("id").finish())
}

fn select(url: url::Url, args: &CommandArgs) -> url::Url {
    match args.string("properties") {
        Some(properties) => with_query(url, &[("$select", properties)]),
        None => url,
    }
}

fn user_id(user: &Value) -> String {
    user.get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

struct GetUser;

#[async_trait]
impl CommandAction for GetUser {
    async fn run(&self, ctx: &CommandContext<'_>, args: &CommandArgs) -> CliResult<()> {
        let graph = ctx.graph_url();

        if let Some(id) = args.string("id") {
            ctx.verbose(&format!("Retrieving user {id}..."));
            let url = select(graph_api(graph, &format!("users/{id}"))?, args);
            let user = ctx.client().send(RequestDescriptor::get(url)).await?;
            return ctx.log(user);
        }

        let user_name = args.string("userName").unwrap_or_default();
        ctx.verbose(&format!("Retrieving user {user_name}..."));
        let filter = format!("userPrincipalName eq '{}'", odata_literal(user_name));
        let url = select(
            with_query(graph_api(graph, "users")?, &[("$filter", filter.as_str())]),
            args,
        );
        let users: Collection<Value> = ctx.client().send_as(RequestDescriptor::get(url)).await?;
        let user = ctx
            .disambiguator()
            .resolve(
                LookupResult::new("user", "user name", user_name, users.value),
                user_id,
            )
            .await?;
        ctx.log(user)
    }
}
