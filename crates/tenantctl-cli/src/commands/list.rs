use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, IF_MATCH};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::commands::{Collection, odata_literal, required, site_api, with_query};
use crate::disambiguation::LookupResult;
use crate::engine::CommandContext;
use crate::error::CliResult;
use crate::options::{CommandArgs, OptionGroup, OptionSpec};
use crate::registry::{CommandAction, CommandDescriptor};
use crate::request::RequestDescriptor;
use crate::validate::checks;

pub(crate) const GET: &str = "spo list get";
pub(crate) const SET: &str = "spo list set";

const X_HTTP_METHOD: HeaderName = HeaderName::from_static("x-http-method");

pub(crate) fn get_descriptor() -> CommandDescriptor {
    CommandDescriptor::new(GET, "Gets information about a list", Arc::new(GetList))
        .alias("spo list show")
        .option(
            OptionSpec::string("webUrl")
                .short('u')
                .required()
                .describe("URL of the site where the list is located"),
        )
        .option(OptionSpec::string("id").short('i').describe("ID of the list"))
        .option(OptionSpec::string("title").short('t').describe("Title of the list"))
        .option(OptionSpec::string("properties").short('p').describe("Comma-separated properties to retrieve"))
        .group(OptionGroup::RequireOne(&["id", "title"]))
        .validator(|args| checks(args).absolute_url("webUrl").guid("id").finish())
}

pub(crate) fn set_descriptor() -> CommandDescriptor {
    CommandDescriptor::new(SET, "Updates the title or description of a list", Arc::new(SetList))
        .option(
            OptionSpec::string("webUrl")
                .short('u')
                .required()
                .describe("URL of the site where the list is located"),
        )
        .option(OptionSpec::string("id").short('i').describe("ID of the list to update"))
        .option(OptionSpec::string("title").short('t').describe("Title of the list to update"))
        .option(OptionSpec::string("newTitle").describe("New title for the list"))
        .option(OptionSpec::string("description").describe("New description for the list"))
        .group(OptionGroup::RequireOne(&["id", "title"]))
        .validator(|args| {
            checks(args)
                .absolute_url("webUrl")
                .guid("id")
                .custom(|args| {
                    (!args.contains("newTitle") && !args.contains("description"))
                        .then(|| "Specify newTitle or description to update".to_string())
                })
                .finish()
        })
}

fn select(url: url::Url, args: &CommandArgs) -> url::Url {
    match args.string("properties") {
        Some(properties) => with_query(url, &[("$select", properties)]),
        None => url,
    }
}

struct GetList;

#[async_trait]
impl CommandAction for GetList {
    async fn run(&self, ctx: &CommandContext<'_>, args: &CommandArgs) -> CliResult<()> {
        let web_url = required(args, "webUrl")?;

        if let Some(id) = args.string("id") {
            ctx.verbose(&format!("Retrieving list {id} from {web_url}..."));
            let url = select(site_api(web_url, &format!("web/lists(guid'{id}')"))?, args);
            let list = ctx.client().send(RequestDescriptor::get(url)).await?;
            return ctx.log(list);
        }

        let title = required(args, "title")?;
        ctx.verbose(&format!("Retrieving list '{title}' from {web_url}..."));
        let filter = format!("Title eq '{}'", odata_literal(title));
        let url = select(
            with_query(site_api(web_url, "web/lists")?, &[("$filter", filter.as_str())]),
            args,
        );
        let lists: Collection<Value> = ctx.client().send_as(RequestDescriptor::get(url)).await?;
        let list = ctx
            .disambiguator()
            .resolve(LookupResult::new("list", "title", title, lists.value), |list| {
                list.get("Id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            })
            .await?;
        ctx.log(list)
    }
}

#[derive(Debug, Deserialize)]
struct ListRef {
    #[serde(rename = "Id")]
    id: String,
}

struct SetList;

#[async_trait]
impl CommandAction for SetList {
    async fn run(&self, ctx: &CommandContext<'_>, args: &CommandArgs) -> CliResult<()> {
        let web_url = required(args, "webUrl")?;

        let id = match args.string("id") {
            Some(id) => id.to_string(),
            None => {
                let lookup = CommandArgs::new()
                    .with("webUrl", web_url)
                    .with("title", required(args, "title")?)
                    .with("properties", "Id");
                ctx.invoke_captured(GET, lookup)
                    .await?
                    .parse::<ListRef>(GET)?
                    .id
            }
        };

        let mut body = Map::new();
        if let Some(title) = args.string("newTitle") {
            body.insert("Title".to_string(), Value::from(title));
        }
        if let Some(description) = args.string("description") {
            body.insert("Description".to_string(), Value::from(description));
        }

        ctx.verbose(&format!("Updating list {id}..."));
        let url = site_api(web_url, &format!("web/lists(guid'{id}')"))?;
        ctx.client()
            .send(
                RequestDescriptor::post(url)
                    .header(X_HTTP_METHOD, HeaderValue::from_static("MERGE"))
                    .header(IF_MATCH, HeaderValue::from_static("*"))
                    .json(Value::Object(body)),
            )
            .await?;
        Ok(())
    }
}
