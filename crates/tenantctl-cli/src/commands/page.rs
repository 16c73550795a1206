use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::commands::{odata_literal, required, site_api};
use crate::engine::CommandContext;
use crate::error::CliResult;
use crate::options::{CommandArgs, OptionSpec};
use crate::registry::{CommandAction, CommandDescriptor};
use crate::request::RequestDescriptor;
use crate::validate::checks;

pub(crate) const GET: &str = "spo page get";
pub(crate) const SET: &str = "spo page set";
pub(crate) const PUBLISH: &str = "spo page publish";

const LAYOUT_TYPES: &[&str] = &[
    "Article",
    "Home",
    "SingleWebPartAppPage",
    "RepostPage",
    "HeaderlessSearchResults",
    "Spaces",
    "Topic",
];

fn site_options(descriptor: CommandDescriptor) -> CommandDescriptor {
    descriptor
        .option(
            OptionSpec::string("webUrl")
                .short('u')
                .required()
                .describe("URL of the site where the page is located"),
        )
        .option(
            OptionSpec::string("name")
                .short('n')
                .required()
                .describe("Name of the page, with or without the .aspx extension"),
        )
}

pub(crate) fn get_descriptor() -> CommandDescriptor {
    site_options(CommandDescriptor::new(GET, "Gets information about a modern page", Arc::new(GetPage)))
        .validator(|args| checks(args).absolute_url("webUrl").finish())
}

pub(crate) fn set_descriptor() -> CommandDescriptor {
    site_options(CommandDescriptor::new(SET, "Updates a modern page", Arc::new(SetPage)))
        .option(OptionSpec::string("title").describe("New title of the page"))
        .option(OptionSpec::string("description").describe("New description of the page"))
        .option(OptionSpec::choice("layoutType", LAYOUT_TYPES).describe("Layout of the page"))
        .option(OptionSpec::boolean("commentsEnabled").describe("Whether comments are enabled"))
        .option(OptionSpec::boolean("publish").describe("Publish the page after updating it"))
        .validator(|args| checks(args).absolute_url("webUrl").finish())
}

pub(crate) fn publish_descriptor() -> CommandDescriptor {
    site_options(CommandDescriptor::new(PUBLISH, "Publishes a modern page", Arc::new(PublishPage)))
        .validator(|args| checks(args).absolute_url("webUrl").finish())
}

/// Page file name with the `.aspx` extension.
pub(crate) fn page_file_name(name: &str) -> String {
    let name = name.trim_start_matches('/');
    if name.to_ascii_lowercase().ends_with(".aspx") {
        name.to_string()
    } else {
        format!("{name}.aspx")
    }
}

fn page_by_url(web_url: &str, name: &str, suffix: &str) -> CliResult<url::Url> {
    site_api(
        web_url,
        &format!(
            "sitepages/pages/GetByUrl('sitepages/{}'){suffix}",
            odata_literal(&page_file_name(name))
        ),
    )
}

struct GetPage;

#[async_trait]
impl CommandAction for GetPage {
    async fn run(&self, ctx: &CommandContext<'_>, args: &CommandArgs) -> CliResult<()> {
        let web_url = required(args, "webUrl")?;
        let name = required(args, "name")?;
        ctx.verbose(&format!("Retrieving page {}...", page_file_name(name)));
        let page = ctx
            .client()
            .send(RequestDescriptor::get(page_by_url(web_url, name, "")?))
            .await?;
        ctx.log(page)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PageState {
    id: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    page_layout_type: Option<String>,
}

struct SetPage;

#[async_trait]
impl CommandAction for SetPage {
    async fn run(&self, ctx: &CommandContext<'_>, args: &CommandArgs) -> CliResult<()> {
        let web_url = required(args, "webUrl")?;
        let name = required(args, "name")?;

        let page: PageState = ctx
            .invoke_captured(
                GET,
                CommandArgs::new().with("webUrl", web_url).with("name", name),
            )
            .await?
            .parse(GET)?;
        let page_api = |suffix: &str| site_api(web_url, &format!("sitepages/pages({}){suffix}", page.id));

        let title = args.string("title");
        let description = args.string("description");
        let layout = args.string("layoutType");
        if title.is_some() || description.is_some() || layout.is_some() {
            ctx.verbose(&format!("Checking out page {}...", page.id));
            ctx.client()
                .send(RequestDescriptor::post(page_api("/checkoutpage")?))
                .await?;

            let mut body = Map::new();
            let merged = [
                ("Title", title.or(page.title.as_deref())),
                ("Description", description.or(page.description.as_deref())),
                ("PageLayoutType", layout.or(page.page_layout_type.as_deref())),
            ];
            for (field, value) in merged {
                if let Some(value) = value {
                    body.insert(field.to_string(), Value::from(value));
                }
            }

            ctx.verbose(&format!("Saving page {}...", page.id));
            ctx.client()
                .send(RequestDescriptor::post(page_api("/savepage")?).json(Value::Object(body)))
                .await?;
        }

        if let Some(enabled) = args.optional_flag("commentsEnabled") {
            let action = if enabled { "/EnableComments" } else { "/DisableComments" };
            ctx.verbose(&format!("Updating comments of page {}...", page.id));
            ctx.client()
                .send(RequestDescriptor::post(page_api(action)?))
                .await?;
        }

        if args.flag("publish") {
            ctx.invoke(
                PUBLISH,
                CommandArgs::new().with("webUrl", web_url).with("name", name),
            )
            .await?;
        }
        Ok(())
    }
}

struct PublishPage;

#[async_trait]
impl CommandAction for PublishPage {
    async fn run(&self, ctx: &CommandContext<'_>, args: &CommandArgs) -> CliResult<()> {
        let web_url = required(args, "webUrl")?;
        let name = required(args, "name")?;
        ctx.verbose(&format!("Publishing page {}...", page_file_name(name)));
        ctx.client()
            .send(RequestDescriptor::post(page_by_url(web_url, name, "/Publish")?))
            .await?;
        Ok(())
    }
}
