//! Shipped commands grouped by area, plus URL helpers they share.

pub(crate) mod app;
pub(crate) mod config;
pub(crate) mod doctor;
pub(crate) mod list;
pub(crate) mod page;
pub(crate) mod user;

use serde::Deserialize;
use url::Url;
use url::form_urlencoded::byte_serialize;

use crate::error::{CliError, CliResult};
use crate::options::CommandArgs;
use crate::registry::CommandRegistry;

/// Register every shipped command into `registry`.
///
/// # Errors
///
/// Returns an error if two shipped commands claim the same name or alias.
pub fn register_all(registry: &mut CommandRegistry) -> CliResult<()> {
    registry.register(list::get_descriptor())?;
    registry.register(list::set_descriptor())?;
    registry.register(page::get_descriptor())?;
    registry.register(page::set_descriptor())?;
    registry.register(page::publish_descriptor())?;
    registry.register(app::remove_descriptor())?;
    registry.register(user::get_descriptor())?;
    registry.register(doctor::descriptor())?;
    registry.register(config::get_descriptor())?;
    registry.register(config::set_descriptor())?;
    Ok(())
}

/// Registry holding every shipped command.
///
/// # Errors
///
/// Returns an error if two shipped commands claim the same name or alias.
pub fn default_registry() -> CliResult<CommandRegistry> {
    let mut registry = CommandRegistry::new();
    register_all(&mut registry)?;
    Ok(registry)
}

/// OData collection envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct Collection<T> {
    pub(crate) value: Vec<T>,
}

/// Value of a required text option.
pub(crate) fn required<'a>(args: &'a CommandArgs, name: &str) -> CliResult<&'a str> {
    args.string(name)
        .ok_or_else(|| CliError::validation(format!("Required option '{name}' not specified")))
}

/// `<base>/_api/<path>` for a SharePoint site or app catalog URL.
pub(crate) fn site_api(base: &str, path: &str) -> CliResult<Url> {
    let joined = format!("{}/_api/{}", base.trim_end_matches('/'), path);
    Url::parse(&joined).map_err(|err| {
        CliError::failure(anyhow::Error::new(err).context(format!("invalid request URL '{joined}'")))
    })
}

/// `<graph>/v1.0/<path>`.
pub(crate) fn graph_api(graph: &Url, path: &str) -> CliResult<Url> {
    let joined = format!("{}/v1.0/{}", graph.as_str().trim_end_matches('/'), path);
    Url::parse(&joined).map_err(|err| {
        CliError::failure(anyhow::Error::new(err).context(format!("invalid request URL '{joined}'")))
    })
}

/// `url` with `pairs` appended to its query, spaces encoded as `%20`.
pub(crate) fn with_query(mut url: Url, pairs: &[(&str, &str)]) -> Url {
    let encoded = pairs
        .iter()
        .map(|(name, value)| format!("{name}={}", encode(value)))
        .collect::<Vec<_>>()
        .join("&");
    let query = match url.query() {
        Some(existing) if !existing.is_empty() => format!("{existing}&{encoded}"),
        _ => encoded,
    };
    url.set_query(Some(&query));
    url
}

fn encode(value: &str) -> String {
    byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// `value` as the body of an OData string literal.
pub(crate) fn odata_literal(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantctl_config::SettingKey;

    #[test]
    fn shipped_registry_is_consistent() -> CliResult<()> {
        let registry = default_registry()?;
        assert_eq!(registry.len(), 10);
        assert_eq!(registry.resolve("spo list show", false)?.name(), "spo list get");
        Ok(())
    }

    #[test]
    fn config_key_choices_match_setting_names() {
        assert_eq!(config::SETTING_NAMES.to_vec(), SettingKey::names());
    }

    #[test]
    fn query_values_are_percent_encoded() -> CliResult<()> {
        let url = site_api("https://contoso.sharepoint.com/sites/team/", "web/lists")?;
        let filter = format!("Title eq '{}'", odata_literal("Bob's & Co"));
        let url = with_query(url, &[("$filter", filter.as_str())]);
        assert_eq!(
            url.as_str(),
            "https://contoso.sharepoint.com/sites/team/_api/web/lists?$filter=Title%20eq%20%27Bob%27%27s%20%26%20Co%27"
        );
        Ok(())
    }
}
