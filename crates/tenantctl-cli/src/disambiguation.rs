//! Choosing a single item from a lookup by display name.

use tenantctl_config::{SettingsExt, SettingsStore};

use crate::error::{CliError, CliResult};
use crate::prompt::Prompter;

/// Items returned by a lookup, with the context needed to describe it.
#[derive(Debug, Clone)]
pub struct LookupResult<T> {
    /// Human-readable item kind, e.g. `list`.
    pub kind: String,
    /// Property the lookup matched on, e.g. `title`.
    pub key_name: String,
    /// Value the lookup matched on.
    pub key: String,
    /// Matching items in the order the service returned them.
    pub items: Vec<T>,
}

impl<T> LookupResult<T> {
    /// Describe a lookup of `kind` items whose `key_name` equals `key`.
    pub fn new(
        kind: impl Into<String>,
        key_name: impl Into<String>,
        key: impl Into<String>,
        items: Vec<T>,
    ) -> Self {
        Self {
            kind: kind.into(),
            key_name: key_name.into(),
            key: key.into(),
            items,
        }
    }
}

/// Resolves lookups to exactly one item, prompting when the `prompt` setting allows it.
#[derive(Clone, Copy)]
pub struct Disambiguator<'a> {
    settings: &'a dyn SettingsStore,
    prompter: &'a dyn Prompter,
}

impl<'a> Disambiguator<'a> {
    /// Disambiguator reading the prompt setting from `settings`.
    #[must_use]
    pub const fn new(settings: &'a dyn SettingsStore, prompter: &'a dyn Prompter) -> Self {
        Self { settings, prompter }
    }

    /// Pick the single item of `lookup`.
    ///
    /// `identify` renders an item for the ambiguity message and the prompt.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::LookupNotFound`] when nothing matched and
    /// [`CliError::LookupAmbiguity`] when several items matched while prompting
    /// is disabled.
    pub async fn resolve<T, F>(&self, lookup: LookupResult<T>, identify: F) -> CliResult<T>
    where
        T: Send,
        F: Fn(&T) -> String + Send,
    {
        let LookupResult {
            kind,
            key_name,
            key,
            mut items,
        } = lookup;

        match items.len() {
            0 => Err(CliError::LookupNotFound(format!(
                "The specified {kind} with {key_name} '{key}' does not exist"
            ))),
            1 => Ok(items.remove(0)),
            _ => {
                let identities: Vec<String> = items.iter().map(&identify).collect();
                if !self.settings.prompt_enabled() {
                    return Err(CliError::LookupAmbiguity(format!(
                        "Multiple {kind}s with {key_name} '{key}' found. Found: {}.",
                        identities.join(", ")
                    )));
                }

                let message =
                    format!("Multiple {kind}s with {key_name} '{key}' found. Choose the one to use:");
                let index = self.prompter.select(&message, &identities).await?;
                if index >= items.len() {
                    return Err(CliError::Prompt(format!("choice {index} is out of range")));
                }
                Ok(items.swap_remove(index))
            }
        }
    }
}
