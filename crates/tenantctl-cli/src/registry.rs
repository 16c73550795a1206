//! Command descriptors and name resolution.
//!
//! # Design
//! - Descriptors are immutable once registered; the registry owns them for
//!   the lifetime of the process.
//! - Resolution tries the exact name, then an exact alias, then (when
//!   enabled) a word-wise prefix of a command name. Prefixes never match aliases.

use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use async_trait::async_trait;

use crate::engine::CommandContext;
use crate::error::{CliError, CliResult};
use crate::options::{CommandArgs, OptionGroup, OptionSpec};

/// Command-specific predicate run after structural validation.
pub type Validator = fn(&CommandArgs) -> Result<(), String>;

/// Behaviour of a command once its arguments are valid.
#[async_trait]
pub trait CommandAction: Send + Sync {
    /// Run the command.
    async fn run(&self, ctx: &CommandContext<'_>, args: &CommandArgs) -> CliResult<()>;
}

/// Everything the engine needs to know about one command.
#[derive(Clone)]
pub struct CommandDescriptor {
    name: String,
    description: &'static str,
    aliases: Vec<String>,
    options: Vec<OptionSpec>,
    groups: Vec<OptionGroup>,
    allow_unknown_options: bool,
    validator: Option<Validator>,
    action: Arc<dyn CommandAction>,
}

impl Debug for CommandDescriptor {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("options", &self.options)
            .field("groups", &self.groups)
            .field("allow_unknown_options", &self.allow_unknown_options)
            .finish_non_exhaustive()
    }
}

impl CommandDescriptor {
    /// Descriptor for `name` (space-separated words) running `action`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: &'static str,
        action: Arc<dyn CommandAction>,
    ) -> Self {
        Self {
            name: name.into(),
            description,
            aliases: Vec::new(),
            options: Vec::new(),
            groups: Vec::new(),
            allow_unknown_options: false,
            validator: None,
            action,
        }
    }

    /// Add an alternative full name.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Declare an option.
    #[must_use]
    pub fn option(mut self, spec: OptionSpec) -> Self {
        self.options.push(spec);
        self
    }

    /// Declare a cross-option rule.
    #[must_use]
    pub fn group(mut self, group: OptionGroup) -> Self {
        self.groups.push(group);
        self
    }

    /// Pass undeclared options through to the action instead of rejecting them.
    #[must_use]
    pub const fn allow_unknown_options(mut self) -> Self {
        self.allow_unknown_options = true;
        self
    }

    /// Attach a command-specific predicate.
    #[must_use]
    pub const fn validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Full command name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// One-line description.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        self.description
    }

    /// Alternative full names.
    #[must_use]
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Declared options.
    #[must_use]
    pub fn options(&self) -> &[OptionSpec] {
        &self.options
    }

    /// Declared cross-option rules.
    #[must_use]
    pub fn groups(&self) -> &[OptionGroup] {
        &self.groups
    }

    /// Whether undeclared options are accepted.
    #[must_use]
    pub const fn allows_unknown_options(&self) -> bool {
        self.allow_unknown_options
    }

    /// Run the command-specific predicate; commands without one always pass.
    ///
    /// # Errors
    ///
    /// Returns the predicate's failure message.
    pub fn validate(&self, args: &CommandArgs) -> Result<(), String> {
        self.validator.map_or(Ok(()), |validator| validator(args))
    }

    /// Behaviour run once the arguments are valid.
    #[must_use]
    pub fn action(&self) -> &dyn CommandAction {
        self.action.as_ref()
    }
}

/// Registered commands keyed by full name.
#[derive(Debug, Default, Clone)]
pub struct CommandRegistry {
    commands: BTreeMap<String, CommandDescriptor>,
    aliases: BTreeMap<String, String>,
}

impl CommandRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Failure`] when its name or one of its aliases is
    /// already taken, an option uses a reserved name, or two options share a
    /// short flag.
    pub fn register(&mut self, descriptor: CommandDescriptor) -> CliResult<()> {
        let name = normalize(descriptor.name());
        if self.is_taken(&name) {
            return Err(CliError::failure(anyhow::anyhow!(
                "command '{name}' is registered twice"
            )));
        }
        if let Some(spec) = descriptor
            .options()
            .iter()
            .find(|spec| crate::options::GlobalOptions::RESERVED.contains(&spec.name))
        {
            return Err(CliError::failure(anyhow::anyhow!(
                "command '{name}' declares reserved option '{}'",
                spec.name
            )));
        }

        let options = descriptor.options();
        if let Some(spec) = options.iter().enumerate().find_map(|(index, spec)| {
            (spec.short.is_some() && options[..index].iter().any(|earlier| earlier.short == spec.short))
                .then_some(spec)
        }) {
            return Err(CliError::failure(anyhow::anyhow!(
                "command '{name}' assigns short flag '-{}' to more than one option",
                spec.short.unwrap_or_default()
            )));
        }

        let mut aliases = Vec::with_capacity(descriptor.aliases().len());
        for alias in descriptor.aliases() {
            let alias = normalize(alias);
            if alias == name || self.is_taken(&alias) || aliases.contains(&alias) {
                return Err(CliError::failure(anyhow::anyhow!(
                    "alias '{alias}' of command '{name}' is already taken"
                )));
            }
            aliases.push(alias);
        }

        for alias in aliases {
            self.aliases.insert(alias, name.clone());
        }
        self.commands.insert(name, descriptor);
        Ok(())
    }

    fn is_taken(&self, name: &str) -> bool {
        self.commands.contains_key(name) || self.aliases.contains_key(name)
    }

    /// Find the command for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::CommandNotFound`] when nothing matches and
    /// [`CliError::AmbiguousCommand`] when a prefix matches several commands.
    pub fn resolve(&self, name: &str, allow_prefix: bool) -> CliResult<&CommandDescriptor> {
        let wanted = normalize(name);
        if let Some(descriptor) = self.commands.get(&wanted) {
            return Ok(descriptor);
        }
        if let Some(descriptor) = self
            .aliases
            .get(&wanted)
            .and_then(|target| self.commands.get(target))
        {
            return Ok(descriptor);
        }

        if allow_prefix {
            let words: Vec<&str> = wanted.split(' ').collect();
            let matches: Vec<&CommandDescriptor> = self
                .commands
                .iter()
                .filter(|(candidate, _)| is_word_prefix(&words, candidate))
                .map(|(_, descriptor)| descriptor)
                .collect();
            match matches.as_slice() {
                [single] => return Ok(*single),
                [] => {}
                many => {
                    return Err(CliError::AmbiguousCommand {
                        name: wanted,
                        candidates: many.iter().map(|found| found.name().to_string()).collect(),
                    });
                }
            }
        }

        Err(CliError::CommandNotFound { name: wanted })
    }

    /// Registered command names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    /// Registered descriptors, sorted by name.
    pub fn descriptors(&self) -> impl Iterator<Item = &CommandDescriptor> {
        self.commands.values()
    }

    /// Number of registered commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether no command is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

fn normalize(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_word_prefix(words: &[&str], candidate: &str) -> bool {
    let candidate_words: Vec<&str> = candidate.split(' ').collect();
    candidate_words.len() == words.len()
        && words
            .iter()
            .zip(&candidate_words)
            .all(|(word, full)| full.starts_with(word))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::NoopAction;

    fn descriptor(name: &str) -> CommandDescriptor {
        CommandDescriptor::new(name, "test command", Arc::new(NoopAction))
    }

    fn registry() -> CliResult<CommandRegistry> {
        let mut registry = CommandRegistry::new();
        registry.register(descriptor("spo list get").alias("spo list show"))?;
        registry.register(descriptor("spo list set"))?;
        registry.register(descriptor("spo page get"))?;
        Ok(registry)
    }

    #[test]
    fn resolves_names_and_aliases_exactly() -> CliResult<()> {
        let registry = registry()?;
        assert_eq!(registry.resolve("spo list get", false)?.name(), "spo list get");
        assert_eq!(registry.resolve("spo  list   show", false)?.name(), "spo list get");
        assert!(matches!(
            registry.resolve("spo li get", false),
            Err(CliError::CommandNotFound { .. })
        ));
        Ok(())
    }

    #[test]
    fn resolves_unambiguous_word_prefixes() -> CliResult<()> {
        let registry = registry()?;
        assert_eq!(registry.resolve("spo l g", true)?.name(), "spo list get");
        assert_eq!(registry.resolve("s p g", true)?.name(), "spo page get");
        assert!(matches!(
            registry.resolve("spo list", true),
            Err(CliError::CommandNotFound { .. })
        ));
        Ok(())
    }

    #[test]
    fn ambiguous_prefix_lists_sorted_candidates() -> CliResult<()> {
        let mut registry = registry()?;
        registry.register(descriptor("spo listitem get"))?;
        let err = registry.resolve("spo l g", true).expect_err("ambiguous");
        assert_eq!(
            err.to_string(),
            "command 'spo l g' is ambiguous; did you mean one of: spo list get, spo listitem get"
        );
        let CliError::AmbiguousCommand { candidates, .. } = err else {
            panic!("expected ambiguity, got {err}");
        };
        assert_eq!(candidates, vec!["spo list get", "spo listitem get"]);
        Ok(())
    }

    #[test]
    fn duplicate_names_and_aliases_are_rejected() -> CliResult<()> {
        let mut registry = registry()?;
        assert!(registry.register(descriptor("spo list get")).is_err());
        assert!(registry.register(descriptor("spo list show")).is_err());
        assert!(
            registry
                .register(descriptor("spo web get").alias("spo list set"))
                .is_err()
        );
        assert_eq!(registry.len(), 3);
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec!["spo list get", "spo list set", "spo page get"]
        );
        Ok(())
    }

    #[test]
    fn reserved_option_names_are_rejected() {
        let mut registry = CommandRegistry::new();
        let err = registry
            .register(descriptor("cli doctor").option(OptionSpec::boolean("debug")))
            .expect_err("reserved");
        assert!(err.to_string().contains("reserved option 'debug'"));
    }

    #[test]
    fn shared_short_flags_are_rejected() {
        let mut registry = CommandRegistry::new();
        let err = registry
            .register(
                descriptor("spo list get")
                    .option(OptionSpec::string("title").short('t'))
                    .option(OptionSpec::string("template").short('t')),
            )
            .expect_err("duplicate short");
        assert!(err.to_string().contains("short flag '-t'"));
    }

    #[test]
    fn commands_without_validator_always_pass() {
        assert_eq!(descriptor("x").validate(&CommandArgs::new()), Ok(()));
        let strict = descriptor("y").validator(|_| Err("nope".to_string()));
        assert_eq!(strict.validate(&CommandArgs::new()), Err("nope".to_string()));
    }
}
