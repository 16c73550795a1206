//! Structural validation of an argument bag against a command's option contract.
//!
//! # Design
//! - Rules run in a fixed order: unknown options, group conflicts (exclusive
//!   groups and require-one groups with several members set), required
//!   options, unmet require-one groups, then value kinds. The first violation
//!   wins, and conflicts are reported before anything is prompted for.
//! - Missing values are prompted for only when the `prompt` setting is on;
//!   the setting is read once per validation.
//! - Command-specific checks live in [`Checks`] and run after structural rules.

use tenantctl_config::{SettingsExt, SettingsStore};
use url::Url;
use uuid::Uuid;

use crate::error::{CliError, CliResult};
use crate::options::{CommandArgs, OptionGroup, OptionKind, OptionSpec, OptionValue};
use crate::prompt::Prompter;
use crate::registry::CommandDescriptor;

/// Validate `args` against `descriptor`, prompting for missing values when allowed.
///
/// Returns the bag with prompted answers added and values coerced to their
/// declared kinds.
///
/// # Errors
///
/// Returns [`CliError::StructuralValidation`] for the first violated rule, or
/// [`CliError::Prompt`] when an interactive answer could not be obtained.
pub async fn validate_structure(
    descriptor: &CommandDescriptor,
    args: CommandArgs,
    settings: &dyn SettingsStore,
    prompter: &dyn Prompter,
) -> CliResult<CommandArgs> {
    let prompt = settings.prompt_enabled();
    let specs = descriptor.options();
    let mut args = args;

    if !descriptor.allows_unknown_options()
        && let Some(unknown) = args
            .names()
            .find(|name| !specs.iter().any(|spec| spec.name == *name))
    {
        return Err(CliError::validation(format!("Invalid option: '{unknown}'")));
    }

    for group in descriptor.groups() {
        let present = present_members(&args, group.members());
        if present.len() < 2 {
            continue;
        }
        return Err(CliError::validation(match group {
            OptionGroup::Exclusive(_) => {
                format!("Options {} are mutually exclusive", quoted(&present))
            }
            OptionGroup::RequireOne(members) => format!(
                "Specify one of the following options: {}, but not multiple",
                members.join(", ")
            ),
        }));
    }

    for spec in specs.iter().filter(|spec| spec.required) {
        if args.contains(spec.name) {
            continue;
        }
        if !prompt {
            return Err(CliError::validation(format!(
                "Required option '{}' not specified",
                spec.name
            )));
        }
        let answer = prompter.input(&format!("Value for '{}'", spec.name)).await?;
        args = args.with(spec.name, answer);
    }

    for group in descriptor.groups() {
        if let OptionGroup::RequireOne(members) = group {
            let present = present_members(&args, members);
            match present.len() {
                0 if prompt => {
                    let choices: Vec<String> =
                        members.iter().map(|member| (*member).to_string()).collect();
                    let index = prompter
                        .select("Which option do you want to use?", &choices)
                        .await?;
                    let name = members.get(index).copied().ok_or_else(|| {
                        CliError::Prompt(format!("choice {index} is out of range"))
                    })?;
                    let answer = prompter.input(&format!("Value for '{name}'")).await?;
                    args = args.with(name, answer);
                }
                0 => {
                    return Err(CliError::validation(format!(
                        "Specify one of the following options: {}",
                        members.join(", ")
                    )));
                }
                _ => {}
            }
        }
    }

    coerce_kinds(args, specs)
}

fn present_members(args: &CommandArgs, members: &[&'static str]) -> Vec<&'static str> {
    members
        .iter()
        .copied()
        .filter(|member| args.contains(member))
        .collect()
}

fn quoted(names: &[&str]) -> String {
    names
        .iter()
        .map(|name| format!("'{name}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn coerce_kinds(args: CommandArgs, specs: &[OptionSpec]) -> CliResult<CommandArgs> {
    let mut coerced = CommandArgs::new().with_globals(args.globals().clone());
    for (name, value) in args.iter() {
        let value = match specs.iter().find(|spec| spec.name == name) {
            Some(spec) => coerce_value(spec, value)?,
            None => value.clone(),
        };
        coerced = coerced.with(name, value);
    }
    Ok(coerced)
}

fn coerce_value(spec: &OptionSpec, value: &OptionValue) -> CliResult<OptionValue> {
    let name = spec.name;
    match (spec.kind, value) {
        (OptionKind::Boolean, OptionValue::Boolean(_))
        | (OptionKind::Number, OptionValue::Number(_))
        | (OptionKind::String, OptionValue::String(_)) => Ok(value.clone()),
        (OptionKind::Boolean, OptionValue::String(text)) => match text.as_str() {
            "true" => Ok(OptionValue::Boolean(true)),
            "false" => Ok(OptionValue::Boolean(false)),
            _ => Err(CliError::validation(format!(
                "Option '{name}' must be true or false"
            ))),
        },
        (OptionKind::Number, OptionValue::String(text)) => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|number| number.is_finite())
            .map(OptionValue::Number)
            .ok_or_else(|| {
                CliError::validation(format!("Option '{name}' must be a number, got '{text}'"))
            }),
        (OptionKind::String, other) => Ok(OptionValue::String(other.to_string())),
        (OptionKind::Enum(choices), value) => {
            let text = value.to_string();
            if choices.contains(&text.as_str()) {
                Ok(OptionValue::String(text))
            } else {
                Err(CliError::validation(format!(
                    "Option '{name}' must be one of: {}; got '{text}'",
                    choices.join(", ")
                )))
            }
        }
        (OptionKind::Boolean | OptionKind::Number, _) => Err(CliError::validation(format!(
            "Option '{name}' has a value of the wrong type"
        ))),
    }
}

/// Short-circuiting builder for command-specific argument predicates.
#[derive(Debug)]
pub struct Checks<'a> {
    args: &'a CommandArgs,
    failure: Option<String>,
}

/// Start a chain of checks over `args`.
#[must_use]
pub const fn checks(args: &CommandArgs) -> Checks<'_> {
    Checks {
        args,
        failure: None,
    }
}

impl Checks<'_> {
    fn check(mut self, passed: impl FnOnce(&CommandArgs) -> Option<String>) -> Self {
        if self.failure.is_none() {
            self.failure = passed(self.args);
        }
        self
    }

    /// When present, `name` must be a GUID in its 36-character hyphenated form.
    #[must_use]
    pub fn guid(self, name: &'static str) -> Self {
        self.check(|args| {
            let value = args.string(name)?;
            if is_guid(value) {
                None
            } else {
                Some(format!("{value} is not a valid GUID"))
            }
        })
    }

    /// When present, `name` must be an absolute http(s) URL with a host.
    #[must_use]
    pub fn absolute_url(self, name: &'static str) -> Self {
        self.check(|args| {
            let value = args.string(name)?;
            if is_absolute_url(value) {
                None
            } else {
                Some(format!("'{value}' is not a valid absolute URL"))
            }
        })
    }

    /// When present, `name` must be one of `choices`.
    #[must_use]
    pub fn one_of(self, name: &'static str, choices: &'static [&'static str]) -> Self {
        self.check(|args| {
            let value = args.get(name)?.to_string();
            if choices.contains(&value.as_str()) {
                None
            } else {
                Some(format!(
                    "'{value}' is not a valid value for option {name}. Allowed values: {}",
                    choices.join(", ")
                ))
            }
        })
    }

    /// When present, `name` must be a number greater than zero.
    #[must_use]
    pub fn positive_number(self, name: &'static str) -> Self {
        self.check(|args| {
            let value = args.number(name)?;
            if value > 0.0 {
                None
            } else {
                Some(format!("Option '{name}' must be a positive number, got {value}"))
            }
        })
    }

    /// Arbitrary predicate; returns the failure message when it does not hold.
    #[must_use]
    pub fn custom(self, predicate: impl FnOnce(&CommandArgs) -> Option<String>) -> Self {
        self.check(predicate)
    }

    /// Outcome of the chain: the first failure message, if any.
    ///
    /// # Errors
    ///
    /// Returns the message of the first failed check.
    pub fn finish(self) -> Result<(), String> {
        self.failure.map_or(Ok(()), Err)
    }
}

/// Whether `value` is a GUID in its 36-character hyphenated form.
#[must_use]
pub fn is_guid(value: &str) -> bool {
    value.len() == 36 && Uuid::try_parse(value).is_ok()
}

/// Whether `value` is an absolute http(s) URL with a host.
#[must_use]
pub fn is_absolute_url(value: &str) -> bool {
    Url::parse(value).is_ok_and(|url| {
        matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|host| !host.is_empty())
    })
}
