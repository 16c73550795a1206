//! Declarative option contracts and the argument bag handed to commands.
//!
//! # Design
//! - Option kinds form a closed set; coercion and membership checks are keyed by kind.
//! - `CommandArgs` is built once per invocation and never mutated afterwards;
//!   validation produces a new bag instead of editing the old one.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{Arg, ArgAction, ArgMatches, Command};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tenantctl_config::OutputMode;

use crate::error::{CliError, CliResult};

/// Type of value an option accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    /// Free-form text.
    String,
    /// Flag; present means `true` unless `false` is given explicitly.
    Boolean,
    /// Numeric value.
    Number,
    /// Text restricted to the listed choices.
    Enum(&'static [&'static str]),
}

/// Contract for a single option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionSpec {
    /// Long name, used as `--name`.
    pub name: &'static str,
    /// Optional single-character alias, used as `-x`.
    pub short: Option<char>,
    /// Accepted value type.
    pub kind: OptionKind,
    /// Whether the option must always be supplied.
    pub required: bool,
    /// One-line description for usage output.
    pub description: &'static str,
}

impl OptionSpec {
    const fn of_kind(name: &'static str, kind: OptionKind) -> Self {
        Self {
            name,
            short: None,
            kind,
            required: false,
            description: "",
        }
    }

    /// Optional text option.
    #[must_use]
    pub const fn string(name: &'static str) -> Self {
        Self::of_kind(name, OptionKind::String)
    }

    /// Optional flag.
    #[must_use]
    pub const fn boolean(name: &'static str) -> Self {
        Self::of_kind(name, OptionKind::Boolean)
    }

    /// Optional numeric option.
    #[must_use]
    pub const fn number(name: &'static str) -> Self {
        Self::of_kind(name, OptionKind::Number)
    }

    /// Optional option restricted to `choices`.
    #[must_use]
    pub const fn choice(name: &'static str, choices: &'static [&'static str]) -> Self {
        Self::of_kind(name, OptionKind::Enum(choices))
    }

    /// Mark the option as required.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Attach a single-character alias.
    #[must_use]
    pub const fn short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    /// Attach a usage description.
    #[must_use]
    pub const fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Whether the option consumes the following token as its value.
    #[must_use]
    pub const fn takes_value(&self) -> bool {
        !matches!(self.kind, OptionKind::Boolean)
    }
}

/// Cross-option rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionGroup {
    /// At most one of the options may be set.
    Exclusive(&'static [&'static str]),
    /// Exactly one of the options must be set.
    RequireOne(&'static [&'static str]),
}

impl OptionGroup {
    /// Options covered by the rule.
    #[must_use]
    pub const fn members(&self) -> &'static [&'static str] {
        match self {
            Self::Exclusive(members) | Self::RequireOne(members) => members,
        }
    }
}

/// Value bound to an option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// Flag value.
    Boolean(bool),
    /// Numeric value.
    Number(f64),
    /// Text value.
    String(String),
}

impl OptionValue {
    /// Text content, if this is a text value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Flag content, if this is a flag value.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    /// Numeric content, if this is a numeric value.
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }
}

impl Display for OptionValue {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(value) => write!(formatter, "{value}"),
            Self::Number(value) => write!(formatter, "{value}"),
            Self::String(value) => formatter.write_str(value),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// Reserved flags understood by every command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalOptions {
    /// Emit debug diagnostics.
    pub debug: bool,
    /// Emit progress diagnostics.
    pub verbose: bool,
    /// Rendering for the primary output channel.
    pub output: Option<OutputMode>,
    /// Skip confirmation prompts.
    pub force: bool,
    /// Print help instead of running the command.
    pub help: bool,
}

impl GlobalOptions {
    /// Names that commands may not declare as their own options.
    pub const RESERVED: [&'static str; 5] = ["debug", "verbose", "output", "force", "help"];

    /// Flags a nested invocation inherits from its caller.
    #[must_use]
    pub const fn inherited(&self) -> Self {
        Self {
            debug: self.debug,
            verbose: self.verbose,
            output: None,
            force: self.force,
            help: false,
        }
    }
}

/// Immutable option bag for one invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandArgs {
    options: BTreeMap<String, OptionValue>,
    globals: GlobalOptions,
}

impl CommandArgs {
    /// Empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bag with `name` bound to `value`.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }

    /// Bag with `name` bound to `value` when a value is present.
    #[must_use]
    pub fn with_opt<V: Into<OptionValue>>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with(name, value),
            None => self,
        }
    }

    /// Bag with the reserved flags replaced.
    #[must_use]
    pub const fn with_globals(mut self, globals: GlobalOptions) -> Self {
        self.globals = globals;
        self
    }

    /// Bag whose reserved flags also carry the caller's `debug`, `verbose` and `force`.
    #[must_use]
    pub const fn inheriting(mut self, parent: &GlobalOptions) -> Self {
        let inherited = parent.inherited();
        self.globals.debug |= inherited.debug;
        self.globals.verbose |= inherited.verbose;
        self.globals.force |= inherited.force;
        self
    }

    /// Build a bag from a JSON object; reserved keys populate the global flags.
    ///
    /// # Errors
    ///
    /// Returns a structural validation error for non-scalar values or an
    /// unknown output mode.
    pub fn from_json(object: &Map<String, Value>) -> CliResult<Self> {
        let mut args = Self::new();
        for (name, value) in object {
            let value = match value {
                Value::Bool(flag) => OptionValue::Boolean(*flag),
                Value::Number(number) => OptionValue::Number(number.as_f64().ok_or_else(|| {
                    CliError::validation(format!("Option '{name}' is not a finite number"))
                })?),
                Value::String(text) => OptionValue::String(text.clone()),
                Value::Null => continue,
                _ => {
                    return Err(CliError::validation(format!(
                        "Option '{name}' must be a string, number or boolean"
                    )));
                }
            };
            args = args.bind(name, value)?;
        }
        Ok(args)
    }

    /// Parse option tokens (everything after the command words) against `specs`.
    ///
    /// Tokens go through a `clap` command built from `specs` plus the reserved
    /// flags. Undeclared options fail with `Invalid option` unless
    /// `keep_unknown` is set; kept options hold the following value as text,
    /// or `true` when none follows.
    ///
    /// # Errors
    ///
    /// Returns a structural validation error for undeclared options, stray
    /// positional tokens, repeated options, or value options without a value.
    pub fn parse(tokens: &[String], specs: &[OptionSpec], keep_unknown: bool) -> CliResult<Self> {
        let mut unknown: Vec<String> = Vec::new();
        loop {
            let err = match option_command(specs, &unknown).try_get_matches_from(tokens) {
                Ok(matches) => return Self::from_matches(&matches, specs, &unknown),
                Err(err) => err,
            };
            let Some(flag) = unknown_flag(&err) else {
                return Err(parse_failure(&err));
            };
            let name = flag_name(&flag);
            if !keep_unknown {
                return Err(CliError::validation(format!("Invalid option: '{name}'")));
            }
            let clashes = specs.iter().any(|spec| spec.name == name)
                || GlobalOptions::RESERVED.contains(&name)
                || unknown.iter().any(|known| flag_name(known) == name);
            if clashes {
                return Err(parse_failure(&err));
            }
            unknown.push(flag);
        }
    }

    fn from_matches(
        matches: &ArgMatches,
        specs: &[OptionSpec],
        unknown: &[String],
    ) -> CliResult<Self> {
        let names = specs
            .iter()
            .map(|spec| spec.name)
            .chain(GlobalOptions::RESERVED)
            .chain(unknown.iter().map(|flag| flag_name(flag)));

        let mut args = Self::new();
        for name in names {
            if matches.value_source(name).is_none() {
                continue;
            }
            let value = match matches.get_one::<String>(name) {
                Some(text) => OptionValue::String(text.clone()),
                None => OptionValue::Boolean(true),
            };
            args = args.bind(name, value)?;
        }
        Ok(args)
    }

    fn bind(mut self, name: &str, value: OptionValue) -> CliResult<Self> {
        match name {
            "debug" => self.globals.debug = flag_value(name, &value)?,
            "verbose" => self.globals.verbose = flag_value(name, &value)?,
            "force" => self.globals.force = flag_value(name, &value)?,
            "help" => self.globals.help = flag_value(name, &value)?,
            "output" => {
                let text = value.as_str().ok_or_else(|| {
                    CliError::validation("Option 'output' requires one of json, text, csv")
                })?;
                let mode = text
                    .parse::<OutputMode>()
                    .map_err(|err| CliError::validation(err.to_string()))?;
                self.globals.output = Some(mode);
            }
            _ => {
                if self.options.contains_key(name) {
                    return Err(CliError::validation(format!(
                        "Option '{name}' was specified more than once"
                    )));
                }
                self.options.insert(name.to_string(), value);
            }
        }
        Ok(self)
    }

    /// Value bound to `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.options.get(name)
    }

    /// Text bound to `name`.
    #[must_use]
    pub fn string(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(OptionValue::as_str)
    }

    /// Flag bound to `name`; absent flags are `false`.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.get(name).and_then(OptionValue::as_bool).unwrap_or(false)
    }

    /// Flag bound to `name`, distinguishing absent from `false`.
    #[must_use]
    pub fn optional_flag(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(OptionValue::as_bool)
    }

    /// Number bound to `name`.
    #[must_use]
    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(OptionValue::as_f64)
    }

    /// Whether `name` was supplied.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.options.contains_key(name)
    }

    /// Names of the supplied options, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.options.keys().map(String::as_str)
    }

    /// Supplied options and their values, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.options.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Reserved flags of this invocation.
    #[must_use]
    pub const fn globals(&self) -> &GlobalOptions {
        &self.globals
    }
}

fn flag_value(name: &str, value: &OptionValue) -> CliResult<bool> {
    match value {
        OptionValue::Boolean(flag) => Ok(*flag),
        OptionValue::String(text) if text == "true" => Ok(true),
        OptionValue::String(text) if text == "false" => Ok(false),
        _ => Err(CliError::validation(format!(
            "Option '{name}' must be true or false"
        ))),
    }
}

/// `clap` command accepting `specs`, the reserved flags and the undeclared
/// flags seen so far.
fn option_command(specs: &[OptionSpec], unknown: &[String]) -> Command {
    let free_short = |short: char| {
        (!specs.iter().any(|spec| spec.short == Some(short))).then_some(short)
    };

    let mut command = Command::new("tenantctl")
        .no_binary_name(true)
        .disable_help_flag(true)
        .disable_version_flag(true);
    for spec in specs {
        let arg = Arg::new(spec.name).long(spec.name).short(spec.short);
        command = command.arg(if spec.takes_value() {
            value_arg(arg)
        } else {
            flag_arg(arg)
        });
    }
    for name in ["debug", "verbose", "force"] {
        command = command.arg(flag_arg(Arg::new(name).long(name)));
    }
    command = command
        .arg(flag_arg(Arg::new("help").long("help").short(free_short('h'))))
        .arg(value_arg(Arg::new("output").long("output").short(free_short('o'))));

    for flag in unknown {
        let name = flag_name(flag).to_string();
        let arg = if flag.starts_with("--") {
            Arg::new(name.clone()).long(name)
        } else {
            let short = name.chars().next();
            Arg::new(name).short(short)
        };
        command = command.arg(
            arg.action(ArgAction::Set)
                .num_args(0..=1)
                .allow_negative_numbers(true),
        );
    }
    command
}

fn value_arg(arg: Arg) -> Arg {
    arg.action(ArgAction::Set)
        .num_args(1)
        .allow_negative_numbers(true)
}

/// Flags take an optional `true`/`false` literal.
fn flag_arg(arg: Arg) -> Arg {
    arg.action(ArgAction::Set)
        .num_args(0..=1)
        .value_parser(["true", "false"])
}

/// Undeclared `-x` / `--name` flag `err` complains about.
fn unknown_flag(err: &clap::Error) -> Option<String> {
    if err.kind() != ErrorKind::UnknownArgument {
        return None;
    }
    match err.get(ContextKind::InvalidArg)? {
        ContextValue::String(arg) if arg.starts_with('-') && !flag_name(arg).is_empty() => {
            let flag = arg.split_once('=').map_or(arg.as_str(), |(flag, _)| flag);
            Some(flag.to_string())
        }
        _ => None,
    }
}

fn flag_name(flag: &str) -> &str {
    flag.trim_start_matches('-')
}

fn parse_failure(err: &clap::Error) -> CliError {
    if err.kind() == ErrorKind::UnknownArgument
        && let Some(ContextValue::String(arg)) = err.get(ContextKind::InvalidArg)
        && !arg.starts_with('-')
    {
        return CliError::validation(format!("Unexpected argument '{arg}'"));
    }
    let rendered = err.to_string();
    let summary = rendered.lines().next().unwrap_or_default();
    CliError::validation(summary.trim_start_matches("error: ").to_string())
}
