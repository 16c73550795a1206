//! Execution pipeline: resolve, help, validate, act; plus command composition.
//!
//! # Design
//! - Each stage short-circuits; nothing reaches the network before both
//!   validation stages pass.
//! - Nested invocations go through the same pipeline as top-level ones and
//!   their errors are returned unchanged.
//! - Capture composition swaps the logger, never the session or settings.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tenantctl_auth::SessionContext;
use tenantctl_config::{SettingsExt, SettingsStore};
use tracing::{Instrument, Span, debug, info_span};
use url::Url;

use crate::disambiguation::Disambiguator;
use crate::error::{CliError, CliResult};
use crate::help::{FileHelpSource, HelpSource, usage};
use crate::options::{CommandArgs, GlobalOptions};
use crate::output::{CaptureLogger, CommandOutput, Logger};
use crate::prompt::{Prompter, TerminalPrompter};
use crate::registry::{CommandDescriptor, CommandRegistry};
use crate::request::RequestClient;
use crate::validate::validate_structure;

/// Microsoft Graph endpoint used by directory commands.
pub const DEFAULT_GRAPH_URL: &str = "https://graph.microsoft.com";

/// Help documents shipped with the crate.
pub const BUNDLED_HELP_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/help");

/// Runs commands from a registry against one session.
pub struct ExecutionEngine {
    registry: CommandRegistry,
    client: RequestClient,
    settings: Arc<dyn SettingsStore>,
    prompter: Arc<dyn Prompter>,
    help: Arc<dyn HelpSource>,
    graph_url: Url,
}

impl ExecutionEngine {
    /// Engine over `registry` sending requests through `client`.
    ///
    /// Prompts go to the terminal and help comes from the bundled help
    /// directory until replaced.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Failure`] if the default Graph URL cannot be parsed.
    pub fn new(
        registry: CommandRegistry,
        client: RequestClient,
        settings: Arc<dyn SettingsStore>,
    ) -> CliResult<Self> {
        let graph_url = Url::parse(DEFAULT_GRAPH_URL).map_err(CliError::failure)?;
        Ok(Self {
            registry,
            client,
            settings,
            prompter: Arc::new(TerminalPrompter),
            help: Arc::new(FileHelpSource::new(BUNDLED_HELP_DIR)),
            graph_url,
        })
    }

    /// Replace the prompter.
    #[must_use]
    pub fn with_prompter(mut self, prompter: Arc<dyn Prompter>) -> Self {
        self.prompter = prompter;
        self
    }

    /// Replace the help source.
    #[must_use]
    pub fn with_help_source(mut self, help: Arc<dyn HelpSource>) -> Self {
        self.help = help;
        self
    }

    /// Replace the Graph endpoint.
    #[must_use]
    pub fn with_graph_url(mut self, graph_url: Url) -> Self {
        self.graph_url = graph_url;
        self
    }

    /// Registered commands.
    #[must_use]
    pub const fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Settings consulted at each decision point.
    #[must_use]
    pub fn settings(&self) -> &dyn SettingsStore {
        self.settings.as_ref()
    }

    /// Resolve `name`, honouring the `prefixMatching` setting.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::CommandNotFound`] or [`CliError::AmbiguousCommand`].
    pub fn resolve(&self, name: &str) -> CliResult<&CommandDescriptor> {
        self.registry.resolve(name, self.settings.prefix_matching())
    }

    /// Resolve `name` and run it with `args`, writing to `logger`.
    ///
    /// # Errors
    ///
    /// Returns the first failure of resolution, validation or the action.
    pub async fn execute(&self, name: &str, args: CommandArgs, logger: &dyn Logger) -> CliResult<()> {
        let descriptor = self.resolve(name)?;
        self.run(descriptor, args, logger).await
    }

    /// Resolve `name` and run it with `args`, capturing its primary output.
    ///
    /// # Errors
    ///
    /// Returns the first failure of resolution, validation or the action.
    pub async fn execute_captured(
        &self,
        name: &str,
        args: CommandArgs,
        parent: &dyn Logger,
    ) -> CliResult<CommandOutput> {
        let capture = CaptureLogger::new(parent);
        self.execute(name, args, &capture).await?;
        Ok(capture.into_output())
    }

    /// Run an already resolved command.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::HelpUnavailable`] when help was requested but not
    /// found, a validation error, or the action's own error.
    pub async fn run(
        &self,
        descriptor: &CommandDescriptor,
        args: CommandArgs,
        logger: &dyn Logger,
    ) -> CliResult<()> {
        let span = command_span(descriptor.name());
        async move {
            if args.globals().help {
                return self.show_help(descriptor, logger);
            }

            let args = validate_structure(
                descriptor,
                args,
                self.settings.as_ref(),
                self.prompter.as_ref(),
            )
            .await?;
            descriptor
                .validate(&args)
                .map_err(CliError::CommandValidation)?;

            let ctx = CommandContext {
                engine: self,
                logger,
                globals: args.globals().clone(),
            };
            debug!("running command");
            descriptor.action().run(&ctx, &args).await
        }
        .instrument(span)
        .await
    }

    fn show_help(&self, descriptor: &CommandDescriptor, logger: &dyn Logger) -> CliResult<()> {
        let document = self.help.help_for(descriptor.name()).ok_or_else(|| {
            CliError::HelpUnavailable(format!(
                "no help is available for '{}'",
                descriptor.name()
            ))
        })?;
        logger.log_raw(document.trim_end());
        logger.log_raw("");
        logger.log_raw(&usage(descriptor));
        Ok(())
    }
}

fn command_span(name: &str) -> Span {
    info_span!("command", name, version = tenantctl_telemetry::build_version())
}

/// What a running command can reach.
pub struct CommandContext<'a> {
    engine: &'a ExecutionEngine,
    logger: &'a dyn Logger,
    globals: GlobalOptions,
}

impl<'a> CommandContext<'a> {
    /// Authentication state of the process.
    #[must_use]
    pub fn session(&self) -> &'a SessionContext {
        self.engine.client.session()
    }

    /// Authenticated HTTP client.
    #[must_use]
    pub const fn client(&self) -> &'a RequestClient {
        &self.engine.client
    }

    /// Settings store.
    #[must_use]
    pub fn settings(&self) -> &'a dyn SettingsStore {
        self.engine.settings.as_ref()
    }

    /// Microsoft Graph endpoint.
    #[must_use]
    pub const fn graph_url(&self) -> &'a Url {
        &self.engine.graph_url
    }

    /// Logger of this invocation.
    #[must_use]
    pub fn logger(&self) -> &'a dyn Logger {
        self.logger
    }

    /// Reserved flags of this invocation.
    #[must_use]
    pub const fn globals(&self) -> &GlobalOptions {
        &self.globals
    }

    /// Emit `value` on the primary output channel.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Failure`] when `value` cannot be represented as JSON.
    pub fn log(&self, value: impl Serialize) -> CliResult<()> {
        let value: Value = serde_json::to_value(value).map_err(CliError::failure)?;
        self.logger.log(value);
        Ok(())
    }

    /// Progress note shown with `--verbose` or `--debug`.
    pub fn verbose(&self, message: &str) {
        if self.globals.verbose || self.globals.debug {
            self.logger.log_to_stderr(message);
        }
    }

    /// Lookup disambiguation using the engine's settings and prompter.
    #[must_use]
    pub fn disambiguator(&self) -> Disambiguator<'a> {
        Disambiguator::new(self.engine.settings.as_ref(), self.engine.prompter.as_ref())
    }

    /// Ask the user to confirm a destructive action; `--force` answers yes.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Prompt`] when no answer can be obtained.
    pub async fn confirm(&self, message: &str) -> CliResult<bool> {
        if self.globals.force {
            return Ok(true);
        }
        self.engine.prompter.confirm(message).await
    }

    /// Run another command against the same logger.
    ///
    /// The nested command inherits `debug`, `verbose` and `force`.
    ///
    /// # Errors
    ///
    /// Returns the nested command's error unchanged.
    pub async fn invoke(&self, name: &str, args: CommandArgs) -> CliResult<()> {
        let args = args.inheriting(&self.globals);
        self.engine.execute(name, args, self.logger).await
    }

    /// Run another command and collect what it writes to the primary channel.
    ///
    /// Diagnostics of the nested command still reach this invocation's logger.
    ///
    /// # Errors
    ///
    /// Returns the nested command's error unchanged.
    pub async fn invoke_captured(&self, name: &str, args: CommandArgs) -> CliResult<CommandOutput> {
        let args = args.inheriting(&self.globals);
        self.engine.execute_captured(name, args, self.logger).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;
    use tenantctl_config::MemorySettings;

    use super::*;
    use crate::fakes::{RecordingLogger, ScriptedPrompter, StaticHelp};
    use crate::options::{OptionGroup, OptionSpec};
    use crate::registry::CommandAction;

    struct Emit(Value);

    #[async_trait]
    impl CommandAction for Emit {
        async fn run(&self, ctx: &CommandContext<'_>, _args: &CommandArgs) -> CliResult<()> {
            ctx.verbose("emitting");
            ctx.log(&self.0)
        }
    }

    struct Fail;

    #[async_trait]
    impl CommandAction for Fail {
        async fn run(&self, _ctx: &CommandContext<'_>, _args: &CommandArgs) -> CliResult<()> {
            Err(CliError::LookupNotFound("inner failure".into()))
        }
    }

    #[derive(Default)]
    struct Counted(AtomicUsize);

    #[async_trait]
    impl CommandAction for Counted {
        async fn run(&self, _ctx: &CommandContext<'_>, _args: &CommandArgs) -> CliResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Outer;

    #[async_trait]
    impl CommandAction for Outer {
        async fn run(&self, ctx: &CommandContext<'_>, args: &CommandArgs) -> CliResult<()> {
            let target = args.string("target").unwrap_or("inner");
            let output = ctx.invoke_captured(target, CommandArgs::new()).await?;
            ctx.log(json!({"captured": output.values()}))
        }
    }

    struct Forwarding;

    #[async_trait]
    impl CommandAction for Forwarding {
        async fn run(&self, ctx: &CommandContext<'_>, _args: &CommandArgs) -> CliResult<()> {
            ctx.invoke("inner", CommandArgs::new()).await
        }
    }

    struct Confirming;

    #[async_trait]
    impl CommandAction for Confirming {
        async fn run(&self, ctx: &CommandContext<'_>, _args: &CommandArgs) -> CliResult<()> {
            let confirmed = ctx.confirm("Are you sure?").await?;
            ctx.log(json!({"confirmed": confirmed}))
        }
    }

    fn engine(counted: Arc<Counted>, prompter: Arc<ScriptedPrompter>) -> CliResult<ExecutionEngine> {
        let mut registry = CommandRegistry::new();
        registry.register(CommandDescriptor::new(
            "inner",
            "emits a value",
            Arc::new(Emit(json!({"Id": "42"}))),
        ))?;
        registry.register(CommandDescriptor::new("broken", "fails", Arc::new(Fail)))?;
        registry.register(
            CommandDescriptor::new("outer", "captures", Arc::new(Outer))
                .option(OptionSpec::string("target")),
        )?;
        registry.register(CommandDescriptor::new("forward", "forwards", Arc::new(Forwarding)))?;
        registry.register(CommandDescriptor::new("remove", "confirms", Arc::new(Confirming)))?;
        registry.register(
            CommandDescriptor::new("counted", "counts runs", counted)
                .option(OptionSpec::string("id"))
                .option(OptionSpec::string("title"))
                .group(OptionGroup::RequireOne(&["id", "title"]))
                .validator(|args| {
                    if args.string("id") == Some("bad") {
                        Err("bad is not allowed".to_string())
                    } else {
                        Ok(())
                    }
                }),
        )?;

        let client = RequestClient::with_http(
            reqwest::Client::new(),
            Arc::new(SessionContext::disconnected()),
        );
        Ok(
            ExecutionEngine::new(registry, client, Arc::new(MemorySettings::new()))?
                .with_prompter(prompter)
                .with_help_source(Arc::new(StaticHelp::new(&[("inner", "# inner\nEmits.")]))),
        )
    }

    #[test]
    fn command_span_records_name_and_build_version() {
        let span = command_span("spo list get");
        assert!(span.has_field("name"));
        assert!(span.has_field("version"));
    }

    #[tokio::test]
    async fn validation_failures_never_reach_the_action() -> CliResult<()> {
        let counted = Arc::new(Counted::default());
        let engine = engine(counted.clone(), Arc::new(ScriptedPrompter::default()))?;
        let logger = RecordingLogger::default();

        let both = CommandArgs::new().with("id", "1").with("title", "t");
        let err = engine.execute("counted", both, &logger).await.expect_err("structural");
        assert!(matches!(err, CliError::StructuralValidation(_)));

        let bad = CommandArgs::new().with("id", "bad");
        let err = engine.execute("counted", bad, &logger).await.expect_err("command");
        assert!(matches!(err, CliError::CommandValidation(_)));

        engine
            .execute("counted", CommandArgs::new().with("id", "1"), &logger)
            .await?;
        assert_eq!(counted.0.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn capture_composition_returns_typed_values() -> CliResult<()> {
        let engine = engine(Arc::default(), Arc::new(ScriptedPrompter::default()))?;
        let logger = RecordingLogger::default();
        let verbose = GlobalOptions {
            verbose: true,
            ..GlobalOptions::default()
        };
        engine
            .execute("outer", CommandArgs::new().with_globals(verbose), &logger)
            .await?;
        assert_eq!(logger.values(), vec![json!({"captured": [{"Id": "42"}]})]);
        assert_eq!(logger.stderr(), vec!["emitting".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn nested_errors_propagate_unchanged() -> CliResult<()> {
        let engine = engine(Arc::default(), Arc::new(ScriptedPrompter::default()))?;
        let logger = RecordingLogger::default();
        let err = engine
            .execute("outer", CommandArgs::new().with("target", "broken"), &logger)
            .await
            .expect_err("inner failure");
        assert!(matches!(err, CliError::LookupNotFound(ref message) if message == "inner failure"));
        assert!(logger.values().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn fire_and_forget_shares_the_logger() -> CliResult<()> {
        let engine = engine(Arc::default(), Arc::new(ScriptedPrompter::default()))?;
        let logger = RecordingLogger::default();
        engine.execute("forward", CommandArgs::new(), &logger).await?;
        assert_eq!(logger.values(), vec![json!({"Id": "42"})]);
        Ok(())
    }

    #[tokio::test]
    async fn help_short_circuits_and_reports_missing_documents() -> CliResult<()> {
        let engine = engine(Arc::default(), Arc::new(ScriptedPrompter::default()))?;
        let logger = RecordingLogger::default();
        let help = GlobalOptions {
            help: true,
            ..GlobalOptions::default()
        };

        engine
            .execute("inner", CommandArgs::new().with_globals(help.clone()), &logger)
            .await?;
        assert!(logger.values().is_empty());
        assert!(logger.raw().first().is_some_and(|text| text.starts_with("# inner")));

        let err = engine
            .execute("broken", CommandArgs::new().with_globals(help), &logger)
            .await
            .expect_err("no help");
        assert!(matches!(err, CliError::HelpUnavailable(_)));
        Ok(())
    }

    #[tokio::test]
    async fn force_skips_confirmation_and_is_inherited() -> CliResult<()> {
        let prompter = Arc::new(ScriptedPrompter::default().confirming(false));
        let engine = engine(Arc::default(), prompter.clone())?;
        let logger = RecordingLogger::default();

        engine.execute("remove", CommandArgs::new(), &logger).await?;
        let forced = GlobalOptions {
            force: true,
            ..GlobalOptions::default()
        };
        engine
            .execute("remove", CommandArgs::new().with_globals(forced), &logger)
            .await?;

        assert_eq!(
            logger.values(),
            vec![json!({"confirmed": false}), json!({"confirmed": true})]
        );
        assert_eq!(prompter.calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_commands_are_reported() -> CliResult<()> {
        let engine = engine(Arc::default(), Arc::new(ScriptedPrompter::default()))?;
        let err = engine
            .execute("missing", CommandArgs::new(), &RecordingLogger::default())
            .await
            .expect_err("not registered");
        assert_eq!(err.to_string(), "command 'missing' was not found");
        Ok(())
    }
}
