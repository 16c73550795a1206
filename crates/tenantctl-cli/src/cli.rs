//! Process entry point: flag parsing, dependency wiring and exit codes.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tenantctl_auth::SessionContext;
use tenantctl_config::{FileSettings, SettingsExt, defaults};
use tenantctl_telemetry::{LogFormat, LoggingConfig, init_logging, level_for};
use url::Url;

use crate::commands::default_registry;
use crate::engine::{DEFAULT_GRAPH_URL, ExecutionEngine};
use crate::error::{CliError, CliResult};
use crate::help::{FileHelpSource, command_list};
use crate::options::CommandArgs;
use crate::output::ConsoleLogger;
use crate::request::RequestClient;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const TOKEN_CACHE_FILE_NAME: &str = ".tenantctl-tokens.json";

#[derive(Debug, Parser)]
#[command(
    name = "tenantctl",
    about = "Manage Microsoft 365 tenants from the command line",
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Cli {
    /// Token cache written by the auth service.
    #[arg(long, env = "TENANTCTL_TOKEN_CACHE")]
    token_cache: Option<PathBuf>,
    /// Settings document read and written by `cli config`.
    #[arg(long, env = "TENANTCTL_SETTINGS_FILE")]
    settings_file: Option<PathBuf>,
    /// Directory holding per-command help documents.
    #[arg(long, env = "TENANTCTL_HELP_DIR")]
    help_dir: Option<PathBuf>,
    /// Microsoft Graph endpoint.
    #[arg(long, env = "TENANTCTL_GRAPH_URL", default_value = DEFAULT_GRAPH_URL)]
    graph_url: Url,
    /// Per-request timeout in seconds.
    #[arg(long, env = "TENANTCTL_HTTP_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,
    /// Command words followed by command options.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args = 0..)]
    argv: Vec<String>,
}

/// Parse the process arguments, run the requested command and return the exit code.
pub async fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return 1;
        }
    };

    let debug = cli.argv.iter().any(|token| token == "--debug");
    let verbose = cli.argv.iter().any(|token| token == "--verbose");
    let format = LogFormat::from_env_value(env::var("TENANTCTL_LOG_FORMAT").ok().as_deref());
    if let Err(err) = init_logging(&LoggingConfig {
        level: level_for(debug, verbose),
        format,
        build_version: env!("CARGO_PKG_VERSION"),
    }) {
        eprintln!("warning: {err}");
    }

    match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {err}");
            1
        }
    }
}

fn home_file(name: &str) -> PathBuf {
    env::var_os("HOME")
        .map_or_else(|| PathBuf::from("."), PathBuf::from)
        .join(name)
}

/// Leading tokens that do not look like options are command words.
fn split_command(argv: &[String]) -> (Vec<&str>, &[String]) {
    let boundary = argv
        .iter()
        .position(|token| token.starts_with('-'))
        .unwrap_or(argv.len());
    let words = argv[..boundary].iter().map(String::as_str).collect();
    (words, &argv[boundary..])
}

async fn dispatch(cli: Cli) -> CliResult<()> {
    let settings_path = cli
        .settings_file
        .unwrap_or_else(|| home_file(defaults::SETTINGS_FILE_NAME));
    let token_path = cli
        .token_cache
        .unwrap_or_else(|| home_file(TOKEN_CACHE_FILE_NAME));

    let settings = Arc::new(FileSettings::load(settings_path).map_err(CliError::failure)?);
    let session = Arc::new(SessionContext::from_cache_file(&token_path).map_err(CliError::failure)?);
    let client = RequestClient::new(session, Duration::from_secs(cli.timeout))?;

    let mut engine =
        ExecutionEngine::new(default_registry()?, client, settings.clone())?.with_graph_url(cli.graph_url);
    if let Some(dir) = cli.help_dir {
        engine = engine.with_help_source(Arc::new(FileHelpSource::new(dir)));
    }

    let (words, tokens) = split_command(&cli.argv);
    if words.is_empty() {
        let listing = command_list(engine.registry());
        if tokens.iter().any(|token| token == "--help" || token == "-h") {
            println!("{listing}");
            return Ok(());
        }
        eprintln!("{listing}");
        return Err(CliError::validation("no command specified"));
    }

    let descriptor = engine.resolve(&words.join(" "))?;
    let args = CommandArgs::parse(
        tokens,
        descriptor.options(),
        descriptor.allows_unknown_options(),
    )?;
    let mode = args
        .globals()
        .output
        .unwrap_or_else(|| settings.output_mode());
    engine.run(descriptor, args, &ConsoleLogger::new(mode)).await
}
