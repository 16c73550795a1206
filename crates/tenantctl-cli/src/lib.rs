#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::redundant_pub_crate)]

//! Command-line client for managing a cloud tenant.
//!
//! Layout:
//! - `options.rs` / `validate.rs`: option contracts, argument parsing and validation
//! - `registry.rs` / `engine.rs`: command descriptors, resolution and the execution pipeline
//! - `request.rs`: authenticated HTTP client and upstream error normalization
//! - `disambiguation.rs` / `prompt.rs`: choosing among lookup results, interactive answers
//! - `output.rs` / `help.rs`: rendering, capture and help text
//! - `commands/`: shipped commands grouped by area
//! - `cli.rs`: process flags and exit codes; `main.rs` delegates to `run()`

mod cli;
pub mod commands;
pub mod disambiguation;
pub mod engine;
pub mod error;
pub mod help;
pub mod options;
pub mod output;
pub mod prompt;
pub mod registry;
pub mod request;
pub mod validate;

#[cfg(any(test, feature = "test-support"))]
pub mod fakes;

pub use cli::run;
pub use commands::{default_registry, register_all};
pub use disambiguation::{Disambiguator, LookupResult};
pub use engine::{CommandContext, ExecutionEngine};
pub use error::{CliError, CliResult, NormalizedError};
pub use options::{CommandArgs, GlobalOptions, OptionGroup, OptionKind, OptionSpec, OptionValue};
pub use output::{CaptureLogger, CommandOutput, ConsoleLogger, Logger};
pub use prompt::{Prompter, TerminalPrompter};
pub use registry::{CommandAction, CommandDescriptor, CommandRegistry};
pub use request::{RequestClient, RequestDescriptor, UpstreamFailure, normalize_error};
