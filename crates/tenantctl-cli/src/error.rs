//! Error taxonomy shared by the pipeline and every command.

use thiserror::Error;

/// Upstream failure reduced to a single user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct NormalizedError {
    /// Message shown to the user.
    pub message: String,
    /// HTTP status of the failed response, when there was one.
    pub status: Option<u16>,
    transient: bool,
}

impl NormalizedError {
    /// Failure that carries no HTTP status.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            transient: false,
        }
    }

    /// Failure of an HTTP exchange that completed with `status`.
    #[must_use]
    pub fn with_status(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
            transient: matches!(status, 408 | 429 | 502 | 503 | 504),
        }
    }

    /// Mark a transport-level failure (timeout, refused connection) as transient.
    #[must_use]
    pub const fn transient(mut self, transient: bool) -> Self {
        self.transient = transient;
        self
    }

    /// Whether a retry could plausibly succeed. Advisory only: nothing in the
    /// request layer retries on its own.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        self.transient
    }
}

/// CLI-level error type. Every failed invocation surfaces exactly one of these.
#[derive(Debug, Error)]
pub enum CliError {
    /// Exclusivity, required-one-of, unknown or mistyped options.
    #[error("{0}")]
    StructuralValidation(String),
    /// A command-specific predicate rejected the arguments.
    #[error("{0}")]
    CommandValidation(String),
    /// A lookup by name matched nothing.
    #[error("{0}")]
    LookupNotFound(String),
    /// A lookup by name matched several items and prompting is disabled.
    #[error("{0}")]
    LookupAmbiguity(String),
    /// A remote API rejected the request.
    #[error(transparent)]
    Upstream(NormalizedError),
    /// No usable credential for the target resource.
    #[error("{0}")]
    Authentication(String),
    /// No command matches the requested name.
    #[error("command '{name}' was not found")]
    CommandNotFound {
        /// Name as typed by the user.
        name: String,
    },
    /// A prefix matches several commands.
    #[error("command '{name}' is ambiguous; did you mean one of: {}", candidates.join(", "))]
    AmbiguousCommand {
        /// Name as typed by the user.
        name: String,
        /// Full names of the matching commands.
        candidates: Vec<String>,
    },
    /// Help was requested but no help document exists for the command.
    #[error("{0}")]
    HelpUnavailable(String),
    /// An interactive prompt could not be shown or answered.
    #[error("{0}")]
    Prompt(String),
    /// Any other operational failure.
    #[error("{0:#}")]
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Structural validation failure with `message`.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::StructuralValidation(message.into())
    }

    /// Operational failure wrapping `error`.
    pub fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    /// Whether the failure happened before any network call could be made
    /// because of the arguments themselves.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::StructuralValidation(_) | Self::CommandValidation(_)
        )
    }
}
