//! Error types for telemetry operations.

use thiserror::Error;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised while configuring diagnostics.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The level directive could not be parsed.
    #[error("invalid log filter '{directive}'")]
    InvalidFilter {
        /// Directive as supplied.
        directive: String,
        /// Parser failure.
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    /// A global subscriber is already installed.
    #[error("failed to install tracing subscriber")]
    SubscriberInstall {
        /// Underlying tracing subscriber error.
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn invalid_filter_names_the_directive() {
        let err = tracing_subscriber::EnvFilter::try_new("tenantctl=loud")
            .map_err(|source| TelemetryError::InvalidFilter {
                directive: "tenantctl=loud".to_string(),
                source,
            })
            .expect_err("directive is malformed");
        assert_eq!(err.to_string(), "invalid log filter 'tenantctl=loud'");
        assert!(err.source().is_some());
    }
}
