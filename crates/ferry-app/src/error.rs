//! Application-level errors for the worker binary.

use thiserror::Error;

/// Result type for application wiring.
pub type AppResult<T> = Result<T, AppError>;

/// Errors surfaced by the worker boot sequence and request loop.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration loading or validation failed.
    #[error("app configuration failure")]
    Config {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Underlying configuration error.
        source: ferry_config::ConfigError,
    },
    /// Telemetry installation failed.
    #[error("app telemetry failure")]
    Telemetry {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Underlying error.
        source: anyhow::Error,
    },
    /// The stdio transport broke while reading requests.
    #[error("app transport failure")]
    Transport {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Underlying error.
        source: anyhow::Error,
    },
    /// The forwarding core failed to deliver replies.
    #[error("app forwarding failure")]
    Forward {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Underlying forwarding error.
        source: ferry_forward::ForwardError,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: ferry_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) fn telemetry(operation: &'static str, source: anyhow::Error) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) fn transport(operation: &'static str, source: anyhow::Error) -> Self {
        Self::Transport { operation, source }
    }

    pub(crate) const fn forward(
        operation: &'static str,
        source: ferry_forward::ForwardError,
    ) -> Self {
        Self::Forward { operation, source }
    }
}
