//! # Design
//!
//! - Centralize application-level errors for bootstrap and serving.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: viddl_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: viddl_telemetry::TelemetryError,
    },
    /// The artifact directory could not be prepared.
    #[error("artifact storage operation failed")]
    Storage {
        /// Operation identifier.
        operation: &'static str,
        /// Source fsops error.
        source: viddl_fsops::FsOpsError,
    },
    /// API server operations failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        source: viddl_api::ApiServerError,
    },
}

impl AppError {
    pub(crate) const fn config(operation: &'static str, source: viddl_config::ConfigError) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: viddl_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn storage(operation: &'static str, source: viddl_fsops::FsOpsError) -> Self {
        Self::Storage { operation, source }
    }

    pub(crate) const fn api_server(
        operation: &'static str,
        source: viddl_api::ApiServerError,
    ) -> Self {
        Self::ApiServer { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn app_error_keeps_messages_constant() {
        let err = AppError::api_server(
            "api_server.serve",
            viddl_api::ApiServerError::Serve {
                source: std::io::Error::other("lost"),
            },
        );
        assert_eq!(err.to_string(), "api server operation failed");
        assert!(err.source().is_some());
    }
}
