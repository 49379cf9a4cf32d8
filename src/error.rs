//! Error types and handling for the `EcoGares` service

use thiserror::Error;

use crate::station::StationId;

/// Main error type for the `EcoGares` service
#[derive(Error, Debug)]
pub enum EcoGaresError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Open-data upstream errors (network, HTTP status, payload shape)
    #[error("Upstream error: {message}")]
    Upstream { message: String },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Unknown station id
    #[error("Station {id} not found")]
    StationNotFound { id: StationId },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl EcoGaresError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new upstream error
    pub fn upstream<S: Into<String>>(message: S) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            EcoGaresError::Config { .. } => {
                "Configuration error. Please check your config file.".to_string()
            }
            EcoGaresError::Upstream { .. } => {
                "Open-data services are unreachable. Showing the data that could be loaded."
                    .to_string()
            }
            EcoGaresError::Validation { message } => {
                format!("Invalid input: {message}")
            }
            EcoGaresError::StationNotFound { id } => format!("Unknown station {id}"),
            EcoGaresError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
        }
    }
}

impl From<reqwest::Error> for EcoGaresError {
    fn from(err: reqwest::Error) -> Self {
        EcoGaresError::upstream(err.to_string())
    }
}

impl From<reqwest_middleware::Error> for EcoGaresError {
    fn from(err: reqwest_middleware::Error) -> Self {
        EcoGaresError::upstream(err.to_string())
    }
}

impl From<serde_json::Error> for EcoGaresError {
    fn from(err: serde_json::Error) -> Self {
        EcoGaresError::upstream(format!("malformed payload: {err}"))
    }
}
