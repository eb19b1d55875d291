//! Reasoning-service error type
//!
//! Every failure a stage can observe while talking to the reasoning service is
//! mapped onto [`BackendError`]. Stages never propagate it: they record it in
//! the pipeline state and substitute their fallback output.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors that can occur while calling the reasoning service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BackendError {
    /// Provider rejected the request
    ApiError {
        message: String,
        status_code: Option<u16>,
    },

    /// Request did not finish within the configured timeout (in seconds)
    TimeoutError { seconds: u64 },

    /// Provider answered but the answer carried no usable text
    EmptyResponse,

    /// Missing credentials, unknown provider key, bad endpoint
    ConfigurationError { message: String },

    /// Transport-level failure
    NetworkError { message: String },

    /// Generic error for other cases
    Other { message: String },
}

impl BackendError {
    pub fn other(message: impl Into<String>) -> Self {
        BackendError::Other {
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BackendError::TimeoutError { .. })
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::ApiError {
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "API error ({}): {}", code, message)
                } else {
                    write!(f, "API error: {}", message)
                }
            }
            BackendError::TimeoutError { seconds } => {
                write!(f, "Request timed out after {} seconds", seconds)
            }
            BackendError::EmptyResponse => write!(f, "Reasoning service returned an empty response"),
            BackendError::ConfigurationError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            BackendError::NetworkError { message } => {
                write!(f, "Network error: {}", message)
            }
            BackendError::Other { message } => {
                write!(f, "Error: {}", message)
            }
        }
    }
}

impl std::error::Error for BackendError {}
