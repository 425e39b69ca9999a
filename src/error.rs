//! Error types for Log2Mongo
//!
//! This module defines all error types used throughout the appender.
//! It provides a unified error handling system with proper error chaining and
//! detailed error messages for debugging.

use thiserror::Error;

/// Main error type for Log2Mongo operations
#[derive(Error, Debug)]
pub enum Log2MongoError {
    /// Configuration-related errors (bad URI, bad timezone, bad parameters)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Initialization errors
    #[error("Initialization error: {0}")]
    InitializationError(String),

    /// Per-event formatting errors
    #[error("Format error: {0}")]
    FormatError(String),

    /// Sink-related errors
    #[error("Sink error: {source}")]
    Sink {
        #[from]
        source: crate::sinks::SinkError,
    },

    /// Shutdown-related errors
    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    /// Tracing subscriber errors
    #[error("Tracing error: {0}")]
    TracingError(String),
}

/// Result type alias for Log2Mongo operations
pub type Result<T> = std::result::Result<T, Log2MongoError>;

impl Log2MongoError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a new format error
    pub fn format<S: Into<String>>(msg: S) -> Self {
        Self::FormatError(msg.into())
    }

    /// Create a new shutdown error
    pub fn shutdown<S: Into<String>>(msg: S) -> Self {
        Self::ShutdownError(msg.into())
    }

    /// Create a new tracing error
    pub fn tracing<S: Into<String>>(msg: S) -> Self {
        Self::TracingError(msg.into())
    }

    /// Get the error category for logging purposes
    pub fn category(&self) -> &'static str {
        match self {
            Self::ConfigError(_) => "config",
            Self::InitializationError(_) => "initialization",
            Self::FormatError(_) => "format",
            Self::Sink { .. } => "sink",
            Self::ShutdownError(_) => "shutdown",
            Self::TracingError(_) => "tracing",
        }
    }
}
