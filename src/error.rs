// src/error.rs

//! Unified error handling for the change-detection engine.

use std::fmt;
use std::path::Path;

use thiserror::Error;

use crate::models::FailureKind;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Network or transport failure
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Upstream answered with something other than 200
    #[error("http status code {status}")]
    HttpStatus { status: u16 },

    /// Document could not be processed as HTML
    #[error("parse error: {0}")]
    Parse(String),

    /// Baseline read or write failed
    #[error("storage error at {path}: {source}")]
    Storage {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Rate-limit wait or request aborted by the batch deadline
    #[error("cancelled before completion")]
    Cancelled,

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A blocking worker panicked or was cancelled
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A git command failed
    #[error("git {command} failed: {message}")]
    Git { command: String, message: String },
}

impl AppError {
    /// Create a storage error for the given path.
    pub fn storage(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl fmt::Display) -> Self {
        Self::Parse(message.to_string())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a git command error.
    pub fn git(command: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Git {
            command: command.into(),
            message: message.to_string(),
        }
    }

    /// Classify the error for the batch failure list.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Request(_) | Self::Url(_) => FailureKind::Request,
            Self::HttpStatus { .. } => FailureKind::HttpStatus,
            Self::Parse(_) => FailureKind::Parse,
            Self::Storage { .. } | Self::Io(_) => FailureKind::Storage,
            Self::Cancelled => FailureKind::Cancelled,
            _ => FailureKind::Other,
        }
    }
}
