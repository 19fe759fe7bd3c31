//! Centralized error types for MailLens.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the MailLens library.
#[derive(Error, Debug)]
pub enum MailLensError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The top-level message could not be parsed. Fatal for that message only.
    #[error("Failed to parse '{filename}': {reason}")]
    Parse { filename: String, reason: String },

    /// A single attachment could not be turned into text.
    ///
    /// Never escapes the pipeline: it is converted into a placeholder string.
    #[error("Could not extract {format} text: {reason}")]
    Extraction { format: &'static str, reason: String },

    /// Invalid classifier input, e.g. an empty category name.
    #[error("Classifier configuration error: {0}")]
    ClassifierConfig(String),

    /// The embedding provider failed after all retries.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The configuration file or a categories file is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failures reported by an embedding provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider could not be reached or kept failing until retries ran out.
    #[error("Embedding provider unavailable: {0}")]
    Unavailable(String),

    /// The per-call deadline passed before a response arrived.
    #[error("Embedding call exceeded its deadline after {attempts} attempt(s)")]
    DeadlineExceeded { attempts: usize },

    /// The caller cancelled the call.
    #[error("Embedding call cancelled")]
    Cancelled,

    /// The provider answered with something unusable.
    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),
}

/// Convenience alias for `Result<T, MailLensError>`.
pub type Result<T> = std::result::Result<T, MailLensError>;

impl MailLensError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a `Parse` variant for the given file.
    pub fn parse(filename: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            filename: filename.into(),
            reason: reason.into(),
        }
    }

    /// Create an `Extraction` variant for the given format.
    pub fn extraction(format: &'static str, reason: impl ToString) -> Self {
        Self::Extraction {
            format,
            reason: reason.to_string(),
        }
    }
}
