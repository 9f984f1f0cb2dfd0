//! Error types for theme generation.
//!
//! Copyright (c) 2025 Posit, PBC

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while generating a theme stylesheet
#[derive(Debug, Error)]
pub enum ThemeError {
    /// The style compiler rejected its input. The message is the compiler's
    /// diagnostic, passed through unmodified.
    #[error("Style compilation failed: {message}")]
    CompilationFailed { message: String },

    /// No usable compiler backend could be found
    #[error("Style compiler not available: {0}")]
    CompilerUnavailable(String),

    /// A required input could not be read
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The generated theme could not be written
    #[error("Failed to write theme to {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A user-supplied glob or regular expression is malformed
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// The configuration file could not be parsed
    #[error("Invalid theme configuration: {message}")]
    InvalidConfig { message: String },

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ThemeError {
    pub(crate) fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ThemeError::Read {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ThemeError::Write {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ThemeError>;
