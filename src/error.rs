//! Error handling for textpipe
//!
//! This module defines the crate-level error type and a Result alias used by
//! configuration loading and pipeline assembly. Errors raised inside a running
//! module are [`ModuleError`](crate::pipeline::ModuleError)s and are wrapped
//! here when they cross the orchestrator boundary.

use crate::pipeline::ModuleError;
use thiserror::Error;

/// Main error type for textpipe operations
#[derive(Error, Debug)]
pub enum TextPipeError {
    /// Errors related to loading or validating a pipeline description
    #[error("Configuration error: {0}")]
    Config(String),

    /// A module failed during assembly or processing
    #[error("Module error: {0}")]
    Module(#[from] ModuleError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<TextPipeError>,
    },
}

impl TextPipeError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        TextPipeError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost module error, if this error was caused by one.
    pub fn module_error(&self) -> Option<&ModuleError> {
        match self {
            TextPipeError::Module(e) => Some(e),
            TextPipeError::WithContext { source, .. } => source.module_error(),
            _ => None,
        }
    }
}

/// Result type alias for textpipe operations
pub type Result<T> = std::result::Result<T, TextPipeError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, ModuleError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| TextPipeError::Module(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| TextPipeError::Module(e).with_context(f()))
    }
}
