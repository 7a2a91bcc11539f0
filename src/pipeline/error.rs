//! Pipeline-specific error types.

use crate::corpus::CorpusError;
use crate::pipeline::pipe::PipeKind;
use serde::Serialize;
use thiserror::Error;

/// Errors raised by a single pipe endpoint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipeError {
    /// The producer went away without sending end-of-stream.
    #[error("stream aborted: producer terminated without closing the pipe")]
    Aborted,

    /// A blocking read or write was interrupted by pipeline cancellation.
    #[error("cancelled")]
    Cancelled,

    /// The producer end was already closed.
    #[error("write after close")]
    Closed,

    /// A character pipe was fed bytes that do not decode as UTF-8.
    #[error("invalid UTF-8 in character stream: {0}")]
    InvalidUtf8(String),

    /// A value could not be encoded for a character pipe.
    #[error("cannot encode value as JSON: {0}")]
    Encoding(String),

    /// A pipe of one kind was used where another kind is required.
    #[error("expected a {expected} pipe, found a {found} pipe")]
    KindMismatch { expected: PipeKind, found: PipeKind },
}

/// Coarse classification of a [`ModuleError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    Configuration,
    Deserialization,
    Index,
    AlgorithmContractViolation,
    Pipe,
    Io,
    Lifecycle,
}

/// Errors that abort a module invocation.
///
/// Every variant names the module instance and the property, field or port
/// involved, so the message is diagnosable without the source.
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("[{module}] configuration error on '{property}': {message}")]
    Configuration {
        module: String,
        property: String,
        message: String,
    },

    #[error("[{module}] cannot deserialize {field}: {message}")]
    Deserialization {
        module: String,
        field: String,
        message: String,
    },

    #[error("[{module}] corpus index error: {source}")]
    Index {
        module: String,
        #[source]
        source: CorpusError,
    },

    #[error("[{module}] {algorithm} violated its contract: {message}")]
    AlgorithmContractViolation {
        module: String,
        algorithm: String,
        message: String,
    },

    #[error("[{module}] pipe error on port '{port}': {source}")]
    Pipe {
        module: String,
        port: String,
        #[source]
        source: PipeError,
    },

    #[error("[{module}] IO error on '{path}': {source}")]
    Io {
        module: String,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("[{module}] process() was already invoked")]
    AlreadyProcessed { module: String },

    #[error("[{module}] process() invoked before properties were applied")]
    NotConfigured { module: String },
}

impl ModuleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModuleError::Configuration { .. } => ErrorKind::Configuration,
            ModuleError::Deserialization { .. } => ErrorKind::Deserialization,
            ModuleError::Index { .. } => ErrorKind::Index,
            ModuleError::AlgorithmContractViolation { .. } => {
                ErrorKind::AlgorithmContractViolation
            }
            ModuleError::Pipe { .. } => ErrorKind::Pipe,
            ModuleError::Io { .. } => ErrorKind::Io,
            ModuleError::AlreadyProcessed { .. } | ModuleError::NotConfigured { .. } => {
                ErrorKind::Lifecycle
            }
        }
    }

    /// Name of the module instance that raised the error.
    pub fn module(&self) -> &str {
        match self {
            ModuleError::Configuration { module, .. }
            | ModuleError::Deserialization { module, .. }
            | ModuleError::Index { module, .. }
            | ModuleError::AlgorithmContractViolation { module, .. }
            | ModuleError::Pipe { module, .. }
            | ModuleError::Io { module, .. }
            | ModuleError::AlreadyProcessed { module }
            | ModuleError::NotConfigured { module } => module,
        }
    }

    pub fn configuration(
        module: impl Into<String>,
        property: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ModuleError::Configuration {
            module: module.into(),
            property: property.into(),
            message: message.into(),
        }
    }

    pub fn pipe(module: impl Into<String>, port: impl Into<String>, source: PipeError) -> Self {
        ModuleError::Pipe {
            module: module.into(),
            port: port.into(),
            source,
        }
    }
}

pub type ModuleResult<T> = std::result::Result<T, ModuleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_names_module_and_property() {
        let err = ModuleError::configuration("reader", "inputfile", "required property is not set");
        let msg = err.to_string();
        assert!(msg.contains("reader"));
        assert!(msg.contains("inputfile"));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_index_error_wraps_corpus_error() {
        let err = ModuleError::Index {
            module: "clustering".to_string(),
            source: CorpusError::CountsNotSet,
        };
        assert_eq!(err.kind(), ErrorKind::Index);
        assert_eq!(err.module(), "clustering");
    }

    #[test]
    fn test_kind_mismatch_display() {
        let err = PipeError::KindMismatch {
            expected: PipeKind::Bytes,
            found: PipeKind::Chars,
        };
        assert_eq!(err.to_string(), "expected a bytes pipe, found a chars pipe");
    }
}
