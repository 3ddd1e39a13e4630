//! Error types for the mirrorfs content mirroring engine.
//!
//! Errors split into two classes. Recoverable errors (`Encoding`, `Decoding`, `Io`,
//! `Trash`, `InvalidTransaction`, `Config`) are returned or routed to a reflection's error callback.
//! Path resolution failures are programmer errors: they are raised as panics through
//! [`path_resolution`] and never travel through a callback.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Codec failures reported by [`crate::content::Codec`] implementations
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("{type_name} couldn't be encoded: {reason}")]
    Encode {
        type_name: &'static str,
        reason: String,
    },

    #[error("{type_name} couldn't be decoded: {reason}")]
    Decode {
        type_name: &'static str,
        reason: String,
    },
}

impl CodecError {
    pub fn encode(type_name: &'static str, reason: impl ToString) -> Self {
        CodecError::Encode {
            type_name,
            reason: reason.to_string(),
        }
    }

    pub fn decode(type_name: &'static str, reason: impl ToString) -> Self {
        CodecError::Decode {
            type_name,
            reason: reason.to_string(),
        }
    }
}

/// Engine errors
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Path resolution failed: {0}")]
    PathResolution(String),

    #[error("Encoding failed for {path:?}: {source}")]
    Encoding {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    #[error("Decoding failed for {path:?}: {source}")]
    Decoding {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    #[error("Filesystem error during {operation} at {path:?}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Trash error at {path:?}: {source}")]
    Trash {
        path: PathBuf,
        #[source]
        source: trash::Error,
    },

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Watch error: {0}")]
    Watch(String),
}

impl MirrorError {
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MirrorError::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub fn trash(path: impl Into<PathBuf>, source: trash::Error) -> Self {
        MirrorError::Trash {
            path: path.into(),
            source,
        }
    }

    /// Whether the error may be reported and recovered from
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, MirrorError::PathResolution(_))
    }
}

impl From<std::io::Error> for MirrorError {
    fn from(err: std::io::Error) -> Self {
        MirrorError::Io {
            operation: "io",
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<config::ConfigError> for MirrorError {
    fn from(err: config::ConfigError) -> Self {
        MirrorError::Config(err.to_string())
    }
}

impl From<notify::Error> for MirrorError {
    fn from(err: notify::Error) -> Self {
        MirrorError::Watch(err.to_string())
    }
}

/// Error callback attached to reflections
pub type ErrorHandler = Arc<dyn Fn(&MirrorError) + Send + Sync>;

/// Abort on a path resolution failure.
///
/// Missing identities, types without an extension, and files standing where a directory
/// must be are invariant violations of the content description, not runtime conditions.
#[track_caller]
pub fn path_resolution(message: impl Into<String>) -> ! {
    let error = MirrorError::PathResolution(message.into());
    tracing::error!(error = %error, "Unrecoverable path resolution failure");
    panic!("{}", error)
}
