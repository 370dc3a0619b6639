//! Error types shared by every job.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while a job works on the filesystem.
#[derive(Debug, Error)]
pub enum JobError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// The destination already exists.
    #[error("File exists: {path}")]
    AlreadyExists { path: PathBuf },

    /// A directory was expected.
    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backend cannot perform the request.
    #[error("Operation not supported: {message}")]
    Unsupported { message: String },

    /// A search pattern failed to compile.
    #[error("Invalid pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },

    /// The job was started twice.
    #[error("Job {id} was already started")]
    AlreadyStarted { id: u64 },

    /// The worker pool could not be created.
    #[error("Failed to start worker pool: {source}")]
    Executor {
        #[source]
        source: std::io::Error,
    },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl JobError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            std::io::ErrorKind::AlreadyExists => Self::AlreadyExists { path },
            std::io::ErrorKind::NotADirectory => Self::NotADirectory { path },
            _ => Self::Io { path, source },
        }
    }

    /// Create an unsupported-operation error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /// Whether this error means the destination is already taken.
    pub fn is_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// The path this error refers to, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::PermissionDenied { path }
            | Self::NotFound { path }
            | Self::AlreadyExists { path }
            | Self::NotADirectory { path }
            | Self::Io { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Result type used throughout the job crates.
pub type JobResult<T> = Result<T, JobError>;

/// How bad an error reported through a job is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    /// Reported, the job carries on. Never retried.
    Mild,
    /// A single item failed; the handler may ask for a retry.
    Moderate,
    /// The job cannot usefully continue unless the handler asks for a retry.
    Severe,
}

impl ErrorSeverity {
    /// Whether the handler's answer can trigger a retry.
    pub fn is_recoverable(self) -> bool {
        !matches!(self, Self::Mild)
    }
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mild => write!(f, "mild"),
            Self::Moderate => write!(f, "moderate"),
            Self::Severe => write!(f, "severe"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_error_io() {
        let err = JobError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, JobError::PermissionDenied { .. }));

        let err = JobError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::AlreadyExists, "exists"),
        );
        assert!(err.is_exists());
        assert_eq!(err.path(), Some(Path::new("/test/path")));
    }

    #[test]
    fn test_severity_recoverable() {
        assert!(!ErrorSeverity::Mild.is_recoverable());
        assert!(ErrorSeverity::Moderate.is_recoverable());
        assert!(ErrorSeverity::Severe.is_recoverable());
        assert!(ErrorSeverity::Mild < ErrorSeverity::Severe);
    }
}
