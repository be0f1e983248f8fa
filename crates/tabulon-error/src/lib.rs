//! The error taxonomy from spec.md §7, with stable operator-facing codes.
//!
//! Every variant maps to exactly one of the eight named kinds. `code()`
//! returns the exact string an operator can grep for in logs; `exit_code()`
//! maps to the process exit codes from spec.md §6 (0 success, 2 user error,
//! 3 validation, 4 IO, 5 internal) plus 130 for cooperative cancellation.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TabulonError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing error at {file}:{line}: {reason}")]
    Parsing {
        file: String,
        line: u64,
        reason: String,
    },

    #[error("schema mismatch in schema {schema_id}: {reason}")]
    SchemaMismatch { schema_id: String, reason: String },

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("resource limit exceeded: {resource} (limit {limit})")]
    ResourceLimitExceeded { resource: String, limit: String },

    #[error("sandbox violation: path {0} escapes the allowed root")]
    SandboxViolation(PathBuf),

    #[error("job cancelled by user")]
    UserAbort,
}

impl TabulonError {
    /// The stable code named in spec.md §7, for operators to grep logs by.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Io { .. } => "IO_ERROR",
            Self::Parsing { .. } => "PARSING_ERROR",
            Self::SchemaMismatch { .. } => "SCHEMA_MISMATCH",
            Self::Storage(_) => "STORAGE_FAILURE",
            Self::ResourceLimitExceeded { .. } => "RESOURCE_LIMIT_EXCEEDED",
            Self::SandboxViolation(_) => "SANDBOX_VIOLATION",
            Self::UserAbort => "USER_ABORT",
        }
    }

    /// Exit code per spec.md §6's verb table, with 130 added for `USER_ABORT`
    /// (SIGINT convention; the table only commits codes for the five verbs'
    /// direct success/failure outcomes, not for cooperative cancellation).
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::SandboxViolation(_) => 2,
            Self::SchemaMismatch { .. } => 3,
            Self::Io { .. } => 4,
            Self::Parsing { .. } | Self::Storage(_) | Self::ResourceLimitExceeded { .. } => 5,
            Self::UserAbort => 130,
        }
    }

    /// Whether this error is retryable at the block boundary (only `IO_ERROR`
    /// per spec.md §7's propagation rules).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

pub type Result<T> = std::result::Result<T, TabulonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable_strings() {
        assert_eq!(TabulonError::Config("x".into()).code(), "CONFIG_ERROR");
        assert_eq!(TabulonError::UserAbort.code(), "USER_ABORT");
    }

    #[test]
    fn only_io_errors_are_retryable() {
        assert!(!TabulonError::UserAbort.is_retryable());
        let io = TabulonError::Io {
            path: PathBuf::from("x"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "boom"),
        };
        assert!(io.is_retryable());
    }

    #[test]
    fn exit_codes_match_spec_table() {
        assert_eq!(TabulonError::Config("x".into()).exit_code(), 2);
        assert_eq!(
            TabulonError::SchemaMismatch {
                schema_id: "s".into(),
                reason: "r".into()
            }
            .exit_code(),
            3
        );
        assert_eq!(
            TabulonError::Io {
                path: PathBuf::from("x"),
                source: std::io::Error::new(std::io::ErrorKind::Other, "boom")
            }
            .exit_code(),
            4
        );
        assert_eq!(TabulonError::UserAbort.exit_code(), 130);
    }
}
