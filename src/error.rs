//! Failure taxonomy for the intake pipeline.
//!
//! Every failure ends only the upload that caused it. The HTTP layer maps
//! [`ErrorKind`] onto a status code; the detail string goes into the
//! response body and the log line.

use serde::Serialize;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The error type returned by every pipeline stage.
#[derive(Error, Debug)]
pub enum IntakeError {
    /// Declared or actual size exceeds the configured maximum.
    #[error("payload of {size} bytes exceeds the maximum of {max} bytes")]
    PayloadTooLarge { size: u64, max: u64 },

    /// The submission carried no file field.
    #[error("no '{0}' field in the submission")]
    MissingFile(String),

    /// Neither known root marker was found.
    #[error("unsupported XML type: no <pfsense> or <opnsense> root element")]
    UnsupportedDialect,

    /// Recognized dialect, but not well-formed XML of the expected shape.
    #[error("{dialect} parse error: {reason}")]
    MalformedConfig { dialect: String, reason: String },

    /// Well-formed, but `system/hostname` is empty or absent.
    #[error("missing hostname in {0} config")]
    MissingHostname(String),

    /// The hostname cannot be used as a path component.
    #[error("hostname {0:?} is not a safe storage name")]
    InvalidHostname(String),

    #[error("failed to create directory {path}: {source}")]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Fieldless mirror of [`IntakeError`], for matching and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    PayloadTooLarge,
    MissingFile,
    UnsupportedDialect,
    MalformedConfig,
    MissingHostname,
    InvalidHostname,
    DirectoryCreateFailed,
    WriteFailed,
}

impl ErrorKind {
    /// Machine-readable code used in HTTP error bodies.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::PayloadTooLarge => "payload_too_large",
            ErrorKind::MissingFile => "missing_file",
            ErrorKind::UnsupportedDialect => "unsupported_dialect",
            ErrorKind::MalformedConfig => "malformed_config",
            ErrorKind::MissingHostname => "missing_hostname",
            ErrorKind::InvalidHostname => "invalid_hostname",
            ErrorKind::DirectoryCreateFailed => "directory_create_failed",
            ErrorKind::WriteFailed => "write_failed",
        }
    }

    /// True when the uploader sent something we will never accept.
    /// False for storage-side failures.
    pub fn is_client_error(self) -> bool {
        !matches!(
            self,
            ErrorKind::DirectoryCreateFailed | ErrorKind::WriteFailed
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl IntakeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IntakeError::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            IntakeError::MissingFile(_) => ErrorKind::MissingFile,
            IntakeError::UnsupportedDialect => ErrorKind::UnsupportedDialect,
            IntakeError::MalformedConfig { .. } => ErrorKind::MalformedConfig,
            IntakeError::MissingHostname(_) => ErrorKind::MissingHostname,
            IntakeError::InvalidHostname(_) => ErrorKind::InvalidHostname,
            IntakeError::DirectoryCreateFailed { .. } => ErrorKind::DirectoryCreateFailed,
            IntakeError::WriteFailed { .. } => ErrorKind::WriteFailed,
        }
    }
}

/// A specialized Result type for pipeline stages.
pub type Result<T> = std::result::Result<T, IntakeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_failures_are_server_side() {
        let err = IntakeError::WriteFailed {
            path: PathBuf::from("/backup/fw1/fw1.xml"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.kind(), ErrorKind::WriteFailed);
        assert!(!err.kind().is_client_error());
        assert!(err.to_string().contains("/backup/fw1/fw1.xml"));
    }

    #[test]
    fn input_failures_are_client_side() {
        assert!(IntakeError::UnsupportedDialect.kind().is_client_error());
        assert!(IntakeError::MissingHostname("OPNsense".into())
            .kind()
            .is_client_error());
        assert!(IntakeError::PayloadTooLarge { size: 2, max: 1 }
            .kind()
            .is_client_error());
    }

    #[test]
    fn codes_are_snake_case() {
        assert_eq!(ErrorKind::MalformedConfig.code(), "malformed_config");
        assert_eq!(ErrorKind::DirectoryCreateFailed.to_string(), "directory_create_failed");
    }
}
