//! Structured job failures with stable numeric codes.
//!
//! Errors cross the forwarding layer verbatim, so the payload is kept to a
//! code plus a preformatted message rather than a source chain.

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for job-level operations.
pub type JobResult<T> = Result<T, JobError>;

/// Stable error codes carried across the worker protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The URL could not be parsed or has no usable form.
    MalformedUrl,
    /// The URL scheme is not handled by this backend or policy.
    UnsupportedScheme,
    /// The operation itself is not supported by the backend.
    UnsupportedAction,
    /// The resource does not exist.
    DoesNotExist,
    /// Permission was denied by the underlying store.
    AccessDenied,
    /// A directory was found where a file was expected.
    IsDirectory,
    /// A file was found where a directory was expected.
    IsFile,
    /// Refusing to overwrite an existing file.
    FileAlreadyExists,
    /// Refusing to overwrite an existing directory.
    DirAlreadyExists,
    /// Reading from the resource failed.
    CouldNotRead,
    /// Writing to the resource failed.
    CouldNotWrite,
    /// Directory creation failed.
    CouldNotCreateDir,
    /// Deletion failed.
    CouldNotDelete,
    /// Rename failed.
    CouldNotRename,
    /// Symlink creation failed.
    CouldNotSymlink,
    /// Changing permissions or timestamps failed.
    CouldNotChangeAttributes,
    /// The job was cancelled before completion.
    Aborted,
    /// Internal plumbing failure (closed channels, poisoned state).
    Internal,
}

impl ErrorCode {
    /// Numeric form of the code, as carried on the wire.
    #[must_use]
    pub const fn as_code(self) -> u16 {
        match self {
            Self::MalformedUrl => 1,
            Self::UnsupportedScheme => 2,
            Self::UnsupportedAction => 3,
            Self::DoesNotExist => 4,
            Self::AccessDenied => 5,
            Self::IsDirectory => 6,
            Self::IsFile => 7,
            Self::FileAlreadyExists => 8,
            Self::DirAlreadyExists => 9,
            Self::CouldNotRead => 10,
            Self::CouldNotWrite => 11,
            Self::CouldNotCreateDir => 12,
            Self::CouldNotDelete => 13,
            Self::CouldNotRename => 14,
            Self::CouldNotSymlink => 15,
            Self::CouldNotChangeAttributes => 16,
            Self::Aborted => 17,
            Self::Internal => 18,
        }
    }
}

/// One job failure: a stable code plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct JobError {
    /// Stable error code.
    pub code: ErrorCode,
    /// Preformatted detail message.
    pub message: String,
}

impl JobError {
    /// Build an error from a code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Map an IO failure onto a job error, tagging it with the operation and
    /// path for the client-facing message.
    #[must_use]
    pub fn from_io(operation: &'static str, path: &Path, source: &io::Error) -> Self {
        let code = match source.kind() {
            io::ErrorKind::NotFound => ErrorCode::DoesNotExist,
            io::ErrorKind::PermissionDenied => ErrorCode::AccessDenied,
            io::ErrorKind::AlreadyExists => ErrorCode::FileAlreadyExists,
            io::ErrorKind::IsADirectory => ErrorCode::IsDirectory,
            io::ErrorKind::NotADirectory => ErrorCode::IsFile,
            _ => match operation {
                "get" | "read" => ErrorCode::CouldNotRead,
                "put" | "write" | "copy" => ErrorCode::CouldNotWrite,
                "mkdir" => ErrorCode::CouldNotCreateDir,
                "del" | "rmdir" => ErrorCode::CouldNotDelete,
                "rename" => ErrorCode::CouldNotRename,
                "symlink" => ErrorCode::CouldNotSymlink,
                "chmod" | "settime" => ErrorCode::CouldNotChangeAttributes,
                _ => ErrorCode::Internal,
            },
        };
        Self::new(code, format!("{operation} {}: {source}", path.display()))
    }
}
