//! Failures of the forwarding machinery itself.
//!
//! Job failures are not errors here — they are relayed to the client as
//! [`crate::Reply::Error`] emissions. This type covers the plumbing around
//! that relay: the client channel going away, or the upload feed breaking.

use ferry_jobs::JobError;
use thiserror::Error;

/// Result type for forwarding operations.
pub type ForwardResult<T> = Result<T, ForwardError>;

/// Errors produced by the forwarding core.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// A reply could not be delivered to the client channel.
    #[error("client channel failure")]
    Channel {
        /// Underlying transport error.
        source: anyhow::Error,
    },
    /// Upload data could not be read from the client channel.
    #[error("upload data unavailable")]
    Upload {
        /// Underlying transport error.
        source: anyhow::Error,
    },
    /// An upload chunk could not be handed to the in-flight job.
    #[error("job stopped accepting upload data")]
    Feed {
        /// The job-side failure.
        source: JobError,
    },
}

impl ForwardError {
    pub(crate) fn channel(source: anyhow::Error) -> Self {
        Self::Channel { source }
    }

    pub(crate) fn upload(source: anyhow::Error) -> Self {
        Self::Upload { source }
    }

    pub(crate) const fn feed(source: JobError) -> Self {
        Self::Feed { source }
    }
}
