//! Typed lifecycle events emitted by one in-flight job.

use serde::{Deserialize, Serialize};
use url::Url;

use ferry_vfs::VfsEntry;

use crate::error::JobError;

/// Everything a job can report while running, as one tagged stream.
///
/// Events arrive strictly in emission order. `StatReady` is delivered by stat
/// jobs immediately before `Finished`; `Finished` and `Failed` are terminal
/// and nothing follows them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// Non-fatal problem worth surfacing to the user.
    Warning {
        /// Human-readable warning text.
        message: String,
    },
    /// Informational progress text.
    Info {
        /// Human-readable message text.
        message: String,
    },
    /// Expected payload size, announced before transfer starts.
    TotalSize {
        /// Total size in bytes.
        bytes: u64,
    },
    /// Bytes handled so far.
    ProcessedSize {
        /// Cumulative processed byte count.
        bytes: u64,
    },
    /// Current transfer rate.
    Speed {
        /// Transfer rate in bytes per second.
        bytes_per_second: u64,
    },
    /// The operation should be retried against a different URL.
    Redirection {
        /// The URL the client should reissue against.
        target: Url,
    },
    /// One batch of directory-listing entries.
    Entries {
        /// Entries produced so far, in listing order.
        entries: Vec<VfsEntry>,
    },
    /// One chunk of downloaded payload.
    Data {
        /// Raw bytes, streamed in order.
        chunk: Vec<u8>,
    },
    /// The job wants the next upload chunk fed through the handle.
    DataRequest,
    /// Detected mime type of the payload.
    MimeType {
        /// Mime type string.
        mime: String,
    },
    /// The destination supports resuming at the given offset.
    CanResume {
        /// Byte offset at which writing will continue.
        offset: u64,
    },
    /// Stat result, delivered just before `Finished` on stat jobs.
    StatReady {
        /// The stat record for the target resource.
        entry: VfsEntry,
    },
    /// Terminal success.
    Finished,
    /// Terminal failure.
    Failed {
        /// The failure, propagated verbatim to the client.
        error: JobError,
    },
}

impl JobEvent {
    /// Machine-friendly discriminator, mainly for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Warning { .. } => "warning",
            Self::Info { .. } => "info",
            Self::TotalSize { .. } => "total_size",
            Self::ProcessedSize { .. } => "processed_size",
            Self::Speed { .. } => "speed",
            Self::Redirection { .. } => "redirection",
            Self::Entries { .. } => "entries",
            Self::Data { .. } => "data",
            Self::DataRequest => "data_request",
            Self::MimeType { .. } => "mime_type",
            Self::CanResume { .. } => "can_resume",
            Self::StatReady { .. } => "stat_ready",
            Self::Finished => "finished",
            Self::Failed { .. } => "failed",
        }
    }

    /// Whether no further events may follow this one.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed { .. })
    }
}
