//! The worker-side emission surface and the channel it is delivered on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use ferry_jobs::ErrorCode;
use ferry_vfs::VfsEntry;

/// Everything a worker can emit towards its client, as one tagged stream.
///
/// Replies are produced on the same logical sequencing as the job events
/// that triggered them; consumers may rely on ordering (e.g. `TotalSize`
/// before the first `ProcessedSize`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    /// Terminal failure with the job's code and message, verbatim.
    Error {
        /// Stable error code.
        code: ErrorCode,
        /// Detail message, unmodified.
        message: String,
    },
    /// Non-fatal problem worth surfacing.
    Warning {
        /// Human-readable warning text.
        message: String,
    },
    /// Informational progress text.
    InfoMessage {
        /// Human-readable message text.
        message: String,
    },
    /// Expected payload size.
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
    /// One chunk of downloaded payload.
    Data {
        /// Raw bytes, base64 on the wire.
        #[serde(with = "chunk_b64")]
        chunk: Vec<u8>,
    },
    /// The worker wants the next upload chunk from the client.
    DataRequest,
    /// Stat result, rewritten into the worker's namespace.
    StatEntry {
        /// The stat record.
        entry: VfsEntry,
    },
    /// One batch of listing entries, each rewritten.
    ListEntries {
        /// Entries in listing order.
        entries: Vec<VfsEntry>,
    },
    /// The client should reissue the operation against a new URL.
    Redirection {
        /// Redirect target.
        target: Url,
    },
    /// Terminal success.
    Finished,
}

impl Reply {
    /// Machine-friendly discriminator, mainly for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Error { .. } => "error",
            Self::Warning { .. } => "warning",
            Self::InfoMessage { .. } => "info_message",
            Self::TotalSize { .. } => "total_size",
            Self::ProcessedSize { .. } => "processed_size",
            Self::Speed { .. } => "speed",
            Self::MimeType { .. } => "mime_type",
            Self::CanResume { .. } => "can_resume",
            Self::Data { .. } => "data",
            Self::DataRequest => "data_request",
            Self::StatEntry { .. } => "stat_entry",
            Self::ListEntries { .. } => "list_entries",
            Self::Redirection { .. } => "redirection",
            Self::Finished => "finished",
        }
    }
}

/// Transport towards the client application.
///
/// `send` delivers one reply in order; `read_data` answers a `DataRequest`
/// by producing the next upload chunk (empty chunk means end of data). The
/// wire format behind this trait is out of scope for the forwarding core.
#[async_trait]
pub trait ClientChannel: Send + Sync {
    /// Deliver one reply to the client.
    async fn send(&self, reply: Reply) -> anyhow::Result<()>;

    /// Obtain the next upload chunk from the client.
    async fn read_data(&self) -> anyhow::Result<Vec<u8>>;
}

mod chunk_b64 {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub(super) fn serialize<S: Serializer>(chunk: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(chunk))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(D::Error::custom)
    }
}
