//! JSON-lines stdio transport and request dispatch.
//!
//! Each request arrives as one JSON object per line on stdin; every reply
//! leaves as one JSON object per line on stdout. Upload data is framed as
//! `{"chunk": "<base64>"}` lines, with an empty chunk marking end of data.

use anyhow::Context as _;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin, Stdout};
use url::Url;

use ferry_forward::{ClientChannel, Forwarder, ForwardResult, Reply};

/// One client request, as carried on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OpRequest {
    /// Download a resource.
    Get {
        /// Resource URL.
        url: Url,
    },
    /// Upload a resource; data follows as chunk frames.
    Put {
        /// Destination URL.
        url: Url,
        /// Optional permission bits for the created file.
        permissions: Option<u32>,
        /// Whether an existing destination may be replaced.
        #[serde(default)]
        overwrite: bool,
        /// Whether to continue a previous partial upload.
        #[serde(default)]
        resume: bool,
    },
    /// Produce a stat record.
    Stat {
        /// Resource URL.
        url: Url,
    },
    /// Announce the resource's mime type.
    Mimetype {
        /// Resource URL.
        url: Url,
    },
    /// List a directory.
    ListDir {
        /// Directory URL.
        url: Url,
    },
    /// Create a directory.
    Mkdir {
        /// Directory URL.
        url: Url,
        /// Optional permission bits for the created directory.
        permissions: Option<u32>,
    },
    /// Rename a resource.
    Rename {
        /// Source URL.
        src: Url,
        /// Destination URL.
        dest: Url,
        /// Whether an existing destination may be replaced.
        #[serde(default)]
        overwrite: bool,
    },
    /// Create a symlink.
    Symlink {
        /// Link target as stored in the link.
        target: String,
        /// Destination URL of the link itself.
        dest: Url,
        /// Whether an existing destination may be replaced.
        #[serde(default)]
        overwrite: bool,
    },
    /// Change permission bits.
    Chmod {
        /// Resource URL.
        url: Url,
        /// New permission bits.
        permissions: u32,
    },
    /// Set the modification time.
    SetModificationTime {
        /// Resource URL.
        url: Url,
        /// New modification time.
        mtime: DateTime<Utc>,
    },
    /// Copy a resource.
    Copy {
        /// Source URL.
        src: Url,
        /// Destination URL.
        dest: Url,
        /// Optional permission bits forced onto the destination.
        permissions: Option<u32>,
        /// Whether an existing destination may be replaced.
        #[serde(default)]
        overwrite: bool,
    },
    /// Delete a resource.
    Del {
        /// Resource URL.
        url: Url,
        /// Whether the target is a file (directories are removed
        /// non-recursively otherwise).
        #[serde(default)]
        is_file: bool,
    },
    /// Record one ambient metadata key for subsequent operations.
    SetMetadata {
        /// Metadata key.
        key: String,
        /// Metadata value.
        value: String,
    },
    /// Drop all ambient metadata.
    ClearMetadata,
}

/// Route one request to the matching forwarder handler.
///
/// # Errors
///
/// Fails when the forwarding core cannot deliver replies to the client.
pub async fn dispatch(forwarder: &Forwarder, request: OpRequest) -> ForwardResult<()> {
    match request {
        OpRequest::Get { url } => forwarder.get(&url).await,
        OpRequest::Put {
            url,
            permissions,
            overwrite,
            resume,
        } => forwarder.put(&url, permissions, overwrite, resume).await,
        OpRequest::Stat { url } => forwarder.stat(&url).await,
        OpRequest::Mimetype { url } => forwarder.mimetype(&url).await,
        OpRequest::ListDir { url } => forwarder.list_dir(&url).await,
        OpRequest::Mkdir { url, permissions } => forwarder.mkdir(&url, permissions).await,
        OpRequest::Rename {
            src,
            dest,
            overwrite,
        } => forwarder.rename(&src, &dest, overwrite).await,
        OpRequest::Symlink {
            target,
            dest,
            overwrite,
        } => forwarder.symlink(&target, &dest, overwrite).await,
        OpRequest::Chmod { url, permissions } => forwarder.chmod(&url, permissions).await,
        OpRequest::SetModificationTime { url, mtime } => {
            forwarder.set_modification_time(&url, mtime).await
        }
        OpRequest::Copy {
            src,
            dest,
            permissions,
            overwrite,
        } => forwarder.copy(&src, &dest, permissions, overwrite).await,
        OpRequest::Del { url, is_file } => forwarder.del(&url, is_file).await,
        OpRequest::SetMetadata { key, value } => {
            forwarder.set_metadata(key, value);
            Ok(())
        }
        OpRequest::ClearMetadata => {
            forwarder.clear_metadata();
            Ok(())
        }
    }
}

/// Upload data frame carried between `data_request` and the next request.
#[derive(Debug, Serialize, Deserialize)]
struct DataFrame {
    /// Base64-encoded chunk; empty for end of data.
    chunk: String,
}

fn decode_chunk(line: &str) -> anyhow::Result<Vec<u8>> {
    let frame: DataFrame = serde_json::from_str(line).context("malformed data frame")?;
    BASE64
        .decode(frame.chunk.as_bytes())
        .context("data frame is not valid base64")
}

/// JSON-lines transport over the process's stdio.
pub struct StdioChannel {
    input: tokio::sync::Mutex<BufReader<Stdin>>,
    output: tokio::sync::Mutex<Stdout>,
}

impl Default for StdioChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl StdioChannel {
    /// Channel over this process's stdin and stdout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            input: tokio::sync::Mutex::new(BufReader::new(tokio::io::stdin())),
            output: tokio::sync::Mutex::new(tokio::io::stdout()),
        }
    }

    async fn read_line(&self) -> anyhow::Result<Option<String>> {
        let mut input = self.input.lock().await;
        loop {
            let mut line = String::new();
            let read = input
                .read_line(&mut line)
                .await
                .context("stdin read failure")?;
            if read == 0 {
                return Ok(None);
            }
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return Ok(Some(trimmed.to_string()));
            }
        }
    }

    /// Read the next request line, `None` once stdin is closed.
    ///
    /// # Errors
    ///
    /// Fails when stdin breaks or a line is not a well-formed request.
    pub async fn read_request(&self) -> anyhow::Result<Option<OpRequest>> {
        let Some(line) = self.read_line().await? else {
            return Ok(None);
        };
        let request = serde_json::from_str(&line).context("malformed request line")?;
        Ok(Some(request))
    }
}

#[async_trait]
impl ClientChannel for StdioChannel {
    async fn send(&self, reply: Reply) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(&reply).context("unserialisable reply")?;
        line.push('\n');
        let mut output = self.output.lock().await;
        output
            .write_all(line.as_bytes())
            .await
            .context("stdout write failure")?;
        output.flush().await.context("stdout flush failure")
    }

    async fn read_data(&self) -> anyhow::Result<Vec<u8>> {
        match self.read_line().await? {
            Some(line) => decode_chunk(&line),
            // A closed stdin ends the upload.
            None => Ok(Vec::new()),
        }
    }
}
