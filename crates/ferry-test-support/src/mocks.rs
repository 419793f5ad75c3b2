//! In-memory doubles for the transport side of a worker.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use ferry_forward::{ClientChannel, Reply};

/// Client channel that records every reply and feeds scripted upload chunks.
#[derive(Default)]
pub struct RecordingChannel {
    replies: Mutex<Vec<Reply>>,
    uploads: Mutex<VecDeque<Vec<u8>>>,
}

impl RecordingChannel {
    /// Fresh channel with no recorded replies and no queued uploads.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one upload chunk to be returned by the next `read_data` call.
    ///
    /// # Panics
    ///
    /// Panics if the upload mutex has been poisoned.
    pub fn queue_upload(&self, chunk: &[u8]) {
        self.uploads
            .lock()
            .expect("uploads mutex poisoned")
            .push_back(chunk.to_vec());
    }

    /// Snapshot of all replies recorded so far.
    ///
    /// # Panics
    ///
    /// Panics if the reply mutex has been poisoned.
    #[must_use]
    pub fn replies(&self) -> Vec<Reply> {
        self.replies.lock().expect("replies mutex poisoned").clone()
    }

    /// Discriminators of all replies recorded so far, for order assertions.
    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        self.replies().iter().map(Reply::kind).collect()
    }
}

#[async_trait]
impl ClientChannel for RecordingChannel {
    async fn send(&self, reply: Reply) -> anyhow::Result<()> {
        self.replies
            .lock()
            .expect("replies mutex poisoned")
            .push(reply);
        Ok(())
    }

    async fn read_data(&self) -> anyhow::Result<Vec<u8>> {
        Ok(self
            .uploads
            .lock()
            .expect("uploads mutex poisoned")
            .pop_front()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_replies_and_feeds_uploads() -> anyhow::Result<()> {
        let channel = RecordingChannel::new();
        channel.queue_upload(b"abc");

        channel.send(Reply::Finished).await?;
        assert_eq!(channel.replies(), vec![Reply::Finished]);
        assert_eq!(channel.kinds(), vec!["finished"]);

        assert_eq!(channel.read_data().await?, b"abc".to_vec());
        assert_eq!(channel.read_data().await?, Vec::<u8>::new());
        Ok(())
    }
}
