//! Consumer and producer halves of one in-flight job.
//!
//! The consumer drives a [`JobHandle`]; the backend task drives the matching
//! [`JobFeed`]. Events travel over a bounded channel and are delivered in
//! emission order. Killing the handle signals the producer to stop without
//! reporting anything further.

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::error::{ErrorCode, JobError, JobResult};
use crate::event::JobEvent;

/// Bounded depth of the per-job event channel.
const EVENT_BUFFER: usize = 64;

/// Bounded depth of the upload-chunk channel on jobs that accept data.
const UPLOAD_BUFFER: usize = 4;

/// Consumer half of a job: the event stream plus control switches.
pub struct JobHandle {
    id: Uuid,
    events: mpsc::Receiver<JobEvent>,
    upload: Option<mpsc::Sender<Vec<u8>>>,
    cancel: Option<oneshot::Sender<()>>,
}

impl JobHandle {
    /// Create a connected handle/feed pair. `accepts_upload` opens the
    /// chunk channel used by the put path.
    #[must_use]
    pub fn pair(accepts_upload: bool) -> (Self, JobFeed) {
        let id = Uuid::new_v4();
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (cancel_tx, cancel_rx) = oneshot::channel();

        let (upload_tx, upload_rx) = if accepts_upload {
            let (tx, rx) = mpsc::channel(UPLOAD_BUFFER);
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let handle = Self {
            id,
            events: event_rx,
            upload: upload_tx,
            cancel: Some(cancel_tx),
        };
        let feed = JobFeed {
            id,
            events: event_tx,
            upload: upload_rx,
            cancelled: cancel_rx,
        };
        (handle, feed)
    }

    /// Identifier shared with the feed, for log correlation.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Receive the next event. `None` means the producer went away without a
    /// terminal event.
    pub async fn next_event(&mut self) -> Option<JobEvent> {
        self.events.recv().await
    }

    /// Feed one upload chunk to the job in answer to a `DataRequest`. An
    /// empty chunk marks end of data.
    ///
    /// # Errors
    ///
    /// Fails when the job accepts no upload data or has already gone away.
    pub async fn supply_data(&self, chunk: Vec<u8>) -> JobResult<()> {
        let Some(upload) = &self.upload else {
            return Err(JobError::new(
                ErrorCode::Internal,
                "job accepts no upload data",
            ));
        };
        upload
            .send(chunk)
            .await
            .map_err(|_| JobError::new(ErrorCode::Aborted, "job stopped accepting data"))
    }

    /// Kill the job quietly: the producer is told to stop and no further
    /// events are observed.
    pub fn kill(mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}

/// Producer half of a job, handed to the backend task.
pub struct JobFeed {
    id: Uuid,
    events: mpsc::Sender<JobEvent>,
    upload: Option<mpsc::Receiver<Vec<u8>>>,
    cancelled: oneshot::Receiver<()>,
}

impl JobFeed {
    /// Identifier shared with the handle, for log correlation.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Emit one event. Returns `false` once the consumer is gone, which the
    /// producer should treat as a stop signal.
    pub async fn send(&self, event: JobEvent) -> bool {
        self.events.send(event).await.is_ok()
    }

    /// Emit one event without waiting for channel capacity. Used by
    /// synchronous constructors that fail a job before any task runs.
    pub fn try_send(&self, event: JobEvent) -> bool {
        self.events.try_send(event).is_ok()
    }

    /// Emit the terminal success event.
    pub async fn finish(&self) -> bool {
        self.send(JobEvent::Finished).await
    }

    /// Emit the terminal failure event.
    pub async fn fail(&self, error: JobError) -> bool {
        self.send(JobEvent::Failed { error }).await
    }

    /// Receive the next upload chunk. `None` when the job has no upload
    /// channel or the consumer dropped it.
    pub async fn next_chunk(&mut self) -> Option<Vec<u8>> {
        match &mut self.upload {
            Some(upload) => upload.recv().await,
            None => None,
        }
    }

    /// Resolves when the consumer kills the job or drops the handle.
    ///
    /// Await this at most once, typically as one arm of a `select!` around
    /// the whole job body.
    pub async fn cancelled(&mut self) {
        let _ = (&mut self.cancelled).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_arrive_in_emission_order() {
        let (mut handle, feed) = JobHandle::pair(false);
        assert_eq!(handle.id(), feed.id());

        assert!(feed.send(JobEvent::TotalSize { bytes: 10 }).await);
        assert!(feed.send(JobEvent::ProcessedSize { bytes: 10 }).await);
        assert!(feed.finish().await);
        drop(feed);

        assert_eq!(
            handle.next_event().await,
            Some(JobEvent::TotalSize { bytes: 10 })
        );
        assert_eq!(
            handle.next_event().await,
            Some(JobEvent::ProcessedSize { bytes: 10 })
        );
        assert_eq!(handle.next_event().await, Some(JobEvent::Finished));
        assert_eq!(handle.next_event().await, None);
    }

    #[tokio::test]
    async fn kill_resolves_cancellation() {
        let (handle, mut feed) = JobHandle::pair(false);
        handle.kill();
        feed.cancelled().await;
        assert!(!feed.send(JobEvent::Finished).await);
    }

    #[tokio::test]
    async fn dropped_handle_counts_as_cancelled() {
        let (handle, mut feed) = JobHandle::pair(false);
        drop(handle);
        feed.cancelled().await;
    }

    #[tokio::test]
    async fn upload_chunks_flow_through() {
        let (handle, mut feed) = JobHandle::pair(true);

        handle.supply_data(b"abc".to_vec()).await.expect("supply");
        handle.supply_data(Vec::new()).await.expect("eof marker");

        assert_eq!(feed.next_chunk().await, Some(b"abc".to_vec()));
        assert_eq!(feed.next_chunk().await, Some(Vec::new()));
    }

    #[tokio::test]
    async fn supply_without_upload_channel_is_an_error() {
        let (handle, _feed) = JobHandle::pair(false);
        let err = handle
            .supply_data(b"x".to_vec())
            .await
            .expect_err("no upload channel");
        assert_eq!(err.code, ErrorCode::Internal);
    }

    #[tokio::test]
    async fn try_send_works_without_a_running_task() {
        let (mut handle, feed) = JobHandle::pair(false);
        assert!(feed.try_send(JobEvent::Finished));
        drop(feed);
        assert_eq!(handle.next_event().await, Some(JobEvent::Finished));
    }
}
