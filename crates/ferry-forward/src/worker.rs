//! The forwarding worker: rewrite gate, per-operation handlers, event pump.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use url::Url;

use ferry_jobs::{ErrorCode, JobBackend, JobEvent, JobHandle, JobOptions, MetaData};

use crate::error::{ForwardError, ForwardResult};
use crate::policy::{RequestContext, RewritePolicy};
use crate::reply::{ClientChannel, Reply};

/// Whether an operation honours redirection events.
///
/// Plain jobs (rename, copy, file deletion) never redirect; a redirection
/// arriving on one is dropped, matching a signal that was never wired up.
#[derive(Clone, Copy, PartialEq, Eq)]
enum RedirectMode {
    Honor,
    Ignore,
}

/// A protocol worker that forwards every operation to a rewritten URL.
///
/// Construction injects the three collaborators: the rewrite policy (what
/// URLs map to), the job backend (where operations actually run), and the
/// client channel (where replies go). Handlers are async and serialised:
/// at most one forwarding operation runs per worker at a time, enforced by
/// an internal operation gate.
pub struct Forwarder {
    scheme: String,
    policy: Arc<dyn RewritePolicy>,
    backend: Arc<dyn JobBackend>,
    channel: Arc<dyn ClientChannel>,
    meta: Mutex<MetaData>,
    op_gate: tokio::sync::Mutex<()>,
}

impl Forwarder {
    /// Build a worker registered under `scheme`.
    pub fn new(
        scheme: impl Into<String>,
        policy: Arc<dyn RewritePolicy>,
        backend: Arc<dyn JobBackend>,
        channel: Arc<dyn ClientChannel>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            policy,
            backend,
            channel,
            meta: Mutex::new(MetaData::new()),
            op_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// The scheme this worker answers for.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Record one ambient metadata key for subsequent operations (e.g. the
    /// `modified` hint that put and copy honour).
    ///
    /// # Panics
    ///
    /// Panics if the metadata mutex has been poisoned.
    pub fn set_metadata(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut meta = self.meta.lock().expect("metadata mutex poisoned");
        meta.insert(key.into(), value.into());
    }

    /// Drop all ambient metadata.
    ///
    /// # Panics
    ///
    /// Panics if the metadata mutex has been poisoned.
    pub fn clear_metadata(&self) {
        self.meta.lock().expect("metadata mutex poisoned").clear();
    }

    fn job_options(&self) -> JobOptions {
        let meta = self.meta.lock().expect("metadata mutex poisoned").clone();
        JobOptions::quiet(meta)
    }

    async fn emit(&self, reply: Reply) -> ForwardResult<()> {
        self.channel
            .send(reply)
            .await
            .map_err(ForwardError::channel)
    }

    /// The rewrite gate. Foreign schemes pass through unchanged; URLs under
    /// this worker's scheme go through the policy. On policy refusal the
    /// error is reported to the client and `None` is returned: the caller
    /// must abort without issuing any job.
    async fn rewrite_gate(&self, url: &Url) -> ForwardResult<Option<RequestContext>> {
        if url.scheme() != self.scheme {
            return Ok(Some(RequestContext::new(url.clone(), url.clone())));
        }

        match self.policy.rewrite_url(url) {
            Ok(processed) => Ok(Some(RequestContext::new(url.clone(), processed))),
            Err(error) => {
                warn!(url = %url, code = ?error.code, "rewrite refused");
                self.emit(Reply::Error {
                    code: error.code,
                    message: error.message,
                })
                .await?;
                Ok(None)
            }
        }
    }

    /// Drive one job to its terminal state, translating every event.
    async fn pump(
        &self,
        mut job: JobHandle,
        context: &RequestContext,
        redirect: RedirectMode,
    ) -> ForwardResult<()> {
        loop {
            let Some(event) = job.next_event().await else {
                // The producer vanished without a terminal event; the client
                // must not be left hanging.
                self.emit(Reply::Error {
                    code: ErrorCode::Internal,
                    message: "job ended without reporting a result".into(),
                })
                .await?;
                return Ok(());
            };

            match event {
                JobEvent::Warning { message } => self.emit(Reply::Warning { message }).await?,
                JobEvent::Info { message } => self.emit(Reply::InfoMessage { message }).await?,
                JobEvent::TotalSize { bytes } => self.emit(Reply::TotalSize { bytes }).await?,
                JobEvent::ProcessedSize { bytes } => {
                    self.emit(Reply::ProcessedSize { bytes }).await?;
                }
                JobEvent::Speed { bytes_per_second } => {
                    self.emit(Reply::Speed { bytes_per_second }).await?;
                }
                JobEvent::MimeType { mime } => self.emit(Reply::MimeType { mime }).await?,
                JobEvent::CanResume { offset } => self.emit(Reply::CanResume { offset }).await?,
                JobEvent::Data { chunk } => self.emit(Reply::Data { chunk }).await?,
                JobEvent::DataRequest => {
                    self.emit(Reply::DataRequest).await?;
                    let chunk = self
                        .channel
                        .read_data()
                        .await
                        .map_err(ForwardError::upload)?;
                    job.supply_data(chunk).await.map_err(ForwardError::feed)?;
                }
                JobEvent::Entries { mut entries } => {
                    for entry in &mut entries {
                        self.policy.prepare_entry(context, entry, true);
                    }
                    self.emit(Reply::ListEntries { entries }).await?;
                }
                JobEvent::StatReady { mut entry } => {
                    self.policy.prepare_entry(context, &mut entry, false);
                    self.emit(Reply::StatEntry { entry }).await?;
                }
                JobEvent::Redirection { target } => {
                    if redirect == RedirectMode::Ignore {
                        continue;
                    }
                    debug!(target = %target, "redirected, stopping the job quietly");
                    self.emit(Reply::Redirection { target }).await?;
                    job.kill();
                    self.emit(Reply::Finished).await?;
                    return Ok(());
                }
                JobEvent::Finished => {
                    self.emit(Reply::Finished).await?;
                    return Ok(());
                }
                JobEvent::Failed { error } => {
                    self.emit(Reply::Error {
                        code: error.code,
                        message: error.message,
                    })
                    .await?;
                    return Ok(());
                }
            }
        }
    }

    /// Forward a download of `url`.
    ///
    /// # Errors
    ///
    /// Fails only on client-channel breakage; job failures are reported to
    /// the client as replies.
    pub async fn get(&self, url: &Url) -> ForwardResult<()> {
        let _gate = self.op_gate.lock().await;
        debug!(url = %url, "forwarding get");
        let Some(context) = self.rewrite_gate(url).await? else {
            return Ok(());
        };
        let job = self
            .backend
            .get(context.processed().clone(), self.job_options());
        self.pump(job, &context, RedirectMode::Honor).await
    }

    /// Forward an upload to `url`; chunks are pulled from the client channel
    /// as the job asks for them.
    ///
    /// # Errors
    ///
    /// Fails on client-channel breakage or when the job stops accepting
    /// upload data mid-transfer.
    pub async fn put(
        &self,
        url: &Url,
        permissions: Option<u32>,
        overwrite: bool,
        resume: bool,
    ) -> ForwardResult<()> {
        let _gate = self.op_gate.lock().await;
        debug!(url = %url, overwrite, resume, "forwarding put");
        let Some(context) = self.rewrite_gate(url).await? else {
            return Ok(());
        };
        let job = self.backend.put(
            context.processed().clone(),
            permissions,
            overwrite,
            resume,
            self.job_options(),
        );
        self.pump(job, &context, RedirectMode::Honor).await
    }

    /// Forward a stat of `url`; the resulting entry is rewritten into this
    /// worker's namespace before delivery.
    ///
    /// # Errors
    ///
    /// Fails only on client-channel breakage.
    pub async fn stat(&self, url: &Url) -> ForwardResult<()> {
        let _gate = self.op_gate.lock().await;
        debug!(url = %url, "forwarding stat");
        let Some(context) = self.rewrite_gate(url).await? else {
            return Ok(());
        };
        let job = self
            .backend
            .stat(context.processed().clone(), self.job_options());
        self.pump(job, &context, RedirectMode::Honor).await
    }

    /// Forward a mime type probe of `url`.
    ///
    /// # Errors
    ///
    /// Fails only on client-channel breakage.
    pub async fn mimetype(&self, url: &Url) -> ForwardResult<()> {
        let _gate = self.op_gate.lock().await;
        debug!(url = %url, "forwarding mimetype");
        let Some(context) = self.rewrite_gate(url).await? else {
            return Ok(());
        };
        let job = self
            .backend
            .mimetype(context.processed().clone(), self.job_options());
        self.pump(job, &context, RedirectMode::Honor).await
    }

    /// Forward a directory listing of `url`; every entry is rewritten into
    /// this worker's namespace before delivery.
    ///
    /// # Errors
    ///
    /// Fails only on client-channel breakage.
    pub async fn list_dir(&self, url: &Url) -> ForwardResult<()> {
        let _gate = self.op_gate.lock().await;
        debug!(url = %url, "forwarding list_dir");
        let Some(context) = self.rewrite_gate(url).await? else {
            return Ok(());
        };
        let job = self
            .backend
            .list_dir(context.processed().clone(), self.job_options());
        self.pump(job, &context, RedirectMode::Honor).await
    }

    /// Forward a directory creation.
    ///
    /// # Errors
    ///
    /// Fails only on client-channel breakage.
    pub async fn mkdir(&self, url: &Url, permissions: Option<u32>) -> ForwardResult<()> {
        let _gate = self.op_gate.lock().await;
        debug!(url = %url, "forwarding mkdir");
        let Some(context) = self.rewrite_gate(url).await? else {
            return Ok(());
        };
        let job = self.backend.mkdir(
            context.processed().clone(),
            permissions,
            self.job_options(),
        );
        self.pump(job, &context, RedirectMode::Honor).await
    }

    /// Forward a rename. Both endpoints must survive the rewrite gate before
    /// any job is issued.
    ///
    /// # Errors
    ///
    /// Fails only on client-channel breakage.
    pub async fn rename(&self, src: &Url, dest: &Url, overwrite: bool) -> ForwardResult<()> {
        let _gate = self.op_gate.lock().await;
        debug!(src = %src, dest = %dest, "forwarding rename");
        let Some(src_context) = self.rewrite_gate(src).await? else {
            return Ok(());
        };
        let Some(dest_context) = self.rewrite_gate(dest).await? else {
            return Ok(());
        };
        let job = self.backend.rename(
            src_context.processed().clone(),
            dest_context.processed().clone(),
            overwrite,
            self.job_options(),
        );
        self.pump(job, &dest_context, RedirectMode::Ignore).await
    }

    /// Forward a symlink creation at `dest` pointing at `target`.
    ///
    /// # Errors
    ///
    /// Fails only on client-channel breakage.
    pub async fn symlink(&self, target: &str, dest: &Url, overwrite: bool) -> ForwardResult<()> {
        let _gate = self.op_gate.lock().await;
        debug!(target, dest = %dest, "forwarding symlink");
        let Some(context) = self.rewrite_gate(dest).await? else {
            return Ok(());
        };
        let job = self.backend.symlink(
            target.to_string(),
            context.processed().clone(),
            overwrite,
            self.job_options(),
        );
        self.pump(job, &context, RedirectMode::Honor).await
    }

    /// Forward a permission change.
    ///
    /// # Errors
    ///
    /// Fails only on client-channel breakage.
    pub async fn chmod(&self, url: &Url, permissions: u32) -> ForwardResult<()> {
        let _gate = self.op_gate.lock().await;
        debug!(url = %url, permissions, "forwarding chmod");
        let Some(context) = self.rewrite_gate(url).await? else {
            return Ok(());
        };
        let job = self.backend.chmod(
            context.processed().clone(),
            permissions,
            self.job_options(),
        );
        self.pump(job, &context, RedirectMode::Honor).await
    }

    /// Forward a modification-time change.
    ///
    /// # Errors
    ///
    /// Fails only on client-channel breakage.
    pub async fn set_modification_time(
        &self,
        url: &Url,
        mtime: DateTime<Utc>,
    ) -> ForwardResult<()> {
        let _gate = self.op_gate.lock().await;
        debug!(url = %url, mtime = %mtime, "forwarding set_modification_time");
        let Some(context) = self.rewrite_gate(url).await? else {
            return Ok(());
        };
        let job = self.backend.set_modification_time(
            context.processed().clone(),
            mtime,
            self.job_options(),
        );
        self.pump(job, &context, RedirectMode::Honor).await
    }

    /// Forward a copy. Both endpoints must survive the rewrite gate before
    /// any job is issued.
    ///
    /// # Errors
    ///
    /// Fails only on client-channel breakage.
    pub async fn copy(
        &self,
        src: &Url,
        dest: &Url,
        permissions: Option<u32>,
        overwrite: bool,
    ) -> ForwardResult<()> {
        let _gate = self.op_gate.lock().await;
        debug!(src = %src, dest = %dest, "forwarding copy");
        let Some(src_context) = self.rewrite_gate(src).await? else {
            return Ok(());
        };
        let Some(dest_context) = self.rewrite_gate(dest).await? else {
            return Ok(());
        };
        let job = self.backend.copy(
            src_context.processed().clone(),
            dest_context.processed().clone(),
            permissions,
            overwrite,
            self.job_options(),
        );
        self.pump(job, &dest_context, RedirectMode::Ignore).await
    }

    /// Forward a deletion, dispatching to file deletion or directory removal
    /// on the caller-supplied flag.
    ///
    /// # Errors
    ///
    /// Fails only on client-channel breakage.
    pub async fn del(&self, url: &Url, is_file: bool) -> ForwardResult<()> {
        let _gate = self.op_gate.lock().await;
        debug!(url = %url, is_file, "forwarding del");
        let Some(context) = self.rewrite_gate(url).await? else {
            return Ok(());
        };
        if is_file {
            let job = self
                .backend
                .delete_file(context.processed().clone(), self.job_options());
            self.pump(job, &context, RedirectMode::Ignore).await
        } else {
            let job = self
                .backend
                .remove_dir(context.processed().clone(), self.job_options());
            self.pump(job, &context, RedirectMode::Honor).await
        }
    }
}
