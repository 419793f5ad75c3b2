//! The backend trait minting jobs for each supported operation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use url::Url;

use crate::error::{ErrorCode, JobError};
use crate::event::JobEvent;
use crate::handle::JobHandle;

/// Ambient request metadata copied onto every job (e.g. the `modified`
/// mtime hint honoured by put and copy).
pub type MetaData = BTreeMap<String, String>;

/// Per-job knobs supplied by the issuer.
#[derive(Debug, Clone)]
pub struct JobOptions {
    /// Whether the job may present failures itself. Forwarding issuers
    /// always disable this and own error presentation.
    pub interactive: bool,
    /// Request metadata propagated from the issuing worker.
    pub meta: MetaData,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            interactive: true,
            meta: MetaData::new(),
        }
    }
}

impl JobOptions {
    /// Options for a job whose errors are presented by the issuer, carrying
    /// the given request metadata.
    #[must_use]
    pub const fn quiet(meta: MetaData) -> Self {
        Self {
            interactive: false,
            meta,
        }
    }
}

/// Mint a handle that immediately fails with `UnsupportedAction`.
///
/// Used by default trait methods so partial backends still answer every
/// operation with a well-formed terminal event.
#[must_use]
pub fn unsupported_job(operation: &'static str) -> JobHandle {
    let (handle, feed) = JobHandle::pair(false);
    let _ = feed.try_send(JobEvent::Failed {
        error: JobError::new(
            ErrorCode::UnsupportedAction,
            format!("{operation} not supported by this backend"),
        ),
    });
    handle
}

/// Factory for asynchronous filesystem jobs, one method per operation.
///
/// Constructors return immediately; the work runs behind the returned
/// [`JobHandle`]. Every method has a default body that reports
/// `UnsupportedAction`, mirroring how partial engines answer operations they
/// do not implement.
pub trait JobBackend: Send + Sync {
    /// Stream the resource at `url` to the issuer.
    fn get(&self, url: Url, options: JobOptions) -> JobHandle {
        let _ = (url, options);
        unsupported_job("get")
    }

    /// Write a resource at `url` from chunks pulled through the handle.
    fn put(
        &self,
        url: Url,
        permissions: Option<u32>,
        overwrite: bool,
        resume: bool,
        options: JobOptions,
    ) -> JobHandle {
        let _ = (url, permissions, overwrite, resume, options);
        unsupported_job("put")
    }

    /// Produce a stat record for `url`.
    fn stat(&self, url: Url, options: JobOptions) -> JobHandle {
        let _ = (url, options);
        unsupported_job("stat")
    }

    /// Announce the mime type of `url` without transferring payload.
    fn mimetype(&self, url: Url, options: JobOptions) -> JobHandle {
        let _ = (url, options);
        unsupported_job("mimetype")
    }

    /// List the directory at `url`.
    fn list_dir(&self, url: Url, options: JobOptions) -> JobHandle {
        let _ = (url, options);
        unsupported_job("list_dir")
    }

    /// Create a directory at `url`.
    fn mkdir(&self, url: Url, permissions: Option<u32>, options: JobOptions) -> JobHandle {
        let _ = (url, permissions, options);
        unsupported_job("mkdir")
    }

    /// Rename `src` to `dest` within one backend.
    fn rename(&self, src: Url, dest: Url, overwrite: bool, options: JobOptions) -> JobHandle {
        let _ = (src, dest, overwrite, options);
        unsupported_job("rename")
    }

    /// Create a symlink at `dest` pointing at `target`.
    fn symlink(&self, target: String, dest: Url, overwrite: bool, options: JobOptions) -> JobHandle {
        let _ = (target, dest, overwrite, options);
        unsupported_job("symlink")
    }

    /// Change permission bits on `url`.
    fn chmod(&self, url: Url, permissions: u32, options: JobOptions) -> JobHandle {
        let _ = (url, permissions, options);
        unsupported_job("chmod")
    }

    /// Set the modification time of `url`.
    fn set_modification_time(
        &self,
        url: Url,
        mtime: DateTime<Utc>,
        options: JobOptions,
    ) -> JobHandle {
        let _ = (url, mtime, options);
        unsupported_job("set_modification_time")
    }

    /// Copy `src` to `dest`, optionally forcing permission bits.
    fn copy(
        &self,
        src: Url,
        dest: Url,
        permissions: Option<u32>,
        overwrite: bool,
        options: JobOptions,
    ) -> JobHandle {
        let _ = (src, dest, permissions, overwrite, options);
        unsupported_job("copy")
    }

    /// Delete the file at `url`.
    fn delete_file(&self, url: Url, options: JobOptions) -> JobHandle {
        let _ = (url, options);
        unsupported_job("delete_file")
    }

    /// Remove the (empty) directory at `url`.
    fn remove_dir(&self, url: Url, options: JobOptions) -> JobHandle {
        let _ = (url, options);
        unsupported_job("remove_dir")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyBackend;

    impl JobBackend for EmptyBackend {}

    fn url(raw: &str) -> Url {
        Url::parse(raw).expect("test url")
    }

    #[tokio::test]
    async fn default_methods_fail_with_unsupported_action() {
        let backend = EmptyBackend;
        let mut handle = backend.get(url("file:///tmp/x"), JobOptions::default());

        let Some(JobEvent::Failed { error }) = handle.next_event().await else {
            panic!("expected a terminal failure");
        };
        assert_eq!(error.code, ErrorCode::UnsupportedAction);
        assert!(error.message.contains("get"));
        assert_eq!(handle.next_event().await, None);
    }

    #[tokio::test]
    async fn quiet_options_disable_interactive_reporting() {
        let mut meta = MetaData::new();
        meta.insert("modified".into(), "2026-01-02T03:04:05Z".into());

        let options = JobOptions::quiet(meta.clone());
        assert!(!options.interactive);
        assert_eq!(options.meta, meta);
        assert!(JobOptions::default().interactive);
    }
}
