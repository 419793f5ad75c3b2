//! Local-filesystem job backend.
//!
//! Answers every job operation against `file:` URLs using `tokio::fs`. Each
//! constructor spawns one task that drives the [`ferry_jobs::JobFeed`] and
//! reports a terminal event; cancellation is observed through send failures
//! once the consumer drops or kills the handle.

mod ops;

use chrono::{DateTime, Utc};
use url::Url;

use ferry_jobs::{JobBackend, JobHandle, JobOptions};

/// Default size of streamed data chunks.
const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Job backend serving the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalFsBackend {
    chunk_size: usize,
}

impl Default for LocalFsBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalFsBackend {
    /// Backend with the default streaming chunk size.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Backend with a custom streaming chunk size.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero.
    #[must_use]
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be positive");
        Self { chunk_size }
    }
}

impl JobBackend for LocalFsBackend {
    fn get(&self, url: Url, options: JobOptions) -> JobHandle {
        let (handle, feed) = JobHandle::pair(false);
        tokio::spawn(ops::get(feed, url, options.interactive, self.chunk_size));
        handle
    }

    fn put(
        &self,
        url: Url,
        permissions: Option<u32>,
        overwrite: bool,
        resume: bool,
        options: JobOptions,
    ) -> JobHandle {
        let (handle, feed) = JobHandle::pair(true);
        tokio::spawn(ops::put(
            feed,
            url,
            permissions,
            overwrite,
            resume,
            options,
        ));
        handle
    }

    fn stat(&self, url: Url, options: JobOptions) -> JobHandle {
        let (handle, feed) = JobHandle::pair(false);
        tokio::spawn(ops::stat(feed, url, options.interactive));
        handle
    }

    fn mimetype(&self, url: Url, options: JobOptions) -> JobHandle {
        let (handle, feed) = JobHandle::pair(false);
        tokio::spawn(ops::mimetype(feed, url, options.interactive));
        handle
    }

    fn list_dir(&self, url: Url, options: JobOptions) -> JobHandle {
        let (handle, feed) = JobHandle::pair(false);
        tokio::spawn(ops::list_dir(feed, url, options.interactive));
        handle
    }

    fn mkdir(&self, url: Url, permissions: Option<u32>, options: JobOptions) -> JobHandle {
        let (handle, feed) = JobHandle::pair(false);
        tokio::spawn(ops::mkdir(feed, url, permissions, options.interactive));
        handle
    }

    fn rename(&self, src: Url, dest: Url, overwrite: bool, options: JobOptions) -> JobHandle {
        let (handle, feed) = JobHandle::pair(false);
        tokio::spawn(ops::rename(feed, src, dest, overwrite, options.interactive));
        handle
    }

    fn symlink(&self, target: String, dest: Url, overwrite: bool, options: JobOptions) -> JobHandle {
        let (handle, feed) = JobHandle::pair(false);
        tokio::spawn(ops::symlink(
            feed,
            target,
            dest,
            overwrite,
            options.interactive,
        ));
        handle
    }

    fn chmod(&self, url: Url, permissions: u32, options: JobOptions) -> JobHandle {
        let (handle, feed) = JobHandle::pair(false);
        tokio::spawn(ops::chmod(feed, url, permissions, options.interactive));
        handle
    }

    fn set_modification_time(
        &self,
        url: Url,
        mtime: DateTime<Utc>,
        options: JobOptions,
    ) -> JobHandle {
        let (handle, feed) = JobHandle::pair(false);
        tokio::spawn(ops::set_modification_time(
            feed,
            url,
            mtime,
            options.interactive,
        ));
        handle
    }

    fn copy(
        &self,
        src: Url,
        dest: Url,
        permissions: Option<u32>,
        overwrite: bool,
        options: JobOptions,
    ) -> JobHandle {
        let (handle, feed) = JobHandle::pair(false);
        tokio::spawn(ops::copy(
            feed,
            src,
            dest,
            permissions,
            overwrite,
            self.chunk_size,
            options,
        ));
        handle
    }

    fn delete_file(&self, url: Url, options: JobOptions) -> JobHandle {
        let (handle, feed) = JobHandle::pair(false);
        tokio::spawn(ops::delete_file(feed, url, options.interactive));
        handle
    }

    fn remove_dir(&self, url: Url, options: JobOptions) -> JobHandle {
        let (handle, feed) = JobHandle::pair(false);
        tokio::spawn(ops::remove_dir(feed, url, options.interactive));
        handle
    }
}
