//! Per-operation job bodies for the local backend.
//!
//! Every public function here owns its feed: it runs the operation, emits
//! intermediate events, and always ends with exactly one terminal event.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Utc};
use nix::sys::stat::utimes;
use nix::sys::time::TimeVal;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, error};
use url::Url;

use ferry_jobs::{ErrorCode, JobError, JobEvent, JobFeed, JobOptions, JobResult, MetaData};
use ferry_vfs::{DIRECTORY_MIME, EntryField, ResourceKind, VfsEntry, sniff_mime_type};

/// Metadata key carrying the mtime hint honoured by put and copy.
const MODIFIED_META_KEY: &str = "modified";

/// Listing entries are flushed to the consumer in batches of this size.
const LIST_BATCH: usize = 100;

async fn report(feed: &JobFeed, interactive: bool, operation: &'static str, outcome: JobResult<()>) {
    match outcome {
        Ok(()) => {
            let _ = feed.finish().await;
        }
        Err(failure) => {
            if interactive {
                error!(job = %feed.id(), operation, error = %failure, "local job failed");
            } else {
                debug!(job = %feed.id(), operation, error = %failure, "local job failed");
            }
            let _ = feed.fail(failure).await;
        }
    }
}

fn aborted() -> JobError {
    JobError::new(ErrorCode::Aborted, "job cancelled before completion")
}

async fn send_or_abort(feed: &JobFeed, event: JobEvent) -> JobResult<()> {
    if feed.send(event).await {
        Ok(())
    } else {
        Err(aborted())
    }
}

fn to_local_path(operation: &'static str, url: &Url) -> JobResult<PathBuf> {
    if !ferry_vfs::is_local(url) {
        return Err(JobError::new(
            ErrorCode::UnsupportedScheme,
            format!("{operation} {url}: only file URLs are handled locally"),
        ));
    }
    ferry_vfs::local_path(url).ok_or_else(|| {
        JobError::new(
            ErrorCode::MalformedUrl,
            format!("{operation} {url}: URL has no local path form"),
        )
    })
}

fn epoch_seconds(time: std::io::Result<std::time::SystemTime>) -> Option<u64> {
    time.ok()
        .and_then(|when| when.duration_since(UNIX_EPOCH).ok())
        .map(|elapsed| elapsed.as_secs())
}

fn build_entry(name: &str, metadata: &std::fs::Metadata, link: Option<String>) -> VfsEntry {
    let mut entry = VfsEntry::new();
    entry.set_name(name);

    let kind = if metadata.file_type().is_symlink() {
        ResourceKind::Symlink
    } else if metadata.is_dir() {
        ResourceKind::Directory
    } else {
        ResourceKind::File
    };
    entry.set_kind(kind);
    entry.set_size(metadata.len());
    entry.insert_number(
        EntryField::Access,
        u64::from(metadata.permissions().mode() & 0o7777),
    );
    if let Some(mtime) = epoch_seconds(metadata.modified()) {
        entry.insert_number(EntryField::ModificationTime, mtime);
    }
    if let Some(atime) = epoch_seconds(metadata.accessed()) {
        entry.insert_number(EntryField::AccessTime, atime);
    }
    if let Some(link) = link {
        entry.insert_text(EntryField::LinkDest, link);
    }
    entry
}

fn apply_mtime(operation: &'static str, path: &Path, mtime: DateTime<Utc>) -> JobResult<()> {
    let mtime_tv = TimeVal::new(
        mtime.timestamp(),
        i64::from(mtime.timestamp_subsec_micros()),
    );
    // Keep the current access time when it is readable.
    let atime_tv = std::fs::metadata(path)
        .ok()
        .and_then(|metadata| metadata.accessed().ok())
        .and_then(|accessed| accessed.duration_since(UNIX_EPOCH).ok())
        .map_or(mtime_tv, |elapsed| {
            TimeVal::new(
                i64::try_from(elapsed.as_secs()).unwrap_or(0),
                i64::from(elapsed.subsec_micros()),
            )
        });
    utimes(path, &atime_tv, &mtime_tv).map_err(|err| {
        JobError::new(
            ErrorCode::CouldNotChangeAttributes,
            format!("{operation} {}: {err}", path.display()),
        )
    })
}

fn apply_modified_hint(operation: &'static str, path: &Path, meta: &MetaData) -> JobResult<()> {
    if let Some(raw) = meta.get(MODIFIED_META_KEY)
        && let Ok(parsed) = DateTime::parse_from_rfc3339(raw)
    {
        apply_mtime(operation, path, parsed.with_timezone(&Utc))?;
    }
    Ok(())
}

pub(crate) async fn get(mut feed: JobFeed, url: Url, interactive: bool, chunk_size: usize) {
    let outcome = run_get(&mut feed, &url, chunk_size).await;
    report(&feed, interactive, "get", outcome).await;
}

async fn run_get(feed: &mut JobFeed, url: &Url, chunk_size: usize) -> JobResult<()> {
    let path = to_local_path("get", url)?;
    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|err| JobError::from_io("get", &path, &err))?;
    if metadata.is_dir() {
        return Err(JobError::new(
            ErrorCode::IsDirectory,
            format!("get {}: is a directory", path.display()),
        ));
    }

    send_or_abort(
        feed,
        JobEvent::MimeType {
            mime: sniff_mime_type(url),
        },
    )
    .await?;
    send_or_abort(
        feed,
        JobEvent::TotalSize {
            bytes: metadata.len(),
        },
    )
    .await?;

    let mut file = File::open(&path)
        .await
        .map_err(|err| JobError::from_io("get", &path, &err))?;
    let mut buffer = vec![0u8; chunk_size];
    let mut processed = 0u64;
    loop {
        let read = file
            .read(&mut buffer)
            .await
            .map_err(|err| JobError::from_io("read", &path, &err))?;
        if read == 0 {
            break;
        }
        processed += read as u64;
        send_or_abort(
            feed,
            JobEvent::Data {
                chunk: buffer[..read].to_vec(),
            },
        )
        .await?;
        send_or_abort(feed, JobEvent::ProcessedSize { bytes: processed }).await?;
    }
    Ok(())
}

pub(crate) async fn put(
    mut feed: JobFeed,
    url: Url,
    permissions: Option<u32>,
    overwrite: bool,
    resume: bool,
    options: JobOptions,
) {
    let outcome = run_put(&mut feed, &url, permissions, overwrite, resume, &options.meta).await;
    report(&feed, options.interactive, "put", outcome).await;
}

async fn run_put(
    feed: &mut JobFeed,
    url: &Url,
    permissions: Option<u32>,
    overwrite: bool,
    resume: bool,
    meta: &MetaData,
) -> JobResult<()> {
    let path = to_local_path("put", url)?;
    let existing = tokio::fs::metadata(&path).await.ok();
    if let Some(existing) = &existing {
        if existing.is_dir() {
            return Err(JobError::new(
                ErrorCode::DirAlreadyExists,
                format!("put {}: destination is a directory", path.display()),
            ));
        }
        if !overwrite && !resume {
            return Err(JobError::new(
                ErrorCode::FileAlreadyExists,
                format!("put {}: refusing to overwrite", path.display()),
            ));
        }
    }

    let (mut file, mut written) = if resume && existing.is_some() {
        let offset = existing.as_ref().map_or(0, std::fs::Metadata::len);
        send_or_abort(feed, JobEvent::CanResume { offset }).await?;
        let file = OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .map_err(|err| JobError::from_io("put", &path, &err))?;
        (file, offset)
    } else {
        let file = File::create(&path)
            .await
            .map_err(|err| JobError::from_io("put", &path, &err))?;
        (file, 0)
    };

    loop {
        send_or_abort(feed, JobEvent::DataRequest).await?;
        let Some(chunk) = feed.next_chunk().await else {
            return Err(aborted());
        };
        if chunk.is_empty() {
            break;
        }
        file.write_all(&chunk)
            .await
            .map_err(|err| JobError::from_io("write", &path, &err))?;
        written += chunk.len() as u64;
        send_or_abort(feed, JobEvent::ProcessedSize { bytes: written }).await?;
    }
    file.flush()
        .await
        .map_err(|err| JobError::from_io("write", &path, &err))?;
    drop(file);

    if let Some(mode) = permissions {
        tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode))
            .await
            .map_err(|err| JobError::from_io("chmod", &path, &err))?;
    }
    apply_modified_hint("put", &path, meta)
}

pub(crate) async fn stat(feed: JobFeed, url: Url, interactive: bool) {
    let outcome = run_stat(&feed, &url).await;
    report(&feed, interactive, "stat", outcome).await;
}

async fn run_stat(feed: &JobFeed, url: &Url) -> JobResult<()> {
    let path = to_local_path("stat", url)?;
    let metadata = tokio::fs::symlink_metadata(&path)
        .await
        .map_err(|err| JobError::from_io("stat", &path, &err))?;

    let link = if metadata.file_type().is_symlink() {
        tokio::fs::read_link(&path)
            .await
            .ok()
            .map(|target| target.to_string_lossy().into_owned())
    } else {
        None
    };

    let name = path
        .file_name()
        .map_or_else(|| "/".to_string(), |name| name.to_string_lossy().into_owned());
    let mut entry = build_entry(&name, &metadata, link);
    entry.set_url(url);
    send_or_abort(feed, JobEvent::StatReady { entry }).await
}

pub(crate) async fn mimetype(feed: JobFeed, url: Url, interactive: bool) {
    let outcome = run_mimetype(&feed, &url).await;
    report(&feed, interactive, "mimetype", outcome).await;
}

async fn run_mimetype(feed: &JobFeed, url: &Url) -> JobResult<()> {
    let path = to_local_path("mimetype", url)?;
    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|err| JobError::from_io("mimetype", &path, &err))?;
    let mime = if metadata.is_dir() {
        DIRECTORY_MIME.to_string()
    } else {
        sniff_mime_type(url)
    };
    send_or_abort(feed, JobEvent::MimeType { mime }).await
}

pub(crate) async fn list_dir(feed: JobFeed, url: Url, interactive: bool) {
    let outcome = run_list_dir(&feed, &url).await;
    report(&feed, interactive, "list_dir", outcome).await;
}

async fn run_list_dir(feed: &JobFeed, url: &Url) -> JobResult<()> {
    let path = to_local_path("list_dir", url)?;
    let mut reader = tokio::fs::read_dir(&path)
        .await
        .map_err(|err| JobError::from_io("list_dir", &path, &err))?;

    let mut batch = Vec::with_capacity(LIST_BATCH);
    loop {
        let next = reader
            .next_entry()
            .await
            .map_err(|err| JobError::from_io("list_dir", &path, &err))?;
        let Some(dir_entry) = next else { break };

        let metadata = match dir_entry.metadata().await {
            Ok(metadata) => metadata,
            // The entry disappeared mid-listing; skip it rather than fail
            // the whole listing.
            Err(_) => continue,
        };
        let name = dir_entry.file_name().to_string_lossy().into_owned();
        let link = if metadata.file_type().is_symlink() {
            tokio::fs::read_link(dir_entry.path())
                .await
                .ok()
                .map(|target| target.to_string_lossy().into_owned())
        } else {
            None
        };
        let mut child = build_entry(&name, &metadata, link);
        let child_url = if metadata.is_dir() {
            Url::from_directory_path(dir_entry.path())
        } else {
            Url::from_file_path(dir_entry.path())
        };
        if let Ok(child_url) = child_url {
            child.set_url(&child_url);
        }
        batch.push(child);

        if batch.len() == LIST_BATCH {
            send_or_abort(
                feed,
                JobEvent::Entries {
                    entries: std::mem::take(&mut batch),
                },
            )
            .await?;
        }
    }

    if !batch.is_empty() {
        send_or_abort(feed, JobEvent::Entries { entries: batch }).await?;
    }
    Ok(())
}

pub(crate) async fn mkdir(feed: JobFeed, url: Url, permissions: Option<u32>, interactive: bool) {
    let outcome = run_mkdir(&url, permissions).await;
    report(&feed, interactive, "mkdir", outcome).await;
}

async fn run_mkdir(url: &Url, permissions: Option<u32>) -> JobResult<()> {
    let path = to_local_path("mkdir", url)?;
    if let Ok(existing) = tokio::fs::metadata(&path).await {
        let code = if existing.is_dir() {
            ErrorCode::DirAlreadyExists
        } else {
            ErrorCode::FileAlreadyExists
        };
        return Err(JobError::new(
            code,
            format!("mkdir {}: already exists", path.display()),
        ));
    }
    tokio::fs::create_dir(&path)
        .await
        .map_err(|err| JobError::from_io("mkdir", &path, &err))?;
    if let Some(mode) = permissions {
        tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode))
            .await
            .map_err(|err| JobError::from_io("chmod", &path, &err))?;
    }
    Ok(())
}

pub(crate) async fn rename(feed: JobFeed, src: Url, dest: Url, overwrite: bool, interactive: bool) {
    let outcome = run_rename(&src, &dest, overwrite).await;
    report(&feed, interactive, "rename", outcome).await;
}

async fn run_rename(src: &Url, dest: &Url, overwrite: bool) -> JobResult<()> {
    let src_path = to_local_path("rename", src)?;
    let dest_path = to_local_path("rename", dest)?;
    if !overwrite
        && let Ok(existing) = tokio::fs::metadata(&dest_path).await
    {
        let code = if existing.is_dir() {
            ErrorCode::DirAlreadyExists
        } else {
            ErrorCode::FileAlreadyExists
        };
        return Err(JobError::new(
            code,
            format!("rename {}: refusing to overwrite", dest_path.display()),
        ));
    }
    tokio::fs::rename(&src_path, &dest_path)
        .await
        .map_err(|err| JobError::from_io("rename", &src_path, &err))
}

pub(crate) async fn symlink(
    feed: JobFeed,
    target: String,
    dest: Url,
    overwrite: bool,
    interactive: bool,
) {
    let outcome = run_symlink(&target, &dest, overwrite).await;
    report(&feed, interactive, "symlink", outcome).await;
}

async fn run_symlink(target: &str, dest: &Url, overwrite: bool) -> JobResult<()> {
    let dest_path = to_local_path("symlink", dest)?;
    if tokio::fs::symlink_metadata(&dest_path).await.is_ok() {
        if !overwrite {
            return Err(JobError::new(
                ErrorCode::FileAlreadyExists,
                format!("symlink {}: refusing to overwrite", dest_path.display()),
            ));
        }
        tokio::fs::remove_file(&dest_path)
            .await
            .map_err(|err| JobError::from_io("symlink", &dest_path, &err))?;
    }
    tokio::fs::symlink(target, &dest_path)
        .await
        .map_err(|err| JobError::from_io("symlink", &dest_path, &err))
}

pub(crate) async fn chmod(feed: JobFeed, url: Url, permissions: u32, interactive: bool) {
    let outcome = run_chmod(&url, permissions).await;
    report(&feed, interactive, "chmod", outcome).await;
}

async fn run_chmod(url: &Url, permissions: u32) -> JobResult<()> {
    let path = to_local_path("chmod", url)?;
    tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(permissions))
        .await
        .map_err(|err| JobError::from_io("chmod", &path, &err))
}

pub(crate) async fn set_modification_time(
    feed: JobFeed,
    url: Url,
    mtime: DateTime<Utc>,
    interactive: bool,
) {
    let outcome = run_set_modification_time(&url, mtime).await;
    report(&feed, interactive, "settime", outcome).await;
}

async fn run_set_modification_time(url: &Url, mtime: DateTime<Utc>) -> JobResult<()> {
    let path = to_local_path("settime", url)?;
    // Surface missing targets as stat failures rather than utimes noise.
    tokio::fs::symlink_metadata(&path)
        .await
        .map_err(|err| JobError::from_io("settime", &path, &err))?;
    apply_mtime("settime", &path, mtime)
}

pub(crate) async fn copy(
    mut feed: JobFeed,
    src: Url,
    dest: Url,
    permissions: Option<u32>,
    overwrite: bool,
    chunk_size: usize,
    options: JobOptions,
) {
    let outcome = run_copy(
        &mut feed,
        &src,
        &dest,
        permissions,
        overwrite,
        chunk_size,
        &options.meta,
    )
    .await;
    report(&feed, options.interactive, "copy", outcome).await;
}

async fn run_copy(
    feed: &mut JobFeed,
    src: &Url,
    dest: &Url,
    permissions: Option<u32>,
    overwrite: bool,
    chunk_size: usize,
    meta: &MetaData,
) -> JobResult<()> {
    let src_path = to_local_path("copy", src)?;
    let dest_path = to_local_path("copy", dest)?;

    let src_meta = tokio::fs::metadata(&src_path)
        .await
        .map_err(|err| JobError::from_io("copy", &src_path, &err))?;
    if src_meta.is_dir() {
        return Err(JobError::new(
            ErrorCode::IsDirectory,
            format!("copy {}: is a directory", src_path.display()),
        ));
    }
    if let Ok(existing) = tokio::fs::metadata(&dest_path).await {
        if !overwrite {
            let code = if existing.is_dir() {
                ErrorCode::DirAlreadyExists
            } else {
                ErrorCode::FileAlreadyExists
            };
            return Err(JobError::new(
                code,
                format!("copy {}: refusing to overwrite", dest_path.display()),
            ));
        }
    }

    send_or_abort(
        feed,
        JobEvent::TotalSize {
            bytes: src_meta.len(),
        },
    )
    .await?;

    let mut reader = File::open(&src_path)
        .await
        .map_err(|err| JobError::from_io("copy", &src_path, &err))?;
    let mut writer = File::create(&dest_path)
        .await
        .map_err(|err| JobError::from_io("copy", &dest_path, &err))?;
    let mut buffer = vec![0u8; chunk_size];
    let mut processed = 0u64;
    loop {
        let read = reader
            .read(&mut buffer)
            .await
            .map_err(|err| JobError::from_io("read", &src_path, &err))?;
        if read == 0 {
            break;
        }
        writer
            .write_all(&buffer[..read])
            .await
            .map_err(|err| JobError::from_io("write", &dest_path, &err))?;
        processed += read as u64;
        send_or_abort(feed, JobEvent::ProcessedSize { bytes: processed }).await?;
    }
    writer
        .flush()
        .await
        .map_err(|err| JobError::from_io("write", &dest_path, &err))?;
    drop(writer);

    if let Some(mode) = permissions {
        tokio::fs::set_permissions(&dest_path, std::fs::Permissions::from_mode(mode))
            .await
            .map_err(|err| JobError::from_io("chmod", &dest_path, &err))?;
    }
    apply_modified_hint("copy", &dest_path, meta)
}

pub(crate) async fn delete_file(feed: JobFeed, url: Url, interactive: bool) {
    let outcome = run_delete_file(&url).await;
    report(&feed, interactive, "del", outcome).await;
}

async fn run_delete_file(url: &Url) -> JobResult<()> {
    let path = to_local_path("del", url)?;
    tokio::fs::remove_file(&path)
        .await
        .map_err(|err| JobError::from_io("del", &path, &err))
}

pub(crate) async fn remove_dir(feed: JobFeed, url: Url, interactive: bool) {
    let outcome = run_remove_dir(&url).await;
    report(&feed, interactive, "rmdir", outcome).await;
}

async fn run_remove_dir(url: &Url) -> JobResult<()> {
    let path = to_local_path("rmdir", url)?;
    tokio::fs::remove_dir(&path)
        .await
        .map_err(|err| JobError::from_io("rmdir", &path, &err))
}
