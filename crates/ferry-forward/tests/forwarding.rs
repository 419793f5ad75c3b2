//! End-to-end behaviour of the forwarding worker against a scripted backend.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use url::Url;

use ferry_forward::{ClientChannel, Forwarder, Reply, RewritePolicy};
use ferry_jobs::{
    ErrorCode, JobBackend, JobError, JobEvent, JobHandle, JobOptions, JobResult, MetaData,
};
use ferry_vfs::{ResourceKind, VfsEntry};

fn url(raw: &str) -> Url {
    Url::parse(raw).expect("test url")
}

/// One recorded backend invocation.
#[derive(Debug, Clone)]
struct IssuedJob {
    operation: &'static str,
    urls: Vec<Url>,
    interactive: bool,
    meta: MetaData,
}

/// Backend that plays back canned event scripts and records what it was
/// asked to do.
#[derive(Default)]
struct ScriptedBackend {
    scripts: Mutex<HashMap<&'static str, VecDeque<Vec<JobEvent>>>>,
    calls: Arc<Mutex<Vec<IssuedJob>>>,
    chunks: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl ScriptedBackend {
    fn script(&self, operation: &'static str, events: Vec<JobEvent>) {
        self.scripts
            .lock()
            .expect("scripts mutex")
            .entry(operation)
            .or_default()
            .push_back(events);
    }

    fn play(
        &self,
        operation: &'static str,
        urls: Vec<Url>,
        options: JobOptions,
        upload: bool,
    ) -> JobHandle {
        let script = self
            .scripts
            .lock()
            .expect("scripts mutex")
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| vec![JobEvent::Finished]);

        self.calls.lock().expect("calls mutex").push(IssuedJob {
            operation,
            urls,
            interactive: options.interactive,
            meta: options.meta,
        });

        let (handle, mut feed) = JobHandle::pair(upload);
        let chunks = Arc::clone(&self.chunks);
        tokio::spawn(async move {
            for event in script {
                let wants_chunk = matches!(event, JobEvent::DataRequest);
                if !feed.send(event).await {
                    break;
                }
                if wants_chunk {
                    match feed.next_chunk().await {
                        Some(chunk) => chunks.lock().expect("chunks mutex").push(chunk),
                        None => break,
                    }
                }
            }
        });
        handle
    }
}

impl JobBackend for ScriptedBackend {
    fn get(&self, url: Url, options: JobOptions) -> JobHandle {
        self.play("get", vec![url], options, false)
    }

    fn put(
        &self,
        url: Url,
        _permissions: Option<u32>,
        _overwrite: bool,
        _resume: bool,
        options: JobOptions,
    ) -> JobHandle {
        self.play("put", vec![url], options, true)
    }

    fn stat(&self, url: Url, options: JobOptions) -> JobHandle {
        self.play("stat", vec![url], options, false)
    }

    fn mimetype(&self, url: Url, options: JobOptions) -> JobHandle {
        self.play("mimetype", vec![url], options, false)
    }

    fn list_dir(&self, url: Url, options: JobOptions) -> JobHandle {
        self.play("list_dir", vec![url], options, false)
    }

    fn mkdir(&self, url: Url, _permissions: Option<u32>, options: JobOptions) -> JobHandle {
        self.play("mkdir", vec![url], options, false)
    }

    fn rename(&self, src: Url, dest: Url, _overwrite: bool, options: JobOptions) -> JobHandle {
        self.play("rename", vec![src, dest], options, false)
    }

    fn symlink(
        &self,
        _target: String,
        dest: Url,
        _overwrite: bool,
        options: JobOptions,
    ) -> JobHandle {
        self.play("symlink", vec![dest], options, false)
    }

    fn chmod(&self, url: Url, _permissions: u32, options: JobOptions) -> JobHandle {
        self.play("chmod", vec![url], options, false)
    }

    fn set_modification_time(
        &self,
        url: Url,
        _mtime: chrono::DateTime<chrono::Utc>,
        options: JobOptions,
    ) -> JobHandle {
        self.play("set_modification_time", vec![url], options, false)
    }

    fn copy(
        &self,
        src: Url,
        dest: Url,
        _permissions: Option<u32>,
        _overwrite: bool,
        options: JobOptions,
    ) -> JobHandle {
        self.play("copy", vec![src, dest], options, false)
    }

    fn delete_file(&self, url: Url, options: JobOptions) -> JobHandle {
        self.play("delete_file", vec![url], options, false)
    }

    fn remove_dir(&self, url: Url, options: JobOptions) -> JobHandle {
        self.play("remove_dir", vec![url], options, false)
    }
}

/// Channel that records replies and feeds scripted upload chunks.
#[derive(Default)]
struct RecordingChannel {
    replies: Arc<Mutex<Vec<Reply>>>,
    uploads: Mutex<VecDeque<Vec<u8>>>,
}

impl RecordingChannel {
    fn queue_upload(&self, chunk: &[u8]) {
        self.uploads
            .lock()
            .expect("uploads mutex")
            .push_back(chunk.to_vec());
    }

    fn replies(&self) -> Vec<Reply> {
        self.replies.lock().expect("replies mutex").clone()
    }
}

#[async_trait]
impl ClientChannel for RecordingChannel {
    async fn send(&self, reply: Reply) -> anyhow::Result<()> {
        self.replies.lock().expect("replies mutex").push(reply);
        Ok(())
    }

    async fn read_data(&self) -> anyhow::Result<Vec<u8>> {
        Ok(self
            .uploads
            .lock()
            .expect("uploads mutex")
            .pop_front()
            .unwrap_or_default())
    }
}

/// Test policy: `media:/x` maps to `file:///mnt/x`; anything under
/// `/forbidden` is refused.
struct MediaPolicy;

impl RewritePolicy for MediaPolicy {
    fn rewrite_url(&self, url: &Url) -> JobResult<Url> {
        if url.path().starts_with("/forbidden") {
            return Err(JobError::new(
                ErrorCode::UnsupportedScheme,
                format!("no underlying location for {url}"),
            ));
        }
        Url::parse(&format!("file:///mnt{}", url.path()))
            .map_err(|err| JobError::new(ErrorCode::MalformedUrl, err.to_string()))
    }
}

struct Harness {
    forwarder: Forwarder,
    backend: Arc<ScriptedBackend>,
    channel: Arc<RecordingChannel>,
}

fn harness() -> Harness {
    let backend = Arc::new(ScriptedBackend::default());
    let channel = Arc::new(RecordingChannel::default());
    let forwarder = Forwarder::new(
        "media",
        Arc::new(MediaPolicy),
        Arc::clone(&backend) as Arc<dyn JobBackend>,
        Arc::clone(&channel) as Arc<dyn ClientChannel>,
    );
    Harness {
        forwarder,
        backend,
        channel,
    }
}

fn issued(backend: &ScriptedBackend) -> Vec<IssuedJob> {
    backend.calls.lock().expect("calls mutex").clone()
}

#[tokio::test]
async fn rewrite_is_idempotent_across_operations() {
    let h = harness();
    let target = url("media:/cdrom/foo.txt");
    h.forwarder.stat(&target).await.expect("first stat");
    h.forwarder.stat(&target).await.expect("second stat");

    let calls = issued(&h.backend);
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].urls, calls[1].urls);
    assert_eq!(calls[0].urls[0], url("file:///mnt/cdrom/foo.txt"));
}

#[tokio::test]
async fn foreign_schemes_pass_through_unchanged() {
    let h = harness();
    let foreign = url("sftp://host/share/file.bin");
    h.forwarder.get(&foreign).await.expect("get");

    let calls = issued(&h.backend);
    assert_eq!(calls.len(), 1, "passthrough still issues the job");
    assert_eq!(calls[0].urls[0], foreign);
    assert_eq!(h.channel.replies(), vec![Reply::Finished]);
}

#[tokio::test]
async fn stat_result_is_rewritten_into_the_worker_namespace() {
    let h = harness();
    let mut entry = VfsEntry::new();
    entry.set_name("foo.txt");
    entry.set_url(&url("file:///mnt/cdrom/foo.txt"));
    h.backend.script(
        "stat",
        vec![JobEvent::StatReady { entry }, JobEvent::Finished],
    );

    h.forwarder
        .stat(&url("media:/cdrom/foo.txt"))
        .await
        .expect("stat");

    let replies = h.channel.replies();
    assert_eq!(replies.len(), 2);
    let Reply::StatEntry { entry } = &replies[0] else {
        panic!("expected a stat entry, got {:?}", replies[0]);
    };
    assert_eq!(entry.url(), Some(url("media:/cdrom/foo.txt")));
    assert_eq!(
        entry.local_path(),
        Some(std::path::PathBuf::from("/mnt/cdrom/foo.txt"))
    );
    assert_eq!(entry.mime_type(), Some("text/plain"));
    assert_eq!(replies[1], Reply::Finished);
}

#[tokio::test]
async fn listing_urls_land_under_the_requested_url() {
    let h = harness();

    let mut file = VfsEntry::new();
    file.set_name("a.txt");
    file.set_url(&url("file:///mnt/cdrom/a.txt"));

    let mut dir = VfsEntry::new();
    dir.set_name("sub");
    dir.set_kind(ResourceKind::Directory);
    dir.set_url(&url("file:///mnt/cdrom/sub/"));

    h.backend.script(
        "list_dir",
        vec![
            JobEvent::Entries {
                entries: vec![file, dir],
            },
            JobEvent::Finished,
        ],
    );

    h.forwarder
        .list_dir(&url("media:/cdrom/"))
        .await
        .expect("list_dir");

    let replies = h.channel.replies();
    let Reply::ListEntries { entries } = &replies[0] else {
        panic!("expected entries, got {:?}", replies[0]);
    };
    assert_eq!(entries[0].url(), Some(url("media:/cdrom/a.txt")));
    assert_eq!(entries[1].url(), Some(url("media:/cdrom/sub/")));
    for entry in entries {
        let rewritten = entry.url().expect("url present");
        assert_eq!(rewritten.scheme(), "media", "no processed URL may leak");
    }
}

#[tokio::test]
async fn empty_mime_types_are_filled_in_listings() {
    let h = harness();

    let mut entry = VfsEntry::new();
    entry.set_name("photo.png");
    entry.set_mime_type("");
    h.backend.script(
        "list_dir",
        vec![
            JobEvent::Entries {
                entries: vec![entry],
            },
            JobEvent::Finished,
        ],
    );

    h.forwarder
        .list_dir(&url("media:/cdrom/"))
        .await
        .expect("list_dir");

    let Reply::ListEntries { entries } = &h.channel.replies()[0] else {
        panic!("expected entries");
    };
    assert_eq!(entries[0].mime_type(), Some("image/png"));
}

#[tokio::test]
async fn local_path_is_attached_only_for_local_processed_urls() {
    let h = harness();

    let mut entry = VfsEntry::new();
    entry.set_name("a.txt");
    h.backend.script(
        "list_dir",
        vec![
            JobEvent::Entries {
                entries: vec![entry.clone()],
            },
            JobEvent::Finished,
        ],
    );
    h.forwarder
        .list_dir(&url("media:/cdrom/"))
        .await
        .expect("local list");
    let Reply::ListEntries { entries } = &h.channel.replies()[0] else {
        panic!("expected entries");
    };
    assert_eq!(
        entries[0].local_path(),
        Some(std::path::PathBuf::from("/mnt/cdrom/a.txt"))
    );

    // A foreign-scheme URL passes through with a non-local processed URL,
    // so no local path may be attached.
    let h = harness();
    h.backend.script(
        "list_dir",
        vec![
            JobEvent::Entries {
                entries: vec![entry],
            },
            JobEvent::Finished,
        ],
    );
    h.forwarder
        .list_dir(&url("sftp://host/share/"))
        .await
        .expect("remote list");
    let Reply::ListEntries { entries } = &h.channel.replies()[0] else {
        panic!("expected entries");
    };
    assert!(entries[0].local_path().is_none());
}

#[tokio::test]
async fn job_failures_pass_through_verbatim() {
    let h = harness();
    h.backend.script(
        "get",
        vec![JobEvent::Failed {
            error: JobError::new(ErrorCode::CouldNotRead, "get /mnt/cdrom/a.txt: boom"),
        }],
    );

    h.forwarder
        .get(&url("media:/cdrom/a.txt"))
        .await
        .expect("get");

    assert_eq!(
        h.channel.replies(),
        vec![Reply::Error {
            code: ErrorCode::CouldNotRead,
            message: "get /mnt/cdrom/a.txt: boom".into(),
        }],
        "a failure emits exactly one error and no finished"
    );
}

#[tokio::test]
async fn redirection_short_circuits_with_finished_and_no_error() {
    let h = harness();
    h.backend.script(
        "get",
        vec![
            JobEvent::Redirection {
                target: url("media:/dvd/a.txt"),
            },
            // Anything after the redirection must never reach the client.
            JobEvent::Data {
                chunk: b"stale".to_vec(),
            },
            JobEvent::Finished,
        ],
    );

    h.forwarder
        .get(&url("media:/cdrom/a.txt"))
        .await
        .expect("get");

    assert_eq!(
        h.channel.replies(),
        vec![
            Reply::Redirection {
                target: url("media:/dvd/a.txt"),
            },
            Reply::Finished,
        ]
    );
}

#[tokio::test]
async fn rename_and_copy_ignore_redirections() {
    let h = harness();
    h.backend.script(
        "rename",
        vec![
            JobEvent::Redirection {
                target: url("media:/elsewhere"),
            },
            JobEvent::Finished,
        ],
    );

    h.forwarder
        .rename(&url("media:/cdrom/a"), &url("media:/cdrom/b"), false)
        .await
        .expect("rename");

    assert_eq!(h.channel.replies(), vec![Reply::Finished]);
}

#[tokio::test]
async fn rename_requires_both_endpoints_to_rewrite() {
    let h = harness();
    h.forwarder
        .rename(&url("media:/cdrom/a"), &url("media:/forbidden/b"), false)
        .await
        .expect("rename");

    assert!(issued(&h.backend).is_empty(), "no job may be issued");
    let replies = h.channel.replies();
    assert_eq!(replies.len(), 1);
    let Reply::Error { code, message } = &replies[0] else {
        panic!("expected an error, got {:?}", replies[0]);
    };
    assert_eq!(*code, ErrorCode::UnsupportedScheme);
    assert!(message.contains("media:/forbidden/b"));
}

#[tokio::test]
async fn progress_events_relay_in_order() {
    let h = harness();
    h.backend.script(
        "get",
        vec![
            JobEvent::MimeType {
                mime: "text/plain".into(),
            },
            JobEvent::TotalSize { bytes: 8 },
            JobEvent::Data {
                chunk: b"payload!".to_vec(),
            },
            JobEvent::ProcessedSize { bytes: 8 },
            JobEvent::Speed {
                bytes_per_second: 1_024,
            },
            JobEvent::Warning {
                message: "slow medium".into(),
            },
            JobEvent::Info {
                message: "nearly there".into(),
            },
            JobEvent::Finished,
        ],
    );

    h.forwarder
        .get(&url("media:/cdrom/a.txt"))
        .await
        .expect("get");

    let kinds: Vec<&str> = h.channel.replies().iter().map(Reply::kind).collect();
    assert_eq!(
        kinds,
        vec![
            "mime_type",
            "total_size",
            "data",
            "processed_size",
            "speed",
            "warning",
            "info_message",
            "finished",
        ]
    );
}

#[tokio::test]
async fn put_pulls_upload_chunks_through_the_channel() {
    let h = harness();
    h.channel.queue_upload(b"first");
    h.channel.queue_upload(b"second");
    h.channel.queue_upload(b"");
    h.backend.script(
        "put",
        vec![
            JobEvent::DataRequest,
            JobEvent::DataRequest,
            JobEvent::DataRequest,
            JobEvent::Finished,
        ],
    );

    h.forwarder
        .put(&url("media:/cdrom/out.bin"), None, true, false)
        .await
        .expect("put");

    let chunks = h.backend.chunks.lock().expect("chunks mutex").clone();
    assert_eq!(
        chunks,
        vec![b"first".to_vec(), b"second".to_vec(), Vec::new()]
    );

    let kinds: Vec<&str> = h.channel.replies().iter().map(Reply::kind).collect();
    assert_eq!(
        kinds,
        vec!["data_request", "data_request", "data_request", "finished"]
    );
}

#[tokio::test]
async fn jobs_carry_worker_metadata_and_stay_non_interactive() {
    let h = harness();
    h.forwarder.set_metadata("modified", "2026-01-02T03:04:05Z");

    h.forwarder
        .put(&url("media:/cdrom/out.bin"), Some(0o644), false, false)
        .await
        .expect("put");

    let calls = issued(&h.backend);
    assert_eq!(calls.len(), 1);
    assert!(!calls[0].interactive, "the forwarder owns error reporting");
    assert_eq!(
        calls[0].meta.get("modified").map(String::as_str),
        Some("2026-01-02T03:04:05Z")
    );

    h.forwarder.clear_metadata();
    h.forwarder
        .stat(&url("media:/cdrom/out.bin"))
        .await
        .expect("stat");
    assert!(issued(&h.backend)[1].meta.is_empty());
}

#[tokio::test]
async fn del_dispatches_on_the_file_flag() {
    let h = harness();
    h.forwarder
        .del(&url("media:/cdrom/a.txt"), true)
        .await
        .expect("del file");
    h.forwarder
        .del(&url("media:/cdrom/sub"), false)
        .await
        .expect("del dir");

    let calls = issued(&h.backend);
    assert_eq!(calls[0].operation, "delete_file");
    assert_eq!(calls[1].operation, "remove_dir");
}

#[tokio::test]
async fn remaining_operations_forward_rewritten_urls() {
    let h = harness();
    h.forwarder
        .mimetype(&url("media:/cdrom/a.txt"))
        .await
        .expect("mimetype");
    h.forwarder
        .mkdir(&url("media:/cdrom/newdir"), Some(0o755))
        .await
        .expect("mkdir");
    h.forwarder
        .symlink("a.txt", &url("media:/cdrom/link"), false)
        .await
        .expect("symlink");
    h.forwarder
        .chmod(&url("media:/cdrom/a.txt"), 0o600)
        .await
        .expect("chmod");
    h.forwarder
        .set_modification_time(&url("media:/cdrom/a.txt"), chrono::Utc::now())
        .await
        .expect("settime");
    h.forwarder
        .copy(
            &url("media:/cdrom/a.txt"),
            &url("media:/cdrom/b.txt"),
            None,
            false,
        )
        .await
        .expect("copy");

    let calls = issued(&h.backend);
    let operations: Vec<&str> = calls.iter().map(|call| call.operation).collect();
    assert_eq!(
        operations,
        vec![
            "mimetype",
            "mkdir",
            "symlink",
            "chmod",
            "set_modification_time",
            "copy",
        ]
    );
    for call in &calls {
        for issued_url in &call.urls {
            assert_eq!(issued_url.scheme(), "file");
            assert!(issued_url.path().starts_with("/mnt/cdrom"));
        }
    }
}

#[tokio::test]
async fn vanished_jobs_surface_an_internal_error() {
    let h = harness();
    h.backend
        .script("get", vec![JobEvent::TotalSize { bytes: 4 }]);

    h.forwarder
        .get(&url("media:/cdrom/a.txt"))
        .await
        .expect("get");

    let replies = h.channel.replies();
    assert_eq!(replies[0], Reply::TotalSize { bytes: 4 });
    let Reply::Error { code, .. } = &replies[1] else {
        panic!("expected an error, got {:?}", replies[1]);
    };
    assert_eq!(*code, ErrorCode::Internal);
}
