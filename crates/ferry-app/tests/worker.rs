//! End-to-end behaviour of the media-style worker over a real scratch tree.

use std::sync::Arc;

use url::Url;

use ferry_app::{MountPolicy, OpRequest, dispatch};
use ferry_config::MountPoint;
use ferry_forward::{ClientChannel, Forwarder, Reply};
use ferry_jobs::{ErrorCode, JobBackend};
use ferry_jobs_local::LocalFsBackend;
use ferry_test_support::fixtures::ScratchTree;
use ferry_test_support::mocks::RecordingChannel;

fn url(raw: &str) -> Url {
    Url::parse(raw).expect("test url")
}

/// A `media:` worker whose `/cdrom` mount points at the scratch tree.
fn media_worker(tree: &ScratchTree) -> (Forwarder, Arc<RecordingChannel>) {
    let channel = Arc::new(RecordingChannel::new());
    let policy = Arc::new(MountPolicy::new(vec![MountPoint {
        prefix: "/cdrom".to_string(),
        target: tree.url(),
    }]));
    let backend: Arc<dyn JobBackend> = Arc::new(LocalFsBackend::new());
    let forwarder = Forwarder::new(
        "media",
        policy,
        backend,
        Arc::clone(&channel) as Arc<dyn ClientChannel>,
    );
    (forwarder, channel)
}

#[tokio::test]
async fn stat_presents_the_worker_namespace() -> anyhow::Result<()> {
    let tree = ScratchTree::new()?;
    let (forwarder, channel) = media_worker(&tree);

    dispatch(
        &forwarder,
        OpRequest::Stat {
            url: url("media:/cdrom/notes.txt"),
        },
    )
    .await?;

    let replies = channel.replies();
    let Reply::StatEntry { entry } = &replies[0] else {
        panic!("expected a stat entry, got {:?}", replies[0]);
    };
    assert_eq!(entry.url(), Some(url("media:/cdrom/notes.txt")));
    assert_eq!(entry.local_path(), Some(tree.path().join("notes.txt")));
    assert_eq!(entry.mime_type(), Some("text/plain"));
    assert_eq!(replies[1], Reply::Finished);
    Ok(())
}

#[tokio::test]
async fn listing_presents_the_worker_namespace() -> anyhow::Result<()> {
    let tree = ScratchTree::new()?;
    let (forwarder, channel) = media_worker(&tree);

    dispatch(
        &forwarder,
        OpRequest::ListDir {
            url: url("media:/cdrom/"),
        },
    )
    .await?;

    let mut listed: Vec<String> = channel
        .replies()
        .iter()
        .filter_map(|reply| match reply {
            Reply::ListEntries { entries } => Some(entries.clone()),
            _ => None,
        })
        .flatten()
        .filter_map(|entry| entry.url().map(|entry_url| entry_url.to_string()))
        .collect();
    listed.sort();
    assert_eq!(
        listed,
        vec![
            "media:/cdrom/notes.txt",
            "media:/cdrom/photo.png",
            "media:/cdrom/sub/",
        ]
    );
    assert_eq!(channel.kinds().last(), Some(&"finished"));
    Ok(())
}

#[tokio::test]
async fn get_streams_the_underlying_file() -> anyhow::Result<()> {
    let tree = ScratchTree::new()?;
    let (forwarder, channel) = media_worker(&tree);

    dispatch(
        &forwarder,
        OpRequest::Get {
            url: url("media:/cdrom/notes.txt"),
        },
    )
    .await?;

    let kinds = channel.kinds();
    assert_eq!(&kinds[..2], ["mime_type", "total_size"]);
    assert_eq!(kinds.last(), Some(&"finished"));

    let payload: Vec<u8> = channel
        .replies()
        .iter()
        .filter_map(|reply| match reply {
            Reply::Data { chunk } => Some(chunk.clone()),
            _ => None,
        })
        .flatten()
        .collect();
    assert_eq!(payload, b"ferry sample notes\n");
    Ok(())
}

#[tokio::test]
async fn put_writes_through_the_mount() -> anyhow::Result<()> {
    let tree = ScratchTree::new()?;
    let (forwarder, channel) = media_worker(&tree);
    channel.queue_upload(b"fresh content");
    channel.queue_upload(b"");

    dispatch(
        &forwarder,
        OpRequest::Put {
            url: url("media:/cdrom/created.txt"),
            permissions: None,
            overwrite: false,
            resume: false,
        },
    )
    .await?;

    assert_eq!(channel.kinds().last(), Some(&"finished"));
    assert_eq!(
        std::fs::read(tree.path().join("created.txt"))?,
        b"fresh content"
    );
    Ok(())
}

#[tokio::test]
async fn unmounted_locations_report_does_not_exist() -> anyhow::Result<()> {
    let tree = ScratchTree::new()?;
    let (forwarder, channel) = media_worker(&tree);

    dispatch(
        &forwarder,
        OpRequest::Stat {
            url: url("media:/floppy/a.txt"),
        },
    )
    .await?;

    let replies = channel.replies();
    assert_eq!(replies.len(), 1, "a refused rewrite aborts the operation");
    let Reply::Error { code, .. } = &replies[0] else {
        panic!("expected an error, got {:?}", replies[0]);
    };
    assert_eq!(*code, ErrorCode::DoesNotExist);
    Ok(())
}

#[tokio::test]
async fn mkdir_and_del_round_trip_through_the_mount() -> anyhow::Result<()> {
    let tree = ScratchTree::new()?;
    let (forwarder, channel) = media_worker(&tree);

    dispatch(
        &forwarder,
        OpRequest::Mkdir {
            url: url("media:/cdrom/burn"),
            permissions: None,
        },
    )
    .await?;
    assert!(tree.path().join("burn").is_dir());

    dispatch(
        &forwarder,
        OpRequest::Del {
            url: url("media:/cdrom/burn"),
            is_file: false,
        },
    )
    .await?;
    assert!(!tree.path().join("burn").exists());
    assert_eq!(channel.kinds(), vec!["finished", "finished"]);
    Ok(())
}
