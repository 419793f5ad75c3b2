//! Mount-table rewrite policy.
//!
//! Maps virtual paths under the worker scheme onto underlying URLs by
//! longest-prefix match, e.g. `media:/cdrom/foo.txt` onto
//! `file:///mnt/cdrom/foo.txt`.

use url::Url;

use ferry_config::{MountPoint, WorkerConfig};
use ferry_forward::RewritePolicy;
use ferry_jobs::{ErrorCode, JobError, JobResult};

/// Rewrite policy backed by a configured mount table.
pub struct MountPolicy {
    mounts: Vec<MountPoint>,
}

impl MountPolicy {
    /// Policy over the given mounts. Longer prefixes win over shorter ones.
    #[must_use]
    pub fn new(mut mounts: Vec<MountPoint>) -> Self {
        mounts.sort_by_key(|mount| std::cmp::Reverse(mount.prefix.len()));
        Self { mounts }
    }

    /// Policy over a worker configuration's mount table.
    #[must_use]
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.mounts.clone())
    }
}

impl RewritePolicy for MountPolicy {
    fn rewrite_url(&self, url: &Url) -> JobResult<Url> {
        let path = url.path();
        for mount in &self.mounts {
            let Some(rest) = strip_mount_prefix(path, &mount.prefix) else {
                continue;
            };
            return joined(&mount.target, rest);
        }
        Err(JobError::new(
            ErrorCode::DoesNotExist,
            format!("{url}: no mount covers this location"),
        ))
    }
}

/// Remainder of `path` under `prefix`, or `None` when the prefix does not
/// cover it. A prefix boundary must fall on a path separator.
fn strip_mount_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix == "/" {
        return Some(path);
    }
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

fn joined(target: &Url, rest: &str) -> JobResult<Url> {
    if rest.is_empty() {
        return Ok(target.clone());
    }
    let mut url = target.clone();
    let base = target.path().trim_end_matches('/');
    url.set_path(&format!("{base}{rest}"));
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).expect("test url")
    }

    fn mount(prefix: &str, target: &str) -> MountPoint {
        MountPoint {
            prefix: prefix.to_string(),
            target: url(target),
        }
    }

    #[test]
    fn maps_prefixes_onto_targets() {
        let policy = MountPolicy::new(vec![mount("/cdrom", "file:///mnt/cdrom/")]);
        assert_eq!(
            policy.rewrite_url(&url("media:/cdrom/foo.txt")).expect("rewrite"),
            url("file:///mnt/cdrom/foo.txt")
        );
        assert_eq!(
            policy.rewrite_url(&url("media:/cdrom")).expect("rewrite"),
            url("file:///mnt/cdrom/")
        );
    }

    #[test]
    fn keeps_directory_shape() {
        let policy = MountPolicy::new(vec![mount("/cdrom", "file:///mnt/cdrom/")]);
        assert_eq!(
            policy.rewrite_url(&url("media:/cdrom/sub/")).expect("rewrite"),
            url("file:///mnt/cdrom/sub/")
        );
    }

    #[test]
    fn longest_prefix_wins() {
        let policy = MountPolicy::new(vec![
            mount("/disk", "file:///mnt/disk/"),
            mount("/disk/fast", "file:///mnt/ssd/"),
        ]);
        assert_eq!(
            policy.rewrite_url(&url("media:/disk/fast/a")).expect("rewrite"),
            url("file:///mnt/ssd/a")
        );
        assert_eq!(
            policy.rewrite_url(&url("media:/disk/slow/a")).expect("rewrite"),
            url("file:///mnt/disk/slow/a")
        );
    }

    #[test]
    fn prefix_boundaries_respect_separators() {
        let policy = MountPolicy::new(vec![mount("/cd", "file:///mnt/cd/")]);
        let err = policy
            .rewrite_url(&url("media:/cdrom/foo"))
            .expect_err("no mount covers /cdrom");
        assert_eq!(err.code, ErrorCode::DoesNotExist);
    }

    #[test]
    fn root_mount_covers_everything() {
        let policy = MountPolicy::new(vec![mount("/", "file:///srv/share/")]);
        assert_eq!(
            policy.rewrite_url(&url("media:/anything/here")).expect("rewrite"),
            url("file:///srv/share/anything/here")
        );
    }

    #[test]
    fn unmatched_locations_report_does_not_exist() {
        let policy = MountPolicy::new(vec![mount("/cdrom", "file:///mnt/cdrom/")]);
        let err = policy
            .rewrite_url(&url("media:/floppy/a.txt"))
            .expect_err("unmatched");
        assert_eq!(err.code, ErrorCode::DoesNotExist);
        assert!(err.message.contains("media:/floppy/a.txt"));
    }
}
