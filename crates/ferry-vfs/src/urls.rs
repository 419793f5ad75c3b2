//! URL helpers shared by backends and the forwarding layer.
//!
//! Names handed around here stay in the URL's encoded form; callers that need
//! an on-disk path go through [`local_path`], which decodes properly.

use std::path::PathBuf;

use url::Url;

/// Scheme used by resources that live on the local filesystem.
pub const FILE_SCHEME: &str = "file";

/// Append a file name to a URL's path, handling trailing slashes on either
/// side. A name ending in `/` keeps the result directory-shaped.
#[must_use]
pub fn append_name(base: &Url, name: &str) -> Url {
    let mut url = base.clone();
    let directory = name.ends_with('/');
    let trimmed = name.trim_matches('/');
    if trimmed.is_empty() {
        return url;
    }

    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push(trimmed);
        if directory {
            segments.push("");
        }
    }
    url
}

/// Last non-empty path segment of a URL, in encoded form.
#[must_use]
pub fn file_name(url: &Url) -> Option<String> {
    url.path_segments()
        .and_then(|segments| segments.rev().find(|segment| !segment.is_empty()))
        .map(str::to_string)
}

/// Whether the URL denotes a local filesystem resource.
#[must_use]
pub fn is_local(url: &Url) -> bool {
    url.scheme() == FILE_SCHEME
}

/// On-disk path for a local URL, `None` for any other scheme.
#[must_use]
pub fn local_path(url: &Url) -> Option<PathBuf> {
    if is_local(url) {
        url.to_file_path().ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).expect("test url")
    }

    #[test]
    fn append_name_joins_with_single_slash() {
        let base = url("media:/cdrom");
        assert_eq!(append_name(&base, "a.txt").as_str(), "media:/cdrom/a.txt");

        let trailing = url("media:/cdrom/");
        assert_eq!(
            append_name(&trailing, "a.txt").as_str(),
            "media:/cdrom/a.txt"
        );
    }

    #[test]
    fn append_name_keeps_directory_shape() {
        let base = url("media:/cdrom/");
        assert_eq!(append_name(&base, "sub/").as_str(), "media:/cdrom/sub/");
    }

    #[test]
    fn append_name_ignores_empty_names() {
        let base = url("file:///mnt/cdrom");
        assert_eq!(append_name(&base, "").as_str(), base.as_str());
        assert_eq!(append_name(&base, "/").as_str(), base.as_str());
    }

    #[test]
    fn file_name_skips_trailing_slash() {
        assert_eq!(file_name(&url("media:/cdrom/a.txt")).as_deref(), Some("a.txt"));
        assert_eq!(file_name(&url("media:/cdrom/sub/")).as_deref(), Some("sub"));
        assert_eq!(file_name(&url("media:/")), None);
    }

    #[test]
    fn local_path_only_for_file_scheme() {
        assert_eq!(
            local_path(&url("file:///mnt/cdrom/a.txt")),
            Some(PathBuf::from("/mnt/cdrom/a.txt"))
        );
        assert!(local_path(&url("media:/cdrom/a.txt")).is_none());
        assert!(!is_local(&url("media:/cdrom")));
        assert!(is_local(&url("file:///tmp")));
    }
}
