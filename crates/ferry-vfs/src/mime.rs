//! Mime type sniffing keyed off a resource URL.

use std::path::Path;

use url::Url;

use crate::urls::file_name;

/// Mime type reported for directory-shaped URLs.
pub const DIRECTORY_MIME: &str = "inode/directory";

/// Fallback mime type when no pattern matches.
pub const FALLBACK_MIME: &str = "application/octet-stream";

/// Guess a mime type from the URL's file name.
///
/// URLs whose path ends in `/` (and scheme roots without any file name) are
/// reported as directories. Everything else is matched against the extension
/// registry, falling back to a generic binary type.
#[must_use]
pub fn sniff_mime_type(url: &Url) -> String {
    if url.path().ends_with('/') {
        return DIRECTORY_MIME.to_string();
    }

    file_name(url).map_or_else(
        || DIRECTORY_MIME.to_string(),
        |name| {
            mime_guess::from_path(Path::new(&name))
                .first_raw()
                .unwrap_or(FALLBACK_MIME)
                .to_string()
        },
    )
}
