//! Rewrite policy hook and stat-record rewriting.
//!
//! A policy decides how URLs under the worker's own scheme map onto
//! underlying URLs, and may post-process stat records beyond the standard
//! rewriting (e.g. presenting an archive file as a synthetic directory).

use url::Url;

use ferry_jobs::JobResult;
use ferry_vfs::{VfsEntry, append_name, file_name, local_path, sniff_mime_type};

/// The URL pair for one in-flight operation.
///
/// `requested` is exactly what the client asked for; `processed` is what the
/// operation actually targets after rewriting. Both are needed to map names
/// found under the processed URL back into the requested namespace.
#[derive(Debug, Clone)]
pub struct RequestContext {
    requested: Url,
    processed: Url,
}

impl RequestContext {
    pub(crate) const fn new(requested: Url, processed: Url) -> Self {
        Self {
            requested,
            processed,
        }
    }

    /// The URL the client asked for.
    #[must_use]
    pub const fn requested(&self) -> &Url {
        &self.requested
    }

    /// The URL the operation was actually issued against.
    #[must_use]
    pub const fn processed(&self) -> &Url {
        &self.processed
    }
}

/// Protocol-specific policy supplied by each concrete worker.
pub trait RewritePolicy: Send + Sync {
    /// Map a URL under the worker's scheme onto its underlying counterpart.
    ///
    /// Any transformation is allowed (scheme, host, path). A failure aborts
    /// the operation; the returned error reaches the client verbatim and no
    /// underlying job is issued.
    ///
    /// # Errors
    ///
    /// Returns the job error to report when the URL has no underlying
    /// counterpart (e.g. an unsupported target).
    fn rewrite_url(&self, url: &Url) -> JobResult<Url>;

    /// Post-process one stat record before it is handed to the client.
    ///
    /// The default performs the standard rewriting (see [`rewrite_entry`]);
    /// override it for protocols that synthesise additional structure.
    fn prepare_entry(&self, context: &RequestContext, entry: &mut VfsEntry, listing: bool) {
        rewrite_entry(context, entry, listing);
    }
}

/// Leaf name of an embedded entry URL, keeping directory shape.
fn entry_leaf(url: &Url) -> Option<String> {
    file_name(url).map(|mut name| {
        if url.path().ends_with('/') {
            name.push('/');
        }
        name
    })
}

/// Standard rewriting of one stat record from the processed namespace back
/// into the requested namespace.
///
/// Three rules, applied in order:
/// 1. an embedded URL is replaced by the requested URL (with the entry's
///    leaf name appended when listing);
/// 2. an empty or missing mime type is filled in by sniffing the corrected
///    location;
/// 3. when the processed URL is local, the entry gains a local-path
///    attribute pointing at the real on-disk location.
pub fn rewrite_entry(context: &RequestContext, entry: &mut VfsEntry, listing: bool) {
    let name = entry.name().map(str::to_string);
    let embedded = entry.url();

    if let Some(embedded) = &embedded {
        let mut corrected = context.requested().clone();
        if listing
            && let Some(leaf) = entry_leaf(embedded)
        {
            corrected = append_name(&corrected, &leaf);
        }
        entry.set_url(&corrected);
    }

    if entry.mime_type().is_none_or(str::is_empty) {
        if entry.is_dir() {
            entry.set_mime_type(ferry_vfs::DIRECTORY_MIME);
        } else {
            let mut probe = context.processed().clone();
            if listing {
                if let Some(embedded) = &embedded {
                    if let Some(leaf) = entry_leaf(embedded) {
                        probe = append_name(&probe, &leaf);
                    }
                } else if let Some(name) = &name {
                    probe = append_name(&probe, name);
                }
            }
            entry.set_mime_type(sniff_mime_type(&probe));
        }
    }

    if let Some(mut path) = local_path(context.processed()) {
        if listing && let Some(name) = &name {
            path.push(name);
        }
        entry.set_local_path(&path);
    }
}
