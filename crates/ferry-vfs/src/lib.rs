//! Shared virtual-filesystem data model for the Ferry workspace.
//!
//! Hosts the attribute-map stat record exchanged between job backends and
//! protocol workers, plus the URL and mime helpers both sides rely on. The
//! crate is deliberately IO-free; everything here is pure data handling.

pub mod entry;
pub mod mime;
pub mod urls;

pub use entry::{EntryField, FieldValue, ResourceKind, VfsEntry};
pub use mime::{DIRECTORY_MIME, FALLBACK_MIME, sniff_mime_type};
pub use urls::{append_name, file_name, is_local, local_path};
