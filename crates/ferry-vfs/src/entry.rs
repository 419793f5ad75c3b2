//! Attribute-map stat records describing one filesystem resource.
//!
//! An entry is a small map from well-known fields to text or numeric values.
//! Backends fill entries when answering `stat` and `list_dir`; the forwarding
//! layer rewrites them in place before they reach the client.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

/// Well-known attribute keys carried by a [`VfsEntry`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EntryField {
    /// File name relative to the directory being listed.
    Name,
    /// Size in bytes.
    Size,
    /// Resource kind (file, directory, symlink).
    Kind,
    /// Unix permission bits.
    Access,
    /// Owning user name.
    User,
    /// Owning group name.
    Group,
    /// Modification time as seconds since the Unix epoch.
    ModificationTime,
    /// Access time as seconds since the Unix epoch.
    AccessTime,
    /// Symlink target, when the resource is a link.
    LinkDest,
    /// Full URL of the resource, when the producer chose to embed one.
    Url,
    /// Mime type, possibly empty until filled in by sniffing.
    MimeType,
    /// On-disk path when the resource lives on a local filesystem.
    LocalPath,
    /// Whether the resource should be hidden from directory views.
    Hidden,
}

/// Value stored under an [`EntryField`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Numeric attribute (sizes, times, permission bits, flags).
    Number(u64),
    /// Textual attribute (names, URLs, mime types, paths).
    Text(String),
}

/// Coarse resource kind stored under [`EntryField::Kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
}

impl ResourceKind {
    const fn as_number(self) -> u64 {
        match self {
            Self::File => 0,
            Self::Directory => 1,
            Self::Symlink => 2,
        }
    }

    const fn from_number(value: u64) -> Option<Self> {
        match value {
            0 => Some(Self::File),
            1 => Some(Self::Directory),
            2 => Some(Self::Symlink),
            _ => None,
        }
    }
}

/// One stat-result record: a mapping from attribute keys to values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VfsEntry {
    fields: BTreeMap<EntryField, FieldValue>,
}

impl VfsEntry {
    /// Create an empty entry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a textual value, replacing any previous value for the field.
    pub fn insert_text(&mut self, field: EntryField, value: impl Into<String>) {
        self.fields.insert(field, FieldValue::Text(value.into()));
    }

    /// Store a numeric value, replacing any previous value for the field.
    pub fn insert_number(&mut self, field: EntryField, value: u64) {
        self.fields.insert(field, FieldValue::Number(value));
    }

    /// Remove a field, if present.
    pub fn remove(&mut self, field: EntryField) {
        self.fields.remove(&field);
    }

    /// Whether the entry carries the given field.
    #[must_use]
    pub fn contains(&self, field: EntryField) -> bool {
        self.fields.contains_key(&field)
    }

    /// Textual value of a field, when present and textual.
    #[must_use]
    pub fn text(&self, field: EntryField) -> Option<&str> {
        match self.fields.get(&field) {
            Some(FieldValue::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Numeric value of a field, when present and numeric.
    #[must_use]
    pub fn number(&self, field: EntryField) -> Option<u64> {
        match self.fields.get(&field) {
            Some(FieldValue::Number(value)) => Some(*value),
            _ => None,
        }
    }

    /// Number of populated fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the entry carries no fields at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// File name relative to the listed directory.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.text(EntryField::Name)
    }

    /// Set the relative file name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.insert_text(EntryField::Name, name);
    }

    /// Mime type, if one has been recorded. An empty string counts as
    /// recorded-but-unknown and is returned as-is.
    #[must_use]
    pub fn mime_type(&self) -> Option<&str> {
        self.text(EntryField::MimeType)
    }

    /// Set the mime type.
    pub fn set_mime_type(&mut self, mime: impl Into<String>) {
        self.insert_text(EntryField::MimeType, mime);
    }

    /// Embedded resource URL, parsed, when present and well-formed.
    #[must_use]
    pub fn url(&self) -> Option<Url> {
        self.text(EntryField::Url).and_then(|raw| Url::parse(raw).ok())
    }

    /// Set the embedded resource URL.
    pub fn set_url(&mut self, url: &Url) {
        self.insert_text(EntryField::Url, url.as_str());
    }

    /// Local filesystem path, when the resource is locally reachable.
    #[must_use]
    pub fn local_path(&self) -> Option<PathBuf> {
        self.text(EntryField::LocalPath).map(PathBuf::from)
    }

    /// Set the local filesystem path.
    pub fn set_local_path(&mut self, path: &Path) {
        self.insert_text(EntryField::LocalPath, path.to_string_lossy());
    }

    /// Size in bytes, when recorded.
    #[must_use]
    pub fn size(&self) -> Option<u64> {
        self.number(EntryField::Size)
    }

    /// Set the size in bytes.
    pub fn set_size(&mut self, bytes: u64) {
        self.insert_number(EntryField::Size, bytes);
    }

    /// Resource kind, when recorded.
    #[must_use]
    pub fn kind(&self) -> Option<ResourceKind> {
        self.number(EntryField::Kind).and_then(ResourceKind::from_number)
    }

    /// Set the resource kind.
    pub fn set_kind(&mut self, kind: ResourceKind) {
        self.insert_number(EntryField::Kind, kind.as_number());
    }

    /// Whether the entry describes a directory.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind() == Some(ResourceKind::Directory)
    }
}
