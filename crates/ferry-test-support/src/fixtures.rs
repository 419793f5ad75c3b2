//! Scratch directory trees for filesystem-facing tests.

use std::path::Path;

use url::Url;

/// A temporary directory pre-populated with a small sample tree:
/// `notes.txt`, `photo.png`, and `sub/nested.txt`.
pub struct ScratchTree {
    dir: tempfile::TempDir,
}

impl ScratchTree {
    /// Build the sample tree in a fresh temporary directory.
    ///
    /// # Errors
    ///
    /// Fails when the temporary directory or its files cannot be created.
    pub fn new() -> anyhow::Result<Self> {
        let dir = tempfile::Builder::new().prefix("ferry-test-").tempdir()?;
        std::fs::write(dir.path().join("notes.txt"), b"ferry sample notes\n")?;
        std::fs::write(dir.path().join("photo.png"), [0x89, b'P', b'N', b'G'])?;
        std::fs::create_dir(dir.path().join("sub"))?;
        std::fs::write(dir.path().join("sub/nested.txt"), b"nested\n")?;
        Ok(Self { dir })
    }

    /// Root of the scratch tree.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Root of the scratch tree as a directory URL.
    ///
    /// # Panics
    ///
    /// Panics if the temporary path cannot be expressed as a URL.
    #[must_use]
    pub fn url(&self) -> Url {
        Url::from_directory_path(self.dir.path()).expect("scratch tree url")
    }

    /// URL of one file inside the scratch tree.
    ///
    /// # Panics
    ///
    /// Panics if the resulting path cannot be expressed as a URL.
    #[must_use]
    pub fn file_url(&self, name: &str) -> Url {
        Url::from_file_path(self.dir.path().join(name)).expect("scratch file url")
    }
}
