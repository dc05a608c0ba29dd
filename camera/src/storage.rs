use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Where captured photos and videos are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    /// Subfolder for still photos.
    pub const PICTURES: &'static str = "pictures";
    /// Subfolder for recordings.
    pub const VIDEOS: &'static str = "videos";

    /// Store files under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<documents>/camera`, or a temporary directory when there is no documents folder.
    #[must_use]
    pub fn default_root() -> PathBuf {
        dirs::document_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("camera")
    }

    /// The storage root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A fresh path `<root>/<subfolder>/<prefix><uuid>.<extension>`.
    ///
    /// The subfolder is created if missing.
    ///
    /// # Errors
    /// Returns the filesystem error if the subfolder cannot be created.
    pub fn unique_file_path(&self, subfolder: &str, prefix: &str, extension: &str) -> io::Result<PathBuf> {
        let dir = self.root.join(subfolder);
        fs::create_dir_all(&dir)?;
        Ok(dir.join(format!("{prefix}{}.{extension}", Uuid::new_v4())))
    }
}

impl Default for MediaStorage {
    fn default() -> Self {
        Self::new(Self::default_root())
    }
}
