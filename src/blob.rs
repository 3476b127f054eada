//! Temporary blob references for user-supplied files.
//!
//! Adding a local file copies it into a temporary file and hands out a `blob:` URL
//! for it. Revoking the URL drops the temporary file.

use crate::errors::MediaError;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
#[cfg(test)]
use std::path::PathBuf;
use tempfile::NamedTempFile;

pub const BLOB_SCHEME: &str = "blob:";

#[derive(Debug, Default)]
pub struct BlobRegistry {
    next_id: u64,
    blobs: HashMap<String, NamedTempFile>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies `path` into a new temporary blob and returns its URL.
    #[must_use = "creating a blob can fail; the Result must be handled"]
    pub fn create_from_file(&mut self, path: &Path) -> Result<String, MediaError> {
        let bytes = std::fs::read(path).map_err(|e| {
            warn!("Failed to read media file {:?}: {}", path, e);
            MediaError::Io(e)
        })?;
        let mut temp_file = NamedTempFile::new()?;
        temp_file.write_all(&bytes)?;
        temp_file.flush()?;

        self.next_id += 1;
        let url = format!("{}slideshow/{}", BLOB_SCHEME, self.next_id);
        debug!("Created blob {} for {:?} at {:?}", url, path, temp_file.path());
        self.blobs.insert(url.clone(), temp_file);
        Ok(url)
    }

    /// Local file behind a blob URL.
    #[cfg(test)]
    pub fn path_of(&self, url: &str) -> Option<PathBuf> {
        self.blobs.get(url).map(|f| f.path().to_path_buf())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.blobs.contains_key(url)
    }

    /// Releases the blob. Unknown URLs are ignored.
    pub fn revoke(&mut self, url: &str) {
        if self.blobs.remove(url).is_some() {
            info!("Revoked blob {}", url);
        }
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}
