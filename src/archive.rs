/// Raw payload archive.
///
/// Every upstream response body is stored byte-for-byte before parsing, so
/// a parser bug never loses data: the normalized tables can be rebuilt
/// from the archive.
///
/// Keys look like `{folder}/{label}_{YYYYmmdd_HHMMSS}.{ext}`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::logging::{self, DataSource};
use crate::model::{Result, ServiceError};

/// Destination for raw upstream payloads.
pub trait RawArchive {
    /// Stores `body` under `key`, returning where it ended up.
    fn put(&mut self, key: &str, body: &[u8]) -> Result<String>;
}

/// Builds an archive key from its parts.
pub fn archive_key(folder: &str, label: &str, fetched_at: DateTime<Utc>, ext: &str) -> String {
    format!(
        "{}/{}_{}.{}",
        folder.trim_end_matches('/'),
        label,
        fetched_at.format("%Y%m%d_%H%M%S"),
        ext
    )
}

/// Archive rooted at a local directory.
pub struct FsArchive {
    root: PathBuf,
}

impl FsArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl RawArchive for FsArchive {
    fn put(&mut self, key: &str, body: &[u8]) -> Result<String> {
        if key.split('/').any(|part| part == ".." || part.is_empty()) {
            return Err(ServiceError::Config(format!("invalid archive key: {}", key)));
        }

        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, body)?;

        let location = path.display().to_string();
        logging::info(
            DataSource::Archive,
            None,
            &format!("Raw payload archived: {} ({} bytes)", location, body.len()),
        );
        Ok(location)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
