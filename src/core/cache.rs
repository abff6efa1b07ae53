// src/core/cache.rs

use anyhow::{Context, Result};
use log::debug;
use std::{fs, path::Path, time::SystemTime};

const HASH_TRUNCATE_LENGTH: usize = 16; // 16 bytes = 32 hex characters

/// What a library file looked like when it was read: cheap metadata for the
/// file cache, a content hash for the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheValidationData {
    pub timestamp: SystemTime,
    pub file_size: u64,
    pub content_hash: String,
}

impl CacheValidationData {
    /// Builds validation data from content that was already read.
    pub fn from_content(path: &Path, content: &[u8]) -> Result<Self> {
        let metadata = fs::metadata(path)
            .with_context(|| format!("Failed to read metadata for file '{}'", path.display()))?;
        Ok(Self {
            timestamp: metadata.modified()?,
            file_size: metadata.len(),
            content_hash: content_hash(content),
        })
    }

    /// Fast check: the file still has the recorded timestamp and size.
    /// Any I/O error counts as stale.
    pub fn is_fresh(&self, path: &Path) -> bool {
        match fs::metadata(path) {
            Ok(metadata) => {
                metadata.len() == self.file_size
                    && metadata.modified().ok() == Some(self.timestamp)
            }
            Err(_) => false,
        }
    }
}

/// Truncated blake3 hash of `content`, hex encoded.
pub fn content_hash(content: &[u8]) -> String {
    let hash = blake3::hash(content);
    hex::encode(&hash.as_bytes()[..HASH_TRUNCATE_LENGTH])
}

/// Reads `path` and computes its validation data. The index stores the hash
/// to tell whether a library file changed since it was last indexed.
///
/// # Errors
/// The file or its metadata cannot be read.
pub fn calculate_validation_data(path: &Path) -> Result<CacheValidationData> {
    debug!("Calculating validation data for '{}'", path.display());

    let content = fs::read(path)
        .with_context(|| format!("Failed to read content of file '{}'", path.display()))?;
    let data = CacheValidationData::from_content(path, &content)?;

    debug!(
        "Validation data for '{}': size={}, hash={}",
        path.display(),
        data.file_size,
        data.content_hash
    );

    Ok(data)
}
