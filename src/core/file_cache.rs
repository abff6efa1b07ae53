// src/core/file_cache.rs

use crate::core::cache::CacheValidationData;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A library file as it was last read from disk.
#[derive(Debug, Clone)]
pub struct CachedFile {
    pub path: PathBuf,
    pub source: Arc<str>,
    pub validation: CacheValidationData,
}

/// The file-scan cache: source text of library files, keyed by library name.
///
/// An entry is reused while the file keeps its timestamp and size. A library that
/// fails to load must have its entry reset so the next attempt scans the file again.
#[derive(Debug, Default)]
pub struct FileCache {
    entries: HashMap<String, CachedFile>,
    scans: usize,
}

impl FileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the source of `library`'s file at `path`, reading it only on a miss.
    pub fn read_library_file(&mut self, library: &str, path: &Path) -> Result<Arc<str>> {
        if let Some(cached) = self.entries.get(library)
            && cached.path == path
            && cached.validation.is_fresh(path)
        {
            log::trace!("File cache HIT for library '{}'.", library);
            return Ok(cached.source.clone());
        }

        log::debug!(
            "File cache MISS for library '{}'. Scanning '{}'.",
            library,
            path.display()
        );
        self.scans += 1;
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read library file '{}'", path.display()))?;
        let validation = CacheValidationData::from_content(path, &bytes)?;
        let text = String::from_utf8(bytes)
            .with_context(|| format!("Library file '{}' is not valid UTF-8", path.display()))?;
        let source: Arc<str> = Arc::from(text);

        self.entries.insert(
            library.to_string(),
            CachedFile {
                path: path.to_path_buf(),
                source: source.clone(),
                validation,
            },
        );
        Ok(source)
    }

    /// Drops the entry for `library`. Returns whether there was one.
    pub fn reset(&mut self, library: &str) -> bool {
        let removed = self.entries.remove(library).is_some();
        if removed {
            log::debug!("Invalidated file cache entry for library '{}'.", library);
        }
        removed
    }

    pub fn get(&self, library: &str) -> Option<&CachedFile> {
        self.entries.get(library)
    }

    pub fn contains(&self, library: &str) -> bool {
        self.entries.contains_key(library)
    }

    /// How many times a file was actually read from disk.
    pub fn scans(&self) -> usize {
        self.scans
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_second_read_is_a_hit() {
        let file = temp_file("def a\nend\n");
        let mut cache = FileCache::new();

        let first = cache.read_library_file("lib", file.path()).unwrap();
        let second = cache.read_library_file("lib", file.path()).unwrap();

        assert_eq!(first, second);
        assert_eq!(cache.scans(), 1);
        assert!(cache.get("lib").is_some());
    }

    #[test]
    fn test_reset_forces_rescan() {
        let file = temp_file("def a\nend\n");
        let mut cache = FileCache::new();
        cache.read_library_file("lib", file.path()).unwrap();

        assert!(cache.reset("lib"));
        assert!(!cache.reset("lib"));
        assert!(!cache.contains("lib"));

        cache.read_library_file("lib", file.path()).unwrap();
        assert_eq!(cache.scans(), 2);
    }

    #[test]
    fn test_changed_file_is_rescanned() {
        let mut file = temp_file("def a\nend\n");
        let mut cache = FileCache::new();
        cache.read_library_file("lib", file.path()).unwrap();

        file.write_all(b"def b\nend\n").unwrap();
        file.flush().unwrap();

        let source = cache.read_library_file("lib", file.path()).unwrap();
        assert!(source.contains("def b"));
        assert_eq!(cache.scans(), 2);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let mut cache = FileCache::new();
        assert!(
            cache
                .read_library_file("lib", Path::new("does/not/exist.troupe"))
                .is_err()
        );
        assert!(!cache.contains("lib"));
    }
}
