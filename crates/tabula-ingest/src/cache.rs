use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::error::IngestResult;
use crate::fs::atomic_write;

/// On-disk cache of downloaded source files.
///
/// Entries are plain files in `dir`, one per key. The cache never fetches by
/// itself: [`DatasetCache::fetch`] runs a caller-supplied closure on a miss.
#[derive(Clone, Debug)]
pub struct DatasetCache {
    dir: PathBuf,
    max_age: Option<Duration>,
}

impl DatasetCache {
    /// A cache whose entries never expire.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_age: None,
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `key`. Characters outside `[A-Za-z0-9._-]` become `_`.
    pub fn path(&self, key: &str) -> PathBuf {
        let mut name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if name.is_empty() || name.chars().all(|c| c == '.') {
            name.insert(0, '_');
        }
        self.dir.join(name)
    }

    /// Whether `key` has an entry younger than the configured maximum age.
    pub fn is_fresh(&self, key: &str) -> bool {
        let Ok(meta) = fs::metadata(self.path(key)) else {
            return false;
        };
        let Some(max_age) = self.max_age else {
            return meta.is_file();
        };
        meta.modified()
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age <= max_age)
    }

    /// Path of a fresh entry for `key`, fetching it first when missing or stale.
    ///
    /// `fetch` writes the payload into a temp file that only replaces the entry
    /// once it succeeds; a failed fetch leaves any previous entry in place.
    pub fn fetch<F>(&self, key: &str, fetch: F) -> IngestResult<PathBuf>
    where
        F: FnOnce(&mut File) -> io::Result<()>,
    {
        let path = self.path(key);
        if self.is_fresh(key) {
            log::debug!("cache hit for {key}");
            return Ok(path);
        }
        log::debug!("cache miss for {key}, fetching into {}", path.display());
        atomic_write(&path, fetch)?;
        Ok(path)
    }

    /// Remove the entry for `key`. Returns whether one existed.
    pub fn invalidate(&self, key: &str) -> IngestResult<bool> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Remove every entry. The directory itself is kept.
    pub fn clear(&self) -> IngestResult<()> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_become_safe_file_names() {
        let cache = DatasetCache::new("/cache");
        assert_eq!(
            cache.path("https://example.org/cars.csv"),
            Path::new("/cache/https___example.org_cars.csv")
        );
        assert_eq!(cache.path(".."), Path::new("/cache/_.."));
        assert_eq!(cache.path(""), Path::new("/cache/_"));
    }
}
