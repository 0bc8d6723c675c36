//! File-based storage of one image blob per calendar day

use crate::error::Result;
use crate::types::StoredBlob;
use crate::validator::IMAGE_EXTENSION;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Blobs live directly in `dir` as `<YYYY-MM-DD>.png`
#[derive(Debug, Clone)]
pub struct BlobStore {
    dir: PathBuf,
}

impl BlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(date: NaiveDate) -> String {
        format!("{}.{}", date.format("%Y-%m-%d"), IMAGE_EXTENSION)
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(Self::file_name(date))
    }

    /// Parse a blob file name back into its date, ignoring anything else
    fn date_from_file_name(name: &str) -> Option<NaiveDate> {
        let stem = name.strip_suffix(IMAGE_EXTENSION)?.strip_suffix('.')?;
        NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
    }

    /// Create the storage directory; failure is logged, not fatal
    pub async fn ensure_dir(&self) -> bool {
        match fs::create_dir_all(&self.dir).await {
            Ok(()) => true,
            Err(e) => {
                warn!(dir = ?self.dir, error = %e, "Failed to create blob directory");
                false
            }
        }
    }

    /// Write a blob, replacing any earlier one for the same date
    pub async fn write(&self, date: NaiveDate, data: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(date);
        fs::write(&path, data).await?;
        debug!(date = %date, size = data.len(), "Wrote blob");
        Ok(())
    }

    pub async fn read(&self, date: NaiveDate) -> Option<Vec<u8>> {
        match fs::read(self.path_for(date)).await {
            Ok(data) => Some(data),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!(date = %date, error = %e, "Failed to read blob");
                None
            }
        }
    }

    pub async fn exists(&self, date: NaiveDate) -> bool {
        fs::try_exists(self.path_for(date)).await.unwrap_or(false)
    }

    pub async fn delete(&self, date: NaiveDate) {
        match fs::remove_file(self.path_for(date)).await {
            Ok(()) => debug!(date = %date, "Deleted blob"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(date = %date, error = %e, "Failed to delete blob"),
        }
    }

    /// Enumerate stored blobs
    ///
    /// A missing directory is an empty store. Files that disappear while
    /// listing and files that are not `<date>.png` are skipped.
    pub async fn list(&self) -> Vec<StoredBlob> {
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    warn!(dir = ?self.dir, error = %e, "Failed to list blob directory");
                }
                return Vec::new();
            }
        };

        let mut blobs = Vec::new();
        loop {
            let entry = match dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = ?self.dir, error = %e, "Blob directory listing interrupted");
                    break;
                }
            };

            let Some(date) = entry
                .file_name()
                .to_str()
                .and_then(Self::date_from_file_name)
            else {
                continue;
            };

            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    debug!(date = %date, error = %e, "Blob vanished while listing");
                    continue;
                }
            };

            blobs.push(StoredBlob {
                date,
                size: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        blobs.sort_by_key(|b| b.date);
        blobs
    }

    pub async fn list_keys(&self) -> BTreeSet<NaiveDate> {
        self.list().await.into_iter().map(|b| b.date).collect()
    }

    /// Remove the whole directory, including anything else stored in it
    pub async fn remove_all(&self) {
        match fs::remove_dir_all(&self.dir).await {
            Ok(()) => debug!(dir = ?self.dir, "Removed blob directory"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(dir = ?self.dir, error = %e, "Failed to remove blob directory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_file_name_round_trip() {
        assert_eq!(BlobStore::file_name(day(5)), "2024-01-05.png");
        assert_eq!(BlobStore::date_from_file_name("2024-01-05.png"), Some(day(5)));
        assert_eq!(BlobStore::date_from_file_name("2024-01-05.jpg"), None);
        assert_eq!(BlobStore::date_from_file_name("index.json"), None);
        assert_eq!(BlobStore::date_from_file_name("2024-13-40.png"), None);
        assert_eq!(BlobStore::date_from_file_name("2024-01-05png"), None);
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path().join("nested"));

        store.write(day(1), b"first").await.unwrap();
        assert!(store.exists(day(1)).await);
        assert_eq!(store.read(day(1)).await.unwrap(), b"first");

        // Overwrite
        store.write(day(1), b"second").await.unwrap();
        assert_eq!(store.read(day(1)).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_read_missing_is_none() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path());

        assert!(store.read(day(2)).await.is_none());
        assert!(!store.exists(day(2)).await);
    }

    #[tokio::test]
    async fn test_delete_is_best_effort() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path());

        store.write(day(3), b"data").await.unwrap();
        store.delete(day(3)).await;
        assert!(!store.exists(day(3)).await);

        // Deleting again does nothing
        store.delete(day(3)).await;
    }

    #[tokio::test]
    async fn test_list_filters_foreign_files() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path());

        store.write(day(9), b"nine").await.unwrap();
        store.write(day(2), b"two!").await.unwrap();
        std::fs::write(dir.path().join("index.json"), b"{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"hi").unwrap();
        std::fs::write(dir.path().join("2024-01-04.png.tmp"), b"partial").unwrap();
        std::fs::create_dir(dir.path().join("2024-01-06.png")).unwrap();

        let blobs = store.list().await;
        assert_eq!(blobs.len(), 2);
        assert_eq!(blobs[0].date, day(2));
        assert_eq!(blobs[1].date, day(9));
        assert_eq!(blobs[0].size, 4);
        assert!(blobs[0].modified.is_some());

        let keys: Vec<_> = store.list_keys().await.into_iter().collect();
        assert_eq!(keys, vec![day(2), day(9)]);
    }

    #[tokio::test]
    async fn test_list_missing_dir_is_empty() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path().join("does-not-exist"));
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_all_tolerates_missing_dir() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path().join("blobs"));

        store.remove_all().await;

        store.write(day(1), b"x").await.unwrap();
        store.remove_all().await;
        assert!(!store.dir().exists());
    }
}
