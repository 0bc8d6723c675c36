//! JSON metadata index stored next to the blobs

use crate::types::{BoundingBox, ImageEntry, IndexDocument, IndexLoad};
use chrono::{NaiveDate, Utc};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const INDEX_FILE_NAME: &str = "index.json";

pub const INDEX_SCHEMA_VERSION: u32 = 1;

/// The durable date -> entry mapping
///
/// Every call goes to disk. Mutations within one process are serialized by
/// `write_lock`; separate processes are last-writer-wins.
#[derive(Debug)]
pub struct Index {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl Index {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> IndexLoad {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return IndexLoad::Missing,
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Failed to read index");
                return IndexLoad::Malformed(e.to_string());
            }
        };

        let doc: IndexDocument = match serde_json::from_slice(&raw) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Index is not valid JSON");
                return IndexLoad::Malformed(e.to_string());
            }
        };

        if doc.version > INDEX_SCHEMA_VERSION {
            warn!(
                path = ?self.path,
                version = doc.version,
                supported = INDEX_SCHEMA_VERSION,
                "Index was written by a newer schema"
            );
            return IndexLoad::Malformed(format!("unsupported index version {}", doc.version));
        }

        IndexLoad::Valid(doc)
    }

    pub async fn document(&self) -> Option<IndexDocument> {
        self.load().await.into_document()
    }

    /// Persist the full document; failures are logged and reported as `false`
    pub async fn save(&self, doc: &IndexDocument) -> bool {
        match self.write_document(doc).await {
            Ok(()) => {
                debug!(path = ?self.path, entries = doc.entries.len(), "Saved index");
                true
            }
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Failed to save index");
                false
            }
        }
    }

    /// Write to a sibling temp file and rename it into place
    async fn write_document(&self, doc: &IndexDocument) -> crate::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(doc)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, &json).await?;
        if let Err(e) = fs::rename(&tmp_path, &self.path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Append entries for dates the index does not have yet
    ///
    /// Existing dates are never overwritten, and the first occurrence wins
    /// within `new_entries`. Returns the number appended; when that is zero
    /// the file is left untouched.
    pub async fn merge(&self, new_entries: Vec<ImageEntry>) -> usize {
        let _guard = self.write_lock.lock().await;

        let mut doc = match self.load().await {
            IndexLoad::Valid(doc) => doc,
            IndexLoad::Missing => IndexDocument::empty(BoundingBox::ZERO),
            IndexLoad::Malformed(reason) => {
                info!(reason = %reason, "Replacing malformed index");
                IndexDocument::empty(BoundingBox::ZERO)
            }
        };

        let mut known: HashSet<NaiveDate> = doc.entries.iter().map(|e| e.date).collect();
        let before = doc.entries.len();
        for entry in new_entries {
            if known.insert(entry.date) {
                doc.entries.push(entry);
            }
        }
        let appended = doc.entries.len() - before;

        if appended == 0 {
            debug!("Merge added no new dates");
            return 0;
        }

        doc.last_updated = Utc::now();
        if !self.save(&doc).await {
            warn!(appended, "Index save failed, merged entries were not recorded");
            return 0;
        }
        info!(appended, total = doc.entries.len(), "Merged index entries");
        appended
    }

    /// Replace the whole document
    pub async fn replace(&self, doc: IndexDocument) -> bool {
        let _guard = self.write_lock.lock().await;
        self.save(&doc).await
    }

    pub async fn remove(&self) {
        match fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = ?self.path, error = %e, "Failed to remove index"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn entry(d: u32) -> ImageEntry {
        ImageEntry::new(
            NaiveDate::from_ymd_opt(2024, 3, d).unwrap(),
            format!("upstream://2024-03-{:02}", d),
        )
    }

    fn dates(doc: &IndexDocument) -> Vec<u32> {
        use chrono::Datelike;
        let mut days: Vec<u32> = doc.entries.iter().map(|e| e.date.day()).collect();
        days.sort();
        days
    }

    #[tokio::test]
    async fn test_load_missing() {
        let dir = tempdir().unwrap();
        let index = Index::new(dir.path().join(INDEX_FILE_NAME));
        assert_eq!(index.load().await, IndexLoad::Missing);
        assert!(index.document().await.is_none());
    }

    #[tokio::test]
    async fn test_load_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(INDEX_FILE_NAME);
        std::fs::write(&path, b"{ not json").unwrap();

        let index = Index::new(&path);
        assert!(matches!(index.load().await, IndexLoad::Malformed(_)));
        assert!(index.document().await.is_none());
    }

    #[tokio::test]
    async fn test_load_rejects_newer_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(INDEX_FILE_NAME);
        std::fs::write(
            &path,
            r#"{"version": 99, "boundingBox": [0,0,0,0], "entries": [], "lastUpdated": "2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        let index = Index::new(&path);
        match index.load().await {
            IndexLoad::Malformed(reason) => assert!(reason.contains("99")),
            other => panic!("expected malformed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let index = Index::new(dir.path().join("sub").join(INDEX_FILE_NAME));

        let mut doc = IndexDocument::empty(BoundingBox::new(1.0, 2.0, 3.0, 4.0));
        doc.entries.push(entry(1));
        assert!(index.save(&doc).await);

        assert_eq!(index.document().await.unwrap(), doc);
        assert!(!dir.path().join("sub").join("index.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_merge_creates_document() {
        let dir = tempdir().unwrap();
        let index = Index::new(dir.path().join(INDEX_FILE_NAME));

        let appended = index.merge(vec![entry(1), entry(2)]).await;
        assert_eq!(appended, 2);

        let doc = index.document().await.unwrap();
        assert_eq!(doc.bounding_box, BoundingBox::ZERO);
        assert_eq!(doc.version, INDEX_SCHEMA_VERSION);
        assert_eq!(dates(&doc), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let dir = tempdir().unwrap();
        let index = Index::new(dir.path().join(INDEX_FILE_NAME));
        let batch = vec![entry(4), entry(5)];

        assert_eq!(index.merge(batch.clone()).await, 2);
        let first = index.document().await.unwrap();

        assert_eq!(index.merge(batch).await, 0);
        let second = index.document().await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_merge_never_overwrites_existing_date() {
        let dir = tempdir().unwrap();
        let index = Index::new(dir.path().join(INDEX_FILE_NAME));

        index.merge(vec![entry(7)]).await;

        let mut replacement = entry(7);
        replacement.reference = "other".to_string();
        assert_eq!(index.merge(vec![replacement]).await, 0);

        let doc = index.document().await.unwrap();
        assert_eq!(doc.entries.len(), 1);
        assert_eq!(doc.entries[0].reference, "upstream://2024-03-07");
    }

    #[tokio::test]
    async fn test_merge_dedupes_within_batch() {
        let dir = tempdir().unwrap();
        let index = Index::new(dir.path().join(INDEX_FILE_NAME));

        let mut dup = entry(8);
        dup.reference = "second".to_string();
        assert_eq!(index.merge(vec![entry(8), dup, entry(9)]).await, 2);

        let doc = index.document().await.unwrap();
        assert_eq!(doc.entries[0].reference, "upstream://2024-03-08");
    }

    #[tokio::test]
    async fn test_disjoint_merges_union_in_any_order() {
        let a = vec![entry(1), entry(3), entry(5)];
        let b = vec![entry(2), entry(4)];

        let dir1 = tempdir().unwrap();
        let forward = Index::new(dir1.path().join(INDEX_FILE_NAME));
        forward.merge(a.clone()).await;
        forward.merge(b.clone()).await;

        let dir2 = tempdir().unwrap();
        let backward = Index::new(dir2.path().join(INDEX_FILE_NAME));
        backward.merge(b).await;
        backward.merge(a).await;

        let forward = forward.document().await.unwrap();
        let backward = backward.document().await.unwrap();
        assert_eq!(dates(&forward), vec![1, 2, 3, 4, 5]);
        assert_eq!(dates(&forward), dates(&backward));
    }

    #[tokio::test]
    async fn test_merge_replaces_malformed_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(INDEX_FILE_NAME);
        std::fs::write(&path, b"garbage").unwrap();

        let index = Index::new(&path);
        assert_eq!(index.merge(vec![entry(1)]).await, 1);
        assert_eq!(index.document().await.unwrap().entries.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_merges_keep_all_entries() {
        let dir = tempdir().unwrap();
        let index = Arc::new(Index::new(dir.path().join(INDEX_FILE_NAME)));

        let handles: Vec<_> = (1..=8)
            .map(|d| {
                let index = Arc::clone(&index);
                tokio::spawn(async move { index.merge(vec![entry(d)]).await })
            })
            .collect();

        let mut total = 0;
        for handle in handles {
            total += handle.await.unwrap();
        }

        assert_eq!(total, 8);
        assert_eq!(index.document().await.unwrap().entries.len(), 8);
    }

    #[tokio::test]
    async fn test_merge_reports_zero_when_save_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(INDEX_FILE_NAME);
        std::fs::create_dir(&path).unwrap();

        let index = Index::new(&path);
        assert_eq!(index.merge(vec![entry(1)]).await, 0);
        assert!(index.document().await.is_none());
        assert!(!dir.path().join("index.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_remove_tolerates_missing() {
        let dir = tempdir().unwrap();
        let index = Index::new(dir.path().join(INDEX_FILE_NAME));
        index.remove().await;

        index.merge(vec![entry(1)]).await;
        index.remove().await;
        assert_eq!(index.load().await, IndexLoad::Missing);
    }
}
