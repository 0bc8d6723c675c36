//! Keeps the index in line with the blobs actually on disk

use crate::blob_store::BlobStore;
use crate::index::Index;
use crate::types::{BoundingBox, ImageEntry, IndexDocument, IndexLoad, RepairOutcome};
use chrono::Utc;
use tracing::{debug, info, warn};

/// The index lags the blobs after a crash between blob write and index save,
/// and overcounts when blobs are removed out of band. When the gap is larger
/// than `slack`, or the index cannot be read at all while blobs exist, it is
/// rebuilt from the blob directory.
pub struct Reconciler<'a> {
    blobs: &'a BlobStore,
    index: &'a Index,
    default_bounding_box: BoundingBox,
    slack: usize,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        blobs: &'a BlobStore,
        index: &'a Index,
        default_bounding_box: BoundingBox,
        slack: usize,
    ) -> Self {
        Self {
            blobs,
            index,
            default_bounding_box,
            slack,
        }
    }

    pub async fn check_and_repair(&self) -> RepairOutcome {
        let blob_count = self.blobs.list_keys().await.len();

        let entry_count = match self.index.load().await {
            IndexLoad::Valid(doc) => doc.entries.len(),
            IndexLoad::Missing | IndexLoad::Malformed(_) => {
                if blob_count == 0 {
                    return RepairOutcome::Consistent;
                }
                warn!(blobs = blob_count, "Index unavailable with blobs on disk, rebuilding");
                let entries = self.rebuild().await;
                return RepairOutcome::Rebuilt { entries };
            }
        };

        let drift = entry_count.abs_diff(blob_count);
        if drift > self.slack {
            warn!(
                entries = entry_count,
                blobs = blob_count,
                slack = self.slack,
                "Index drifted from blob store, rebuilding"
            );
            let entries = self.rebuild().await;
            return RepairOutcome::Rebuilt { entries };
        }

        debug!(entries = entry_count, blobs = blob_count, "Index consistent");
        RepairOutcome::Consistent
    }

    /// Replace the index with one entry per blob, oldest first
    ///
    /// The original bounding box cannot be recovered from the blobs, so the
    /// configured default is written instead.
    pub async fn rebuild(&self) -> usize {
        let now = Utc::now();
        let mut entries: Vec<ImageEntry> = self
            .blobs
            .list()
            .await
            .into_iter()
            .map(|blob| ImageEntry {
                date: blob.date,
                reference: BlobStore::file_name(blob.date),
                fetched_at: blob.modified.unwrap_or(now),
            })
            .collect();
        entries.sort_by_key(|e| e.date);

        let count = entries.len();
        let doc = IndexDocument {
            entries,
            ..IndexDocument::empty(self.default_bounding_box)
        };
        if !self.index.replace(doc).await {
            warn!(blobs = count, "Rebuilt index could not be saved");
            return 0;
        }

        info!(entries = count, "Rebuilt index from blob store");
        count
    }
}
