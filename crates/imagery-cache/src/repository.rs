//! Repository façade over the blob store and index

use crate::blob_store::BlobStore;
use crate::config::{ReferenceStrategy, RepositoryConfig};
use crate::error::Result;
use crate::index::{Index, INDEX_FILE_NAME};
use crate::reconciler::Reconciler;
use crate::types::{BoundingBox, CacheStats, ImageEntry, IndexDocument, RepairOutcome};
use crate::validator::{Validator, IMAGE_EXTENSION};
use base64::Engine;
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Cache of dated imagery for one bounding box
///
/// Holds no state between calls beyond its configuration; every operation
/// reads the index and blobs from disk.
pub struct Repository {
    config: RepositoryConfig,
    blobs: BlobStore,
    index: Index,
    validator: Validator,
}

impl Repository {
    pub fn new(config: RepositoryConfig) -> Self {
        let blobs = BlobStore::new(&config.cache_dir);
        let index = Index::new(config.cache_dir.join(INDEX_FILE_NAME));
        let validator = Validator::new(config.min_image_bytes);
        Self {
            config,
            blobs,
            index,
            validator,
        }
    }

    /// Ensure the cache directory exists; failure only degrades to a cold cache
    pub async fn init(&self) {
        if self.blobs.ensure_dir().await {
            info!(cache_dir = ?self.config.cache_dir, "Imagery cache initialized");
        }
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(
            &self.blobs,
            &self.index,
            self.config.default_bounding_box,
            self.config.reconcile_slack,
        )
    }

    pub async fn check_and_repair(&self) -> RepairOutcome {
        self.reconciler().check_and_repair().await
    }

    pub async fn rebuild_index(&self) -> usize {
        self.reconciler().rebuild().await
    }

    fn resolve_reference(&self, date: NaiveDate, data: &[u8]) -> String {
        match &self.config.references {
            ReferenceStrategy::StaticPath { prefix } => format!(
                "{}/{}",
                prefix.trim_end_matches('/'),
                BlobStore::file_name(date)
            ),
            ReferenceStrategy::DataUrl => format!(
                "data:image/{};base64,{}",
                IMAGE_EXTENSION,
                base64::engine::general_purpose::STANDARD.encode(data)
            ),
        }
    }

    /// Read a blob and validate it, purging it if it fails validation
    async fn read_valid(&self, date: NaiveDate) -> Option<Vec<u8>> {
        let Some(data) = self.blobs.read(date).await else {
            debug!(date = %date, "Indexed image has no blob");
            return None;
        };

        match self.validator.check(&data) {
            Ok(()) => Some(data),
            Err(reason) => {
                warn!(date = %date, reason = %reason, "Purging invalid cached image");
                self.blobs.delete(date).await;
                None
            }
        }
    }

    /// Cached images with `start <= date <= end`, oldest first
    ///
    /// `None` means nothing usable is cached for the range, whether or not an
    /// index exists. Returned entries carry a servable reference in place of
    /// the stored one.
    pub async fn get_cached_images(
        &self,
        bbox: &BoundingBox,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Option<Vec<ImageEntry>> {
        self.check_and_repair().await;

        let doc = self.index.document().await?;
        if doc.bounding_box != *bbox {
            debug!(
                requested = %bbox,
                indexed = %doc.bounding_box,
                "Bounding box differs from index"
            );
        }

        let mut images = Vec::new();
        for entry in doc
            .entries
            .into_iter()
            .filter(|e| e.date >= start && e.date <= end)
        {
            if let Some(data) = self.read_valid(entry.date).await {
                images.push(ImageEntry {
                    reference: self.resolve_reference(entry.date, &data),
                    ..entry
                });
            }
        }

        if images.is_empty() {
            debug!(start = %start, end = %end, "No cached images in range");
            return None;
        }

        images.sort_by_key(|e| e.date);
        debug!(start = %start, end = %end, count = images.len(), "Cache hit");
        Some(images)
    }

    /// Validate and store one image, returning its reference
    ///
    /// A rejected payload is not written. A failed write is returned to the
    /// caller, who must not index the date.
    pub async fn cache_image(&self, date: NaiveDate, data: &[u8]) -> Result<String> {
        if let Err(reason) = self.validator.check(data) {
            warn!(date = %date, reason = %reason, "Refusing to cache image");
            return Err(reason.into());
        }

        self.blobs.write(date, data).await?;
        Ok(self.resolve_reference(date, data))
    }

    /// Merge new entries into the index, returning how many were appended
    pub async fn add_images(&self, entries: Vec<ImageEntry>) -> usize {
        self.index.merge(entries).await
    }

    /// Candidates with no index entry, in input order
    pub async fn get_missing_dates(&self, candidates: &[NaiveDate]) -> Vec<NaiveDate> {
        let known: HashSet<NaiveDate> = self
            .index
            .document()
            .await
            .map(|doc| doc.entries.into_iter().map(|e| e.date).collect())
            .unwrap_or_default();

        candidates
            .iter()
            .copied()
            .filter(|d| !known.contains(d))
            .collect()
    }

    /// Validated bytes for one date, for serving static-path references
    pub async fn image_bytes(&self, date: NaiveDate) -> Option<Vec<u8>> {
        self.read_valid(date).await
    }

    pub async fn document(&self) -> Option<IndexDocument> {
        self.index.document().await
    }

    /// Delete every blob and the index
    pub async fn clear_cache(&self) {
        self.blobs.remove_all().await;
        // The index normally lives inside the blob directory; this covers a
        // custom layout or a concurrent writer recreating it.
        self.index.remove().await;
        info!(cache_dir = ?self.config.cache_dir, "Cleared imagery cache");
    }

    pub async fn stats(&self) -> CacheStats {
        let blobs = self.blobs.list().await;
        let doc = self.index.document().await;
        CacheStats {
            entries: doc.as_ref().map(|d| d.entries.len()).unwrap_or(0),
            blobs: blobs.len(),
            total_bytes: blobs.iter().map(|b| b.size).sum(),
            last_updated: doc.map(|d| d.last_updated),
        }
    }
}
