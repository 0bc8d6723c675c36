//! Fill the cache for a date range from the imagery provider

use crate::provider::ImageryProvider;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use imagery_cache::{BoundingBox, CacheError, ImageEntry, Repository};
use serde::Serialize;
use tracing::{info, warn};

/// Outcome counts for one sync run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub requested: usize,
    pub missing: usize,
    pub fetched: usize,
    pub not_found: usize,
    pub rejected: usize,
    pub failed: usize,
    pub added: usize,
}

enum FetchOutcome {
    Cached(ImageEntry),
    NotFound,
    Rejected,
    Failed,
}

/// Every day from `start` to `end`, inclusive
pub fn days_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|d| *d <= end).collect()
}

async fn fetch_one(
    repo: &Repository,
    provider: &dyn ImageryProvider,
    bbox: &BoundingBox,
    date: NaiveDate,
) -> FetchOutcome {
    let data = match provider.fetch_image(date, bbox).await {
        Ok(Some(data)) => data,
        Ok(None) => return FetchOutcome::NotFound,
        Err(e) => {
            warn!(date = %date, error = %e, "Imagery fetch failed");
            return FetchOutcome::Failed;
        }
    };

    match repo.cache_image(date, &data).await {
        Ok(reference) => FetchOutcome::Cached(ImageEntry::new(date, reference)),
        Err(CacheError::Rejected(_)) => FetchOutcome::Rejected,
        Err(e) => {
            warn!(date = %date, error = %e, "Failed to cache fetched image");
            FetchOutcome::Failed
        }
    }
}

/// Fetch and cache every day in `[start, end]` that the index does not know
///
/// Individual failures do not stop the run; only dates whose blob was written
/// are merged into the index.
pub async fn sync_range(
    repo: &Repository,
    provider: &dyn ImageryProvider,
    bbox: &BoundingBox,
    start: NaiveDate,
    end: NaiveDate,
    concurrency: usize,
) -> SyncReport {
    let candidates = days_between(start, end);
    let missing = repo.get_missing_dates(&candidates).await;

    let mut report = SyncReport {
        requested: candidates.len(),
        missing: missing.len(),
        ..SyncReport::default()
    };

    let outcomes: Vec<FetchOutcome> = stream::iter(missing)
        .map(|date| fetch_one(repo, provider, bbox, date))
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut entries = Vec::new();
    for outcome in outcomes {
        match outcome {
            FetchOutcome::Cached(entry) => {
                report.fetched += 1;
                entries.push(entry);
            }
            FetchOutcome::NotFound => report.not_found += 1,
            FetchOutcome::Rejected => report.rejected += 1,
            FetchOutcome::Failed => report.failed += 1,
        }
    }

    entries.sort_by_key(|e| e.date);
    report.added = repo.add_images(entries).await;

    info!(
        start = %start,
        end = %end,
        requested = report.requested,
        fetched = report.fetched,
        not_found = report.not_found,
        rejected = report.rejected,
        failed = report.failed,
        added = report.added,
        "Sync finished"
    );

    report
}
