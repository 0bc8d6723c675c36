//! Repository configuration

use crate::types::BoundingBox;
use crate::validator::DEFAULT_MIN_IMAGE_BYTES;
use std::path::PathBuf;

/// Default tolerated difference between index entries and blobs on disk
pub const DEFAULT_RECONCILE_SLACK: usize = 10;

/// How cached images are referenced in query results
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceStrategy {
    /// `<prefix>/<date>.png`, served by the route layer
    StaticPath { prefix: String },
    /// The image bytes inlined as a base64 `data:` URL
    DataUrl,
}

impl Default for ReferenceStrategy {
    fn default() -> Self {
        ReferenceStrategy::StaticPath {
            prefix: "/images".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    pub cache_dir: PathBuf,
    /// Box written into the index when it is rebuilt from blobs
    pub default_bounding_box: BoundingBox,
    pub min_image_bytes: usize,
    pub reconcile_slack: usize,
    pub references: ReferenceStrategy,
}

impl RepositoryConfig {
    pub fn new(cache_dir: impl Into<PathBuf>, default_bounding_box: BoundingBox) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            default_bounding_box,
            ..Self::default()
        }
    }
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./cache/imagery"),
            default_bounding_box: BoundingBox::new(-122.52, 37.70, -122.35, 37.83),
            min_image_bytes: DEFAULT_MIN_IMAGE_BYTES,
            reconcile_slack: DEFAULT_RECONCILE_SLACK,
            references: ReferenceStrategy::default(),
        }
    }
}
