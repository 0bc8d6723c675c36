//! Cache types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Geographic rectangle in degrees, serialized as `[minLon, minLat, maxLon, maxLat]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub const ZERO: BoundingBox = BoundingBox {
        min_lon: 0.0,
        min_lat: 0.0,
        max_lon: 0.0,
        max_lat: 0.0,
    };

    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.min_lon, b.min_lat, b.max_lon, b.max_lat]
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseBoundingBoxError(String);

impl fmt::Display for ParseBoundingBoxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid bounding box: {}", self.0)
    }
}

impl std::error::Error for ParseBoundingBoxError {}

impl FromStr for BoundingBox {
    type Err = ParseBoundingBoxError;

    /// Parse `"minLon,minLat,maxLon,maxLat"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ParseBoundingBoxError(format!("{}: {}", s, e)))?;

        match parts.as_slice() {
            [min_lon, min_lat, max_lon, max_lat] => {
                if min_lon > max_lon || min_lat > max_lat {
                    return Err(ParseBoundingBoxError(format!(
                        "{}: minimum exceeds maximum",
                        s
                    )));
                }
                Ok(Self::new(*min_lon, *min_lat, *max_lon, *max_lat))
            }
            _ => Err(ParseBoundingBoxError(format!(
                "{}: expected 4 numbers, got {}",
                s,
                parts.len()
            ))),
        }
    }
}

/// Metadata for one cached day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageEntry {
    pub date: NaiveDate,
    pub reference: String,
    pub fetched_at: DateTime<Utc>,
}

impl ImageEntry {
    pub fn new(date: NaiveDate, reference: impl Into<String>) -> Self {
        Self {
            date,
            reference: reference.into(),
            fetched_at: Utc::now(),
        }
    }
}

fn legacy_version() -> u32 {
    1
}

/// The durable index record, one per repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDocument {
    #[serde(default = "legacy_version")]
    pub version: u32,
    pub bounding_box: BoundingBox,
    pub entries: Vec<ImageEntry>,
    pub last_updated: DateTime<Utc>,
}

impl IndexDocument {
    pub fn empty(bounding_box: BoundingBox) -> Self {
        Self {
            version: crate::index::INDEX_SCHEMA_VERSION,
            bounding_box,
            entries: Vec::new(),
            last_updated: Utc::now(),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.entries.iter().any(|e| e.date == date)
    }
}

/// Result of reading the index from disk
#[derive(Debug, Clone, PartialEq)]
pub enum IndexLoad {
    Missing,
    Malformed(String),
    Valid(IndexDocument),
}

impl IndexLoad {
    pub fn into_document(self) -> Option<IndexDocument> {
        match self {
            IndexLoad::Valid(doc) => Some(doc),
            _ => None,
        }
    }
}

/// A blob found on disk
#[derive(Debug, Clone, PartialEq)]
pub struct StoredBlob {
    pub date: NaiveDate,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// What a consistency check did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairOutcome {
    Consistent,
    Rebuilt { entries: usize },
}

/// Statistics about the cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub blobs: usize,
    pub total_bytes: u64,
    pub last_updated: Option<DateTime<Utc>>,
}
