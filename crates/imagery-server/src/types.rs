//! Request and response bodies for the imagery server

use chrono::NaiveDate;
use imagery_cache::{BoundingBox, CacheStats, ImageEntry};
use serde::{Deserialize, Serialize};

/// Inclusive date range from a query string or JSON body
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagesResponse {
    pub bounding_box: BoundingBox,
    pub images: Vec<ImageEntry>,
}

#[derive(Debug, Serialize)]
pub struct MissingDatesResponse {
    pub dates: Vec<NaiveDate>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub cache: CacheStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_range_deserialization() {
        let range: DateRange =
            serde_json::from_str(r#"{"start": "2024-01-01", "end": "2024-01-31"}"#).unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());

        let bad = r#"{"start": "01/01/2024", "end": "2024-01-31"}"#;
        assert!(serde_json::from_str::<DateRange>(bad).is_err());
    }

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "ok".to_string(),
            uptime_secs: 3600,
            cache: CacheStats {
                entries: 30,
                blobs: 31,
                total_bytes: 4_500_000,
                last_updated: None,
            },
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("3600"));
        assert!(json.contains("\"totalBytes\":4500000"));
    }

    #[test]
    fn test_images_response_serialization() {
        let response = ImagesResponse {
            bounding_box: BoundingBox::new(1.0, 2.0, 3.0, 4.0),
            images: vec![ImageEntry::new(
                NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
                "/images/2024-01-05.png",
            )],
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["boundingBox"], serde_json::json!([1.0, 2.0, 3.0, 4.0]));
        assert_eq!(json["images"][0]["reference"], "/images/2024-01-05.png");
    }
}
