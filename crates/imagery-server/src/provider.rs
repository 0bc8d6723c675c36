//! Upstream imagery fetching

use crate::error::{Result, ServerError};
use async_trait::async_trait;
use chrono::NaiveDate;
use imagery_cache::BoundingBox;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

/// Source of one image per day for a bounding box
///
/// `Ok(None)` means the provider has no image for that day.
#[async_trait]
pub trait ImageryProvider: Send + Sync {
    async fn fetch_image(&self, date: NaiveDate, bbox: &BoundingBox)
        -> Result<Option<Vec<u8>>>;
}

/// Fetches images with `GET {base_url}?date=YYYY-MM-DD&bbox=minLon,minLat,maxLon,maxLat`
pub struct HttpImageryProvider {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpImageryProvider {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("imagery-server/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            token,
        })
    }

    fn request_url(&self, date: NaiveDate, bbox: &BoundingBox) -> Result<url::Url> {
        let mut url = url::Url::parse(&self.base_url)
            .map_err(|e| ServerError::Config(format!("{}: {}", self.base_url, e)))?;
        url.query_pairs_mut()
            .append_pair("date", &date.format("%Y-%m-%d").to_string())
            .append_pair("bbox", &bbox.to_string());
        Ok(url)
    }
}

#[async_trait]
impl ImageryProvider for HttpImageryProvider {
    async fn fetch_image(&self, date: NaiveDate, bbox: &BoundingBox) -> Result<Option<Vec<u8>>> {
        let url = self.request_url(date, bbox)?;
        debug!(url = %url, "Fetching image from provider");

        let mut request = self.client.get(url.clone());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::NO_CONTENT => {
                debug!(date = %date, "Provider has no image");
                return Ok(None);
            }
            status if !status.is_success() => {
                warn!(status = %status, url = %url, "Failed to fetch image");
                return Err(ServerError::Provider(format!(
                    "provider returned status {}",
                    status
                )));
            }
            _ => {}
        }

        let data = response.bytes().await?.to_vec();
        debug!(date = %date, size = data.len(), "Fetched image from provider");
        Ok(Some(data))
    }
}
