//! HTTP routes over the imagery repository
//!
//! Provides /health, the /api/images query, sync and cache-clearing
//! endpoints, and /images/{date}.png for static-path references.

use crate::error::AppError;
use crate::provider::ImageryProvider;
use crate::sync::{sync_range, SyncReport};
use crate::types::{DateRange, HealthResponse, ImagesResponse, MissingDatesResponse};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use imagery_cache::{Repository, IMAGE_EXTENSION};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

/// Shared state for the HTTP server
pub struct ServerState {
    pub repo: Repository,
    pub provider: Arc<dyn ImageryProvider>,
    pub fetch_concurrency: usize,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(
        repo: Repository,
        provider: Arc<dyn ImageryProvider>,
        fetch_concurrency: usize,
    ) -> Self {
        Self {
            repo,
            provider,
            fetch_concurrency,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/images", get(get_images))
        .route("/api/images/missing", get(get_missing))
        .route("/api/images/sync", post(sync_images))
        .route("/api/cache", delete(clear_cache))
        .route("/images/{file}", get(get_image_file))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

/// Longest inclusive range a single request may cover, about ten years
pub const MAX_RANGE_DAYS: i64 = 3660;

fn check_range(range: &DateRange) -> Result<(), AppError> {
    if range.start > range.end {
        return Err(AppError::BadRequest(format!(
            "start {} is after end {}",
            range.start, range.end
        )));
    }
    let days = (range.end - range.start).num_days() + 1;
    if days > MAX_RANGE_DAYS {
        return Err(AppError::BadRequest(format!(
            "range of {} days exceeds the limit of {}",
            days, MAX_RANGE_DAYS
        )));
    }
    Ok(())
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let cache = state.repo.stats().await;
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        cache,
    })
}

/// Cached images for a date range
async fn get_images(
    State(state): State<SharedState>,
    Query(range): Query<DateRange>,
) -> Result<Json<ImagesResponse>, AppError> {
    check_range(&range)?;
    let bbox = state.repo.config().default_bounding_box;

    let images = state
        .repo
        .get_cached_images(&bbox, range.start, range.end)
        .await
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "No cached imagery between {} and {}",
                range.start, range.end
            ))
        })?;

    let bounding_box = state
        .repo
        .document()
        .await
        .map(|doc| doc.bounding_box)
        .unwrap_or(bbox);

    Ok(Json(ImagesResponse {
        bounding_box,
        images,
    }))
}

/// Days in the range with no cached image
async fn get_missing(
    State(state): State<SharedState>,
    Query(range): Query<DateRange>,
) -> Result<Json<MissingDatesResponse>, AppError> {
    check_range(&range)?;
    let candidates = crate::sync::days_between(range.start, range.end);
    let dates = state.repo.get_missing_dates(&candidates).await;
    Ok(Json(MissingDatesResponse { dates }))
}

/// Fetch and cache every missing day in the range
async fn sync_images(
    State(state): State<SharedState>,
    Json(range): Json<DateRange>,
) -> Result<Json<SyncReport>, AppError> {
    check_range(&range)?;
    let bbox = state.repo.config().default_bounding_box;

    let report = sync_range(
        &state.repo,
        state.provider.as_ref(),
        &bbox,
        range.start,
        range.end,
        state.fetch_concurrency,
    )
    .await;

    Ok(Json(report))
}

async fn clear_cache(State(state): State<SharedState>) -> StatusCode {
    state.repo.clear_cache().await;
    StatusCode::NO_CONTENT
}

/// Serve one cached image by file name, e.g. `2024-01-05.png`
async fn get_image_file(
    State(state): State<SharedState>,
    Path(file): Path<String>,
) -> Result<Response, AppError> {
    let date = file
        .strip_suffix(IMAGE_EXTENSION)
        .and_then(|stem| stem.strip_suffix('.'))
        .and_then(|stem| NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok())
        .ok_or_else(|| AppError::NotFound(format!("Unknown image {}", file)))?;

    let data = state
        .repo
        .image_bytes(date)
        .await
        .ok_or_else(|| AppError::NotFound(format!("No cached image for {}", date)))?;

    debug!(date = %date, size = data.len(), "Serving cached image");
    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "public, max-age=86400"),
            (HeaderName::from_static("x-cache"), "HIT"),
        ],
        data,
    )
        .into_response())
}
