//! Error types for the imagery server

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum ServerError {
    Provider(String),
    Http(Box<reqwest::Error>),
    Io(Box<std::io::Error>),
    Config(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Provider(msg) => write!(f, "Imagery provider error: {}", msg),
            ServerError::Http(err) => write!(f, "HTTP error: {}", err),
            ServerError::Io(err) => write!(f, "IO error: {}", err),
            ServerError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Http(err) => Some(err.as_ref()),
            ServerError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ServerError {
    fn from(err: reqwest::Error) -> Self {
        ServerError::Http(Box::new(err))
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for ServerError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        ServerError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

/// Route error type that converts to HTTP responses
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display() {
        let err = ServerError::Provider("upstream returned 503".to_string());
        assert_eq!(
            format!("{}", err),
            "Imagery provider error: upstream returned 503"
        );
    }

    #[test]
    fn test_config_error_display() {
        let err = ServerError::Config("invalid BBOX".to_string());
        assert_eq!(format!("{}", err), "Configuration error: invalid BBOX");
    }

    #[test]
    fn test_io_error_is_source() {
        use std::error::Error;

        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port taken");
        let err = ServerError::from(io);
        assert!(err.source().is_some());
        assert_eq!(format!("{}", err), "IO error: port taken");
    }

    #[test]
    fn test_app_error_status() {
        let response = AppError::BadRequest("start after end".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = AppError::NotFound("nothing".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
