// src/error.rs
use std::fmt;
use thiserror::Error;
use warp::http::StatusCode;
use warp::reject::Reject;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to connect to store: {0}")]
    Connection(String),

    #[error("store query failed: {0}")]
    Query(String),

    #[error("store is closed")]
    Closed,

    #[error("corrupt document in {collection}: {message}")]
    Corrupt {
        collection: &'static str,
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("invalid value {value:?} for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Rejection carried out of a handler and rendered as `{"message": ...}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            message: message.into(),
        }
    }

    /// Maps a service failure onto a status. Store failures are hidden behind
    /// `fallback` so backend details never reach the caller.
    pub fn from_service(err: ServiceError, fallback: &str) -> Self {
        match err {
            ServiceError::NotFound(message) => ApiError::new(StatusCode::NOT_FOUND, message),
            ServiceError::BadRequest(message) => ApiError::new(StatusCode::BAD_REQUEST, message),
            ServiceError::Store(_) => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, fallback),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status, self.message)
    }
}

impl std::error::Error for ApiError {}

impl Reject for ApiError {}
