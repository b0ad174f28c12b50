use std::{fmt, future::Future, time::Duration};

use crate::data_types::location::{LatLng, ServiceElevation};

pub mod api;

pub use api::ElevationApi;

/// Anything able to resolve elevations for a batch of locations.
///
/// A successful lookup returns exactly one result per requested location, in
/// request order.
pub trait ElevationService {
    fn get_elevations(
        &self,
        locations: &[LatLng],
    ) -> impl Future<Output = Result<Vec<ServiceElevation>, ServiceError>> + Send;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// Quota or per-second rate limit exceeded.
    RateLimited,
    InvalidRequest,
    RequestDenied,
    UnknownServiceError,
    /// Status code outside the documented set, kept verbatim.
    UnrecognizedStatus(String),
    ResultCountMismatch { expected: usize, got: usize },
    Transport(String),
    Decode(String),
    Timeout(Duration),
}

impl ServiceError {
    /// Maps a non-OK status of the elevation web service.
    pub fn from_status(status: &str) -> Self {
        match status {
            "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" => ServiceError::RateLimited,
            "INVALID_REQUEST" => ServiceError::InvalidRequest,
            "REQUEST_DENIED" => ServiceError::RequestDenied,
            "UNKNOWN_ERROR" => ServiceError::UnknownServiceError,
            other => ServiceError::UnrecognizedStatus(other.to_string()),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::RateLimited)
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::RateLimited => write!(f, "Over query limit"),
            ServiceError::InvalidRequest => write!(f, "Invalid request"),
            ServiceError::RequestDenied => write!(f, "Request denied"),
            ServiceError::UnknownServiceError => write!(f, "Unknown error"),
            ServiceError::UnrecognizedStatus(status) => {
                write!(f, "Unknown error code \"{}\"", status)
            }
            ServiceError::ResultCountMismatch { expected, got } => {
                write!(f, "Expected {} results, got {}", expected, got)
            }
            ServiceError::Transport(msg) => write!(f, "Transport error: {}", msg),
            ServiceError::Decode(msg) => write!(f, "Malformed response: {}", msg),
            ServiceError::Timeout(after) => {
                write!(f, "No response after {}ms", after.as_millis())
            }
        }
    }
}

impl std::error::Error for ServiceError {}
