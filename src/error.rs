use std::{fmt, io};

use crate::{processors::elevation_sync::SyncError, util::gpx::GpxError};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Io(io::Error),

    /// Unreadable or invalid settings file
    Config(String),

    Gpx(GpxError),

    Sync(SyncError),

    /// Elevation sync requested without an elevation API key
    MissingApiKey,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Gpx(e) => write!(f, "{}", e),
            Error::Sync(e) => write!(f, "Elevation sync failed: {}", e),
            Error::MissingApiKey => write!(
                f,
                "No elevation API key configured (set elevation_api.api_key or {})",
                crate::util::config::API_KEY_ENV
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Gpx(e) => Some(e),
            Error::Sync(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<GpxError> for Error {
    fn from(err: GpxError) -> Self {
        Error::Gpx(err)
    }
}

impl From<SyncError> for Error {
    fn from(err: SyncError) -> Self {
        Error::Sync(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
