use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde_derive::Deserialize;

use crate::{
    elevation_api::api::DEFAULT_BASE_URL,
    error::{Error, Result},
    processors::{elevation_gain::DEFAULT_NOISE_THRESHOLD, elevation_sync::SyncOptions},
};

pub const DEFAULT_CONFIG_FILE: &str = "climb-sync.toml";
pub const API_KEY_ENV: &str = "CLIMB_SYNC_API_KEY";

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ElevationApiSettings {
    pub base_url: String,
    pub api_key: String,
}

impl Default for ElevationApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SyncSettings {
    pub page_size: usize,
    pub inter_request_delay_ms: u64,
    pub request_timeout_ms: u64,
    pub rate_limit_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        let options = SyncOptions::default();

        Self {
            page_size: options.page_size,
            inter_request_delay_ms: options.inter_request_delay.as_millis() as u64,
            request_timeout_ms: options.request_timeout.as_millis() as u64,
            rate_limit_retries: options.rate_limit_retries,
            retry_base_delay_ms: options.retry_base_delay.as_millis() as u64,
        }
    }
}

impl SyncSettings {
    pub fn options(&self) -> SyncOptions {
        SyncOptions {
            page_size: self.page_size,
            inter_request_delay: Duration::from_millis(self.inter_request_delay_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            rate_limit_retries: self.rate_limit_retries,
            retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ClimbSettings {
    pub noise_threshold_m: f64,
}

impl Default for ClimbSettings {
    fn default() -> Self {
        Self {
            noise_threshold_m: DEFAULT_NOISE_THRESHOLD,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub elevation_api: ElevationApiSettings,
    pub sync: SyncSettings,
    pub climb: ClimbSettings,
}

impl Settings {
    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;

        Ok(settings)
    }

    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let mut settings = match std::fs::read_to_string(path) {
            Ok(content) => Settings::from_toml(&content).map_err(|e| match e {
                Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
                other => other,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Settings::default(),
            Err(e) => return Err(Error::Config(format!("{}: {}", path.display(), e))),
        };

        if settings.elevation_api.api_key.is_empty() {
            if let Ok(api_key) = std::env::var(API_KEY_ENV) {
                settings.elevation_api.api_key = api_key;
            }
        }

        Ok(settings)
    }

    pub fn default_path() -> PathBuf {
        std::env::current_dir()
            .unwrap_or_default()
            .join(DEFAULT_CONFIG_FILE)
    }

    pub fn has_api_key(&self) -> bool {
        !self.elevation_api.api_key.trim().is_empty()
    }

    fn validate(&self) -> Result<()> {
        if self.sync.page_size == 0 {
            return Err(Error::Config("sync.page_size must be at least 1".into()));
        }

        if self.sync.request_timeout_ms == 0 {
            return Err(Error::Config(
                "sync.request_timeout_ms must be at least 1".into(),
            ));
        }

        if !(self.climb.noise_threshold_m >= 0.) {
            return Err(Error::Config(
                "climb.noise_threshold_m must be a non-negative number".into(),
            ));
        }

        Ok(())
    }
}
