//! Runtime configuration read from environment variables.
//!
//! Every value has a default so the app starts with no environment at all.
//! Malformed values are rejected instead of silently replaced.

use std::time::Duration;

use thiserror::Error;

use crate::model::Coordinate;

pub const DEFAULT_BASE_URL: &str = "http://10.0.0.95:3000";
pub const DEFAULT_PERMISSION_WAIT_SECS: u64 = 30;
pub const DEFAULT_PREVIEW_SIZE: (u32, u32) = (1280, 720);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} is not a valid number: '{value}'")]
    InvalidNumber { key: &'static str, value: String },
    #[error("{key} must be 'lat,lon', got '{value}'")]
    InvalidLocation { key: &'static str, value: String },
    #[error("{key} must be 'WIDTHxHEIGHT', got '{value}'")]
    InvalidSize { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Base URL of the POI service, without trailing slash.
    pub base_url: String,
    /// `None` means the POI request never times out.
    pub request_timeout: Option<Duration>,
    /// Desktop builds have no GPS; this stands in for the fix.
    pub fixed_location: Option<Coordinate>,
    /// How long to poll for a location permission decision on Android.
    pub permission_wait: Duration,
    pub preview_size: (u32, u32),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: None,
            fixed_location: None,
            permission_wait: Duration::from_secs(DEFAULT_PERMISSION_WAIT_SECS),
            preview_size: DEFAULT_PREVIEW_SIZE,
        }
    }
}

impl AppConfig {
    /// Build config from process environment.
    ///
    /// - `POI_LENS_BASE_URL`: default `http://10.0.0.95:3000`
    /// - `POI_LENS_REQUEST_TIMEOUT_SECS`: unset or `0` disables the timeout
    /// - `POI_LENS_FIXED_LOCATION`: `lat,lon`
    /// - `POI_LENS_PERMISSION_WAIT_SECS`: default 30
    /// - `POI_LENS_PREVIEW_SIZE`: `WIDTHxHEIGHT`, default `1280x720`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = AppConfig::default();

        if let Some(url) = lookup("POI_LENS_BASE_URL") {
            let url = url.trim().trim_end_matches('/');
            if !url.is_empty() {
                config.base_url = url.to_string();
            }
        }

        if let Some(raw) = lookup("POI_LENS_REQUEST_TIMEOUT_SECS") {
            let secs = parse_u64("POI_LENS_REQUEST_TIMEOUT_SECS", &raw)?;
            config.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Some(raw) = lookup("POI_LENS_FIXED_LOCATION") {
            config.fixed_location = Some(parse_location("POI_LENS_FIXED_LOCATION", &raw)?);
        }

        if let Some(raw) = lookup("POI_LENS_PERMISSION_WAIT_SECS") {
            config.permission_wait =
                Duration::from_secs(parse_u64("POI_LENS_PERMISSION_WAIT_SECS", &raw)?);
        }

        if let Some(raw) = lookup("POI_LENS_PREVIEW_SIZE") {
            config.preview_size = parse_size("POI_LENS_PREVIEW_SIZE", &raw)?;
        }

        Ok(config)
    }
}

fn parse_u64(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidNumber {
        key,
        value: raw.to_string(),
    })
}

fn parse_location(key: &'static str, raw: &str) -> Result<Coordinate, ConfigError> {
    let invalid = || ConfigError::InvalidLocation {
        key,
        value: raw.to_string(),
    };
    let (lat, lon) = raw.split_once(',').ok_or_else(invalid)?;
    let lat = lat.trim().parse::<f64>().map_err(|_| invalid())?;
    let lon = lon.trim().parse::<f64>().map_err(|_| invalid())?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(invalid());
    }
    Ok(Coordinate::new(lat, lon))
}

fn parse_size(key: &'static str, raw: &str) -> Result<(u32, u32), ConfigError> {
    let invalid = || ConfigError::InvalidSize {
        key,
        value: raw.to_string(),
    };
    let (w, h) = raw.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
    let w = w.parse::<u32>().map_err(|_| invalid())?;
    let h = h.parse::<u32>().map_err(|_| invalid())?;
    if w == 0 || h == 0 {
        return Err(invalid());
    }
    Ok((w, h))
}
