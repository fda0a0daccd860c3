//! Configuration parsed from environment variables.
//!
//! Required:
//! - `FIREBASE_DATABASE_URL` (e.g. `https://travel-sketch-default-rtdb.firebaseio.com`)
//! - `FIREBASE_STORAGE_BUCKET` (e.g. `travel-sketch.appspot.com`)
//!
//! Optional:
//! - `FIREBASE_AUTH_TOKEN`: appended as `auth=` / bearer token when set
//! - `FIREBASE_STORAGE_URL`: default `https://firebasestorage.googleapis.com`
//! - `TRAVELSKETCH_FETCH_CONNECT_TIMEOUT_SECS`: default 10
//! - `TRAVELSKETCH_FETCH_READ_TIMEOUT_SECS`: default 10
//! - `TRAVELSKETCH_IMAGE_MAX_EDGE`: default 500
//! - `TRAVELSKETCH_VIDEO_WIDTH` / `TRAVELSKETCH_VIDEO_HEIGHT`: default 600 / 400
//! - `TRAVELSKETCH_TEXT_SIZE`: default 70
//! - `TRAVELSKETCH_EXPORT_WIDTH` / `TRAVELSKETCH_EXPORT_HEIGHT`: default 1080 / 1920
//! - `TRAVELSKETCH_EXPORT_TEXT_SIZE`: default 90

use crate::layout::{DEFAULT_IMAGE_MAX_EDGE, DEFAULT_TEXT_SIZE, DEFAULT_VIDEO_SIZE};

pub const DEFAULT_STORAGE_URL: &str = "https://firebasestorage.googleapis.com";
pub const DEFAULT_FETCH_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_FETCH_READ_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_EXPORT_PAGE: (u32, u32) = (1080, 1920);
pub const DEFAULT_EXPORT_TEXT_SIZE: f32 = 90.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirebaseConfig {
    pub database_url: String,
    pub storage_url: String,
    pub bucket: String,
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTimeouts {
    pub connect_secs: u64,
    pub read_secs: u64,
}

impl Default for FetchTimeouts {
    fn default() -> Self {
        Self { connect_secs: DEFAULT_FETCH_CONNECT_TIMEOUT_SECS, read_secs: DEFAULT_FETCH_READ_TIMEOUT_SECS }
    }
}

/// Sizes used when building new boxes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementConfig {
    pub image_max_edge: u32,
    pub video_size: (i32, i32),
    pub text_size: f32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self { image_max_edge: DEFAULT_IMAGE_MAX_EDGE, video_size: DEFAULT_VIDEO_SIZE, text_size: DEFAULT_TEXT_SIZE }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportConfig {
    pub page_width: u32,
    pub page_height: u32,
    pub text_size: f32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { page_width: DEFAULT_EXPORT_PAGE.0, page_height: DEFAULT_EXPORT_PAGE.1, text_size: DEFAULT_EXPORT_TEXT_SIZE }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SketchConfig {
    pub firebase: FirebaseConfig,
    pub fetch: FetchTimeouts,
    pub placement: PlacementConfig,
    pub export: ExportConfig,
}

impl SketchConfig {
    /// Build typed config from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a numeric value
    /// does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| match std::env::var(key) {
            Ok(value) => Some(value),
            Err(_) => None,
        })
    }

    /// Build typed config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`SketchConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = required(&lookup, "FIREBASE_DATABASE_URL")?;
        let bucket = required(&lookup, "FIREBASE_STORAGE_BUCKET")?;
        let storage_url = lookup("FIREBASE_STORAGE_URL").unwrap_or_else(|| DEFAULT_STORAGE_URL.to_string());
        let auth_token = lookup("FIREBASE_AUTH_TOKEN").filter(|t| !t.is_empty());

        let firebase = FirebaseConfig {
            database_url: database_url.trim_end_matches('/').to_string(),
            storage_url: storage_url.trim_end_matches('/').to_string(),
            bucket,
            auth_token,
        };

        let fetch = FetchTimeouts {
            connect_secs: parsed(
                &lookup,
                "TRAVELSKETCH_FETCH_CONNECT_TIMEOUT_SECS",
                DEFAULT_FETCH_CONNECT_TIMEOUT_SECS,
            )?,
            read_secs: parsed(&lookup, "TRAVELSKETCH_FETCH_READ_TIMEOUT_SECS", DEFAULT_FETCH_READ_TIMEOUT_SECS)?,
        };

        let placement = PlacementConfig {
            image_max_edge: parsed(&lookup, "TRAVELSKETCH_IMAGE_MAX_EDGE", DEFAULT_IMAGE_MAX_EDGE)?,
            video_size: (
                parsed(&lookup, "TRAVELSKETCH_VIDEO_WIDTH", DEFAULT_VIDEO_SIZE.0)?,
                parsed(&lookup, "TRAVELSKETCH_VIDEO_HEIGHT", DEFAULT_VIDEO_SIZE.1)?,
            ),
            text_size: parsed(&lookup, "TRAVELSKETCH_TEXT_SIZE", DEFAULT_TEXT_SIZE)?,
        };

        let export = ExportConfig {
            page_width: parsed(&lookup, "TRAVELSKETCH_EXPORT_WIDTH", DEFAULT_EXPORT_PAGE.0)?,
            page_height: parsed(&lookup, "TRAVELSKETCH_EXPORT_HEIGHT", DEFAULT_EXPORT_PAGE.1)?,
            text_size: parsed(&lookup, "TRAVELSKETCH_EXPORT_TEXT_SIZE", DEFAULT_EXPORT_TEXT_SIZE)?,
        };

        Ok(Self { firebase, fetch, placement, export })
    }
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn parsed<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
