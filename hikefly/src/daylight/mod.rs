//! Daylight filtering
//!
//! Restricts a track to the local "flyable" hours. The timezone is
//! resolved from the first fix's coordinates through a [`TimezoneLookup`]
//! implementation; when the lookup is unavailable a deterministic
//! longitude-bucket fallback (one zone per 15 degrees) is used instead.
//!
//! Fixes outside typical daylight hours are treated as recorder noise or
//! irrelevant activity and removed; filtering never reorders fixes.

use chrono::Timelike;
use chrono_tz::Tz;
use serde::Deserialize;
use thiserror::Error;

use crate::fix::Fix;

/// First local hour considered flyable (inclusive).
pub const DAY_START_HOUR: u32 = 8;

/// First local hour no longer considered flyable (exclusive).
pub const DAY_END_HOUR: u32 = 17;

/// Errors from timezone resolution.
///
/// These are never fatal to scoring: any failure degrades to the
/// longitude fallback zone.
#[derive(Clone, Debug, Error)]
pub enum TimezoneError {
    /// The lookup service could not be reached or answered non-2xx.
    #[error("timezone request failed: {0}")]
    Http(String),

    /// The lookup service answered with an unexpected payload.
    #[error("unexpected timezone service response: {0}")]
    InvalidResponse(String),
}

/// Resolves an IANA timezone name from coordinates.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock lookups in tests.
pub trait TimezoneLookup: Send + Sync {
    /// Returns the IANA zone name (e.g. `Europe/Vienna`) for a position.
    fn resolve(&self, lat: f64, lon: f64) -> Result<String, TimezoneError>;
}

/// Real lookup implementation backed by the timeapi.io coordinate API.
pub struct HttpTimezoneLookup {
    client: reqwest::blocking::Client,
}

#[derive(Deserialize)]
struct TimezoneResponse {
    #[serde(rename = "timeZone")]
    time_zone: String,
}

impl HttpTimezoneLookup {
    /// Creates a lookup client with a default request timeout.
    pub fn new() -> Result<Self, TimezoneError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| TimezoneError::Http(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl TimezoneLookup for HttpTimezoneLookup {
    fn resolve(&self, lat: f64, lon: f64) -> Result<String, TimezoneError> {
        let url = format!(
            "https://timeapi.io/api/timezone/coordinate?latitude={}&longitude={}",
            lat, lon
        );
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| TimezoneError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TimezoneError::Http(format!(
                "HTTP {} from timezone service",
                response.status()
            )));
        }

        let body = response
            .text()
            .map_err(|e| TimezoneError::Http(e.to_string()))?;
        let parsed: TimezoneResponse =
            serde_json::from_str(&body).map_err(|e| TimezoneError::InvalidResponse(e.to_string()))?;

        Ok(parsed.time_zone)
    }
}

/// Lookup that always answers with a fixed zone name.
///
/// Useful for offline runs and deterministic tests.
pub struct FixedTimezoneLookup {
    zone: String,
}

impl FixedTimezoneLookup {
    pub fn new(zone: impl Into<String>) -> Self {
        Self { zone: zone.into() }
    }
}

impl TimezoneLookup for FixedTimezoneLookup {
    fn resolve(&self, _lat: f64, _lon: f64) -> Result<String, TimezoneError> {
        Ok(self.zone.clone())
    }
}

/// Deterministic longitude-bucket fallback: one zone per 15 degrees.
///
/// The `Etc/GMT` area uses an inverted sign convention, so a positive
/// offset east of Greenwich maps to `Etc/GMT-N`.
pub fn fallback_zone(lon: f64) -> Tz {
    let offset = (lon / 15.0).round() as i32;
    let name = if offset > 0 {
        format!("Etc/GMT-{}", offset)
    } else {
        format!("Etc/GMT+{}", -offset)
    };
    name.parse().unwrap_or(chrono_tz::UTC)
}

/// Resolves the track timezone, degrading to the longitude fallback on
/// any lookup failure or unknown zone name.
pub fn resolve_timezone(lookup: &dyn TimezoneLookup, lat: f64, lon: f64) -> Tz {
    match lookup.resolve(lat, lon) {
        Ok(name) => match name.parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                tracing::warn!(zone = %name, "unknown timezone name, using longitude fallback");
                fallback_zone(lon)
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "timezone lookup failed, using longitude fallback");
            fallback_zone(lon)
        }
    }
}

/// Removes fixes whose local hour falls outside `[8, 17)`.
///
/// Returns the surviving fixes (order preserved) and whether anything was
/// removed, for downstream diagnostics.
pub fn filter_daylight(fixes: Vec<Fix>, tz: Tz) -> (Vec<Fix>, bool) {
    let before = fixes.len();
    let kept: Vec<Fix> = fixes
        .into_iter()
        .filter(|f| {
            let hour = f.timestamp.with_timezone(&tz).hour();
            (DAY_START_HOUR..DAY_END_HOUR).contains(&hour)
        })
        .collect();
    let removed_any = kept.len() < before;
    (kept, removed_any)
}
