//! Fix normalization
//!
//! Turns raw track text into an ordered, cleaned sequence of GPS fixes.
//! Two recorder formats are supported and auto-detected: IGC (the compact
//! line format written by flight loggers) and GPX (XML track points).
//!
//! The normalizer is a pure function of the input text: malformed records
//! are skipped silently, surviving fixes are stably sorted by timestamp,
//! and altitude is smoothed with a centered 30-second moving average.

mod gpx;
mod igc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Half of the altitude smoothing window.
///
/// Raw GPS elevation is noisy (a few meters between samples), which would
/// otherwise register as spurious vertical speed in flight detection.
const SMOOTHING_HALF_WINDOW_S: i64 = 15;

/// One timestamped GPS position sample from a flight recorder.
#[derive(Clone, Debug, PartialEq)]
pub struct Fix {
    /// Sample time in UTC.
    pub timestamp: DateTime<Utc>,
    /// Latitude in degrees, north positive.
    pub latitude: f64,
    /// Longitude in degrees, east positive.
    pub longitude: f64,
    /// Smoothed altitude in meters, if the recorder provided one.
    pub altitude: Option<f64>,
    /// Whether the pilot was on the ground at this fix.
    ///
    /// Attached after normalization by the ground classifier; parsers
    /// always emit `false`.
    pub on_ground: bool,
}

impl Fix {
    pub fn position(&self) -> crate::geo::LatLon {
        crate::geo::LatLon::new(self.latitude, self.longitude)
    }
}

/// Errors produced while normalizing a raw track.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The track text contained no parseable fix record.
    #[error("no valid fixes found in track")]
    NoFixesFound,

    /// An IGC track had fix records but no HFDTE date header.
    #[error("IGC track is missing the HFDTE date header")]
    MissingDate,
}

/// Parses raw track text into an ordered, smoothed fix sequence.
///
/// Recognizes GPX by the presence of `<trkpt` elements, otherwise the
/// text is treated as IGC. Individual malformed records are dropped; only
/// a track yielding zero valid fixes fails.
pub fn normalize(text: &str) -> Result<Vec<Fix>, ParseError> {
    let mut fixes = if text.contains("<trkpt") {
        gpx::parse(text)
    } else {
        igc::parse(text)?
    };

    if fixes.is_empty() {
        return Err(ParseError::NoFixesFound);
    }

    // Stable sort keeps the original relative order of duplicate timestamps
    fixes.sort_by_key(|f| f.timestamp);
    smooth_altitude(&mut fixes);

    Ok(fixes)
}

/// Replaces each fix's altitude with the mean altitude of all fixes within
/// ±15 seconds, considering only fixes that carry an altitude.
///
/// Fixes without any altitude sample in their window keep `None`.
fn smooth_altitude(fixes: &mut [Fix]) {
    let samples: Vec<(DateTime<Utc>, f64)> = fixes
        .iter()
        .filter_map(|f| f.altitude.map(|alt| (f.timestamp, alt)))
        .collect();
    if samples.is_empty() {
        return;
    }

    // Prefix sums keep the per-fix window mean exact and O(1)
    let mut prefix = Vec::with_capacity(samples.len() + 1);
    prefix.push(0.0);
    for (_, alt) in &samples {
        prefix.push(prefix[prefix.len() - 1] + alt);
    }

    let half = Duration::seconds(SMOOTHING_HALF_WINDOW_S);
    let mut lo = 0;
    let mut hi = 0;
    for fix in fixes.iter_mut() {
        while hi < samples.len() && samples[hi].0 <= fix.timestamp + half {
            hi += 1;
        }
        while lo < hi && samples[lo].0 < fix.timestamp - half {
            lo += 1;
        }
        if hi > lo {
            fix.altitude = Some((prefix[hi] - prefix[lo]) / (hi - lo) as f64);
        }
    }
}
