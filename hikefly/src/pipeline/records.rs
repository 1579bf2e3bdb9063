//! Persisted record types: per-flight artifacts, pilot history and the
//! leaderboard.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::score::ScoreBreakdown;

/// Per-flight track artifact stored under `scores/tracks/`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackArtifact {
    /// Downsampled `[lat, lon, altitude]` polyline.
    pub coordinates: Vec<[f64; 3]>,
    pub date: NaiveDate,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// One scored flight in a pilot's history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlightEntry {
    /// Deterministic id derived from the upload key; the sole dedup key
    /// across pipeline runs.
    pub id: String,
    pub date: NaiveDate,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub distance_km: f64,
    pub elevation_gain_m: f64,
    pub duration_s: i64,
    /// Storage key of the flight's track artifact.
    pub track_file: String,
}

/// Aggregate statistics, always a pure fold over the flight list.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PilotStats {
    pub total_score: f64,
    pub total_km: f64,
    pub total_flights: usize,
    pub total_elevation_m: f64,
    pub avg_score: f64,
    pub best_score: f64,
}

/// Per-pilot flight history and aggregates, stored under `scores/users/`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PilotRecord {
    pub pilot_id: String,
    pub display_name: String,
    pub stats: PilotStats,
    /// Newest first.
    pub flights: Vec<FlightEntry>,
}

impl PilotRecord {
    /// A fresh record with no flights.
    pub fn new(pilot_id: impl Into<String>) -> Self {
        let pilot_id = pilot_id.into();
        Self {
            display_name: pilot_id.clone(),
            pilot_id,
            stats: PilotStats::default(),
            flights: Vec::new(),
        }
    }

    /// Appends flights deduplicated by id, re-sorts newest first and
    /// recomputes the stats.
    ///
    /// A flight id already present is never re-appended, which makes
    /// pipeline replays idempotent. Stats are recomputed from scratch
    /// rather than patched so they can never drift from the flight list.
    pub fn merge_flights(&mut self, new_flights: Vec<FlightEntry>) {
        let mut seen: std::collections::HashSet<String> =
            self.flights.iter().map(|f| f.id.clone()).collect();
        for flight in new_flights {
            if seen.insert(flight.id.clone()) {
                self.flights.push(flight);
            }
        }
        // Stable sort: same-date flights keep their insertion order
        self.flights.sort_by(|a, b| b.date.cmp(&a.date));
        self.stats = compute_stats(&self.flights);
    }
}

/// Folds a flight list into aggregate statistics.
pub fn compute_stats(flights: &[FlightEntry]) -> PilotStats {
    let total_score: f64 = flights.iter().map(|f| f.score).sum();
    PilotStats {
        total_score,
        total_km: flights.iter().map(|f| f.distance_km).sum(),
        total_flights: flights.len(),
        total_elevation_m: flights.iter().map(|f| f.elevation_gain_m).sum(),
        avg_score: if flights.is_empty() {
            0.0
        } else {
            total_score / flights.len() as f64
        },
        best_score: flights.iter().map(|f| f.score).fold(0.0, f64::max),
    }
}

/// One pilot's row in the leaderboard.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub pilot_id: String,
    pub display_name: String,
    pub total_score: f64,
    pub total_km: f64,
    pub total_flights: usize,
    pub best_score: f64,
    pub last_flight: Option<NaiveDate>,
}

impl LeaderboardEntry {
    pub fn from_record(record: &PilotRecord) -> Self {
        Self {
            pilot_id: record.pilot_id.clone(),
            display_name: record.display_name.clone(),
            total_score: record.stats.total_score,
            total_km: record.stats.total_km,
            total_flights: record.stats.total_flights,
            best_score: record.stats.best_score,
            last_flight: record.flights.first().map(|f| f.date),
        }
    }
}

/// The global ranking, fully rebuilt on every pipeline run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Leaderboard {
    pub updated_at: DateTime<Utc>,
    /// Sorted by `total_score` descending.
    pub rankings: Vec<LeaderboardEntry>,
}
