//! Batch scoring pipeline
//!
//! Drives the scoring engine over every newly uploaded track and
//! maintains the per-pilot records and the leaderboard. One logical run
//! per invocation; no state survives between runs.
//!
//! Each upload walks a small state machine:
//!
//! ```text
//! Incoming ──► Scored ──► Persisted ──► Processed
//!     │           │            │
//!     └───────────┴────────────┴──► Failed(reason)
//! ```
//!
//! A failed upload stays under `incoming/` and is retried on the next
//! run; the batch continues. Only a leaderboard rebuild failure fails the
//! run as a whole, and even then earlier per-flight writes are retained.

mod records;

pub use records::{
    compute_stats, FlightEntry, Leaderboard, LeaderboardEntry, PilotRecord, PilotStats,
    TrackArtifact,
};

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::daylight::TimezoneLookup;
use crate::score::{self, ScoreError};
use crate::store::{ObjectStore, StorageError};

/// Tracks scored concurrently. Scoring is pure and tracks are
/// independent, so the order of completion does not matter.
const SCORING_CONCURRENCY: usize = 4;

/// Where the pipeline reads and writes, passed in explicitly so the core
/// stays testable against an in-memory store.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Namespace holding new uploads.
    pub incoming_prefix: String,
    /// Namespace archived uploads are moved to.
    pub processed_prefix: String,
    /// Namespace for all scoring output.
    pub scores_prefix: String,
    /// Recognized track-file extensions, lowercase without dot.
    pub track_extensions: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            incoming_prefix: "incoming/".to_string(),
            processed_prefix: "processed/".to_string(),
            scores_prefix: "scores/".to_string(),
            track_extensions: vec!["igc".to_string(), "gpx".to_string()],
        }
    }
}

impl PipelineConfig {
    fn users_prefix(&self) -> String {
        format!("{}users/", self.scores_prefix)
    }

    fn user_key(&self, pilot_id: &str) -> String {
        format!("{}users/{}.json", self.scores_prefix, pilot_id)
    }

    fn track_key(&self, pilot_id: &str, flight_id: &str) -> String {
        format!("{}tracks/{}/{}.json", self.scores_prefix, pilot_id, flight_id)
    }

    fn leaderboard_key(&self) -> String {
        format!("{}leaderboard.json", self.scores_prefix)
    }

    /// Whether a key carries a recognized track-file extension.
    fn is_track_key(&self, key: &str) -> bool {
        match key.rsplit_once('.') {
            Some((_, ext)) => {
                let ext = ext.to_ascii_lowercase();
                self.track_extensions.iter().any(|known| *known == ext)
            }
            None => false,
        }
    }
}

/// Processing states of one uploaded track file.
#[derive(Clone, Debug, PartialEq)]
pub enum TrackState {
    /// Listed under `incoming/`, not yet touched.
    Incoming,
    /// Scoring succeeded.
    Scored,
    /// Track artifact written.
    Persisted,
    /// Source moved to `processed/`.
    Processed,
    /// Left under `incoming/` for the next run.
    Failed(String),
}

/// What one pipeline run accomplished.
#[derive(Debug, Default)]
pub struct PipelineReport {
    /// Uploads that reached [`TrackState::Processed`].
    pub processed: usize,
    /// `(key, reason)` for every failure, per-track or per-pilot.
    pub failed: Vec<(String, String)>,
    pub pilots_updated: usize,
    pub leaderboard_entries: usize,
}

/// Fatal pipeline failures. Per-track errors never surface here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to list objects: {0}")]
    Listing(#[source] StorageError),

    #[error("failed to rebuild leaderboard: {0}")]
    Aggregation(#[source] StorageError),
}

/// Everything that can fail one upload or one pilot update.
#[derive(Debug, Error)]
enum StepError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Score(#[from] ScoreError),

    #[error("unexpected key layout: {0}")]
    BadKey(String),

    #[error("failed to encode record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("scoring worker failed: {0}")]
    Worker(String),
}

/// Runs one full pipeline pass.
///
/// Scores every recognized upload, persists per-flight artifacts, updates
/// the affected pilot records and rebuilds the leaderboard. Per-track and
/// per-pilot failures are reported and skipped; a leaderboard failure
/// fails the run without rolling back earlier writes.
pub async fn run(
    store: Arc<dyn ObjectStore>,
    lookup: Arc<dyn TimezoneLookup>,
    config: &PipelineConfig,
) -> Result<PipelineReport, PipelineError> {
    let keys = store
        .list(&config.incoming_prefix)
        .await
        .map_err(PipelineError::Listing)?;
    let track_keys: Vec<String> = keys.into_iter().filter(|k| config.is_track_key(k)).collect();
    info!(count = track_keys.len(), "uploads to process");

    let mut report = PipelineReport::default();

    // Score uploads concurrently, then re-sort by key so that grouping
    // (and therefore every persisted byte) is deterministic
    let mut outcomes: Vec<(String, Result<(String, FlightEntry), StepError>)> =
        stream::iter(track_keys)
            .map(|key| {
                let store = store.clone();
                let lookup = lookup.clone();
                let config = config.clone();
                async move {
                    let outcome = process_upload(store, lookup, &config, &key).await;
                    (key, outcome)
                }
            })
            .buffer_unordered(SCORING_CONCURRENCY)
            .collect()
            .await;
    outcomes.sort_by(|a, b| a.0.cmp(&b.0));

    let mut per_pilot: BTreeMap<String, Vec<FlightEntry>> = BTreeMap::new();
    for (key, outcome) in outcomes {
        match outcome {
            Ok((pilot_id, entry)) => {
                report.processed += 1;
                per_pilot.entry(pilot_id).or_default().push(entry);
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(key = %key, error = %reason, "upload failed, left in incoming for retry");
                report.failed.push((key, reason));
            }
        }
    }

    for (pilot_id, new_flights) in per_pilot {
        match update_pilot(store.as_ref(), config, &pilot_id, new_flights).await {
            Ok(()) => report.pilots_updated += 1,
            Err(e) => {
                let reason = e.to_string();
                warn!(pilot_id = %pilot_id, error = %reason, "pilot record update failed");
                report.failed.push((config.user_key(&pilot_id), reason));
            }
        }
    }

    report.leaderboard_entries = rebuild_leaderboard(store.as_ref(), config)
        .await
        .map_err(PipelineError::Aggregation)?;

    info!(
        processed = report.processed,
        failed = report.failed.len(),
        pilots = report.pilots_updated,
        "pipeline run complete"
    );
    Ok(report)
}

/// Carries one upload from `Incoming` to `Processed`.
///
/// On success returns the pilot id and the flight entry to fold into the
/// pilot's record. On failure the source object is left untouched.
async fn process_upload(
    store: Arc<dyn ObjectStore>,
    lookup: Arc<dyn TimezoneLookup>,
    config: &PipelineConfig,
    key: &str,
) -> Result<(String, FlightEntry), StepError> {
    let (pilot_id, flight_id) = parse_upload_key(config, key)?;
    debug!(key = %key, state = ?TrackState::Incoming, pilot_id = %pilot_id, "processing upload");

    let bytes = store.get(key).await?;
    let text = String::from_utf8_lossy(&bytes).into_owned();

    // The solver is CPU-bound; keep it off the async executor
    let result = tokio::task::spawn_blocking(move || score::score_track(&text, lookup.as_ref()))
        .await
        .map_err(|e| StepError::Worker(e.to_string()))??;
    debug!(key = %key, state = ?TrackState::Scored, score = result.score, "track scored");

    let track_key = config.track_key(&pilot_id, &flight_id);
    let artifact = TrackArtifact {
        coordinates: result.coordinates.clone(),
        date: result.date,
        score: result.score,
        breakdown: result.breakdown.clone(),
    };
    store
        .put(&track_key, serde_json::to_vec(&artifact)?, "application/json")
        .await?;
    debug!(key = %key, state = ?TrackState::Persisted, track_key = %track_key, "artifact written");

    let processed_key = key.replacen(&config.incoming_prefix, &config.processed_prefix, 1);
    store.move_object(key, &processed_key).await?;
    info!(key = %key, state = ?TrackState::Processed, score = result.score, "upload processed");

    let entry = FlightEntry {
        id: flight_id,
        date: result.date,
        score: result.score,
        breakdown: result.breakdown,
        distance_km: result.distance_km,
        elevation_gain_m: result.elevation_gain_m,
        duration_s: result.duration_s,
        track_file: track_key,
    };
    Ok((pilot_id, entry))
}

/// Splits `incoming/<pilot>/<upload>.<ext>` into pilot id and flight id.
///
/// The flight id is the filename with its extension stripped; it is
/// deterministic for a given upload key.
fn parse_upload_key(config: &PipelineConfig, key: &str) -> Result<(String, String), StepError> {
    let relative = key
        .strip_prefix(&config.incoming_prefix)
        .ok_or_else(|| StepError::BadKey(key.to_string()))?;
    let (pilot_id, filename) = relative
        .split_once('/')
        .ok_or_else(|| StepError::BadKey(key.to_string()))?;
    if pilot_id.is_empty() || filename.is_empty() {
        return Err(StepError::BadKey(key.to_string()));
    }

    let flight_id = match filename.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => filename,
    };
    Ok((pilot_id.to_string(), flight_id.to_string()))
}

/// Loads (or initializes) a pilot record, folds in the new flights and
/// persists it.
async fn update_pilot(
    store: &dyn ObjectStore,
    config: &PipelineConfig,
    pilot_id: &str,
    new_flights: Vec<FlightEntry>,
) -> Result<(), StepError> {
    let key = config.user_key(pilot_id);
    let mut record = match store.get(&key).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(e) => {
                warn!(key = %key, error = %e, "unreadable pilot record, reinitializing");
                PilotRecord::new(pilot_id)
            }
        },
        Err(StorageError::NotFound(_)) => PilotRecord::new(pilot_id),
        Err(e) => return Err(e.into()),
    };

    record.merge_flights(new_flights);
    store
        .put(&key, serde_json::to_vec_pretty(&record)?, "application/json")
        .await?;
    info!(pilot_id = %pilot_id, flights = record.stats.total_flights, "pilot record updated");
    Ok(())
}

/// Rebuilds the leaderboard from every persisted pilot record.
///
/// Always a full rebuild, never an incremental patch. Returns the number
/// of ranked pilots.
async fn rebuild_leaderboard(
    store: &dyn ObjectStore,
    config: &PipelineConfig,
) -> Result<usize, StorageError> {
    let keys = store.list(&config.users_prefix()).await?;

    let mut rankings = Vec::new();
    for key in keys.iter().filter(|k| k.ends_with(".json")) {
        let record: PilotRecord = match store.get(key).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(record) => record,
                Err(e) => {
                    warn!(key = %key, error = %e, "skipping unreadable pilot record");
                    continue;
                }
            },
            Err(e) => {
                warn!(key = %key, error = %e, "skipping unreadable pilot record");
                continue;
            }
        };
        rankings.push(LeaderboardEntry::from_record(&record));
    }
    rankings.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));

    let leaderboard = Leaderboard {
        updated_at: Utc::now(),
        rankings,
    };
    let body = serde_json::to_vec_pretty(&leaderboard)
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    store
        .put(&config.leaderboard_key(), body, "application/json")
        .await?;

    info!(entries = leaderboard.rankings.len(), "leaderboard rebuilt");
    Ok(leaderboard.rankings.len())
}

/// What a reset run deleted (or would delete).
#[derive(Debug)]
pub struct ResetReport {
    pub deleted: Vec<String>,
    pub dry_run: bool,
}

/// Deletes every object under `scores/` and writes an empty leaderboard.
///
/// Uploads under `incoming/` and `processed/` are never touched, so a
/// later pipeline run can rebuild identical results from the archived
/// tracks. With `dry_run` nothing is deleted or written.
pub async fn reset(
    store: &dyn ObjectStore,
    config: &PipelineConfig,
    dry_run: bool,
) -> Result<ResetReport, PipelineError> {
    let keys = store
        .list(&config.scores_prefix)
        .await
        .map_err(PipelineError::Listing)?;

    for key in &keys {
        if dry_run {
            info!(key = %key, "would delete");
        } else {
            store.delete(key).await.map_err(PipelineError::Aggregation)?;
        }
    }

    if !dry_run {
        let empty = Leaderboard {
            updated_at: Utc::now(),
            rankings: Vec::new(),
        };
        let body = serde_json::to_vec_pretty(&empty)
            .map_err(|e| PipelineError::Aggregation(StorageError::Backend(e.to_string())))?;
        store
            .put(&config.leaderboard_key(), body, "application/json")
            .await
            .map_err(PipelineError::Aggregation)?;
    }

    Ok(ResetReport {
        deleted: keys,
        dry_run,
    })
}
