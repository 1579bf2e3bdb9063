//! Score composition
//!
//! Combines the triangle solver's output with the ground distance into
//! the final competition score, and derives the per-flight metadata
//! (date, duration, track distance, downsampled polyline, elevation
//! gain) persisted alongside it.
//!
//! [`score_track`] is the single per-track entry point: it runs the full
//! normalize → daylight-filter → classify → solve → segment → compose
//! chain and is a pure function of the track text and the timezone
//! lookup.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::daylight::{self, TimezoneLookup};
use crate::fix::{self, Fix, ParseError};
use crate::geo::distance_m;
use crate::ground;
use crate::solver::{self, CandidateTriangle, RuleKind, TriangleSolution};

/// Approximate number of points kept in the stored polyline.
const POLYLINE_TARGET_POINTS: usize = 500;

/// The components the total score is assembled from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub triangle_km: f64,
    pub penalty_km: f64,
    pub hiking_km: f64,
    pub multiplier: f64,
    /// Whether the closing gap is small relative to the triangle size.
    pub closed: bool,
}

/// The complete scored outcome of one track.
///
/// Constructed once per track and immutable thereafter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoreResult {
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    /// The winning triangle, if any admissible one was found.
    pub triangle: Option<CandidateTriangle>,
    pub rule: RuleKind,
    /// False when the solver hit its advance cap before proving
    /// optimality; the result is still valid.
    pub optimal: bool,
    /// Whether the daylight filter removed any fixes.
    pub filtered_by_time: bool,
    /// Downsampled `[lat, lon, altitude]` polyline for visualization.
    pub coordinates: Vec<[f64; 3]>,
    /// Competition date: UTC date of the first fix.
    pub date: NaiveDate,
    /// Seconds between the first and last fix.
    pub duration_s: i64,
    /// Total point-to-point track distance (distinct from the triangle
    /// distance).
    pub distance_km: f64,
    /// Sum of positive smoothed-altitude deltas.
    pub elevation_gain_m: f64,
}

/// Errors from scoring a single track.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Every fix fell outside the local daylight window.
    #[error("no fixes within daylight hours")]
    NoDaylightFixes,
}

/// Scores one raw track.
///
/// Pure apart from the timezone lookup; the same text and lookup answers
/// always yield the same result.
pub fn score_track(text: &str, lookup: &dyn TimezoneLookup) -> Result<ScoreResult, ScoreError> {
    let fixes = fix::normalize(text)?;

    // normalize() guarantees at least one fix
    let first = &fixes[0];
    let tz = daylight::resolve_timezone(lookup, first.latitude, first.longitude);
    let (mut fixes, filtered_by_time) = daylight::filter_daylight(fixes, tz);
    if fixes.is_empty() {
        return Err(ScoreError::NoDaylightFixes);
    }

    ground::classify_on_ground(&mut fixes);
    let solution = solver::solve(&fixes);
    let ground_km = ground::ground_distance_km(&fixes);

    Ok(compose(&fixes, &solution, ground_km, filtered_by_time))
}

/// Assembles the final score and flight metadata.
///
/// `total = (triangle_km − 2 × penalty_km + ground_km) × multiplier`,
/// with every distance term in kilometers. `fixes` must be non-empty.
pub fn compose(
    fixes: &[Fix],
    solution: &TriangleSolution,
    ground_km: f64,
    filtered_by_time: bool,
) -> ScoreResult {
    let triangle_km = solution.distance_m() / 1000.0;
    let penalty_km = solution.penalty_m() / 1000.0;
    let multiplier = solution.rule.multiplier;

    let score = (triangle_km - 2.0 * penalty_km + ground_km) * multiplier;
    let closed = triangle_km * 0.2 > penalty_km;

    let first = &fixes[0];
    let last = &fixes[fixes.len() - 1];

    ScoreResult {
        score,
        breakdown: ScoreBreakdown {
            triangle_km,
            penalty_km,
            hiking_km: ground_km,
            multiplier,
            closed,
        },
        triangle: solution.triangle,
        rule: solution.rule.kind,
        optimal: solution.optimal,
        filtered_by_time,
        coordinates: downsample(fixes),
        date: first.timestamp.date_naive(),
        duration_s: (last.timestamp - first.timestamp).num_seconds(),
        distance_km: track_distance_km(fixes),
        elevation_gain_m: elevation_gain_m(fixes),
    }
}

/// Sum of consecutive great-circle legs in kilometers.
fn track_distance_km(fixes: &[Fix]) -> f64 {
    fixes
        .windows(2)
        .map(|pair| distance_m(pair[0].position(), pair[1].position()))
        .sum::<f64>()
        / 1000.0
}

/// Sum of positive altitude deltas in meters.
fn elevation_gain_m(fixes: &[Fix]) -> f64 {
    fixes
        .windows(2)
        .filter_map(|pair| match (pair[0].altitude, pair[1].altitude) {
            (Some(prev), Some(next)) => Some((next - prev).max(0.0)),
            _ => None,
        })
        .sum()
}

/// Evenly strided ~500-point polyline, always ending on the final fix.
fn downsample(fixes: &[Fix]) -> Vec<[f64; 3]> {
    let stride = (fixes.len() / POLYLINE_TARGET_POINTS).max(1);
    let mut coords: Vec<[f64; 3]> = fixes.iter().step_by(stride).map(to_coord).collect();

    if let Some(last) = fixes.last() {
        let last = to_coord(last);
        // Only an exact coordinate repeat at the boundary is dropped
        let duplicate = coords
            .last()
            .is_some_and(|prev| prev[0] == last[0] && prev[1] == last[1]);
        if !duplicate {
            coords.push(last);
        }
    }
    coords
}

fn to_coord(fix: &Fix) -> [f64; 3] {
    [fix.latitude, fix.longitude, fix.altitude.unwrap_or(0.0)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daylight::FixedTimezoneLookup;
    use crate::solver::{ScoringRule, FLAT_TRIANGLE};
    use chrono::{Duration, TimeZone, Utc};

    fn flat_with_multiplier(multiplier: f64) -> ScoringRule {
        ScoringRule {
            multiplier,
            ..FLAT_TRIANGLE
        }
    }

    fn solution(distance_m: f64, gap_m: f64, multiplier: f64) -> TriangleSolution {
        TriangleSolution {
            triangle: Some(CandidateTriangle {
                a: 0,
                b: 1,
                c: 2,
                distance_m,
                closing_gap_m: gap_m,
            }),
            rule: flat_with_multiplier(multiplier),
            optimal: true,
        }
    }

    fn simple_fixes(count: usize) -> Vec<Fix> {
        (0..count)
            .map(|i| Fix {
                timestamp: Utc.with_ymd_and_hms(2026, 3, 14, 10, 0, 0).unwrap()
                    + Duration::seconds(i as i64 * 4),
                latitude: 47.0 + i as f64 * 0.001,
                longitude: 11.0,
                altitude: Some(1000.0 + i as f64),
                on_ground: false,
            })
            .collect()
    }

    #[test]
    fn test_score_formula() {
        // 20 km triangle, 1 km penalty, 5 km on foot, multiplier 1.0
        let result = compose(&simple_fixes(3), &solution(20_000.0, 1_000.0, 1.0), 5.0, false);

        assert!((result.score - 23.0).abs() < 1e-9);
        assert!((result.breakdown.triangle_km - 20.0).abs() < 1e-9);
        assert!((result.breakdown.penalty_km - 1.0).abs() < 1e-9);
        assert!((result.breakdown.hiking_km - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_multiplier_scales_all_terms() {
        let result = compose(&simple_fixes(3), &solution(20_000.0, 1_000.0, 1.4), 5.0, false);
        assert!((result.score - 23.0 * 1.4).abs() < 1e-9);
    }

    #[test]
    fn test_closed_flag_threshold() {
        let small_gap = compose(&simple_fixes(3), &solution(20_000.0, 1_000.0, 1.0), 0.0, false);
        assert!(small_gap.breakdown.closed);

        let large_gap = compose(&simple_fixes(3), &solution(20_000.0, 5_000.0, 1.0), 0.0, false);
        assert!(!large_gap.breakdown.closed);
    }

    #[test]
    fn test_null_triangle_scores_ground_only() {
        let null = TriangleSolution {
            triangle: None,
            rule: FLAT_TRIANGLE,
            optimal: true,
        };
        let result = compose(&simple_fixes(3), &null, 5.0, false);

        assert!((result.score - 5.0 * FLAT_TRIANGLE.multiplier).abs() < 1e-9);
        assert_eq!(result.breakdown.triangle_km, 0.0);
        assert_eq!(result.breakdown.penalty_km, 0.0);
    }

    #[test]
    fn test_date_and_duration() {
        let fixes = simple_fixes(10);
        let result = compose(&fixes, &solution(0.0, 0.0, 1.0), 0.0, false);

        assert_eq!(
            result.date,
            NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
        );
        assert_eq!(result.duration_s, 36);
    }

    #[test]
    fn test_elevation_gain_sums_positive_deltas_only() {
        let mut fixes = simple_fixes(4);
        fixes[0].altitude = Some(1000.0);
        fixes[1].altitude = Some(1050.0);
        fixes[2].altitude = Some(1020.0);
        fixes[3].altitude = Some(1080.0);

        let result = compose(&fixes, &solution(0.0, 0.0, 1.0), 0.0, false);
        assert!((result.elevation_gain_m - 110.0).abs() < 1e-9);
    }

    #[test]
    fn test_polyline_is_downsampled_and_ends_on_last_fix() {
        let fixes = simple_fixes(1200);
        let result = compose(&fixes, &solution(0.0, 0.0, 1.0), 0.0, false);

        // Stride 2 keeps 600 points; the final fix is already the last
        // strided point's successor
        assert!(result.coordinates.len() <= 601);
        assert!(result.coordinates.len() >= 500);
        let last_fix = &fixes[fixes.len() - 1];
        let last_coord = result.coordinates[result.coordinates.len() - 1];
        assert_eq!(last_coord[0], last_fix.latitude);
        assert_eq!(last_coord[1], last_fix.longitude);
    }

    #[test]
    fn test_polyline_short_track_keeps_every_point() {
        let fixes = simple_fixes(42);
        let result = compose(&fixes, &solution(0.0, 0.0, 1.0), 0.0, false);

        assert_eq!(result.coordinates.len(), 42);
    }

    #[test]
    fn test_polyline_deduplicates_exact_boundary_repeat() {
        let mut fixes = simple_fixes(1000);
        // Stride 2 keeps index 998; give the final fix the same position
        // so appending it would duplicate the boundary point
        fixes[999].latitude = fixes[998].latitude;
        fixes[999].longitude = fixes[998].longitude;

        let result = compose(&fixes, &solution(0.0, 0.0, 1.0), 0.0, false);
        assert_eq!(result.coordinates.len(), 500);
    }

    #[test]
    fn test_score_track_from_gpx() {
        let mut body = String::new();
        for i in 0..40 {
            body.push_str(&format!(
                "<trkpt lat=\"{}\" lon=\"11.0\"><ele>1000</ele>\
                 <time>2026-03-14T10:{:02}:00Z</time></trkpt>\n",
                47.0 + i as f64 * 0.001,
                i
            ));
        }
        let text = format!("<gpx><trk><trkseg>{}</trkseg></trk></gpx>", body);
        let lookup = FixedTimezoneLookup::new("Etc/GMT+0");

        let result = score_track(&text, &lookup).unwrap();
        assert!(!result.filtered_by_time);
        assert!(result.distance_km > 0.0);
        assert!(result.breakdown.hiking_km >= 0.0);
        assert!(result.breakdown.penalty_km >= 0.0);
        assert_eq!(result.date, NaiveDate::from_ymd_opt(2026, 3, 14).unwrap());
    }

    #[test]
    fn test_score_track_rejects_night_only_track() {
        let text = r#"<gpx><trkseg>
<trkpt lat="47.0" lon="11.0"><time>2026-03-14T22:00:00Z</time></trkpt>
<trkpt lat="47.1" lon="11.0"><time>2026-03-14T22:01:00Z</time></trkpt>
</trkseg></gpx>"#;
        let lookup = FixedTimezoneLookup::new("Etc/GMT+0");

        assert!(matches!(
            score_track(text, &lookup),
            Err(ScoreError::NoDaylightFixes)
        ));
    }

    #[test]
    fn test_score_track_propagates_parse_failure() {
        let lookup = FixedTimezoneLookup::new("Etc/GMT+0");
        assert!(matches!(
            score_track("garbage", &lookup),
            Err(ScoreError::Parse(_))
        ));
    }
}
