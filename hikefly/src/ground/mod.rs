//! Ground segment estimation
//!
//! Hike-and-fly scoring rewards distance covered on foot between flights.
//! The segmenter reads a per-fix `on_ground` flag and sums great-circle
//! distance over coarse five-index hops; sampling every consecutive pair
//! would double-count stationary GPS jitter as hiking distance.
//!
//! The flag itself is produced by a deliberately simple windowed-speed
//! classifier: the scoring contract treats `on_ground` as a given input
//! signal, so any better flight-analysis routine can replace
//! [`classify_on_ground`] without touching the segmenter.

use crate::fix::Fix;
use crate::geo::distance_m;

/// Index stride between sampled hop endpoints.
const STRIDE: usize = 5;

/// Ground speed below which a fix counts as on foot, in m/s.
///
/// Hiking tops out around 2 m/s; a paraglider's ground speed rarely drops
/// under 5 m/s even against wind.
const GROUND_SPEED_THRESHOLD_MS: f64 = 4.0;

/// Half-width of the speed estimation window, in fixes.
const SPEED_WINDOW: usize = 2;

/// Marks fixes whose windowed ground speed is below walking pace.
///
/// Speed is estimated over a small centered window of fixes rather than
/// consecutive pairs, so that position jitter at rest does not read as
/// movement.
pub fn classify_on_ground(fixes: &mut [Fix]) {
    if fixes.is_empty() {
        return;
    }
    let speeds: Vec<f64> = (0..fixes.len())
        .map(|i| {
            let lo = i.saturating_sub(SPEED_WINDOW);
            let hi = (i + SPEED_WINDOW).min(fixes.len() - 1);
            let seconds = (fixes[hi].timestamp - fixes[lo].timestamp).num_seconds();
            if seconds <= 0 {
                return 0.0;
            }
            distance_m(fixes[lo].position(), fixes[hi].position()) / seconds as f64
        })
        .collect();

    for (fix, speed) in fixes.iter_mut().zip(speeds) {
        fix.on_ground = speed < GROUND_SPEED_THRESHOLD_MS;
    }
}

/// Sums qualifying ground travel in kilometers.
///
/// Steps through the track in non-overlapping five-index strides and
/// counts a hop only when *both* endpoints are flagged on-ground.
pub fn ground_distance_km(fixes: &[Fix]) -> f64 {
    let mut total_m = 0.0;
    let mut i = STRIDE;
    while i < fixes.len() {
        if fixes[i - STRIDE].on_ground && fixes[i].on_ground {
            total_m += distance_m(fixes[i - STRIDE].position(), fixes[i].position());
        }
        i += STRIDE;
    }
    total_m / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    /// One fix per second moving east at the given speed.
    fn track_at_speed(count: usize, speed_ms: f64) -> Vec<Fix> {
        let m_per_deg_lon = 111_194.93 * 47.0_f64.to_radians().cos();
        (0..count)
            .map(|i| Fix {
                timestamp: Utc.with_ymd_and_hms(2026, 3, 14, 10, 0, 0).unwrap()
                    + Duration::seconds(i as i64),
                latitude: 47.0,
                longitude: 11.0 + (i as f64 * speed_ms) / m_per_deg_lon,
                altitude: Some(1000.0),
                on_ground: false,
            })
            .collect()
    }

    #[test]
    fn test_walking_pace_is_classified_on_ground() {
        let mut fixes = track_at_speed(30, 1.4);
        classify_on_ground(&mut fixes);

        assert!(fixes.iter().all(|f| f.on_ground));
    }

    #[test]
    fn test_flying_speed_is_classified_airborne() {
        let mut fixes = track_at_speed(30, 11.0);
        classify_on_ground(&mut fixes);

        assert!(fixes.iter().all(|f| !f.on_ground));
    }

    #[test]
    fn test_airborne_track_accumulates_no_ground_distance() {
        let mut fixes = track_at_speed(100, 11.0);
        classify_on_ground(&mut fixes);

        assert_eq!(ground_distance_km(&fixes), 0.0);
    }

    #[test]
    fn test_walked_distance_is_approximately_recovered() {
        // 1000 fixes at 1.5 m/s is 1.5 km on foot
        let mut fixes = track_at_speed(1000, 1.5);
        classify_on_ground(&mut fixes);

        let km = ground_distance_km(&fixes);
        assert!(
            (km - 1.4985).abs() < 0.05,
            "expected about 1.5 km, got {}",
            km
        );
    }

    #[test]
    fn test_hop_requires_both_endpoints_on_ground() {
        let mut fixes = track_at_speed(11, 1.5);
        for f in fixes.iter_mut() {
            f.on_ground = true;
        }
        // Airborne endpoint at index 5 disqualifies both hops touching it
        fixes[5].on_ground = false;

        assert_eq!(ground_distance_km(&fixes), 0.0);
    }

    #[test]
    fn test_ground_distance_is_non_negative_for_short_tracks() {
        assert_eq!(ground_distance_km(&[]), 0.0);
        let fixes = track_at_speed(3, 1.0);
        assert_eq!(ground_distance_km(&fixes), 0.0);
    }

    #[test]
    fn test_stationary_fixes_count_as_on_ground() {
        // Duplicate timestamps and positions: zero elapsed time reads as
        // not moving
        let mut fixes = track_at_speed(5, 0.0);
        for f in fixes.iter_mut() {
            f.timestamp = Utc.with_ymd_and_hms(2026, 3, 14, 10, 0, 0).unwrap();
        }
        classify_on_ground(&mut fixes);

        assert!(fixes.iter().all(|f| f.on_ground));
    }
}
