//! GPX track format parsing
//!
//! Extracts `<trkpt>` elements with a lightweight regex scan rather than a
//! full XML parser: track points are the only elements of interest and
//! recorders emit them in a flat, predictable shape. Points missing a
//! position or timestamp are skipped.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use super::Fix;

/// Matches one `<trkpt ...>...</trkpt>` element.
///
/// We capture:
/// - Group 1: the attribute list (carries `lat` and `lon`)
/// - Group 2: the element body (carries `<time>` and `<ele>`)
fn trkpt_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)<trkpt\s([^>]*)>(.*?)</trkpt>").unwrap())
}

fn lat_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"lat=["']([^"']+)["']"#).unwrap())
}

fn lon_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"lon=["']([^"']+)["']"#).unwrap())
}

fn time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<time[^>]*>([^<]*)</time>").unwrap())
}

fn ele_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<ele[^>]*>([^<]*)</ele>").unwrap())
}

pub(crate) fn parse(text: &str) -> Vec<Fix> {
    let mut fixes = Vec::new();

    for captures in trkpt_pattern().captures_iter(text) {
        let attrs = &captures[1];
        let body = &captures[2];

        let Some(latitude) = capture_f64(lat_pattern(), attrs) else {
            continue;
        };
        let Some(longitude) = capture_f64(lon_pattern(), attrs) else {
            continue;
        };
        if latitude.abs() > 90.0 || longitude.abs() > 180.0 {
            continue;
        }
        let Some(timestamp) = time_pattern()
            .captures(body)
            .and_then(|c| DateTime::parse_from_rfc3339(c[1].trim()).ok())
        else {
            continue;
        };

        fixes.push(Fix {
            timestamp: timestamp.with_timezone(&Utc),
            latitude,
            longitude,
            altitude: capture_f64(ele_pattern(), body),
            on_ground: false,
        });
    }

    fixes
}

fn capture_f64(pattern: &Regex, haystack: &str) -> Option<f64> {
    let value: f64 = pattern.captures(haystack)?[1].trim().parse().ok()?;
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parse_simple_track() {
        let text = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test">
  <trk><trkseg>
    <trkpt lat="47.0640" lon="11.0570">
      <ele>1420.5</ele>
      <time>2026-03-14T10:05:04Z</time>
    </trkpt>
    <trkpt lat="47.0650" lon="11.0580">
      <ele>1425.0</ele>
      <time>2026-03-14T10:05:08Z</time>
    </trkpt>
  </trkseg></trk>
</gpx>"#;

        let fixes = parse(text);
        assert_eq!(fixes.len(), 2);
        assert_eq!(fixes[0].latitude, 47.0640);
        assert_eq!(fixes[0].longitude, 11.0570);
        assert_eq!(fixes[0].altitude, Some(1420.5));
        assert_eq!(fixes[0].timestamp.hour(), 10);
    }

    #[test]
    fn test_point_without_elevation() {
        let text = r#"<trkpt lat="47.0" lon="11.0"><time>2026-03-14T10:05:04Z</time></trkpt>"#;
        let fixes = parse(text);

        assert_eq!(fixes.len(), 1);
        assert_eq!(fixes[0].altitude, None);
    }

    #[test]
    fn test_points_missing_position_or_time_are_skipped() {
        let text = r#"
<trkpt lat="47.0" lon="11.0"><time>2026-03-14T10:05:04Z</time></trkpt>
<trkpt lon="11.0"><time>2026-03-14T10:05:05Z</time></trkpt>
<trkpt lat="47.0" lon="11.0"><ele>1000</ele></trkpt>
<trkpt lat="not-a-number" lon="11.0"><time>2026-03-14T10:05:06Z</time></trkpt>
<trkpt lat="47.0" lon="11.0"><time>not-a-time</time></trkpt>
<trkpt lat="47.1" lon="11.1"><time>2026-03-14T10:05:07Z</time></trkpt>"#;

        let fixes = parse(text);
        assert_eq!(fixes.len(), 2);
    }

    #[test]
    fn test_out_of_range_coordinates_are_skipped() {
        let text = r#"<trkpt lat="95.0" lon="11.0"><time>2026-03-14T10:05:04Z</time></trkpt>"#;
        assert!(parse(text).is_empty());
    }

    #[test]
    fn test_timezone_offset_is_converted_to_utc() {
        let text =
            r#"<trkpt lat="47.0" lon="11.0"><time>2026-03-14T11:05:04+01:00</time></trkpt>"#;
        let fixes = parse(text);

        assert_eq!(fixes[0].timestamp.hour(), 10);
    }

    #[test]
    fn test_single_quoted_attributes() {
        let text = r#"<trkpt lat='47.0' lon='11.0'><time>2026-03-14T10:05:04Z</time></trkpt>"#;
        assert_eq!(parse(text).len(), 1);
    }
}
