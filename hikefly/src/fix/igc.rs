//! IGC track format parsing
//!
//! IGC files are line-oriented: an `HFDTE` header carries the flight date
//! and each `B` record packs time, position, fix validity and two
//! altitudes into fixed byte columns:
//!
//! ```text
//! B HHMMSS DDMMmmmN DDDMMmmmE A PPPPP GGGGG
//!   time   latitude longitude |  baro  gps
//!                             validity
//! ```
//!
//! Records that do not fit the layout are skipped rather than failing the
//! track. A UTC midnight crossing (time jumping backwards by more than
//! twelve hours) advances the date by one day.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use super::{Fix, ParseError};

/// Shortest B record carrying time, position and pressure altitude.
const MIN_B_RECORD_LEN: usize = 30;

/// B record long enough to also carry a GPS altitude.
const FULL_B_RECORD_LEN: usize = 35;

pub(crate) fn parse(text: &str) -> Result<Vec<Fix>, ParseError> {
    let date = find_date_header(text);

    let mut fixes = Vec::new();
    let mut current_date = date;
    let mut prev_seconds = None;

    for line in text.lines() {
        if !line.starts_with('B') {
            continue;
        }
        let date = match current_date {
            Some(d) => d,
            // B records without a date header cannot be timestamped
            None => return Err(ParseError::MissingDate),
        };
        let Some(record) = parse_b_record(line.as_bytes()) else {
            continue;
        };

        let seconds = record.time.signed_duration_since(NaiveTime::MIN).num_seconds();
        // Midnight rollover: a backwards jump of more than half a day
        // means the flight crossed 00:00 UTC
        let date = if matches!(prev_seconds, Some(prev) if seconds + 43_200 < prev) {
            let next = date + Duration::days(1);
            current_date = Some(next);
            next
        } else {
            date
        };
        prev_seconds = Some(seconds);

        fixes.push(Fix {
            timestamp: DateTime::from_naive_utc_and_offset(
                NaiveDateTime::new(date, record.time),
                Utc,
            ),
            latitude: record.latitude,
            longitude: record.longitude,
            altitude: record.altitude,
            on_ground: false,
        });
    }

    Ok(fixes)
}

/// Finds the `HFDTE(DATE:)?DDMMYY` header anywhere in the file.
fn find_date_header(text: &str) -> Option<NaiveDate> {
    for line in text.lines() {
        let Some(rest) = line.strip_prefix("HFDTE") else {
            continue;
        };
        let digits = rest.strip_prefix("DATE:").unwrap_or(rest);
        if digits.len() < 6 || !digits.as_bytes()[..6].iter().all(u8::is_ascii_digit) {
            continue;
        }
        let day = digits[0..2].parse().ok()?;
        let month = digits[2..4].parse().ok()?;
        let year: i32 = digits[4..6].parse().ok()?;
        return NaiveDate::from_ymd_opt(2000 + year, month, day);
    }
    None
}

struct BRecord {
    time: NaiveTime,
    latitude: f64,
    longitude: f64,
    altitude: Option<f64>,
}

fn parse_b_record(bytes: &[u8]) -> Option<BRecord> {
    if bytes.len() < MIN_B_RECORD_LEN {
        return None;
    }

    let hour = two_digits(&bytes[1..3])?;
    let minute = two_digits(&bytes[3..5])?;
    let second = two_digits(&bytes[5..7])?;
    let time = NaiveTime::from_hms_opt(hour, minute, second)?;

    let lat_deg = digits_u32(&bytes[7..9])? as f64;
    let lat_thousandths = digits_u32(&bytes[9..14])? as f64;
    let mut latitude = lat_deg + lat_thousandths / 1000.0 / 60.0;
    match bytes[14] {
        b'N' => {}
        b'S' => latitude = -latitude,
        _ => return None,
    }

    let lon_deg = digits_u32(&bytes[15..18])? as f64;
    let lon_thousandths = digits_u32(&bytes[18..23])? as f64;
    let mut longitude = lon_deg + lon_thousandths / 1000.0 / 60.0;
    match bytes[23] {
        b'E' => {}
        b'W' => longitude = -longitude,
        _ => return None,
    }

    if latitude.abs() > 90.0 || longitude.abs() > 180.0 {
        return None;
    }

    let validity = bytes[24];
    let pressure_alt = signed_meters(&bytes[25..30]);
    // GPS altitude is only meaningful for 3D ('A') fixes
    let gps_alt = if validity == b'A' && bytes.len() >= FULL_B_RECORD_LEN {
        signed_meters(&bytes[30..35])
    } else {
        None
    };

    Some(BRecord {
        time,
        latitude,
        longitude,
        altitude: gps_alt.or(pressure_alt),
    })
}

fn two_digits(bytes: &[u8]) -> Option<u32> {
    digits_u32(bytes)
}

fn digits_u32(bytes: &[u8]) -> Option<u32> {
    if !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

fn signed_meters(bytes: &[u8]) -> Option<f64> {
    let s = std::str::from_utf8(bytes).ok()?;
    s.parse::<i32>().ok().map(f64::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    const HEADER: &str = "AXCT7F1\nHFDTE140326\nHFPLTPILOT:Test Pilot\n";

    #[test]
    fn test_parse_single_b_record() {
        let text = format!("{}B1005044703888N01103444EA0142001455\n", HEADER);
        let fixes = parse(&text).unwrap();

        assert_eq!(fixes.len(), 1);
        let fix = &fixes[0];
        assert_eq!(fix.timestamp.hour(), 10);
        assert_eq!(fix.timestamp.minute(), 5);
        assert_eq!(fix.timestamp.second(), 4);
        // 47°03.888' N
        assert!((fix.latitude - 47.0648).abs() < 0.001);
        // 011°03.444' E
        assert!((fix.longitude - 11.0574).abs() < 0.001);
        // GPS altitude preferred over pressure altitude
        assert_eq!(fix.altitude, Some(1455.0));
    }

    #[test]
    fn test_parse_southern_western_hemispheres() {
        let text = format!("{}B1005043365123S07012345WA0142001455\n", HEADER);
        let fixes = parse(&text).unwrap();

        assert!(fixes[0].latitude < 0.0);
        assert!(fixes[0].longitude < 0.0);
    }

    #[test]
    fn test_date_header_with_date_prefix() {
        let text = "HFDTEDATE:140326,01\nB1005044703888N01103444EA0142001455\n";
        let fixes = parse(text).unwrap();

        assert_eq!(fixes.len(), 1);
        let date = fixes[0].timestamp.date_naive();
        assert_eq!(date, NaiveDate::from_ymd_opt(2026, 3, 14).unwrap());
    }

    #[test]
    fn test_missing_date_header_fails() {
        let text = "B1005044703888N01103444EA0142001455\n";
        assert!(matches!(parse(text), Err(ParseError::MissingDate)));
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let text = format!(
            "{}B1005044703888N01103444EA0142001455\n\
             BXXXXXX4703888N01103444EA0142001455\n\
             B100506470388\n\
             B1005074703888X01103444EA0142001455\n\
             B1005084703888N01103444EA0142001460\n",
            HEADER
        );
        let fixes = parse(&text).unwrap();

        assert_eq!(fixes.len(), 2);
    }

    #[test]
    fn test_midnight_rollover_advances_date() {
        let text = format!(
            "{}B2359594703888N01103444EA0142001455\n\
             B0000014703888N01103444EA0142001455\n",
            HEADER
        );
        let fixes = parse(&text).unwrap();

        assert_eq!(fixes.len(), 2);
        assert!(fixes[1].timestamp > fixes[0].timestamp);
        assert_eq!(
            fixes[1].timestamp.date_naive(),
            NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
        );
    }

    #[test]
    fn test_2d_fix_uses_pressure_altitude() {
        let text = format!("{}B1005044703888N01103444EV0142000000\n", HEADER);
        let fixes = parse(&text).unwrap();

        assert_eq!(fixes[0].altitude, Some(1420.0));
    }

    #[test]
    fn test_short_record_without_gps_altitude() {
        let text = format!("{}B1005044703888N01103444EA01420\n", HEADER);
        let fixes = parse(&text).unwrap();

        assert_eq!(fixes[0].altitude, Some(1420.0));
    }

    #[test]
    fn test_negative_pressure_altitude() {
        let text = format!("{}B1005044703888N01103444EV-0012\n", HEADER);
        let fixes = parse(&text).unwrap();

        assert_eq!(fixes[0].altitude, Some(-12.0));
    }
}
