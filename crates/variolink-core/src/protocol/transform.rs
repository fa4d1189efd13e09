//! Flight-domain conversions
//!
//! Pure helpers shared by the record parsers, the sentence writers, and the
//! track-list assembly: coordinate conversion, day-index assignment, IGC
//! filename synthesis, and the write-path clamps.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Symbol set for the compact IGC filename fields.
const BASE36_ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Widest altitude the 4-digit waypoint field can carry.
pub const MAX_WAYPOINT_ALTITUDE: i32 = 9999;
/// Lowest altitude the 4-digit waypoint field can carry.
pub const MIN_WAYPOINT_ALTITUDE: i32 = -999;

/// Which IGC filename scheme the track list synthesizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilenameFormat {
    /// `YYYY-MM-DD-MMM-SSS-NN.IGC`, one field per component.
    #[default]
    Long,
    /// The compact 8.3 form with base-36 packed fields.
    Short,
}

/// Convert wire degrees/minutes/thousandths-of-minutes to decimal degrees.
///
/// `negative` is set for the S and W hemispheres.
pub fn decimal_degrees(degrees: u32, minutes: u32, thousandths: u32, negative: bool) -> f64 {
    let value =
        f64::from(degrees) + f64::from(minutes) / 60.0 + f64::from(thousandths) / 60_000.0;
    if negative {
        -value
    } else {
        value
    }
}

/// Split decimal degrees into (southern/western, whole degrees, decimal minutes)
/// for the fixed-width writers.
pub fn degrees_minutes(decimal: f64) -> (bool, u32, f64) {
    let negative = decimal < 0.0;
    let magnitude = decimal.abs();
    let degrees = magnitude.trunc() as u32;
    let minutes = (magnitude - magnitude.trunc()) * 60.0;
    (negative, degrees, minutes)
}

/// Clamp an altitude to the range the 4-digit waypoint field can encode.
pub fn clamp_altitude(altitude: i32) -> i32 {
    altitude.clamp(MIN_WAYPOINT_ALTITUDE, MAX_WAYPOINT_ALTITUDE)
}

/// Map an instrument model string to its IGC manufacturer code.
pub fn manufacturer(model: &str) -> &'static str {
    match model {
        "COMPEO" | "COMPEO+" | "COMPETINO" | "COMPETINO+" | "GALILEO" => "BRA",
        "5020" | "5030" | "5520" => "FLY",
        "6020" | "6030" => "FLY",
        _ => "XXX",
    }
}

/// Assign day indexes to a track list in as-received (newest-first) order.
///
/// Walking from the last entry to the first, the last entry gets 1 and each
/// earlier entry gets its successor's index plus one when the flight dates
/// match, otherwise 1. The result distinguishes several flights flown on the
/// same calendar date.
pub fn day_indexes(dates: &[NaiveDate]) -> Vec<u32> {
    let mut indexes = vec![0u32; dates.len()];
    for i in (0..dates.len()).rev() {
        indexes[i] = if i + 1 == dates.len() {
            1
        } else if dates[i] == dates[i + 1] {
            indexes[i + 1] + 1
        } else {
            1
        };
    }
    indexes
}

/// Synthesize a track's IGC filename in the configured scheme.
pub fn filename(
    format: FilenameFormat,
    date: NaiveDate,
    manufacturer: &str,
    serial: u32,
    day_index: u32,
) -> String {
    match format {
        FilenameFormat::Long => long_filename(date, manufacturer, serial, day_index),
        FilenameFormat::Short => short_filename(date, manufacturer, serial, day_index),
    }
}

/// `YYYY-MM-DD-<manufacturer>-<serial>-<day index>.IGC`.
pub fn long_filename(date: NaiveDate, manufacturer: &str, serial: u32, day_index: u32) -> String {
    format!(
        "{:04}-{:02}-{:02}-{}-{}-{:02}.IGC",
        date.year(),
        date.month(),
        date.day(),
        manufacturer,
        serial,
        day_index
    )
}

/// The compact 8.3 IGC name: base-36 year/month/day, the manufacturer's
/// first letter, a 3-symbol base-36 serial, and the base-36 day index.
pub fn short_filename(date: NaiveDate, manufacturer: &str, serial: u32, day_index: u32) -> String {
    let mut name = String::with_capacity(12);
    name.push(base36(date.year().unsigned_abs() % 10));
    name.push(base36(date.month()));
    name.push(base36(date.day()));
    name.push(manufacturer.chars().next().unwrap_or('X'));
    name.push(base36(serial / 1296));
    name.push(base36(serial / 36));
    name.push(base36(serial));
    name.push(base36(day_index));
    name.push_str(".IGC");
    name
}

fn base36(value: u32) -> char {
    BASE36_ALPHABET[(value % 36) as usize] as char
}
