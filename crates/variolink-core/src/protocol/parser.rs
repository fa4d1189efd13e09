//! Record parsers
//!
//! One parse function per reply grammar, each a straight-line matcher chain
//! over a [`Cursor`]. Framed payloads arrive without the envelope and must
//! consume their entire input; streamed IGC lines arrive raw and must end at
//! the CR LF terminator. A record that fails its grammar aborts the whole
//! command; malformed records are never skipped.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{Error, Result};
use super::scan::Cursor;
use super::transform;
use crate::store::{FixQuality, TrackPoint, Waypoint};

/// Identity block reported by `PBRSNP`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Instrument model string, e.g. `5030` or `COMPEO+`.
    pub model: String,
    /// Pilot name as configured on the instrument.
    pub pilot: String,
    /// Instrument serial number.
    pub serial: u32,
    /// Firmware version string.
    pub firmware: String,
}

impl DeviceIdentity {
    /// IGC manufacturer code derived from the model string.
    pub fn manufacturer(&self) -> &'static str {
        transform::manufacturer(&self.model)
    }
}

/// One `PBRTL` track list entry.
///
/// `day_index` and `filename` are derived once the full list has been
/// received; parsing leaves them at their zero values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSummary {
    /// Total number of tracks the instrument declared in this record.
    pub count: u32,
    /// Zero-based position in the list, newest flight first.
    pub index: u32,
    /// Flight date.
    pub date: NaiveDate,
    /// Takeoff time of day.
    pub start: NaiveTime,
    /// Flight duration in seconds.
    pub duration_secs: u32,
    /// Ordinal among same-day flights (see [`transform::day_indexes`]).
    pub day_index: u32,
    /// Synthesized IGC filename in the configured scheme.
    pub filename: String,
}

/// One `PBRRTS` record: the header names the route, points reference
/// waypoints by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteRecord {
    /// Point index 0: carries the route name.
    Header {
        /// Route slot on the instrument.
        route: u32,
        /// Declared number of records for this route, header included.
        count: u32,
        /// Route name, right-trimmed.
        name: String,
    },
    /// Point index 1..: references a waypoint stored on the instrument.
    Point {
        /// Route slot on the instrument.
        route: u32,
        /// Declared number of records for this route, header included.
        count: u32,
        /// One-based position within the route.
        point: u32,
        /// Referenced waypoint name, right-trimmed.
        waypoint: String,
    },
}

/// Outcome of consuming one line of an IGC stream.
#[derive(Debug, Clone, PartialEq)]
pub enum IgcLine {
    /// `HFDTE`: the flight date for all subsequent fixes.
    Date(NaiveDate),
    /// `B`: one recorded fix.
    Fix(TrackPoint),
    /// Any other record type, skipped without comment.
    Ignored,
}

/// Parse a `PBRSNP` identity payload.
pub fn device_identity(payload: &[u8]) -> Result<DeviceIdentity> {
    let mut model = String::new();
    let mut pilot = String::new();
    let mut serial = 0;
    let mut firmware = String::new();

    let cur = Cursor::new(payload)
        .literal("PBRSNP,")
        .text_until(b',', &mut model)
        .text_until(b',', &mut pilot)
        .uint(&mut serial)
        .delimiter(b',')
        .text_to_end(&mut firmware)
        .end();
    if cur.failed() {
        return Err(Error::malformed("device identity", payload));
    }

    // The pilot field alone is also stripped of leading padding.
    Ok(DeviceIdentity {
        model: model.trim_end().to_string(),
        pilot: pilot.trim().to_string(),
        serial,
        firmware: firmware.trim_end().to_string(),
    })
}

/// Parse a `PBRTL` track summary payload.
pub fn track_summary(payload: &[u8]) -> Result<TrackSummary> {
    let (mut count, mut index) = (0, 0);
    let (mut day, mut month, mut year) = (0, 0, 0);
    let (mut start_h, mut start_m, mut start_s) = (0, 0, 0);
    let (mut dur_h, mut dur_m, mut dur_s) = (0, 0, 0);

    let cur = Cursor::new(payload)
        .literal("PBRTL,")
        .uint(&mut count)
        .delimiter(b',')
        .uint(&mut index)
        .delimiter(b',')
        .digits(2, &mut day)
        .literal(".")
        .digits(2, &mut month)
        .literal(".")
        .digits(2, &mut year)
        .delimiter(b',')
        .digits(2, &mut start_h)
        .literal(":")
        .digits(2, &mut start_m)
        .literal(":")
        .digits(2, &mut start_s)
        .delimiter(b',')
        .digits(2, &mut dur_h)
        .literal(":")
        .digits(2, &mut dur_m)
        .literal(":")
        .digits(2, &mut dur_s)
        .end();
    if cur.failed() {
        return Err(Error::malformed("track summary", payload));
    }

    let date = NaiveDate::from_ymd_opt(2000 + year as i32, month, day)
        .ok_or_else(|| Error::malformed("track summary", payload))?;
    let start = NaiveTime::from_hms_opt(start_h, start_m, start_s)
        .ok_or_else(|| Error::malformed("track summary", payload))?;

    Ok(TrackSummary {
        count,
        index,
        date,
        start,
        duration_secs: dur_h * 3600 + dur_m * 60 + dur_s,
        day_index: 0,
        filename: String::new(),
    })
}

/// Consume one line of an IGC stream.
///
/// `date` is the flight date established by a previous `HFDTE` record; a fix
/// arriving before any date header cannot be anchored to a timestamp and is
/// fatal.
pub fn igc_line(line: &[u8], date: Option<NaiveDate>) -> Result<IgcLine> {
    if line.starts_with(b"HFDTE") {
        igc_date(line).map(IgcLine::Date)
    } else if line.starts_with(b"B") {
        let date = date.ok_or_else(|| Error::malformed("track fix before date header", line))?;
        igc_fix(line, date).map(IgcLine::Fix)
    } else {
        Ok(IgcLine::Ignored)
    }
}

fn igc_date(line: &[u8]) -> Result<NaiveDate> {
    let (mut day, mut month, mut year) = (0, 0, 0);

    let cur = Cursor::new(line)
        .literal("HFDTE")
        .digits(2, &mut day)
        .digits(2, &mut month)
        .digits(2, &mut year)
        .crlf()
        .end();
    if cur.failed() {
        return Err(Error::malformed("date header", line));
    }

    NaiveDate::from_ymd_opt(2000 + year as i32, month, day)
        .ok_or_else(|| Error::malformed("date header", line))
}

fn igc_fix(line: &[u8], date: NaiveDate) -> Result<TrackPoint> {
    let (mut hour, mut minute, mut second) = (0, 0, 0);
    let (mut lat_deg, mut lat_min, mut lat_thou) = (0, 0, 0);
    let (mut lon_deg, mut lon_min, mut lon_thou) = (0, 0, 0);
    let (mut ns, mut ew, mut validity) = (0u8, 0u8, 0u8);
    let (mut pressure, mut gps) = (0, 0);

    let cur = Cursor::new(line)
        .literal("B")
        .digits(2, &mut hour)
        .digits(2, &mut minute)
        .digits(2, &mut second)
        .digits(2, &mut lat_deg)
        .digits(2, &mut lat_min)
        .digits(3, &mut lat_thou)
        .one_of("NS", &mut ns)
        .digits(3, &mut lon_deg)
        .digits(2, &mut lon_min)
        .digits(3, &mut lon_thou)
        .one_of("EW", &mut ew)
        .one_of("AV", &mut validity)
        .digits(5, &mut pressure)
        .digits(5, &mut gps)
        .crlf()
        .end();
    if cur.failed() {
        return Err(Error::malformed("track fix", line));
    }

    let time = NaiveTime::from_hms_opt(hour, minute, second)
        .ok_or_else(|| Error::malformed("track fix", line))?;

    Ok(TrackPoint {
        time: fix_timestamp(date, time),
        latitude: transform::decimal_degrees(lat_deg, lat_min, lat_thou, ns == b'S'),
        longitude: transform::decimal_degrees(lon_deg, lon_min, lon_thou, ew == b'W'),
        fix: if validity == b'A' {
            FixQuality::ThreeD
        } else {
            FixQuality::TwoD
        },
        pressure_altitude: pressure as i32,
        gps_altitude: gps as i32,
    })
}

/// Anchor a time of day to the flight date, in UTC.
fn fix_timestamp(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    date.and_time(time).and_utc()
}

/// Parse a `PBRWPS` waypoint payload.
pub fn waypoint(payload: &[u8]) -> Result<Waypoint> {
    let (mut lat_deg, mut lat_min, mut lat_thou) = (0, 0, 0);
    let (mut lon_deg, mut lon_min, mut lon_thou) = (0, 0, 0);
    let (mut ns, mut ew) = (0u8, 0u8);
    let mut name = String::new();
    let mut description = String::new();
    let mut altitude = 0;

    let cur = Cursor::new(payload)
        .literal("PBRWPS,")
        .digits(2, &mut lat_deg)
        .digits(2, &mut lat_min)
        .literal(".")
        .digits(3, &mut lat_thou)
        .delimiter(b',')
        .one_of("NS", &mut ns)
        .delimiter(b',')
        .digits(3, &mut lon_deg)
        .digits(2, &mut lon_min)
        .literal(".")
        .digits(3, &mut lon_thou)
        .delimiter(b',')
        .one_of("EW", &mut ew)
        .delimiter(b',')
        .text_until(b',', &mut name)
        .text_until(b',', &mut description)
        .int(&mut altitude)
        .end();
    if cur.failed() {
        return Err(Error::malformed("waypoint", payload));
    }

    Ok(Waypoint {
        name: name.trim_end().to_string(),
        description: description.trim_end().to_string(),
        latitude: transform::decimal_degrees(lat_deg, lat_min, lat_thou, ns == b'S'),
        longitude: transform::decimal_degrees(lon_deg, lon_min, lon_thou, ew == b'W'),
        altitude,
    })
}

/// Parse a `PBRRTS` route payload.
pub fn route_record(payload: &[u8]) -> Result<RouteRecord> {
    let (mut route, mut count, mut point) = (0, 0, 0);
    let mut name = String::new();

    let cur = Cursor::new(payload)
        .literal("PBRRTS,")
        .uint(&mut route)
        .delimiter(b',')
        .uint(&mut count)
        .delimiter(b',')
        .uint(&mut point)
        .delimiter(b',')
        .text_to_end(&mut name)
        .end();
    if cur.failed() {
        return Err(Error::malformed("route", payload));
    }

    let name = name.trim_end().to_string();
    Ok(if point == 0 {
        RouteRecord::Header { route, count, name }
    } else {
        RouteRecord::Point {
            route,
            count,
            point,
            waypoint: name,
        }
    })
}
