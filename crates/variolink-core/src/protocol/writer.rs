//! Sentence writers
//!
//! Render waypoint and route upload payloads with the instrument's fixed
//! field widths. Every writer verifies the rendered width against the
//! expected payload width: out-of-range caller data (a name wider than the
//! 17-byte field, an index wider than two digits) fails instead of being
//! truncated on the wire.

use super::error::{Error, Result};
use super::transform;
use crate::store::{Route, Waypoint};

/// Width of the name field in waypoint and route records.
const NAME_WIDTH: usize = 17;

/// `PBRWPR,` + lat(8) + hemi + lon(9) + hemi + name(17) + altitude(4)
/// + five separating commas.
const WAYPOINT_WIDTH: usize = 7 + 8 + 1 + 1 + 1 + 9 + 1 + 1 + 1 + NAME_WIDTH + 1 + 4;

/// `PBRRTR,` + three two-digit fields + name(17) + three separating commas.
const ROUTE_WIDTH: usize = 7 + 2 + 1 + 2 + 1 + 2 + 1 + NAME_WIDTH;

/// Render a `PBRWPR` waypoint upload payload.
///
/// The altitude is clamped to the 4-digit field range before rendering.
pub fn waypoint(waypoint: &Waypoint) -> Result<String> {
    let (south, lat_deg, lat_min) = transform::degrees_minutes(waypoint.latitude);
    let (west, lon_deg, lon_min) = transform::degrees_minutes(waypoint.longitude);

    let payload = format!(
        "PBRWPR,{:02}{:06.3},{},{:03}{:06.3},{},{:<name_width$},{:04}",
        lat_deg,
        lat_min,
        if south { 'S' } else { 'N' },
        lon_deg,
        lon_min,
        if west { 'W' } else { 'E' },
        waypoint.name,
        transform::clamp_altitude(waypoint.altitude),
        name_width = NAME_WIDTH,
    );
    check_width("waypoint", &payload, WAYPOINT_WIDTH)?;
    Ok(payload)
}

/// Render the `PBRRTR` payload sequence for one route upload: the header
/// record carrying the route name, then one record per member waypoint.
///
/// The record count field includes the header.
pub fn route_sentences(route: &Route) -> Result<Vec<String>> {
    let count = route.points.len() + 1;
    if route.index > 99 {
        return Err(Error::FieldOverflow(format!(
            "route index {} exceeds two digits",
            route.index
        )));
    }
    if count > 99 {
        return Err(Error::FieldOverflow(format!(
            "route of {} records exceeds two digits",
            count
        )));
    }

    let mut sentences = Vec::with_capacity(count);
    let header = format!(
        "PBRRTR,{:02},{:02},00,{:<name_width$}",
        route.index,
        count,
        route.name,
        name_width = NAME_WIDTH,
    );
    check_width("route header", &header, ROUTE_WIDTH)?;
    sentences.push(header);

    for (position, waypoint) in route.points.iter().enumerate() {
        let sentence = format!(
            "PBRRTR,{:02},{:02},{:02},{:<name_width$}",
            route.index,
            count,
            position + 1,
            waypoint.name,
            name_width = NAME_WIDTH,
        );
        check_width("route point", &sentence, ROUTE_WIDTH)?;
        sentences.push(sentence);
    }

    Ok(sentences)
}

fn check_width(kind: &str, payload: &str, expected: usize) -> Result<()> {
    if payload.len() != expected {
        return Err(Error::FieldOverflow(format!(
            "{} payload rendered {} bytes, expected {}",
            kind,
            payload.len(),
            expected
        )));
    }
    Ok(())
}
