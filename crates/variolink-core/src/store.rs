//! Flight data store
//!
//! The generic waypoint/route/track container a host application owns. The
//! protocol engine produces records into it during downloads and consumes
//! records from it during uploads; it never manages the container's
//! lifecycle or persists it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// GPS fix quality reported by an IGC B record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixQuality {
    /// `A`: full 3D fix.
    ThreeD,
    /// `V`: 2D fix, GPS altitude not trustworthy.
    TwoD,
}

/// One recorded track fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    /// Fix timestamp, anchored to the flight date in UTC.
    pub time: DateTime<Utc>,
    /// Decimal degrees, negative south.
    pub latitude: f64,
    /// Decimal degrees, negative west.
    pub longitude: f64,
    /// Fix quality for this point.
    pub fix: FixQuality,
    /// Barometric altitude in meters.
    pub pressure_altitude: i32,
    /// GPS altitude in meters.
    pub gps_altitude: i32,
}

/// A named position stored on the instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Waypoint name as shown on the instrument.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Decimal degrees, negative south.
    pub latitude: f64,
    /// Decimal degrees, negative west.
    pub longitude: f64,
    /// Altitude in device units (meters), integral.
    pub altitude: i32,
}

impl Waypoint {
    /// Create a waypoint with an empty description.
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64, altitude: i32) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            latitude,
            longitude,
            altitude,
        }
    }
}

/// An ordered list of waypoints flown as a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Route slot on the instrument.
    pub index: u32,
    /// Route name as shown on the instrument.
    pub name: String,
    /// Member waypoints in flying order.
    pub points: Vec<Waypoint>,
}

impl Route {
    /// Create an empty route.
    pub fn new(index: u32, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            points: Vec::new(),
        }
    }

    /// Append a waypoint to the end of the route.
    pub fn append_point(&mut self, waypoint: Waypoint) {
        self.points.push(waypoint);
    }
}

/// A downloaded track log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Synthesized IGC filename identifying the flight.
    pub name: String,
    /// Recorded fixes in flight order.
    pub points: Vec<TrackPoint>,
}

impl Track {
    /// Create a track from its fixes.
    pub fn new(name: impl Into<String>, points: Vec<TrackPoint>) -> Self {
        Self {
            name: name.into(),
            points,
        }
    }
}

/// In-memory container for everything read from or written to an instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightDb {
    waypoints: Vec<Waypoint>,
    routes: Vec<Route>,
    tracks: Vec<Track>,
}

impl FlightDb {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a waypoint to the store.
    pub fn add_waypoint(&mut self, waypoint: Waypoint) {
        self.waypoints.push(waypoint);
    }

    /// Look a waypoint up by exact name match.
    pub fn find_waypoint(&self, name: &str) -> Option<&Waypoint> {
        self.waypoints.iter().find(|wp| wp.name == name)
    }

    /// All stored waypoints, in insertion order.
    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    /// Add a route to the store.
    pub fn add_route(&mut self, route: Route) {
        self.routes.push(route);
    }

    /// All stored routes, in insertion order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Add a track to the store.
    pub fn add_track(&mut self, track: Track) {
        self.tracks.push(track);
    }

    /// All stored tracks, in insertion order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// True when nothing has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty() && self.routes.is_empty() && self.tracks.is_empty()
    }
}
