//! Device sessions
//!
//! One [`DeviceSession`] per read or write operation against an instrument.
//! The session owns the boxed transport and the read buffer, runs the
//! XON/XOFF command bracket, memoizes the device identity and track list,
//! and exposes the caller-facing operations. Everything is synchronous:
//! one exchange in flight, blocking reads bounded by the poll interval.

use std::io::Write;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace, warn};

use super::commands::Command;
use super::error::{Error, Result};
use super::parser::{self, DeviceIdentity, IgcLine, RouteRecord, TrackSummary};
use super::sentence;
use super::transform::{self, FilenameFormat};
use super::transport::{SerialLink, Transport};
use super::writer;
use super::{MAX_LINE_LEN, XOFF, XON};
use crate::store::{FlightDb, Route, Track, TrackPoint, Waypoint};

/// How much to request from the transport per poll-bounded read.
const READ_CHUNK: usize = 1024;

/// Session configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Which IGC filename scheme synthesized track names use.
    pub filename_format: FilenameFormat,
    /// Mirror raw wire traffic to the trace sink (stderr unless a sink is
    /// installed explicitly).
    pub debug: bool,
}

/// A command/response session with one flight instrument.
pub struct DeviceSession {
    /// Transport handle; a real serial link or a test double.
    transport: Box<dyn Transport>,
    /// Session configuration.
    config: DeviceConfig,
    /// Read buffer; `cursor` indexes the unconsumed tail.
    buffer: Vec<u8>,
    cursor: usize,
    /// Literal wire-traffic mirror, lines prefixed `> ` (sent) / `< ` (received).
    trace_sink: Option<Box<dyn Write + Send>>,
    /// Identity block, fetched once per session.
    identity: Option<DeviceIdentity>,
    /// Track list, fetched once per session.
    tracks: Option<Vec<TrackSummary>>,
}

impl DeviceSession {
    /// Open a session on the named serial port.
    pub fn open(path: &str, config: DeviceConfig) -> Result<Self> {
        debug!(path, "opening instrument session");
        let link = SerialLink::open(path)?;
        Ok(Self::with_transport(Box::new(link), config))
    }

    /// Build a session over an arbitrary transport.
    pub fn with_transport(transport: Box<dyn Transport>, config: DeviceConfig) -> Self {
        let trace_sink: Option<Box<dyn Write + Send>> = if config.debug {
            Some(Box::new(std::io::stderr()))
        } else {
            None
        };
        Self {
            transport,
            config,
            buffer: Vec::new(),
            cursor: 0,
            trace_sink,
            identity: None,
            tracks: None,
        }
    }

    /// Route the raw-traffic mirror somewhere other than stderr.
    pub fn set_trace_sink(&mut self, sink: Box<dyn Write + Send>) {
        self.trace_sink = Some(sink);
    }

    /// Device path of the underlying transport.
    pub fn path(&self) -> &str {
        self.transport.path()
    }

    /// Close the session, flushing the transport.
    pub fn close(mut self) -> Result<()> {
        debug!(path = self.transport.path(), "closing instrument session");
        self.transport.shutdown()
    }

    // ---- operations -----------------------------------------------------

    /// Query model, pilot name, serial number and firmware version.
    ///
    /// The reply is memoized; later calls within the session reuse it.
    pub fn identity(&mut self) -> Result<DeviceIdentity> {
        if let Some(identity) = &self.identity {
            return Ok(identity.clone());
        }

        debug!(command = "PBRSNP", "querying device identity");
        let mut reply = None;
        self.run(Command::DeviceInfo, |body| {
            reply = Some(parser::device_identity(body)?);
            Ok(())
        })?;

        let identity = reply.ok_or(Error::MissingReply("PBRSNP"))?;
        self.identity = Some(identity.clone());
        Ok(identity)
    }

    /// Fetch the track list with day indexes and filenames assigned.
    ///
    /// The list is memoized; later calls within the session reuse it.
    pub fn track_list(&mut self) -> Result<Vec<TrackSummary>> {
        if let Some(tracks) = &self.tracks {
            return Ok(tracks.clone());
        }

        // Filenames need the serial number and manufacturer code.
        let identity = self.identity()?;

        debug!(command = "PBRTL", "querying track list");
        let mut entries: Vec<TrackSummary> = Vec::new();
        self.run(Command::TrackList, |body| {
            let entry = parser::track_summary(body)?;
            if entry.index as usize != entries.len() {
                return Err(Error::Inconsistent(format!(
                    "track index {} received, expected {}",
                    entry.index,
                    entries.len()
                )));
            }
            if let Some(first) = entries.first() {
                if entry.count != first.count {
                    return Err(Error::Inconsistent(format!(
                        "track count changed from {} to {}",
                        first.count, entry.count
                    )));
                }
            }
            entries.push(entry);
            Ok(())
        })?;

        if let Some(first) = entries.first() {
            if entries.len() != first.count as usize {
                return Err(Error::Inconsistent(format!(
                    "received {} of {} tracks",
                    entries.len(),
                    first.count
                )));
            }
        }

        // Day indexes and filenames need the complete list.
        let dates: Vec<NaiveDate> = entries.iter().map(|entry| entry.date).collect();
        for (entry, day_index) in entries.iter_mut().zip(transform::day_indexes(&dates)) {
            entry.day_index = day_index;
            entry.filename = transform::filename(
                self.config.filename_format,
                entry.date,
                identity.manufacturer(),
                identity.serial,
                day_index,
            );
        }

        trace!(tracks = entries.len(), "track list complete");
        self.tracks = Some(entries.clone());
        Ok(entries)
    }

    /// Stream one track's IGC detail and return its fixes.
    pub fn track_points(&mut self, index: u32) -> Result<Vec<TrackPoint>> {
        debug!(command = "PBRTR", index, "downloading track");
        self.stream_igc(Command::TrackDetail { index })
    }

    /// Stream the instrument's full track log and return its fixes.
    pub fn track_log(&mut self) -> Result<Vec<TrackPoint>> {
        debug!(command = "PBRIGC", "downloading full track log");
        self.stream_igc(Command::TrackLog)
    }

    /// List the waypoints stored on the instrument.
    pub fn waypoints(&mut self) -> Result<Vec<Waypoint>> {
        debug!(command = "PBRWPS", "querying waypoints");
        let mut waypoints = Vec::new();
        self.run(Command::WaypointList, |body| {
            waypoints.push(parser::waypoint(body)?);
            Ok(())
        })?;
        trace!(waypoints = waypoints.len(), "waypoint list complete");
        Ok(waypoints)
    }

    /// List the routes stored on the instrument.
    ///
    /// Route points reference waypoints by name; each is resolved against
    /// `store` and silently skipped when the lookup finds nothing.
    pub fn routes(&mut self, store: &FlightDb) -> Result<Vec<Route>> {
        debug!(command = "PBRRTS", "querying routes");
        let mut routes: Vec<Route> = Vec::new();
        self.run(Command::RouteList, |body| {
            match parser::route_record(body)? {
                RouteRecord::Header { route, name, .. } => {
                    routes.push(Route::new(route, name));
                }
                RouteRecord::Point {
                    route, waypoint, ..
                } => {
                    let target = routes
                        .iter_mut()
                        .find(|candidate| candidate.index == route)
                        .ok_or_else(|| {
                            Error::Inconsistent(format!(
                                "route point for route {route} before its header"
                            ))
                        })?;
                    match store.find_waypoint(&waypoint) {
                        Some(found) => target.append_point(found.clone()),
                        None => {
                            warn!(waypoint = %waypoint, "route references unknown waypoint, skipping")
                        }
                    }
                }
            }
            Ok(())
        })?;
        trace!(routes = routes.len(), "route list complete");
        Ok(routes)
    }

    /// Upload one waypoint. The instrument acknowledges with an empty
    /// bracket: XOFF immediately followed by XON.
    pub fn write_waypoint(&mut self, waypoint: &Waypoint) -> Result<()> {
        debug!(command = "PBRWPR", name = %waypoint.name, "uploading waypoint");
        let payload = writer::waypoint(waypoint)?;
        self.begin(&payload)?;
        self.finish()
    }

    /// Upload one route: the header record, then one record per point, each
    /// in its own empty bracket.
    pub fn write_route(&mut self, route: &Route) -> Result<()> {
        debug!(
            command = "PBRRTR",
            name = %route.name,
            points = route.points.len(),
            "uploading route"
        );
        for payload in writer::route_sentences(route)? {
            self.begin(&payload)?;
            self.finish()?;
        }
        Ok(())
    }

    /// Read everything the instrument offers into a fresh store: waypoints,
    /// routes resolved against them, then every track with its fixes.
    pub fn download(&mut self) -> Result<FlightDb> {
        let mut db = FlightDb::new();
        for waypoint in self.waypoints()? {
            db.add_waypoint(waypoint);
        }
        for route in self.routes(&db)? {
            db.add_route(route);
        }
        for summary in self.track_list()? {
            let points = self.track_points(summary.index)?;
            db.add_track(Track::new(summary.filename, points));
        }
        Ok(db)
    }

    /// Write the store's waypoints, then its routes, to the instrument.
    pub fn upload(&mut self, db: &FlightDb) -> Result<()> {
        for waypoint in db.waypoints() {
            self.write_waypoint(waypoint)?;
        }
        for route in db.routes() {
            self.write_route(route)?;
        }
        Ok(())
    }

    // ---- exchange bracket -----------------------------------------------

    /// Run one command bracket, handing every reply line to `each`.
    ///
    /// Lines of framed commands are unwrapped through the sentence decoder
    /// first; IGC replies arrive as free text and pass through untouched.
    fn run(&mut self, command: Command, mut each: impl FnMut(&[u8]) -> Result<()>) -> Result<()> {
        let payload = command.payload()?;
        self.begin(&payload)?;
        while let Some(line) = self.read_line()? {
            if command.framed_reply() {
                each(sentence::decode(&line)?)?;
            } else {
                each(&line)?;
            }
        }
        self.finish()
    }

    /// Stream an IGC reply and collect its B-record fixes.
    fn stream_igc(&mut self, command: Command) -> Result<Vec<TrackPoint>> {
        let mut date: Option<NaiveDate> = None;
        let mut points = Vec::new();
        self.run(command, |line| {
            match parser::igc_line(line, date)? {
                IgcLine::Date(flight_date) => date = Some(flight_date),
                IgcLine::Fix(point) => points.push(point),
                IgcLine::Ignored => {}
            }
            Ok(())
        })?;
        trace!(points = points.len(), "IGC stream complete");
        Ok(points)
    }

    /// Send one framed command and wait for the device to raise XOFF.
    fn begin(&mut self, payload: &str) -> Result<()> {
        let frame = sentence::encode(payload);
        self.mirror(b'>', frame.as_bytes());
        self.transport.send(frame.as_bytes())?;
        self.expect_control(XOFF)
    }

    /// Consume the XON that closes the reply stream.
    fn finish(&mut self) -> Result<()> {
        self.expect_control(XON)
    }

    /// Read the next reply line, or `None` once XON is pending.
    ///
    /// The returned line includes its CR LF terminator, the literal wire
    /// form. A line longer than [`MAX_LINE_LEN`] is fatal.
    fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
        if self.peek_byte()? == XON {
            return Ok(None);
        }
        let mut line = Vec::new();
        loop {
            let byte = self.next_byte()?;
            if line.len() == MAX_LINE_LEN {
                return Err(Error::LineOverflow);
            }
            line.push(byte);
            if byte == b'\n' {
                break;
            }
        }
        self.mirror(b'<', &line);
        Ok(Some(line))
    }

    fn expect_control(&mut self, expected: u8) -> Result<()> {
        let byte = self.next_byte()?;
        if byte != expected {
            return Err(Error::UnexpectedCharacter(byte));
        }
        Ok(())
    }

    fn peek_byte(&mut self) -> Result<u8> {
        if self.cursor == self.buffer.len() {
            self.refill()?;
        }
        Ok(self.buffer[self.cursor])
    }

    fn next_byte(&mut self) -> Result<u8> {
        let byte = self.peek_byte()?;
        self.cursor += 1;
        Ok(byte)
    }

    fn refill(&mut self) -> Result<()> {
        self.buffer.resize(READ_CHUNK, 0);
        let filled = self.transport.fill(&mut self.buffer)?;
        self.buffer.truncate(filled);
        self.cursor = 0;
        if filled == 0 {
            return Err(Error::UnexpectedEof);
        }
        Ok(())
    }

    /// Mirror one wire line to the trace sink. Sink errors never abort the
    /// exchange.
    fn mirror(&mut self, direction: u8, line: &[u8]) {
        if let Some(sink) = &mut self.trace_sink {
            let _ = sink.write_all(&[direction, b' ']);
            let _ = sink.write_all(line);
        }
    }
}

/// Open a session on `path`, download the instrument's full contents, and
/// close the session again.
pub fn download(path: &str, config: &DeviceConfig) -> Result<FlightDb> {
    match download_inner(path, config) {
        Ok(db) => Ok(db),
        Err(e) => {
            error!(path, error = %e, "download failed");
            Err(e)
        }
    }
}

fn download_inner(path: &str, config: &DeviceConfig) -> Result<FlightDb> {
    let mut session = DeviceSession::open(path, config.clone())?;
    let db = session.download()?;
    session.close()?;
    Ok(db)
}

/// Open a session on `path`, upload the store's waypoints and routes, and
/// close the session again.
pub fn upload(path: &str, config: &DeviceConfig, db: &FlightDb) -> Result<()> {
    match upload_inner(path, config, db) {
        Ok(()) => Ok(()),
        Err(e) => {
            error!(path, error = %e, "upload failed");
            Err(e)
        }
    }
}

fn upload_inner(path: &str, config: &DeviceConfig, db: &FlightDb) -> Result<()> {
    let mut session = DeviceSession::open(path, config.clone())?;
    session.upload(db)?;
    session.close()
}
